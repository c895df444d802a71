use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use unimail::error::MailError;
use unimail::jmap::JmapClient;
use unimail::secret::AesGcmSecret;
use unimail::unified::Aggregated;
use unimail::{CredentialResolver, FanOut, Unified};

use crate::app_config;
use crate::cli::*;
use crate::config::{self, RuntimeConfig};
use crate::output::{Envelope, Meta};

mod compose;
mod identities;
mod organize;
mod read;

/// Everything a mail command needs: the acting user and the engine.
pub(crate) struct Context {
    pub user_id: i64,
    pub unified: Unified,
}

impl Context {
    fn connect(user_flag: Option<i64>) -> Result<Self, MailError> {
        let (store, _) = app_config::read_store()?;
        let user_id = config::resolve_user(user_flag, &store.settings)?;
        let cfg = RuntimeConfig::resolve(&store.settings)?;

        let client = JmapClient::new(&cfg.session_url, cfg.timeout)?;
        let secret = AesGcmSecret::new(&cfg.encryption_key)?;
        let resolver = CredentialResolver::new(
            client,
            Arc::new(store.directory),
            Arc::new(secret),
            cfg.account_cache_ttl,
        );
        Ok(Self {
            user_id,
            unified: Unified::new(resolver, FanOut::new(cfg.concurrency, cfg.timeout)),
        })
    }
}

pub async fn dispatch(cli: &Cli) -> Envelope<Value> {
    let command = command_name(&cli.command);

    // Local-only commands, and guardrails that must fire before any I/O.
    match &cli.command {
        Command::Identities { command: sub } => return identities::run(command, cli.user, sub),
        Command::Delete(args) if !args.force => {
            return Envelope::err(
                command,
                cli.user,
                MailError::usage("delete is permanent; pass --force"),
            );
        }
        _ => {}
    }

    let ctx = match Context::connect(cli.user) {
        Ok(c) => c,
        Err(e) => return Envelope::err(command, cli.user, e),
    };
    let user = Some(ctx.user_id);

    let result = match &cli.command {
        Command::Mailboxes => read::mailboxes(&ctx).await,
        Command::Inbox(args) => read::inbox(&ctx, args).await,
        Command::Get(args) => read::get(&ctx, args).await,
        Command::Thread(args) => read::thread(&ctx, args).await,

        Command::Read(_)
        | Command::Unread(_)
        | Command::Flag(_)
        | Command::Unflag(_)
        | Command::Move(_)
        | Command::Trash(_)
        | Command::Delete(_) => organize::run(&ctx, &cli.command, cli.dry_run).await,

        Command::Drafts { command: sub } => match sub {
            DraftsCommand::Save(args) => compose::save(&ctx, args, cli.dry_run).await,
            DraftsCommand::Update(args) => compose::update(&ctx, args, cli.dry_run).await,
            DraftsCommand::Delete(args) => compose::delete(&ctx, args, cli.dry_run).await,
        },
        Command::Send(args) => compose::send(&ctx, args, cli.dry_run).await,
        Command::ReplyContext(args) => compose::reply_context(&ctx, args).await,
        Command::ForwardContext(args) => compose::forward_context(&ctx, args).await,

        Command::Identities { .. } => Err(MailError::usage("identities commands are local")),
    };

    match result {
        Ok((data, meta)) => Envelope::ok(command, user, data, meta),
        Err(e) => Envelope::err(command, user, e),
    }
}

pub(crate) type Outcome = Result<(Value, Meta), MailError>;

pub(crate) fn to_data<T: Serialize>(value: &T) -> Result<Value, MailError> {
    serde_json::to_value(value).map_err(|e| MailError::protocol(format!("failed to render output: {e}")))
}

/// `data` of a fan-out result, with per-identity statuses under
/// `identities` and failures surfaced as warnings.
pub(crate) fn aggregated<T: Serialize>(key: &str, out: Aggregated<T>) -> Outcome {
    let meta = Meta::from_statuses(out.warning.as_ref(), &out.statuses);
    let mut data = serde_json::Map::new();
    data.insert(key.to_string(), to_data(&out.data)?);
    data.insert("identities".to_string(), to_data(&out.statuses)?);
    Ok((Value::Object(data), meta))
}

fn command_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::Mailboxes => "mailboxes",
        Command::Inbox(_) => "inbox",
        Command::Get(_) => "get",
        Command::Thread(_) => "thread",
        Command::Read(_) => "read",
        Command::Unread(_) => "unread",
        Command::Flag(_) => "flag",
        Command::Unflag(_) => "unflag",
        Command::Move(_) => "move",
        Command::Trash(_) => "trash",
        Command::Delete(_) => "delete",
        Command::Drafts { command: sub } => match sub {
            DraftsCommand::Save(_) => "drafts.save",
            DraftsCommand::Update(_) => "drafts.update",
            DraftsCommand::Delete(_) => "drafts.delete",
        },
        Command::Send(_) => "send",
        Command::ReplyContext(_) => "reply-context",
        Command::ForwardContext(_) => "forward-context",
        Command::Identities { command: sub } => match sub {
            IdentitiesCommand::List => "identities.list",
            IdentitiesCommand::Add(_) => "identities.add",
            IdentitiesCommand::Remove(_) => "identities.remove",
        },
    }
}
