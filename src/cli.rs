use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "unimail",
    version,
    about = "One inbox across every JMAP mail identity you own"
)]
pub struct Cli {
    /// Acting user (owner of the identities). Falls back to UNIMAIL_USER.
    #[arg(long, global = true)]
    pub user: Option<i64>,

    /// Show intended changes without applying.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Verbose logging (stderr).
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Every mailbox of every identity.
    Mailboxes,

    /// Unified inbox page, newest first.
    Inbox(InboxArgs),

    /// Get a single email, with bodies.
    Get(IdArgs),

    /// Every email of a thread.
    Thread(IdArgs),

    /// Mark emails as read.
    Read(IdsArgs),

    /// Mark emails as unread.
    Unread(IdsArgs),

    /// Flag emails.
    Flag(IdsArgs),

    /// Remove the flag from emails.
    Unflag(IdsArgs),

    /// Move emails to a mailbox of the same identity.
    Move(MoveArgs),

    /// Move emails to their identity's trash.
    Trash(IdsArgs),

    /// Permanently delete emails.
    Delete(DeleteArgs),

    /// Drafts operations.
    Drafts {
        #[command(subcommand)]
        command: DraftsCommand,
    },

    /// Send a message from one identity.
    Send(ComposeArgs),

    /// Pre-filled reply for an email.
    ReplyContext(ReplyContextArgs),

    /// Pre-filled forward for an email.
    ForwardContext(IdArgs),

    /// Local identity records.
    Identities {
        #[command(subcommand)]
        command: IdentitiesCommand,
    },
}

// --- Read

#[derive(Args, Debug, Default)]
pub struct InboxArgs {
    #[arg(long)]
    pub page: Option<u64>,

    #[arg(long = "page-size")]
    pub page_size: Option<u64>,

    /// Composite mailbox id; limits the query to its identity.
    #[arg(long)]
    pub mailbox: Option<String>,

    #[arg(long)]
    pub identity: Option<i64>,

    #[arg(long, allow_hyphen_values = true)]
    pub search: Option<String>,

    #[arg(long)]
    pub unread: bool,

    #[arg(long)]
    pub flagged: bool,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Composite id (`<identity>:<remote id>`).
    #[arg(value_name = "ID")]
    pub id: String,
}

// --- Organize

#[derive(Args, Debug)]
pub struct IdsArgs {
    #[arg(value_name = "ID", required = true, num_args = 1..)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    #[arg(value_name = "ID", required = true, num_args = 1..)]
    pub ids: Vec<String>,

    /// Composite id of the target mailbox.
    #[arg(long)]
    pub to: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[arg(value_name = "ID", required = true, num_args = 1..)]
    pub ids: Vec<String>,

    /// Required: deletion cannot be undone.
    #[arg(long)]
    pub force: bool,
}

// --- Compose

#[derive(Subcommand, Debug)]
pub enum DraftsCommand {
    /// Save a new draft.
    Save(ComposeArgs),

    /// Replace an existing draft.
    Update(DraftsUpdateArgs),

    /// Delete a draft.
    Delete(IdArgs),
}

/// A message given as JSON (`--message '{...}'` or `--message @file.json`),
/// individual flags, or both; flags override the JSON fields.
#[derive(Args, Debug, Default)]
pub struct ComposeArgs {
    #[arg(long)]
    pub message: Option<String>,

    /// Sending identity id.
    #[arg(long)]
    pub identity: Option<i64>,

    #[arg(long, num_args = 1..)]
    pub to: Vec<String>,

    #[arg(long, num_args = 1..)]
    pub cc: Vec<String>,

    #[arg(long, num_args = 1..)]
    pub bcc: Vec<String>,

    #[arg(long)]
    pub subject: Option<String>,

    /// Plain-text body (or @/path/to/body.txt).
    #[arg(long)]
    pub text: Option<String>,

    /// HTML body (or @/path/to/body.html).
    #[arg(long = "body-html")]
    pub body_html: Option<String>,
}

#[derive(Args, Debug)]
pub struct DraftsUpdateArgs {
    /// Composite id of the draft to replace.
    #[arg(value_name = "ID")]
    pub id: String,

    #[command(flatten)]
    pub compose: ComposeArgs,
}

#[derive(Args, Debug)]
pub struct ReplyContextArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// Reply to all recipients.
    #[arg(long)]
    pub all: bool,
}

// --- Identities

#[derive(Subcommand, Debug)]
pub enum IdentitiesCommand {
    /// Identities of the acting user.
    List,

    /// Add an identity; its password is stored encrypted.
    Add(IdentitiesAddArgs),

    /// Remove an identity.
    Remove(IdentitiesRemoveArgs),
}

#[derive(Args, Debug)]
pub struct IdentitiesAddArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long = "display-name", default_value = "")]
    pub display_name: String,

    #[arg(long, env = "UNIMAIL_IDENTITY_PASSWORD", hide_env_values = true, conflicts_with = "password_file")]
    pub password: Option<String>,

    #[arg(long = "password-file")]
    pub password_file: Option<String>,

    /// Remote account reference; defaults to the email address.
    #[arg(long = "account-ref")]
    pub account_ref: Option<String>,
}

#[derive(Args, Debug)]
pub struct IdentitiesRemoveArgs {
    #[arg(value_name = "IDENTITY_ID")]
    pub id: i64,
}
