//! Identity records live in the local store; none of these commands talk to
//! a mail server.

use std::fs;

use serde_json::{Value, json};
use tracing::info;

use unimail::error::MailError;
use unimail::secret::AesGcmSecret;
use unimail::unified::view::domain_color;
use unimail::{Directory, Identity, IdentityStore};

use crate::app_config::{self, expand_user_path};
use crate::cli::{IdentitiesAddArgs, IdentitiesCommand};
use crate::config;
use crate::output::{Envelope, Meta};

fn view(dir: &Directory, identity: &Identity) -> Value {
    let domain = dir.domain_name(identity.domain_id).ok().flatten().unwrap_or_default();
    json!({
        "id": identity.id,
        "email": identity.email,
        "displayName": identity.display_name,
        "domainId": identity.domain_id,
        "domainName": domain,
        "domainColor": domain_color(&domain),
        "provisioned": identity.is_provisioned(),
        "hasPassword": identity.encrypted_password.is_some(),
    })
}

fn read_password(args: &IdentitiesAddArgs) -> Result<String, MailError> {
    let password = match (&args.password, &args.password_file) {
        (Some(p), _) => p.clone(),
        (None, Some(path)) => {
            let p = expand_user_path(path)?;
            fs::read_to_string(&p)
                .map_err(|e| MailError::usage(format!("failed to read password file: {e}")))?
                .trim_end_matches(['\r', '\n'])
                .to_string()
        }
        (None, None) => {
            return Err(MailError::usage(
                "missing password; pass --password-file or set UNIMAIL_IDENTITY_PASSWORD",
            ));
        }
    };
    if password.is_empty() {
        return Err(MailError::usage("password is empty"));
    }
    Ok(password)
}

fn add(store: &mut app_config::Store, user_id: i64, args: &IdentitiesAddArgs) -> Result<Value, MailError> {
    let email = args.email.trim().to_string();
    let Some((_, host)) = email.rsplit_once('@').filter(|(local, host)| !local.is_empty() && !host.is_empty())
    else {
        return Err(MailError::usage(format!("invalid email address: {email}")));
    };
    if store
        .directory
        .identities
        .iter()
        .any(|i| i.user_id == user_id && i.email.eq_ignore_ascii_case(&email))
    {
        return Err(MailError::usage(format!("identity {email} already exists")));
    }

    let key = config::resolve_encryption_key(&store.settings)?;
    let sealed = AesGcmSecret::new(&key)?.encrypt(&read_password(args)?)?;

    let domain_id = store.directory.ensure_domain(host);
    let identity = Identity {
        id: store.directory.next_identity_id(),
        user_id,
        domain_id,
        email: email.clone(),
        display_name: args.display_name.clone(),
        encrypted_password: Some(sealed),
        remote_account_ref: Some(args.account_ref.clone().unwrap_or(email)),
    };
    let out = view(&store.directory, &identity);
    info!(identity_id = identity.id, user_id, "identity added");
    store.directory.identities.push(identity);
    Ok(out)
}

fn execute(user_flag: Option<i64>, sub: &IdentitiesCommand) -> Result<(i64, Value), (Option<i64>, MailError)> {
    let (mut store, path) = app_config::read_store().map_err(|e| (user_flag, e))?;
    let user_id = config::resolve_user(user_flag, &store.settings).map_err(|e| (user_flag, e))?;
    let fail = |e| (Some(user_id), e);

    let data = match sub {
        IdentitiesCommand::List => {
            let identities = store.directory.identities(user_id).map_err(fail)?;
            let list: Vec<Value> = identities.iter().map(|i| view(&store.directory, i)).collect();
            json!({ "identities": list })
        }
        IdentitiesCommand::Add(args) => {
            let added = add(&mut store, user_id, args).map_err(fail)?;
            app_config::write_store(&store, &path).map_err(fail)?;
            json!({ "identity": added })
        }
        IdentitiesCommand::Remove(args) => {
            let removed = store.directory.remove_identity(args.id, user_id).map_err(fail)?;
            app_config::write_store(&store, &path).map_err(fail)?;
            info!(identity_id = removed.id, user_id, "identity removed");
            json!({ "removed": removed.id, "email": removed.email })
        }
    };
    Ok((user_id, data))
}

pub fn run(command: &str, user_flag: Option<i64>, sub: &IdentitiesCommand) -> Envelope<Value> {
    match execute(user_flag, sub) {
        Ok((user_id, data)) => Envelope::ok(command, Some(user_id), data, Meta::default()),
        Err((user, e)) => Envelope::err(command, user, e),
    }
}
