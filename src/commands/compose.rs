use serde_json::json;

use unimail::MailError;
use unimail::composite;
use unimail::jmap::EmailAddress;
use unimail::unified::Draft;

use super::{Context, Outcome, to_data};
use crate::cli::{ComposeArgs, DraftsUpdateArgs, IdArgs, ReplyContextArgs};
use crate::config::{read_json_arg, read_text_arg};
use crate::output::Meta;

/// `Name <addr>` or a bare `addr`.
fn parse_address(raw: &str) -> Result<EmailAddress, MailError> {
    let raw = raw.trim();
    let (name, email) = match (raw.rfind('<'), raw.ends_with('>')) {
        (Some(open), true) => {
            let name = raw[..open].trim().trim_matches('"').trim();
            (
                (!name.is_empty()).then(|| name.to_string()),
                raw[open + 1..raw.len() - 1].trim(),
            )
        }
        _ => (None, raw),
    };
    if !email.contains('@') {
        return Err(MailError::usage(format!("invalid email address: {raw}")));
    }
    Ok(EmailAddress {
        name,
        email: email.to_string(),
    })
}

fn addresses(raw: &[String]) -> Result<Vec<EmailAddress>, MailError> {
    raw.iter().map(|s| parse_address(s)).collect()
}

fn draft_from(args: &ComposeArgs) -> Result<Draft, MailError> {
    let mut draft: Draft = match &args.message {
        Some(m) => serde_json::from_value(read_json_arg(m)?)
            .map_err(|e| MailError::usage(format!("invalid message: {e}")))?,
        None => Draft::default(),
    };

    if let Some(id) = args.identity {
        draft.identity_id = id;
    }
    if !args.to.is_empty() {
        draft.to = addresses(&args.to)?;
    }
    if !args.cc.is_empty() {
        draft.cc = addresses(&args.cc)?;
    }
    if !args.bcc.is_empty() {
        draft.bcc = addresses(&args.bcc)?;
    }
    if let Some(s) = &args.subject {
        draft.subject = s.clone();
    }
    if let Some(t) = &args.text {
        draft.text_body = Some(read_text_arg(t)?);
    }
    if let Some(h) = &args.body_html {
        draft.html_body = Some(read_text_arg(h)?);
    }
    Ok(draft)
}

fn require_identity(draft: &Draft) -> Result<(), MailError> {
    if draft.identity_id == 0 {
        return Err(MailError::usage("missing sending identity; pass --identity"));
    }
    Ok(())
}

pub async fn save(ctx: &Context, args: &ComposeArgs, dry_run: bool) -> Outcome {
    let draft = draft_from(args)?;
    require_identity(&draft)?;
    if dry_run {
        return Ok((json!({ "dryRun": true, "draft": to_data(&draft)? }), Meta::default()));
    }
    let saved = ctx.unified.save_draft(ctx.user_id, &draft).await?;
    Ok((to_data(&saved)?, Meta::default()))
}

pub async fn update(ctx: &Context, args: &DraftsUpdateArgs, dry_run: bool) -> Outcome {
    let draft = draft_from(&args.compose)?;
    if dry_run {
        let old = composite::decode(&args.id)?;
        return Ok((
            json!({ "dryRun": true, "replaces": old, "draft": to_data(&draft)? }),
            Meta::default(),
        ));
    }
    let saved = ctx.unified.update_draft(ctx.user_id, &args.id, &draft).await?;
    let meta = Meta {
        warnings: saved.warning.as_ref().map(|w| vec![w.to_string()]),
        ..Meta::default()
    };
    Ok((to_data(&saved)?, meta))
}

pub async fn delete(ctx: &Context, args: &IdArgs, dry_run: bool) -> Outcome {
    if dry_run {
        let id = composite::decode(&args.id)?;
        return Ok((json!({ "dryRun": true, "deleted": id }), Meta::default()));
    }
    let id = ctx.unified.delete_draft(ctx.user_id, &args.id).await?;
    Ok((json!({ "deleted": id }), Meta::default()))
}

pub async fn send(ctx: &Context, args: &ComposeArgs, dry_run: bool) -> Outcome {
    let draft = draft_from(args)?;
    require_identity(&draft)?;
    if draft.to.is_empty() && draft.cc.is_empty() && draft.bcc.is_empty() {
        return Err(MailError::usage("at least one recipient is required"));
    }
    if dry_run {
        return Ok((json!({ "dryRun": true, "draft": to_data(&draft)? }), Meta::default()));
    }
    let sent = ctx.unified.send(ctx.user_id, &draft).await?;
    Ok((to_data(&sent)?, Meta::default()))
}

pub async fn reply_context(ctx: &Context, args: &ReplyContextArgs) -> Outcome {
    let draft = ctx.unified.reply_context(ctx.user_id, &args.id, args.all).await?;
    Ok((to_data(&draft)?, Meta::default()))
}

pub async fn forward_context(ctx: &Context, args: &IdArgs) -> Outcome {
    let draft = ctx.unified.forward_context(ctx.user_id, &args.id).await?;
    Ok((to_data(&draft)?, Meta::default()))
}
