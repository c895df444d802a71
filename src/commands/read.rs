use serde_json::json;

use unimail::unified::InboxRequest;

use super::{Context, Outcome, aggregated, to_data};
use crate::cli::{IdArgs, InboxArgs};
use crate::output::Meta;

pub async fn mailboxes(ctx: &Context) -> Outcome {
    let out = ctx.unified.list_mailboxes(ctx.user_id).await?;
    aggregated("mailboxes", out)
}

pub async fn inbox(ctx: &Context, args: &InboxArgs) -> Outcome {
    let req = InboxRequest {
        page: args.page,
        page_size: args.page_size,
        mailbox_id: args.mailbox.clone(),
        identity_id: args.identity,
        search: args.search.clone(),
        unread: args.unread,
        flagged: args.flagged,
    };
    let out = ctx.unified.inbox(ctx.user_id, &req).await?;

    let mut meta = Meta::from_statuses(out.warning.as_ref(), &out.statuses);
    if out.data.has_more {
        meta.next_page = Some(out.data.page + 1);
    }
    Ok((to_data(&out.data)?, meta))
}

pub async fn get(ctx: &Context, args: &IdArgs) -> Outcome {
    let email = ctx.unified.get_email(ctx.user_id, &args.id).await?;
    Ok((json!({ "email": to_data(&email)? }), Meta::default()))
}

pub async fn thread(ctx: &Context, args: &IdArgs) -> Outcome {
    let emails = ctx.unified.get_thread(ctx.user_id, &args.id).await?;
    Ok((
        json!({ "threadId": args.id, "emails": to_data(&emails)? }),
        Meta::default(),
    ))
}
