use serde_json::json;

use unimail::composite;
use unimail::unified::{Mutation, MutationPlan, mutate};

use super::{Context, Outcome, to_data};
use crate::cli::Command;
use crate::output::Meta;

fn plan_for(cmd: &Command) -> Result<MutationPlan, unimail::MailError> {
    let (mutation, ids) = match cmd {
        Command::Read(a) => (Mutation::MarkRead, &a.ids),
        Command::Unread(a) => (Mutation::MarkUnread, &a.ids),
        Command::Flag(a) => (Mutation::Flag, &a.ids),
        Command::Unflag(a) => (Mutation::Unflag, &a.ids),
        Command::Trash(a) => (Mutation::Trash, &a.ids),
        Command::Delete(a) => (Mutation::Destroy, &a.ids),
        Command::Move(a) => (
            Mutation::Move {
                target: composite::decode(&a.to)?,
            },
            &a.ids,
        ),
        other => {
            return Err(unimail::MailError::usage(format!("{other:?} is not a mutation")));
        }
    };
    Ok(mutate::plan(mutation, ids))
}

fn rejected_warnings(plan: &MutationPlan) -> Vec<String> {
    plan.rejected
        .iter()
        .map(|r| format!("{} skipped: {}", r.id, r.message))
        .collect()
}

pub async fn run(ctx: &Context, cmd: &Command, dry_run: bool) -> Outcome {
    let plan = plan_for(cmd)?;

    if dry_run {
        let warnings = rejected_warnings(&plan);
        let meta = Meta {
            warnings: (!warnings.is_empty()).then_some(warnings),
            ..Default::default()
        };
        return Ok((json!({ "dryRun": true, "plan": to_data(&plan)? }), meta));
    }

    let mut warnings = rejected_warnings(&plan);
    let out = ctx.unified.apply(ctx.user_id, plan).await?;

    let meta = Meta::from_statuses(out.warning.as_ref(), &out.statuses);
    warnings.extend(meta.warnings.unwrap_or_default());
    for group in &out.data.groups {
        for f in &group.failed {
            warnings.push(format!("{} not changed: {}", f.id, f.kind));
        }
    }

    Ok((
        json!({
            "dryRun": false,
            "report": to_data(&out.data)?,
            "identities": to_data(&out.statuses)?,
        }),
        Meta {
            warnings: (!warnings.is_empty()).then_some(warnings),
            ..Default::default()
        },
    ))
}
