//! Bulk mutations over composite ids: one `Email/set` per identity touched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::Unified;
use super::view::Aggregated;
use crate::composite::{self, CompositeId};
use crate::error::{ErrorOut, MailError};
use crate::fanout::IdentityStatus;
use crate::jmap::types::{find_role, keyword, role};
use crate::jmap::{EmailSet, SetResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    MarkRead,
    MarkUnread,
    Flag,
    Unflag,
    /// Replace mailbox membership with `target`.
    Move { target: CompositeId },
    Trash,
    Destroy,
}

impl Mutation {
    pub fn action(&self) -> &'static str {
        match self {
            Mutation::MarkRead => "read",
            Mutation::MarkUnread => "unread",
            Mutation::Flag => "flag",
            Mutation::Unflag => "unflag",
            Mutation::Move { .. } => "move",
            Mutation::Trash => "trash",
            Mutation::Destroy => "delete",
        }
    }

    fn patch(&self, mailbox: Option<&str>) -> Value {
        match self {
            Mutation::MarkRead => json!({ format!("keywords/{}", keyword::SEEN): true }),
            Mutation::MarkUnread => json!({ format!("keywords/{}", keyword::SEEN): null }),
            Mutation::Flag => json!({ format!("keywords/{}", keyword::FLAGGED): true }),
            Mutation::Unflag => json!({ format!("keywords/{}", keyword::FLAGGED): null }),
            Mutation::Move { .. } | Mutation::Trash => {
                json!({ "mailboxIds": { mailbox.unwrap_or_default(): true } })
            }
            Mutation::Destroy => Value::Null,
        }
    }
}

/// An input id left out of the dispatch, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct Rejected {
    pub id: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedGroup {
    #[serde(rename = "identityId")]
    pub identity_id: i64,
    pub ids: Vec<CompositeId>,
}

/// Grouping and validation of a bulk mutation, before any I/O.
#[derive(Debug, Clone, Serialize)]
pub struct MutationPlan {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<CompositeId>,
    pub groups: Vec<PlannedGroup>,
    pub rejected: Vec<Rejected>,
    #[serde(skip)]
    mutation: Mutation,
}

pub fn plan(mutation: Mutation, ids: &[String]) -> MutationPlan {
    let target = match &mutation {
        Mutation::Move { target } => Some(target.clone()),
        _ => None,
    };
    let mut grouped: BTreeMap<i64, Vec<CompositeId>> = BTreeMap::new();
    let mut rejected = Vec::new();

    for raw in ids {
        let id = match composite::decode(raw) {
            Ok(id) => id,
            Err(e) => {
                rejected.push(Rejected {
                    id: raw.clone(),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        };
        if let Some(t) = &target {
            if t.identity_id != id.identity_id {
                rejected.push(Rejected {
                    id: raw.clone(),
                    kind: "crossIdentityMove".to_string(),
                    message: format!(
                        "email belongs to identity {}, target mailbox to identity {}",
                        id.identity_id, t.identity_id
                    ),
                });
                continue;
            }
        }
        let group = grouped.entry(id.identity_id).or_default();
        if !group.contains(&id) {
            group.push(id);
        }
    }

    MutationPlan {
        action: mutation.action(),
        target,
        groups: grouped
            .into_iter()
            .map(|(identity_id, ids)| PlannedGroup { identity_id, ids })
            .collect(),
        rejected,
        mutation,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedObject {
    pub id: CompositeId,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupOutcome {
    #[serde(rename = "identityId")]
    pub identity_id: i64,
    pub succeeded: Vec<CompositeId>,
    pub failed: Vec<FailedObject>,
    /// The whole group failed (credentials, session, transport).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationReport {
    pub action: &'static str,
    pub succeeded: usize,
    pub failed: usize,
    pub rejected: Vec<Rejected>,
    pub groups: Vec<GroupOutcome>,
}

impl GroupOutcome {
    fn from_set(identity_id: i64, destroy: bool, set: &SetResponse) -> Self {
        let ok = if destroy { set.destroyed_ids() } else { set.updated_ids() };
        Self {
            identity_id,
            succeeded: ok.iter().map(|r| CompositeId::new(identity_id, r.as_str())).collect(),
            failed: set
                .failures()
                .into_iter()
                .map(|f| FailedObject {
                    id: CompositeId::new(identity_id, f.id),
                    kind: f.error.kind,
                    description: f.error.description,
                })
                .collect(),
            error: None,
        }
    }

    fn errored(identity_id: i64, e: &MailError) -> Self {
        Self {
            identity_id,
            succeeded: Vec::new(),
            failed: Vec::new(),
            error: Some(ErrorOut::from(e).for_identity(identity_id)),
        }
    }
}

impl Unified {
    /// Dispatches a plan: exactly one `Email/set` per identity group (trash
    /// adds one `Mailbox/get` to find the trash mailbox). A failing group is
    /// reported and skipped; only all groups failing is an error.
    pub async fn apply(&self, user_id: i64, plan: MutationPlan) -> Result<Aggregated<MutationReport>, MailError> {
        let mut owned = Vec::new();
        let mut unowned: Vec<(i64, MailError)> = Vec::new();
        for g in &plan.groups {
            match self.resolver.identity(g.identity_id, user_id) {
                Ok(identity) => owned.push(identity),
                Err(e) => unowned.push((g.identity_id, e)),
            }
        }

        let remote_ids: Arc<BTreeMap<i64, Vec<String>>> = Arc::new(
            plan.groups
                .iter()
                .map(|g| (g.identity_id, g.ids.iter().map(|i| i.remote_id.clone()).collect()))
                .collect(),
        );
        let resolver = Arc::clone(&self.resolver);
        let mutation = plan.mutation.clone();

        let gathered = self
            .fanout
            .run(owned, move |identity| {
                let resolver = Arc::clone(&resolver);
                let remote_ids = Arc::clone(&remote_ids);
                let mutation = mutation.clone();
                async move {
                    let ids = remote_ids.get(&identity.id).cloned().unwrap_or_default();
                    let account = resolver.connect(&identity).await?;

                    let mailbox = match &mutation {
                        Mutation::Move { target } => Some(target.remote_id.clone()),
                        Mutation::Trash => {
                            let boxes = account.mailboxes().await?;
                            let trash = find_role(&boxes, role::TRASH)
                                .ok_or_else(|| MailError::NotFound(format!("trash mailbox for {}", identity.email)))?;
                            Some(trash.id.clone())
                        }
                        _ => None,
                    };

                    let mut set = EmailSet::default();
                    if mutation == Mutation::Destroy {
                        set.destroy = ids;
                    } else {
                        let patch = mutation.patch(mailbox.as_deref());
                        set.update = ids.into_iter().map(|id| (id, patch.clone())).collect();
                    }
                    account.set_emails(set).await
                }
            })
            .await;

        let destroy = plan.mutation == Mutation::Destroy;
        let mut by_identity: BTreeMap<i64, GroupOutcome> = BTreeMap::new();
        for (identity, set) in &gathered.results {
            by_identity.insert(identity.id, GroupOutcome::from_set(identity.id, destroy, set));
        }
        for (identity, e) in &gathered.failures {
            by_identity.insert(identity.id, GroupOutcome::errored(identity.id, e));
        }
        for (identity_id, e) in &unowned {
            warn!(identity_id, error = %e, "mutation group skipped");
            by_identity.insert(*identity_id, GroupOutcome::errored(*identity_id, e));
        }

        let mut statuses = gathered.statuses();
        statuses.extend(unowned.iter().map(|(identity_id, e)| IdentityStatus {
            identity_id: *identity_id,
            email: None,
            ok: false,
            error: Some(ErrorOut::from(e).for_identity(*identity_id)),
        }));
        statuses.sort_by_key(|s| s.identity_id);

        let groups: Vec<GroupOutcome> = by_identity.into_values().collect();
        let attempted = groups.len();
        let failed_groups = groups.iter().filter(|g| g.error.is_some()).count();
        if attempted > 0 && failed_groups == attempted {
            return Err(MailError::AllIdentitiesFailed { attempted });
        }
        let warning = (failed_groups > 0).then_some(MailError::PartialFailure {
            failed: failed_groups,
            attempted,
        });

        let report = MutationReport {
            action: plan.action,
            succeeded: groups.iter().map(|g| g.succeeded.len()).sum(),
            failed: groups.iter().map(|g| g.failed.len()).sum(),
            rejected: plan.rejected,
            groups,
        };
        info!(
            user_id,
            action = report.action,
            groups = attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            rejected = report.rejected.len(),
            "mutation dispatched"
        );

        Ok(Aggregated {
            data: report,
            statuses,
            warning,
        })
    }
}
