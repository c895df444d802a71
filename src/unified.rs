//! Unified views over every mail account a user owns.

pub mod compose;
pub mod inbox;
pub mod mailboxes;
pub mod mutate;
pub mod read;
pub mod view;

use std::sync::Arc;

use crate::credentials::CredentialResolver;
use crate::error::MailError;
use crate::fanout::{FanOut, Gathered};
use crate::identity::Identity;

pub use compose::{Draft, DraftSaved, Sent};
pub use inbox::{InboxPage, InboxRequest};
pub use mutate::{Mutation, MutationPlan, MutationReport};
pub use view::{Aggregated, UnifiedEmail, UnifiedMailbox};

pub struct Unified {
    resolver: Arc<CredentialResolver>,
    fanout: FanOut,
}

impl Unified {
    pub fn new(resolver: CredentialResolver, fanout: FanOut) -> Self {
        Self {
            resolver: Arc::new(resolver),
            fanout,
        }
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// The user's identities that have a remote account behind them.
    fn provisioned(&self, user_id: i64) -> Result<Vec<Identity>, MailError> {
        Ok(self
            .resolver
            .store()
            .identities(user_id)?
            .into_iter()
            .filter(Identity::is_provisioned)
            .collect())
    }
}

fn aggregate<T, U>(gathered: Gathered<T>, build: impl FnOnce(Vec<(Identity, T)>) -> U) -> Result<Aggregated<U>, MailError> {
    let warning = gathered.verdict()?;
    let statuses = gathered.statuses();
    Ok(Aggregated {
        data: build(gathered.results),
        statuses,
        warning,
    })
}
