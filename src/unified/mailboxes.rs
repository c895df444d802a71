use std::sync::Arc;

use tracing::info;

use super::view::{Aggregated, Owner, UnifiedMailbox};
use super::{Unified, aggregate};
use crate::error::MailError;

impl Unified {
    /// Every mailbox of every provisioned identity, grouped by identity.
    pub async fn list_mailboxes(&self, user_id: i64) -> Result<Aggregated<Vec<UnifiedMailbox>>, MailError> {
        let identities = self.provisioned(user_id)?;
        let resolver = Arc::clone(&self.resolver);

        let gathered = self
            .fanout
            .run(identities, move |identity| {
                let resolver = Arc::clone(&resolver);
                async move {
                    let account = resolver.connect(&identity).await?;
                    let mailboxes = account.mailboxes().await?;
                    let owner = Owner::of(resolver.store(), &identity);
                    Ok(mailboxes
                        .into_iter()
                        .map(|m| UnifiedMailbox::project(&owner, m))
                        .collect::<Vec<_>>())
                }
            })
            .await;

        let out = aggregate(gathered, |results| {
            results.into_iter().flat_map(|(_, boxes)| boxes).collect::<Vec<_>>()
        })?;
        info!(user_id, mailboxes = out.data.len(), "listed mailboxes");
        Ok(out)
    }
}
