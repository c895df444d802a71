use super::Unified;
use super::view::{Owner, UnifiedEmail};
use crate::composite;
use crate::error::MailError;

impl Unified {
    /// One email with its bodies. No fan-out: only the owning identity is asked.
    pub async fn get_email(&self, user_id: i64, email_id: &str) -> Result<UnifiedEmail, MailError> {
        let id = composite::decode(email_id)?;
        let (identity, account) = self.resolver.connect_owned(id.identity_id, user_id).await?;
        let got = account.get_emails(std::slice::from_ref(&id.remote_id), true).await?;
        let email = got
            .list
            .into_iter()
            .find(|e| e.id == id.remote_id)
            .ok_or_else(|| MailError::NotFound(format!("email {email_id}")))?;
        let owner = Owner::of(self.resolver.store(), &identity);
        Ok(UnifiedEmail::project(&owner, email))
    }

    /// Every email of a thread, in thread order.
    pub async fn get_thread(&self, user_id: i64, thread_id: &str) -> Result<Vec<UnifiedEmail>, MailError> {
        let id = composite::decode(thread_id)?;
        let (identity, account) = self.resolver.connect_owned(id.identity_id, user_id).await?;
        let (_, emails) = account.thread(&id.remote_id).await?;
        let owner = Owner::of(self.resolver.store(), &identity);
        Ok(emails
            .into_iter()
            .map(|e| UnifiedEmail::project(&owner, e))
            .collect())
    }
}
