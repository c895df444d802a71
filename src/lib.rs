//! Aggregates several JMAP mail accounts owned by one user into a single
//! mailbox list, a single newest-first inbox and one id space.
//!
//! Every remote object is addressed by a [`composite::CompositeId`]
//! (`<identity>:<remote id>`), which routes follow-up calls back to the
//! account that owns it. Fan-out reads tolerate individual accounts failing;
//! see [`fanout`].

pub mod composite;
pub mod credentials;
pub mod error;
pub mod fanout;
pub mod identity;
pub mod jmap;
pub mod secret;
pub mod unified;

pub use composite::CompositeId;
pub use credentials::CredentialResolver;
pub use error::{ErrorOut, MailError};
pub use fanout::FanOut;
pub use identity::{Directory, Identity, IdentityStore};
pub use unified::Unified;
