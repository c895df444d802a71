//! Minimal JMAP client: session discovery, batched method calls with
//! back-references, and the mail objects the unified views need.

pub mod client;
pub mod mail;
pub mod request;
pub mod response;
pub mod session;
pub mod types;

pub use client::{Credentials, JmapClient};
pub use mail::{EmailPage, EmailQuery, EmailSet, MailAccount};
pub use request::{Arguments, Request};
pub use response::{GetResponse, ObjectFailure, QueryResponse, SetError, SetResponse};
pub use session::Session;
pub use types::{Email, EmailAddress, Mailbox, Thread};
