//! Runs one operation per identity concurrently and collects what succeeded.
//!
//! Concurrency is capped by a semaphore at `min(identities, limit)`. Each task
//! reports into one of two channels sized to the identity count; the executor
//! waits for every task, so a failing or slow identity never cancels its
//! siblings. The deadline applies to each task separately, queueing time for a
//! permit included.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::error::{ErrorOut, MailError};
use crate::identity::Identity;

pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    concurrency: usize,
    deadline: Duration,
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, DEFAULT_DEADLINE)
    }
}

/// Whether one identity's contribution made it into an aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityStatus {
    #[serde(rename = "identityId")]
    pub identity_id: i64,
    /// Absent for identities the user does not own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

#[derive(Debug)]
pub struct Gathered<T> {
    /// Successful results in the order identities were given.
    pub results: Vec<(Identity, T)>,
    pub failures: Vec<(Identity, MailError)>,
    attempted: Vec<Identity>,
}

impl<T> Gathered<T> {
    pub fn attempted(&self) -> usize {
        self.attempted.len()
    }

    pub fn statuses(&self) -> Vec<IdentityStatus> {
        self.attempted
            .iter()
            .map(|identity| {
                let error = self
                    .failures
                    .iter()
                    .find(|(i, _)| i.id == identity.id)
                    .map(|(_, e)| ErrorOut::from(e).for_identity(identity.id));
                IdentityStatus {
                    identity_id: identity.id,
                    email: Some(identity.email.clone()),
                    ok: error.is_none(),
                    error,
                }
            })
            .collect()
    }

    /// `AllIdentitiesFailed` when nothing succeeded out of at least one
    /// attempt; otherwise a `PartialFailure` warning when something failed.
    pub fn verdict(&self) -> Result<Option<MailError>, MailError> {
        let attempted = self.attempted();
        if attempted > 0 && self.results.is_empty() {
            return Err(MailError::AllIdentitiesFailed { attempted });
        }
        if self.failures.is_empty() {
            Ok(None)
        } else {
            Ok(Some(MailError::PartialFailure {
                failed: self.failures.len(),
                attempted,
            }))
        }
    }
}

impl FanOut {
    pub fn new(concurrency: usize, deadline: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            deadline,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run<T, F, Fut>(&self, identities: Vec<Identity>, op: F) -> Gathered<T>
    where
        T: Send + 'static,
        F: Fn(Identity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, MailError>> + Send + 'static,
    {
        let n = identities.len();
        if n == 0 {
            return Gathered {
                results: Vec::new(),
                failures: Vec::new(),
                attempted: Vec::new(),
            };
        }

        let permits = Arc::new(Semaphore::new(self.concurrency.min(n)));
        let (ok_tx, mut ok_rx) = mpsc::channel::<(usize, T)>(n);
        let (err_tx, mut err_rx) = mpsc::channel::<(usize, MailError)>(n);
        let deadline = Instant::now() + self.deadline;
        let op = Arc::new(op);
        let mut tasks = JoinSet::new();

        debug!(identities = n, permits = self.concurrency.min(n), "fan-out start");

        for (index, identity) in identities.iter().cloned().enumerate() {
            let permits = Arc::clone(&permits);
            let op = Arc::clone(&op);
            let ok_tx = ok_tx.clone();
            let err_tx = err_tx.clone();
            tasks.spawn(async move {
                let identity_id = identity.id;
                let work = async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| MailError::protocol("fan-out pool closed"))?;
                    op(identity).await
                };
                let outcome = match timeout_at(deadline, work).await {
                    Ok(r) => r,
                    Err(_) => Err(MailError::timeout(format!("identity {identity_id} exceeded deadline"))),
                };
                match outcome {
                    Ok(v) => {
                        let _ = ok_tx.send((index, v)).await;
                    }
                    Err(e) => {
                        warn!(identity_id, kind = e.kind(), error = %e, "identity skipped");
                        let _ = err_tx.send((index, e)).await;
                    }
                }
            });
        }
        drop(ok_tx);
        drop(err_tx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "fan-out task aborted");
            }
        }

        let mut ok: Vec<(usize, T)> = Vec::with_capacity(n);
        while let Some(item) = ok_rx.recv().await {
            ok.push(item);
        }
        let mut failed: Vec<(usize, MailError)> = Vec::new();
        while let Some(item) = err_rx.recv().await {
            failed.push(item);
        }

        // A task that panicked reported on neither channel.
        let mut reported = vec![false; n];
        for i in ok.iter().map(|(i, _)| *i).chain(failed.iter().map(|(i, _)| *i)) {
            reported[i] = true;
        }
        for (i, seen) in reported.iter().enumerate() {
            if !seen {
                failed.push((i, MailError::protocol(format!("task for identity {} aborted", identities[i].id))));
            }
        }

        ok.sort_by_key(|(i, _)| *i);
        failed.sort_by_key(|(i, _)| *i);

        debug!(succeeded = ok.len(), failed = failed.len(), "fan-out done");

        Gathered {
            results: ok.into_iter().map(|(i, v)| (identities[i].clone(), v)).collect(),
            failures: failed.into_iter().map(|(i, e)| (identities[i].clone(), e)).collect(),
            attempted: identities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn identities(n: i64) -> Vec<Identity> {
        (1..=n)
            .map(|id| Identity {
                id,
                user_id: 1,
                domain_id: 1,
                email: format!("u{id}@x.org"),
                display_name: String::new(),
                encrypted_password: None,
                remote_account_ref: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn one_failure_does_not_sink_the_rest() {
        let out = FanOut::default()
            .run(identities(4), |i| async move {
                if i.id == 3 {
                    Err(MailError::network("connection reset"))
                } else {
                    Ok(i.id * 10)
                }
            })
            .await;

        let got: Vec<i64> = out.results.iter().map(|(_, v)| *v).collect();
        assert_eq!(got, vec![10, 20, 40]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].0.id, 3);

        let statuses = out.statuses();
        assert_eq!(statuses.len(), 4);
        assert!(!statuses[2].ok);
        assert_eq!(statuses[2].error.as_ref().map(|e| e.kind.as_str()), Some("networkError"));

        match out.verdict() {
            Ok(Some(MailError::PartialFailure { failed: 1, attempted: 4 })) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_failing_is_an_error() {
        let out = FanOut::default()
            .run(identities(2), |_| async { Err::<(), _>(MailError::network("down")) })
            .await;
        assert!(matches!(out.verdict(), Err(MailError::AllIdentitiesFailed { attempted: 2 })));
    }

    #[tokio::test]
    async fn empty_input_is_a_clean_success() {
        let out = FanOut::default().run(Vec::new(), |_| async { Ok(()) }).await;
        assert!(out.results.is_empty());
        assert!(matches!(out.verdict(), Ok(None)));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (l, p) = (live.clone(), peak.clone());

        let out = FanOut::new(3, Duration::from_secs(5))
            .run(identities(10), move |_| {
                let (live, peak) = (l.clone(), p.clone());
                async move {
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    live.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert_eq!(out.results.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_identity_times_out_alone() {
        let out = FanOut::new(16, Duration::from_secs(2))
            .run(identities(3), |i| async move {
                if i.id == 2 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(i.id)
            })
            .await;

        let got: Vec<i64> = out.results.iter().map(|(_, v)| *v).collect();
        assert_eq!(got, vec![1, 3]);
        assert_eq!(out.failures[0].1.kind(), "timeout");
        assert!(out.failures[0].1.is_retryable());
    }

    #[tokio::test]
    async fn panicking_task_is_reported_as_failure() {
        let out = FanOut::default()
            .run(identities(2), |i| async move {
                if i.id == 1 {
                    panic!("boom");
                }
                Ok(i.id)
            })
            .await;
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].0.id, 1);
    }
}
