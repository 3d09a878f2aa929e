//! Bounded concurrent fan-out of one action over many targets.
//!
//! Every remote call made on behalf of a job is gated by a shared semaphore,
//! so nested fan-outs (rooms, then members of each room) stay within the
//! same global bound. Outer fan-outs never hold a permit themselves.

use crate::client::ClientError;
use futures_util::stream::{self, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// What happened to a single target.
#[derive(Debug)]
pub enum TargetOutcome {
    Succeeded,
    /// The guard refused the target; no remote call was made.
    SkippedIsAdmin,
    Failed(ClientError),
}

/// Per-target outcomes of a job. Not transactional.
#[derive(Debug)]
pub struct BulkReport<T> {
    pub entries: Vec<(T, TargetOutcome)>,
}

impl<T> Default for BulkReport<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> BulkReport<T> {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::SkippedIsAdmin))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Failed(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: BulkReport<T>) {
        self.entries.extend(other.entries);
    }

    /// One-line human summary, e.g. `banned 3, skipped 1 moderator, 1 failed`.
    pub fn summary(&self, verb: &str) -> String {
        let mut out = format!("{verb} {}", self.succeeded());
        let skipped = self.skipped();
        if skipped > 0 {
            let noun = if skipped == 1 { "moderator" } else { "moderators" };
            out.push_str(&format!(", skipped {skipped} {noun}"));
        }
        let failed = self.failed();
        if failed > 0 {
            out.push_str(&format!(", {failed} failed"));
        }
        out
    }

    fn count(&self, pred: impl Fn(&TargetOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Bounded fan-out executor shared by every bulk operation of a command.
#[derive(Debug, Clone)]
pub struct BulkActionJob {
    limit: usize,
    permits: Arc<Semaphore>,
}

impl BulkActionJob {
    pub fn new(concurrency: usize) -> Self {
        let limit = concurrency.max(1);
        Self {
            limit,
            permits: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Run a single remote call under the shared bound.
    pub async fn gated<F: Future>(&self, call: F) -> F::Output {
        // The semaphore is never closed, so acquire only fails if it is.
        let _permit = self.permits.acquire().await.ok();
        call.await
    }

    /// Fan `f` out over `items` without taking a permit. Leaf calls made
    /// inside `f` should go through [`gated`](Self::gated) or [`run`](Self::run).
    pub async fn for_each<I, F, Fut>(&self, items: I, f: F) -> Vec<Fut::Output>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future,
    {
        stream::iter(items)
            .map(f)
            .buffer_unordered(self.limit)
            .collect()
            .await
    }

    /// Apply `action` to every target the guard accepts.
    ///
    /// Outcomes are recorded in completion order; one failure never stops
    /// its siblings.
    pub async fn run<T, I, G, A, Fut>(&self, targets: I, guard: G, action: A) -> BulkReport<T>
    where
        I: IntoIterator<Item = T>,
        T: Clone + fmt::Display,
        G: Fn(&T) -> bool,
        A: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        let guard = &guard;
        let action = &action;

        let entries = self
            .for_each(targets, move |target| async move {
                if !guard(&target) {
                    debug!(target = %target, "skipping guarded target");
                    return (target, TargetOutcome::SkippedIsAdmin);
                }
                match self.gated(action(target.clone())).await {
                    Ok(()) => (target, TargetOutcome::Succeeded),
                    Err(e) => {
                        warn!(target = %target, error = %e, code = e.error_code(), "bulk action failed");
                        (target, TargetOutcome::Failed(e))
                    }
                }
            })
            .await;

        BulkReport { entries }
    }
}
