//! Bounded-concurrency copy of a path set from one session to another.
//!
//! A fixed pool of worker tasks drains a shared queue of paths. Each worker
//! sends exactly one [`CopyOutcome`] per path it takes over an mpsc channel;
//! the calling task is the only one that touches the [`MountReport`].

use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::enumerate::PathSet;
use crate::report::{CopyFailure, CopyOutcome, FailureKind, MountReport};
use crate::session::Session;

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Number of copy workers per pass. Zero is treated as one.
    pub concurrency: usize,
    /// Read every secret but skip the destination write.
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
        }
    }
}

/// Cooperative cancellation flag shared by every pass of a run.
///
/// Once triggered, workers finish the copy they are on and take no new paths.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Copy every path from `source` to `destination`.
///
/// Per-secret failures are recorded in the returned report and never abort
/// the pass. Paths not yet taken when `shutdown` fires are left out of the
/// report entirely.
pub async fn migrate(
    source: &Session,
    destination: &Session,
    mount: &str,
    paths: PathSet,
    options: MigrationOptions,
    shutdown: &Shutdown,
) -> MountReport {
    let mut report = MountReport::new(mount);
    if paths.is_empty() {
        return report;
    }

    let workers = options.concurrency.clamp(1, paths.len());
    let queue = Arc::new(Mutex::new(VecDeque::from(paths)));
    let (tx, mut rx) = mpsc::channel::<CopyOutcome>(workers * 2);

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let worker = Worker {
            source: source.clone(),
            destination: destination.clone(),
            queue: Arc::clone(&queue),
            outcomes: tx.clone(),
            shutdown: shutdown.clone(),
            dry_run: options.dry_run,
        };
        handles.push(tokio::spawn(worker.run()));
    }
    drop(tx);

    while let Some(outcome) = rx.recv().await {
        report.record(outcome);
    }
    for handle in handles {
        if let Err(err) = handle.await {
            warn!(%mount, error = %err, "copy worker terminated abnormally");
        }
    }

    info!(
        %mount,
        copied = report.succeeded,
        failed = report.failures.len(),
        "migration pass finished"
    );
    report
}

struct Worker {
    source: Session,
    destination: Session,
    queue: Arc<Mutex<VecDeque<String>>>,
    outcomes: mpsc::Sender<CopyOutcome>,
    shutdown: Shutdown,
    dry_run: bool,
}

impl Worker {
    async fn run(self) {
        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            let Some(path) = self.next_path() else {
                break;
            };
            let outcome = AssertUnwindSafe(self.copy(&path))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    CopyOutcome::Failed(CopyFailure {
                        path: path.clone(),
                        kind: FailureKind::Aborted,
                        cause: panic_message(panic.as_ref()),
                    })
                });
            if self.outcomes.send(outcome).await.is_err() {
                break;
            }
        }
    }

    fn next_path(&self) -> Option<String> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    async fn copy(&self, path: &str) -> CopyOutcome {
        let record = match self.source.read(path).await {
            Ok(record) => record,
            Err(err) => {
                warn!(%path, source = self.source.address(), error = %err, "read failed");
                return failed(path, FailureKind::Read, err.to_string());
            }
        };

        if self.dry_run {
            info!(
                target = "audit",
                action = "sync.dry_run",
                source = self.source.address(),
                destination = self.destination.address(),
                %path,
                fields = record.len(),
                "~> would write secret"
            );
            return CopyOutcome::Copied {
                path: path.to_string(),
                skipped_write: true,
            };
        }

        if let Err(err) = self.destination.write(path, &record).await {
            warn!(
                %path,
                destination = self.destination.address(),
                error = %err,
                "write failed"
            );
            return failed(path, FailureKind::Write, err.to_string());
        }

        info!(
            target = "audit",
            action = "sync.copy",
            source = self.source.address(),
            destination = self.destination.address(),
            %path,
            "~> wrote secret"
        );
        CopyOutcome::Copied {
            path: path.to_string(),
            skipped_write: false,
        }
    }
}

fn failed(path: &str, kind: FailureKind, cause: String) -> CopyOutcome {
    CopyOutcome::Failed(CopyFailure {
        path: path.to_string(),
        kind,
        cause,
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("copy panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("copy panicked: {message}")
    } else {
        "copy panicked".to_string()
    }
}
