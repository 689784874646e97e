use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Reading from the source failed; nothing was written.
    Read,
    /// The secret was read but writing it to the destination failed.
    Write,
    /// The copy task panicked before producing an outcome.
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Read => "read failed",
            FailureKind::Write => "write failed",
            FailureKind::Aborted => "aborted",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyFailure {
    pub path: String,
    pub kind: FailureKind,
    pub cause: String,
}

/// Result of copying a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The secret was read; `skipped_write` is set when a dry run left the
    /// destination untouched.
    Copied { path: String, skipped_write: bool },
    Failed(CopyFailure),
}

/// Outcome of one migration pass over a single mount.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MountReport {
    pub mount: String,
    pub succeeded: usize,
    /// Successes that were read but deliberately not written.
    pub skipped_writes: usize,
    pub failures: Vec<CopyFailure>,
}

impl MountReport {
    pub fn new(mount: impl Into<String>) -> Self {
        Self {
            mount: mount.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: CopyOutcome) {
        match outcome {
            CopyOutcome::Copied { skipped_write, .. } => {
                self.succeeded += 1;
                if skipped_write {
                    self.skipped_writes += 1;
                }
            }
            CopyOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    /// Paths attempted in this pass.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failures.len()
    }
}

/// Aggregated outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RunReport {
    pub mounts: Vec<MountReport>,
    pub cancelled: bool,
    pub dry_run: bool,
}

impl From<MountReport> for RunReport {
    fn from(mount: MountReport) -> Self {
        RunReport {
            mounts: vec![mount],
            ..Default::default()
        }
    }
}

impl RunReport {
    pub fn merge(mut self, other: RunReport) -> RunReport {
        self.mounts.extend(other.mounts);
        self.cancelled |= other.cancelled;
        self.dry_run |= other.dry_run;
        self
    }

    pub fn succeeded(&self) -> usize {
        self.mounts.iter().map(|mount| mount.succeeded).sum()
    }

    pub fn skipped_writes(&self) -> usize {
        self.mounts.iter().map(|mount| mount.skipped_writes).sum()
    }

    pub fn failed(&self) -> usize {
        self.mounts.iter().map(|mount| mount.failures.len()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &CopyFailure)> {
        self.mounts.iter().flat_map(|mount| {
            mount
                .failures
                .iter()
                .map(move |failure| (mount.mount.as_str(), failure))
        })
    }

    /// No copy failed and the run was not interrupted.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && !self.cancelled
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for mount in &self.mounts {
            write!(
                f,
                "{}: {} copied, {} failed",
                mount.mount,
                mount.succeeded,
                mount.failures.len()
            )?;
            if mount.skipped_writes > 0 {
                write!(f, " ({} writes skipped)", mount.skipped_writes)?;
            }
            writeln!(f)?;
        }
        for (mount, failure) in self.failures() {
            writeln!(
                f,
                "  [{mount}] {} ({}): {}",
                failure.path, failure.kind, failure.cause
            )?;
        }
        if self.cancelled {
            writeln!(f, "run cancelled before all paths were attempted")?;
        }
        if self.dry_run {
            writeln!(f, "dry run: nothing was written to the destination")?;
        }
        write!(
            f,
            "total: {} copied, {} failed",
            self.succeeded(),
            self.failed()
        )
    }
}
