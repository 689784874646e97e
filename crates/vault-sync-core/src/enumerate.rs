//! Discovery of every leaf path below a mount root.
//!
//! The tree is walked with an explicit queue, so depth is bounded by memory
//! rather than by the call stack. Up to `fan_out` `LIST` calls are in flight
//! at once.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use tracing::debug;

use crate::errors::{Result, SyncError};
use crate::session::Session;

/// Leaf paths found under one root, sorted.
pub type PathSet = Vec<String>;

pub const DEFAULT_LIST_CONCURRENCY: usize = 8;

/// Expand `root` into every leaf path reachable by repeated listing.
///
/// Child keys ending in `/` are directories and are listed in turn; every
/// other key is a secret and becomes a leaf without another `LIST`. A name
/// can be both (`b` and `b/`), in which case the secret and everything below
/// the directory are kept. A listed path with no children is itself a leaf,
/// which makes an empty `root` the singleton result. A path that lists as
/// present but empty contributes nothing. The first failing `LIST` aborts
/// the walk; a partial set would be indistinguishable from a complete one.
pub async fn enumerate(session: &Session, root: &str, fan_out: usize) -> Result<PathSet> {
    let fan_out = fan_out.max(1);
    let mut pending = VecDeque::from([root.to_string()]);
    let mut in_flight = FuturesUnordered::new();
    let mut leaves = PathSet::new();

    loop {
        while in_flight.len() < fan_out {
            let Some(path) = pending.pop_front() else {
                break;
            };
            in_flight.push(async move {
                let listed = session.list(&path).await;
                (path, listed)
            });
        }

        let Some((path, listed)) = in_flight.next().await else {
            break;
        };
        match listed {
            Ok(None) => leaves.push(path),
            Ok(Some(children)) => {
                debug!(%path, children = children.len(), "expanding");
                for child in &children {
                    let full = child_path(&path, child);
                    if child.ends_with('/') {
                        pending.push_back(full);
                    } else {
                        leaves.push(full);
                    }
                }
            }
            Err(source) => return Err(SyncError::Enumeration { path, source }),
        }
    }

    leaves.sort();
    leaves.dedup();
    debug!(%root, leaves = leaves.len(), address = session.address(), "enumeration finished");
    Ok(leaves)
}

fn child_path(parent: &str, child: &str) -> String {
    if parent.ends_with('/') || parent.is_empty() {
        format!("{parent}{child}")
    } else {
        format!("{parent}/{child}")
    }
}
