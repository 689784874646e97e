//! Rewrites KV v2 metadata paths into the data paths used for read and write.

use crate::types::{EngineKind, Mount};

const METADATA_SEGMENT: &str = "metadata";
const DATA_SEGMENT: &str = "data";

/// Rewrite `{mount}/metadata/...` to `{mount}/data/...`.
///
/// Only the namespace segment directly under the mount is touched, so a key
/// that happens to be named `metadata` deeper in the tree survives. Paths
/// outside the mount, and paths already under `data/`, are returned as is.
pub fn translate_versioned(mount: &str, path: &str) -> String {
    let mount = mount.trim_matches('/');
    let Some(rest) = path
        .strip_prefix(mount)
        .and_then(|rest| rest.strip_prefix('/'))
    else {
        return path.to_string();
    };
    let Some(tail) = rest.strip_prefix(METADATA_SEGMENT) else {
        return path.to_string();
    };
    if !(tail.is_empty() || tail.starts_with('/')) {
        return path.to_string();
    }
    format!("{mount}/{DATA_SEGMENT}{tail}")
}

/// Mount-aware translator applied to every enumerated path before copying.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    versioned: Vec<String>,
}

impl PathTranslator {
    pub fn new(mounts: &[Mount]) -> Self {
        let mut versioned: Vec<String> = mounts
            .iter()
            .filter(|mount| mount.engine() == EngineKind::Versioned)
            .map(|mount| mount.path().to_string())
            .collect();
        // Nested mounts: the most specific prefix wins.
        versioned.sort_by_key(|path| std::cmp::Reverse(path.len()));
        Self { versioned }
    }

    pub fn translate(&self, path: &str) -> String {
        self.versioned
            .iter()
            .find(|mount| {
                path.strip_prefix(mount.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(|mount| translate_versioned(mount, path))
            .unwrap_or_else(|| path.to_string())
    }
}

impl Default for PathTranslator {
    fn default() -> Self {
        Self::new(&Mount::defaults())
    }
}
