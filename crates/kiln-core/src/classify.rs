//! Artifact classification.
//!
//! Maps each bucket of the staging plan onto the files its pattern matches
//! in the post-build tree. Reads the filesystem, never writes it.
//!
//! Matching is non-recursive: `*` stops at `/`, and wildcards skip hidden
//! entries. A pattern without wildcards names one path, matched when that
//! path exists. Zero matches is always a valid result here; whether it is
//! acceptable is the policy's call.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use kiln_schema::BucketSpec;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// A bucket together with the concrete entries it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedBucket {
    pub spec: BucketSpec,
    /// Absolute paths, sorted.
    pub matches: Vec<PathBuf>,
}

impl ClassifiedBucket {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Classify every bucket of `plan` against `tree`, preserving plan order.
pub fn classify(tree: &Path, plan: &[BucketSpec]) -> Vec<ClassifiedBucket> {
    plan.iter()
        .map(|spec| {
            let matches = match_pattern(tree, &spec.source);
            tracing::debug!(bucket = %spec.name, matched = matches.len(), "classified");
            ClassifiedBucket {
                spec: spec.clone(),
                matches,
            }
        })
        .collect()
}

/// Entries of `tree` matching the relative `pattern`.
pub fn match_pattern(tree: &Path, pattern: &str) -> Vec<PathBuf> {
    if !has_wildcard(pattern) {
        let path = tree.join(pattern);
        return if path.symlink_metadata().is_ok() {
            vec![path]
        } else {
            Vec::new()
        };
    }

    let Some(root) = tree.to_str() else {
        tracing::warn!(tree = %tree.display(), "build tree path is not UTF-8, cannot glob");
        return Vec::new();
    };
    let full = format!("{}/{pattern}", Pattern::escape(root.trim_end_matches('/')));

    let entries = match glob::glob_with(&full, MATCH_OPTIONS) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(pattern = %full, "invalid pattern: {e}");
            return Vec::new();
        }
    };

    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                None
            }
        })
        .collect();
    matches.sort();
    matches
}

fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}
