//! Optional-artifact policy.
//!
//! Presence requirements live on the bucket as data. This module is the one
//! place that turns "matched nothing" into either a skip or a failure.

use crate::classify::ClassifiedBucket;
use crate::error::InstallError;

/// What to do with one classified bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Matched at least one entry.
    Stage,
    /// Optional and empty.
    Skip,
    /// Mandatory and empty.
    Missing,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Skip => "skip",
            Self::Missing => "missing",
        }
    }
}

pub fn decide(bucket: &ClassifiedBucket) -> Decision {
    match (bucket.is_empty(), bucket.spec.is_optional()) {
        (false, _) => Decision::Stage,
        (true, true) => Decision::Skip,
        (true, false) => Decision::Missing,
    }
}

/// Filter `classified` down to the buckets that should be staged.
///
/// Every bucket is checked before anything is returned, so a missing
/// mandatory bucket fails the install before a single file is copied.
///
/// # Errors
///
/// Returns [`InstallError::MissingArtifact`] for the first mandatory bucket,
/// in plan order, that matched nothing.
pub fn apply(classified: Vec<ClassifiedBucket>) -> Result<Vec<ClassifiedBucket>, InstallError> {
    let mut passing = Vec::with_capacity(classified.len());
    for bucket in classified {
        match decide(&bucket) {
            Decision::Stage => passing.push(bucket),
            Decision::Skip => {
                tracing::debug!(bucket = %bucket.spec.name, "optional bucket empty, skipping");
            }
            Decision::Missing => {
                return Err(InstallError::MissingArtifact {
                    bucket: bucket.spec.name,
                });
            }
        }
    }
    Ok(passing)
}
