//! Install orchestration typestate.
//!
//! Models an install as a series of explicit state transitions:
//!
//! ```text
//! Unbuilt --[build()]--> Built --[classify()]--> Classified --[stage()]--> Staged --[verify()]--> Verified
//! ```
//!
//! Each transition consumes the previous state, so steps cannot be skipped
//! or reordered, and a failed transition leaves nothing to continue from:
//! the host has to start again from [`Unbuilt`].
//!
//! # Usage
//!
//! ```ignore
//! let staged = Unbuilt::new(&recipe, &options)
//!     .build(&reporter)?
//!     .classify(&reporter)
//!     .stage(&reporter)?;
//! let verified = staged.verify(&reporter)?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_schema::{BucketSpec, Recipe, Version};

use crate::builder::Builder;
use crate::classify::{ClassifiedBucket, classify};
use crate::error::{BuildFailure, InstallError, Phase};
use crate::paths::build_log_path;
use crate::policy::{self, Decision};
use crate::receipt::InstallReceipt;
use crate::reporter::Reporter;
use crate::smoke::{SmokeOutcome, SmokeRunner};
use crate::stage::Stager;

/// Host-supplied knobs for one install.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Root of the unpacked source archive (the recipe's `workdir` is
    /// resolved against it).
    pub source: PathBuf,
    /// Installation prefix.
    pub prefix: PathBuf,
    /// Where build logs go. Rejected when inside `prefix`, so a failed
    /// build leaves the prefix empty.
    pub log_dir: PathBuf,
    /// Limit for the build and smoke processes. `None` waits forever.
    pub timeout: Option<Duration>,
}

/// State 1: nothing has run yet.
#[derive(Debug)]
pub struct Unbuilt<'a> {
    recipe: &'a Recipe,
    options: &'a InstallOptions,
}

/// State 2: the build succeeded and the tree holds its artifacts.
#[derive(Debug)]
pub struct Built<'a> {
    recipe: &'a Recipe,
    options: &'a InstallOptions,
    tree: PathBuf,
    log: PathBuf,
}

/// State 3: every bucket has its matched files.
#[derive(Debug)]
pub struct Classified<'a> {
    recipe: &'a Recipe,
    options: &'a InstallOptions,
    buckets: Vec<ClassifiedBucket>,
}

/// State 4: files are in the prefix and the receipt is written.
#[derive(Debug)]
pub struct Staged<'a> {
    recipe: &'a Recipe,
    options: &'a InstallOptions,
    receipt: InstallReceipt,
}

/// State 5: the installed toolchain ran the smoke program.
#[derive(Debug)]
pub struct Verified {
    pub receipt: InstallReceipt,
    pub smoke: SmokeOutcome,
}

impl<'a> Unbuilt<'a> {
    pub fn new(recipe: &'a Recipe, options: &'a InstallOptions) -> Self {
        Self { recipe, options }
    }

    /// Run the build inside the recipe's build tree.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Build`], including when the log directory
    /// lies inside the prefix; the prefix is left untouched.
    pub fn build(self, reporter: &dyn Reporter) -> Result<Built<'a>, InstallError> {
        let recipe = self.recipe;
        check_log_dir(self.options)?;
        if recipe.package.has_placeholder_checksum() {
            reporter.warning(&format!(
                "{} declares a placeholder checksum; the archive was not pinned",
                recipe.package.name
            ));
        }

        let tree = recipe.build_tree(&self.options.source);
        let version = recipe
            .package
            .version()
            .unwrap_or_else(|| Version::from("unknown"));
        let log = build_log_path(&self.options.log_dir, &recipe.package.name, &version);

        reporter.info(&format!(
            "Building {} {} in {}",
            recipe.package.name,
            version,
            tree.display()
        ));
        Builder::new(&recipe.build, &recipe.dependencies.build)
            .with_timeout(self.options.timeout)
            .build(&tree, &log)?;

        reporter.phase(Phase::Built);
        Ok(Built {
            recipe,
            options: self.options,
            tree,
            log,
        })
    }
}

fn check_log_dir(options: &InstallOptions) -> Result<(), BuildFailure> {
    let resolve = |path: &Path| {
        std::path::absolute(path).map_err(|e| {
            BuildFailure::preflight(format!("cannot resolve {}: {e}", path.display()))
        })
    };
    let prefix = resolve(&options.prefix)?;
    let log_dir = resolve(&options.log_dir)?;
    if log_dir.starts_with(&prefix) {
        return Err(BuildFailure::preflight(format!(
            "log directory {} is inside the install prefix {}",
            log_dir.display(),
            prefix.display()
        )));
    }
    Ok(())
}

impl<'a> Built<'a> {
    /// The directory the build ran in.
    pub fn tree(&self) -> &Path {
        &self.tree
    }

    /// The build log.
    pub fn log(&self) -> &Path {
        &self.log
    }

    pub fn classify(self, reporter: &dyn Reporter) -> Classified<'a> {
        let buckets = classify(&self.tree, &self.recipe.buckets);
        reporter.phase(Phase::Classified);
        Classified {
            recipe: self.recipe,
            options: self.options,
            buckets,
        }
    }
}

impl<'a> Classified<'a> {
    pub fn buckets(&self) -> &[ClassifiedBucket] {
        &self.buckets
    }

    /// Apply the optional-artifact policy to every bucket, then copy the
    /// passing ones into the prefix and write the install receipt.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::MissingArtifact`] before anything is copied if
    /// a mandatory bucket is empty, [`InstallError::Stage`] if a copy fails,
    /// or [`InstallError::Receipt`] if the receipt cannot be written.
    pub fn stage(self, reporter: &dyn Reporter) -> Result<Staged<'a>, InstallError> {
        let skipped: Vec<String> = self
            .buckets
            .iter()
            .filter(|b| policy::decide(b) == Decision::Skip)
            .map(|b| b.spec.name.clone())
            .collect();
        let passing = policy::apply(self.buckets)?;
        for name in &skipped {
            reporter.bucket_skipped(name);
        }

        let prefix = self.options.prefix.as_path();
        let stager = Stager::new(prefix);
        let mut staged = Vec::new();
        for bucket in &passing {
            let files = stager.stage_bucket(bucket)?;
            reporter.bucket_staged(&bucket.spec.name, files.len());
            staged.extend(files);
        }

        let receipt_path = InstallReceipt::path(self.recipe, prefix);
        let receipt = InstallReceipt::collect(self.recipe, prefix, &staged)
            .and_then(|receipt| receipt.write(&receipt_path).map(|()| receipt))
            .map_err(|source| InstallError::Receipt {
                path: receipt_path.clone(),
                source,
            })?;

        reporter.phase(Phase::Staged);
        Ok(Staged {
            recipe: self.recipe,
            options: self.options,
            receipt,
        })
    }
}

impl<'a> Staged<'a> {
    pub fn receipt(&self) -> &InstallReceipt {
        &self.receipt
    }

    /// Drop the smoke test and keep only the receipt.
    pub fn into_receipt(self) -> InstallReceipt {
        self.receipt
    }

    /// Run the smoke test against the staged toolchain.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::SmokeTest`] with the captured output.
    pub fn verify(self, reporter: &dyn Reporter) -> Result<Verified, InstallError> {
        let smoke = verify(self.recipe, &self.options.prefix, self.options.timeout)?;
        reporter.phase(Phase::Verified);
        Ok(Verified {
            receipt: self.receipt,
            smoke,
        })
    }
}

/// Build, classify, and stage. The entry point for hosts that test separately.
///
/// # Errors
///
/// Returns the first [`InstallError`] encountered; later steps do not run.
pub fn install(
    recipe: &Recipe,
    options: &InstallOptions,
    reporter: &dyn Reporter,
) -> Result<InstallReceipt, InstallError> {
    reporter.phase(Phase::Unbuilt);
    let staged = Unbuilt::new(recipe, options)
        .build(reporter)?
        .classify(reporter)
        .stage(reporter)?;
    Ok(staged.into_receipt())
}

/// The full pipeline through [`Phase::Verified`].
///
/// # Errors
///
/// Returns the first [`InstallError`] encountered; later steps do not run.
pub fn install_and_verify(
    recipe: &Recipe,
    options: &InstallOptions,
    reporter: &dyn Reporter,
) -> Result<Verified, InstallError> {
    reporter.phase(Phase::Unbuilt);
    Unbuilt::new(recipe, options)
        .build(reporter)?
        .classify(reporter)
        .stage(reporter)?
        .verify(reporter)
}

/// Smoke-test an existing install under `prefix`.
///
/// # Errors
///
/// Returns [`InstallError::SmokeTest`] with the captured output.
pub fn verify(
    recipe: &Recipe,
    prefix: &Path,
    timeout: Option<Duration>,
) -> Result<SmokeOutcome, InstallError> {
    let root = prefix.join(recipe.share_dir());
    let outcome = SmokeRunner::new(&recipe.smoke)
        .with_timeout(timeout)
        .run(prefix, &root)?;
    Ok(outcome)
}

/// One row of a dry-run staging plan.
#[derive(Debug, Clone)]
pub struct PlannedBucket {
    pub spec: BucketSpec,
    /// Matched entries, relative to the build tree.
    pub matches: Vec<PathBuf>,
    pub decision: Decision,
}

/// Classify an already-built tree and report what staging would do.
/// Runs nothing and writes nothing.
pub fn plan(recipe: &Recipe, source: &Path) -> Vec<PlannedBucket> {
    let tree = recipe.build_tree(source);
    classify(&tree, &recipe.buckets)
        .into_iter()
        .map(|bucket| {
            let decision = policy::decide(&bucket);
            let matches = bucket
                .matches
                .iter()
                .map(|m| m.strip_prefix(&tree).unwrap_or(m).to_path_buf())
                .collect();
            PlannedBucket {
                spec: bucket.spec,
                matches,
                decision,
            }
        })
        .collect()
}
