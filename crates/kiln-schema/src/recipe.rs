//! TOML recipe definition parsing
//!
//! A recipe is the immutable description of one toolchain install. It is
//! parsed once, validated, and then passed by reference to every stage of
//! the install pipeline; nothing downstream mutates it.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{PackageName, Version};
use crate::{CHECKSUM_PLACEHOLDER, WYN_RECIPE};

/// Placeholder in smoke test arguments replaced by the program file name.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Errors that can occur when loading, parsing, or validating a recipe.
#[derive(Error, Debug)]
pub enum RecipeError {
    /// An I/O error occurred while reading a recipe file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be deserialized into a valid recipe.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required field is empty.
    #[error("Empty field: {0}")]
    EmptyField(&'static str),

    /// The declared checksum is neither a sha256 hex digest nor the placeholder.
    #[error("Invalid sha256 checksum '{0}': expected 64 hex characters")]
    InvalidChecksum(String),

    /// No version was declared and none could be derived from the source URL.
    #[error("Cannot determine version from URL '{0}'; set package.version")]
    UnknownVersion(String),

    /// Two buckets share a name.
    #[error("Duplicate bucket name: {0}")]
    DuplicateBucket(String),

    /// A bucket's source pattern is unusable.
    #[error("Bucket '{bucket}' has invalid source pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Name of the offending bucket.
        bucket: String,
        /// The declared pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A path that must stay inside its root escapes it or is absolute.
    #[error("Path '{path}' in {field} must be relative and must not contain '..'")]
    EscapingPath {
        /// Which field held the path.
        field: String,
        /// The declared path.
        path: String,
    },

    /// The smoke test arguments never reference the program file.
    #[error("Smoke test args must contain {{file}}")]
    MissingFilePlaceholder,
}

/// Metadata describing a package's identity and provenance.
///
/// Consumed from the declaration as-is; the archive itself is fetched and
/// checksummed by the host before kiln ever sees the unpacked tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMeta {
    /// Product name; also names the `share/<name>` data directory.
    pub name: PackageName,
    /// Explicit version. Derived from `url` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    /// Short human-readable summary of the package.
    #[serde(default)]
    pub description: String,
    /// URL of the project's homepage.
    #[serde(default)]
    pub homepage: String,
    /// Download URL for the source archive.
    pub url: String,
    /// Expected SHA-256 digest of the source archive.
    pub sha256: String,
    /// SPDX license identifier for the package.
    #[serde(default)]
    pub license: String,
    /// Sub-directory of the unpacked archive in which the build runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

impl PackageMeta {
    /// The declared version, or the one derived from the archive URL.
    pub fn version(&self) -> Option<Version> {
        self.version
            .clone()
            .or_else(|| Version::from_url(&self.url))
    }

    /// Returns `true` when the checksum is still the unreleased placeholder.
    pub fn has_placeholder_checksum(&self) -> bool {
        self.sha256 == CHECKSUM_PLACEHOLDER
    }
}

/// Dependency lists grouped by when they are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Tools required only during the build phase (e.g. `make`).
    #[serde(default)]
    pub build: Vec<String>,
}

/// How to produce the compiler from the source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Shell script run via `/bin/sh -c` inside the build tree.
    #[serde(default = "default_build_script")]
    pub script: String,
    /// Extra environment variables for the build.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

fn default_build_script() -> String {
    "make".to_string()
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self {
            script: default_build_script(),
            env: BTreeMap::new(),
        }
    }
}

/// Category of build artifact a bucket holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketKind {
    /// The compiler executable.
    Binary,
    /// Runtime header files.
    HeaderSet,
    /// Runtime C sources.
    SourceSet,
    /// Libraries of the vendored C-compiler backend.
    VendorLibSet,
    /// Executable of the vendored C-compiler backend.
    VendorBinary,
    /// Include directory of the vendored C-compiler backend.
    VendorIncludeSet,
    /// Header of the vendored coroutine library.
    CoroutineHeader,
    /// Prebuilt runtime archives.
    RuntimeArchiveSet,
}

impl BucketKind {
    /// Returns `true` for kinds whose files must stay executable once staged.
    pub fn is_executable(self) -> bool {
        matches!(self, Self::Binary | Self::VendorBinary)
    }

    /// Kebab-case name as written in recipes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::HeaderSet => "header-set",
            Self::SourceSet => "source-set",
            Self::VendorLibSet => "vendor-lib-set",
            Self::VendorBinary => "vendor-binary",
            Self::VendorIncludeSet => "vendor-include-set",
            Self::CoroutineHeader => "coroutine-header",
            Self::RuntimeArchiveSet => "runtime-archive-set",
        }
    }
}

impl std::fmt::Display for BucketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a bucket matching zero files is fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Zero matches fails the install.
    #[default]
    Mandatory,
    /// Zero matches skips the bucket.
    Optional,
}

/// One entry of the staging plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    /// Unique name used in diagnostics.
    pub name: String,
    /// Artifact category.
    pub kind: BucketKind,
    /// Glob relative to the build tree. `*` does not cross directories.
    pub source: String,
    /// Destination directory relative to the install prefix.
    pub dest: String,
    /// Whether absence is fatal.
    #[serde(default)]
    pub presence: Presence,
}

impl BucketSpec {
    /// Returns `true` when zero matches is acceptable.
    pub fn is_optional(&self) -> bool {
        self.presence == Presence::Optional
    }
}

/// The end-to-end check run against the installed compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeSpec {
    /// Compiler path relative to the install prefix (e.g. `bin/wyn`).
    pub binary: String,
    /// File name the program is written to inside the scratch directory.
    pub file: String,
    /// Program text.
    pub program: String,
    /// Invocation arguments; [`FILE_PLACEHOLDER`] is replaced by `file`.
    pub args: Vec<String>,
    /// Substring the combined output must contain.
    pub expect: String,
    /// Environment variable pointed at `share/<name>` during the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_env: Option<String>,
}

impl SmokeSpec {
    /// Arguments with the program file substituted in.
    pub fn rendered_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(FILE_PLACEHOLDER, &self.file))
            .collect()
    }
}

/// Complete recipe combining metadata, build, staging plan and smoke test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Core metadata for the package.
    pub package: PackageMeta,
    /// Build-time dependency list.
    #[serde(default)]
    pub dependencies: Dependencies,
    /// Build instructions.
    #[serde(default)]
    pub build: BuildSpec,
    /// Ordered staging plan.
    #[serde(rename = "bucket", default)]
    pub buckets: Vec<BucketSpec>,
    /// Post-install verification.
    pub smoke: SmokeSpec,
}

impl Recipe {
    /// Parse and validate a recipe from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::Io` if the file cannot be read, `RecipeError::Parse`
    /// if the TOML content is invalid, or a validation error.
    pub fn from_file(path: &Path) -> Result<Self, RecipeError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a recipe from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::Parse` if the TOML content does not match the
    /// schema, or a validation error (see [`Recipe::validate`]).
    pub fn parse(content: &str) -> Result<Self, RecipeError> {
        let recipe: Self = toml::from_str(content)?;
        recipe.validate()?;
        Ok(recipe)
    }

    /// The built-in Wyn recipe.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded recipe is broken.
    pub fn wyn() -> Result<Self, RecipeError> {
        Self::parse(WYN_RECIPE)
    }

    /// Serialize this recipe to a pretty-printed TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `toml::ser::Error` if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Resolved version of the package.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::UnknownVersion` when none is declared or derivable.
    pub fn version(&self) -> Result<Version, RecipeError> {
        self.package
            .version()
            .ok_or_else(|| RecipeError::UnknownVersion(self.package.url.clone()))
    }

    /// Prefix-relative shared-data directory (`share/<name>`).
    pub fn share_dir(&self) -> PathBuf {
        Path::new("share").join(self.package.name.as_str())
    }

    /// Build tree inside an unpacked archive.
    pub fn build_tree(&self, unpacked: &Path) -> PathBuf {
        match &self.package.workdir {
            Some(dir) => unpacked.join(dir),
            None => unpacked.to_path_buf(),
        }
    }

    /// Check the invariants parsing alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), RecipeError> {
        let pkg = &self.package;
        if pkg.name.is_empty() {
            return Err(RecipeError::EmptyField("package.name"));
        }
        if pkg.url.is_empty() {
            return Err(RecipeError::EmptyField("package.url"));
        }
        if !pkg.has_placeholder_checksum() {
            let valid = hex::decode(&pkg.sha256).is_ok_and(|bytes| bytes.len() == 32);
            if !valid {
                return Err(RecipeError::InvalidChecksum(pkg.sha256.clone()));
            }
        }
        self.version()?;
        if let Some(workdir) = &pkg.workdir {
            check_relative("package.workdir", workdir)?;
        }
        if self.build.script.trim().is_empty() {
            return Err(RecipeError::EmptyField("build.script"));
        }

        let mut seen = HashSet::new();
        for bucket in &self.buckets {
            if !seen.insert(bucket.name.as_str()) {
                return Err(RecipeError::DuplicateBucket(bucket.name.clone()));
            }
            check_pattern(bucket)?;
            check_relative(&format!("bucket '{}' dest", bucket.name), &bucket.dest)?;
        }

        let smoke = &self.smoke;
        if smoke.file.is_empty() {
            return Err(RecipeError::EmptyField("smoke.file"));
        }
        if smoke.expect.is_empty() {
            return Err(RecipeError::EmptyField("smoke.expect"));
        }
        check_relative("smoke.binary", &smoke.binary)?;
        if !smoke.args.iter().any(|a| a.contains(FILE_PLACEHOLDER)) {
            return Err(RecipeError::MissingFilePlaceholder);
        }

        Ok(())
    }
}

fn check_relative(field: &str, path: &str) -> Result<(), RecipeError> {
    let p = Path::new(path);
    let escapes = path.is_empty()
        || p.components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(RecipeError::EscapingPath {
            field: field.to_string(),
            path: path.to_string(),
        });
    }
    Ok(())
}

fn check_pattern(bucket: &BucketSpec) -> Result<(), RecipeError> {
    let invalid = |reason: &str| RecipeError::InvalidPattern {
        bucket: bucket.name.clone(),
        pattern: bucket.source.clone(),
        reason: reason.to_string(),
    };

    if bucket.source.contains("**") {
        return Err(invalid("recursive '**' matching is not supported"));
    }
    check_relative(&format!("bucket '{}' source", bucket.name), &bucket.source)?;
    glob::Pattern::new(&bucket.source).map_err(|e| invalid(e.msg))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> String {
        r#"
[package]
name = "toy"
url = "https://example.com/toy-0.3.1.tar.gz"
sha256 = "PLACEHOLDER"

[[bucket]]
name = "compiler"
kind = "binary"
source = "toy"
dest = "bin"

[smoke]
binary = "bin/toy"
file = "main.toy"
program = "print 1"
args = ["run", "{file}"]
expect = "1"
"#
        .to_string()
    }

    #[test]
    fn test_builtin_wyn_recipe() {
        let recipe = Recipe::wyn().unwrap();
        assert_eq!(recipe.package.name, "wyn");
        assert_eq!(recipe.version().unwrap(), "1.8.0");
        assert_eq!(recipe.package.license, "MIT");
        assert_eq!(recipe.dependencies.build, vec!["make".to_string()]);
        assert_eq!(recipe.buckets.len(), 8);
        assert_eq!(recipe.share_dir(), PathBuf::from("share/wyn"));

        let optional: Vec<&str> = recipe
            .buckets
            .iter()
            .filter(|b| b.is_optional())
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(optional, vec!["tcc-binary", "runtime-archives"]);

        assert_eq!(recipe.smoke.rendered_args(), vec!["run", "hello.wyn"]);
        assert_eq!(recipe.smoke.root_env.as_deref(), Some("WYN_ROOT"));
    }

    #[test]
    fn test_defaults() {
        let recipe = Recipe::parse(&minimal()).unwrap();
        assert_eq!(recipe.build.script, "make");
        assert!(recipe.dependencies.build.is_empty());
        assert_eq!(recipe.buckets[0].presence, Presence::Mandatory);
        assert_eq!(recipe.build_tree(Path::new("/src")), PathBuf::from("/src"));
        assert_eq!(recipe.version().unwrap(), "0.3.1");
    }

    #[test]
    fn test_workdir_build_tree() {
        let recipe = Recipe::wyn().unwrap();
        assert_eq!(
            recipe.build_tree(Path::new("/tmp/unpacked")),
            PathBuf::from("/tmp/unpacked/wyn")
        );
    }

    #[test]
    fn test_rejects_recursive_glob() {
        let content = minimal().replace("source = \"toy\"", "source = \"src/**/*.h\"");
        let err = Recipe::parse(&content).unwrap_err();
        assert!(matches!(err, RecipeError::InvalidPattern { .. }));
    }

    #[test]
    fn test_rejects_escaping_dest() {
        let content = minimal().replace("dest = \"bin\"", "dest = \"../bin\"");
        assert!(matches!(
            Recipe::parse(&content),
            Err(RecipeError::EscapingPath { .. })
        ));

        let content = minimal().replace("dest = \"bin\"", "dest = \"/usr/bin\"");
        assert!(matches!(
            Recipe::parse(&content),
            Err(RecipeError::EscapingPath { .. })
        ));
    }

    #[test]
    fn test_checksum_shape() {
        let good = "a".repeat(64);
        let content = minimal().replace("PLACEHOLDER", &good);
        assert!(Recipe::parse(&content).is_ok());

        let content = minimal().replace("PLACEHOLDER", "deadbeef");
        assert!(matches!(
            Recipe::parse(&content),
            Err(RecipeError::InvalidChecksum(_))
        ));
    }

    #[test]
    fn test_unknown_version() {
        let content = minimal().replace("toy-0.3.1.tar.gz", "toy.tar.gz");
        assert!(matches!(
            Recipe::parse(&content),
            Err(RecipeError::UnknownVersion(_))
        ));

        let content = content.replace("sha256 =", "version = \"0.3.1\"\nsha256 =");
        assert_eq!(Recipe::parse(&content).unwrap().version().unwrap(), "0.3.1");
    }

    #[test]
    fn test_duplicate_bucket() {
        let mut content = minimal();
        content.push_str(
            r#"
[[bucket]]
name = "compiler"
kind = "header-set"
source = "src/*.h"
dest = "share/toy/src"
"#,
        );
        // The appended table lands after [smoke], which TOML still accepts.
        assert!(matches!(
            Recipe::parse(&content),
            Err(RecipeError::DuplicateBucket(_))
        ));
    }

    #[test]
    fn test_smoke_args_need_file() {
        let content = minimal().replace("args = [\"run\", \"{file}\"]", "args = [\"run\"]");
        assert!(matches!(
            Recipe::parse(&content),
            Err(RecipeError::MissingFilePlaceholder)
        ));
    }

    #[test]
    fn test_toml_roundtrip_keeps_plan() {
        let recipe = Recipe::wyn().unwrap();
        let reparsed = Recipe::parse(&recipe.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed.buckets, recipe.buckets);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toy.toml");
        std::fs::write(&path, minimal()).unwrap();
        let recipe = Recipe::from_file(&path).unwrap();
        assert_eq!(recipe.package.name, "toy");
        assert!(matches!(
            Recipe::from_file(&dir.path().join("missing.toml")),
            Err(RecipeError::Io(_))
        ));
    }
}
