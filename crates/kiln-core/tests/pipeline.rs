//! End-to-end install pipeline tests.
//!
//! Each test unpacks a miniature Wyn source tree into a temp directory. The
//! "build" copies a shell-script compiler into place, the way `make` would
//! produce the real one. That fake compiler refuses to run unless the
//! staged runtime files are reachable through `WYN_ROOT`, so a passing smoke
//! test really does depend on the staged layout.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use kiln_core::receipt::InstallReceipt;
use kiln_core::{InstallError, InstallOptions, NullReporter, Phase, install, install_and_verify};
use kiln_schema::Recipe;
use tempfile::TempDir;

const FAKE_WYN: &str = r#"#!/bin/sh
[ "$1" = run ] || { echo "usage: wyn run <file>" >&2; exit 64; }
for f in src/wyn_runtime.h src/wyn_wrapper.c vendor/minicoro/minicoro.h vendor/tcc/lib/libtcc1.a vendor/tcc/tcc_include/stddef.h; do
    [ -e "$WYN_ROOT/$f" ] || { echo "wyn: missing $WYN_ROOT/$f" >&2; exit 1; }
done
sed -n 's/^println("\(.*\)")$/\1/p' "$2"
"#;

const BUILD: &str = "cp wyn.in wyn && chmod 755 wyn";

struct Fixture {
    unpacked: TempDir,
    prefix: TempDir,
    logs: TempDir,
}

impl Fixture {
    /// The mandatory parts of a source tree, without optional components.
    fn new() -> Self {
        let fixture = Self {
            unpacked: TempDir::new().unwrap(),
            prefix: TempDir::new().unwrap(),
            logs: TempDir::new().unwrap(),
        };
        fixture.write("wyn.in", FAKE_WYN, 0o644);
        fixture.write("src/wyn_runtime.h", "#pragma once\n", 0o644);
        fixture.write("src/wyn_wrapper.c", "int main(void) { return 0; }\n", 0o644);
        fixture.write("src/main.o", "object", 0o644);
        fixture.write("vendor/minicoro/minicoro.h", "/* minicoro */\n", 0o644);
        fixture.write("vendor/tcc/lib/libtcc1.a", "!<arch>\n", 0o644);
        fixture.write("vendor/tcc/tcc_include/stddef.h", "typedef int size_t;\n", 0o644);
        fixture
    }

    fn with_optional(self) -> Self {
        self.write("vendor/tcc/bin/tcc", "#!/bin/sh\necho tcc\n", 0o755);
        self.write("runtime/libwyn_rt.a", "!<arch>\nrt", 0o644);
        self
    }

    fn tree(&self) -> PathBuf {
        self.unpacked.path().join("wyn")
    }

    fn write(&self, rel: &str, contents: &str, mode: u32) {
        let path = self.tree().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn options(&self) -> InstallOptions {
        InstallOptions {
            source: self.unpacked.path().to_path_buf(),
            prefix: self.prefix.path().to_path_buf(),
            log_dir: self.logs.path().to_path_buf(),
            timeout: None,
        }
    }

    fn prefix(&self) -> &Path {
        self.prefix.path()
    }
}

fn recipe(script: &str) -> Recipe {
    let mut recipe = Recipe::wyn().unwrap();
    // `make` is not guaranteed on test machines; the script only needs sh.
    recipe.dependencies.build = vec!["sh".to_string()];
    recipe.build.script = script.to_string();
    recipe
}

/// Every entry under `root`: relative path -> (contents, mode) for files,
/// `None` for directories.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<(Vec<u8>, u32)>> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            let value = e.file_type().is_file().then(|| {
                let mode = e.metadata().unwrap().permissions().mode() & 0o777;
                (fs::read(e.path()).unwrap(), mode)
            });
            (rel, value)
        })
        .collect()
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path).unwrap().permissions().mode() & 0o111 == 0o111
}

#[test]
fn installs_and_runs_hello_world() {
    let fx = Fixture::new().with_optional();
    let verified = install_and_verify(&recipe(BUILD), &fx.options(), &NullReporter).unwrap();

    assert!(verified.smoke.output.contains("Hello from Wyn!"));

    let p = fx.prefix();
    for rel in [
        "bin/wyn",
        "share/wyn/src/wyn_runtime.h",
        "share/wyn/src/wyn_wrapper.c",
        "share/wyn/vendor/minicoro/minicoro.h",
        "share/wyn/vendor/tcc/lib/libtcc1.a",
        "share/wyn/vendor/tcc/bin/tcc",
        "share/wyn/vendor/tcc/tcc_include/stddef.h",
        "share/wyn/runtime/libwyn_rt.a",
        "share/wyn/INSTALL_RECEIPT.json",
    ] {
        assert!(p.join(rel).is_file(), "{rel} not staged");
    }
    // Only *.h and *.c leave src/.
    assert!(!p.join("share/wyn/src/main.o").exists());
    assert!(!p.join("bin/wyn.in").exists());
}

#[test]
fn staged_binaries_are_executable() {
    let fx = Fixture::new().with_optional();
    install(&recipe(BUILD), &fx.options(), &NullReporter).unwrap();

    assert!(is_executable(&fx.prefix().join("bin/wyn")));
    assert!(is_executable(&fx.prefix().join("share/wyn/vendor/tcc/bin/tcc")));
}

#[test]
fn build_failure_stages_nothing() {
    let fx = Fixture::new().with_optional();
    let err = install(
        &recipe("echo 'cc: fatal error' >&2; exit 2"),
        &fx.options(),
        &NullReporter,
    )
    .unwrap_err();

    assert!(matches!(err, InstallError::Build(_)));
    assert_eq!(err.phase(), Phase::Unbuilt);
    assert!(err.diagnostic().unwrap().contains("cc: fatal error"));
    assert!(snapshot(fx.prefix()).is_empty());
}

#[test]
fn missing_mandatory_bucket_fails_before_staging() {
    let fx = Fixture::new();
    fs::remove_dir_all(fx.tree().join("vendor/minicoro")).unwrap();

    let err = install(&recipe(BUILD), &fx.options(), &NullReporter).unwrap_err();

    match &err {
        InstallError::MissingArtifact { bucket } => assert_eq!(bucket, "minicoro"),
        other => panic!("expected MissingArtifact, got {other}"),
    }
    assert!(snapshot(fx.prefix()).is_empty());
}

#[test]
fn compiler_not_produced_is_missing_artifact() {
    let fx = Fixture::new();
    let err = install(&recipe("true"), &fx.options(), &NullReporter).unwrap_err();
    assert!(matches!(err, InstallError::MissingArtifact { ref bucket } if bucket == "compiler"));
}

#[test]
fn optional_buckets_may_be_absent() {
    let fx = Fixture::new();
    let verified = install_and_verify(&recipe(BUILD), &fx.options(), &NullReporter).unwrap();

    assert!(verified.smoke.output.contains("Hello from Wyn!"));
    assert!(!fx.prefix().join("share/wyn/runtime").exists());
    assert!(!fx.prefix().join("share/wyn/vendor/tcc/bin").exists());
}

#[test]
fn reinstall_is_byte_identical() {
    let fx = Fixture::new().with_optional();
    let recipe = recipe(BUILD);

    install(&recipe, &fx.options(), &NullReporter).unwrap();
    let first = snapshot(fx.prefix());
    install(&recipe, &fx.options(), &NullReporter).unwrap();
    let second = snapshot(fx.prefix());

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn receipt_lists_staged_files() {
    let fx = Fixture::new();
    let recipe = recipe(BUILD);
    let receipt = install(&recipe, &fx.options(), &NullReporter).unwrap();

    let on_disk = InstallReceipt::read(&InstallReceipt::path(&recipe, fx.prefix())).unwrap();
    assert_eq!(on_disk, receipt);
    assert_eq!(receipt.version, "1.8.0");

    let bin = receipt.files.iter().find(|f| f.path == "bin/wyn").unwrap();
    assert!(bin.executable);
    assert!(receipt.files.iter().all(|f| !f.path.ends_with(".json")));
}

#[test]
fn smoke_failure_carries_output() {
    let fx = Fixture::new();
    // The runtime header never reaches the prefix, so the compiler complains.
    let mut recipe = recipe(BUILD);
    recipe.buckets.retain(|b| b.name != "runtime-headers");

    let err = install_and_verify(&recipe, &fx.options(), &NullReporter).unwrap_err();

    assert!(matches!(err, InstallError::SmokeTest(_)));
    assert_eq!(err.phase(), Phase::Staged);
    assert!(err.diagnostic().unwrap().contains("missing"));
    // Staging already happened and is not rolled back.
    assert!(fx.prefix().join("bin/wyn").exists());
}

#[test]
fn build_runs_in_workdir() {
    let fx = Fixture::new();
    install(
        &recipe("[ -f wyn.in ] && cp wyn.in wyn && pwd > built-in"),
        &fx.options(),
        &NullReporter,
    )
    .unwrap();

    let built_in = fs::read_to_string(fx.tree().join("built-in")).unwrap();
    assert!(built_in.trim_end().ends_with("/wyn"));
}

#[test]
fn plan_reports_without_touching_prefix() {
    let fx = Fixture::new();
    fs::remove_dir_all(fx.tree().join("vendor/tcc/lib")).unwrap();
    let recipe = recipe(BUILD);

    let plan = kiln_core::plan(&recipe, fx.unpacked.path());

    let decision = |name: &str| {
        plan.iter()
            .find(|p| p.spec.name == name)
            .unwrap()
            .decision
            .as_str()
    };
    // No build has run, so the compiler is not there yet.
    assert_eq!(decision("compiler"), "missing");
    assert_eq!(decision("runtime-headers"), "stage");
    assert_eq!(decision("tcc-lib"), "missing");
    assert_eq!(decision("runtime-archives"), "skip");

    let headers = plan.iter().find(|p| p.spec.name == "runtime-headers").unwrap();
    assert_eq!(headers.matches, vec![PathBuf::from("src/wyn_runtime.h")]);
    assert!(snapshot(fx.prefix()).is_empty());
}

#[test]
fn log_dir_inside_prefix_is_rejected() {
    let fx = Fixture::new().with_optional();
    let mut options = fx.options();
    options.log_dir = fx.prefix().join("logs");

    let err = install(
        &recipe("echo 'never runs' >&2; exit 1"),
        &options,
        &NullReporter,
    )
    .unwrap_err();

    assert!(matches!(err, InstallError::Build(_)));
    assert!(err.to_string().contains("inside the install prefix"));
    assert!(snapshot(fx.prefix()).is_empty());
    // Rejected before the build ran.
    assert!(!fx.tree().join("wyn").exists());
}
