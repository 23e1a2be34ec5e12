//! Shared test utilities for cbuild tests.
#![allow(dead_code)]

use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use cbuild::error::Result;
use cbuild::invocation::Invocation;
use cbuild::process::Toolchain;
use cbuild::BuildConfig;
use tempfile::TempDir;

/// A throwaway project directory.
pub struct TestProject {
    /// Temporary directory (kept alive for lifetime of TestProject)
    pub _temp_dir: TempDir,
    pub root: PathBuf,
}

impl TestProject {
    /// Empty project with a `src/` directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        fs::create_dir_all(root.join("src")).expect("Failed to create src dir");
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Project with the given sources, all stamped an hour in the past.
    pub fn with_sources(names: &[&str]) -> Self {
        let project = Self::new();
        for name in names {
            project.write(&format!("src/{name}"), "int x;\n");
            project.set_age(&format!("src/{name}"), Duration::from_secs(3600));
        }
        project
    }

    pub fn config(&self) -> BuildConfig {
        BuildConfig::defaults(&self.root)
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write file");
    }

    /// Stamp `rel` as modified `age` ago.
    pub fn set_age(&self, rel: &str, age: Duration) {
        set_mtime(&self.path(rel), SystemTime::now() - age);
    }

    pub fn mtime(&self, rel: &str) -> SystemTime {
        fs::metadata(self.path(rel))
            .and_then(|m| m.modified())
            .expect("Failed to read mtime")
    }
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    let file = File::options()
        .append(true)
        .open(path)
        .expect("Failed to open file for touch");
    file.set_modified(time).expect("Failed to set mtime");
}

/// Toolchain double that records every invocation and fabricates outputs.
///
/// Any command with an `-o <path>` argument gets that file written (relative
/// to the working directory), so staleness behaves as with a real compiler.
#[derive(Default)]
pub struct FakeToolchain {
    pub executed: Vec<Invocation>,
    /// Exit with 1 for any command mentioning this token.
    pub fail_on: Option<String>,
}

impl FakeToolchain {
    pub fn failing_on(token: &str) -> Self {
        Self {
            fail_on: Some(token.to_string()),
            ..Self::default()
        }
    }

    /// Invocations whose program is `program`.
    pub fn runs_of(&self, program: &str) -> Vec<&Invocation> {
        self.executed
            .iter()
            .filter(|i| i.program == program)
            .collect()
    }

    /// Sources compiled, in order.
    pub fn compiled_sources(&self) -> Vec<String> {
        self.executed
            .iter()
            .filter_map(|i| {
                let pos = i.args.iter().position(|a| a == "-c")?;
                i.args.get(pos + 1).cloned()
            })
            .collect()
    }

    pub fn link_count(&self) -> usize {
        self.executed
            .iter()
            .filter(|i| !i.args.iter().any(|a| a == "-c") && i.args.iter().any(|a| a == "-o"))
            .count()
    }
}

impl Toolchain for FakeToolchain {
    fn execute(&mut self, invocation: &Invocation, dir: &Path) -> Result<i32> {
        self.executed.push(invocation.clone());

        if let Some(token) = &self.fail_on {
            if invocation.tokens().any(|t| t == token.as_str()) {
                return Ok(1);
            }
        }

        if let Some(pos) = invocation.args.iter().position(|a| a == "-o") {
            if let Some(out) = invocation.args.get(pos + 1) {
                let out = dir.join(out);
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent).expect("Failed to create output dir");
                }
                fs::write(&out, "fake output\n").expect("Failed to write fake output");
            }
        }
        Ok(0)
    }
}

/// Shell script standing in for `cc`: writes its `-o` target. Objects get
/// placeholder content; anything else becomes an executable that prints a
/// greeting and exits with `exit_code`.
pub fn write_fake_cc(dir: &Path, exit_code: i32) -> PathBuf {
    let script = format!(
        r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
[ -n "$out" ] || exit 0
case "$out" in
  *.o) echo object > "$out" ;;
  *) printf '#!/bin/sh\necho hello from build\nexit {exit_code}\n' > "$out"; chmod +x "$out" ;;
esac
"#
    );
    let path = dir.join("fake-cc");
    fs::write(&path, script).expect("Failed to write fake cc");
    let mut perms = fs::metadata(&path).expect("Failed to get metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("Failed to set permissions");
    path
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}

/// Assert that a path does not exist.
pub fn assert_missing(path: &Path) {
    assert!(!path.exists(), "Expected path to be absent: {}", path.display());
}
