//! Configuration management for cbuild.
//!
//! Reads `CBUILD_*` settings from a `.env` file in the project root and from
//! environment variables. Environment variables take precedence over `.env`.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{BuildError, Result};

/// Prefix shared by every configuration key.
pub const ENV_PREFIX: &str = "CBUILD_";

/// Resolved build configuration. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root; every relative directory below is resolved against it.
    pub root: PathBuf,
    /// Name of the linked binary, placed in `bin_dir`.
    pub target: String,
    pub compiler: String,
    pub linker: String,
    pub cflags: Vec<String>,
    pub src_dir: PathBuf,
    /// Source extension including the dot (e.g. ".c").
    pub src_ext: String,
    pub include_dir: PathBuf,
    pub obj_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub lib_dir: PathBuf,
    pub lib_flags: Vec<String>,
    pub clean_cmd: Vec<String>,
    pub lib_copy_cmd: Vec<String>,
    /// Extra side command for `-init`. Empty means none.
    pub init_cmd: Vec<String>,
    pub run_prefix: String,
    pub run_suffix: String,
    /// Source of this tool itself. `None` disables self-rebuild.
    pub self_source: Option<PathBuf>,
    pub self_compiler: String,
    pub self_flags: Vec<String>,
    /// Write `compile_commands.json` after each build.
    pub compile_commands: bool,
}

impl BuildConfig {
    /// Built-in defaults for a project rooted at `root`.
    pub fn defaults(root: impl Into<PathBuf>) -> Self {
        Self::from_vars(root, &HashMap::new())
    }

    /// Load configuration from `.env` and the environment, then validate it.
    pub fn load(root: &Path) -> Result<Self> {
        let mut vars = HashMap::new();

        let env_path = root.join(".env");
        if env_path.is_file() {
            let iter = dotenvy::from_path_iter(&env_path).map_err(|e| {
                BuildError::Configuration(format!("cannot read {}: {}", env_path.display(), e))
            })?;
            for item in iter {
                let (key, value) = item.map_err(|e| {
                    BuildError::Configuration(format!("bad line in {}: {}", env_path.display(), e))
                })?;
                if key.starts_with(ENV_PREFIX) {
                    vars.insert(key, value);
                }
            }
        }

        for (key, value) in std::env::vars() {
            if key.starts_with(ENV_PREFIX) {
                vars.insert(key, value);
            }
        }

        let config = Self::from_vars(root, &vars);
        config.validate()?;
        tracing::debug!(?config, "configuration resolved");
        Ok(config)
    }

    /// Build a configuration from a key/value map, falling back to defaults.
    pub fn from_vars(root: impl Into<PathBuf>, vars: &HashMap<String, String>) -> Self {
        let get = |key: &str, default: &str| -> String {
            vars.get(&format!("{ENV_PREFIX}{key}"))
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        let words = |key: &str, default: &str| -> Vec<String> {
            get(key, default).split_whitespace().map(str::to_string).collect()
        };

        let self_source = get("SELF_SRC", "");
        let compile_commands = get("COMPILE_COMMANDS", "1");

        Self {
            root: root.into(),
            target: get("TARGET", "build"),
            compiler: get("CC", "cc"),
            linker: get("LD", "cc"),
            cflags: words("CFLAGS", "-Wall"),
            src_dir: get("SRC_DIR", "src").into(),
            src_ext: get("SRC_EXT", ".c"),
            include_dir: get("INCLUDE_DIR", "include").into(),
            obj_dir: get("OBJ_DIR", "obj").into(),
            bin_dir: get("BIN_DIR", "bin").into(),
            lib_dir: get("LIB_DIR", "lib").into(),
            lib_flags: words("LIB_FLAGS", ""),
            clean_cmd: words("CLEAN_CMD", "rm -rf"),
            lib_copy_cmd: words("LIB_COPY_CMD", "cp -u"),
            init_cmd: words("INIT_CMD", "git init"),
            run_prefix: get("RUN_PREFIX", "./"),
            run_suffix: get("RUN_SUFFIX", ""),
            self_source: (!self_source.trim().is_empty()).then(|| PathBuf::from(self_source.trim())),
            self_compiler: get("SELF_CC", "cc"),
            self_flags: words("SELF_FLAGS", ""),
            compile_commands: !matches!(
                compile_commands.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            ),
        }
    }

    /// Reject settings that would make a run meaningless or destructive.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("CBUILD_TARGET", self.target.as_str()),
            ("CBUILD_CC", self.compiler.as_str()),
            ("CBUILD_LD", self.linker.as_str()),
            ("CBUILD_SRC_EXT", self.src_ext.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(BuildError::Configuration(format!("{key} must not be empty")));
            }
        }
        if self.clean_cmd.is_empty() {
            return Err(BuildError::Configuration("CBUILD_CLEAN_CMD must not be empty".into()));
        }
        if self.lib_copy_cmd.is_empty() {
            return Err(BuildError::Configuration(
                "CBUILD_LIB_COPY_CMD must not be empty".into(),
            ));
        }
        for (key, dir) in self.named_dirs() {
            if dir.as_os_str().is_empty() {
                return Err(BuildError::Configuration(format!("{key} must not be empty")));
            }
        }
        self.check_clean_boundary()
    }

    /// Ensure cleaning can never reach the source, include or library trees.
    ///
    /// Paths are compared after resolving `.` and `..` lexically against
    /// `root`. A clean directory must lie strictly inside the project root,
    /// and must not be the same as, or an ancestor of, any protected
    /// directory.
    pub fn check_clean_boundary(&self) -> Result<()> {
        let root = normalize(&self.root);
        for clean in self.clean_dirs() {
            let clean_abs = normalize(&self.root.join(clean));
            if clean_abs == root || !clean_abs.starts_with(&root) {
                return Err(BuildError::Configuration(format!(
                    "clean directory '{}' must be inside the project root {}",
                    clean.display(),
                    self.root.display()
                )));
            }
            for protected in [&self.src_dir, &self.include_dir, &self.lib_dir] {
                let protected_abs = normalize(&self.root.join(protected));
                if protected_abs.starts_with(&clean_abs) {
                    return Err(BuildError::Configuration(format!(
                        "clean directory '{}' would remove '{}'",
                        clean.display(),
                        protected.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Directories removed by `-clean`: objects and binaries, nothing else.
    pub fn clean_dirs(&self) -> [&Path; 2] {
        [self.obj_dir.as_path(), self.bin_dir.as_path()]
    }

    /// Every directory created before a build, relative to `root`.
    pub fn required_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.src_dir.clone(),
            self.obj_dir.clone(),
            self.bin_dir.clone(),
            self.include_dir.clone(),
            self.bin_lib_dir(),
            self.lib_dir.clone(),
        ]
    }

    /// Linked binary, relative to `root`.
    pub fn target_binary(&self) -> PathBuf {
        self.bin_dir.join(&self.target)
    }

    /// Where runtime libraries are copied, beside the binary.
    pub fn bin_lib_dir(&self) -> PathBuf {
        self.bin_dir.join(self.lib_dir_name())
    }

    /// Final component of the library directory; names the copy under
    /// `bin_dir` and the binary's relative rpath.
    pub fn lib_dir_name(&self) -> &Path {
        self.lib_dir
            .file_name()
            .map(Path::new)
            .unwrap_or(self.lib_dir.as_path())
    }

    /// Resolve a project-relative path against `root`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn named_dirs(&self) -> [(&'static str, &Path); 5] {
        [
            ("CBUILD_SRC_DIR", self.src_dir.as_path()),
            ("CBUILD_INCLUDE_DIR", self.include_dir.as_path()),
            ("CBUILD_OBJ_DIR", self.obj_dir.as_path()),
            ("CBUILD_BIN_DIR", self.bin_dir.as_path()),
            ("CBUILD_LIB_DIR", self.lib_dir.as_path()),
        ]
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  ROOT:          {}", self.root.display());
        println!("  TARGET:        {}", self.target_binary().display());
        println!("  CC:            {} {}", self.compiler, self.cflags.join(" "));
        println!("  LD:            {} {}", self.linker, self.lib_flags.join(" "));
        println!("  SOURCES:       {}/*{}", self.src_dir.display(), self.src_ext);
        println!("  INCLUDE_DIR:   {}", self.include_dir.display());
        println!("  OBJ_DIR:       {}", self.obj_dir.display());
        println!("  BIN_DIR:       {}", self.bin_dir.display());
        println!("  LIB_DIR:       {}", self.lib_dir.display());
        println!("  CLEAN_CMD:     {}", self.clean_cmd.join(" "));
        println!("  INIT_CMD:      {}", self.init_cmd.join(" "));
        match &self.self_source {
            Some(src) => println!("  SELF_SRC:      {} ({})", src.display(), self.self_compiler),
            None => println!("  SELF_SRC:      (self-rebuild disabled)"),
        }
        println!(
            "  COMPILE_COMMANDS: {}",
            if self.compile_commands { "on" } else { "off" }
        );
    }
}

/// Lexically resolve `.` and `..` so `./obj`, `obj` and `src/../obj` compare
/// equal. Symlinks are not followed.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
