//! Command synthesis for every external program cbuild launches.
//!
//! Each command is a program plus a list of discrete argument tokens. Nothing
//! here ever goes through a shell, so paths are passed to the toolchain
//! verbatim.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::unit::TranslationUnit;

/// A fully synthesized external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Program followed by its arguments.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }

    /// Build from a whitespace-split command line such as `rm -rf`.
    fn from_words(words: &[String]) -> Option<Self> {
        let (program, rest) = words.split_first()?;
        Some(Self::new(program.clone()).args(rest.iter().cloned()))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in self.tokens() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(token)?;
            first = false;
        }
        Ok(())
    }
}

/// `cc <cflags> -I<include> -c <source> -o <object>`
pub fn compile(config: &BuildConfig, unit: &TranslationUnit) -> Invocation {
    Invocation::new(&config.compiler)
        .args(config.cflags.iter().cloned())
        .arg(format!("-I{}", config.include_dir.display()))
        .arg("-c")
        .arg_path(&unit.source)
        .arg("-o")
        .arg_path(&unit.object)
}

/// `ld <objects...> -o <binary> <lib flags> -L<lib> -Wl,-rpath,$ORIGIN/<lib name>`
///
/// Objects are linked in the order given. The rpath is relative to the
/// binary so copied libraries resolve without `LD_LIBRARY_PATH`.
pub fn link(config: &BuildConfig, units: &[TranslationUnit]) -> Invocation {
    Invocation::new(&config.linker)
        .args(units.iter().map(|u| u.object.to_string_lossy().into_owned()))
        .arg("-o")
        .arg_path(&config.target_binary())
        .args(config.lib_flags.iter().cloned())
        .arg(format!("-L{}", config.lib_dir.display()))
        .arg(format!("-Wl,-rpath,$ORIGIN/{}", config.lib_dir_name().display()))
}

/// Removal command over the object and binary directories only.
pub fn clean(config: &BuildConfig) -> Result<Invocation> {
    config.check_clean_boundary()?;
    let base = Invocation::from_words(&config.clean_cmd)
        .ok_or_else(|| BuildError::Configuration("CBUILD_CLEAN_CMD must not be empty".into()))?;
    Ok(config
        .clean_dirs()
        .into_iter()
        .fold(base, |inv, dir| inv.arg_path(dir)))
}

/// Copy the given library files into the directory beside the binary.
pub fn copy_libraries(config: &BuildConfig, files: &[PathBuf]) -> Result<Invocation> {
    let base = Invocation::from_words(&config.lib_copy_cmd).ok_or_else(|| {
        BuildError::Configuration("CBUILD_LIB_COPY_CMD must not be empty".into())
    })?;
    Ok(files
        .iter()
        .fold(base, |inv, f| inv.arg_path(f))
        .arg_path(&config.bin_lib_dir()))
}

/// The `-init` side command, if one is configured.
pub fn init(config: &BuildConfig) -> Option<Invocation> {
    Invocation::from_words(&config.init_cmd)
}

/// Wrap the binary path in the configured run prefix and suffix.
///
/// The prefix and suffix are glued to the binary path unless separated by
/// whitespace, so `./` yields `./bin/build` while `valgrind ` yields a
/// separate `valgrind` token.
pub fn run(config: &BuildConfig) -> Invocation {
    let binary = config.target_binary().to_string_lossy().into_owned();
    let prefix = &config.run_prefix;
    let suffix = &config.run_suffix;

    let mut before: Vec<String> = prefix.split_whitespace().map(str::to_string).collect();
    let mut after: Vec<String> = suffix.split_whitespace().map(str::to_string).collect();

    let glue_prefix = !prefix.is_empty() && !prefix.ends_with(char::is_whitespace);
    let glue_suffix = !suffix.is_empty() && !suffix.starts_with(char::is_whitespace);

    let mut middle = binary;
    if glue_prefix {
        if let Some(last) = before.pop() {
            middle = format!("{last}{middle}");
        }
    }
    if glue_suffix && !after.is_empty() {
        let first = after.remove(0);
        middle.push_str(&first);
    }

    before.push(middle);
    before.append(&mut after);
    let mut tokens = before.into_iter();
    // `before` always holds at least the binary token.
    let program = tokens.next().unwrap_or_default();
    Invocation::new(program).args(tokens)
}

/// Rebuild this tool from its own source, overwriting `exe`.
pub fn self_rebuild(config: &BuildConfig, source: &Path, exe: &Path) -> Invocation {
    Invocation::new(&config.self_compiler)
        .args(config.self_flags.iter().cloned())
        .arg_path(source)
        .arg("-o")
        .arg_path(exe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> BuildConfig {
        let vars: HashMap<_, _> = pairs
            .iter()
            .map(|(k, v)| (format!("CBUILD_{k}"), v.to_string()))
            .collect();
        BuildConfig::from_vars("/p", &vars)
    }

    fn unit(config: &BuildConfig, name: &str) -> TranslationUnit {
        TranslationUnit::from_file_name(config, name).unwrap()
    }

    #[test]
    fn test_compile_command() {
        let config = BuildConfig::defaults("/p");
        let inv = compile(&config, &unit(&config, "a.c"));
        assert_eq!(inv.to_string(), "cc -Wall -Iinclude -c src/a.c -o obj/a.o");
    }

    #[test]
    fn test_compile_command_is_stable() {
        let config = config_with(&[("CFLAGS", "-O2 -g")]);
        let u = unit(&config, "x.c");
        assert_eq!(compile(&config, &u), compile(&config, &u));
        assert_eq!(compile(&config, &u).args[..2], ["-O2", "-g"]);
    }

    #[test]
    fn test_link_command_keeps_given_order() {
        let config = config_with(&[("LIB_FLAGS", "-lm -lfoo")]);
        let units = [unit(&config, "b.c"), unit(&config, "a.c")];
        let inv = link(&config, &units);
        assert_eq!(
            inv.to_string(),
            "cc obj/b.o obj/a.o -o bin/build -lm -lfoo -Llib -Wl,-rpath,$ORIGIN/lib"
        );
    }

    #[test]
    fn test_rpath_matches_copy_destination() {
        let config = config_with(&[("LIB_DIR", "third_party/lib")]);
        let inv = link(&config, &[unit(&config, "a.c")]);
        assert_eq!(inv.args.last().unwrap(), "-Wl,-rpath,$ORIGIN/lib");
        assert_eq!(config.bin_lib_dir(), PathBuf::from("bin/lib"));
    }

    #[test]
    fn test_clean_targets_only_obj_and_bin() {
        let config = BuildConfig::defaults("/p");
        let inv = clean(&config).unwrap();
        assert_eq!(inv.program, "rm");
        assert_eq!(inv.args, vec!["-rf", "obj", "bin"]);
    }

    #[test]
    fn test_clean_refuses_source_dir() {
        let config = config_with(&[("BIN_DIR", "src")]);
        assert!(matches!(clean(&config), Err(BuildError::Configuration(_))));
    }

    #[test]
    fn test_copy_libraries_command() {
        let config = BuildConfig::defaults("/p");
        let files = [PathBuf::from("lib/libx.so"), PathBuf::from("lib/liby.so")];
        let inv = copy_libraries(&config, &files).unwrap();
        assert_eq!(inv.to_string(), "cp -u lib/libx.so lib/liby.so bin/lib");
    }

    #[test]
    fn test_init_command_optional() {
        assert_eq!(init(&BuildConfig::defaults("/p")).unwrap().to_string(), "git init");
        assert!(init(&config_with(&[("INIT_CMD", "  ")])).is_none());
    }

    #[test]
    fn test_run_default_prefix_glued() {
        let inv = run(&BuildConfig::defaults("/p"));
        assert_eq!(inv.program, "./bin/build");
        assert!(inv.args.is_empty());
    }

    #[test]
    fn test_run_with_wrapper_and_trailing_args() {
        let config = config_with(&[("RUN_PREFIX", "valgrind -q "), ("RUN_SUFFIX", " --verbose 3")]);
        let inv = run(&config);
        assert_eq!(inv.program, "valgrind");
        assert_eq!(inv.args, vec!["-q", "bin/build", "--verbose", "3"]);
    }

    #[test]
    fn test_run_glued_suffix() {
        let config = config_with(&[("RUN_PREFIX", ""), ("RUN_SUFFIX", ".exe")]);
        assert_eq!(run(&config).program, "bin/build.exe");
    }

    #[test]
    fn test_self_rebuild_command() {
        let config = config_with(&[("SELF_CC", "cc"), ("SELF_FLAGS", "-O2")]);
        let inv = self_rebuild(&config, Path::new("tool.c"), Path::new("/usr/local/bin/tool"));
        assert_eq!(inv.to_string(), "cc -O2 tool.c -o /usr/local/bin/tool");
    }
}
