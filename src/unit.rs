//! Translation unit discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::error::{BuildError, Result};

/// One source file and the object file it compiles to.
///
/// Paths are relative to the project root, exactly as they appear in
/// synthesized commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    pub source: PathBuf,
    pub object: PathBuf,
    /// File name without extension.
    pub stem: String,
}

impl TranslationUnit {
    /// Derive the unit for `file_name` inside the configured source dir.
    ///
    /// Returns `None` if the name doesn't carry the source extension.
    pub fn from_file_name(config: &BuildConfig, file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(config.src_ext.as_str())?;
        if stem.is_empty() {
            return None;
        }
        Some(Self {
            source: config.src_dir.join(file_name),
            object: config.obj_dir.join(format!("{stem}.o")),
            stem: stem.to_string(),
        })
    }
}

/// List every regular file in the source directory with the source
/// extension, sorted by path so link order is reproducible.
pub fn discover(config: &BuildConfig) -> Result<Vec<TranslationUnit>> {
    let src_dir = config.resolve(&config.src_dir);
    let mut units = Vec::new();

    for entry in WalkDir::new(&src_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| open_error(&src_dir, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            tracing::debug!(path = %entry.path().display(), "skipping non-UTF-8 file name");
            continue;
        };
        if let Some(unit) = TranslationUnit::from_file_name(config, name) {
            units.push(unit);
        }
    }

    units.sort_by(|a, b| a.source.cmp(&b.source));
    tracing::debug!(count = units.len(), dir = %src_dir.display(), "discovered translation units");
    Ok(units)
}

fn open_error(dir: &Path, err: walkdir::Error) -> BuildError {
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
    BuildError::Configuration(format!(
        "Failed to open source directory {}: {}",
        dir.display(),
        source
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unit_paths() {
        let config = BuildConfig::defaults("/p");
        let unit = TranslationUnit::from_file_name(&config, "main.c").unwrap();
        assert_eq!(unit.source, PathBuf::from("src/main.c"));
        assert_eq!(unit.object, PathBuf::from("obj/main.o"));
        assert_eq!(unit.stem, "main");
    }

    #[test]
    fn test_wrong_extension_ignored() {
        let config = BuildConfig::defaults("/p");
        assert!(TranslationUnit::from_file_name(&config, "main.h").is_none());
        assert!(TranslationUnit::from_file_name(&config, "main.cc").is_none());
        assert!(TranslationUnit::from_file_name(&config, ".c").is_none());
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested.c")).unwrap();
        for name in ["zeta.c", "alpha.c", "notes.txt", "mid.c", "header.h"] {
            fs::write(src.join(name), "").unwrap();
        }
        fs::write(src.join("nested.c/inner.c"), "").unwrap();

        let config = BuildConfig::defaults(dir.path());
        let units = discover(&config).unwrap();
        let stems: Vec<_> = units.iter().map(|u| u.stem.as_str()).collect();

        // Directories (even ones named *.c) and other extensions are skipped;
        // order is by path, not directory enumeration order.
        assert_eq!(stems, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_missing_source_dir_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig::defaults(dir.path());
        assert!(matches!(discover(&config), Err(BuildError::Configuration(_))));
    }
}
