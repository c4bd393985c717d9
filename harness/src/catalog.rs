//! Test catalog
//!
//! Resolves the set of testbenches to run, either by scanning a directory for
//! files following the `<stem>_tb.<ext>` convention or from one explicitly
//! named unit.

use artifacts::HDL_EXTENSIONS;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Logical suffix every discoverable testbench stem ends with.
pub const TESTBENCH_SUFFIX: &str = "_tb";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid testbench pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Testbench directory path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// One testbench: a run-unique name and the source file that defines it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestUnit {
    pub name: String,
    pub source: PathBuf,
}

impl TestUnit {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Recoverable conditions reported alongside a discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogWarning {
    DirectoryNotFound(PathBuf),
    UnreadableEntry { path: PathBuf, reason: String },
}

impl fmt::Display for CatalogWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogWarning::DirectoryNotFound(dir) => {
                write!(f, "Test directory '{}' not found", dir.display())
            }
            CatalogWarning::UnreadableEntry { path, reason } => {
                write!(f, "Skipping unreadable entry '{}': {}", path.display(), reason)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Sorted lexicographically by name.
    pub units: Vec<TestUnit>,
    pub warnings: Vec<CatalogWarning>,
}

impl Discovery {
    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|unit| unit.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Scan `dir` (non-recursively) for `*_tb.v` / `*_tb.sv` testbenches.
///
/// A stem present with several extensions yields one unit whose source uses
/// the earliest extension in [`HDL_EXTENSIONS`].
pub fn discover(dir: &Path) -> CatalogResult<Discovery> {
    let mut discovery = Discovery::default();

    if !dir.is_dir() {
        let warning = CatalogWarning::DirectoryNotFound(dir.to_path_buf());
        warn!("{}", warning);
        discovery.warnings.push(warning);
        return Ok(discovery);
    }

    let dir_str = dir
        .to_str()
        .ok_or_else(|| CatalogError::InvalidPath(dir.to_path_buf()))?;
    let escaped = glob::Pattern::escape(dir_str);

    let mut by_stem: BTreeMap<String, PathBuf> = BTreeMap::new();

    for extension in HDL_EXTENSIONS {
        let pattern = format!("{}/*{}.{}", escaped, TESTBENCH_SUFFIX, extension);
        for entry in glob::glob(&pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    let warning = CatalogWarning::UnreadableEntry {
                        path: e.path().to_path_buf(),
                        reason: e.error().to_string(),
                    };
                    warn!("{}", warning);
                    discovery.warnings.push(warning);
                    continue;
                }
            };

            if !path.is_file() {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            by_stem.entry(stem.to_string()).or_insert(path);
        }
    }

    discovery.units = by_stem
        .into_iter()
        .map(|(name, source)| TestUnit { name, source })
        .collect();

    debug!(
        dir = %dir.display(),
        count = discovery.units.len(),
        "Discovered testbenches"
    );

    Ok(discovery)
}

/// Build a single-unit set for an explicitly named testbench.
///
/// The source is the first existing `<dir>/<name>.<ext>`, falling back to
/// `<dir>/<name>.v`. Existence is not required: a missing file surfaces
/// later as a compilation failure.
pub fn select(name: &str, dir: &Path) -> Vec<TestUnit> {
    let source = HDL_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| dir.join(format!("{}.{}", name, HDL_EXTENSIONS[0])));

    vec![TestUnit::new(name, source)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "module x; endmodule\n").unwrap();
    }

    #[test]
    fn test_discover_finds_both_extensions_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "mux_tb.sv");
        touch(dir.path(), "adder_tb.v");

        let discovery = discover(dir.path()).unwrap();
        assert_eq!(discovery.names(), vec!["adder_tb", "mux_tb"]);
        assert_eq!(discovery.units[1].source, dir.path().join("mux_tb.sv"));
        assert!(discovery.warnings.is_empty());
    }

    #[test]
    fn test_discover_ignores_files_outside_convention() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "adder.v");
        touch(dir.path(), "adder_tb.vhd");
        touch(dir.path(), "notes_tb.txt");
        touch(dir.path(), "alu_tb.v");
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "deep_tb.v");

        let discovery = discover(dir.path()).unwrap();
        assert_eq!(discovery.names(), vec!["alu_tb"]);
    }

    #[test]
    fn test_discover_deduplicates_stems_preferring_v() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "fifo_tb.sv");
        touch(dir.path(), "fifo_tb.v");

        let discovery = discover(dir.path()).unwrap();
        assert_eq!(discovery.names(), vec!["fifo_tb"]);
        assert_eq!(discovery.units[0].source, dir.path().join("fifo_tb.v"));
    }

    #[test]
    fn test_discover_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zeta_tb.v", "alpha_tb.sv", "mid_tb.v", "Beta_tb.v"] {
            touch(dir.path(), name);
        }

        let first = discover(dir.path()).unwrap();
        let second = discover(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.names(), vec!["Beta_tb", "alpha_tb", "mid_tb", "zeta_tb"]);
    }

    #[test]
    fn test_discover_missing_directory_warns_and_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("tb");

        let discovery = discover(&missing).unwrap();
        assert!(discovery.is_empty());
        assert_eq!(
            discovery.warnings,
            vec![CatalogWarning::DirectoryNotFound(missing.clone())]
        );
        assert!(discovery.warnings[0].to_string().contains("not found"));
    }

    #[test]
    fn test_select_bypasses_discovery() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "adder_tb.v");
        touch(dir.path(), "mux_tb.sv");

        let units = select("mux_tb", dir.path());
        assert_eq!(units, vec![TestUnit::new("mux_tb", dir.path().join("mux_tb.sv"))]);
    }

    #[test]
    fn test_select_does_not_validate_existence() {
        let dir = tempfile::tempdir().unwrap();
        let units = select("ghost_tb", dir.path());
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "ghost_tb");
        assert_eq!(units[0].source, dir.path().join("ghost_tb.v"));
    }
}
