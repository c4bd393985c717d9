//! Build layout utilities for tbrun
//!
//! This crate decides where compiled testbench artifacts live and which HDL
//! source files make up the shared design library. Artifact paths are derived
//! from the unit name alone, so concurrently running units never write the
//! same file and a rerun overwrites the previous artifact in place.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Recognized HDL source extensions, in preference order.
pub const HDL_EXTENSIONS: [&str; 2] = ["v", "sv"];

/// Errors related to the build layout
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to prepare build directory '{path}': {source}")]
    PrepareFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Where compiled artifacts for a run are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLayout {
    /// Root of the build tree
    pub build_dir: PathBuf,
    /// Artifact file extension, without the dot
    pub extension: String,
}

impl Default for BuildLayout {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            extension: "vvp".to_string(),
        }
    }
}

impl BuildLayout {
    pub fn new(build_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            build_dir: build_dir.into(),
            extension: extension.into(),
        }
    }

    /// Create the build directory. Safe to call repeatedly and concurrently.
    pub fn prepare(&self) -> ArtifactResult<()> {
        std::fs::create_dir_all(&self.build_dir).map_err(|source| ArtifactError::PrepareFailed {
            path: self.build_dir.clone(),
            source,
        })
    }

    /// Unit-scoped artifact path: `<build_dir>/<sanitized name>.<extension>`.
    pub fn artifact_path(&self, unit_name: &str) -> PathBuf {
        self.build_dir
            .join(format!("{}.{}", sanitize_unit_name(unit_name), self.extension))
    }
}

/// Length of the digest suffix added to names that needed rewriting.
const DISCRIMINATOR_LEN: usize = 8;

/// Map a unit name to a file stem directly inside the build directory.
///
/// Anything outside `[A-Za-z0-9_.-]` becomes `_`. A name that had to be
/// rewritten gets a `-<digest>` suffix derived from the raw name, so two
/// distinct units never share an artifact. Clean names pass through as is.
pub fn sanitize_unit_name(unit_name: &str) -> String {
    let replaced: String = unit_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = match replaced.trim_matches('.') {
        "" => "_".to_string(),
        _ => replaced,
    };

    if sanitized == unit_name {
        sanitized
    } else {
        format!("{}-{}", sanitized, name_digest(unit_name))
    }
}

fn name_digest(unit_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(unit_name.as_bytes());
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(DISCRIMINATOR_LEN);
    digest
}

/// HDL design sources compiled alongside every testbench
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLibrary {
    files: Vec<PathBuf>,
}

impl SourceLibrary {
    /// List the recognized source files directly inside `dir`, sorted.
    ///
    /// A missing directory is an empty library.
    pub fn scan(dir: &Path) -> ArtifactResult<Self> {
        if !dir.is_dir() {
            return Ok(Self::default());
        }

        let dir_str = dir
            .to_str()
            .ok_or_else(|| ArtifactError::InvalidPath(dir.to_path_buf()))?;
        let escaped = glob::Pattern::escape(dir_str);

        let mut files = Vec::new();
        for extension in HDL_EXTENSIONS {
            let pattern = format!("{}/*.{}", escaped, extension);
            for entry in glob::glob(&pattern)? {
                let path = entry.map_err(|e| e.into_error())?;
                if path.is_file() {
                    files.push(path);
                }
            }
        }

        files.sort();
        files.dedup();
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_build_layout_default() {
        let layout = BuildLayout::default();
        assert_eq!(layout.build_dir, PathBuf::from("build"));
        assert_eq!(layout.extension, "vvp");
    }

    #[test]
    fn test_artifact_path_is_unit_scoped() {
        let layout = BuildLayout::new("/tmp/build", "vvp");
        assert_eq!(
            layout.artifact_path("adder_tb"),
            PathBuf::from("/tmp/build/adder_tb.vvp")
        );
        assert_ne!(layout.artifact_path("adder_tb"), layout.artifact_path("mux_tb"));
    }

    #[test]
    fn test_artifact_path_cannot_escape_build_dir() {
        let layout = BuildLayout::new("build", "vvp");
        let path = layout.artifact_path("../etc/passwd");
        assert_eq!(path.parent(), Some(Path::new("build")));
        assert!(sanitize_unit_name("sub/dir tb").starts_with("sub_dir_tb-"));
        assert!(sanitize_unit_name("..").starts_with("_-"));
        assert!(sanitize_unit_name("").starts_with("_-"));
    }

    #[test]
    fn test_clean_names_are_unchanged() {
        assert_eq!(sanitize_unit_name("adder_tb"), "adder_tb");
        assert_eq!(sanitize_unit_name("alu-v2.top_tb"), "alu-v2.top_tb");
    }

    #[test]
    fn test_rewritten_names_do_not_collide() {
        let layout = BuildLayout::new("build", "vvp");

        assert_ne!(layout.artifact_path("a b_tb"), layout.artifact_path("a_b_tb"));
        assert_ne!(layout.artifact_path("a/b_tb"), layout.artifact_path("a b_tb"));
        assert_ne!(layout.artifact_path("\u{e4}_tb"), layout.artifact_path("\u{f6}_tb"));

        let rewritten = sanitize_unit_name("a b_tb");
        assert_eq!(rewritten.len(), "a_b_tb-".len() + DISCRIMINATOR_LEN);
        assert_eq!(rewritten, sanitize_unit_name("a b_tb"));
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = BuildLayout::new(dir.path().join("nested/build"), "vvp");

        layout.prepare().unwrap();
        layout.prepare().unwrap();
        assert!(layout.build_dir.is_dir());
    }

    #[test]
    fn test_prepare_fails_when_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("build");
        fs::write(&blocker, "not a directory").unwrap();

        let layout = BuildLayout::new(&blocker, "vvp");
        let result = layout.prepare();
        assert!(matches!(result, Err(ArtifactError::PrepareFailed { .. })));
    }

    #[test]
    fn test_scan_lists_recognized_sources_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mux.sv"), "").unwrap();
        fs::write(dir.path().join("adder.v"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/deep.v"), "").unwrap();

        let library = SourceLibrary::scan(dir.path()).unwrap();
        let names: Vec<_> = library
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["adder.v", "mux.sv"]);
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let library = SourceLibrary::scan(&dir.path().join("src")).unwrap();
        assert!(library.is_empty());
    }
}
