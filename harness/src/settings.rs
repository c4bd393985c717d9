//! Run configuration: built-in defaults, then an optional `tbrun.toml`,
//! then command-line overrides applied by the binary.

use crate::runner::RunnerSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use toolchain::ToolchainConfig;
use tracing::debug;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "tbrun.toml";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Directory scanned for `*_tb.v` / `*_tb.sv` testbenches
    pub tb_dir: PathBuf,
    /// Directory receiving compiled artifacts
    pub build_dir: PathBuf,
    /// Design sources compiled with every testbench
    pub src_dir: PathBuf,
    /// Worker pool width
    pub parallel: usize,
    pub compile_timeout_secs: u64,
    pub simulate_timeout_secs: u64,
    pub toolchain: ToolchainConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tb_dir: PathBuf::from("tb"),
            build_dir: PathBuf::from("build"),
            src_dir: PathBuf::from("src"),
            parallel: 1,
            compile_timeout_secs: 60,
            simulate_timeout_secs: 300,
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` if given, otherwise `tbrun.toml` if it exists, otherwise
    /// the defaults. An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> SettingsResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)
                } else {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> SettingsResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn with_tb_dir(mut self, tb_dir: impl Into<PathBuf>) -> Self {
        self.tb_dir = tb_dir.into();
        self
    }

    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn with_src_dir(mut self, src_dir: impl Into<PathBuf>) -> Self {
        self.src_dir = src_dir.into();
        self
    }

    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_compile_timeout_secs(mut self, secs: u64) -> Self {
        self.compile_timeout_secs = secs;
        self
    }

    pub fn with_simulate_timeout_secs(mut self, secs: u64) -> Self {
        self.simulate_timeout_secs = secs;
        self
    }

    pub fn with_toolchain(mut self, toolchain: ToolchainConfig) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn simulate_timeout(&self) -> Duration {
        Duration::from_secs(self.simulate_timeout_secs)
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            build_dir: self.build_dir.clone(),
            src_dir: self.src_dir.clone(),
            compile_timeout: self.compile_timeout(),
            simulate_timeout: self.simulate_timeout(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.parallel == 0 {
            return Err("Parallel job count must be at least 1".to_string());
        }

        if self.compile_timeout_secs == 0 {
            return Err("Compile timeout must be greater than 0".to_string());
        }

        if self.simulate_timeout_secs == 0 {
            return Err("Simulate timeout must be greater than 0".to_string());
        }

        if self.build_dir.as_os_str().is_empty() {
            return Err("Build directory cannot be empty".to_string());
        }

        self.toolchain.validate()
    }
}
