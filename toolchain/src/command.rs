use crate::config::ToolchainConfig;
use crate::process::run_with_timeout;
use crate::provider::{Toolchain, ToolchainError, ToolchainResult};
use crate::types::{CommandSpec, CompileRequest, ProcessOutput, TemplateContext};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// A [`Toolchain`] driven entirely by command templates.
pub struct CommandToolchain {
    config: ToolchainConfig,
}

impl CommandToolchain {
    pub fn new(config: ToolchainConfig) -> ToolchainResult<Self> {
        config
            .validate()
            .map_err(|message| ToolchainError::InvalidConfig { message })?;

        info!(
            toolchain = %config.name,
            compiler = %config.compiler.program,
            simulator = %config.simulator.program,
            "Using toolchain"
        );

        Ok(Self { config })
    }

    pub fn with_default_config() -> ToolchainResult<Self> {
        Self::new(ToolchainConfig::default())
    }

    pub fn compile_command(&self, request: &CompileRequest<'_>) -> CommandSpec {
        self.config.compiler.render(&TemplateContext {
            name: request.unit_name,
            source: Some(request.source),
            artifact: request.artifact,
            library: request.library,
        })
    }

    pub fn simulate_command(&self, artifact: &Path) -> CommandSpec {
        let name = artifact
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.config.simulator.render(&TemplateContext {
            name: &name,
            source: None,
            artifact,
            library: &[],
        })
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn compile(
        &self,
        request: &CompileRequest<'_>,
        timeout: Duration,
    ) -> ToolchainResult<ProcessOutput> {
        run_with_timeout(&self.compile_command(request), timeout).await
    }

    async fn simulate(&self, artifact: &Path, timeout: Duration) -> ToolchainResult<ProcessOutput> {
        run_with_timeout(&self.simulate_command(artifact), timeout).await
    }

    fn artifact_extension(&self) -> &str {
        &self.config.artifact_extension
    }

    fn toolchain_name(&self) -> &str {
        &self.config.name
    }
}
