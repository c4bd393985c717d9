use crate::types::{CompileRequest, ProcessOutput};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid toolchain configuration: {message}")]
    InvalidConfig { message: String },
}

pub type ToolchainResult<T> = Result<T, ToolchainError>;

/// The external compiler/simulator pair that turns a testbench into a verdict.
///
/// Implementations only report what the processes did. A non-zero exit or a
/// timeout is an `Ok` output; `Err` is reserved for failing to run the tool
/// at all.
#[async_trait]
pub trait Toolchain: Send + Sync {
    async fn compile(
        &self,
        request: &CompileRequest<'_>,
        timeout: Duration,
    ) -> ToolchainResult<ProcessOutput>;

    async fn simulate(&self, artifact: &Path, timeout: Duration) -> ToolchainResult<ProcessOutput>;

    /// Extension given to compiled artifacts, without the dot.
    fn artifact_extension(&self) -> &str;

    fn toolchain_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct MockToolchain;

    #[async_trait]
    impl Toolchain for MockToolchain {
        async fn compile(
            &self,
            request: &CompileRequest<'_>,
            _timeout: Duration,
        ) -> ToolchainResult<ProcessOutput> {
            Ok(ProcessOutput {
                exit_code: Some(0),
                stdout: format!("compiled {}", request.unit_name),
                ..ProcessOutput::default()
            })
        }

        async fn simulate(
            &self,
            _artifact: &Path,
            _timeout: Duration,
        ) -> ToolchainResult<ProcessOutput> {
            Ok(ProcessOutput {
                exit_code: Some(0),
                stdout: "PASS\n".to_string(),
                ..ProcessOutput::default()
            })
        }

        fn artifact_extension(&self) -> &str {
            "out"
        }

        fn toolchain_name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_mock_toolchain() {
        let toolchain = MockToolchain;
        let library = vec![PathBuf::from("src/a.v")];
        let request = CompileRequest {
            unit_name: "a_tb",
            source: Path::new("tb/a_tb.v"),
            library: &library,
            artifact: Path::new("build/a_tb.out"),
        };

        let compiled = toolchain
            .compile(&request, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(compiled.success());
        assert_eq!(compiled.stdout, "compiled a_tb");

        let simulated = toolchain
            .simulate(request.artifact, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(simulated.stdout, "PASS\n");
        assert_eq!(toolchain.toolchain_name(), "mock");
        assert_eq!(toolchain.artifact_extension(), "out");
    }

    #[test]
    fn test_error_display() {
        let err = ToolchainError::Spawn {
            program: "iverilog".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert!(err.to_string().contains("iverilog"));
        assert!(err.to_string().contains("No such file or directory"));

        let err = ToolchainError::InvalidConfig {
            message: "Compiler program cannot be empty".to_string(),
        };
        assert!(err.to_string().contains("Compiler program cannot be empty"));
    }
}
