use crate::types::{CommandTemplate, ARTIFACT_PLACEHOLDER};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub name: String,
    pub compiler: CommandTemplate,
    pub simulator: CommandTemplate,
    pub artifact_extension: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self::icarus()
    }
}

impl ToolchainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Icarus Verilog: `iverilog` compiles to a `.vvp` image that `vvp` runs.
    pub fn icarus() -> Self {
        Self {
            name: "icarus".to_string(),
            compiler: CommandTemplate::new("iverilog").with_args([
                "-Wall",
                "-g2012",
                "-o",
                "{artifact}",
                "-s",
                "{name}",
                "{source}",
                "{library}",
            ]),
            simulator: CommandTemplate::new("vvp").with_args(["{artifact}"]),
            artifact_extension: "vvp".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_compiler(mut self, compiler: CommandTemplate) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_simulator(mut self, simulator: CommandTemplate) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn with_artifact_extension(mut self, extension: impl Into<String>) -> Self {
        self.artifact_extension = extension.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.compiler.program.trim().is_empty() {
            return Err("Compiler program cannot be empty".to_string());
        }

        if self.simulator.program.trim().is_empty() {
            return Err("Simulator program cannot be empty".to_string());
        }

        if !self.compiler.mentions(ARTIFACT_PLACEHOLDER) {
            return Err(format!(
                "Compiler arguments must reference {} so each unit gets its own output",
                ARTIFACT_PLACEHOLDER
            ));
        }

        if !self.simulator.mentions(ARTIFACT_PLACEHOLDER) {
            return Err(format!(
                "Simulator arguments must reference {}",
                ARTIFACT_PLACEHOLDER
            ));
        }

        if self.artifact_extension.is_empty() {
            return Err("Artifact extension cannot be empty".to_string());
        }

        if self
            .artifact_extension
            .contains(|c: char| c == '/' || c == '\\' || c == '.')
        {
            return Err("Artifact extension must be a bare extension like \"vvp\"".to_string());
        }

        Ok(())
    }
}
