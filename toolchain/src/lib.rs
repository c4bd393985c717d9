pub mod command;
pub mod config;
pub mod process;
pub mod provider;
pub mod types;

pub use command::CommandToolchain;
pub use config::ToolchainConfig;
pub use process::run_with_timeout;
pub use provider::{Toolchain, ToolchainError, ToolchainResult};
pub use types::{CommandSpec, CommandTemplate, CompileRequest, ProcessOutput, TemplateContext};

pub mod prelude {
    pub use crate::command::*;
    pub use crate::config::*;
    pub use crate::provider::*;
    pub use crate::types::*;
}
