use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder that expands to one argument per library source file.
pub const LIBRARY_PLACEHOLDER: &str = "{library}";
pub const NAME_PLACEHOLDER: &str = "{name}";
pub const SOURCE_PLACEHOLDER: &str = "{source}";
pub const ARTIFACT_PLACEHOLDER: &str = "{artifact}";

/// A program plus argument list that may reference unit placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn mentions(&self, placeholder: &str) -> bool {
        self.args.iter().any(|arg| arg.contains(placeholder))
    }

    /// Substitute placeholders and produce a runnable command.
    ///
    /// An argument that is exactly `{library}` becomes zero or more
    /// arguments; every other placeholder is replaced textually.
    pub fn render(&self, context: &TemplateContext<'_>) -> CommandSpec {
        let mut args = Vec::with_capacity(self.args.len() + context.library.len());

        for arg in &self.args {
            if arg == LIBRARY_PLACEHOLDER {
                args.extend(
                    context
                        .library
                        .iter()
                        .map(|path| path.display().to_string()),
                );
                continue;
            }

            let mut rendered = arg.replace(NAME_PLACEHOLDER, context.name);
            if let Some(source) = context.source {
                rendered = rendered.replace(SOURCE_PLACEHOLDER, &source.display().to_string());
            }
            rendered = rendered.replace(ARTIFACT_PLACEHOLDER, &context.artifact.display().to_string());
            args.push(rendered);
        }

        CommandSpec {
            program: self.program.clone(),
            args,
        }
    }
}

/// Values substituted into a [`CommandTemplate`].
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub name: &'a str,
    pub source: Option<&'a Path>,
    pub artifact: &'a Path,
    pub library: &'a [PathBuf],
}

/// A fully rendered command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
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
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Inputs for the compile phase of one test unit.
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    pub unit_name: &'a str,
    pub source: &'a Path,
    pub library: &'a [PathBuf],
    pub artifact: &'a Path,
}

/// Captured result of one external process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal or by the timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len());
        text.push_str(&self.stdout);
        text.push_str(&self.stderr);
        text
    }

    /// Human readable exit description, e.g. `status 2`.
    pub fn describe_exit(&self) -> String {
        match (self.timed_out, self.exit_code) {
            (true, _) => "timed out".to_string(),
            (false, Some(code)) => format!("status {}", code),
            (false, None) => "terminated by signal".to_string(),
        }
    }
}
