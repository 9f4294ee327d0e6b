//! External configuration check.

use std::io;
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` rejected the configuration ({status}):\n{output}")]
    Rejected {
        command: String,
        status: String,
        output: String,
    },
}

/// Asks the proxy server whether the published configuration is valid.
pub trait ConfigChecker {
    fn check(&self) -> Result<(), CheckError>;
}

impl<F> ConfigChecker for F
where
    F: Fn() -> Result<(), CheckError>,
{
    fn check(&self) -> Result<(), CheckError> {
        self()
    }
}

/// Runs an external command; a zero exit status means valid.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    program: String,
    args: Vec<String>,
}

impl CommandChecker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv list, program first. `None` when empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ConfigChecker for CommandChecker {
    fn check(&self) -> Result<(), CheckError> {
        let command = self.command_line();
        tracing::debug!(command = %command, "Running configuration check");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|source| CheckError::Spawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(CheckError::Rejected {
            command,
            status: output.status.to_string(),
            output: combined,
        })
    }
}
