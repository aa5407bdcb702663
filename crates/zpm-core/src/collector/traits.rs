//! Abstraction over external command execution.
//!
//! The `CommandRunner` trait lets sources run the real storage utilities in production
//! and canned output in tests.

use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, trace};

/// Error raised when an external command cannot deliver its output.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The argument vector was empty.
    #[error("empty command")]
    Empty,
    /// The program could not be started (not found, not executable, ...).
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The program ran but exited unsuccessfully.
    #[error("{program} {}", describe_exit(.code))]
    Exit { program: String, code: Option<i32> },
    /// The program wrote something that is not UTF-8 to stdout.
    #[error("{program} produced non-UTF-8 output")]
    Utf8 { program: String },
}

impl CommandError {
    /// Exit code of the failed program, if it exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Exit { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

/// Runs argument vectors on behalf of sources and tracked jobs.
///
/// Implementations must fail on any unsuccessful exit so that callers never see output
/// from a command that did not complete.
pub trait CommandRunner: Send + Sync {
    /// Runs the command and returns its captured standard output.
    fn run(&self, argv: &[String]) -> Result<String, CommandError>;

    /// Runs the command with its output passed through, checking only the exit status.
    fn status(&self, argv: &[String]) -> Result<(), CommandError>;
}

/// Runner that spawns real processes.
///
/// Stdout is captured, stderr is passed through to the parent.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> Result<String, CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
        debug!(command = %argv.join(" "), "running command");

        let output = Command::new(program)
            .args(args)
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError::Exit {
                program: program.clone(),
                code: output.status.code(),
            });
        }

        trace!(program = %program, bytes = output.stdout.len(), "command finished");
        String::from_utf8(output.stdout).map_err(|_| CommandError::Utf8 {
            program: program.clone(),
        })
    }

    fn status(&self, argv: &[String]) -> Result<(), CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
        debug!(command = %argv.join(" "), "running command with inherited output");

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(CommandError::Exit {
                program: program.clone(),
                code: status.code(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_empty_argv() {
        let err = SystemRunner::new().run(&[]).unwrap_err();
        assert!(matches!(err, CommandError::Empty));
    }

    #[test]
    fn test_missing_program() {
        let err = SystemRunner::new()
            .run(&argv(&["/nonexistent/zpm-test-binary-12345"]))
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
        assert_eq!(err.exit_code(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout() {
        let out = SystemRunner::new().run(&argv(&["echo", "hello"])).unwrap();
        assert_eq!(out, "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_carries_code() {
        let err = SystemRunner::new()
            .run(&argv(&["sh", "-c", "exit 3"]))
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(err.to_string(), "sh exited with status 3");
    }

    #[cfg(unix)]
    #[test]
    fn test_status_ignores_binary_stdout() {
        let runner = SystemRunner::new();
        let cmd = argv(&["sh", "-c", "printf '\\377'; exit 0"]);
        assert!(matches!(runner.run(&cmd), Err(CommandError::Utf8 { .. })));
        assert!(runner.status(&cmd).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_status_nonzero_exit_carries_code() {
        let err = SystemRunner::new()
            .status(&argv(&["sh", "-c", "exit 4"]))
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(4));
    }

    #[test]
    fn test_status_missing_program() {
        let err = SystemRunner::new()
            .status(&argv(&["/nonexistent/zpm-test-binary-12345"]))
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
