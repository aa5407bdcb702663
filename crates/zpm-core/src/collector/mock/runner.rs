//! In-memory command runner for testing.
//!
//! `MockRunner` answers each argument vector with canned stdout or a scripted failure,
//! so tests can run on any platform without `zpool`, `iostat` or `sysctl`.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use crate::collector::traits::{CommandError, CommandRunner};

#[derive(Debug, Clone)]
enum MockOutput {
    Stdout(String),
    Exit(i32),
}

/// In-memory command runner.
///
/// Clones share the call log, so a test can hand a clone to a collector and inspect
/// the calls afterwards.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    outputs: HashMap<Vec<String>, MockOutput>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockRunner {
    /// Creates a runner that knows no commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `argv` succeed with the given stdout.
    pub fn add_output(&mut self, argv: &[&str], stdout: impl Into<String>) {
        self.outputs
            .insert(to_key(argv), MockOutput::Stdout(stdout.into()));
    }

    /// Makes `argv` exit with the given non-zero code.
    pub fn add_failure(&mut self, argv: &[&str], code: i32) {
        self.outputs.insert(to_key(argv), MockOutput::Exit(code));
    }

    /// Forgets `argv`, so running it behaves like a missing program.
    pub fn remove(&mut self, argv: &[&str]) {
        self.outputs.remove(&to_key(argv));
    }

    /// Every argument vector run so far, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn to_key(argv: &[&str]) -> Vec<String> {
    argv.iter().map(|a| a.to_string()).collect()
}

impl CommandRunner for MockRunner {
    fn run(&self, argv: &[String]) -> Result<String, CommandError> {
        let program = argv.first().ok_or(CommandError::Empty)?;

        match self.calls.lock() {
            Ok(mut calls) => calls.push(argv.to_vec()),
            Err(poisoned) => poisoned.into_inner().push(argv.to_vec()),
        }

        match self.outputs.get(argv) {
            Some(MockOutput::Stdout(out)) => Ok(out.clone()),
            Some(MockOutput::Exit(code)) => Err(CommandError::Exit {
                program: program.clone(),
                code: Some(*code),
            }),
            None => Err(CommandError::Spawn {
                program: program.clone(),
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no mock output for {:?}", argv),
                ),
            }),
        }
    }

    /// Same table as `run`; canned stdout is discarded.
    fn status(&self, argv: &[String]) -> Result<(), CommandError> {
        self.run(argv).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        to_key(parts)
    }

    #[test]
    fn test_canned_output() {
        let mut runner = MockRunner::new();
        runner.add_output(&["echo", "hi"], "hi\n");
        assert_eq!(runner.run(&argv(&["echo", "hi"])).unwrap(), "hi\n");
    }

    #[test]
    fn test_scripted_failure() {
        let mut runner = MockRunner::new();
        runner.add_failure(&["false"], 1);
        let err = runner.run(&argv(&["false"])).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_unknown_command_is_spawn_error() {
        let runner = MockRunner::new();
        let err = runner.run(&argv(&["zpool"])).unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[test]
    fn test_clones_share_call_log() {
        let mut runner = MockRunner::new();
        runner.add_output(&["true"], "");
        let clone = runner.clone();
        clone.run(&argv(&["true"])).unwrap();
        clone.run(&argv(&["missing"])).unwrap_err();
        assert_eq!(runner.calls(), vec![argv(&["true"]), argv(&["missing"])]);
    }
}
