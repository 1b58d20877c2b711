//! External tool execution with a testable seam.
//!
//! The `CommandExecutor` trait lets the ffmpeg toolkit and the command-line
//! synthesizer run against a mock in tests.

use crate::error::{DubError, Result};
use std::collections::VecDeque;
use std::process::Command;
use std::sync::{Mutex, MutexGuard};

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use from pool workers.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments.
    ///
    /// Returns the stdout of the command on success.
    /// Returns an error if the command fails or is not found.
    fn execute(&self, command: &str, args: &[&str]) -> Result<String>;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for std::sync::Arc<E> {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        (**self).execute(command, args)
    }
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        tracing::trace!(command, ?args, "running external tool");
        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DubError::ToolNotFound {
                    tool: command.to_string(),
                }
            } else {
                DubError::ToolFailed {
                    tool: command.to_string(),
                    message: format!("failed to start: {}", e),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::ToolFailed {
                tool: command.to_string(),
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Mock command executor for testing.
///
/// Records all command executions and returns configured responses in order,
/// then empty successes once the queue is exhausted.
#[derive(Debug, Default)]
pub struct MockCommandExecutor {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    responses: Mutex<VecDeque<Result<String>>>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successful response to the queue.
    pub fn with_response(self, response: &str) -> Self {
        lock(&self.responses).push_back(Ok(response.to_string()));
        self
    }

    /// Add an error response to the queue.
    pub fn with_error(self, error: DubError) -> Self {
        lock(&self.responses).push_back(Err(error));
        self
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Get a specific call by index.
    pub fn call(&self, index: usize) -> Option<(String, Vec<String>)> {
        lock(&self.calls).get(index).cloned()
    }
}

impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        lock(&self.calls).push((
            command.to_string(),
            args.iter().map(|s| s.to_string()).collect(),
        ));

        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_executor_is_object_safe() {
        let executor: Box<dyn CommandExecutor> = Box::new(MockCommandExecutor::new());
        let result = executor.execute("ffmpeg", &["-version"]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_mock_executor_records_calls() {
        let mock = MockCommandExecutor::new();

        mock.execute("ffprobe", &["clip.wav"]).unwrap();
        mock.execute("ffmpeg", &["-i", "clip.wav"]).unwrap();

        assert_eq!(mock.call_count(), 2);

        let call1 = mock.call(0).unwrap();
        assert_eq!(call1.0, "ffprobe");
        assert_eq!(call1.1, vec!["clip.wav"]);

        let call2 = mock.call(1).unwrap();
        assert_eq!(call2.0, "ffmpeg");
        assert_eq!(call2.1, vec!["-i", "clip.wav"]);
    }

    #[test]
    fn test_mock_executor_returns_configured_response() {
        let mock = MockCommandExecutor::new()
            .with_response("output1")
            .with_response("output2");

        assert_eq!(mock.execute("cmd1", &[]).unwrap(), "output1");
        assert_eq!(mock.execute("cmd2", &[]).unwrap(), "output2");

        // After configured responses are exhausted, returns empty string
        assert_eq!(mock.execute("cmd3", &[]).unwrap(), "");
    }

    #[test]
    fn test_mock_executor_returns_configured_error() {
        let mock = MockCommandExecutor::new().with_error(DubError::ToolNotFound {
            tool: "missing-tool".to_string(),
        });

        match mock.execute("missing-tool", &[]) {
            Err(DubError::ToolNotFound { tool }) => assert_eq!(tool, "missing-tool"),
            other => panic!("Expected ToolNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_system_executor_missing_tool() {
        let executor = SystemCommandExecutor::new();
        let result = executor.execute("dubweave-definitely-not-a-real-tool", &[]);
        assert!(matches!(result, Err(DubError::ToolNotFound { .. })));
    }

    #[test]
    fn test_command_executor_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SystemCommandExecutor>();
        assert_send_sync::<MockCommandExecutor>();
    }
}
