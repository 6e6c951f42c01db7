//! Scripted executor for unit tests

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fleetops_exec::{CommandResult, ExecError, RemoteExecutor};

/// Replies to commands by substring match, first rule wins
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    rules: Vec<(String, Result<CommandResult, ExecError>)>,
    copy_result: Option<ExecError>,
    pub(crate) calls: Mutex<Vec<String>>,
}

pub(crate) fn exit(status: i32, stdout: &str) -> Result<CommandResult, ExecError> {
    Ok(CommandResult {
        status,
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration: Duration::from_millis(1),
    })
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, needle: &str, reply: Result<CommandResult, ExecError>) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    pub(crate) fn failing_copy(mut self, err: ExecError) -> Self {
        self.copy_result = Some(err);
        self
    }

    pub(crate) fn recorded(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run_command(&self, address: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        self.calls.lock().unwrap().push(format!("{address}: {cmd}"));
        self.rules
            .iter()
            .find(|(needle, _)| cmd.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| exit(127, ""))
    }

    async fn copy_file(
        &self,
        address: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{address}: copy {} {remote_path}", local_path.display()));
        match &self.copy_result {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn executor_type(&self) -> &'static str {
        "scripted"
    }
}
