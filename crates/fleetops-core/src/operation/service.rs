//! systemd service control

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use fleetops_exec::RemoteExecutor;
use fleetops_inventory::NodeRecord;
use serde::{Deserialize, Serialize};

use super::Operation;
use crate::error::CoreError;
use crate::outcome::{ErrorKind, Outcome};

/// Service manager action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Status,
}

impl ServiceAction {
    fn as_str(self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Status => "status",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            ServiceAction::Start => "started",
            ServiceAction::Stop => "stopped",
            ServiceAction::Restart => "restarted",
            ServiceAction::Status => "queried",
        }
    }
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(ServiceAction::Start),
            "stop" => Ok(ServiceAction::Stop),
            "restart" => Ok(ServiceAction::Restart),
            "status" => Ok(ServiceAction::Status),
            other => Err(CoreError::InvalidArgument(format!(
                "unknown service action '{other}' (expected start, stop, restart or status)"
            ))),
        }
    }
}

/// Run `systemctl <action> <service>` on every node
pub struct ServiceControl {
    executor: Arc<dyn RemoteExecutor>,
    service: String,
    action: ServiceAction,
    use_sudo: bool,
}

impl ServiceControl {
    /// Create a service control operation
    ///
    /// # Errors
    /// Returns `CoreError::InvalidArgument` if `service` is empty or contains
    /// characters outside `[A-Za-z0-9_.@-]`.
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        service: impl Into<String>,
        action: ServiceAction,
        use_sudo: bool,
    ) -> Result<Self, CoreError> {
        let service = service.into();
        let valid = !service.is_empty()
            && !service.starts_with('-')
            && service
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'));
        if !valid {
            return Err(CoreError::InvalidArgument(format!(
                "invalid service name '{service}'"
            )));
        }

        Ok(Self {
            executor,
            service,
            action,
            use_sudo,
        })
    }

    fn command(&self) -> String {
        // status needs no privileges and must not page
        match self.action {
            ServiceAction::Status => format!("systemctl status --no-pager {}", self.service),
            action if self.use_sudo => format!("sudo systemctl {action} {}", self.service),
            action => format!("systemctl {action} {}", self.service),
        }
    }
}

/// The `Active:` line of `systemctl status`, if present
fn active_line(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("Active:"))
}

#[async_trait]
impl Operation for ServiceControl {
    fn name(&self) -> &str {
        "service"
    }

    async fn execute(&self, node: &NodeRecord) -> Outcome {
        let result = match self
            .executor
            .run_command(&node.address, &self.command())
            .await
        {
            Ok(result) => result,
            Err(e) => return Outcome::from_exec_error(&node.hostname, &e),
        };

        let state = active_line(&result.stdout);

        if result.success() {
            let detail = match state {
                Some(active) => format!("{}: {active}", self.service),
                None => format!("{} {}", self.service, self.action.past_tense()),
            };
            Outcome::success(&node.hostname, detail)
        } else {
            let reason = state
                .map(str::to_string)
                .or_else(|| {
                    let stderr = result.stderr.trim();
                    (!stderr.is_empty()).then(|| stderr.to_string())
                })
                .unwrap_or_else(|| format!("exit status {}", result.status));
            Outcome::failed(
                &node.hostname,
                ErrorKind::NonZeroExit,
                format!("{} {} failed: {reason}", self.action, self.service),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedExecutor, exit};
    use fleetops_exec::{CommandResult, ExecError};

    fn node() -> NodeRecord {
        NodeRecord::new("app1", "10.0.0.3", "application", "staging")
    }

    #[test]
    fn test_rejects_shell_metacharacters() {
        let executor: Arc<dyn RemoteExecutor> = Arc::new(ScriptedExecutor::new());
        for bad in ["", "nginx; rm -rf /", "$(reboot)", "-h", "a b"] {
            assert!(
                ServiceControl::new(executor.clone(), bad, ServiceAction::Restart, false).is_err(),
                "{bad:?} accepted"
            );
        }
        assert!(
            ServiceControl::new(executor, "getty@tty1.service", ServiceAction::Status, false)
                .is_ok()
        );
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("Restart".parse::<ServiceAction>().unwrap(), ServiceAction::Restart);
        assert!("reload".parse::<ServiceAction>().is_err());
    }

    #[tokio::test]
    async fn test_restart_with_sudo() {
        let executor = Arc::new(ScriptedExecutor::new().on("systemctl", exit(0, "")));
        let op = ServiceControl::new(executor.clone(), "nginx", ServiceAction::Restart, true)
            .unwrap();

        let outcome = op.execute(&node()).await;

        assert!(outcome.success);
        assert_eq!(outcome.detail, "nginx restarted");
        assert_eq!(executor.recorded(), vec!["10.0.0.3: sudo systemctl restart nginx"]);
    }

    #[tokio::test]
    async fn test_status_inactive_fails() {
        let output = "● nginx.service - nginx\n     Loaded: loaded\n     Active: inactive (dead)\n";
        let executor = ScriptedExecutor::new().on("systemctl status", exit(3, output));
        let op = ServiceControl::new(Arc::new(executor), "nginx", ServiceAction::Status, true)
            .unwrap();

        let outcome = op.execute(&node()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::NonZeroExit));
        assert_eq!(outcome.detail, "status nginx failed: Active: inactive (dead)");
    }

    #[tokio::test]
    async fn test_status_active() {
        let output = "     Active: active (running) since Mon 2024-01-01\n";
        let executor = ScriptedExecutor::new().on("systemctl status --no-pager nginx", exit(0, output));
        let op = ServiceControl::new(Arc::new(executor), "nginx", ServiceAction::Status, false)
            .unwrap();

        let outcome = op.execute(&node()).await;

        assert!(outcome.success);
        assert_eq!(outcome.detail, "nginx: Active: active (running) since Mon 2024-01-01");
    }

    #[tokio::test]
    async fn test_stop_failure_uses_stderr() {
        let reply = Ok(CommandResult {
            status: 5,
            stdout: String::new(),
            stderr: "Failed to stop foo.service: Unit foo.service not loaded.\n".into(),
            duration: std::time::Duration::from_millis(1),
        });
        let executor = ScriptedExecutor::new().on("systemctl", reply);
        let op = ServiceControl::new(Arc::new(executor), "foo", ServiceAction::Stop, false).unwrap();

        let outcome = op.execute(&node()).await;

        assert_eq!(
            outcome.detail,
            "stop foo failed: Failed to stop foo.service: Unit foo.service not loaded."
        );
    }

    #[tokio::test]
    async fn test_transport_error() {
        let executor = ScriptedExecutor::new()
            .on("systemctl", Err(ExecError::AuthenticationFailed("denied".into())));
        let op = ServiceControl::new(Arc::new(executor), "nginx", ServiceAction::Start, false)
            .unwrap();

        let outcome = op.execute(&node()).await;

        assert_eq!(outcome.error, Some(ErrorKind::Authentication));
    }
}
