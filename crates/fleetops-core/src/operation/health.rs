//! Liveness probe with best-effort utilisation metrics

use std::sync::Arc;

use async_trait::async_trait;
use fleetops_exec::RemoteExecutor;
use fleetops_inventory::NodeRecord;
use tracing::debug;

use super::Operation;
use crate::outcome::Outcome;

const LIVENESS_CMD: &str = "uptime";
const CPU_CMD: &str = r"top -bn1 | grep 'Cpu(s)' | sed 's/.*, *\([0-9.]*\)%* id.*/\1/' | awk '{print 100 - $1}'";
const MEMORY_CMD: &str = r#"free | awk '/^Mem:/ {printf "%.1f", $3/$2*100}'"#;
const DISK_CMD: &str = r#"df -P / | awk 'NR==2 {gsub("%", "", $5); print $5}'"#;

/// Utilisation percentages; `None` when a metric could not be read
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthMetrics {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
}

impl std::fmt::Display for HealthMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn pct(v: Option<f64>) -> String {
            v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}%"))
        }
        write!(
            f,
            "cpu {}, mem {}, disk {}",
            pct(self.cpu_percent),
            pct(self.memory_percent),
            pct(self.disk_percent)
        )
    }
}

/// Health check: `uptime` decides success, metrics only enrich the detail
pub struct HealthCheck {
    executor: Arc<dyn RemoteExecutor>,
}

impl HealthCheck {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }

    /// Run one metric command; any failure yields `None`
    async fn metric(&self, address: &str, cmd: &str) -> Option<f64> {
        match self.executor.run_command(address, cmd).await {
            Ok(result) if result.success() => parse_percent(&result.stdout),
            Ok(result) => {
                debug!(address = %address, status = result.status, "metric command failed");
                None
            }
            Err(e) => {
                debug!(address = %address, error = %e, "metric command errored");
                None
            }
        }
    }

    async fn metrics(&self, address: &str) -> HealthMetrics {
        // sequential: one node never holds more than one executor call at a time
        HealthMetrics {
            cpu_percent: self.metric(address, CPU_CMD).await,
            memory_percent: self.metric(address, MEMORY_CMD).await,
            disk_percent: self.metric(address, DISK_CMD).await,
        }
    }
}

fn parse_percent(output: &str) -> Option<f64> {
    let value: f64 = output.trim().trim_end_matches('%').parse().ok()?;
    (0.0..=100.0).contains(&value).then_some(value)
}

#[async_trait]
impl Operation for HealthCheck {
    fn name(&self) -> &str {
        "health"
    }

    async fn execute(&self, node: &NodeRecord) -> Outcome {
        let probe = self
            .executor
            .run_command(&node.address, LIVENESS_CMD)
            .await
            .and_then(fleetops_exec::CommandResult::into_checked);

        let uptime = match probe {
            Ok(result) => result.stdout.trim().to_string(),
            Err(e) => return Outcome::from_exec_error(&node.hostname, &e),
        };

        let metrics = self.metrics(&node.address).await;
        Outcome::success(&node.hostname, format!("up: {uptime}; {metrics}"))
    }
}
