//! Result aggregation and the report sink contract

use kameo_macros::Reply;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outcome::Outcome;

/// Success rate reported for a dispatch that attempted no nodes
///
/// Zero attempted nodes count as fully healthy rather than fully failed.
pub const ZERO_NODE_SUCCESS_RATE: u8 = 100;

/// Aggregated result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Reply)]
pub struct AggregateReport {
    /// Name of the operation that was dispatched
    pub operation: String,
    /// Number of outcomes
    pub total: usize,
    /// Outcomes with `success == true`
    pub succeeded: usize,
    /// `total - succeeded`
    pub failed: usize,
    /// `floor(100 * succeeded / total)`, or [`ZERO_NODE_SUCCESS_RATE`]
    pub success_rate_percent: u8,
    /// One outcome per node, sorted by hostname
    pub per_node: Vec<Outcome>,
    /// Nodes abandoned by cancellation, sorted; empty for a full dispatch
    #[serde(default)]
    pub abandoned: Vec<String>,
}

impl AggregateReport {
    /// Whether every attempted node succeeded
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Whether the dispatch was cut short by cancellation
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        !self.abandoned.is_empty()
    }

    /// Whether the success rate reaches `threshold_percent`
    #[must_use]
    pub fn meets(&self, threshold_percent: u8) -> bool {
        self.success_rate_percent >= threshold_percent
    }

    /// Failed outcomes in hostname order
    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.per_node.iter().filter(|o| !o.success)
    }

    /// One-line summary
    #[must_use]
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{}: total={} succeeded={} failed={} success_rate={}%",
            self.operation, self.total, self.succeeded, self.failed, self.success_rate_percent
        );
        if self.was_cancelled() {
            line.push_str(&format!(" abandoned={}", self.abandoned.len()));
        }
        line
    }

    /// Attach the hostnames abandoned by cancellation
    #[must_use]
    pub fn with_abandoned(mut self, mut abandoned: Vec<String>) -> Self {
        abandoned.sort();
        self.abandoned = abandoned;
        self
    }
}

/// Integer success rate, truncating toward zero
fn success_rate(succeeded: usize, total: usize) -> u8 {
    if total == 0 {
        return ZERO_NODE_SUCCESS_RATE;
    }
    // succeeded <= total, so the quotient is at most 100
    u8::try_from(succeeded * 100 / total).unwrap_or(100)
}

/// Reduce outcomes into an [`AggregateReport`]
///
/// Pure and total: the result depends only on the set of outcomes, not on
/// their order, and the empty sequence is valid.
pub fn aggregate(operation: impl Into<String>, mut outcomes: Vec<Outcome>) -> AggregateReport {
    outcomes.sort_by(|a, b| a.hostname.cmp(&b.hostname));

    let total = outcomes.len();
    let succeeded = outcomes.iter().filter(|o| o.success).count();

    AggregateReport {
        operation: operation.into(),
        total,
        succeeded,
        failed: total - succeeded,
        success_rate_percent: success_rate(succeeded, total),
        per_node: outcomes,
        abandoned: Vec::new(),
    }
}

/// Errors a report sink can raise
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing the report failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering the report failed
    #[error("format error: {0}")]
    Format(String),
}

/// Destination for aggregate reports (console, log file, report file)
pub trait ReportSink {
    /// Render or persist one report
    ///
    /// # Errors
    /// Returns `SinkError` if the report cannot be written.
    fn emit(&mut self, report: &AggregateReport) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ErrorKind;

    fn outcomes(pattern: &[bool]) -> Vec<Outcome> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, ok)| {
                let host = format!("node{i:02}");
                if *ok {
                    Outcome::success(host, "ok")
                } else {
                    Outcome::failed(host, ErrorKind::Connection, "unreachable")
                }
            })
            .collect()
    }

    #[test]
    fn test_counts_and_truncation() {
        // 2 of 3 is 66.67%, truncated to 66
        let report = aggregate("health", outcomes(&[true, false, true]));

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.success_rate_percent, 66);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn test_invariants_over_many_patterns() {
        for n in 0..=12usize {
            for mask in 0..(1u32 << n.min(8)) {
                let pattern: Vec<bool> = (0..n).map(|i| i < 8 && mask & (1 << i) != 0).collect();
                let report = aggregate("op", outcomes(&pattern));

                assert_eq!(report.succeeded + report.failed, report.total);
                if report.total > 0 {
                    let expected = (100 * report.succeeded / report.total) as u8;
                    assert_eq!(report.success_rate_percent, expected);
                }
            }
        }
    }

    #[test]
    fn test_zero_nodes_is_fully_healthy() {
        let report = aggregate("health", Vec::new());

        assert_eq!(report.total, 0);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(report.success_rate_percent, ZERO_NODE_SUCCESS_RATE);
        assert_eq!(report.success_rate_percent, 100);
    }

    #[test]
    fn test_order_independent() {
        let forward = outcomes(&[true, false, true, false, false]);
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(aggregate("op", forward), aggregate("op", reversed));
    }

    #[test]
    fn test_per_node_sorted() {
        let report = aggregate(
            "op",
            vec![
                Outcome::success("web2", "ok"),
                Outcome::success("db1", "ok"),
                Outcome::success("web1", "ok"),
            ],
        );
        let hosts: Vec<_> = report.per_node.iter().map(|o| o.hostname.as_str()).collect();
        assert_eq!(hosts, vec!["db1", "web1", "web2"]);
    }

    #[test]
    fn test_summary_and_threshold() {
        let report = aggregate("update", outcomes(&[true, true, true, false, false]))
            .with_abandoned(vec!["z".into(), "a".into()]);

        assert_eq!(report.success_rate_percent, 60);
        assert!(report.meets(60));
        assert!(!report.meets(61));
        assert_eq!(report.abandoned, vec!["a", "z"]);
        assert_eq!(
            report.summary_line(),
            "update: total=5 succeeded=3 failed=2 success_rate=60% abandoned=2"
        );
        assert_eq!(report.failures().count(), 2);
    }
}
