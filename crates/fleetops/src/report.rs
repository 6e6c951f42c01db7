//! Report sinks: console, append-only log file, per-run report file

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use fleetops_core::{AggregateReport, Outcome, ReportSink, SinkError};

const LOG_FILE_NAME: &str = "fleetops.log";
const LOG_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";
const REPORT_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

fn node_line(outcome: &Outcome) -> String {
    let status = if outcome.success { "OK  " } else { "FAIL" };
    match outcome.error {
        Some(kind) => format!("{status} {} [{kind}] {}", outcome.hostname, outcome.detail),
        None => format!("{status} {} {}", outcome.hostname, outcome.detail),
    }
}

fn render_lines(report: &AggregateReport) -> Vec<String> {
    let mut lines: Vec<String> = report.per_node.iter().map(node_line).collect();
    if report.was_cancelled() {
        lines.push(format!("abandoned: {}", report.abandoned.join(", ")));
    }
    lines.push(report.summary_line());
    lines
}

/// Prints the report to a writer, stdout by default
pub struct ConsoleSink<W = io::Stdout> {
    out: W,
    json: bool,
}

impl ConsoleSink {
    #[must_use]
    pub fn stdout(json: bool) -> Self {
        Self::new(io::stdout(), json)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn emit(&mut self, report: &AggregateReport) -> Result<(), SinkError> {
        if self.json {
            let rendered = serde_json::to_string_pretty(report)
                .map_err(|e| SinkError::Format(e.to_string()))?;
            writeln!(self.out, "{rendered}")?;
        } else {
            for line in render_lines(report) {
                writeln!(self.out, "{line}")?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Appends timestamped lines to `<log_dir>/fleetops.log`
pub struct LogFileSink {
    path: PathBuf,
}

impl LogFileSink {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(LOG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for LogFileSink {
    fn emit(&mut self, report: &AggregateReport) -> Result<(), SinkError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let stamp = Local::now().format(LOG_TIMESTAMP);
        for line in render_lines(report) {
            writeln!(file, "[{stamp}] {line}")?;
        }
        Ok(())
    }
}

/// Writes one `<operation>_report_<timestamp>.txt` per report
pub struct ReportFileSink {
    dir: PathBuf,
    last_written: Option<PathBuf>,
}

impl ReportFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_written: None,
        }
    }

    /// Path of the most recently written report
    pub fn last_written(&self) -> Option<&Path> {
        self.last_written.as_deref()
    }
}

impl ReportSink for ReportFileSink {
    fn emit(&mut self, report: &AggregateReport) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir)?;

        let now = Local::now();
        let path = self.dir.join(format!(
            "{}_report_{}.txt",
            report.operation,
            now.format(REPORT_TIMESTAMP)
        ));

        let mut body = format!(
            "fleetops {} report\ngenerated: {}\n\n",
            report.operation,
            now.format(LOG_TIMESTAMP)
        );
        for line in render_lines(report) {
            body.push_str(&line);
            body.push('\n');
        }
        fs::write(&path, body)?;

        tracing::info!(path = %path.display(), "report written");
        self.last_written = Some(path);
        Ok(())
    }
}
