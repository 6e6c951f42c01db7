//! fleetops CLI
//!
//! Runs health checks, file deployments, package updates and service control
//! across a fleet of nodes with bounded concurrency.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::WrapErr;
use kameo::actor::Spawn;
use kameo::error::SendError;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use fleetops_core::{
    AggregateReport, ConcurrencyLimit, FleetActor, FleetActorArgs, FleetEvent, OperationRequest,
    ReportSink, RunOperation, ServiceAction, Subscribe,
};
use fleetops_inventory::{Inventory, NodeFilter};
use fleetops_pkg::UpdateKind;

mod config;
mod factory;
mod report;

use config::Config;
use factory::FleetExecutor;
use report::{ConsoleSink, LogFileSink, ReportFileSink};

/// Exit code when the success rate is below `--fail-under`
const GATE_FAILED: u8 = 2;

#[derive(Parser)]
#[command(name = "fleetops")]
#[command(about = "Run operations across a fleet of nodes", long_about = None, version)]
struct Cli {
    /// Config file (default: $FLEETOPS_CONFIG, ./fleetops.toml, ...)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Inventory file, overriding `inventory.path`
    #[arg(long)]
    inventory: Option<PathBuf>,

    /// Maximum nodes processed in parallel
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Only nodes with this role (repeatable)
    #[arg(long = "role")]
    roles: Vec<String>,

    /// Only nodes in this environment (repeatable)
    #[arg(long = "env")]
    environments: Vec<String>,

    /// Skip this hostname (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Directory for report files, overriding `logging.report_dir`
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Exit with status 2 when the success rate is below PERCENT
    #[arg(long, value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    fail_under: Option<u8>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Print the selected nodes
    List,
    /// Check liveness and resource usage
    Health,
    /// Copy a local file to every node
    Deploy {
        local: PathBuf,
        remote: String,
    },
    /// Apply package updates
    Update {
        /// security or full
        #[arg(long, default_value = "security")]
        kind: UpdateKind,
    },
    /// Start, stop, restart or query a systemd service
    Service {
        name: String,
        action: ServiceAction,
    },
}

impl Commands {
    fn into_request(self) -> Result<Option<OperationRequest>> {
        let request = match self {
            Commands::List => return Ok(None),
            Commands::Health => OperationRequest::HealthCheck,
            Commands::Deploy { local, remote } => {
                if !local.is_file() {
                    eyre::bail!("local file {} does not exist or is not a file", local.display());
                }
                std::fs::File::open(&local)
                    .wrap_err_with(|| format!("cannot read {}", local.display()))?;
                OperationRequest::Deploy {
                    local_file: local,
                    remote_path: remote,
                }
            }
            Commands::Update { kind } => OperationRequest::Update { kind },
            Commands::Service { name, action } => OperationRequest::Service {
                service: name,
                action,
            },
        };
        Ok(Some(request))
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_inventory(cli: &Cli, config: &Config) -> Result<Inventory> {
    let path = cli.inventory.as_ref().unwrap_or(&config.inventory.path);
    let inventory = Inventory::load(path)
        .wrap_err_with(|| format!("failed to load inventory {}", path.display()))?;

    let filter = NodeFilter {
        roles: cli.roles.clone(),
        environments: cli.environments.clone(),
        exclude: cli.exclude.clone(),
    };
    if filter.is_empty() {
        return Ok(inventory);
    }

    let selected = inventory.filter(&filter);
    info!(total = inventory.len(), selected = selected.len(), "inventory filtered");
    Ok(selected)
}

/// Print per-node progress to stderr until the channel closes
async fn print_progress(mut events: broadcast::Receiver<FleetEvent>) {
    let mut total = 0;
    let mut done = 0;
    loop {
        match events.recv().await {
            Ok(FleetEvent::DispatchStarted { total: t, .. }) => total = t,
            Ok(FleetEvent::NodeFinished { outcome }) => {
                done += 1;
                let status = if outcome.success { "ok" } else { "failed" };
                eprintln!("[{done}/{total}] {} {status}", outcome.hostname);
            }
            Ok(FleetEvent::DispatchFinished { .. }) | Err(broadcast::error::RecvError::Closed) => {
                break;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "progress display lagged");
            }
        }
    }
}

fn emit_report(report: &AggregateReport, cli: &Cli, config: &Config) -> Result<()> {
    ConsoleSink::stdout(cli.json)
        .emit(report)
        .wrap_err("failed to print report")?;

    let report_dir = cli
        .report_dir
        .clone()
        .unwrap_or_else(|| config.logging.report_dir.clone());
    let mut file_sinks: Vec<Box<dyn ReportSink>> = vec![
        Box::new(LogFileSink::new(&config.logging.log_dir)),
        Box::new(ReportFileSink::new(report_dir)),
    ];
    for sink in &mut file_sinks {
        if let Err(e) = sink.emit(report) {
            warn!(error = %e, "failed to persist report");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config_path = Config::locate(cli.config.as_deref());
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    init_tracing(&config.logging.level);
    match &config_path {
        Some(path) => info!(path = %path.display(), "config loaded"),
        None => warn!("no config file found, using defaults"),
    }

    let inventory = load_inventory(&cli, &config)?;

    let limit = match cli.concurrency {
        Some(n) => ConcurrencyLimit::new(n)?,
        None => config.dispatch.concurrency,
    };
    let settings = config.privileges()?;

    let Some(request) = cli.command.clone().into_request()? else {
        for node in inventory.iter() {
            println!("{node}");
        }
        return Ok(ExitCode::SUCCESS);
    };

    let executor = Arc::new(FleetExecutor::for_inventory(&config, &inventory)?);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling dispatch");
            interrupt.cancel();
        }
    });

    let actor = FleetActor::spawn(FleetActorArgs {
        limit,
        settings,
        cancel,
        ..FleetActorArgs::new(inventory, executor.clone())
    });

    let events = actor
        .ask(Subscribe)
        .await
        .map_err(|e| eyre::eyre!("fleet actor unavailable: {e}"))?;
    let progress = (!cli.json).then(|| tokio::spawn(print_progress(events.into_inner())));

    let result = actor.ask(RunOperation { request }).await;
    actor.stop_gracefully().await.ok();
    executor.shutdown().await;
    if let Some(progress) = progress {
        progress.await.ok();
    }

    let report = match result {
        Ok(report) => report,
        Err(SendError::HandlerError(e)) => return Err(e).wrap_err("dispatch failed"),
        Err(e) => eyre::bail!("fleet actor unavailable: {e}"),
    };

    emit_report(&report, &cli, &config)?;

    if let Some(threshold) = cli.fail_under
        && !report.meets(threshold)
    {
        eprintln!(
            "success rate {}% is below --fail-under {threshold}%",
            report.success_rate_percent
        );
        return Ok(ExitCode::from(GATE_FAILED));
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_globals_and_service() {
        let cli = Cli::try_parse_from([
            "fleetops", "-j", "4", "--role", "web", "--env", "prod", "--fail-under", "90",
            "service", "nginx", "restart",
        ])
        .unwrap();

        assert_eq!(cli.concurrency, Some(4));
        assert_eq!(cli.roles, vec!["web"]);
        assert_eq!(cli.fail_under, Some(90));
        assert!(matches!(
            cli.command,
            Commands::Service { ref name, action: ServiceAction::Restart } if name == "nginx"
        ));
    }

    #[test]
    fn test_update_kind_default() {
        let cli = Cli::try_parse_from(["fleetops", "update"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Update {
                kind: UpdateKind::Security
            }
        ));
    }

    #[test]
    fn test_fail_under_range() {
        assert!(Cli::try_parse_from(["fleetops", "--fail-under", "101", "health"]).is_err());
    }

    #[test]
    fn test_deploy_requires_existing_file() {
        let command = Commands::Deploy {
            local: PathBuf::from("/nonexistent/fleetops/app.conf"),
            remote: "/etc/app.conf".to_string(),
        };
        assert!(command.into_request().is_err());
    }

    #[test]
    fn test_list_has_no_request() {
        assert!(Commands::List.into_request().unwrap().is_none());
    }
}
