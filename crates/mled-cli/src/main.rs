//! mled - Command-line MLED controller and software node
//!
//! Discover LED nodes on the local network, master the show clock, and run
//! synchronized pattern cues from the command line.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use mled_controller::{
    run_show, Controller, ControllerConfig, ControllerServer, NodeStatus, ServerConfig,
    ShowOutcome, ShowRequest, ShowSelector,
};
use mled_core::CuePrepare;
use mled_node::{NodeConfig, NodeRuntime, TracingSink};
use mled_transport::GroupConfig;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod pattern_args;

use pattern_args::PatternArgs;

/// MLED - multicast show control for addressable-LED nodes
#[derive(Parser)]
#[command(name = "mled")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Multicast group address
    #[arg(long, global = true, default_value_t = mled_core::DEFAULT_GROUP)]
    group: Ipv4Addr,

    /// UDP port
    #[arg(long, global = true, default_value_t = mled_core::DEFAULT_PORT)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Target one node by id (decimal or 0x-hex)
    #[arg(long, value_parser = parse_u32)]
    node: Option<u32>,

    /// Target one node by name
    #[arg(long)]
    name: Option<String>,
}

impl TargetArgs {
    fn selector(&self) -> Result<ShowSelector> {
        match (self.node, &self.name) {
            (Some(_), Some(_)) => bail!("--node and --name are mutually exclusive"),
            (Some(id), None) => Ok(ShowSelector::Node(id)),
            (None, Some(name)) => Ok(ShowSelector::Name(name.clone())),
            (None, None) => Ok(ShowSelector::All),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Discover nodes and print what answered
    Discover {
        /// Print the node table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Beacon show-time and answer sync requests for a while
    Sync {
        /// Window length in milliseconds
        #[arg(long, default_value = "2000")]
        window_ms: u64,
    },

    /// Run the full sequence: discover, sync, prepare, fire
    Show {
        #[command(flatten)]
        target: TargetArgs,

        /// Cue id to prepare and fire
        #[arg(long, default_value = "1")]
        cue_id: u32,

        /// Fade-in on activation, milliseconds
        #[arg(long, default_value = "0")]
        fade_in_ms: u16,

        /// Fade-out on cancel, milliseconds
        #[arg(long, default_value = "0")]
        fade_out_ms: u16,

        /// Sync window before preparing, milliseconds
        #[arg(long, default_value = "1200")]
        sync_ms: u64,

        /// Skip the post-fire convergence check
        #[arg(long)]
        no_verify: bool,

        #[command(flatten)]
        pattern: PatternArgs,
    },

    /// Multicast a cancel for a cue
    Cancel {
        /// Cue id to cancel
        cue_id: u32,
    },

    /// Run as a long-lived controller daemon
    Serve {
        /// Print a node status table every N seconds (0 disables)
        #[arg(long, default_value = "10")]
        status_every: u64,
    },

    /// Run as a software node
    Node {
        /// Node id (decimal or 0x-hex); random when omitted
        #[arg(long, value_parser = parse_u32)]
        id: Option<u32>,

        /// Node name reported in discovery
        #[arg(long)]
        name: Option<String>,
    },
}

fn parse_u32(s: &str) -> std::result::Result<u32, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|_| format!("invalid u32: {s}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    let group = GroupConfig {
        group: cli.group,
        port: cli.port,
        ..GroupConfig::default()
    };

    match cli.command {
        Commands::Discover { json } => discover(&group, json).await?,

        Commands::Sync { window_ms } => {
            let mut controller = Controller::new(&group, ControllerConfig::default())?;
            println!(
                "{} Beaconing epoch {:#010x} for {}ms",
                "MLED".cyan().bold(),
                controller.epoch(),
                window_ms
            );
            let answered = controller
                .sync_window(Duration::from_millis(window_ms))
                .await?;
            println!("  answered {} time request(s)", answered);
        }

        Commands::Show {
            target,
            cue_id,
            fade_in_ms,
            fade_out_ms,
            sync_ms,
            no_verify,
            pattern,
        } => {
            let cue = CuePrepare {
                cue_id,
                fade_in_ms,
                fade_out_ms,
                pattern: pattern.to_config()?,
            };
            let mut request = ShowRequest::new(target.selector()?, cue);
            request.sync_window = Duration::from_millis(sync_ms);
            request.verify = !no_verify;

            let mut controller = Controller::new(&group, ControllerConfig::default())?;
            let outcome = run_show(&mut controller, request).await?;
            report_show(outcome)?;
        }

        Commands::Cancel { cue_id } => {
            let mut controller = Controller::new(&group, ControllerConfig::default())?;
            controller.cancel(cue_id).await?;
            println!("{} Cancelled cue {}", "MLED".cyan().bold(), cue_id);
        }

        Commands::Serve { status_every } => serve(&group, status_every).await?,

        Commands::Node { id, name } => {
            let node_id = id.unwrap_or_else(rand::random);
            let name = name.unwrap_or_else(|| format!("mled-{node_id:08x}"));
            println!(
                "{} Node {:#010x} ({}) joining {}:{}",
                "MLED".cyan().bold(),
                node_id,
                name,
                cli.group,
                cli.port
            );
            let runtime = NodeRuntime::new(NodeConfig::new(node_id, name), &group, TracingSink)?;
            tokio::select! {
                result = runtime.run() => result?,
                _ = tokio::signal::ctrl_c() => info!("shutting down"),
            }
        }
    }

    Ok(())
}

async fn discover(group: &GroupConfig, json: bool) -> Result<()> {
    let mut controller = Controller::new(group, ControllerConfig::default())?;
    let table = controller.discover().await?;
    let now = Instant::now();

    if json {
        println!("{}", serde_json::to_string_pretty(&table.snapshot(now))?);
        return Ok(());
    }

    if table.is_empty() {
        println!("{} No nodes answered", "MLED".cyan().bold());
        return Ok(());
    }

    println!(
        "{} {} node(s) answered",
        "MLED".cyan().bold(),
        table.len()
    );
    println!(
        "  {:<10} {:<16} {:<8} {:>5} {:<10} {:>6}  {}",
        "ID", "NAME", "STATUS", "RSSI", "PATTERN", "CUE", "ADDR"
    );
    for record in table.records() {
        let dto = record.to_dto(now);
        let status = match dto.status {
            NodeStatus::Online => "online".green(),
            NodeStatus::Weak => "weak".yellow(),
            NodeStatus::Offline => "offline".red(),
        };
        println!(
            "  {:<10} {:<16} {:<8} {:>5} {:<10} {:>6}  {}",
            format!("{:#010x}", dto.node_id),
            dto.name,
            status,
            dto.rssi_dbm,
            dto.pattern,
            dto.active_cue_id,
            dto.addr
        );
    }
    Ok(())
}

fn report_show(outcome: ShowOutcome) -> Result<()> {
    match outcome {
        ShowOutcome::Converged { nodes } => {
            println!(
                "{} {} node(s) running the cue",
                "MLED".cyan().bold(),
                nodes.to_string().green()
            );
            Ok(())
        }
        ShowOutcome::Fired { prepared } => {
            println!(
                "{} Fired on {} prepared node(s) (unverified)",
                "MLED".cyan().bold(),
                prepared
            );
            Ok(())
        }
        ShowOutcome::NotConverged { expected, active } => {
            bail!("only {active} of {expected} node(s) switched to the cue")
        }
        ShowOutcome::PrepareUnconfirmed { node_id, code } => match code {
            Some(code) => bail!("node {node_id:#010x} refused the prepare (code {code})"),
            None => bail!("node {node_id:#010x} never acknowledged the prepare"),
        },
    }
}

async fn serve(group: &GroupConfig, status_every: u64) -> Result<()> {
    let server = ControllerServer::new(group, ServerConfig::default())?;
    println!(
        "{} Serving epoch {:#010x} on {}:{}",
        "MLED".cyan().bold(),
        server.epoch(),
        group.group,
        group.port
    );

    let table = server.table();
    if status_every > 0 {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_secs(status_every));
            loop {
                timer.tick().await;
                let snapshot = table.read().snapshot(Instant::now());
                info!(nodes = snapshot.len(), "fleet status");
                for node in snapshot {
                    info!(
                        id = node.node_id,
                        name = %node.name,
                        status = ?node.status,
                        cue = node.active_cue_id,
                        "node"
                    );
                }
            }
        });
    }

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_json() {
        setup_logging("warn", true).unwrap();
    }

    #[test]
    fn test_parse_u32_accepts_hex_and_decimal() {
        assert_eq!(parse_u32("42").unwrap(), 42);
        assert_eq!(parse_u32("0xAB").unwrap(), 0xAB);
        assert!(parse_u32("zebra").is_err());
    }

    #[test]
    fn test_target_selector_exclusive() {
        let both = TargetArgs {
            node: Some(1),
            name: Some("x".to_string()),
        };
        assert!(both.selector().is_err());

        let neither = TargetArgs {
            node: None,
            name: None,
        };
        assert_eq!(neither.selector().unwrap(), ShowSelector::All);
    }
}
