//! BranchSync daemon
//!
//! Runs the edge sync agent for one branch: push pending rows to the
//! center, pull central changes, sleep, repeat.
//!
//! # Commands
//!
//! - `run` - Run the sync loop until killed
//! - `once` - Run a single push/pull iteration and exit
//! - `version` - Show version information

mod client;

use branchsync_agent::{AgentConfig, HttpTransport, JsonStore, SyncAgent};
use clap::{Parser, Subcommand};
use client::ReqwestClient;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// BranchSync edge agent daemon.
#[derive(Parser)]
#[command(name = "branchsyncd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base address of the central endpoints
    #[arg(global = true, short, long, env = "BRANCHSYNC_SERVER")]
    server: Option<String>,

    /// Bearer credential for authenticating to the center
    #[arg(global = true, long, env = "BRANCHSYNC_TOKEN")]
    token: Option<String>,

    /// Path to the branch-local store file
    #[arg(global = true, long, env = "BRANCHSYNC_STORE")]
    store: Option<PathBuf>,

    /// Sleep between iterations, in milliseconds
    #[arg(global = true, long, env = "BRANCHSYNC_INTERVAL_MS", default_value = "60000")]
    interval_ms: u64,

    /// Maximum pending rows per entity kind per push
    #[arg(global = true, long, default_value = "200")]
    batch_size: usize,

    /// Bound on every remote call, in milliseconds
    #[arg(global = true, long, default_value = "30000")]
    timeout_ms: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync loop until killed
    Run,

    /// Run a single push/pull iteration and exit
    Once,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run => {
            let agent = build_agent(&cli)?;
            agent.run();
            Ok(())
        }
        Commands::Once => {
            let agent = build_agent(&cli)?;
            let outcome = agent.run_once();
            if let Some(push) = outcome.push {
                println!(
                    "push: sent={} applied={} conflicts={}",
                    push.sent, push.applied, push.conflicts
                );
            } else {
                println!("push: failed");
            }
            match outcome.pull {
                Some(pull) => println!(
                    "pull: records={} watermark={}",
                    pull.records, pull.watermark
                ),
                None => println!("pull: failed"),
            }
            if outcome.all_failed() {
                return Err("both sync phases failed".into());
            }
            Ok(())
        }
        Commands::Version => {
            println!("branchsyncd v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Assembles the agent from CLI configuration. Missing required
/// configuration is fatal.
fn build_agent(
    cli: &Cli,
) -> Result<SyncAgent<HttpTransport<ReqwestClient>, JsonStore>, Box<dyn std::error::Error>> {
    let server = cli
        .server
        .clone()
        .ok_or("central server address required (--server or BRANCHSYNC_SERVER)")?;
    let store_path = cli
        .store
        .clone()
        .ok_or("local store path required (--store or BRANCHSYNC_STORE)")?;

    let timeout = Duration::from_millis(cli.timeout_ms);
    let mut config = AgentConfig::new(server.clone())
        .with_sync_interval(Duration::from_millis(cli.interval_ms))
        .with_push_batch_size(cli.batch_size)
        .with_request_timeout(timeout);
    if let Some(token) = &cli.token {
        config = config.with_auth_token(token.clone());
    }

    let store = JsonStore::open(&store_path)?;
    let tenant = SyncAgent::<HttpTransport<ReqwestClient>, JsonStore>::discover_tenant(&store)?;
    tracing::info!(tenant = %tenant, store = %store_path.display(), "local store opened");

    let client = ReqwestClient::new(timeout, config.auth_token.clone())?;
    let transport = HttpTransport::new(server, client);

    Ok(SyncAgent::new(config, transport, store, tenant))
}
