use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "launchpad")]
#[command(about = "Launchpad control-plane CLI", long_about = None)]
pub struct Args {
    /// Launchpad server URL
    #[arg(long, env = "LAUNCHPAD_URL", default_value = "http://127.0.0.1:8900")]
    pub server_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all recipes and their status
    List,
    /// Show a single recipe
    Show {
        id: String,
    },
    /// Start a backend for a recipe
    Launch {
        id: String,
    },
    /// Cancel an in-flight launch
    Cancel {
        id: String,
    },
    /// Evict the process bound to a port
    Evict {
        #[arg(long)]
        port: u16,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Poll a recipe's inference health endpoint until ready
    WaitReady {
        id: String,
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Stream launch_progress/status/gpu/metrics events
    Events,
    /// Fetch control-plane self-metrics
    Metrics,
}
