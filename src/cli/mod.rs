pub mod agents;
pub mod hook;
pub mod policy;
pub mod queue;
pub mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{dirs_global, StewardConfig};
use crate::error::Result;

#[derive(Debug, Parser)]
#[command(name = "steward", version, about = "Permission policies and agent tracking for coding-agent hooks")]
pub struct Cli {
    /// Config file. Default: ~/.config/steward/config.yml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory from config.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the daemon socket path from config.
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the daemon: socket server, startup sweep and maintenance loop.
    Serve,
    /// Forward one hook payload from stdin to the daemon and print the response.
    Hook,
    /// Manage permission policies.
    Policy {
        #[command(subcommand)]
        action: PolicyCommand,
    },
    /// Inspect and decide queued permission requests.
    Queue {
        #[command(subcommand)]
        action: QueueCommand,
    },
    /// Inspect tracked agents.
    Agents {
        #[command(subcommand)]
        action: AgentsCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum PolicyCommand {
    /// List policies by descending priority.
    List,
    /// Create a policy.
    Add {
        name: String,
        /// Matcher expression, e.g. `Bash(npm *)`, `file:**/*.env`, `Read`.
        matcher: String,
        /// auto-approve, auto-deny or queue.
        #[arg(long, default_value = "queue")]
        action: String,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        priority: i64,
        /// Conditions as a JSON object.
        #[arg(long)]
        conditions: Option<String>,
        /// Create the policy disabled.
        #[arg(long)]
        disabled: bool,
    },
    Enable { id: String },
    Disable { id: String },
    Remove { id: String },
    /// Install the built-in default policies that are not present yet.
    InstallDefaults,
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// List pending requests.
    List {
        #[arg(long)]
        session: Option<String>,
    },
    /// Approve one or more pending requests.
    Approve {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Deny one or more pending requests.
    Deny {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Expire pending requests older than the given age.
    Expire {
        #[arg(long)]
        older_than_secs: u64,
    },
}

#[derive(Debug, Subcommand)]
pub enum AgentsCommand {
    /// Flat list of agents.
    List {
        /// Only agents in this status.
        #[arg(long)]
        status: Option<String>,
    },
    /// Agents as parent/child trees.
    Tree,
}

impl Cli {
    /// Config file plus command-line overrides.
    pub fn load_config(&self) -> Result<StewardConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| dirs_global().join("config.yml"));
        let mut config = StewardConfig::load_from(&path)?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut StewardConfig) {
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = Some(data_dir.clone());
        }
        if let Some(socket) = &self.socket {
            config.socket_path = Some(socket.clone());
        }
    }
}

pub async fn run(cli: Cli, config: StewardConfig) -> Result<()> {
    match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Hook => hook::run_hook(&config).await,
        Commands::Policy { action } => policy::run_policy(config, action).await,
        Commands::Queue { action } => queue::run_queue(config, action).await,
        Commands::Agents { action } => agents::run_agents(config, action).await,
    }
}
