use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tether_core::models::{SyncKind, SyncPriority};

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Track offline time and enforce the offline limit from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local state database
    #[arg(long, global = true, env = "TETHER_DB_PATH", value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the offline session, credential and queue
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record that the device lost connectivity
    Offline,
    /// Record that the device regained connectivity
    Online,
    /// Run one enforcement pass now
    Check,
    /// Store a fresh credential
    Login {
        /// Access token to store (a local token is generated when omitted)
        #[arg(long)]
        token: Option<String>,
    },
    /// Inspect and edit pending sync operations
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output file path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// List pending operations in delivery order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a new operation
    Add {
        #[arg(long, value_enum)]
        kind: KindArg,
        /// Identifier of the entity to synchronize
        #[arg(long)]
        entity: String,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
    },
    /// Mark an operation as delivered
    Done {
        /// Operation ID or unique ID prefix
        id: String,
    },
    /// Manually set an operation's priority
    Reset {
        /// Operation ID or unique ID prefix
        id: String,
        #[arg(long, value_enum)]
        priority: PriorityArg,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    Create,
    Update,
    Delete,
    Upload,
}

impl From<KindArg> for SyncKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Create => Self::Create,
            KindArg::Update => Self::Update,
            KindArg::Delete => Self::Delete,
            KindArg::Upload => Self::Upload,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<PriorityArg> for SyncPriority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Self::Low,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::High => Self::High,
            PriorityArg::Critical => Self::Critical,
        }
    }
}
