use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tally_core::models::SyncDirection;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Keep a device's ledger in sync with the business's remote ledger")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the engine config (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update a record
    Put {
        /// Collection name, e.g. customers
        collection: String,
        /// Business partition the record belongs to
        #[arg(long)]
        partition: String,
        /// Entity fields as a JSON object
        #[arg(long, value_name = "JSON")]
        data: String,
        /// Existing record ID to update
        #[arg(long)]
        id: Option<String>,
    },
    /// Soft-delete a record
    Delete {
        collection: String,
        /// Record ID
        id: String,
    },
    /// List records of a partition, newest first
    List {
        collection: String,
        #[arg(long)]
        partition: String,
        /// Include tombstoned records
        #[arg(long)]
        include_deleted: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replicate a partition between the local and remote ledgers
    Sync {
        #[arg(long)]
        partition: String,
        #[arg(long, value_enum, default_value_t = DirectionArg::Both)]
        direction: DirectionArg,
        /// Use a second local database as the remote (instead of Turso)
        #[arg(long, value_name = "PATH")]
        remote_db: Option<PathBuf>,
        /// Keep live sync running until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Discard checkpoints and copy the partition again
    Resync {
        #[arg(long)]
        partition: String,
        #[arg(long, value_name = "PATH")]
        remote_db: Option<PathBuf>,
    },
    /// Show stored sync checkpoints
    Checkpoints {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Open the local database and bring its schema up to date
    Migrate,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DirectionArg {
    Both,
    Push,
    Pull,
}

impl From<DirectionArg> for SyncDirection {
    fn from(direction: DirectionArg) -> Self {
        match direction {
            DirectionArg::Both => Self::Both,
            DirectionArg::Push => Self::LocalToRemote,
            DirectionArg::Pull => Self::RemoteToLocal,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
