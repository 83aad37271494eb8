pub mod backup;
pub mod classify;
pub mod export;
pub mod import;
pub mod learn;
pub mod process;
pub mod reconcile;
pub mod review;
pub mod rules;
pub mod stats;
pub mod workspace;

use clap::{Parser, Subcommand, ValueEnum};

use crate::db::SqliteStore;
use crate::error::Result;
use crate::models::Source;
use crate::workspace::{resolve, Workspace, WorkspaceConfig};

/// Open the selected workspace with its store and config.
pub(crate) fn open(workspace: Option<&str>) -> Result<(Workspace, WorkspaceConfig, SqliteStore)> {
    let ws = resolve(workspace)?;
    let config = ws.config()?;
    let store = ws.open_store()?;
    Ok((ws, config, store))
}

#[derive(Parser)]
#[command(
    name = "nominal",
    version,
    about = "Learns nominal codes from bookkeeping history and auto-codes bank transactions."
)]
pub struct Cli {
    /// Workspace to use (default: the active workspace)
    #[arg(long, short, global = true)]
    pub workspace: Option<String>,
    /// Show debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceArg {
    /// Pre-coded bookkeeping history
    History,
    /// Uncoded bank statement
    Bank,
}

impl From<SourceArg> for Source {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::History => Source::History,
            SourceArg::Bank => Source::Bank,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, list, delete or switch workspaces.
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommands,
    },
    /// Import a CSV of history or bank records.
    Import {
        /// Which feed the file holds
        #[arg(value_enum)]
        source: SourceArg,
        /// Path to the CSV file
        file: String,
    },
    /// Learn fuzzy rules from coded history.
    Learn {
        /// Minimum majority share for a rule (default: workspace config)
        #[arg(long = "min-confidence")]
        min_confidence: Option<f64>,
    },
    /// Learn exact rules by matching bank records to history on date and amount.
    Reconcile {
        #[arg(long = "min-confidence")]
        min_confidence: Option<f64>,
    },
    /// Auto-code uncoded bank records using the current rules.
    Classify {
        /// Auto-code bar (default: workspace config)
        #[arg(long)]
        threshold: Option<f64>,
        /// Annotate unmatched records with keyword suggestions
        #[arg(long)]
        suggest: bool,
    },
    /// Run learn, reconcile and classify in order.
    Process {
        #[arg(long = "min-confidence")]
        min_confidence: Option<f64>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        suggest: bool,
    },
    /// List bank records that need a human decision.
    Review {
        #[arg(long)]
        threshold: Option<f64>,
        /// Show keyword suggestions alongside each record
        #[arg(long)]
        suggest: bool,
    },
    /// Accept a record's current code or suggestion.
    Approve {
        /// Record ID (shown in `nominal review`)
        id: i64,
    },
    /// Correct a record's code and teach a rule for its vendor.
    Override {
        /// Record ID
        id: i64,
        /// Corrected nominal code
        code: String,
        /// Correct this record only; don't create a rule
        #[arg(long = "no-rule")]
        no_rule: bool,
    },
    /// Manage vendor rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Export coded bank records as a Sage CSV.
    Export {
        /// Output path (default: <workspace>/exports/sage_import.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show workspace statistics.
    Stats,
    /// Back up the workspace database.
    Backup {
        /// Output path (default: <workspace>/backups/nominal-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum WorkspaceCommands {
    /// Create a workspace and make it active.
    Create { name: String },
    /// List workspaces.
    List,
    /// Delete a workspace and everything in it.
    Delete { name: String },
    /// Make a workspace the active one.
    Use { name: String },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules in match order.
    List {
        #[arg(long = "min-confidence")]
        min_confidence: Option<f64>,
    },
    /// Add an exact reviewer rule at full confidence.
    Add {
        /// Vendor text to match
        pattern: String,
        /// Nominal code to assign
        code: String,
    },
    /// Delete a rule by ID.
    Delete {
        /// Rule ID (shown in `nominal rules list`)
        id: i64,
    },
}
