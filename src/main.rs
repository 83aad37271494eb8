mod classifier;
mod cli;
mod db;
mod error;
mod exporter;
mod fmt;
mod importer;
mod learner;
mod matcher;
mod models;
mod pipeline;
mod reconciler;
mod reports;
mod reviewer;
mod settings;
mod store;
mod suggester;
mod workspace;

use clap::Parser;
use tracing_subscriber::{fmt as log_fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands, RulesCommands, WorkspaceCommands};

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins, then --verbose, then warnings only.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            log_fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let ws = cli.workspace.as_deref();
    let result = match cli.command {
        Commands::Workspace { command } => match command {
            WorkspaceCommands::Create { name } => cli::workspace::create(&name),
            WorkspaceCommands::List => cli::workspace::list(),
            WorkspaceCommands::Delete { name } => cli::workspace::delete(&name),
            WorkspaceCommands::Use { name } => cli::workspace::use_workspace(&name),
        },
        Commands::Import { source, file } => cli::import::run(ws, source, &file),
        Commands::Learn { min_confidence } => cli::learn::run(ws, min_confidence),
        Commands::Reconcile { min_confidence } => cli::reconcile::run(ws, min_confidence),
        Commands::Classify { threshold, suggest } => cli::classify::run(ws, threshold, suggest),
        Commands::Process {
            min_confidence,
            threshold,
            suggest,
        } => cli::process::run(ws, min_confidence, threshold, suggest),
        Commands::Review { threshold, suggest } => cli::review::list(ws, threshold, suggest),
        Commands::Approve { id } => cli::review::approve(ws, id),
        Commands::Override { id, code, no_rule } => {
            cli::review::override_code(ws, id, &code, no_rule)
        }
        Commands::Rules { command } => match command {
            RulesCommands::List { min_confidence } => cli::rules::list(ws, min_confidence),
            RulesCommands::Add { pattern, code } => cli::rules::add(ws, &pattern, &code),
            RulesCommands::Delete { id } => cli::rules::delete(ws, id),
        },
        Commands::Export { output } => cli::export::run(ws, output),
        Commands::Stats => cli::stats::run(ws),
        Commands::Backup { output } => cli::backup::run(ws, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
