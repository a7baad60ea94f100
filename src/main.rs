mod categorizer;
mod cli;
mod db;
mod error;
mod expenses;
mod export;
mod fmt;
mod imaging;
mod models;
mod parser;
mod pipeline;
mod reports;
mod settings;
mod storage;
mod vision;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ReceiptsCommands, RulesCommands};

/// `FATURA_LOG` wins over the configured level. Logs go to stderr so CSV
/// and JSON on stdout stay clean.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env("FATURA_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    // A broken settings file is reported by the command itself.
    let level = settings::load_settings()
        .map(|s| s.log_level)
        .unwrap_or_else(|_| "warn".to_string());
    init_logging(&level);

    let result = match cli.command {
        Commands::Init { data_dir, currency } => cli::init::run(data_dir, currency),
        Commands::Upload { files, parse } => cli::upload::run(&files, parse),
        Commands::Parse { id, url, force } => cli::parse::run(id, url, force),
        Commands::Receipts { command } => match command {
            ReceiptsCommands::List { status } => cli::receipts::list(status),
            ReceiptsCommands::Show { id } => cli::receipts::show(&id),
            ReceiptsCommands::Delete { id } => cli::receipts::delete(&id),
        },
        Commands::Expenses { filter } => cli::expenses::run(&filter),
        Commands::Export { filter, output } => cli::export::run(&filter, output),
        Commands::Report { filter, json } => cli::report::run(&filter, json),
        Commands::Categorize {
            vendor,
            description,
        } => cli::categorize::run(vendor, description),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                pattern,
                category,
                match_type,
                priority,
            } => cli::rules::add(&pattern, &category, &match_type, priority),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Delete { id } => cli::rules::delete(id),
        },
        Commands::Categories => cli::categories::run(),
        Commands::Demo => cli::demo::run(),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
