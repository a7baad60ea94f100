pub mod categories;
pub mod categorize;
pub mod demo;
pub mod expenses;
pub mod export;
pub mod init;
pub mod parse;
pub mod receipts;
pub mod report;
pub mod rules;
pub mod status;
pub mod upload;

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::expenses::ExpenseFilter;
use crate::parser::ParseDefaults;
use crate::settings::{load_settings, Settings};
use crate::storage::LocalStorage;

/// Settings plus an open, initialized database.
pub(crate) fn open_db() -> Result<(Settings, Connection)> {
    let settings = load_settings()?;
    std::fs::create_dir_all(settings.data_path())?;
    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    Ok((settings, conn))
}

pub(crate) fn storage(settings: &Settings) -> LocalStorage {
    LocalStorage::new(settings.uploads_dir())
}

pub(crate) fn parse_defaults(settings: &Settings) -> ParseDefaults {
    ParseDefaults {
        currency: settings.default_currency.clone(),
        today: chrono::Local::now().date_naive(),
    }
}

#[derive(Parser)]
#[command(
    name = "fatura",
    version,
    about = "Turn receipt photos into a categorized expense ledger."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Start date, inclusive: YYYY-MM-DD
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date, inclusive: YYYY-MM-DD
    #[arg(long = "to")]
    pub to_date: Option<String>,
    /// Category name, key or Albanian label
    #[arg(long)]
    pub category: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<ExpenseFilter> {
        ExpenseFilter::from_args(
            self.from_date.as_deref(),
            self.to_date.as_deref(),
            self.category.as_deref(),
        )
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write settings and initialize the database.
    Init {
        /// Path for fatura data (default: ~/Documents/fatura)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Currency used when a receipt does not show one, e.g. EUR
        #[arg(long)]
        currency: Option<String>,
    },
    /// Store receipt photos, downscaled, ready for parsing.
    Upload {
        /// Image files (JPEG, PNG, WebP, GIF, BMP, TIFF)
        #[arg(required = true)]
        files: Vec<String>,
        /// Parse each receipt right after storing it
        #[arg(long)]
        parse: bool,
    },
    /// Extract line items from a stored receipt or an image URL.
    Parse {
        /// Receipt id (or unique prefix) from `fatura receipts list`
        #[arg(required_unless_present = "url", conflicts_with = "url")]
        id: Option<String>,
        /// Parse a remote image without storing it
        #[arg(long)]
        url: Option<String>,
        /// Parse again even if the receipt is already completed
        #[arg(long)]
        force: bool,
    },
    /// Inspect stored receipts.
    Receipts {
        #[command(subcommand)]
        command: ReceiptsCommands,
    },
    /// List expenses, newest first.
    Expenses {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Export expenses to CSV.
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output path (default: <data_dir>/exports/expenses-YYYY-MM-DD.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Monthly and per-category totals.
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which category a vendor/description would get.
    Categorize {
        #[arg(long)]
        vendor: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Manage vendor rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// List the expense categories.
    Categories,
    /// Load sample receipts and expenses to explore fatura.
    Demo,
    /// Show data locations and summary counts.
    Status,
}

#[derive(Subcommand)]
pub enum ReceiptsCommands {
    /// List receipts, newest first.
    List {
        /// Only receipts with this status: pending, parsing, completed, error
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a receipt with its expenses.
    Show {
        id: String,
    },
    /// Delete a receipt and its image. Its expenses are kept.
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a vendor rule.
    Add {
        /// Pattern matched against the receipt vendor
        pattern: String,
        /// Category to assign
        #[arg(long)]
        category: String,
        /// Match type: exact, contains, starts_with, regex
        #[arg(long = "match-type", default_value = "exact")]
        match_type: String,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0")]
        priority: i64,
    },
    /// List active vendor rules.
    List,
    /// Delete (deactivate) a rule by ID.
    Delete {
        /// Rule ID (shown in `fatura rules list`)
        id: i64,
    },
}
