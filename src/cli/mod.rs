pub mod categories;
pub mod config;
pub mod console;
pub mod import;
pub mod list;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "budget",
    version,
    about = "Import bank statements into a deduplicating local ledger."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a bank statement CSV into a ledger file, categorizing new rows.
    Import {
        /// Bank statement export (.csv)
        statement: PathBuf,
        /// Ledger file to merge into
        store: PathBuf,
        /// Account type: checking, credit-card, joint-checking
        #[arg(long)]
        account: Option<String>,
        /// Statement format key (chase_checking, chase_credit_card, generic)
        #[arg(long)]
        format: Option<String>,
        /// Category cache file (default from settings)
        #[arg(long)]
        cache: Option<String>,
        /// Start an empty ledger if the store file does not exist
        #[arg(long)]
        create: bool,
        /// Ask again for rows already in the ledger
        #[arg(long)]
        recategorize: bool,
        /// Do not ask for tags
        #[arg(long = "no-tags")]
        no_tags: bool,
        /// Show what would change without saving
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// List transactions in a ledger file.
    List {
        /// Ledger file
        store: PathBuf,
        /// Only this category
        #[arg(long)]
        category: Option<String>,
        /// Only transactions carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Only this account type
        #[arg(long)]
        account: Option<String>,
    },
    /// Show ledger totals per account and category.
    Status {
        /// Ledger file
        store: PathBuf,
    },
    /// List learned description → category matchers in match order.
    Categories {
        /// Category cache file (default from settings)
        #[arg(long)]
        cache: Option<String>,
    },
    /// Show or change settings.
    Config {
        /// Default category cache file
        #[arg(long)]
        cache: Option<String>,
        /// Ask for tags during import
        #[arg(long = "ask-tags")]
        ask_tags: Option<bool>,
        /// Account type used when --account is not given
        #[arg(long = "default-account")]
        default_account: Option<String>,
    },
}

/// Arguments of `budget import`, bundled for `cli::import::run`.
pub struct ImportArgs {
    pub statement: PathBuf,
    pub store: PathBuf,
    pub account: Option<String>,
    pub format: Option<String>,
    pub cache: Option<String>,
    pub create: bool,
    pub recategorize: bool,
    pub no_tags: bool,
    pub dry_run: bool,
}
