mod categorizer;
mod cli;
mod db;
mod error;
mod fingerprint;
mod fmt;
mod importer;
mod ingest;
mod models;
mod prompt;
mod settings;
mod store;

use clap::Parser;

use cli::{Cli, Commands, ImportArgs};

fn main() {
    pretty_env_logger::init_custom_env("BUDGET_LOG");
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import {
            statement,
            store,
            account,
            format,
            cache,
            create,
            recategorize,
            no_tags,
            dry_run,
        } => cli::import::run(ImportArgs {
            statement,
            store,
            account,
            format,
            cache,
            create,
            recategorize,
            no_tags,
            dry_run,
        }),
        Commands::List {
            store,
            category,
            tag,
            account,
        } => cli::list::run(&store, category, tag, account.as_deref()),
        Commands::Status { store } => cli::status::run(&store),
        Commands::Categories { cache } => cli::categories::list(cache.as_deref()),
        Commands::Config {
            cache,
            ask_tags,
            default_account,
        } => cli::config::run(cache, ask_tags, default_account),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
