use std::path::Path;

use colored::Colorize;
use log::{debug, info};

use crate::categorizer::CategoryCache;
use crate::cli::console::ConsolePrompter;
use crate::cli::ImportArgs;
use crate::db::{LedgerFile, OnMissing};
use crate::error::{BudgetError, Result};
use crate::importer::{self, ImporterKind};
use crate::ingest::{self, IngestOptions};
use crate::models::AccountType;
use crate::prompt::{Choice, Prompter, Reply};
use crate::settings::{load_settings, shellexpand_path};

fn check_statement(path: &Path) -> Result<()> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(BudgetError::Usage(format!(
            "statement must be a .csv file: {}",
            path.display()
        )));
    }
    Ok(())
}

/// `--account`, else the configured default, else ask. The default is only
/// read when no flag is given.
fn resolve_account<P: Prompter>(
    flag: Option<&str>,
    default: impl FnOnce() -> Result<Option<AccountType>>,
    prompter: &mut P,
) -> Result<Option<AccountType>> {
    if let Some(key) = flag {
        return key.parse().map(Some);
    }
    if let Some(account) = default()? {
        return Ok(Some(account));
    }
    let choices: Vec<Choice<AccountType>> = AccountType::ALL
        .iter()
        .map(|a| Choice::new(a.key(), a.name(), *a))
        .collect();
    match prompter.prompt_choice("Account type", &choices)? {
        Reply::Value(account) => Ok(Some(account)),
        Reply::Back | Reply::Quit => Ok(None),
    }
}

fn resolve_importer(format: Option<&str>, account: AccountType, statement: &Path) -> Result<ImporterKind> {
    match format {
        Some(key) => importer::get_by_key(key).ok_or_else(|| {
            BudgetError::UnknownFormat(format!("{key} (known: {})", importer::keys().join(", ")))
        }),
        None => importer::get_for_file(account, statement).ok_or_else(|| {
            BudgetError::UnknownFormat(format!(
                "no {} statement layout matches {}; pass --format",
                account.name(),
                statement.display()
            ))
        }),
    }
}

pub fn run(args: ImportArgs) -> Result<()> {
    check_statement(&args.statement)?;
    if !args.statement.exists() {
        return Err(BudgetError::Usage(format!(
            "statement not found: {}",
            args.statement.display()
        )));
    }

    let settings = load_settings();
    let cache_path = match &args.cache {
        Some(path) => shellexpand_path(path).into(),
        None => settings.category_cache_path(),
    };

    let on_missing = if args.create { OnMissing::Empty } else { OnMissing::Error };
    let ledger = LedgerFile::new(&args.store, on_missing);
    let lock = ledger.lock()?;
    debug!("holding {}", lock.path().display());
    let mut store = ledger.load()?;
    let mut cache = CategoryCache::load(&cache_path)?;

    let mut prompter = ConsolePrompter::new();
    let Some(account) = resolve_account(args.account.as_deref(), || settings.default_account(), &mut prompter)?
    else {
        println!("Import cancelled.");
        return Ok(());
    };
    let importer = resolve_importer(args.format.as_deref(), account, &args.statement)?;
    info!("importing {} as {} ({})", args.statement.display(), importer.key(), account.key());

    let parsed = importer.parse(&args.statement)?;
    for rejected in &parsed.rejected {
        eprintln!("{} {rejected}", "Skipped".yellow());
    }

    let preview = ingest::preview(&parsed.rows, account, &store);
    println!(
        "{} rows read from {} ({}), {} new",
        preview.rows,
        args.statement.display(),
        importer.name(),
        preview.new
    );
    if preview.undetermined > 0 {
        println!("{} rows need a transaction type", preview.undetermined);
    }

    let options = IngestOptions {
        account,
        recategorize: args.recategorize,
        ask_tags: settings.ask_tags && !args.no_tags,
    };
    let outcome = ingest::run(&parsed.rows, &store, &mut cache, &mut prompter, &options)?;
    if !outcome.completed {
        println!(
            "{}",
            format!(
                "Stopped early: {} rows decided, {} left out of this import.",
                outcome.decided, outcome.undecided
            )
            .yellow()
        );
    }
    if outcome.repeated_rows > 0 {
        println!("{} identical rows collapsed into one entry", outcome.repeated_rows);
    }
    println!(
        "{} matched from cache, {} answered, {} kept from the ledger",
        outcome.matched, outcome.prompted, outcome.carried
    );

    let result = store.merge(outcome.batch);
    println!(
        "{} merged, {} added, {} total",
        result.merged,
        result.added.to_string().green(),
        store.count()
    );

    if args.dry_run {
        println!("Dry run: nothing saved.");
        return Ok(());
    }
    ledger.save(&store)?;
    cache.save(&cache_path)?;
    println!("Saved {}", ledger.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::scripted::{ScriptedPrompter, Step};
    use crate::settings::Settings;

    #[test]
    fn test_statement_must_be_csv() {
        assert!(check_statement(Path::new("march.csv")).is_ok());
        assert!(check_statement(Path::new("MARCH.CSV")).is_ok());
        assert!(matches!(
            check_statement(Path::new("march.xlsx")),
            Err(BudgetError::Usage(_))
        ));
        assert!(check_statement(Path::new("march")).is_err());
    }

    #[test]
    fn test_account_flag_beats_default() {
        let mut prompter = ScriptedPrompter::new([]);
        let account = resolve_account(Some("credit-card"), || Ok(Some(AccountType::Checking)), &mut prompter).unwrap();
        assert_eq!(account, Some(AccountType::CreditCard));
        let account = resolve_account(None, || Ok(Some(AccountType::Checking)), &mut prompter).unwrap();
        assert_eq!(account, Some(AccountType::Checking));
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_account_is_asked_without_flag_or_default() {
        let mut prompter = ScriptedPrompter::new([Step::Choice(Reply::Value("joint_checking".to_string()))]);
        let account = resolve_account(None, || Ok(None), &mut prompter).unwrap();
        assert_eq!(account, Some(AccountType::JointChecking));

        let mut prompter = ScriptedPrompter::new([Step::Choice(Reply::Quit)]);
        assert_eq!(resolve_account(None, || Ok(None), &mut prompter).unwrap(), None);
    }

    #[test]
    fn test_bad_default_ignored_when_flag_given() {
        let bad = Settings {
            default_account: Some("savings".to_string()),
            ..Settings::default()
        };
        let mut prompter = ScriptedPrompter::new([]);
        let account = resolve_account(Some("checking"), || bad.default_account(), &mut prompter).unwrap();
        assert_eq!(account, Some(AccountType::Checking));
        assert!(resolve_account(None, || bad.default_account(), &mut prompter).is_err());
    }

    #[test]
    fn test_unknown_format_key() {
        let err = resolve_importer(Some("bofa"), AccountType::Checking, Path::new("x.csv")).unwrap_err();
        assert!(err.to_string().contains("chase_checking"));
        assert_eq!(
            resolve_importer(Some("generic"), AccountType::Checking, Path::new("x.csv")).unwrap(),
            ImporterKind::Generic
        );
    }
}
