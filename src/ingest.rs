use std::collections::HashSet;

use log::debug;

use crate::categorizer::CategoryCache;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::fmt::money;
use crate::models::{AccountType, Annotations, ParsedRow, Transaction, TransactionType};
use crate::prompt::{Choice, Prompter, Reply};
use crate::store::{batch_from, Batch, TransactionStore};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub account: AccountType,
    /// Prompt again for rows already in the store instead of keeping their annotations.
    pub recategorize: bool,
    pub ask_tags: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// Annotations taken from the store or an earlier identical row.
    Carried,
    /// Category resolved from the cache, nothing asked.
    Matched,
    /// At least one prompt was answered for this row.
    Prompted,
}

struct Decision {
    txn: Transaction,
    source: Source,
    /// Cache size before this row was decided, for undoing learned entries.
    cache_len: usize,
}

enum Step {
    Decided(Transaction, Source),
    Back,
    Quit,
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub batch: Batch,
    /// False when the user quit before every row was decided.
    pub completed: bool,
    pub decided: usize,
    pub undecided: usize,
    pub carried: usize,
    pub matched: usize,
    pub prompted: usize,
    /// Rows byte-identical to an earlier row of the same statement.
    pub repeated_rows: usize,
}

/// What an import would do before any prompt is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preview {
    pub rows: usize,
    pub new: usize,
    /// Rows whose transaction type must be asked, so their identity is not known yet.
    pub undetermined: usize,
}

pub fn preview(rows: &[ParsedRow], account: AccountType, store: &TransactionStore) -> Preview {
    let fingerprints: Vec<Fingerprint> = rows
        .iter()
        .filter_map(|row| {
            let kind = row.kind?;
            Some(Transaction::new(account, kind, &row.description, row.amount, row.date).fingerprint())
        })
        .collect();
    Preview {
        rows: rows.len(),
        new: store.new_entry_count(&fingerprints),
        undetermined: rows.len() - fingerprints.len(),
    }
}

fn count_repeated_rows(rows: &[ParsedRow], account: AccountType) -> usize {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| !seen.insert(Fingerprint::of_raw_row(account, &row.raw)))
        .count()
}

fn type_choices() -> Vec<Choice<TransactionType>> {
    TransactionType::ALL
        .iter()
        .map(|t| Choice::new(t.key(), t.name(), *t))
        .collect()
}

/// Walk `rows` in order, deciding each one's type, category and tags.
///
/// Decisions are collected into a batch; nothing touches the store. On
/// [`Reply::Back`] the most recent interactive decision is undone and asked
/// again. On [`Reply::Quit`] the rows decided so far are returned and the
/// rest are left out.
pub fn run<P: Prompter>(
    rows: &[ParsedRow],
    store: &TransactionStore,
    cache: &mut CategoryCache,
    prompter: &mut P,
    options: &IngestOptions,
) -> Result<IngestOutcome> {
    let mut decisions: Vec<Decision> = Vec::with_capacity(rows.len());
    let mut completed = true;

    while decisions.len() < rows.len() {
        let row = &rows[decisions.len()];
        let cache_len = cache.len();
        match decide(row, &decisions, store, cache, prompter, options)? {
            Step::Decided(txn, source) => {
                debug!("line {}: {:?} {}", row.line, source, txn);
                decisions.push(Decision {
                    txn,
                    source,
                    cache_len,
                });
            }
            Step::Back => {
                cache.truncate(cache_len);
                if let Some(i) = decisions.iter().rposition(|d| d.source == Source::Prompted) {
                    cache.truncate(decisions[i].cache_len);
                    decisions.truncate(i);
                }
            }
            Step::Quit => {
                cache.truncate(cache_len);
                completed = false;
                break;
            }
        }
    }

    let count = |s: Source| decisions.iter().filter(|d| d.source == s).count();
    let (carried, matched, prompted) = (count(Source::Carried), count(Source::Matched), count(Source::Prompted));
    let decided = decisions.len();
    Ok(IngestOutcome {
        batch: batch_from(decisions.into_iter().map(|d| d.txn)),
        completed,
        decided,
        undecided: rows.len() - decided,
        carried,
        matched,
        prompted,
        repeated_rows: count_repeated_rows(rows, options.account),
    })
}

fn decide<P: Prompter>(
    row: &ParsedRow,
    earlier: &[Decision],
    store: &TransactionStore,
    cache: &mut CategoryCache,
    prompter: &mut P,
    options: &IngestOptions,
) -> Result<Step> {
    let mut source = Source::Matched;

    let kind = match row.kind {
        Some(kind) => kind,
        None => {
            let prompt = format!(
                "Transaction type for {} ({}, {})",
                row.description,
                money(row.amount),
                row.date
            );
            match prompter.prompt_choice(&prompt, &type_choices())? {
                Reply::Value(kind) => {
                    source = Source::Prompted;
                    kind
                }
                Reply::Back => return Ok(Step::Back),
                Reply::Quit => return Ok(Step::Quit),
            }
        }
    };

    let txn = Transaction::new(options.account, kind, &row.description, row.amount, row.date)
        .with_balance_hint(row.balance);
    let fingerprint = txn.fingerprint();

    // A repeat of a row decided earlier in this statement shares its annotations.
    if let Some(prev) = earlier.iter().rev().find(|d| d.txn.fingerprint() == fingerprint) {
        let annotations = prev.txn.annotations.clone();
        return Ok(Step::Decided(txn.with_annotations(annotations), Source::Carried));
    }

    let existing = store.get(&fingerprint);
    if let (Some(existing), false) = (existing, options.recategorize) {
        let annotations = existing.annotations.clone();
        let source = if source == Source::Prompted { source } else { Source::Carried };
        return Ok(Step::Decided(txn.with_annotations(annotations), source));
    }

    let cached = if options.recategorize {
        None
    } else {
        cache.resolve(txn.description()).map(str::to_string)
    };
    let category = match cached {
        Some(category) => Some(category),
        None => match prompter.prompt_category(txn.description())? {
            Reply::Value(answer) => {
                source = Source::Prompted;
                let answer = answer.trim().to_string();
                if answer.is_empty() {
                    None
                } else {
                    // The normalized description is learned; resolve normalizes too.
                    if cache.resolve(txn.description()) != Some(answer.as_str()) {
                        cache.learn(txn.description(), &answer);
                    }
                    Some(answer)
                }
            }
            Reply::Back => return Ok(Step::Back),
            Reply::Quit => return Ok(Step::Quit),
        },
    };

    let tags = if options.ask_tags {
        match prompter.prompt_tags(txn.description())? {
            Reply::Value(tags) => {
                source = Source::Prompted;
                tags
            }
            Reply::Back => return Ok(Step::Back),
            Reply::Quit => return Ok(Step::Quit),
        }
    } else {
        existing.map(|e| e.annotations.tags.clone()).unwrap_or_default()
    };

    Ok(Step::Decided(txn.with_annotations(Annotations { category, tags }), source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::scripted::{ScriptedPrompter, Step as S};
    use chrono::NaiveDate;

    fn row(line: u64, description: &str, amount: i64, day: u32) -> ParsedRow {
        ParsedRow {
            line,
            raw: vec![format!("02/{day:02}/2024"), description.to_string(), amount.to_string()],
            date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            description: description.to_string(),
            amount,
            kind: Some(TransactionType::Debit),
            balance: None,
        }
    }

    fn options() -> IngestOptions {
        IngestOptions {
            account: AccountType::Checking,
            recategorize: false,
            ask_tags: false,
        }
    }

    fn value<T>(v: T) -> Reply<T> {
        Reply::Value(v)
    }

    #[test]
    fn test_cache_hits_need_no_prompt() {
        let rows = vec![row(2, "AMAZON MKTPLACE", -1999, 1), row(3, "AMAZON.COM", -500, 2)];
        let mut cache = CategoryCache::new();
        cache.learn("amazon", "Shopping");
        let mut prompter = ScriptedPrompter::new([]);
        let outcome = run(&rows, &TransactionStore::new(), &mut cache, &mut prompter, &options()).unwrap();
        assert!(outcome.completed);
        assert_eq!(outcome.matched, 2);
        assert!(outcome.batch.values().all(|t| t.category() == Some("Shopping")));
    }

    #[test]
    fn test_miss_prompts_and_learns() {
        let rows = vec![row(2, "CORNER CAFE", -450, 1), row(3, "CORNER CAFE", -650, 2)];
        let mut cache = CategoryCache::new();
        let mut prompter = ScriptedPrompter::new([S::Category(value("Dining".to_string()))]);
        let outcome = run(&rows, &TransactionStore::new(), &mut cache, &mut prompter, &options()).unwrap();
        assert!(prompter.finished());
        assert_eq!(outcome.prompted, 1);
        assert_eq!(outcome.matched, 1);
        assert_eq!(cache.resolve("CORNER CAFE"), Some("Dining"));
    }

    #[test]
    fn test_tags_prompted_when_enabled() {
        let rows = vec![row(2, "HOTEL", -20000, 1)];
        let mut cache = CategoryCache::new();
        cache.learn("hotel", "Travel");
        let mut prompter = ScriptedPrompter::new([S::Tags(value(vec!["trip", "work"]))]);
        let opts = IngestOptions { ask_tags: true, ..options() };
        let outcome = run(&rows, &TransactionStore::new(), &mut cache, &mut prompter, &opts).unwrap();
        let txn = outcome.batch.values().next().unwrap();
        assert_eq!(txn.tags().len(), 2);
        assert_eq!(outcome.prompted, 1);
    }

    #[test]
    fn test_back_rewinds_previous_prompted_row() {
        let rows = vec![row(2, "CORNER CAFE", -450, 1), row(3, "BOOKSTORE", -1299, 2)];
        let mut cache = CategoryCache::new();
        let mut prompter = ScriptedPrompter::new([
            S::Category(value("Groceries".to_string())),
            S::Category(Reply::Back),
            S::Category(value("Dining".to_string())),
            S::Category(value("Books".to_string())),
        ]);
        let outcome = run(&rows, &TransactionStore::new(), &mut cache, &mut prompter, &options()).unwrap();
        assert!(prompter.finished());
        assert_eq!(
            prompter.asked,
            vec!["category:CORNER CAFE", "category:BOOKSTORE", "category:CORNER CAFE", "category:BOOKSTORE"]
        );
        assert_eq!(cache.resolve("CORNER CAFE"), Some("Dining"));
        assert_eq!(cache.len(), 2);
        let cafe = outcome.batch.values().find(|t| t.description() == "CORNER CAFE").unwrap();
        assert_eq!(cafe.category(), Some("Dining"));
    }

    #[test]
    fn test_back_skips_over_matched_rows() {
        let rows = vec![
            row(2, "CORNER CAFE", -450, 1),
            row(3, "AMAZON", -100, 2),
            row(4, "BOOKSTORE", -1299, 3),
        ];
        let mut cache = CategoryCache::new();
        cache.learn("amazon", "Shopping");
        let mut prompter = ScriptedPrompter::new([
            S::Category(value("Dining".to_string())),
            S::Category(Reply::Back),
            S::Category(value("Coffee".to_string())),
            S::Category(value("Books".to_string())),
        ]);
        let outcome = run(&rows, &TransactionStore::new(), &mut cache, &mut prompter, &options()).unwrap();
        assert!(prompter.finished());
        assert_eq!(outcome.batch.len(), 3);
        assert_eq!(cache.resolve("CORNER CAFE"), Some("Coffee"));
    }

    #[test]
    fn test_back_on_first_row_asks_again() {
        let rows = vec![row(2, "CORNER CAFE", -450, 1)];
        let mut cache = CategoryCache::new();
        let mut prompter = ScriptedPrompter::new([
            S::Category(Reply::Back),
            S::Category(value("Dining".to_string())),
        ]);
        let outcome = run(&rows, &TransactionStore::new(), &mut cache, &mut prompter, &options()).unwrap();
        assert!(outcome.completed);
        assert_eq!(outcome.batch.len(), 1);
    }

    #[test]
    fn test_back_from_tags_forgets_learned_category() {
        let rows = vec![row(2, "CORNER CAFE", -450, 1)];
        let mut cache = CategoryCache::new();
        let mut prompter = ScriptedPrompter::new([
            S::Category(value("Dining".to_string())),
            S::Tags(Reply::Back),
            S::Category(value("Coffee".to_string())),
            S::Tags(value(vec![])),
        ]);
        let opts = IngestOptions { ask_tags: true, ..options() };
        run(&rows, &TransactionStore::new(), &mut cache, &mut prompter, &opts).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.resolve("CORNER CAFE"), Some("Coffee"));
    }

    #[test]
    fn test_quit_keeps_decided_rows_only() {
        let rows = vec![
            row(2, "CORNER CAFE", -450, 1),
            row(3, "BOOKSTORE", -1299, 2),
            row(4, "GAS STATION", -3800, 3),
        ];
        let mut cache = CategoryCache::new();
        let mut prompter = ScriptedPrompter::new([
            S::Category(value("Dining".to_string())),
            S::Category(value("Books".to_string())),
            S::Category(Reply::Quit),
        ]);
        let outcome = run(&rows, &TransactionStore::new(), &mut cache, &mut prompter, &options()).unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.decided, 2);
        assert_eq!(outcome.undecided, 1);
        assert_eq!(outcome.batch.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_existing_rows_keep_annotations_without_prompt() {
        let rows = vec![row(2, "CORNER CAFE", -450, 1)];
        let mut store = TransactionStore::new();
        let mut stored = Transaction::new(
            AccountType::Checking,
            TransactionType::Debit,
            "CORNER CAFE",
            -450,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        stored.annotations.category = Some("Dining".to_string());
        stored.annotations.tags.insert("weekday".to_string());
        store.merge(batch_from([stored.clone()]));

        let mut prompter = ScriptedPrompter::new([]);
        let opts = IngestOptions { ask_tags: true, ..options() };
        let outcome = run(&rows, &store, &mut CategoryCache::new(), &mut prompter, &opts).unwrap();
        assert_eq!(outcome.carried, 1);
        assert_eq!(outcome.batch.get(&stored.fingerprint()), Some(&stored));
    }

    #[test]
    fn test_recategorize_prompts_for_existing_rows() {
        let rows = vec![row(2, "CORNER CAFE", -450, 1)];
        let mut store = TransactionStore::new();
        let mut cache = CategoryCache::new();
        cache.learn("cafe", "Dining");
        let mut prompter = ScriptedPrompter::new([]);
        let first = run(&rows, &store, &mut cache, &mut prompter, &options()).unwrap();
        store.merge(first.batch);

        let mut prompter = ScriptedPrompter::new([S::Category(value("Coffee".to_string()))]);
        let opts = IngestOptions { recategorize: true, ..options() };
        let second = run(&rows, &store, &mut cache, &mut prompter, &opts).unwrap();
        let result = store.merge(second.batch);
        assert_eq!(result.added, 0);
        assert_eq!(store.count(), 1);
        assert_eq!(store.iter().next().unwrap().1.category(), Some("Coffee"));
    }

    #[test]
    fn test_unknown_type_asks_choice() {
        let mut unknown = row(2, "WIRE 8812", 250000, 1);
        unknown.kind = None;
        let mut cache = CategoryCache::new();
        cache.learn("wire", "Salary");
        let mut prompter = ScriptedPrompter::new([S::Choice(value("income".to_string()))]);
        let outcome = run(&[unknown], &TransactionStore::new(), &mut cache, &mut prompter, &options()).unwrap();
        let txn = outcome.batch.values().next().unwrap();
        assert_eq!(txn.kind(), TransactionType::Income);
        assert_eq!(outcome.prompted, 1);
    }

    #[test]
    fn test_identical_rows_collapse_and_share_decision() {
        let rows = vec![
            row(2, "GROCERY MART", -5423, 1),
            row(3, "COFFEE SHOP", -450, 2),
            row(4, "COFFEE SHOP", -450, 2),
            row(5, "GAS STATION", -3800, 3),
            row(6, "BOOKSTORE", -1299, 4),
        ];
        let mut cache = CategoryCache::new();
        let mut prompter = ScriptedPrompter::new([
            S::Category(value("Groceries".to_string())),
            S::Category(value("Dining".to_string())),
            S::Category(value("Auto".to_string())),
            S::Category(value("Books".to_string())),
        ]);
        let mut store = TransactionStore::new();
        let outcome = run(&rows, &store, &mut cache, &mut prompter, &options()).unwrap();
        assert_eq!(outcome.repeated_rows, 1);
        assert_eq!(outcome.carried, 1);
        store.merge(outcome.batch);
        assert_eq!(store.count(), 4);

        let mut silent = ScriptedPrompter::new([]);
        let again = run(&rows, &store, &mut cache, &mut silent, &options()).unwrap();
        let result = store.merge(again.batch);
        assert_eq!(result.added, 0);
        assert_eq!(store.count(), 4);
    }

    #[test]
    fn test_preview_counts_new_rows() {
        let rows = vec![row(2, "A", -1, 1), row(3, "B", -2, 2)];
        let mut store = TransactionStore::new();
        store.merge(batch_from([Transaction::new(
            AccountType::Checking,
            TransactionType::Debit,
            "A",
            -1,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        )]));
        let mut undetermined = row(4, "C", -3, 3);
        undetermined.kind = None;
        let mut all = rows.clone();
        all.push(undetermined);
        let p = preview(&all, AccountType::Checking, &store);
        assert_eq!(p, Preview { rows: 3, new: 1, undetermined: 1 });
    }
}
