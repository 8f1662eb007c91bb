use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use log::{debug, warn};

use crate::error::{BudgetError, Result};
use crate::models::{parse_minor_units, to_minor_units, AccountType, ParsedRow, TransactionType};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Statement amount text to minor units. Accepts `$`, thousands separators,
/// quotes and parenthesized negatives. Spreadsheet exponent notation such as
/// `1.5E+2` is read as a float.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return parse_decimal(inner).map(|v| -v.abs());
    }
    parse_decimal(s)
}

fn parse_decimal(s: &str) -> Option<i64> {
    if s.contains(['e', 'E']) {
        return s.parse::<f64>().ok().and_then(to_minor_units);
    }
    parse_minor_units(s)
}

/// `MM/DD/YYYY` or ISO `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

fn chase_checking_kind(code: Option<&str>, amount: i64) -> Option<TransactionType> {
    let code = code.unwrap_or_default().trim().to_uppercase();
    Some(match code.as_str() {
        "ACCT_XFER" => TransactionType::Transfer,
        "LOAN_PMT" => TransactionType::BalancePayment,
        "ACH_CREDIT" | "DEPOSIT" | "CHECK_DEPOSIT" | "QUICKPAY_CREDIT" => TransactionType::Income,
        _ => TransactionType::from_sign(amount),
    })
}

fn chase_card_kind(code: Option<&str>, amount: i64) -> Option<TransactionType> {
    let code = code.unwrap_or_default().trim().to_uppercase();
    Some(match code.as_str() {
        "SALE" | "FEE" => TransactionType::Debit,
        "RETURN" => TransactionType::Credit,
        "PAYMENT" => TransactionType::BalancePayment,
        _ => TransactionType::from_sign(amount),
    })
}

fn generic_kind(code: Option<&str>, _amount: i64) -> Option<TransactionType> {
    let code = code?.trim().to_lowercase().replace([' ', '-'], "_");
    match code.as_str() {
        "payment" => Some(TransactionType::BalancePayment),
        _ => TransactionType::ALL.into_iter().find(|t| t.key() == code),
    }
}

// ---------------------------------------------------------------------------
// Importer kinds
// ---------------------------------------------------------------------------

/// Column names an adapter reads. `kind` and `balance` may be absent from a file.
struct Layout {
    date: &'static str,
    description: &'static str,
    amount: &'static str,
    kind: &'static str,
    balance: Option<&'static str>,
    /// Extra header that must be present for detection.
    marker: Option<&'static str>,
    classify: fn(Option<&str>, i64) -> Option<TransactionType>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImporterKind {
    ChaseChecking,
    ChaseCreditCard,
    Generic,
}

impl ImporterKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::ChaseChecking => "chase_checking",
            Self::ChaseCreditCard => "chase_credit_card",
            Self::Generic => "generic",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ChaseChecking => "Chase Checking",
            Self::ChaseCreditCard => "Chase Credit Card",
            Self::Generic => "Generic CSV (Date, Description, Amount)",
        }
    }

    pub fn account_types(&self) -> &[AccountType] {
        match self {
            Self::ChaseChecking => &[AccountType::Checking, AccountType::JointChecking],
            Self::ChaseCreditCard => &[AccountType::CreditCard],
            Self::Generic => &AccountType::ALL,
        }
    }

    fn layout(&self) -> Layout {
        match self {
            Self::ChaseChecking => Layout {
                date: "Posting Date",
                description: "Description",
                amount: "Amount",
                kind: "Type",
                balance: Some("Balance"),
                marker: Some("Details"),
                classify: chase_checking_kind,
            },
            Self::ChaseCreditCard => Layout {
                date: "Post Date",
                description: "Description",
                amount: "Amount",
                kind: "Type",
                balance: None,
                marker: Some("Transaction Date"),
                classify: chase_card_kind,
            },
            Self::Generic => Layout {
                date: "Date",
                description: "Description",
                amount: "Amount",
                kind: "Type",
                balance: Some("Balance"),
                marker: None,
                classify: generic_kind,
            },
        }
    }

    pub fn detect(&self, file_path: &Path) -> bool {
        let Ok(mut rdr) = open_reader(file_path) else {
            return false;
        };
        let Ok(headers) = rdr.headers() else {
            return false;
        };
        self.layout().missing_column(headers).is_none()
    }

    pub fn parse(&self, file_path: &Path) -> Result<ParseOutcome> {
        let mut rdr = open_reader(file_path)?;
        let layout = self.layout();
        let headers = rdr.headers()?.clone();
        if let Some(column) = layout.missing_column(&headers) {
            return Err(BudgetError::UnknownFormat(format!(
                "{} does not look like {} (no '{column}' column)",
                file_path.display(),
                self.name()
            )));
        }
        let columns = layout.resolve(&headers);

        let mut outcome = ParseOutcome::default();
        for result in rdr.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    let bad_text = match e.kind() {
                        csv::ErrorKind::Utf8 { pos, err } => {
                            Some((pos.as_ref().map_or(0, |p| p.line()), err.field() + 1))
                        }
                        _ => None,
                    };
                    let Some((line, field)) = bad_text else {
                        return Err(e.into());
                    };
                    let rejected = BudgetError::MalformedRow {
                        line,
                        reason: format!("field {field} is not valid UTF-8"),
                    };
                    warn!("{}: {rejected}", file_path.display());
                    outcome.rejected.push(rejected);
                    continue;
                }
            };
            let line = record.position().map_or(0, |p| p.line());
            match columns.row(&layout, &record, line) {
                Ok(row) => outcome.rows.push(row),
                Err(e @ BudgetError::MalformedRow { .. }) => {
                    warn!("{}: {e}", file_path.display());
                    outcome.rejected.push(e);
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            "{}: {} rows, {} rejected",
            self.key(),
            outcome.rows.len(),
            outcome.rejected.len()
        );
        Ok(outcome)
    }
}

const ALL_IMPORTERS: &[ImporterKind] = &[
    ImporterKind::ChaseChecking,
    ImporterKind::ChaseCreditCard,
    ImporterKind::Generic,
];

pub fn get_by_key(key: &str) -> Option<ImporterKind> {
    ALL_IMPORTERS.iter().find(|i| i.key() == key).copied()
}

pub fn get_for_file(account_type: AccountType, file_path: &Path) -> Option<ImporterKind> {
    ALL_IMPORTERS
        .iter()
        .filter(|i| i.account_types().contains(&account_type))
        .find(|i| i.detect(file_path))
        .copied()
}

pub fn keys() -> Vec<&'static str> {
    ALL_IMPORTERS.iter().map(|i| i.key()).collect()
}

/// Rows an adapter produced plus the ones it had to skip.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub rows: Vec<ParsedRow>,
    /// Always [`BudgetError::MalformedRow`].
    pub rejected: Vec<BudgetError>,
}

fn open_reader(file_path: &Path) -> Result<csv::Reader<std::fs::File>> {
    let file = std::fs::File::open(file_path)?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

fn header_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

struct Columns {
    date: usize,
    description: usize,
    amount: usize,
    kind: Option<usize>,
    balance: Option<usize>,
}

impl Layout {
    fn missing_column(&self, headers: &StringRecord) -> Option<&'static str> {
        [Some(self.date), Some(self.description), Some(self.amount), self.marker]
            .into_iter()
            .flatten()
            .find(|name| header_index(headers, name).is_none())
    }

    /// Only call after `missing_column` returned `None`.
    fn resolve(&self, headers: &StringRecord) -> Columns {
        Columns {
            date: header_index(headers, self.date).unwrap_or_default(),
            description: header_index(headers, self.description).unwrap_or_default(),
            amount: header_index(headers, self.amount).unwrap_or_default(),
            kind: header_index(headers, self.kind),
            balance: self.balance.and_then(|b| header_index(headers, b)),
        }
    }
}

impl Columns {
    fn row(&self, layout: &Layout, record: &StringRecord, line: u64) -> Result<ParsedRow> {
        let malformed = |reason: String| BudgetError::MalformedRow { line, reason };
        let field = |idx: usize, name: &str| {
            record
                .get(idx)
                .ok_or_else(|| malformed(format!("missing '{name}' column")))
        };

        let raw_date = field(self.date, layout.date)?;
        let date = parse_date(raw_date)
            .ok_or_else(|| malformed(format!("unparseable date '{}'", raw_date.trim())))?;
        let description = field(self.description, layout.description)?.trim().to_string();
        if description.is_empty() {
            return Err(malformed("empty description".to_string()));
        }
        let raw_amount = field(self.amount, layout.amount)?;
        let amount = parse_amount(raw_amount)
            .ok_or_else(|| malformed(format!("unparseable amount '{}'", raw_amount.trim())))?;
        let code = self.kind.and_then(|i| record.get(i));
        let balance = self
            .balance
            .and_then(|i| record.get(i))
            .filter(|b| !b.trim().is_empty())
            .and_then(parse_amount);

        Ok(ParsedRow {
            line,
            raw: record.iter().map(str::to_string).collect(),
            date,
            description,
            amount,
            kind: (layout.classify)(code, amount),
            balance,
        })
    }
}
