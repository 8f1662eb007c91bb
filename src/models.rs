use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::BudgetError;
use crate::fingerprint::Fingerprint;
use crate::fmt::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    CreditCard,
    JointChecking,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [Self::Checking, Self::CreditCard, Self::JointChecking];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::CreditCard => "credit_card",
            Self::JointChecking => "joint_checking",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Checking => "Checking",
            Self::CreditCard => "Credit Card",
            Self::JointChecking => "Joint Checking",
        }
    }
}

impl FromStr for AccountType {
    type Err = BudgetError;

    /// Accepts both `credit_card` and `credit-card` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|a| a.key() == key)
            .ok_or_else(|| BudgetError::UnknownAccount(s.to_string()))
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Debit,
    Credit,
    Transfer,
    Income,
    BalancePayment,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        Self::Debit,
        Self::Credit,
        Self::Transfer,
        Self::Income,
        Self::BalancePayment,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Transfer => "transfer",
            Self::Income => "income",
            Self::BalancePayment => "balance_payment",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Debit => "Debit",
            Self::Credit => "Credit",
            Self::Transfer => "Transfer",
            Self::Income => "Income",
            Self::BalancePayment => "Balance Payment",
        }
    }

    /// Fallback classification when a statement gives no usable type code.
    pub fn from_sign(amount: i64) -> Self {
        if amount < 0 {
            Self::Debit
        } else {
            Self::Credit
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collapse internal whitespace runs to single spaces and trim the ends.
/// Control characters count as whitespace.
pub fn normalize_description(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse decimal text into minor units, truncating toward zero past two
/// fractional digits. The sign is applied after truncation.
pub fn parse_minor_units(raw: &str) -> Option<i64> {
    let s = raw.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let cents: String = frac.chars().chain(std::iter::repeat('0')).take(2).collect();
    let cents: i64 = cents.parse().ok()?;
    let magnitude = whole.checked_mul(100)?.checked_add(cents)?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Scale a floating amount by 100 and truncate toward zero.
///
/// Goes through the shortest round-trip decimal text of the float so that
/// values like `19.99` land on `1999` instead of `1998`.
pub fn to_minor_units(amount: f64) -> Option<i64> {
    if !amount.is_finite() {
        return None;
    }
    parse_minor_units(&amount.to_string())
}

/// Fields that determine a transaction's fingerprint. Never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    account: AccountType,
    kind: TransactionType,
    description: String,
    amount: i64,
    date: NaiveDate,
}

/// User-editable metadata. Not part of identity and replaced wholesale on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    identity: Identity,
    /// Running balance in minor units, informational only.
    #[serde(default)]
    pub balance_hint: Option<i64>,
    #[serde(default)]
    pub annotations: Annotations,
}

impl Transaction {
    pub fn new(
        account: AccountType,
        kind: TransactionType,
        description: &str,
        amount: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            identity: Identity {
                account,
                kind,
                description: normalize_description(description),
                amount,
                date,
            },
            balance_hint: None,
            annotations: Annotations::default(),
        }
    }

    pub fn with_balance_hint(mut self, balance: Option<i64>) -> Self {
        self.balance_hint = balance;
        self
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn account(&self) -> AccountType {
        self.identity.account
    }

    pub fn kind(&self) -> TransactionType {
        self.identity.kind
    }

    pub fn description(&self) -> &str {
        &self.identity.description
    }

    /// Signed amount in cents.
    pub fn amount(&self) -> i64 {
        self.identity.amount
    }

    pub fn date(&self) -> NaiveDate {
        self.identity.date
    }

    pub fn category(&self) -> Option<&str> {
        self.annotations.category.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.annotations.tags
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_transaction(self)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} - {} - {}",
            self.kind(),
            self.description(),
            money(self.amount()),
            self.date()
        )
    }
}

/// Intermediate representation from a statement adapter before the ingest
/// flow turns it into a [`Transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    /// 1-based line in the source file.
    pub line: u64,
    /// Source fields exactly as read, for raw-row fingerprinting.
    pub raw: Vec<String>,
    pub date: NaiveDate,
    pub description: String,
    pub amount: i64,
    /// `None` when the statement carries no recognizable type code.
    pub kind: Option<TransactionType>,
    pub balance: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description("  AMAZON   MKTPLACE\tPMTS "), "AMAZON MKTPLACE PMTS");
        assert_eq!(normalize_description("single"), "single");
        assert_eq!(normalize_description("   "), "");
        assert_eq!(normalize_description("A\u{1f}B"), "A B");
    }

    #[test]
    fn test_to_minor_units_truncates_toward_zero() {
        assert_eq!(to_minor_units(-10.505), Some(-1050));
        assert_eq!(to_minor_units(10.505), Some(1050));
        assert_eq!(to_minor_units(-0.999), Some(-99));
    }

    #[test]
    fn test_to_minor_units_exact_for_two_decimals() {
        assert_eq!(to_minor_units(19.99), Some(1999));
        assert_eq!(to_minor_units(0.29), Some(29));
        assert_eq!(to_minor_units(10.5), Some(1050));
        assert_eq!(to_minor_units(-42.0), Some(-4200));
    }

    #[test]
    fn test_to_minor_units_rejects_non_finite() {
        assert_eq!(to_minor_units(f64::NAN), None);
        assert_eq!(to_minor_units(f64::INFINITY), None);
        assert_eq!(to_minor_units(1e300), None);
    }

    #[test]
    fn test_parse_minor_units_equivalent_text() {
        assert_eq!(parse_minor_units("10.50"), parse_minor_units("10.5"));
        assert_eq!(parse_minor_units("10.5"), Some(1050));
        assert_eq!(parse_minor_units("-.75"), Some(-75));
        assert_eq!(parse_minor_units("+3"), Some(300));
        assert_eq!(parse_minor_units("1.2.3"), None);
        assert_eq!(parse_minor_units("abc"), None);
        assert_eq!(parse_minor_units("-"), None);
        assert_eq!(parse_minor_units(""), None);
    }

    #[test]
    fn test_transaction_normalizes_description() {
        let txn = Transaction::new(
            AccountType::Checking,
            TransactionType::Debit,
            "  COFFEE   SHOP ",
            -450,
            date(2024, 3, 1),
        );
        assert_eq!(txn.description(), "COFFEE SHOP");
    }

    #[test]
    fn test_account_type_from_str() {
        assert_eq!("credit-card".parse::<AccountType>().unwrap(), AccountType::CreditCard);
        assert_eq!("Joint_Checking".parse::<AccountType>().unwrap(), AccountType::JointChecking);
        assert!("savings".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_display_uses_money() {
        let txn = Transaction::new(
            AccountType::Checking,
            TransactionType::Debit,
            "RENT",
            -150000,
            date(2024, 3, 1),
        );
        assert_eq!(txn.to_string(), "Debit: RENT - -$1,500.00 - 2024-03-01");
    }
}
