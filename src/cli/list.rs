use std::path::Path;

use comfy_table::{Cell, CellAlignment, Table};

use crate::db::{load_store, OnMissing};
use crate::error::Result;
use crate::fmt::money;
use crate::models::{AccountType, Transaction};

#[derive(Debug, Default)]
pub struct Filter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub account: Option<AccountType>,
}

impl Filter {
    fn matches(&self, txn: &Transaction) -> bool {
        let category_ok = self.category.as_deref().map_or(true, |c| {
            txn.category().is_some_and(|have| have.eq_ignore_ascii_case(c))
        });
        let tag_ok = self.tag.as_ref().map_or(true, |t| txn.tags().contains(t));
        let account_ok = self.account.map_or(true, |a| txn.account() == a);
        category_ok && tag_ok && account_ok
    }
}

pub fn run(store_path: &Path, category: Option<String>, tag: Option<String>, account: Option<&str>) -> Result<()> {
    let store = load_store(store_path, OnMissing::Error)?;
    let filter = Filter {
        category,
        tag,
        account: account.map(str::parse).transpose()?,
    };

    let mut table = Table::new();
    table.set_header(vec!["Date", "Account", "Type", "Description", "Amount", "Category", "Tags", "Id"]);
    let mut shown = 0;
    let mut total = 0i64;
    for (fingerprint, txn) in store.by_date() {
        if !filter.matches(txn) {
            continue;
        }
        shown += 1;
        total += txn.amount();
        let tags: Vec<&str> = txn.tags().iter().map(String::as_str).collect();
        table.add_row(vec![
            Cell::new(txn.date()),
            Cell::new(txn.account().name()),
            Cell::new(txn.kind().name()),
            Cell::new(txn.description()),
            Cell::new(money(txn.amount())).set_alignment(CellAlignment::Right),
            Cell::new(txn.category().unwrap_or("")),
            Cell::new(tags.join(", ")),
            Cell::new(fingerprint.short()),
        ]);
    }

    if shown == 0 {
        println!("No transactions.");
        return Ok(());
    }
    println!("{table}");
    println!("{shown} of {} transactions, net {}", store.count(), money(total));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;
    use chrono::NaiveDate;

    fn txn(category: Option<&str>, tag: Option<&str>) -> Transaction {
        let mut t = Transaction::new(
            AccountType::CreditCard,
            TransactionType::Debit,
            "HOTEL",
            -20000,
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        );
        t.annotations.category = category.map(str::to_string);
        t.annotations.tags.extend(tag.map(str::to_string));
        t
    }

    #[test]
    fn test_filter() {
        let t = txn(Some("Travel"), Some("work"));
        assert!(Filter::default().matches(&t));
        let by_category = Filter { category: Some("travel".into()), ..Filter::default() };
        assert!(by_category.matches(&t));
        assert!(!by_category.matches(&txn(None, None)));
        let by_tag = Filter { tag: Some("trip".into()), ..Filter::default() };
        assert!(!by_tag.matches(&t));
        let by_account = Filter { account: Some(AccountType::Checking), ..Filter::default() };
        assert!(!by_account.matches(&t));
    }
}
