use std::collections::BTreeMap;
use std::path::Path;

use comfy_table::{Cell, CellAlignment, Table};

use crate::db::{load_store, OnMissing};
use crate::error::Result;
use crate::fmt::money;
use crate::models::Transaction;
use crate::store::TransactionStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    count: usize,
    total: i64,
}

impl Tally {
    fn add(&mut self, amount: i64) {
        self.count += 1;
        self.total += amount;
    }
}

fn tally_by<K: Ord>(store: &TransactionStore, key: impl Fn(&Transaction) -> K) -> BTreeMap<K, Tally> {
    let mut out: BTreeMap<K, Tally> = BTreeMap::new();
    for (_, txn) in store.iter() {
        out.entry(key(txn)).or_default().add(txn.amount());
    }
    out
}

fn print_table(title: &str, rows: BTreeMap<String, Tally>) {
    let mut table = Table::new();
    table.set_header(vec![title, "Count", "Total"]);
    for (name, tally) in rows {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(tally.count).set_alignment(CellAlignment::Right),
            Cell::new(money(tally.total)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}

pub fn run(store_path: &Path) -> Result<()> {
    let store = load_store(store_path, OnMissing::Error)?;
    println!("Store:         {}", store_path.display());
    println!("Transactions:  {}", store.count());
    if store.is_empty() {
        return Ok(());
    }

    let uncategorized = store.iter().filter(|(_, t)| t.category().is_none()).count();
    println!("Uncategorized: {uncategorized}");
    println!();

    print_table("Account", tally_by(&store, |t| t.account().name().to_string()));
    print_table(
        "Category",
        tally_by(&store, |t| t.category().unwrap_or("(none)").to_string()),
    );
    Ok(())
}
