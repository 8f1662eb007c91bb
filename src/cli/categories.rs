use comfy_table::{Cell, Table};

use crate::categorizer::CategoryCache;
use crate::error::Result;
use crate::settings::{load_settings, shellexpand_path};

pub fn list(cache: Option<&str>) -> Result<()> {
    let path = match cache {
        Some(path) => shellexpand_path(path).into(),
        None => load_settings().category_cache_path(),
    };
    let cache = CategoryCache::load(&path)?;
    if cache.is_empty() {
        println!("No learned categories in {}", path.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Pattern", "Category"]);
    for (i, entry) in cache.entries().iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&entry.pattern),
            Cell::new(&entry.category),
        ]);
    }
    println!("Category matchers (first match wins)\n{table}");
    println!("{} matchers, {} categories", cache.len(), cache.categories().len());
    Ok(())
}
