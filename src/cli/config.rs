use crate::error::Result;
use crate::models::AccountType;
use crate::settings::{load_settings, save_settings, settings_path, Settings};

/// Apply the given changes to `settings`; returns whether anything changed.
fn apply(
    settings: &mut Settings,
    cache: Option<String>,
    ask_tags: Option<bool>,
    default_account: Option<String>,
) -> Result<bool> {
    let mut changed = false;
    if let Some(cache) = cache {
        settings.category_cache = cache;
        changed = true;
    }
    if let Some(ask_tags) = ask_tags {
        settings.ask_tags = ask_tags;
        changed = true;
    }
    if let Some(account) = default_account {
        let account: AccountType = account.parse()?;
        settings.default_account = Some(account.key().to_string());
        changed = true;
    }
    Ok(changed)
}

pub fn run(cache: Option<String>, ask_tags: Option<bool>, default_account: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if apply(&mut settings, cache, ask_tags, default_account)? {
        save_settings(&settings)?;
        println!("Saved {}", settings_path().display());
    }

    println!("Category cache:  {}", settings.category_cache_path().display());
    println!("Ask for tags:    {}", if settings.ask_tags { "yes" } else { "no" });
    let account = settings.default_account()?;
    println!(
        "Default account: {}",
        account.map_or("(ask)", |a| a.name())
    );
    Ok(())
}
