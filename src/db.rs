use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::{BudgetError, Result};
use crate::fingerprint::Fingerprint;
use crate::models::{normalize_description, Transaction};
use crate::store::TransactionStore;

pub const LEDGER_FORMAT: &str = "budget-ledger";
pub const CACHE_FORMAT: &str = "budget-category-cache";

/// Highest schema version this build reads and the version it writes.
pub const SCHEMA_VERSION: u64 = 1;

/// What loading does when the target file does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    Error,
    Empty,
}

#[derive(Serialize)]
struct LedgerOut<'a> {
    format: &'static str,
    version: u64,
    transactions: &'a BTreeMap<Fingerprint, Transaction>,
}

#[derive(Deserialize)]
struct LedgerIn {
    transactions: BTreeMap<Fingerprint, Transaction>,
}

fn corrupt(path: &Path, reason: impl ToString) -> BudgetError {
    BudgetError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Read a versioned JSON file. `Ok(None)` means the file does not exist.
pub(crate) fn load_versioned<T: DeserializeOwned>(path: &Path, format: &str) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value: Value = serde_json::from_str(&content).map_err(|e| corrupt(path, e))?;

    let found_format = value.get("format").and_then(Value::as_str);
    if found_format != Some(format) {
        return Err(corrupt(
            path,
            format!("expected a {format} file, found {}", found_format.unwrap_or("no format tag")),
        ));
    }
    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| corrupt(path, "missing schema version"))?;
    if version == 0 || version > SCHEMA_VERSION {
        return Err(BudgetError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: version,
            expected: SCHEMA_VERSION,
        });
    }

    let parsed = serde_json::from_value(value).map_err(|e| corrupt(path, e))?;
    debug!("read {} (schema v{version})", path.display());
    Ok(Some(parsed))
}

/// Serialize fully, write to a temp file beside `path`, fsync, then rename
/// over the target. The previous file survives any failure before the rename.
pub(crate) fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Every key must be the recomputed fingerprint of a normalized record.
fn check_keys(path: &Path, transactions: &BTreeMap<Fingerprint, Transaction>) -> Result<()> {
    for (fp, txn) in transactions {
        if normalize_description(txn.description()) != txn.description() {
            return Err(corrupt(path, format!("entry {fp} has an unnormalized description")));
        }
        if *fp != txn.fingerprint() {
            return Err(corrupt(
                path,
                format!("entry {fp} does not match its record (expected {})", txn.fingerprint()),
            ));
        }
    }
    Ok(())
}

pub fn load_store(path: &Path, on_missing: OnMissing) -> Result<TransactionStore> {
    match load_versioned::<LedgerIn>(path, LEDGER_FORMAT)? {
        Some(file) => {
            check_keys(path, &file.transactions)?;
            info!("loaded {} transactions from {}", file.transactions.len(), path.display());
            Ok(TransactionStore::from_map(file.transactions))
        }
        None => match on_missing {
            OnMissing::Empty => {
                info!("{} does not exist, starting an empty store", path.display());
                Ok(TransactionStore::new())
            }
            OnMissing::Error => Err(BudgetError::StoreMissing(path.to_path_buf())),
        },
    }
}

pub fn save_store(store: &TransactionStore, path: &Path) -> Result<()> {
    write_atomic(
        path,
        &LedgerOut {
            format: LEDGER_FORMAT,
            version: SCHEMA_VERSION,
            transactions: store.as_map(),
        },
    )?;
    info!("saved {} transactions to {}", store.count(), path.display());
    Ok(())
}

/// Location and load policy of one ledger file.
#[derive(Debug, Clone)]
pub struct LedgerFile {
    path: PathBuf,
    on_missing: OnMissing,
}

impl LedgerFile {
    pub fn new(path: impl Into<PathBuf>, on_missing: OnMissing) -> Self {
        Self {
            path: path.into(),
            on_missing,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the advisory lock. A missing parent directory is created only
    /// when the caller opted into starting an empty store.
    pub fn lock(&self) -> Result<StoreLock> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                match self.on_missing {
                    OnMissing::Empty => fs::create_dir_all(parent)?,
                    OnMissing::Error => return Err(BudgetError::StoreMissing(self.path.clone())),
                }
            }
        }
        StoreLock::acquire(&self.path)
    }

    pub fn load(&self) -> Result<TransactionStore> {
        load_store(&self.path, self.on_missing)
    }

    pub fn save(&self, store: &TransactionStore) -> Result<()> {
        save_store(store, &self.path)
    }
}

/// Advisory lock held as `<store>.lock` for the life of a session. Removed on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    pub fn acquire(store_path: &Path) -> Result<Self> {
        let mut raw = store_path.as_os_str().to_owned();
        raw.push(".lock");
        let path = PathBuf::from(raw);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                debug!("locked {}", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(BudgetError::Locked(path)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("could not remove lock {}: {e}", self.path.display());
        }
    }
}
