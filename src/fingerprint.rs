use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::BudgetError;
use crate::models::{AccountType, Transaction};

/// ASCII unit separator. Descriptions are normalized so it cannot occur inside
/// a hashed transaction field.
const FIELD_SEPARATOR: u8 = 0x1f;

/// SHA-256 identity of a transaction occurrence.
///
/// The 32 bytes are the digest in big-endian order, so the derived `Ord`
/// matches ordering of the digest read as a 256-bit unsigned integer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash an ordered list of text fields joined by [`FIELD_SEPARATOR`].
    pub fn of_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                hasher.update([FIELD_SEPARATOR]);
            }
            hasher.update(field.as_ref().as_bytes());
        }
        Self::finish(hasher)
    }

    fn finish(hasher: Sha256) -> Self {
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Field order: account, transaction type, normalized description,
    /// amount in minor units, ISO date. The balance hint and annotations are
    /// deliberately absent.
    pub fn of_transaction(txn: &Transaction) -> Self {
        let amount = txn.amount().to_string();
        let date = txn.date().format("%Y-%m-%d").to_string();
        Self::of_fields([
            txn.account().key(),
            txn.kind().key(),
            txn.description(),
            amount.as_str(),
            date.as_str(),
        ])
    }

    /// Identity of a source row as read, scoped to an account.
    ///
    /// Raw fields are not normalized and may contain any byte, so each one is
    /// length-prefixed instead of separated.
    pub fn of_raw_row<S: AsRef<str>>(account: AccountType, raw: &[S]) -> Self {
        let mut fields: Vec<&str> = vec![account.key()];
        fields.extend(raw.iter().map(|f| f.as_ref()));
        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        Self::finish(hasher)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex digits, for tables and log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl FromStr for Fingerprint {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| BudgetError::Other(format!("invalid fingerprint '{s}': {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
