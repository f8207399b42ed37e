//! Coin reward ledger
//!
//! A singleton record, read-modify-written on every credit.
//! There is no decrement operation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::LogStore;

const COINS_FILE: &str = "user_coins.json";

/// The singleton coin ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinsLedger {
    pub coins: u64,
    pub total_earned: u64,
    pub last_updated: DateTime<Utc>,
    pub last_reason: String,
}

impl Default for CoinsLedger {
    fn default() -> Self {
        Self {
            coins: 0,
            total_earned: 0,
            last_updated: Utc::now(),
            last_reason: String::new(),
        }
    }
}

impl LogStore {
    /// Load the ledger; missing or corrupt file degrades to a zeroed ledger
    pub fn load_coins(&self) -> CoinsLedger {
        self.read_json_or_default(&self.file_path(COINS_FILE))
    }

    /// Add coins and record the reason. Returns the updated ledger.
    pub fn credit_coins(&self, amount: u64, reason: &str) -> Result<CoinsLedger> {
        let path = self.file_path(COINS_FILE);
        let _guard = self.guard();

        let mut ledger: CoinsLedger = self.read_json_or_default(&path);
        ledger.coins += amount;
        ledger.total_earned += amount;
        ledger.last_updated = Utc::now();
        ledger.last_reason = reason.to_string();

        self.write_json_atomic(&path, &ledger)
            .context("Failed to write coin ledger")?;
        info!("Credited {} coins: {}", amount, reason);
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::with_dir(dir.path().to_path_buf()).unwrap();

        store.credit_coins(1, "correct exercise").unwrap();
        let ledger = store.credit_coins(5, "error resolved").unwrap();

        assert_eq!(ledger.coins, 6);
        assert_eq!(ledger.total_earned, 6);
        assert_eq!(ledger.last_reason, "error resolved");

        // And the same values come back from disk
        let reloaded = store.load_coins();
        assert_eq!(reloaded.coins, 6);
        assert_eq!(reloaded.total_earned, 6);
    }

    #[test]
    fn test_corrupt_ledger_restarts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::with_dir(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join("user_coins.json"), "][").unwrap();

        let ledger = store.credit_coins(2, "x").unwrap();
        assert_eq!(ledger.coins, 2);
    }
}
