//! Error profile persistence
//!
//! One JSON object keyed by `error_type + "_" + normalized phrase`,
//! overwritten wholesale on every update. The tracker logic that mutates
//! these records lives in `practice::profile`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::LogStore;

const PROFILE_FILE: &str = "user_error_profile.json";

/// The whole on-disk profile. BTreeMap keeps iteration deterministic,
/// which makes selection tie-breaks reproducible.
pub type ErrorProfile = BTreeMap<String, ErrorProfileEntry>;

/// One detection of the same mistake signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub timestamp: DateTime<Utc>,
    pub dialog_id: String,
}

/// Practice state for one mistake signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorProfileEntry {
    pub original_phrase: String,
    pub error_type: String,
    pub explanation: String,
    pub correction: String,
    /// How many times this mistake has been detected
    pub count: u32,
    /// Correct practice repetitions still needed before the mistake
    /// is considered resolved
    pub exercise_repetition_count: u32,
    #[serde(default)]
    pub completed: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub first_seen_dialog_id: String,
    pub last_seen_dialog_id: String,
    #[serde(default)]
    pub history: Vec<HistoryEvent>,
}

impl LogStore {
    /// Load the profile; missing or corrupt file degrades to empty
    pub fn load_profile(&self) -> ErrorProfile {
        self.read_json_or_default(&self.file_path(PROFILE_FILE))
    }

    /// Overwrite the whole profile
    pub fn save_profile(&self, profile: &ErrorProfile) -> Result<()> {
        let _guard = self.guard();
        self.write_json_atomic(&self.file_path(PROFILE_FILE), profile)
            .context("Failed to write error profile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> ErrorProfileEntry {
        let now = Utc::now();
        ErrorProfileEntry {
            original_phrase: "i has a book".to_string(),
            error_type: "verb_agreement".to_string(),
            explanation: "Use 'have' with I.".to_string(),
            correction: "I have a book".to_string(),
            count: 1,
            exercise_repetition_count: 6,
            completed: false,
            first_seen: now,
            last_seen: now,
            first_seen_dialog_id: "d-1".to_string(),
            last_seen_dialog_id: "d-1".to_string(),
            history: vec![],
        }
    }

    #[test]
    fn test_profile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::with_dir(dir.path().to_path_buf()).unwrap();

        let mut profile = ErrorProfile::new();
        profile.insert("verb_agreement_i has a book".to_string(), sample_entry());
        store.save_profile(&profile).unwrap();

        let loaded = store.load_profile();
        assert_eq!(loaded.len(), 1);
        let entry = &loaded["verb_agreement_i has a book"];
        assert_eq!(entry.exercise_repetition_count, 6);
        assert_eq!(entry.correction, "I have a book");
    }

    #[test]
    fn test_corrupt_profile_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::with_dir(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join("user_error_profile.json"), "{{{{").unwrap();
        assert!(store.load_profile().is_empty());
    }
}
