//! Error profile tracking
//!
//! Maps a mistake signature (error type + normalized phrase) to its practice
//! countdown state. A new signature starts with 6 repetitions remaining;
//! each correct practice answer decrements (floor 0, at which point the
//! entry is resolved), each incorrect answer increments up to the cap.
//! This is a bounded counter, not an interval scheduler.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::store::{ErrorProfile, ErrorProfileEntry, HistoryEvent, LogStore};

/// Repetitions a freshly observed mistake starts with
pub const INITIAL_REPETITIONS: u32 = 6;
/// Ceiling for repetition growth on repeated wrong answers
pub const REPETITION_CAP: u32 = 12;

/// One mistake reported by the external error classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedError {
    pub original_phrase: String,
    pub error_type: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub correction: String,
}

/// Effect of recording one practice answer
#[derive(Debug, Clone, Copy)]
pub struct PracticeOutcome {
    pub repetitions_remaining: u32,
    /// True when this answer brought the countdown to zero
    pub resolved: bool,
}

/// Lowercase, collapse inner whitespace, strip trailing punctuation
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', ',', '!', '?', ';', ':'])
        .to_string()
}

/// Profile key for a detection
pub fn profile_key(error_type: &str, original_phrase: &str) -> String {
    format!("{}_{}", error_type, normalize_phrase(original_phrase))
}

/// Pick up to `max` entries by priority: repetitions remaining first,
/// then detection frequency. Resolved entries never qualify.
pub fn select_for_practice(
    profile: &ErrorProfile,
    max: usize,
) -> Vec<(String, ErrorProfileEntry)> {
    let mut candidates: Vec<(String, ErrorProfileEntry)> = profile
        .iter()
        .filter(|(_, e)| e.exercise_repetition_count > 0 && !e.completed)
        .map(|(k, e)| (k.clone(), e.clone()))
        .collect();

    // Stable sort: ties keep the profile's key order
    candidates.sort_by(|a, b| {
        (b.1.exercise_repetition_count, b.1.count).cmp(&(a.1.exercise_repetition_count, a.1.count))
    });
    candidates.truncate(max);
    candidates
}

/// Mutates the persistent error profile
pub struct ErrorProfileTracker {
    store: Arc<LogStore>,
}

impl ErrorProfileTracker {
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }

    /// Fold freshly detected errors into the profile.
    /// Re-detection of a known signature bumps its counter; a new signature
    /// creates an entry with the full repetition countdown.
    pub fn upsert(&self, detections: &[DetectedError], dialog_id: &str) -> Result<ErrorProfile> {
        let mut profile = self.store.load_profile();
        let now = Utc::now();

        for detection in detections {
            let key = profile_key(&detection.error_type, &detection.original_phrase);
            let event = HistoryEvent {
                timestamp: now,
                dialog_id: dialog_id.to_string(),
            };

            match profile.get_mut(&key) {
                Some(entry) => {
                    entry.count += 1;
                    entry.last_seen = now;
                    entry.last_seen_dialog_id = dialog_id.to_string();
                    entry.history.push(event);
                    debug!("Repeat detection for {} (count {})", key, entry.count);
                }
                None => {
                    profile.insert(
                        key.clone(),
                        ErrorProfileEntry {
                            original_phrase: detection.original_phrase.clone(),
                            error_type: detection.error_type.clone(),
                            explanation: detection.explanation.clone(),
                            correction: detection.correction.clone(),
                            count: 1,
                            exercise_repetition_count: INITIAL_REPETITIONS,
                            completed: false,
                            first_seen: now,
                            last_seen: now,
                            first_seen_dialog_id: dialog_id.to_string(),
                            last_seen_dialog_id: dialog_id.to_string(),
                            history: vec![event],
                        },
                    );
                    info!("New error profile entry: {}", key);
                }
            }
        }

        self.store.save_profile(&profile)?;
        Ok(profile)
    }

    /// Record a practice answer for one entry.
    /// Returns `None` when the key no longer exists in the profile.
    pub fn record_outcome(&self, key: &str, is_correct: bool) -> Result<Option<PracticeOutcome>> {
        let mut profile = self.store.load_profile();

        let Some(entry) = profile.get_mut(key) else {
            warn!("Practice outcome for unknown profile key: {}", key);
            return Ok(None);
        };

        let outcome = if is_correct {
            entry.exercise_repetition_count = entry.exercise_repetition_count.saturating_sub(1);
            let newly_resolved = entry.exercise_repetition_count == 0 && !entry.completed;
            if newly_resolved {
                entry.completed = true;
                info!("Error resolved: {}", key);
            }
            PracticeOutcome {
                repetitions_remaining: entry.exercise_repetition_count,
                resolved: newly_resolved,
            }
        } else {
            entry.exercise_repetition_count =
                (entry.exercise_repetition_count + 1).min(REPETITION_CAP);
            PracticeOutcome {
                repetitions_remaining: entry.exercise_repetition_count,
                resolved: false,
            }
        };

        self.store.save_profile(&profile)?;
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (tempfile::TempDir, ErrorProfileTracker, Arc<LogStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());
        (dir, ErrorProfileTracker::new(store.clone()), store)
    }

    fn detection(phrase: &str, error_type: &str) -> DetectedError {
        DetectedError {
            original_phrase: phrase.to_string(),
            error_type: error_type.to_string(),
            explanation: "explanation".to_string(),
            correction: "correction".to_string(),
        }
    }

    #[test]
    fn test_normalize_phrase() {
        assert_eq!(normalize_phrase("  I  Has a Book. "), "i has a book");
        assert_eq!(normalize_phrase("Hello!"), "hello");
        assert_eq!(profile_key("verb_agreement", "I Has a Book"), "verb_agreement_i has a book");
    }

    #[test]
    fn test_redetection_increments_not_duplicates() {
        let (_dir, tracker, _store) = tracker();

        tracker.upsert(&[detection("I has a book", "verb_agreement")], "d-1").unwrap();
        let profile = tracker
            .upsert(&[detection("i has a BOOK.", "verb_agreement")], "d-2")
            .unwrap();

        assert_eq!(profile.len(), 1);
        let entry = profile.values().next().unwrap();
        assert_eq!(entry.count, 2);
        assert_eq!(entry.exercise_repetition_count, INITIAL_REPETITIONS);
        assert_eq!(entry.first_seen_dialog_id, "d-1");
        assert_eq!(entry.last_seen_dialog_id, "d-2");
        assert_eq!(entry.history.len(), 2);
    }

    #[test]
    fn test_selection_priority() {
        let (_dir, tracker, store) = tracker();

        tracker.upsert(&[detection("phrase one", "a")], "d-1").unwrap();
        tracker.upsert(&[detection("phrase two", "b")], "d-1").unwrap();
        tracker.upsert(&[detection("phrase three", "c")], "d-1").unwrap();

        // Shape the counters: (rep=2, count=5), (rep=6, count=1), (rep=0, count=9)
        let mut profile = store.load_profile();
        {
            let e = profile.get_mut("a_phrase one").unwrap();
            e.exercise_repetition_count = 2;
            e.count = 5;
        }
        {
            let e = profile.get_mut("b_phrase two").unwrap();
            e.exercise_repetition_count = 6;
            e.count = 1;
        }
        {
            let e = profile.get_mut("c_phrase three").unwrap();
            e.exercise_repetition_count = 0;
            e.count = 9;
        }
        store.save_profile(&profile).unwrap();

        let selected = select_for_practice(&store.load_profile(), 5);
        let keys: Vec<&str> = selected.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b_phrase two", "a_phrase one"]);
    }

    #[test]
    fn test_selection_respects_max() {
        let (_dir, tracker, store) = tracker();
        for i in 0..8 {
            tracker
                .upsert(&[detection(&format!("phrase {}", i), "t")], "d-1")
                .unwrap();
        }
        let selected = select_for_practice(&store.load_profile(), 5);
        assert_eq!(selected.len(), 5);
    }

    #[test]
    fn test_outcome_floor_and_completion() {
        let (_dir, tracker, store) = tracker();
        tracker.upsert(&[detection("phrase", "t")], "d-1").unwrap();

        for expected in (0..INITIAL_REPETITIONS).rev() {
            let outcome = tracker.record_outcome("t_phrase", true).unwrap().unwrap();
            assert_eq!(outcome.repetitions_remaining, expected);
            assert_eq!(outcome.resolved, expected == 0);
        }

        let entry = &store.load_profile()["t_phrase"];
        assert!(entry.completed);
        assert_eq!(entry.exercise_repetition_count, 0);

        // Further correct answers stay at the floor and resolve only once
        let outcome = tracker.record_outcome("t_phrase", true).unwrap().unwrap();
        assert_eq!(outcome.repetitions_remaining, 0);
        assert!(!outcome.resolved);
    }

    #[test]
    fn test_incorrect_grows_to_cap() {
        let (_dir, tracker, store) = tracker();
        tracker.upsert(&[detection("phrase", "t")], "d-1").unwrap();

        for _ in 0..20 {
            tracker.record_outcome("t_phrase", false).unwrap();
        }
        let entry = &store.load_profile()["t_phrase"];
        assert_eq!(entry.exercise_repetition_count, REPETITION_CAP);
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let (_dir, tracker, _store) = tracker();
        assert!(tracker.record_outcome("missing", true).unwrap().is_none());
    }
}
