//! Dialog transcript persistence with a fixed retention window
//!
//! Each finished dialog becomes one `dialog_<timestamp>_<id>.json` file.
//! After every save the store keeps only the most recently created files
//! (3 by default) and deletes the rest best-effort.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::types::{Difficulty, Message, Role};

use super::LogStore;

const DIALOG_PREFIX: &str = "dialog_";
const DIALOG_SUFFIX: &str = ".json";

/// A finished dialog transcript. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogRecord {
    pub dialog_id: String,
    pub timestamp: DateTime<Utc>,
    pub scenario: String,
    pub difficulty: Difficulty,
    pub messages: Vec<Message>,
    /// Message count excluding the system prompt
    pub message_count: usize,
}

/// Aggregate statistics over the stored dialogs and journals
#[derive(Debug, Clone, Default, Serialize)]
pub struct DialogStats {
    pub total_dialogs: usize,
    pub total_errors: usize,
    pub total_help_requests: usize,
    pub scenarios_used: HashMap<String, u32>,
    pub difficulty_distribution: HashMap<String, u32>,
}

impl LogStore {
    /// Save a finished dialog, then enforce the retention window
    pub fn save_dialog(
        &self,
        dialog_id: &str,
        scenario: &str,
        difficulty: Difficulty,
        messages: &[Message],
    ) -> Result<DialogRecord> {
        let now = Utc::now();
        let short_id = dialog_id.get(..8).unwrap_or(dialog_id);
        let filename = format!(
            "{}{}_{}{}",
            DIALOG_PREFIX,
            now.format("%Y%m%d_%H%M%S"),
            short_id,
            DIALOG_SUFFIX,
        );

        let record = DialogRecord {
            dialog_id: dialog_id.to_string(),
            timestamp: now,
            scenario: scenario.to_string(),
            difficulty,
            messages: messages.to_vec(),
            message_count: messages.iter().filter(|m| m.role != Role::System).count(),
        };

        {
            let _guard = self.guard();
            self.write_json_atomic(&self.file_path(&filename), &record)
                .with_context(|| format!("Failed to write {}", filename))?;
        }
        info!("Dialog saved: {} ({} messages)", filename, record.message_count);

        self.cleanup_old_dialogs();
        Ok(record)
    }

    /// Delete dialog files beyond the retention window, best-effort
    fn cleanup_old_dialogs(&self) {
        let mut files = self.list_dialog_files(|meta| {
            meta.created().or_else(|_| meta.modified()).ok()
        });

        // Newest first by creation time
        files.sort_by(|a, b| b.1.cmp(&a.1));

        for (path, _) in files.into_iter().skip(self.keep_dialogs()) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Deleted old dialog: {}", path.display()),
                Err(e) => warn!("Error deleting dialog {}: {}", path.display(), e),
            }
        }
    }

    /// Load up to `limit` of the most recently modified dialogs,
    /// skipping files that fail to parse
    pub fn recent_dialogs(&self, limit: usize) -> Vec<DialogRecord> {
        let mut files = self.list_dialog_files(|meta| meta.modified().ok());
        files.sort_by(|a, b| b.1.cmp(&a.1));

        let mut dialogs = Vec::new();
        for (path, _) in files {
            if dialogs.len() >= limit {
                break;
            }
            match std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_json::from_str::<DialogRecord>(&s).map_err(Into::into))
            {
                Ok(record) => dialogs.push(record),
                Err(e) => warn!("Skipping unreadable dialog {}: {}", path.display(), e),
            }
        }
        dialogs
    }

    /// Statistics over stored dialogs, errors and help requests.
    /// Corrupt or missing files degrade to zeros.
    pub fn dialog_stats(&self) -> DialogStats {
        let mut stats = DialogStats::default();

        for (path, _) in self.list_dialog_files(|meta| meta.modified().ok()) {
            stats.total_dialogs += 1;
            let parsed = std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| serde_json::from_str::<DialogRecord>(&s).ok());
            match parsed {
                Some(record) => {
                    *stats.scenarios_used.entry(record.scenario).or_insert(0) += 1;
                    *stats
                        .difficulty_distribution
                        .entry(record.difficulty.to_string())
                        .or_insert(0) += 1;
                }
                None => warn!("Error reading dialog {}", path.display()),
            }
        }

        stats.total_errors = self.load_errors().len();
        stats.total_help_requests = self.load_help_requests().len();
        stats
    }

    /// Dialog files with a timestamp extracted from their metadata
    fn list_dialog_files<F>(&self, stamp: F) -> Vec<(PathBuf, SystemTime)>
    where
        F: Fn(&std::fs::Metadata) -> Option<SystemTime>,
    {
        let entries = match std::fs::read_dir(self.logs_dir()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list logs directory: {}", e);
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(DIALOG_PREFIX) || !name.ends_with(DIALOG_SUFFIX) {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            let Some(time) = stamp(&meta) else { continue };
            files.push((entry.path(), time));
        }
        files
    }
}
