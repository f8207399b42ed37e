//! Append-only journals: errors, help requests, aggression incidents
//!
//! Each journal is a single JSON array file rewritten wholesale on append.
//! Nothing in a journal is ever mutated or deleted.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prompts::{RECOMMENDATIONS_MARKER, TOPICS_MARKER};
use crate::types::Difficulty;

use super::LogStore;

const ERRORS_FILE: &str = "errors.json";
const HELP_REQUESTS_FILE: &str = "help_requests.json";
const INCIDENTS_FILE: &str = "aggressive_incidents.json";

/// Error kind for a post-dialog analysis summary
pub const DIALOG_SUMMARY_KIND: &str = "dialog_error_summary";
/// Error kind for a blocked aggressive message
pub const AGGRESSIVE_LANGUAGE_KIND: &str = "aggressive_language";
/// Error kind for a failed model call
pub const API_ERROR_KIND: &str = "api_error";

/// One recorded error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub context: Value,
}

/// One served hint, explanation or assistant answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpRequestEntry {
    pub timestamp: DateTime<Utc>,
    pub dialog_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub user_input: String,
    pub ai_response: String,
    #[serde(default)]
    pub context: Value,
}

/// One blocked aggressive message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggressionIncident {
    pub timestamp: DateTime<Utc>,
    pub dialog_id: Option<String>,
    pub user_message: String,
    pub detected_keywords: Vec<String>,
    /// How the AI role reacted
    pub role_reaction: String,
    pub scenario: String,
    pub difficulty: Difficulty,
}

/// Digest of recent analysis summaries, used to seed exercises
#[derive(Debug, Clone, Default)]
pub struct ErrorSummary {
    pub error_themes: Vec<String>,
    pub recommendations: Vec<String>,
    pub total_errors: usize,
    pub recent_errors: Vec<ErrorLogEntry>,
}

impl LogStore {
    /// Append an error to the shared error journal
    pub fn save_error(&self, kind: &str, message: &str, context: Value) -> Result<()> {
        self.append_to_array(
            ERRORS_FILE,
            ErrorLogEntry {
                timestamp: Utc::now(),
                kind: kind.to_string(),
                message: message.to_string(),
                context,
            },
        )
    }

    /// All recorded errors; corrupt or missing file degrades to empty
    pub fn load_errors(&self) -> Vec<ErrorLogEntry> {
        self.read_json_or_default(&self.file_path(ERRORS_FILE))
    }

    /// Append a help request (translation, cultural note, answer options, ...)
    pub fn save_help_request(
        &self,
        kind: &str,
        dialog_id: Option<&str>,
        user_input: &str,
        ai_response: &str,
        context: Value,
    ) -> Result<()> {
        self.append_to_array(
            HELP_REQUESTS_FILE,
            HelpRequestEntry {
                timestamp: Utc::now(),
                dialog_id: dialog_id.map(|s| s.to_string()),
                kind: kind.to_string(),
                user_input: user_input.to_string(),
                ai_response: ai_response.to_string(),
                context,
            },
        )
    }

    /// All recorded help requests
    pub fn load_help_requests(&self) -> Vec<HelpRequestEntry> {
        self.read_json_or_default(&self.file_path(HELP_REQUESTS_FILE))
    }

    /// Append an aggression incident
    #[allow(clippy::too_many_arguments)]
    pub fn save_incident(
        &self,
        dialog_id: Option<&str>,
        user_message: &str,
        detected_keywords: Vec<String>,
        role_reaction: &str,
        scenario: &str,
        difficulty: Difficulty,
    ) -> Result<()> {
        self.append_to_array(
            INCIDENTS_FILE,
            AggressionIncident {
                timestamp: Utc::now(),
                dialog_id: dialog_id.map(|s| s.to_string()),
                user_message: user_message.to_string(),
                detected_keywords,
                role_reaction: role_reaction.to_string(),
                scenario: scenario.to_string(),
                difficulty,
            },
        )
    }

    /// All recorded incidents
    pub fn load_incidents(&self) -> Vec<AggressionIncident> {
        self.read_json_or_default(&self.file_path(INCIDENTS_FILE))
    }

    /// Digest the recent analysis summaries into themes and recommendations
    pub fn error_summary_for_exercises(&self) -> ErrorSummary {
        let errors = self.load_errors();
        let dialog_errors: Vec<&ErrorLogEntry> = errors
            .iter()
            .filter(|e| e.kind == DIALOG_SUMMARY_KIND)
            .collect();

        let mut summary = ErrorSummary {
            total_errors: dialog_errors.len(),
            ..Default::default()
        };

        let start = dialog_errors.len().saturating_sub(5);
        for error in &dialog_errors[start..] {
            let content = &error.message;

            if let Some(themes) = content.split(TOPICS_MARKER).nth(1) {
                let themes = themes.trim();
                if !themes.is_empty() {
                    summary.error_themes.push(themes.to_string());
                }
            }

            if let Some(rest) = content.split(RECOMMENDATIONS_MARKER).nth(1) {
                let rest = rest.split(TOPICS_MARKER).next().unwrap_or(rest);
                let rest = rest.trim();
                if !rest.is_empty() {
                    summary.recommendations.push(rest.to_string());
                }
            }
        }

        let recent_start = dialog_errors.len().saturating_sub(3);
        summary.recent_errors = dialog_errors[recent_start..]
            .iter()
            .map(|e| (*e).clone())
            .collect();

        summary
    }
}
