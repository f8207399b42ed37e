//! Dialog session flow
//!
//! Drives one scenario dialog: exit words, the aggression gate, the
//! auto-completion heuristic, normal model turns and transcript saving.
//! The surface (terminal, GUI) only renders [`TurnOutcome`] values.

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::analyzer::AnalysisJob;
use crate::filter::AggressionClassifier;
use crate::llm::{ChatMessage, LanguageModel};
use crate::prompts;
use crate::scenarios::Scenario;
use crate::store::{DialogRecord, LogStore, AGGRESSIVE_LANGUAGE_KIND, API_ERROR_KIND};
use crate::types::{Difficulty, Message, Role};

/// Substrings that end the dialog immediately
pub const EXIT_WORDS: &[&str] = &["выход", "exit", "bye"];

/// Farewell substrings that make the dialog a completion candidate
pub const FAREWELL_WORDS: &[&str] = &[
    "bye", "goodbye", "see you", "thank you", "thanks", "that's all",
    "конец", "пока", "до свидания",
];

/// Dialogs shorter than this are never auto-completed
pub const MIN_MESSAGES_FOR_COMPLETION: usize = 12;

/// Canned farewell when the completion-message call fails
const FALLBACK_FAREWELL: &str = "Thank you for the conversation. Have a great day!";

/// What happened with one user turn
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// Empty input, nothing to do
    Ignored,
    /// User asked to leave; transcript saved
    Exit,
    /// Aggression aimed at the role; canned reaction, message not forwarded
    AggressionBlocked {
        reaction: String,
        detected_keywords: Vec<String>,
    },
    /// The dialog reached a natural end; transcript saved
    Completed { farewell: String },
    /// Normal assistant reply
    Reply(String),
}

/// One scenario dialog in progress
pub struct ChatSession {
    scenario: &'static Scenario,
    difficulty: Difficulty,
    dialog_id: String,
    messages: Vec<Message>,
    hints_remaining: Option<u32>,
    store: Arc<LogStore>,
    classifier: Arc<dyn AggressionClassifier>,
    llm: Arc<dyn LanguageModel>,
}

impl ChatSession {
    pub fn new(
        scenario: &'static Scenario,
        difficulty: Difficulty,
        store: Arc<LogStore>,
        classifier: Arc<dyn AggressionClassifier>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        let system = prompts::system_prompt(
            scenario.description,
            difficulty,
            Some(scenario.aggression_response),
        );
        Self {
            scenario,
            difficulty,
            dialog_id: Uuid::new_v4().to_string(),
            messages: vec![Message::new(Role::System, system)],
            hints_remaining: difficulty.hint_budget(),
            store,
            classifier,
            llm,
        }
    }

    pub fn dialog_id(&self) -> &str {
        &self.dialog_id
    }

    pub fn scenario(&self) -> &'static Scenario {
        self.scenario
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// `None` means unlimited hints
    pub fn hints_remaining(&self) -> Option<u32> {
        self.hints_remaining
    }

    /// Consume one hint from the budget; false when exhausted
    pub fn try_use_hint(&mut self) -> bool {
        match &mut self.hints_remaining {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }

    /// Process one user message
    pub async fn handle_user_turn(&mut self, text: &str) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let lower = text.to_lowercase();
        if EXIT_WORDS.iter().any(|w| lower.contains(w)) {
            self.save();
            return Ok(TurnOutcome::Exit);
        }

        let detected = self.classifier.detect(text);
        if !detected.is_empty() {
            let targets_role =
                self.scenario.targets_role(text) || self.scenario.role_keywords.is_empty();
            if targets_role {
                return self.block_aggression(text, detected);
            }
        }

        if self.should_complete(text).await {
            let farewell = self.completion_message().await;
            self.messages.push(Message::new(Role::User, text));
            self.messages.push(Message::new(Role::Assistant, farewell.clone()));
            self.save();
            return Ok(TurnOutcome::Completed { farewell });
        }

        let mut wire: Vec<ChatMessage> = self.messages.iter().map(Into::into).collect();
        wire.push(ChatMessage::user(text));

        match self.llm.chat(wire, 0.7).await {
            Ok(answer) => {
                self.messages.push(Message::new(Role::User, text));
                self.messages.push(Message::new(Role::Assistant, answer.clone()));
                Ok(TurnOutcome::Reply(answer))
            }
            Err(e) => {
                let _ = self.store.save_error(
                    API_ERROR_KIND,
                    &e.to_string(),
                    json!({
                        "scenario": self.scenario.description,
                        "difficulty": self.difficulty,
                        "user_message": text,
                    }),
                );
                Err(e).context("Model call failed")
            }
        }
    }

    fn block_aggression(&self, text: &str, detected: Vec<String>) -> Result<TurnOutcome> {
        let reaction = self.scenario.aggression_response.to_string();

        if let Err(e) = self.store.save_incident(
            Some(&self.dialog_id),
            text,
            detected.clone(),
            &reaction,
            self.scenario.description,
            self.difficulty,
        ) {
            warn!("Failed to record aggression incident: {}", e);
        }

        if let Err(e) = self.store.save_error(
            AGGRESSIVE_LANGUAGE_KIND,
            &format!("User used aggressive language: {}", detected.join(", ")),
            json!({
                "scenario": self.scenario.description,
                "difficulty": self.difficulty,
                "user_message": text,
                "detected_keywords": detected,
                "ai_reaction": reaction,
            }),
        ) {
            warn!("Failed to record aggression error: {}", e);
        }

        Ok(TurnOutcome::AggressionBlocked {
            reaction,
            detected_keywords: detected,
        })
    }

    /// Two cheap gates (length, farewell word) before asking the model
    /// whether the dialog should end
    async fn should_complete(&self, pending_user_text: &str) -> bool {
        if self.messages.len() + 1 < MIN_MESSAGES_FOR_COMPLETION {
            return false;
        }

        let lower = pending_user_text.to_lowercase();
        if !FAREWELL_WORDS.iter().any(|w| lower.contains(w)) {
            return false;
        }

        let prompt = prompts::completion_check_prompt(
            self.scenario.description,
            &self.recent_context(pending_user_text),
            &lower,
        );
        match self.llm.generate(&prompt, 0.1).await {
            Ok(answer) => answer.trim().to_uppercase().contains("ДА"),
            Err(e) => {
                warn!("Completion check failed: {}", e);
                false
            }
        }
    }

    async fn completion_message(&self) -> String {
        let prompt = prompts::completion_message_prompt(
            self.scenario.description,
            &self.recent_context(""),
        );
        match self.llm.generate(&prompt, 0.7).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!("Completion message generation failed: {}", e);
                FALLBACK_FAREWELL.to_string()
            }
        }
    }

    /// Last turns formatted for the completion prompts
    fn recent_context(&self, pending_user_text: &str) -> String {
        let mut lines: Vec<String> = self
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let who = if m.role == Role::User { "Пользователь" } else { "AI" };
                format!("{}: {}", who, m.content)
            })
            .collect();
        if !pending_user_text.is_empty() {
            lines.push(format!("Пользователь: {}", pending_user_text));
        }
        let start = lines.len().saturating_sub(4);
        lines[start..].join("\n")
    }

    /// Save the transcript if the dialog has any non-system messages.
    /// Best-effort: a failed save is logged and swallowed.
    pub fn save(&self) -> Option<DialogRecord> {
        if self.messages.len() <= 1 {
            return None;
        }
        match self.store.save_dialog(
            &self.dialog_id,
            self.scenario.description,
            self.difficulty,
            &self.messages,
        ) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Failed to save dialog: {}", e);
                None
            }
        }
    }

    /// Analysis work for this dialog's user messages
    pub fn analysis_job(&self) -> AnalysisJob {
        AnalysisJob {
            dialog_id: self.dialog_id.clone(),
            scenario: self.scenario.description.to_string(),
            difficulty: self.difficulty,
            user_messages: self
                .messages
                .iter()
                .filter(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .collect(),
        }
    }
}
