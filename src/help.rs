//! On-demand hints: translation, graded answer options, cultural and
//! grammar notes, and free-form assistant questions
//!
//! Every served hint is recorded in the help-request journal; generation
//! failures are recorded as errors and surfaced to the caller as inline
//! text rather than aborting the dialog.

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::llm::LanguageModel;
use crate::prompts;
use crate::store::LogStore;
use crate::types::{Difficulty, Message, Role};

/// Placeholder used before the assistant has said anything
pub const NO_AI_MESSAGE: &str = "Сообщений от AI для перевода пока нет.";

/// Parsed hint payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelpContent {
    pub translation: String,
    pub answer_options: Vec<String>,
}

/// Parse the sectioned hint response into translation and answer options
pub fn parse_help_content(content: &str) -> HelpContent {
    let mut parsed = HelpContent::default();
    let mut in_options = false;

    for line in content.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(prompts::TRANSLATION_MARKER) {
            parsed.translation = rest.trim().to_string();
            in_options = false;
        } else if line.starts_with(prompts::ANSWER_OPTIONS_MARKER) {
            in_options = true;
        } else if in_options {
            if let Some(option) = line
                .strip_prefix("1.")
                .or_else(|| line.strip_prefix("2."))
                .or_else(|| line.strip_prefix("3."))
            {
                parsed.answer_options.push(option.trim().to_string());
            }
        }
    }

    parsed
}

/// Last assistant message in the dialog, if any
pub fn last_assistant_message(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| m.content.as_str())
}

/// Recent non-system turns formatted for a prompt
fn recent_context(messages: &[Message], take: usize) -> String {
    let lines: Vec<String> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let who = if m.role == Role::User { "Вы" } else { "AI" };
            format!("{}: {}", who, m.content)
        })
        .collect();
    let start = lines.len().saturating_sub(take);
    lines[start..].join("\n")
}

/// Generates and records hints for the active dialog
pub struct HelpSystem {
    llm: Arc<dyn LanguageModel>,
    store: Arc<LogStore>,
}

impl HelpSystem {
    pub fn new(llm: Arc<dyn LanguageModel>, store: Arc<LogStore>) -> Self {
        Self { llm, store }
    }

    /// Translation of the last assistant message plus three graded
    /// answer options
    pub async fn help_content(
        &self,
        messages: &[Message],
        scenario: &str,
        difficulty: Difficulty,
        dialog_id: &str,
    ) -> Result<HelpContent> {
        let last = last_assistant_message(messages).unwrap_or(NO_AI_MESSAGE);
        let context = recent_context(messages, 4);
        let prompt = prompts::help_prompt(scenario, difficulty, &context, last);

        let content = self
            .llm
            .generate(&prompt, 0.7)
            .await
            .context("Failed to generate hint content")?;
        let parsed = parse_help_content(&content);

        let meta = json!({"scenario": scenario, "difficulty": difficulty});
        if let Err(e) = self.store.save_help_request(
            "translation",
            Some(dialog_id),
            last,
            &parsed.translation,
            meta.clone(),
        ) {
            warn!("Failed to record translation help request: {}", e);
        }
        if let Err(e) = self.store.save_help_request(
            "answer_options",
            Some(dialog_id),
            last,
            &parsed.answer_options.join("\n"),
            meta,
        ) {
            warn!("Failed to record answer-options help request: {}", e);
        }

        Ok(parsed)
    }

    /// Cultural-context explanation for the last assistant message
    pub async fn cultural_context(
        &self,
        messages: &[Message],
        scenario: &str,
        difficulty: Difficulty,
        dialog_id: &str,
    ) -> Result<String> {
        let Some(last) = last_assistant_message(messages) else {
            return Ok("Нет сообщения от AI для анализа культурного контекста.".to_string());
        };

        let prompt = prompts::cultural_context_prompt(scenario, difficulty, last);
        match self.llm.generate(&prompt, 0.3).await {
            Ok(answer) => {
                let answer = answer.trim().to_string();
                if let Err(e) = self.store.save_help_request(
                    "cultural",
                    Some(dialog_id),
                    last,
                    &answer,
                    json!({"scenario": scenario, "difficulty": difficulty}),
                ) {
                    warn!("Failed to record cultural help request: {}", e);
                }
                Ok(answer)
            }
            Err(e) => {
                let _ = self.store.save_error(
                    "cultural_context_generation_error",
                    &e.to_string(),
                    json!({"scenario": scenario, "difficulty": difficulty, "ai_message": last}),
                );
                Err(e)
            }
        }
    }

    /// Grammar breakdown of the last assistant message
    pub async fn grammar_analysis(
        &self,
        messages: &[Message],
        scenario: &str,
        difficulty: Difficulty,
        dialog_id: &str,
    ) -> Result<String> {
        let Some(last) = last_assistant_message(messages) else {
            return Ok("Нет сообщения от AI для грамматического анализа.".to_string());
        };

        let prompt = prompts::grammar_analysis_prompt(scenario, difficulty, last);
        match self.llm.generate(&prompt, 0.3).await {
            Ok(answer) => {
                let answer = answer.trim().to_string();
                if let Err(e) = self.store.save_help_request(
                    "grammar",
                    Some(dialog_id),
                    last,
                    &answer,
                    json!({"scenario": scenario, "difficulty": difficulty}),
                ) {
                    warn!("Failed to record grammar help request: {}", e);
                }
                Ok(answer)
            }
            Err(e) => {
                let _ = self.store.save_error(
                    "grammar_analysis_generation_error",
                    &e.to_string(),
                    json!({"scenario": scenario, "difficulty": difficulty, "ai_message": last}),
                );
                Err(e)
            }
        }
    }

    /// Free-form learner question about the ongoing dialog
    pub async fn ask_assistant(
        &self,
        messages: &[Message],
        scenario: &str,
        difficulty: Difficulty,
        dialog_id: &str,
        question: &str,
    ) -> Result<String> {
        let history: Vec<String> = messages
            .iter()
            .map(|m| format!("{}: {}", m.role.to_openai_string(), m.content))
            .collect();
        let prompt = prompts::assistant_question_prompt(
            scenario,
            difficulty,
            &history.join("\n"),
            question,
        );

        match self.llm.generate(&prompt, 0.7).await {
            Ok(answer) => {
                let answer = answer.trim().to_string();
                if let Err(e) = self.store.save_help_request(
                    "assistant_question",
                    Some(dialog_id),
                    question,
                    &answer,
                    json!({
                        "scenario": scenario,
                        "difficulty": difficulty,
                        "dialog_history_length": messages.len(),
                    }),
                ) {
                    warn!("Failed to record assistant question: {}", e);
                }
                Ok(answer)
            }
            Err(e) => {
                let _ = self.store.save_error(
                    "assistant_api_error",
                    &e.to_string(),
                    json!({"scenario": scenario, "difficulty": difficulty, "question": question}),
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLanguageModel;

    fn dialog() -> Vec<Message> {
        vec![
            Message::new(Role::System, "You are a waiter."),
            Message::new(Role::User, "Hello!"),
            Message::new(Role::Assistant, "Welcome! Table for one?"),
        ]
    }

    #[test]
    fn test_parse_help_content() {
        let content = "\
ПЕРЕВОД: Добро пожаловать! Столик на одного?
ВАРИАНТЫ_ОТВЕТОВ:
1. Yes, please.
2. Yes, a table for one, thank you.
3. Indeed, I would appreciate a quiet table for one.";

        let parsed = parse_help_content(content);
        assert_eq!(parsed.translation, "Добро пожаловать! Столик на одного?");
        assert_eq!(parsed.answer_options.len(), 3);
        assert_eq!(parsed.answer_options[0], "Yes, please.");
    }

    #[test]
    fn test_parse_ignores_unmarked_lines() {
        let parsed = parse_help_content("Some chatter\nwith no markers at all");
        assert!(parsed.translation.is_empty());
        assert!(parsed.answer_options.is_empty());
    }

    #[test]
    fn test_last_assistant_message() {
        assert_eq!(last_assistant_message(&dialog()), Some("Welcome! Table for one?"));
        assert_eq!(last_assistant_message(&[]), None);
    }

    #[tokio::test]
    async fn test_help_content_records_requests() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());

        let mut mock = MockLanguageModel::new();
        mock.expect_generate().returning(|_, _| {
            Ok("ПЕРЕВОД: Привет\nВАРИАНТЫ_ОТВЕТОВ:\n1. Hi.\n2. Hello.\n3. Greetings.".to_string())
        });

        let help = HelpSystem::new(Arc::new(mock), store.clone());
        let content = help
            .help_content(&dialog(), "Restaurant", Difficulty::Easy, "d-1")
            .await
            .unwrap();

        assert_eq!(content.translation, "Привет");
        assert_eq!(content.answer_options.len(), 3);

        let requests = store.load_help_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].kind, "translation");
        assert_eq!(requests[1].kind, "answer_options");
    }

    #[tokio::test]
    async fn test_cultural_context_failure_is_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());

        let mut mock = MockLanguageModel::new();
        mock.expect_generate()
            .returning(|_, _| Err(anyhow::anyhow!("timeout")));

        let help = HelpSystem::new(Arc::new(mock), store.clone());
        let result = help
            .cultural_context(&dialog(), "Restaurant", Difficulty::Easy, "d-1")
            .await;

        assert!(result.is_err());
        let errors = store.load_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, "cultural_context_generation_error");
    }

    #[tokio::test]
    async fn test_grammar_analysis_without_ai_message() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());
        let help = HelpSystem::new(Arc::new(MockLanguageModel::new()), store);

        let only_user = vec![Message::new(Role::User, "Hello")];
        let answer = help
            .grammar_analysis(&only_user, "Restaurant", Difficulty::Easy, "d-1")
            .await
            .unwrap();
        assert!(answer.contains("Нет сообщения"));
    }
}
