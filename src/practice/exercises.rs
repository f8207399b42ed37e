//! Exercise generation and answer checking
//!
//! Every selected profile entry yields exactly three exercises. Entries far
//! from resolution get production-style tasks; entries close to resolution
//! get quicker drills. Text comes from the language model when available,
//! otherwise from fixed templates with no external call.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::llm::LanguageModel;
use crate::store::ErrorProfileEntry;

/// The fixed set of exercise templates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    WordReplacement,
    TranslateEnToRu,
    TranslateRuToEn,
    SentenceComposition,
    TextComposition,
}

impl ExerciseKind {
    pub fn label(&self) -> &'static str {
        match self {
            ExerciseKind::WordReplacement => "word replacement",
            ExerciseKind::TranslateEnToRu => "translation EN→RU",
            ExerciseKind::TranslateRuToEn => "translation RU→EN",
            ExerciseKind::SentenceComposition => "sentence composition",
            ExerciseKind::TextComposition => "text composition",
        }
    }
}

impl std::fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Quick drills for entries close to resolution
const DRILL_KINDS: &[ExerciseKind] = &[
    ExerciseKind::WordReplacement,
    ExerciseKind::TranslateEnToRu,
    ExerciseKind::TranslateRuToEn,
];

/// Production tasks for entries that still need many repetitions
const PRODUCTION_KINDS: &[ExerciseKind] = &[
    ExerciseKind::SentenceComposition,
    ExerciseKind::TextComposition,
    ExerciseKind::TranslateRuToEn,
];

/// Template subset for an entry, by how close it is to resolution
pub fn kinds_for(repetitions_remaining: u32) -> &'static [ExerciseKind] {
    if repetitions_remaining <= 3 {
        DRILL_KINDS
    } else {
        PRODUCTION_KINDS
    }
}

/// One practice item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub exercise_id: String,
    pub exercise_type: ExerciseKind,
    /// Profile key this exercise practices
    pub profile_key: String,
    pub original_error: String,
    pub correct_form: String,
    /// What is shown to the user
    pub prompt_text: String,
    pub completed: bool,
    pub attempts: u32,
    pub is_correct: Option<bool>,
}

/// Lowercase and collapse whitespace so the containment check is not
/// thrown off by spacing or case
fn normalize_answer(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the stored correct form appears in the user's answer.
/// Containment, not semantic evaluation.
pub fn check_answer(correct_form: &str, user_answer: &str) -> bool {
    let correct = normalize_answer(correct_form);
    if correct.is_empty() {
        return false;
    }
    normalize_answer(user_answer).contains(&correct)
}

/// Offline fallback text for an exercise
pub fn template_text(kind: ExerciseKind, entry: &ErrorProfileEntry) -> String {
    match kind {
        ExerciseKind::WordReplacement => format!(
            "Вы написали: \"{}\". Исправьте ошибку и напишите правильный вариант.",
            entry.original_phrase,
        ),
        ExerciseKind::TranslateEnToRu => format!(
            "Переведите на русский язык: \"{}\".",
            entry.correction,
        ),
        ExerciseKind::TranslateRuToEn => format!(
            "Как правильно сказать по-английски то, что вы пытались сказать фразой \"{}\"?",
            entry.original_phrase,
        ),
        ExerciseKind::SentenceComposition => format!(
            "Составьте своё предложение, используя конструкцию \"{}\".",
            entry.correction,
        ),
        ExerciseKind::TextComposition => format!(
            "Напишите 2-3 предложения на английском языке, используя \"{}\".",
            entry.correction,
        ),
    }
}

/// Prompt for model-generated exercise text
fn generation_prompt(kind: ExerciseKind, entry: &ErrorProfileEntry) -> String {
    format!(
        "Составь одно упражнение типа \"{kind}\" для изучающего английский язык.\n\
         Ученик ранее допустил ошибку: \"{original}\" (правильно: \"{correction}\").\n\
         Объяснение ошибки: {explanation}\n\n\
         Сформулируй задание на русском языке так, чтобы правильный ответ содержал \
         фразу \"{correction}\". Ответь только текстом задания.",
        kind = kind.label(),
        original = entry.original_phrase,
        correction = entry.correction,
        explanation = entry.explanation,
    )
}

/// Builds practice items for profile entries
pub struct ExerciseGenerator {
    llm: Option<Arc<dyn LanguageModel>>,
    per_entry: usize,
}

impl ExerciseGenerator {
    /// Generator that asks the model for exercise text, falling back to
    /// templates when a call fails
    pub fn new(llm: Arc<dyn LanguageModel>, per_entry: usize) -> Self {
        Self {
            llm: Some(llm),
            per_entry,
        }
    }

    /// Template-only generator, no external calls
    pub fn offline(per_entry: usize) -> Self {
        Self {
            llm: None,
            per_entry,
        }
    }

    /// Produce the fixed number of exercises for one profile entry
    pub async fn build_for_entry(&self, key: &str, entry: &ErrorProfileEntry) -> Vec<Exercise> {
        let kinds = kinds_for(entry.exercise_repetition_count);
        let mut exercises = Vec::with_capacity(self.per_entry);

        for i in 0..self.per_entry {
            let kind = kinds[i % kinds.len()];
            let prompt_text = match &self.llm {
                Some(llm) => match llm.generate(&generation_prompt(kind, entry), 0.7).await {
                    Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                    Ok(_) => template_text(kind, entry),
                    Err(e) => {
                        debug!("Exercise generation fell back to template: {}", e);
                        template_text(kind, entry)
                    }
                },
                None => template_text(kind, entry),
            };

            exercises.push(Exercise {
                exercise_id: Uuid::new_v4().to_string(),
                exercise_type: kind,
                profile_key: key.to_string(),
                original_error: entry.original_phrase.clone(),
                correct_form: entry.correction.clone(),
                prompt_text,
                completed: false,
                attempts: 0,
                is_correct: None,
            });
        }

        exercises
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLanguageModel;
    use chrono::Utc;

    fn entry(repetitions: u32) -> ErrorProfileEntry {
        let now = Utc::now();
        ErrorProfileEntry {
            original_phrase: "I has a book".to_string(),
            error_type: "verb_agreement".to_string(),
            explanation: "Use 'have' with I.".to_string(),
            correction: "I have a book".to_string(),
            count: 1,
            exercise_repetition_count: repetitions,
            completed: false,
            first_seen: now,
            last_seen: now,
            first_seen_dialog_id: "d-1".to_string(),
            last_seen_dialog_id: "d-1".to_string(),
            history: vec![],
        }
    }

    #[test]
    fn test_check_answer_containment() {
        assert!(check_answer("I have a book", "Well, I have a book now"));
        assert!(check_answer("I have a book", "i  HAVE a book"));
        assert!(!check_answer("I have a book", "I has a book"));
        assert!(!check_answer("", "anything"));
    }

    #[test]
    fn test_kind_subsets_switch_at_three() {
        assert_eq!(kinds_for(1), DRILL_KINDS);
        assert_eq!(kinds_for(3), DRILL_KINDS);
        assert_eq!(kinds_for(4), PRODUCTION_KINDS);
        assert_eq!(kinds_for(6), PRODUCTION_KINDS);
    }

    #[tokio::test]
    async fn test_offline_generator_uses_templates() {
        let generator = ExerciseGenerator::offline(3);
        let exercises = generator.build_for_entry("k", &entry(6)).await;

        assert_eq!(exercises.len(), 3);
        for exercise in &exercises {
            assert!(PRODUCTION_KINDS.contains(&exercise.exercise_type));
            assert_eq!(exercise.correct_form, "I have a book");
            assert_eq!(exercise.attempts, 0);
            assert!(!exercise.completed);
        }
        // Rotation covers distinct kinds
        assert_ne!(exercises[0].exercise_type, exercises[1].exercise_type);
    }

    #[tokio::test]
    async fn test_generator_falls_back_on_model_error() {
        let mut mock = MockLanguageModel::new();
        mock.expect_generate()
            .returning(|_, _| Err(anyhow::anyhow!("service unavailable")));
        let generator = ExerciseGenerator::new(Arc::new(mock), 3);

        let exercises = generator.build_for_entry("k", &entry(2)).await;
        assert_eq!(exercises.len(), 3);
        for exercise in &exercises {
            assert!(DRILL_KINDS.contains(&exercise.exercise_type));
            assert!(!exercise.prompt_text.is_empty());
        }
    }

    #[tokio::test]
    async fn test_generator_uses_model_text() {
        let mut mock = MockLanguageModel::new();
        mock.expect_generate()
            .returning(|_, _| Ok("Задание от модели".to_string()));
        let generator = ExerciseGenerator::new(Arc::new(mock), 3);

        let exercises = generator.build_for_entry("k", &entry(6)).await;
        assert!(exercises.iter().all(|e| e.prompt_text == "Задание от модели"));
    }
}
