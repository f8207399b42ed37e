//! Mistake-driven practice: profile tracking, exercise generation,
//! session lifecycle and coin rewards

pub mod exercises;
pub mod profile;

pub use exercises::{check_answer, Exercise, ExerciseGenerator, ExerciseKind};
pub use profile::{
    select_for_practice, DetectedError, ErrorProfileTracker, PracticeOutcome,
    INITIAL_REPETITIONS, REPETITION_CAP,
};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::PracticeConfig;
use crate::llm::LanguageModel;
use crate::store::{ErrorProfile, LogStore};

/// Coins for one correctly answered exercise
pub const CORRECT_EXERCISE_REWARD: u64 = 1;
/// Bonus for bringing an error's repetition countdown to zero
pub const ERROR_RESOLVED_BONUS: u64 = 5;

/// A generated batch of exercises, persisted until completed or discarded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSession {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub exercises: Vec<Exercise>,
    pub error_profile_snapshot: ErrorProfile,
}

impl PracticeSession {
    pub fn is_complete(&self) -> bool {
        !self.exercises.is_empty() && self.exercises.iter().all(|e| e.completed)
    }
}

/// Result of grading one answer
#[derive(Debug, Clone)]
pub struct GradeResult {
    pub correct: bool,
    pub coins_awarded: u64,
    /// True when this answer fully resolved the underlying error
    pub resolved: bool,
    pub correct_form: String,
    /// Feedback line for the user
    pub feedback: String,
}

/// Drives practice sessions end to end
pub struct PracticeService {
    store: Arc<LogStore>,
    tracker: ErrorProfileTracker,
    generator: ExerciseGenerator,
    max_entries: usize,
}

impl PracticeService {
    /// Service backed by the language model for exercise text
    pub fn new(store: Arc<LogStore>, llm: Arc<dyn LanguageModel>, config: &PracticeConfig) -> Self {
        Self {
            store: store.clone(),
            tracker: ErrorProfileTracker::new(store),
            generator: ExerciseGenerator::new(llm, config.exercises_per_entry),
            max_entries: config.max_entries,
        }
    }

    /// Template-only service, no external calls
    pub fn offline(store: Arc<LogStore>, config: &PracticeConfig) -> Self {
        Self {
            store: store.clone(),
            tracker: ErrorProfileTracker::new(store),
            generator: ExerciseGenerator::offline(config.exercises_per_entry),
            max_entries: config.max_entries,
        }
    }

    pub fn tracker(&self) -> &ErrorProfileTracker {
        &self.tracker
    }

    /// Build and persist a session from the current profile.
    /// Returns `None` when nothing qualifies for practice.
    pub async fn start_session(&self) -> Result<Option<PracticeSession>> {
        let snapshot = self.store.load_profile();
        let selected = select_for_practice(&snapshot, self.max_entries);
        if selected.is_empty() {
            return Ok(None);
        }

        let mut all_exercises = Vec::new();
        for (key, entry) in &selected {
            let mut exercises = self.generator.build_for_entry(key, entry).await;
            all_exercises.append(&mut exercises);
        }

        let session = PracticeSession {
            session_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            exercises: all_exercises,
            error_profile_snapshot: snapshot,
        };

        self.store.save_session(&session)?;
        info!(
            "Practice session {} started with {} exercises",
            session.session_id,
            session.exercises.len()
        );
        Ok(Some(session))
    }

    /// Grade one answer: update the exercise, the profile countdown and the
    /// coin ledger, persist the session, and wipe the session directory once
    /// everything is completed.
    pub fn grade(
        &self,
        session: &mut PracticeSession,
        exercise_id: &str,
        user_answer: &str,
    ) -> Result<GradeResult> {
        let Some(exercise) = session
            .exercises
            .iter_mut()
            .find(|e| e.exercise_id == exercise_id)
        else {
            bail!("unknown exercise id: {}", exercise_id);
        };

        exercise.attempts += 1;
        let correct = check_answer(&exercise.correct_form, user_answer);
        exercise.is_correct = Some(correct);

        let mut coins_awarded = 0;
        let mut resolved = false;

        if correct {
            exercise.completed = true;
            self.store
                .credit_coins(CORRECT_EXERCISE_REWARD, "correct exercise")?;
            coins_awarded += CORRECT_EXERCISE_REWARD;

            if let Some(outcome) = self
                .tracker
                .record_outcome(&exercise.profile_key, true)?
            {
                if outcome.resolved {
                    self.store
                        .credit_coins(ERROR_RESOLVED_BONUS, "error resolved")?;
                    coins_awarded += ERROR_RESOLVED_BONUS;
                    resolved = true;
                }
            }
        } else {
            self.tracker.record_outcome(&exercise.profile_key, false)?;
        }

        let correct_form = exercise.correct_form.clone();
        let feedback = if resolved {
            "Отлично, это правильный ответ! Ошибка полностью отработана.".to_string()
        } else if correct {
            "Отлично, это правильный ответ!".to_string()
        } else {
            format!("Не совсем. Правильный вариант: \"{}\".", correct_form)
        };

        self.store.save_session(session)?;
        if session.is_complete() {
            self.store.wipe_sessions();
        }

        Ok(GradeResult {
            correct,
            coins_awarded,
            resolved,
            correct_form,
            feedback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (tempfile::TempDir, PracticeService, Arc<LogStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());
        let service = PracticeService::offline(store.clone(), &PracticeConfig::default());
        (dir, service, store)
    }

    fn seed_profile(service: &PracticeService, phrases: &[&str]) {
        let detections: Vec<DetectedError> = phrases
            .iter()
            .map(|p| DetectedError {
                original_phrase: p.to_string(),
                error_type: "grammar".to_string(),
                explanation: "explanation".to_string(),
                correction: format!("corrected {}", p),
            })
            .collect();
        service.tracker().upsert(&detections, "d-1").unwrap();
    }

    #[tokio::test]
    async fn test_empty_profile_yields_no_session() {
        let (_dir, service, _store) = service();
        assert!(service.start_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_has_three_exercises_per_entry() {
        let (_dir, service, store) = service();
        seed_profile(&service, &["one mistake", "another mistake"]);

        let session = service.start_session().await.unwrap().unwrap();
        assert_eq!(session.exercises.len(), 6);
        assert_eq!(session.error_profile_snapshot.len(), 2);
        assert_eq!(store.list_sessions(), vec![session.session_id.clone()]);
    }

    #[tokio::test]
    async fn test_grade_correct_awards_coin_and_decrements() {
        let (_dir, service, store) = service();
        seed_profile(&service, &["a mistake"]);

        let mut session = service.start_session().await.unwrap().unwrap();
        let exercise_id = session.exercises[0].exercise_id.clone();
        let correct_form = session.exercises[0].correct_form.clone();

        let result = service
            .grade(&mut session, &exercise_id, &format!("Well, {} indeed", correct_form))
            .unwrap();

        assert!(result.correct);
        assert_eq!(result.coins_awarded, CORRECT_EXERCISE_REWARD);
        assert!(!result.resolved);
        assert_eq!(store.load_coins().coins, 1);

        let profile = store.load_profile();
        let entry = profile.values().next().unwrap();
        assert_eq!(entry.exercise_repetition_count, INITIAL_REPETITIONS - 1);
    }

    #[tokio::test]
    async fn test_grade_incorrect_increments_countdown() {
        let (_dir, service, store) = service();
        seed_profile(&service, &["a mistake"]);

        let mut session = service.start_session().await.unwrap().unwrap();
        let exercise_id = session.exercises[0].exercise_id.clone();

        let result = service.grade(&mut session, &exercise_id, "wrong answer").unwrap();
        assert!(!result.correct);
        assert_eq!(result.coins_awarded, 0);
        assert_eq!(store.load_coins().coins, 0);

        let profile = store.load_profile();
        let entry = profile.values().next().unwrap();
        assert_eq!(entry.exercise_repetition_count, INITIAL_REPETITIONS + 1);

        // The exercise stays open for another attempt
        assert!(!session.exercises[0].completed);
        assert_eq!(session.exercises[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_resolution_bonus_and_session_wipe() {
        let (_dir, service, store) = service();
        seed_profile(&service, &["a mistake"]);

        // Bring the countdown to 1 so one correct answer resolves it
        for _ in 0..(INITIAL_REPETITIONS - 1) {
            service
                .tracker()
                .record_outcome("grammar_a mistake", true)
                .unwrap();
        }

        let mut session = service.start_session().await.unwrap().unwrap();
        let exercise_ids: Vec<String> = session
            .exercises
            .iter()
            .map(|e| e.exercise_id.clone())
            .collect();
        let correct_form = session.exercises[0].correct_form.clone();

        let first = service
            .grade(&mut session, &exercise_ids[0], &correct_form)
            .unwrap();
        assert!(first.resolved);
        assert_eq!(first.coins_awarded, CORRECT_EXERCISE_REWARD + ERROR_RESOLVED_BONUS);

        for id in &exercise_ids[1..] {
            service.grade(&mut session, id, &correct_form).unwrap();
        }

        assert!(session.is_complete());
        assert!(store.list_sessions().is_empty());
        // 3 correct answers + one resolution bonus
        assert_eq!(store.load_coins().coins, 3 + ERROR_RESOLVED_BONUS);
    }

    #[tokio::test]
    async fn test_unknown_exercise_id_errors() {
        let (_dir, service, _store) = service();
        seed_profile(&service, &["a mistake"]);
        let mut session = service.start_session().await.unwrap().unwrap();
        assert!(service.grade(&mut session, "nope", "answer").is_err());
    }
}
