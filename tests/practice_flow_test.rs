//! End-to-end practice flow: detections fold into the profile, sessions
//! generate exercises, grading moves counters and pays coins

use std::sync::Arc;

use lingua_coach::config::PracticeConfig;
use lingua_coach::practice::{
    check_answer, select_for_practice, DetectedError, ErrorProfileTracker, PracticeService,
    INITIAL_REPETITIONS,
};
use lingua_coach::store::LogStore;

fn detection(phrase: &str, error_type: &str, correction: &str) -> DetectedError {
    DetectedError {
        original_phrase: phrase.to_string(),
        error_type: error_type.to_string(),
        explanation: "объяснение".to_string(),
        correction: correction.to_string(),
    }
}

#[test]
fn answer_checking_is_normalized_containment() {
    assert!(check_answer("I have a book", "Well, I have a book now"));
    assert!(!check_answer("I have a book", "I has a book"));
}

#[test]
fn repeated_detection_updates_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());
    let tracker = ErrorProfileTracker::new(store.clone());

    tracker
        .upsert(&[detection("I has a book", "verb_agreement", "I have a book")], "d-1")
        .unwrap();
    tracker
        .upsert(&[detection("I HAS a book", "verb_agreement", "I have a book")], "d-2")
        .unwrap();

    let profile = store.load_profile();
    assert_eq!(profile.len(), 1);
    let entry = profile.values().next().unwrap();
    assert_eq!(entry.count, 2);
    assert_eq!(entry.exercise_repetition_count, INITIAL_REPETITIONS);
}

#[test]
fn selection_prefers_high_repetition_then_frequency() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());
    let tracker = ErrorProfileTracker::new(store.clone());

    tracker
        .upsert(
            &[
                detection("almost done", "a", "fixed a"),
                detection("fresh mistake", "b", "fixed b"),
                detection("already resolved", "c", "fixed c"),
            ],
            "d-1",
        )
        .unwrap();

    let mut profile = store.load_profile();
    profile.get_mut("a_almost done").unwrap().exercise_repetition_count = 2;
    profile.get_mut("a_almost done").unwrap().count = 5;
    profile.get_mut("b_fresh mistake").unwrap().exercise_repetition_count = 6;
    profile.get_mut("b_fresh mistake").unwrap().count = 1;
    profile.get_mut("c_already resolved").unwrap().exercise_repetition_count = 0;
    profile.get_mut("c_already resolved").unwrap().count = 9;
    store.save_profile(&profile).unwrap();

    let selected = select_for_practice(&store.load_profile(), 5);
    let keys: Vec<&str> = selected.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["b_fresh mistake", "a_almost done"]);
}

#[tokio::test]
async fn full_session_pays_rewards_and_wipes_itself() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());
    let service = PracticeService::offline(store.clone(), &PracticeConfig::default());

    service
        .tracker()
        .upsert(&[detection("I has a book", "verb_agreement", "I have a book")], "d-1")
        .unwrap();

    // Five correct answers leave one repetition before resolution
    for _ in 0..(INITIAL_REPETITIONS - 1) {
        service
            .tracker()
            .record_outcome("verb_agreement_i has a book", true)
            .unwrap();
    }

    let mut session = service.start_session().await.unwrap().unwrap();
    assert_eq!(session.exercises.len(), 3);
    assert_eq!(store.list_sessions().len(), 1);

    let ids: Vec<String> = session.exercises.iter().map(|e| e.exercise_id.clone()).collect();

    // First correct answer resolves the error: 1 coin + 5 bonus
    let first = service
        .grade(&mut session, &ids[0], "Now I have a book, thanks")
        .unwrap();
    assert!(first.correct);
    assert!(first.resolved);
    assert_eq!(first.coins_awarded, 6);

    // A wrong answer pays nothing and reopens the countdown
    let wrong = service.grade(&mut session, &ids[1], "I has a book").unwrap();
    assert!(!wrong.correct);
    assert_eq!(wrong.coins_awarded, 0);

    // Finish the session
    service.grade(&mut session, &ids[1], "I have a book").unwrap();
    service.grade(&mut session, &ids[2], "I have a book").unwrap();

    assert!(session.is_complete());
    assert!(store.list_sessions().is_empty(), "completed session is wiped");

    let ledger = store.load_coins();
    // 3 correct exercises + resolution bonus
    assert_eq!(ledger.coins, 3 + 5);
    assert_eq!(ledger.total_earned, ledger.coins);
}

#[tokio::test]
async fn empty_profile_produces_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());
    let service = PracticeService::offline(store, &PracticeConfig::default());
    assert!(service.start_session().await.unwrap().is_none());
}

#[tokio::test]
async fn resolved_errors_are_excluded_from_new_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LogStore::with_dir(dir.path().to_path_buf()).unwrap());
    let service = PracticeService::offline(store.clone(), &PracticeConfig::default());

    service
        .tracker()
        .upsert(&[detection("a mistake", "t", "the fix")], "d-1")
        .unwrap();
    for _ in 0..INITIAL_REPETITIONS {
        service.tracker().record_outcome("t_a mistake", true).unwrap();
    }

    assert!(store.load_profile()["t_a mistake"].completed);
    assert!(service.start_session().await.unwrap().is_none());
}
