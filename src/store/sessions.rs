//! Practice session persistence
//!
//! One JSON file per session under `practice_sessions/`. The directory is
//! wiped entirely when the active session completes or the app closes.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::practice::PracticeSession;

use super::LogStore;

const SESSIONS_DIR: &str = "practice_sessions";

impl LogStore {
    fn sessions_dir(&self) -> std::path::PathBuf {
        self.file_path(SESSIONS_DIR)
    }

    /// Persist one practice session
    pub fn save_session(&self, session: &PracticeSession) -> Result<()> {
        let dir = self.sessions_dir();
        std::fs::create_dir_all(&dir).context("Failed to create sessions directory")?;

        let path = dir.join(format!("{}.json", session.session_id));
        let _guard = self.guard();
        self.write_json_atomic(&path, session)
            .context("Failed to write practice session")
    }

    /// Load a session by id, if present and parseable
    pub fn load_session(&self, session_id: &str) -> Option<PracticeSession> {
        let path = self.sessions_dir().join(format!("{}.json", session_id));
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Failed to parse session {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read session {}: {}", path.display(), e);
                None
            }
        }
    }

    /// List stored session ids
    pub fn list_sessions(&self) -> Vec<String> {
        let dir = self.sessions_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut ids = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        ids
    }

    /// Remove every stored session, best-effort
    pub fn wipe_sessions(&self) {
        let dir = self.sessions_dir();
        if !dir.exists() {
            return;
        }
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!("Practice sessions wiped"),
            Err(e) => warn!("Failed to wipe practice sessions: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::PracticeSession;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample_session(id: &str) -> PracticeSession {
        PracticeSession {
            session_id: id.to_string(),
            timestamp: Utc::now(),
            exercises: vec![],
            error_profile_snapshot: BTreeMap::new(),
        }
    }

    #[test]
    fn test_session_round_trip_and_wipe() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::with_dir(dir.path().to_path_buf()).unwrap();

        store.save_session(&sample_session("s-1")).unwrap();
        store.save_session(&sample_session("s-2")).unwrap();

        assert_eq!(store.list_sessions(), vec!["s-1", "s-2"]);
        assert!(store.load_session("s-1").is_some());
        assert!(store.load_session("s-3").is_none());

        store.wipe_sessions();
        assert!(store.list_sessions().is_empty());
    }
}
