//! Background dialog analysis
//!
//! After a dialog ends, its user messages are analyzed off the interactive
//! path: a prose summary goes to the error journal and structured
//! detections are folded into the error profile. Jobs run on a single
//! worker task fed by a channel; `shutdown` drains the queue and joins the
//! worker. A failed analysis is logged and abandoned — there is no retry.

use anyhow::{anyhow, Result};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::llm::LanguageModel;
use crate::practice::{DetectedError, ErrorProfileTracker};
use crate::prompts;
use crate::store::{LogStore, DIALOG_SUMMARY_KIND};
use crate::types::Difficulty;

const QUEUE_DEPTH: usize = 16;

/// One dialog queued for analysis
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub dialog_id: String,
    pub scenario: String,
    pub difficulty: Difficulty,
    pub user_messages: Vec<String>,
}

/// Serializes dialog analyses on a single worker task
pub struct DialogAnalyzer {
    tx: mpsc::Sender<AnalysisJob>,
    handle: JoinHandle<()>,
}

impl DialogAnalyzer {
    /// Start the worker task
    pub fn spawn(store: Arc<LogStore>, llm: Arc<dyn LanguageModel>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AnalysisJob>(QUEUE_DEPTH);

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let dialog_id = job.dialog_id.clone();
                if let Err(e) = analyze_dialog(&store, llm.as_ref(), job).await {
                    warn!("Dialog analysis failed for {}: {:#}", dialog_id, e);
                }
            }
            debug!("Analysis worker stopped");
        });

        Self { tx, handle }
    }

    /// Queue a dialog for analysis
    pub async fn enqueue(&self, job: AnalysisJob) -> Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|_| anyhow!("analysis worker is no longer running"))
    }

    /// Drain queued jobs and join the worker
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            warn!("Analysis worker join failed: {}", e);
        }
    }
}

/// Analyze one finished dialog: journal the prose summary, then upsert
/// structured detections into the error profile
pub async fn analyze_dialog(
    store: &Arc<LogStore>,
    llm: &dyn LanguageModel,
    job: AnalysisJob,
) -> Result<()> {
    if job.user_messages.is_empty() {
        return Ok(());
    }

    let prompt = prompts::error_analysis_prompt(&job.scenario, job.difficulty, &job.user_messages);
    let summary = llm.generate(&prompt, 0.3).await?;

    if summary.to_uppercase().contains(prompts::NO_ERRORS_SENTINEL) {
        info!("No errors found in dialog {}", job.dialog_id);
        return Ok(());
    }

    store.save_error(
        DIALOG_SUMMARY_KIND,
        &summary,
        json!({
            "scenario": job.scenario,
            "difficulty": job.difficulty,
            "dialog_id": job.dialog_id,
            "total_user_messages": job.user_messages.len(),
            "all_user_messages": job.user_messages,
        }),
    )?;
    info!("Dialog error analysis saved for {}", job.dialog_id);

    // Second pass: structured detections for the error profile.
    // Malformed output here means no detections, not a failure.
    let classification_prompt = prompts::error_classification_prompt(&job.user_messages);
    let raw = match llm.generate(&classification_prompt, 0.2).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Error classification call failed: {}", e);
            return Ok(());
        }
    };

    let detections = parse_detections(&raw);
    if detections.is_empty() {
        debug!("No structured detections for dialog {}", job.dialog_id);
        return Ok(());
    }

    ErrorProfileTracker::new(store.clone()).upsert(&detections, &job.dialog_id)?;
    Ok(())
}

/// Extract a JSON array of detections from model output.
/// Tolerates code fences and surrounding prose; anything unparseable
/// yields an empty list.
fn parse_detections(raw: &str) -> Vec<DetectedError> {
    let start = raw.find('[');
    let end = raw.rfind(']');
    let candidate = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => return Vec::new(),
    };

    match serde_json::from_str::<Vec<DetectedError>>(candidate) {
        Ok(detections) => detections,
        Err(e) => {
            warn!("Unparseable error classification: {}", e);
            Vec::new()
        }
    }
}
