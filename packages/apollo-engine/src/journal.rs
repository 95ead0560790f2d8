use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JournalEventType {
    SessionStarted,
    RefreshDegraded,
    ProjectSelected,
    StepChanged,
    StepRejected,
    StepPersistFailed,
    AnalysisStarted,
    AnalysisCompleted,
    AnalysisFailed,
    FilesUploaded,
    FileRemoved,
    ProjectSaved,
    ProjectDeleted,
    SaveFailed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// One line of `activity.jsonl`. `details` carries the ids and counts behind `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    pub at: DateTime<Utc>,
    pub event_type: JournalEventType,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

/// Append-only record of wizard activity at `<data_dir>/logs/activity.jsonl`.
pub struct ActivityJournal {
    path: PathBuf,
}

impl ActivityJournal {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let logs_dir = data_dir.join("logs");
        tokio::fs::create_dir_all(&logs_dir)
            .await
            .context("Failed to create logs directory")?;

        Ok(Self {
            path: logs_dir.join("activity.jsonl"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens, appends and flushes per event; a crash loses at most the line being written.
    async fn append(
        &self,
        event_type: JournalEventType,
        severity: Severity,
        message: String,
        details: Value,
    ) -> Result<()> {
        let event = JournalEvent {
            at: Utc::now(),
            event_type,
            severity,
            message,
            details,
        };
        let mut line = serde_json::to_string(&event).context("Failed to serialize journal event")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn log_session_started(&self, api_base_url: &str, offline_demo: bool) -> Result<()> {
        let mode = if offline_demo { "offline demo" } else { api_base_url };
        self.append(
            JournalEventType::SessionStarted,
            Severity::Info,
            format!("CLI started against {}", mode),
            json!({ "api_base_url": api_base_url, "offline_demo": offline_demo }),
        )
        .await
    }

    pub async fn log_project_selected(&self, project: &str, step: usize) -> Result<()> {
        self.append(
            JournalEventType::ProjectSelected,
            Severity::Info,
            format!("Selected project {} at step {}", project, step),
            json!({ "project": project, "step": step }),
        )
        .await
    }

    pub async fn log_step_changed(&self, project: &str, from: usize, to: usize) -> Result<()> {
        self.append(
            JournalEventType::StepChanged,
            Severity::Info,
            format!("Step {} -> {}", from, to),
            json!({ "project": project, "from": from, "to": to }),
        )
        .await
    }

    pub async fn log_step_rejected(&self, target: usize, reason: &str) -> Result<()> {
        self.append(
            JournalEventType::StepRejected,
            Severity::Warn,
            format!("Step change to {} rejected: {}", target, reason),
            json!({ "target": target, "reason": reason }),
        )
        .await
    }

    pub async fn log_step_persist_failed(&self, project: &str, step: usize, error: &str) -> Result<()> {
        self.append(
            JournalEventType::StepPersistFailed,
            Severity::Warn,
            format!("Could not save step {} for project {}", step, project),
            json!({ "project": project, "step": step, "error": error }),
        )
        .await
    }

    pub async fn log_analysis_started(&self, project: &str, files: usize) -> Result<()> {
        self.append(
            JournalEventType::AnalysisStarted,
            Severity::Info,
            format!("AI analysis started for {} ({} files)", project, files),
            json!({ "project": project, "files": files }),
        )
        .await
    }

    pub async fn log_analysis_finished(
        &self,
        project: &str,
        outcome: std::result::Result<usize, &str>,
    ) -> Result<()> {
        match outcome {
            Ok(questions) => {
                self.append(
                    JournalEventType::AnalysisCompleted,
                    Severity::Info,
                    format!("AI analysis completed for {}", project),
                    json!({ "project": project, "questions": questions }),
                )
                .await
            }
            Err(error) => {
                self.append(
                    JournalEventType::AnalysisFailed,
                    Severity::Warn,
                    format!("AI analysis failed for {}", project),
                    json!({ "project": project, "error": error }),
                )
                .await
            }
        }
    }

    pub async fn log_files_uploaded(&self, project: &str, names: &[String]) -> Result<()> {
        self.append(
            JournalEventType::FilesUploaded,
            Severity::Info,
            format!("{} file(s) uploaded to {}", names.len(), project),
            json!({ "project": project, "files": names }),
        )
        .await
    }

    pub async fn log_file_removed(&self, project: &str, file: &str) -> Result<()> {
        self.append(
            JournalEventType::FileRemoved,
            Severity::Info,
            format!("Removed {} from {}", file, project),
            json!({ "project": project, "file": file }),
        )
        .await
    }

    pub async fn log_project_saved(&self, project: &str, created: bool) -> Result<()> {
        let verb = if created { "Created" } else { "Updated" };
        self.append(
            JournalEventType::ProjectSaved,
            Severity::Info,
            format!("{} project {}", verb, project),
            json!({ "project": project, "created": created }),
        )
        .await
    }

    pub async fn log_project_deleted(&self, project: &str) -> Result<()> {
        self.append(
            JournalEventType::ProjectDeleted,
            Severity::Info,
            format!("Deleted project {}", project),
            json!({ "project": project }),
        )
        .await
    }

    pub async fn log_refresh_degraded(&self, error: &str) -> Result<()> {
        self.append(
            JournalEventType::RefreshDegraded,
            Severity::Warn,
            "Project list unavailable, showing an empty list".to_string(),
            json!({ "error": error }),
        )
        .await
    }

    /// A project write that did not reach the backend; the local copy is kept.
    pub async fn log_save_failed(&self, project: &str, what: &str, error: &str) -> Result<()> {
        self.append(
            JournalEventType::SaveFailed,
            Severity::Error,
            what.to_string(),
            json!({ "project": project, "error": error }),
        )
        .await
    }

    /// The last `limit` events, oldest first. Unparseable lines are skipped.
    pub async fn recent(&self, limit: usize) -> Result<Vec<JournalEvent>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read journal file"),
        };
        let events: Vec<JournalEvent> = content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let skip = events.len().saturating_sub(limit);
        Ok(events.into_iter().skip(skip).collect())
    }
}
