//! Client side of the REST backend contract.
//!
//! The wizard and session store only see the traits below; `http` provides the
//! reqwest implementation and `mocks` an in-memory one for tests and offline demos.

pub mod http;
pub mod mocks;

use crate::domain::types::{
    AnalysisResult, Credentials, FileUpload, Project, ProjectDraft, ProjectId, ProjectMeta,
    Registration, Session, UploadedFile, User,
};
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[async_trait]
pub trait ProjectBackend: Send + Sync {
    async fn list_projects(&self) -> ApiResult<Vec<Project>>;

    async fn create_project(&self, draft: &ProjectDraft) -> ApiResult<Project>;

    /// Replaces the stored project with `project` (PUT semantics).
    async fn update_project(&self, project: &Project) -> ApiResult<Project>;

    async fn delete_project(&self, id: &ProjectId) -> ApiResult<()>;

    /// Stores a document and returns its durable record.
    async fn upload_file(&self, project: &ProjectId, file: &FileUpload) -> ApiResult<UploadedFile>;

    async fn delete_file(&self, project: &ProjectId, file_id: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> ApiResult<Session>;

    /// Registers a user without logging them in. Returns the backend's message.
    async fn register(&self, registration: &Registration) -> ApiResult<Option<String>>;

    /// Resolves the user a token belongs to.
    async fn verify(&self, token: &str) -> ApiResult<User>;
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn health(&self) -> ApiResult<HealthReport>;
}

#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze_documents(
        &self,
        meta: &ProjectMeta,
        files: &[UploadedFile],
    ) -> ApiResult<AnalysisResult>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectsEnvelope {
    #[serde(default)]
    pub projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectEnvelope {
    pub project: Project,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileEnvelope {
    pub file: UploadedFile,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthEnvelope {
    pub user: User,
    #[serde(alias = "access_token")]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageEnvelope {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    /// Registration rejects with one entry per failed rule.
    #[serde(default)]
    errors: Option<Vec<String>>,
}

/// The analyze endpoint answers with the bare result; some deployments wrap it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AnalysisEnvelope {
    Wrapped { analysis: AnalysisResult },
    Bare(AnalysisResult),
}

impl AnalysisEnvelope {
    pub fn into_result(self) -> AnalysisResult {
        match self {
            AnalysisEnvelope::Wrapped { analysis } => analysis,
            AnalysisEnvelope::Bare(result) => result,
        }
    }
}

/// Builds the error for a non-success response, preferring the backend's own message.
pub(crate) fn error_from_response(status: u16, body: &str, fallback: &str) -> ApiError {
    let parsed: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error)
        .or(parsed.msg)
        .or_else(|| parsed.errors.map(|errors| errors.join("; ")))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());

    match status {
        401 | 422 => ApiError::Unauthorized(message),
        _ => ApiError::Backend { status, message },
    }
}
