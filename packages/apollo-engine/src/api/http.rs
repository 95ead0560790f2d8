use super::{
    AnalysisBackend, AnalysisEnvelope, ApiResult, AuthBackend, AuthEnvelope, FileEnvelope,
    HealthProbe, HealthReport, MessageEnvelope, ProjectBackend, ProjectEnvelope,
    ProjectsEnvelope, UserEnvelope, error_from_response,
};
use crate::domain::types::{
    AnalysisResult, Credentials, FileUpload, Project, ProjectDraft, ProjectId, ProjectMeta,
    Registration, Session, UploadedFile, User,
};
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, multipart};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// reqwest-backed implementation of every backend trait.
#[derive(Clone)]
pub struct HttpApiClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl HttpApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> ApiResult<RequestBuilder> {
        match &self.token {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(ApiError::Unauthorized(
                "no session token, log in first".to_string(),
            )),
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, fallback: &str) -> ApiResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "backend response");

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &body, fallback));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::Network(format!("unexpected response payload: {}", e)))
    }
}

#[async_trait]
impl ProjectBackend for HttpApiClient {
    async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        let request = self.authorized(self.client.get(self.url("projects")))?;
        let envelope: ProjectsEnvelope = self.send(request, "Failed to load projects").await?;
        Ok(envelope.projects)
    }

    async fn create_project(&self, draft: &ProjectDraft) -> ApiResult<Project> {
        let request = self.authorized(self.client.post(self.url("projects")).json(draft))?;
        let envelope: ProjectEnvelope = self.send(request, "Failed to create project").await?;
        Ok(envelope.project)
    }

    async fn update_project(&self, project: &Project) -> ApiResult<Project> {
        let path = format!("projects/{}", project.id);
        let request = self.authorized(self.client.put(self.url(&path)).json(project))?;
        let envelope: ProjectEnvelope = self.send(request, "Failed to update project").await?;
        Ok(envelope.project)
    }

    async fn delete_project(&self, id: &ProjectId) -> ApiResult<()> {
        let path = format!("projects/{}", id);
        let request = self.authorized(self.client.delete(self.url(&path)))?;
        let _: MessageEnvelope = self.send(request, "Failed to delete project").await?;
        Ok(())
    }

    async fn upload_file(&self, project: &ProjectId, file: &FileUpload) -> ApiResult<UploadedFile> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| ApiError::LocalFile(format!("{}: {}", file.path.display(), e)))?;
        let part = multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        let form = multipart::Form::new().part("file", part);

        let path = format!("projects/{}/files", project);
        let request = self.authorized(self.client.post(self.url(&path)).multipart(form))?;
        let envelope: FileEnvelope = self.send(request, "Failed to upload file").await?;

        let mut uploaded = envelope.file;
        uploaded.local_path = Some(file.path.clone());
        Ok(uploaded)
    }

    async fn delete_file(&self, project: &ProjectId, file_id: &str) -> ApiResult<()> {
        let path = format!("projects/{}/files/{}", project, file_id);
        let request = self.authorized(self.client.delete(self.url(&path)))?;
        let _: MessageEnvelope = self.send(request, "Failed to remove file").await?;
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for HttpApiClient {
    async fn login(&self, credentials: &Credentials) -> ApiResult<Session> {
        let request = self.client.post(self.url("auth/login")).json(credentials);
        let envelope: AuthEnvelope = self.send(request, "Login failed").await?;
        Ok(Session {
            user: envelope.user,
            token: envelope.token,
        })
    }

    async fn register(&self, registration: &Registration) -> ApiResult<Option<String>> {
        let request = self.client.post(self.url("auth/register")).json(registration);
        let envelope: MessageEnvelope = self.send(request, "Registration failed").await?;
        Ok(envelope.message)
    }

    async fn verify(&self, token: &str) -> ApiResult<User> {
        let request = self.client.post(self.url("auth/verify")).bearer_auth(token);
        let envelope: UserEnvelope = self.send(request, "Invalid token").await?;
        Ok(envelope.user)
    }
}

#[async_trait]
impl HealthProbe for HttpApiClient {
    async fn health(&self) -> ApiResult<HealthReport> {
        let request = self.client.get(self.url("health"));
        self.send(request, "Health check failed").await
    }
}

#[async_trait]
impl AnalysisBackend for HttpApiClient {
    async fn analyze_documents(
        &self,
        meta: &ProjectMeta,
        files: &[UploadedFile],
    ) -> ApiResult<AnalysisResult> {
        let files_content: Vec<_> = files
            .iter()
            .map(|f| json!({ "name": f.name, "type": f.mime_type, "size": f.size }))
            .collect();
        let body = json!({
            "project_name": meta.name,
            "project_objective": meta.objective,
            "project_description": meta.description,
            "files_content": files_content,
        });

        let request = self.authorized(self.client.post(self.url("ai/analyze")).json(&body))?;
        let envelope: AnalysisEnvelope = self.send(request, "AI analysis failed").await?;
        Ok(envelope.into_result())
    }
}
