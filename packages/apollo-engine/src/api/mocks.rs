// Exposed for testing and for the CLI's `--offline-demo` mode.
use super::{
    AnalysisBackend, ApiResult, AuthBackend, HealthProbe, HealthReport, ProjectBackend,
};
use crate::domain::types::{
    AnalysisResult, Credentials, FileUpload, Project, ProjectDraft, ProjectId, ProjectMeta,
    ProjectStatus, Registration, Session, UploadedFile, User,
};
use crate::error::ApiError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCall {
    List,
    Create,
    Update,
    Delete,
    Upload,
    DeleteFile,
    Login,
    Register,
    Verify,
    Health,
    Analyze,
}

#[derive(Default)]
struct MockState {
    projects: Vec<Project>,
    next_id: u64,
    users: HashMap<String, (String, User)>,
    tokens: HashMap<String, String>,
    calls: HashMap<BackendCall, usize>,
    scripted_failures: HashMap<BackendCall, VecDeque<ApiError>>,
    delays: HashMap<BackendCall, Duration>,
    offline: bool,
}

/// A backend kept entirely in memory. Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<MockState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(projects: Vec<Project>) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state.lock().unwrap();
            state.next_id = projects.len() as u64;
            state.projects = projects;
        }
        backend
    }

    pub fn add_user(&self, user: User, password: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .users
            .insert(user.email.clone(), (password.to_string(), user));
    }

    /// Makes every call fail with a network error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Queues an error returned by the next `call` instead of its normal result.
    pub fn fail_next(&self, call: BackendCall, error: ApiError) {
        self.state
            .lock()
            .unwrap()
            .scripted_failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Adds latency to every future `call`.
    pub fn set_delay(&self, call: BackendCall, delay: Duration) {
        self.state.lock().unwrap().delays.insert(call, delay);
    }

    pub fn calls(&self, call: BackendCall) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&call)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    pub fn stored_project(&self, id: &ProjectId) -> Option<Project> {
        self.state
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| &p.id == id)
            .cloned()
    }

    /// Edits the stored copy directly, as another client would.
    pub fn edit_stored(&self, id: &ProjectId, edit: impl FnOnce(&mut Project)) {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.projects.iter_mut().find(|p| &p.id == id) {
            edit(p);
        }
    }

    async fn enter(&self, call: BackendCall) -> ApiResult<()> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            *state.calls.entry(call).or_default() += 1;
            state.delays.get(&call).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state
            .scripted_failures
            .get_mut(&call)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        if state.offline {
            return Err(ApiError::Network("backend unreachable".to_string()));
        }
        Ok(())
    }

    fn not_found(id: &ProjectId) -> ApiError {
        ApiError::Backend {
            status: 404,
            message: format!("Project {} not found", id),
        }
    }
}

/// Builds a project the way the backend would after a successful create.
pub fn sample_project(id: &str, name: &str, current_step: usize) -> Project {
    Project {
        id: ProjectId::from(id),
        name: name.to_string(),
        client: "ACME".to_string(),
        responsible: "Dana".to_string(),
        objective: format!("Deliver {} on schedule", name),
        description: None,
        priority: Default::default(),
        status: ProjectStatus::Active,
        start_date: None,
        deadline: None,
        current_step,
        uploaded_files: Vec::new(),
        ai_analysis: None,
    }
}

#[async_trait]
impl ProjectBackend for InMemoryBackend {
    async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        self.enter(BackendCall::List).await?;
        Ok(self.state.lock().unwrap().projects.clone())
    }

    async fn create_project(&self, draft: &ProjectDraft) -> ApiResult<Project> {
        self.enter(BackendCall::Create).await?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = ProjectId(state.next_id.to_string());
        let project = ProjectDraft {
            status: ProjectStatus::Active,
            ..draft.clone()
        }
        .apply_to(&sample_project(id.as_str(), &draft.name, 0));
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, project: &Project) -> ApiResult<Project> {
        self.enter(BackendCall::Update).await?;
        let mut state = self.state.lock().unwrap();
        let stored = state
            .projects
            .iter_mut()
            .find(|p| p.id == project.id)
            .ok_or_else(|| Self::not_found(&project.id))?;
        *stored = project.clone();
        Ok(stored.clone())
    }

    async fn delete_project(&self, id: &ProjectId) -> ApiResult<()> {
        self.enter(BackendCall::Delete).await?;
        let mut state = self.state.lock().unwrap();
        let before = state.projects.len();
        state.projects.retain(|p| &p.id != id);
        if state.projects.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    async fn upload_file(&self, project: &ProjectId, file: &FileUpload) -> ApiResult<UploadedFile> {
        self.enter(BackendCall::Upload).await?;
        let state = self.state.lock().unwrap();
        if !state.projects.iter().any(|p| &p.id == project) {
            return Err(Self::not_found(project));
        }
        Ok(UploadedFile {
            id: uuid::Uuid::new_v4().to_string(),
            name: file.name.clone(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            uploaded_at: chrono::Utc::now(),
            local_path: Some(file.path.clone()),
        })
    }

    async fn delete_file(&self, project: &ProjectId, _file_id: &str) -> ApiResult<()> {
        self.enter(BackendCall::DeleteFile).await?;
        let state = self.state.lock().unwrap();
        if !state.projects.iter().any(|p| &p.id == project) {
            return Err(Self::not_found(project));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for InMemoryBackend {
    async fn login(&self, credentials: &Credentials) -> ApiResult<Session> {
        self.enter(BackendCall::Login).await?;
        let mut state = self.state.lock().unwrap();
        let user = match state.users.get(&credentials.email) {
            Some((password, user)) if *password == credentials.password => user.clone(),
            _ => {
                return Err(ApiError::Unauthorized(
                    "Invalid email or password".to_string(),
                ));
            }
        };
        let token = uuid::Uuid::new_v4().to_string();
        state.tokens.insert(token.clone(), user.email.clone());
        Ok(Session { user, token })
    }

    async fn register(&self, registration: &Registration) -> ApiResult<Option<String>> {
        self.enter(BackendCall::Register).await?;
        let mut state = self.state.lock().unwrap();
        if state.users.contains_key(&registration.email) {
            return Err(ApiError::Backend {
                status: 409,
                message: "Email already registered".to_string(),
            });
        }
        let user = User {
            id: (state.users.len() + 1).to_string(),
            name: registration.name.clone(),
            email: registration.email.clone(),
            company: registration.company.clone(),
            role: None,
        };
        state.users.insert(
            registration.email.clone(),
            (registration.password.clone(), user),
        );
        Ok(Some("User registered successfully".to_string()))
    }

    async fn verify(&self, token: &str) -> ApiResult<User> {
        self.enter(BackendCall::Verify).await?;
        let state = self.state.lock().unwrap();
        state
            .tokens
            .get(token)
            .and_then(|email| state.users.get(email))
            .map(|(_, user)| user.clone())
            .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))
    }
}

#[async_trait]
impl HealthProbe for InMemoryBackend {
    async fn health(&self) -> ApiResult<HealthReport> {
        self.enter(BackendCall::Health).await?;
        Ok(HealthReport {
            status: "ok".to_string(),
            message: Some("in-memory backend".to_string()),
            version: None,
        })
    }
}

#[async_trait]
impl AnalysisBackend for InMemoryBackend {
    async fn analyze_documents(
        &self,
        meta: &ProjectMeta,
        files: &[UploadedFile],
    ) -> ApiResult<AnalysisResult> {
        self.enter(BackendCall::Analyze).await?;
        Ok(crate::analysis::canned_analysis(meta, files.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failure_is_consumed_once() {
        let backend = InMemoryBackend::with_projects(vec![sample_project("1", "Alpha", 0)]);
        backend.fail_next(BackendCall::List, ApiError::Network("down".to_string()));

        assert!(backend.list_projects().await.is_err());
        assert_eq!(backend.list_projects().await.unwrap().len(), 1);
        assert_eq!(backend.calls(BackendCall::List), 2);
    }

    #[tokio::test]
    async fn test_create_assigns_fresh_ids() {
        let backend = InMemoryBackend::with_projects(vec![sample_project("1", "Alpha", 4)]);
        let draft = ProjectDraft {
            name: "Beta".to_string(),
            client: "Initech".to_string(),
            responsible: "Sam".to_string(),
            objective: "Ship the beta release".to_string(),
            ..Default::default()
        };
        let created = backend.create_project(&draft).await.unwrap();
        assert_eq!(created.id, ProjectId::from("2"));
        assert_eq!(created.current_step, 0);
        assert_eq!(created.client, "Initech");
    }

    #[tokio::test]
    async fn test_login_round_trip() {
        let backend = InMemoryBackend::new();
        backend
            .register(&Registration {
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                password: "Str0ng!pass".to_string(),
                company: None,
            })
            .await
            .unwrap();

        let session = backend
            .login(&Credentials {
                email: "ana@example.com".to_string(),
                password: "Str0ng!pass".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(backend.verify(&session.token).await.unwrap().name, "Ana");
        assert!(backend.verify("forged").await.is_err());
    }
}
