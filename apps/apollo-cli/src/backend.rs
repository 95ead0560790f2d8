use apollo_engine::api::http::HttpApiClient;
use apollo_engine::api::mocks::{InMemoryBackend, sample_project};
use apollo_engine::api::{AnalysisBackend, AuthBackend, HealthProbe, ProjectBackend};
use apollo_engine::domain::types::{Priority, ProjectStatus, User};

pub const DEMO_EMAIL: &str = "demo@apollo.local";
pub const DEMO_PASSWORD: &str = "Apollo!2026";

/// Everything the CLI needs from a backend, plus a way to attach the session token.
pub trait Backend:
    ProjectBackend + AuthBackend + HealthProbe + AnalysisBackend + Clone + 'static
{
    fn authorized(&self, token: &str) -> Self;
}

impl Backend for HttpApiClient {
    fn authorized(&self, token: &str) -> Self {
        self.clone().with_token(token)
    }
}

impl Backend for InMemoryBackend {
    fn authorized(&self, _token: &str) -> Self {
        self.clone()
    }
}

/// An in-memory backend with a demo account and two projects.
pub fn demo_backend() -> InMemoryBackend {
    let mut portal = sample_project("1", "Customer Portal", 1);
    portal.client = "ACME Corp".to_string();
    portal.objective = "Replace the legacy customer portal with a self-service app".to_string();
    portal.priority = Priority::High;
    portal.deadline = chrono::Local::now()
        .date_naive()
        .checked_add_days(chrono::Days::new(45));

    let mut billing = sample_project("2", "Billing Migration", 4);
    billing.client = "Initech".to_string();
    billing.objective = "Move invoicing to the new payments provider".to_string();
    billing.status = ProjectStatus::OnHold;

    let backend = InMemoryBackend::with_projects(vec![portal, billing]);
    backend.add_user(
        User {
            id: "1".to_string(),
            name: "Demo User".to_string(),
            email: DEMO_EMAIL.to_string(),
            company: Some("Apollo".to_string()),
            role: Some("manager".to_string()),
        },
        DEMO_PASSWORD,
    );
    backend
}
