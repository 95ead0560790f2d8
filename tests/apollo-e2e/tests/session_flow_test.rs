use anyhow::Result;
use apollo_engine::api::mocks::{BackendCall, InMemoryBackend, sample_project};
use apollo_engine::analysis::MockAnalysisProvider;
use apollo_engine::config::{ensure_config, load_config};
use apollo_engine::domain::types::{Credentials, Registration};
use apollo_engine::error::{ApiError, AuthError};
use apollo_engine::health::{BackendStatus, HealthMonitor};
use apollo_engine::session::{FileKeyValueStore, SessionStore};
use apollo_engine::wizard::{ProjectWizard, RefreshOutcome};
use std::sync::Arc;
use std::time::Duration;

fn registration() -> Registration {
    Registration {
        name: "Bruno Díaz".to_string(),
        email: "bruno@example.com".to_string(),
        password: "Gotham#2026".to_string(),
        company: None,
    }
}

fn credentials(password: &str) -> Credentials {
    Credentials {
        email: "bruno@example.com".to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_register_login_restart_logout() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = InMemoryBackend::new();

    let sessions = SessionStore::new(backend.clone(), FileKeyValueStore::new(tmp.path()));
    sessions.register(&registration()).await?;
    assert!(!sessions.is_authenticated());

    match sessions.login(&credentials("wrong-password")).await {
        Err(AuthError::Api(ApiError::Unauthorized(_))) => {}
        other => panic!("expected unauthorized, got {:?}", other.map(|s| s.user)),
    }
    assert!(!sessions.is_authenticated());

    let session = sessions.login(&credentials("Gotham#2026")).await?;
    assert_eq!(session.user.name, "Bruno Díaz");

    // Second process start: the token on disk is verified, not trusted.
    let restarted = SessionStore::new(backend.clone(), FileKeyValueStore::new(tmp.path()));
    let user = restarted.restore().await?;
    assert_eq!(user.map(|u| u.email).as_deref(), Some("bruno@example.com"));
    assert_eq!(backend.calls(BackendCall::Verify), 1);

    restarted.logout().await?;
    let third = SessionStore::new(backend.clone(), FileKeyValueStore::new(tmp.path()));
    assert!(third.restore().await?.is_none());
    assert_eq!(backend.calls(BackendCall::Verify), 1);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_registration_is_reported() -> Result<()> {
    let backend = InMemoryBackend::new();
    let tmp = tempfile::tempdir()?;
    let sessions = SessionStore::new(backend, FileKeyValueStore::new(tmp.path()));

    sessions.register(&registration()).await?;
    match sessions.register(&registration()).await {
        Err(AuthError::Api(ApiError::Backend { status, .. })) => assert_eq!(status, 409),
        other => panic!("expected conflict, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_offline_backend_degrades_without_losing_selection() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    ensure_config(tmp.path()).await?;
    let config = load_config(tmp.path()).await?;

    let backend = InMemoryBackend::with_projects(vec![sample_project("1", "Alpha", 2)]);
    let wizard = ProjectWizard::new(backend.clone(), MockAnalysisProvider::new());
    assert!(matches!(wizard.refresh_projects().await, RefreshOutcome::Loaded(1)));

    backend.set_offline(true);
    let monitor = Arc::new(HealthMonitor::new(backend.clone(), config.health_poll_interval()));
    let mut status = monitor.subscribe();
    let poller = monitor.clone().spawn();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !matches!(*status.borrow_and_update(), BackendStatus::Offline { .. }) {
            if status.changed().await.is_err() {
                break;
            }
        }
    })
    .await?;
    poller.abort();

    // A failed read empties the list but leaves the open project alone.
    assert!(matches!(wizard.refresh_projects().await, RefreshOutcome::Degraded(_)));
    assert!(wizard.projects().is_empty());
    assert_eq!(wizard.selected_project().map(|p| p.name).as_deref(), Some("Alpha"));
    assert_eq!(wizard.current_step(), 2);
    Ok(())
}
