use anyhow::Result;
use apollo_engine::analysis::MockAnalysisProvider;
use apollo_engine::api::ProjectBackend;
use apollo_engine::api::mocks::{BackendCall, InMemoryBackend, sample_project};
use apollo_engine::domain::types::{FileUpload, ProjectDraft, ProjectId};
use apollo_engine::error::WizardError;
use apollo_engine::health::{BackendStatus, HealthMonitor};
use apollo_engine::interaction::UserInteraction;
use apollo_engine::journal::{ActivityJournal, JournalEventType};
use apollo_engine::validation::Field;
use apollo_engine::wizard::{BusyReason, ProjectWizard, WizardPhase};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Always confirms and counts how often it was asked.
#[derive(Default)]
struct TestUi {
    confirmations: AtomicUsize,
}

#[async_trait]
impl UserInteraction for TestUi {
    async fn confirm(&self, _prompt: &str) -> Result<bool> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
    async fn ask_text(&self, _prompt: &str) -> Result<String> {
        Ok(String::new())
    }
    async fn choose(&self, _prompt: &str, _options: &[String]) -> Result<usize> {
        Ok(0)
    }

    fn busy(&self, _label: &str) {}
    fn idle(&self) {}
    fn notify(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
}

async fn write_document(dir: &std::path::Path, name: &str) -> Result<FileUpload> {
    let path = dir.join(name);
    tokio::fs::write(&path, b"%PDF-1.4 requirements").await?;
    FileUpload::from_path(path).await
}

#[tokio::test(start_paused = true)]
async fn test_question_generation_scenario() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let journal = Arc::new(ActivityJournal::new(tmp.path()).await?);

    let backend = InMemoryBackend::with_projects(vec![sample_project("7", "Portal", 2)]);
    let wizard = ProjectWizard::new(backend.clone(), MockAnalysisProvider::new())
        .with_journal(journal.clone());
    wizard.refresh_projects().await;
    assert_eq!(wizard.current_step(), 2);

    // No documents yet: rejected without reaching the provider.
    let err = wizard.request_ai_analysis().await.unwrap_err();
    assert!(matches!(err, WizardError::NoFiles));
    assert_eq!(wizard.current_step(), 2);
    assert_eq!(backend.calls(BackendCall::Update), 0);

    let upload = write_document(tmp.path(), "spec.pdf").await?;
    assert_eq!(upload.mime_type, "application/pdf");
    wizard.upload_files(&[upload]).await?;

    let started = tokio::time::Instant::now();
    let analysis = wizard.request_ai_analysis().await?;
    assert!(started.elapsed() >= Duration::from_secs(3));

    assert_eq!(analysis.questions.len(), 5);
    assert!(analysis.summary.contains("Portal"));
    assert!(analysis.summary.contains('1'));
    assert_eq!(wizard.current_step(), 2);
    assert!(!wizard.is_busy());

    let stored = backend.stored_project(&ProjectId::from("7")).unwrap();
    assert_eq!(stored.uploaded_files.len(), 1);
    assert_eq!(stored.ai_analysis.as_ref().map(|a| a.questions.len()), Some(5));

    let kinds: Vec<JournalEventType> = journal
        .recent(20)
        .await?
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert!(kinds.contains(&JournalEventType::FilesUploaded));
    assert!(kinds.contains(&JournalEventType::AnalysisStarted));
    assert!(kinds.contains(&JournalEventType::AnalysisCompleted));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_navigation_locked_while_analysis_runs() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = InMemoryBackend::with_projects(vec![sample_project("1", "Alpha", 3)]);
    let wizard = ProjectWizard::new(backend, MockAnalysisProvider::new());
    wizard.refresh_projects().await;
    wizard
        .upload_files(&[write_document(tmp.path(), "scope.pdf").await?])
        .await?;

    let ui = TestUi::default();
    let clicks = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut rejected = 0;
        for target in [0, 4, 7] {
            if let Err(WizardError::Busy(BusyReason::Analysis)) = wizard.change_step(target, &ui).await {
                rejected += 1;
            }
        }
        (rejected, wizard.phase())
    };
    let (analysis, (rejected, phase_during)) = tokio::join!(wizard.request_ai_analysis(), clicks);

    analysis?;
    assert_eq!(rejected, 3);
    assert!(matches!(phase_during, WizardPhase::AnalysisRunning { step: 3, .. }));
    assert_eq!(wizard.current_step(), 3);
    assert_eq!(ui.confirmations.load(Ordering::SeqCst), 0);

    // Unlocked again.
    assert_eq!(wizard.next_step(&ui).await?.step(), 4);
    Ok(())
}

#[tokio::test]
async fn test_switching_projects_during_health_check() -> Result<()> {
    let backend = InMemoryBackend::with_projects(vec![
        sample_project("a", "Alpha", 1),
        sample_project("b", "Beta", 6),
    ]);
    backend.set_delay(BackendCall::Health, Duration::from_millis(20));
    let wizard = ProjectWizard::new(backend.clone(), MockAnalysisProvider::new());
    wizard.refresh_projects().await;

    let monitor = HealthMonitor::new(backend.clone(), Duration::from_secs(30));
    let project_b = ProjectId::from("b");
    let (status, step) = tokio::join!(
        monitor.check_once(),
        wizard.select_project(&project_b)
    );

    assert!(matches!(status, BackendStatus::Online { .. }));
    assert_eq!(step?, 6);
    assert_eq!(
        wizard.phase(),
        WizardPhase::ProjectSelected {
            project: ProjectId::from("b"),
            step: 6
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_create_validation_happens_before_network() -> Result<()> {
    let backend = InMemoryBackend::new();
    let wizard = ProjectWizard::new(backend.clone(), MockAnalysisProvider::new());

    let missing = ProjectDraft {
        name: "Gamma".to_string(),
        ..Default::default()
    };
    match wizard.save_project(&missing, None).await {
        Err(WizardError::Validation(errors)) => {
            assert!(!errors.contains(Field::Name));
            assert!(errors.contains(Field::Client));
        }
        other => panic!("expected validation error, got {:?}", other.map(|p| p.id)),
    }
    assert_eq!(backend.total_calls(), 0);

    let draft = ProjectDraft {
        name: "Gamma".to_string(),
        client: "Globex".to_string(),
        responsible: "Hank".to_string(),
        objective: "Launch the partner marketplace".to_string(),
        ..Default::default()
    };
    let created = wizard.save_project(&draft, None).await?;
    assert_eq!(backend.calls(BackendCall::Create), 1);
    assert_eq!(
        wizard.phase(),
        WizardPhase::ProjectSelected {
            project: created.id,
            step: 0
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_delete_walks_to_next_project_then_empty() -> Result<()> {
    let backend = InMemoryBackend::with_projects(vec![
        sample_project("a", "Alpha", 2),
        sample_project("b", "Beta", 4),
    ]);
    let wizard = ProjectWizard::new(backend.clone(), MockAnalysisProvider::new());
    wizard.refresh_projects().await;
    let ui = TestUi::default();

    wizard.delete_project(&ProjectId::from("a"), &ui).await?;
    assert_eq!(
        wizard.phase(),
        WizardPhase::ProjectSelected {
            project: ProjectId::from("b"),
            step: 4
        }
    );

    wizard.delete_project(&ProjectId::from("b"), &ui).await?;
    assert_eq!(wizard.phase(), WizardPhase::NoProjectSelected);
    assert_eq!(ui.confirmations.load(Ordering::SeqCst), 2);
    assert!(backend.list_projects().await?.is_empty());
    Ok(())
}
