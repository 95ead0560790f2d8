use crate::backend::Backend;
use crate::{App, Wizard, forms, render};
use anyhow::Result;
use apollo_engine::domain::steps::WIZARD_STEPS;
use apollo_engine::domain::types::{FileUpload, ProjectDraft, ProjectId};
use apollo_engine::error::WizardError;
use apollo_engine::health::HealthMonitor;
use apollo_engine::interaction::UserInteraction;
use apollo_engine::wizard::{RefreshOutcome, StepChange, WizardPhase};
use console::style;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    NextStep,
    PreviousStep,
    GotoStep,
    Upload,
    RemoveFile,
    Analyze,
    ShowAnalysis,
    SwitchProject,
    NewProject,
    EditProject,
    DeleteProject,
    Refresh,
    Journal,
    Logout,
    Quit,
}

impl Action {
    fn label(self) -> &'static str {
        match self {
            Action::NextStep => "Next step",
            Action::PreviousStep => "Previous step",
            Action::GotoStep => "Go to step...",
            Action::Upload => "Upload documents",
            Action::RemoveFile => "Remove a document",
            Action::Analyze => "Run AI analysis",
            Action::ShowAnalysis => "Show AI analysis",
            Action::SwitchProject => "Switch project",
            Action::NewProject => "New project",
            Action::EditProject => "Edit project",
            Action::DeleteProject => "Delete project",
            Action::Refresh => "Refresh",
            Action::Journal => "Activity journal",
            Action::Logout => "Log out",
            Action::Quit => "Quit",
        }
    }
}

fn available_actions(phase: &WizardPhase, has_files: bool, has_analysis: bool) -> Vec<Action> {
    if *phase == WizardPhase::NoProjectSelected {
        return vec![
            Action::NewProject,
            Action::Refresh,
            Action::Journal,
            Action::Logout,
            Action::Quit,
        ];
    }

    let mut actions = vec![Action::NextStep, Action::PreviousStep, Action::GotoStep, Action::Upload];
    if has_files {
        actions.push(Action::RemoveFile);
        actions.push(Action::Analyze);
    }
    if has_analysis {
        actions.push(Action::ShowAnalysis);
    }
    actions.extend([
        Action::SwitchProject,
        Action::NewProject,
        Action::EditProject,
        Action::DeleteProject,
        Action::Refresh,
        Action::Journal,
        Action::Logout,
        Action::Quit,
    ]);
    actions
}

async fn ensure_login<B: Backend>(app: &App<B>) -> Result<bool> {
    while !app.sessions.is_authenticated() {
        println!("{}", style("Please log in to continue.").yellow());
        let credentials = forms::credentials(None)?;
        match app.sessions.login(&credentials).await {
            Ok(session) => app.ui.notify(&format!("Welcome, {}!", session.user.name)),
            Err(e) => {
                app.ui.warn(&e.to_string());
                if !app.ui.confirm("Try again?").await? {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

/// The interactive loop: shows the open project and dispatches the chosen intent.
pub async fn run<B: Backend>(app: &App<B>) -> Result<()> {
    render::banner(app.args.offline_demo);
    if !ensure_login(app).await? {
        return Ok(());
    }

    let wizard = app.wizard().await?;
    let monitor = Arc::new(HealthMonitor::new(
        app.backend.clone(),
        app.config.health_poll_interval(),
    ));
    let health = monitor.subscribe();
    let poller = monitor.clone().spawn();

    loop {
        render::backend_status(&health.borrow().clone());
        let selected = wizard.selected_project();
        match &selected {
            Some(project) => render::project_details(project, wizard.current_step()),
            None => println!("\n{}", style("No project selected.").dim()),
        }

        let actions = available_actions(
            &wizard.phase(),
            selected.as_ref().is_some_and(|p| !p.uploaded_files.is_empty()),
            selected.as_ref().is_some_and(|p| p.ai_analysis.is_some()),
        );
        let labels: Vec<String> = actions.iter().map(|a| a.label().to_string()).collect();
        let choice = app.ui.choose("What next?", &labels).await?;

        match actions[choice] {
            Action::NextStep => report_step(app, wizard.next_step(&app.ui).await),
            Action::PreviousStep => report_step(app, wizard.previous_step(&app.ui).await),
            Action::GotoStep => {
                let labels: Vec<String> = WIZARD_STEPS
                    .iter()
                    .map(|s| format!("{}. {}", s.index + 1, s.title))
                    .collect();
                let target = app.ui.choose("Go to step", &labels).await?;
                report_step(app, wizard.change_step(target, &app.ui).await);
            }
            Action::Upload => upload(app, &wizard).await?,
            Action::RemoveFile => remove_file(app, &wizard).await?,
            Action::Analyze => analyze(app, &wizard).await,
            Action::ShowAnalysis => {
                if let Some(analysis) = selected.as_ref().and_then(|p| p.ai_analysis.as_ref()) {
                    render::analysis(analysis);
                }
            }
            Action::SwitchProject => {
                let projects = wizard.projects();
                if projects.is_empty() {
                    println!("{}", style("The project list is empty; try Refresh.").dim());
                    continue;
                }
                let labels: Vec<String> = projects
                    .iter()
                    .map(|p| format!("{} ({})", p.name, p.client))
                    .collect();
                let choice = app.ui.choose("Open project", &labels).await?;
                if let Err(e) = wizard.select_project(&projects[choice].id).await {
                    render::wizard_error(&e);
                }
            }
            Action::NewProject => {
                save_project_form(app, &wizard, ProjectDraft::default(), None).await?;
            }
            Action::EditProject => {
                if let Some(project) = &selected {
                    let draft = ProjectDraft::from_project(project);
                    save_project_form(app, &wizard, draft, Some(&project.id)).await?;
                }
            }
            Action::DeleteProject => {
                if let Some(project) = &selected {
                    match wizard.delete_project(&project.id, &app.ui).await {
                        Ok(()) => app.ui.notify("Project deleted."),
                        Err(e) => render::wizard_error(&e),
                    }
                }
            }
            Action::Refresh => match wizard.refresh_projects().await {
                RefreshOutcome::Loaded(n) => app.ui.notify(&format!("{} project(s) loaded.", n)),
                RefreshOutcome::Degraded(e) => app.ui.warn(&format!("Could not load projects: {}", e)),
                RefreshOutcome::Stale => {}
            },
            Action::Journal => render::journal(&app.journal.recent(15).await?),
            Action::Logout => {
                app.sessions.logout().await?;
                app.ui.notify("Logged out.");
                break;
            }
            Action::Quit => break,
        }
    }

    poller.abort();
    Ok(())
}

fn report_step<B: Backend>(app: &App<B>, change: Result<StepChange, WizardError>) {
    match change {
        Ok(StepChange::Unchanged(_)) => {}
        Ok(StepChange::Moved { to, persisted, .. }) => {
            println!("{}", style(render::step_line(to)).cyan());
            if !persisted {
                app.ui.warn("The new step could not be saved to the backend.");
            }
        }
        Err(e) => render::wizard_error(&e),
    }
}

async fn upload<B: Backend>(app: &App<B>, wizard: &Wizard<B>) -> Result<()> {
    let raw = app
        .ui
        .ask_text("File paths (separate several with commas)")
        .await?;
    let mut uploads = Vec::new();
    for path in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match FileUpload::from_path(path).await {
            Ok(upload) => uploads.push(upload),
            Err(e) => app.ui.warn(&format!("{:#}", e)),
        }
    }
    if uploads.is_empty() {
        return Ok(());
    }

    app.ui.busy("Uploading documents...");
    let result = wizard.upload_files(&uploads).await;
    app.ui.idle();
    match result {
        Ok(uploaded) => app
            .ui
            .notify(&format!("Uploaded {} document(s).", uploaded.len())),
        Err(e) => render::wizard_error(&e),
    }
    Ok(())
}

async fn remove_file<B: Backend>(app: &App<B>, wizard: &Wizard<B>) -> Result<()> {
    let Some(project) = wizard.selected_project() else {
        return Ok(());
    };
    let mut labels: Vec<String> = project
        .uploaded_files
        .iter()
        .map(|f| format!("{} ({})", f.name, render::human_size(f.size)))
        .collect();
    labels.push("Cancel".to_string());

    let choice = app.ui.choose("Remove which document?", &labels).await?;
    if let Some(file) = project.uploaded_files.get(choice) {
        match wizard.remove_file(&file.id).await {
            Ok(()) => app.ui.notify(&format!("Removed {}.", file.name)),
            Err(e) => render::wizard_error(&e),
        }
    }
    Ok(())
}

pub async fn analyze<B: Backend>(app: &App<B>, wizard: &Wizard<B>) {
    let label = "Analyzing documents with AI...";
    app.ui.busy(label);
    let result = wizard.request_ai_analysis().await;
    app.ui.idle();
    match result {
        Ok(analysis) => render::analysis(&analysis),
        Err(e) => render::wizard_error(&e),
    }
}

/// Keeps the form open while the backend rejects fields; other failures end it.
pub async fn save_project_form<B: Backend>(
    app: &App<B>,
    wizard: &Wizard<B>,
    mut draft: ProjectDraft,
    editing: Option<&ProjectId>,
) -> Result<()> {
    loop {
        draft = forms::project_form(&draft)?;
        match wizard.save_project(&draft, editing).await {
            Ok(project) => {
                let verb = if editing.is_some() { "updated" } else { "created" };
                app.ui.notify(&format!("Project \"{}\" {}.", project.name, verb));
                return Ok(());
            }
            Err(WizardError::Validation(errors)) => forms::show_errors(&errors),
            Err(e) => {
                render::wizard_error(&e);
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_without_project() {
        let actions = available_actions(&WizardPhase::NoProjectSelected, false, false);
        assert!(actions.contains(&Action::NewProject));
        assert!(!actions.contains(&Action::NextStep));
    }

    #[test]
    fn test_analysis_offered_only_with_documents() {
        let phase = WizardPhase::ProjectSelected {
            project: ProjectId::from("1"),
            step: 1,
        };
        assert!(!available_actions(&phase, false, false).contains(&Action::Analyze));
        assert!(available_actions(&phase, true, false).contains(&Action::Analyze));
        assert!(available_actions(&phase, true, true).contains(&Action::ShowAnalysis));
    }
}
