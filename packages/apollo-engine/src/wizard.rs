use crate::analysis::AnalysisProvider;
use crate::api::{ApiResult, ProjectBackend};
use crate::domain::steps::{N_STEPS, step};
use crate::domain::types::{AnalysisResult, FileUpload, Project, ProjectDraft, ProjectId, UploadedFile};
use crate::error::{ApiError, WizardError, WizardResult};
use crate::interaction::UserInteraction;
use crate::journal::ActivityJournal;
use crate::validation::{Field, ValidationErrors, validate_draft};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyReason {
    Analysis,
}

impl std::fmt::Display for BusyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusyReason::Analysis => write!(f, "AI analysis in progress"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Busy(BusyReason),
}

/// What the presentation layer should show right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardPhase {
    NoProjectSelected,
    ProjectSelected { project: ProjectId, step: usize },
    /// The step is already displayed, its save has not come back yet.
    StepTransitionPending { project: ProjectId, step: usize },
    AnalysisRunning { project: ProjectId, step: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepChange {
    Unchanged(usize),
    Moved {
        from: usize,
        to: usize,
        persisted: bool,
    },
}

impl StepChange {
    pub fn step(&self) -> usize {
        match self {
            StepChange::Unchanged(s) => *s,
            StepChange::Moved { to, .. } => *to,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Loaded(usize),
    /// A newer refresh started while this one was in flight.
    Stale,
    /// The list could not be read; it is shown empty until the next refresh.
    Degraded(ApiError),
}

struct WizardState {
    projects: Vec<Project>,
    selected: Option<Project>,
    current_step: usize,
    activity: Activity,
    list_generation: u64,
    step_generation: u64,
    pending_step_saves: usize,
}

impl WizardState {
    fn select(&mut self, project: Option<Project>) {
        self.current_step = project.as_ref().map_or(0, |p| p.current_step);
        self.selected = project;
        self.step_generation += 1;
    }

    fn selected_id(&self) -> WizardResult<ProjectId> {
        self.selected
            .as_ref()
            .map(|p| p.id.clone())
            .ok_or(WizardError::NoProjectSelected)
    }

    fn ensure_idle(&self) -> WizardResult<()> {
        match self.activity {
            Activity::Idle => Ok(()),
            Activity::Busy(reason) => Err(WizardError::Busy(reason)),
        }
    }

    /// Applies `edit` to the selected project and its list entry, returning the result.
    fn edit_selected(&mut self, id: &ProjectId, edit: impl Fn(&mut Project)) -> Option<Project> {
        if let Some(entry) = self.projects.iter_mut().find(|p| &p.id == id) {
            edit(entry);
        }
        let selected = self.selected.as_mut().filter(|p| &p.id == id)?;
        edit(selected);
        selected.current_step = self.current_step;
        Some(selected.clone())
    }

    /// Installs a freshly loaded list. The selected project keeps its displayed
    /// step; if it vanished the first project is opened. Returns what was newly
    /// selected, if anything.
    fn adopt_list(&mut self, projects: Vec<Project>) -> Option<(ProjectId, usize)> {
        self.projects = projects;
        if let Some(id) = self.selected.as_ref().map(|p| p.id.clone()) {
            let fresh = self.projects.iter().find(|p| p.id == id).cloned();
            if let Some(mut fresh) = fresh {
                fresh.current_step = self.current_step;
                self.selected = Some(fresh);
                return None;
            }
            if self.activity != Activity::Idle {
                return None;
            }
            info!(project = %id, "Selected project no longer exists");
        }

        let first = self.projects.first().cloned();
        let reselected = first.as_ref().map(|p| (p.id.clone(), p.current_step));
        if first.is_some() || self.selected.is_some() {
            self.select(first);
        }
        reselected
    }

    /// The freshest local copy of `id`: the open project when it is `id`, else the list entry.
    fn local_copy(&self, id: &ProjectId) -> Option<Project> {
        match self.selected.as_ref().filter(|p| &p.id == id) {
            Some(selected) => Some(Project {
                current_step: self.current_step,
                ..selected.clone()
            }),
            None => self.projects.iter().find(|p| &p.id == id).cloned(),
        }
    }

    fn upsert(&mut self, project: &Project) {
        match self.projects.iter_mut().find(|p| p.id == project.id) {
            Some(entry) => *entry = project.clone(),
            None => self.projects.push(project.clone()),
        }
    }
}

/// Returns the wizard to `Idle` when an analysis ends, including when its future is dropped.
struct BusyGuard<'a> {
    state: &'a Mutex<WizardState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .activity = Activity::Idle;
    }
}

/// The single source of truth for the open project and the displayed step.
///
/// Every method takes `&self`; the internal lock is only held between awaits, so
/// intents issued concurrently on one runtime interleave safely.
pub struct ProjectWizard<B: ProjectBackend, P: AnalysisProvider> {
    backend: B,
    provider: P,
    journal: Option<Arc<ActivityJournal>>,
    release_grace: Duration,
    state: Mutex<WizardState>,
    /// Project writes go out one at a time, in the order they were issued.
    save_lane: AsyncMutex<()>,
}

impl<B: ProjectBackend, P: AnalysisProvider> ProjectWizard<B, P> {
    pub fn new(backend: B, provider: P) -> Self {
        Self {
            backend,
            provider,
            journal: None,
            release_grace: Duration::ZERO,
            state: Mutex::new(WizardState {
                projects: Vec::new(),
                selected: None,
                current_step: 0,
                activity: Activity::Idle,
                list_generation: 0,
                step_generation: 0,
                pending_step_saves: 0,
            }),
            save_lane: AsyncMutex::new(()),
        }
    }

    pub fn with_journal(mut self, journal: Arc<ActivityJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_release_grace(mut self, grace: Duration) -> Self {
        self.release_grace = grace;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn state(&self) -> MutexGuard<'_, WizardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn record<'a, F, Fut>(&'a self, write: F)
    where
        F: FnOnce(&'a ActivityJournal) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        if let Some(journal) = &self.journal {
            if let Err(e) = write(journal).await {
                warn!(error = %e, "Failed to write activity journal");
            }
        }
    }

    // --- Read access ---

    pub fn projects(&self) -> Vec<Project> {
        self.state().projects.clone()
    }

    pub fn selected_project(&self) -> Option<Project> {
        self.state().selected.clone()
    }

    pub fn current_step(&self) -> usize {
        self.state().current_step
    }

    pub fn activity(&self) -> Activity {
        self.state().activity
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.activity(), Activity::Busy(_))
    }

    pub fn phase(&self) -> WizardPhase {
        let state = self.state();
        let Some(selected) = &state.selected else {
            return WizardPhase::NoProjectSelected;
        };
        let project = selected.id.clone();
        let step = state.current_step;
        match state.activity {
            Activity::Busy(BusyReason::Analysis) => WizardPhase::AnalysisRunning { project, step },
            Activity::Idle if state.pending_step_saves > 0 => {
                WizardPhase::StepTransitionPending { project, step }
            }
            Activity::Idle => WizardPhase::ProjectSelected { project, step },
        }
    }

    // --- Project list ---

    /// Reloads the list. The displayed step of the selected project is never touched.
    pub async fn refresh_projects(&self) -> RefreshOutcome {
        let generation = {
            let mut state = self.state();
            state.list_generation += 1;
            state.list_generation
        };

        let result = self.backend.list_projects().await;

        let (outcome, selected_now) = {
            let mut state = self.state();
            if generation != state.list_generation {
                debug!(generation, "Discarding stale project list");
                return RefreshOutcome::Stale;
            }

            match result {
                Ok(projects) => {
                    let count = projects.len();
                    let reselected = state.adopt_list(projects);
                    (RefreshOutcome::Loaded(count), reselected)
                }
                Err(e) => {
                    state.projects.clear();
                    (RefreshOutcome::Degraded(e), None)
                }
            }
        };

        match &outcome {
            RefreshOutcome::Degraded(e) => {
                warn!(error = %e, "Project list unavailable");
                let message = e.to_string();
                self.record(|j| j.log_refresh_degraded(&message)).await;
            }
            RefreshOutcome::Loaded(count) => {
                info!(count, "Project list loaded");
                if let Some((id, step)) = selected_now {
                    self.record(|j| j.log_project_selected(id.as_str(), step)).await;
                }
            }
            RefreshOutcome::Stale => {}
        }
        outcome
    }

    /// Opens a project at its persisted step. Re-selecting the open project keeps
    /// the displayed step.
    pub async fn select_project(&self, id: &ProjectId) -> WizardResult<usize> {
        let step = {
            let mut state = self.state();
            state.ensure_idle()?;
            if state.selected.as_ref().is_some_and(|p| &p.id == id) {
                return Ok(state.current_step);
            }
            let project = state
                .projects
                .iter()
                .find(|p| &p.id == id)
                .cloned()
                .ok_or_else(|| WizardError::ProjectNotFound(id.clone()))?;
            state.select(Some(project));
            state.current_step
        };

        info!(project = %id, step, "Project selected");
        self.record(|j| j.log_project_selected(id.as_str(), step)).await;
        Ok(step)
    }

    // --- Step navigation ---

    /// Moves the displayed step. Backward moves ask `ui` first. The new step is
    /// shown before the save is sent; a failed save is reported, not rolled back.
    pub async fn change_step(
        &self,
        target: usize,
        ui: &impl UserInteraction,
    ) -> WizardResult<StepChange> {
        if target >= N_STEPS {
            self.record(|j| j.log_step_rejected(target, "outside the wizard")).await;
            return Err(WizardError::InvalidStep(target));
        }

        let (id, from) = match self.check_step_change() {
            Ok(v) => v,
            Err(e) => {
                let reason = e.to_string();
                self.record(|j| j.log_step_rejected(target, &reason)).await;
                return Err(e);
            }
        };
        if target == from {
            return Ok(StepChange::Unchanged(from));
        }

        if target < from {
            let title = step(target).map_or("", |s| s.title);
            let prompt = format!("Go back to step {} ({})?", target + 1, title);
            let confirmed = ui
                .confirm(&prompt)
                .await
                .map_err(|e| WizardError::Interaction(e.to_string()))?;
            if !confirmed {
                return Err(WizardError::Declined);
            }
        }

        let applied = {
            let mut state = self.state();
            match state.ensure_idle() {
                Err(e) => Err(e),
                // The selection moved while the prompt was open.
                Ok(()) if state.selected_id()? != id => {
                    return Ok(StepChange::Unchanged(state.current_step));
                }
                Ok(()) => {
                    state.current_step = target;
                    state.step_generation += 1;
                    state.pending_step_saves += 1;
                    state.edit_selected(&id, |p| p.current_step = target);
                    Ok(state.step_generation)
                }
            }
        };
        let generation = match applied {
            Ok(applied) => applied,
            Err(e) => {
                let reason = e.to_string();
                self.record(|j| j.log_step_rejected(target, &reason)).await;
                return Err(e);
            }
        };

        info!(project = %id, from, to = target, "Step changed");
        self.record(|j| j.log_step_changed(id.as_str(), from, target)).await;

        let saved = self.persist(&id).await;

        let stale = {
            let mut state = self.state();
            state.pending_step_saves = state.pending_step_saves.saturating_sub(1);
            generation != state.step_generation
        };

        let persisted = match saved {
            Ok(()) => true,
            Err(e) if stale => {
                debug!(project = %id, step = target, error = %e, "Stale step save failed");
                false
            }
            Err(e) => {
                warn!(project = %id, step = target, error = %e, "Could not save step");
                let message = e.to_string();
                self.record(|j| j.log_step_persist_failed(id.as_str(), target, &message))
                    .await;
                false
            }
        };

        Ok(StepChange::Moved {
            from,
            to: target,
            persisted,
        })
    }

    fn check_step_change(&self) -> WizardResult<(ProjectId, usize)> {
        let state = self.state();
        state.ensure_idle()?;
        Ok((state.selected_id()?, state.current_step))
    }

    pub async fn next_step(&self, ui: &impl UserInteraction) -> WizardResult<StepChange> {
        let target = (self.current_step() + 1).min(N_STEPS - 1);
        self.change_step(target, ui).await
    }

    pub async fn previous_step(&self, ui: &impl UserInteraction) -> WizardResult<StepChange> {
        let target = self.current_step().saturating_sub(1);
        self.change_step(target, ui).await
    }

    // --- AI analysis ---

    /// Runs the analysis provider over the selected project's files.
    ///
    /// Step navigation is rejected until this returns, and the step shown
    /// afterwards is the one captured when it started.
    pub async fn request_ai_analysis(&self) -> WizardResult<AnalysisResult> {
        let (id, captured_step, files, meta) = {
            let mut state = self.state();
            state.ensure_idle()?;
            let selected = state.selected.as_ref().ok_or(WizardError::NoProjectSelected)?;
            if selected.uploaded_files.is_empty() {
                return Err(WizardError::NoFiles);
            }
            let captured = (
                selected.id.clone(),
                state.current_step,
                selected.uploaded_files.clone(),
                selected.meta(),
            );
            state.activity = Activity::Busy(BusyReason::Analysis);
            captured
        };
        let _busy = BusyGuard { state: &self.state };

        info!(project = %id, files = files.len(), "AI analysis started");
        self.record(|j| j.log_analysis_started(id.as_str(), files.len())).await;

        let result = match self.provider.analyze(&files, &meta).await {
            Ok(result) => result,
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(project = %id, error = %message, "AI analysis failed");
                self.record(|j| j.log_analysis_finished(id.as_str(), Err(&message)))
                    .await;
                self.hold_release_grace().await;
                return Err(WizardError::Analysis(message));
            }
        };

        {
            let mut state = self.state();
            let analysis = result.clone();
            state.edit_selected(&id, move |p| p.ai_analysis = Some(analysis.clone()));
        }
        self.push_project(&id, "Could not save analysis result").await;

        {
            let mut state = self.state();
            if state.selected.as_ref().is_some_and(|p| p.id == id) {
                state.current_step = captured_step;
                if let Some(selected) = state.selected.as_mut() {
                    selected.current_step = captured_step;
                }
            }
        }

        let questions = result.questions.len();
        info!(project = %id, questions, "AI analysis completed");
        self.record(|j| j.log_analysis_finished(id.as_str(), Ok(questions))).await;

        self.hold_release_grace().await;
        Ok(result)
    }

    /// Keeps the wizard busy for the configured grace after an analysis ends.
    async fn hold_release_grace(&self) {
        if !self.release_grace.is_zero() {
            tokio::time::sleep(self.release_grace).await;
        }
    }

    // --- Documents ---

    /// Uploads each file, attaches the stored records to the selected project and
    /// pushes the project. Allowed during an analysis.
    pub async fn upload_files(&self, files: &[FileUpload]) -> WizardResult<Vec<UploadedFile>> {
        let id = self.state().selected_id()?;

        let mut uploaded = Vec::with_capacity(files.len());
        let mut failure = None;
        for file in files {
            match self.backend.upload_file(&id, file).await {
                Ok(stored) => uploaded.push(stored),
                Err(e) => {
                    warn!(project = %id, file = %file.name, error = %e, "Upload failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        if !uploaded.is_empty() {
            let names: Vec<String> = uploaded.iter().map(|f| f.name.clone()).collect();
            {
                let mut state = self.state();
                let added = uploaded.clone();
                state.edit_selected(&id, move |p| p.uploaded_files.extend(added.iter().cloned()));
            }
            self.record(|j| j.log_files_uploaded(id.as_str(), &names)).await;
            self.push_project(&id, "Could not save uploaded files").await;
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(uploaded),
        }
    }

    pub async fn remove_file(&self, file_id: &str) -> WizardResult<()> {
        let (id, name) = {
            let state = self.state();
            let selected = state.selected.as_ref().ok_or(WizardError::NoProjectSelected)?;
            let file = selected
                .uploaded_files
                .iter()
                .find(|f| f.id == file_id)
                .ok_or_else(|| WizardError::FileNotFound(file_id.to_string()))?;
            (selected.id.clone(), file.name.clone())
        };

        self.backend.delete_file(&id, file_id).await?;

        self.state()
            .edit_selected(&id, |p| p.uploaded_files.retain(|f| f.id != file_id));
        info!(project = %id, file = %name, "File removed");
        self.record(|j| j.log_file_removed(id.as_str(), &name)).await;
        self.push_project(&id, "Could not save file removal").await;
        Ok(())
    }

    /// Sends the local copy of `id` through the save lane. The body is read once
    /// the lane is free, so a write that lands later never carries older fields.
    /// A project no longer held locally is skipped.
    async fn persist(&self, id: &ProjectId) -> ApiResult<()> {
        let _lane = self.save_lane.lock().await;
        let Some(project) = self.state().local_copy(id) else {
            return Ok(());
        };
        self.backend.update_project(&project).await.map(|_| ())
    }

    async fn push_project(&self, id: &ProjectId, what: &str) {
        if let Err(e) = self.persist(id).await {
            warn!(project = %id, error = %e, "{}", what);
            let project = id.to_string();
            let message = e.to_string();
            self.record(|j| j.log_save_failed(&project, what, &message)).await;
        }
    }

    // --- Create / edit / delete ---

    /// Creates (`editing == None`) or updates a project. A new project is opened at
    /// step 0.
    pub async fn save_project(
        &self,
        draft: &ProjectDraft,
        editing: Option<&ProjectId>,
    ) -> WizardResult<Project> {
        validate_draft(draft)?;

        let saved = match editing {
            Some(id) => {
                let _lane = self.save_lane.lock().await;
                let base = {
                    let state = self.state();
                    let mut base = state
                        .projects
                        .iter()
                        .find(|p| &p.id == id)
                        .or(state.selected.as_ref().filter(|p| &p.id == id))
                        .cloned()
                        .ok_or_else(|| WizardError::ProjectNotFound(id.clone()))?;
                    if state.selected.as_ref().is_some_and(|p| &p.id == id) {
                        base.current_step = state.current_step;
                    }
                    base
                };
                self.backend
                    .update_project(&draft.apply_to(&base))
                    .await
                    .map_err(write_error)?
            }
            None => {
                self.state().ensure_idle()?;
                self.backend
                    .create_project(draft)
                    .await
                    .map_err(write_error)?
            }
        };

        let created = editing.is_none();
        info!(project = %saved.id, created, "Project saved");
        self.record(|j| j.log_project_saved(saved.id.as_str(), created)).await;

        self.refresh_projects().await;

        let mut state = self.state();
        state.upsert(&saved);
        if created && state.ensure_idle().is_ok() {
            let mut opened = saved.clone();
            opened.current_step = 0;
            state.select(Some(opened));
        } else if created {
            info!(project = %saved.id, "Analysis running, keeping the open project");
        } else if let Some(selected) = state.selected.as_mut().filter(|p| p.id == saved.id) {
            let step = selected.current_step;
            *selected = Project {
                current_step: step,
                ..saved.clone()
            };
        }
        Ok(saved)
    }

    /// Deletes after confirmation. When the open project goes away the first
    /// remaining project is opened at its persisted step.
    pub async fn delete_project(&self, id: &ProjectId, ui: &impl UserInteraction) -> WizardResult<()> {
        let name = {
            let state = self.state();
            state.ensure_idle()?;
            state
                .projects
                .iter()
                .find(|p| &p.id == id)
                .map(|p| p.name.clone())
                .ok_or_else(|| WizardError::ProjectNotFound(id.clone()))?
        };

        let prompt = format!("Delete project \"{}\"? This cannot be undone.", name);
        let confirmed = ui
            .confirm(&prompt)
            .await
            .map_err(|e| WizardError::Interaction(e.to_string()))?;
        if !confirmed {
            return Err(WizardError::Declined);
        }
        self.state().ensure_idle()?;

        self.backend.delete_project(id).await?;

        let reselected = {
            let mut state = self.state();
            state.projects.retain(|p| &p.id != id);
            if state.selected.as_ref().is_some_and(|p| &p.id == id) {
                let next = state.projects.first().cloned();
                state.select(next);
                Some(state.selected.as_ref().map(|p| (p.id.clone(), p.current_step)))
            } else {
                None
            }
        };

        info!(project = %id, "Project deleted");
        self.record(|j| j.log_project_deleted(id.as_str())).await;
        if let Some(Some((next, step))) = reselected {
            self.record(|j| j.log_project_selected(next.as_str(), step)).await;
        }
        Ok(())
    }
}

/// Backend rejections that name form fields become validation errors.
fn write_error(error: ApiError) -> WizardError {
    if let ApiError::Backend { status, message } = &error {
        if (400..500).contains(status) && *status != 404 {
            let errors = ValidationErrors::from_backend_message(message);
            if errors.iter().any(|(field, _)| field != Field::General) {
                return WizardError::Validation(errors);
            }
        }
    }
    WizardError::Api(error)
}
