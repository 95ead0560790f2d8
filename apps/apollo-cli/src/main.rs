mod backend;
mod forms;
mod interaction;
mod render;
mod workspace;

use anyhow::{Context, Result};
use apollo_engine::{
    analysis::{AnalysisProvider, MockAnalysisProvider, RemoteAnalysisProvider},
    api::http::HttpApiClient,
    config::{self, AnalysisProviderKind, ApolloConfig},
    domain::steps::N_STEPS,
    domain::types::{Credentials, FileUpload, ProjectDraft, ProjectId},
    health::HealthMonitor,
    interaction::UserInteraction,
    journal::ActivityJournal,
    session::{FileKeyValueStore, SessionStore},
    wizard::{ProjectWizard, RefreshOutcome, StepChange},
};
use backend::{Backend, DEMO_EMAIL, DEMO_PASSWORD};
use clap::{Parser, Subcommand};
use console::style;
use interaction::CliInteraction;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Apollo Project Orchestrator", long_about = None)]
struct Args {
    /// Backend base URL (overrides config.json and APOLLO_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Directory for config.json, session.json and logs/ (default: ~/.apollo)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Use an in-memory backend seeded with demo data
    #[arg(long)]
    offline_demo: bool,

    /// Skip confirmation prompts (auto-accept)
    #[arg(short, long)]
    yes: bool,

    /// Enable debug mode
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account (does not log in)
    Register {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Check the backend once
    Health,
    /// Print the wizard stages
    Steps,
    /// List, show, create, edit or delete projects
    Projects {
        #[command(subcommand)]
        action: ProjectsCommand,
    },
    /// Move a project through the wizard
    Step {
        /// Project id (default: first project)
        #[arg(long)]
        project: Option<String>,
        #[command(subcommand)]
        action: StepCommand,
    },
    /// Upload documents to a project
    Upload {
        files: Vec<PathBuf>,
        #[arg(long)]
        project: Option<String>,
    },
    /// Remove an uploaded document
    RemoveFile {
        file_id: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Run the AI question generation over a project's documents
    Analyze {
        #[arg(long)]
        project: Option<String>,
    },
    /// Show recent activity
    Journal {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Interactive workspace (default)
    Workspace,
}

#[derive(Subcommand, Debug, Clone)]
enum ProjectsCommand {
    List,
    Show { id: String },
    Create,
    Edit { id: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug, Clone)]
enum StepCommand {
    /// Jump to a step (1-8)
    Goto { step: usize },
    Next,
    Prev,
}

pub(crate) type Wizard<B> = ProjectWizard<B, Box<dyn AnalysisProvider>>;

pub(crate) struct App<B: Backend> {
    args: Args,
    config: ApolloConfig,
    backend: B,
    sessions: SessionStore<B, FileKeyValueStore>,
    journal: Arc<ActivityJournal>,
    ui: CliInteraction,
}

impl<B: Backend> App<B> {
    /// The backend carrying the current token, or an error telling the user to log in.
    fn session_backend(&self) -> Result<B> {
        match self.sessions.token() {
            Some(token) => Ok(self.backend.authorized(&token)),
            None => anyhow::bail!(
                "Not logged in. Run `apollo login` (or `apollo register`) first."
            ),
        }
    }

    fn provider(&self, backend: &B) -> Box<dyn AnalysisProvider> {
        match self.config.analysis_provider {
            AnalysisProviderKind::Mock => {
                Box::new(MockAnalysisProvider::new().with_delay(self.config.analysis_delay()))
            }
            AnalysisProviderKind::Remote => Box::new(RemoteAnalysisProvider::new(backend.clone())),
        }
    }

    /// A wizard over the user's projects with the list already loaded.
    async fn wizard(&self) -> Result<Wizard<B>> {
        let backend = self.session_backend()?;
        let wizard = ProjectWizard::new(backend.clone(), self.provider(&backend))
            .with_journal(self.journal.clone())
            .with_release_grace(self.config.analysis_release_grace());
        if let RefreshOutcome::Degraded(e) = wizard.refresh_projects().await {
            self.ui
                .warn(&format!("Could not load projects ({}), showing an empty list", e));
        }
        Ok(wizard)
    }

    async fn open_project(&self, wizard: &Wizard<B>, project: Option<String>) -> Result<()> {
        match project {
            Some(id) => {
                wizard.select_project(&ProjectId::from(id)).await?;
            }
            None if wizard.selected_project().is_none() => {
                anyhow::bail!("No projects yet. Create one with `apollo projects create`.")
            }
            None => {}
        }
        Ok(())
    }
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("info,apollo_cli=debug,apollo_engine=debug")
    } else {
        EnvFilter::new("warn,apollo_cli=info,apollo_engine=info")
    };

    fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

async fn load_settings(args: &Args) -> Result<(PathBuf, ApolloConfig)> {
    let data_dir = args.data_dir.clone().unwrap_or_else(config::default_data_dir);
    config::ensure_config(&data_dir).await?;
    let mut config = config::load_config(&data_dir).await?;
    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
        config.validate().context("Invalid --api-url")?;
    }
    Ok((data_dir, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Setup Logging
    setup_logging(args.debug);

    // 2. Config and journal
    let (data_dir, config) = load_settings(&args).await?;
    let journal = Arc::new(ActivityJournal::new(&data_dir).await?);
    journal
        .log_session_started(&config.api_base_url, args.offline_demo)
        .await?;

    // 3. Backend
    if args.offline_demo {
        let demo = backend::demo_backend();
        let app = App {
            sessions: SessionStore::new(demo.clone(), FileKeyValueStore::new(&data_dir.join("demo"))),
            backend: demo,
            ui: CliInteraction::new(args.yes),
            args,
            config,
            journal,
        };
        run(app).await
    } else {
        let client = HttpApiClient::new(&config.api_base_url, config.request_timeout())
            .context("Failed to build HTTP client")?;
        let app = App {
            sessions: SessionStore::new(client.clone(), FileKeyValueStore::new(&data_dir)),
            backend: client,
            ui: CliInteraction::new(args.yes),
            args,
            config,
            journal,
        };
        run(app).await
    }
}

async fn run<B: Backend>(app: App<B>) -> Result<()> {
    match app.sessions.restore().await {
        Ok(Some(user)) => info!(email = %user.email, "Session restored"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Could not restore session"),
    }

    if app.args.offline_demo && !app.sessions.is_authenticated() {
        app.sessions
            .login(&Credentials {
                email: DEMO_EMAIL.to_string(),
                password: DEMO_PASSWORD.to_string(),
            })
            .await?;
    }

    let command = app.args.command.clone().unwrap_or(Command::Workspace);
    match command {
        Command::Login { email } => {
            let credentials = forms::credentials(email)?;
            let session = app.sessions.login(&credentials).await?;
            app.ui.notify(&format!("Welcome, {}!", session.user.name));
        }
        Command::Register {
            name,
            email,
            company,
        } => {
            let registration = forms::registration(name, email, company)?;
            let message = app.sessions.register(&registration).await?;
            app.ui.notify(
                message
                    .as_deref()
                    .unwrap_or("Account created. Log in with `apollo login`."),
            );
        }
        Command::Logout => {
            app.sessions.logout().await?;
            app.ui.notify("Logged out.");
        }
        Command::Whoami => match app.sessions.user() {
            Some(user) => {
                println!("{} <{}>", style(&user.name).bold(), user.email);
                if let Some(company) = &user.company {
                    println!("  {} {}", style("Company:").dim(), company);
                }
                if let Some(role) = &user.role {
                    println!("  {} {}", style("Role:").dim(), role);
                }
            }
            None => println!("{}", style("Not logged in.").dim()),
        },
        Command::Health => {
            let monitor = HealthMonitor::new(app.backend.clone(), app.config.health_poll_interval());
            render::backend_status(&monitor.check_once().await);
        }
        Command::Steps => render::steps_catalog(None),
        Command::Projects { action } => projects(&app, action).await?,
        Command::Step { project, action } => {
            let wizard = app.wizard().await?;
            app.open_project(&wizard, project).await?;
            let change = match action {
                StepCommand::Goto { step } => {
                    if step == 0 || step > N_STEPS {
                        anyhow::bail!("Step must be between 1 and {}", N_STEPS);
                    }
                    wizard.change_step(step - 1, &app.ui).await
                }
                StepCommand::Next => wizard.next_step(&app.ui).await,
                StepCommand::Prev => wizard.previous_step(&app.ui).await,
            };
            match change {
                Ok(change) => {
                    println!("{}", style(render::step_line(change.step())).cyan());
                    if let StepChange::Moved { persisted: false, .. } = change {
                        app.ui.warn("The new step could not be saved to the backend.");
                    }
                }
                Err(e) => render::wizard_error(&e),
            }
        }
        Command::Upload { files, project } => {
            if files.is_empty() {
                anyhow::bail!("Pass at least one file to upload");
            }
            let wizard = app.wizard().await?;
            app.open_project(&wizard, project).await?;
            let mut uploads = Vec::with_capacity(files.len());
            for path in files {
                uploads.push(FileUpload::from_path(path).await?);
            }
            let uploaded = wizard.upload_files(&uploads).await?;
            app.ui.notify(&format!("Uploaded {} document(s).", uploaded.len()));
            render::files(&uploaded);
        }
        Command::RemoveFile { file_id, project } => {
            let wizard = app.wizard().await?;
            app.open_project(&wizard, project).await?;
            wizard.remove_file(&file_id).await?;
            app.ui.notify("Document removed.");
        }
        Command::Analyze { project } => {
            let wizard = app.wizard().await?;
            app.open_project(&wizard, project).await?;
            workspace::analyze(&app, &wizard).await;
        }
        Command::Journal { limit } => render::journal(&app.journal.recent(limit).await?),
        Command::Workspace => workspace::run(&app).await?,
    }

    Ok(())
}

async fn projects<B: Backend>(app: &App<B>, action: ProjectsCommand) -> Result<()> {
    let wizard = app.wizard().await?;
    match action {
        ProjectsCommand::List => {
            render::project_table(&wizard.projects(), None);
        }
        ProjectsCommand::Show { id } => {
            let step = wizard.select_project(&ProjectId::from(id)).await?;
            if let Some(project) = wizard.selected_project() {
                render::project_details(&project, step);
                if let Some(analysis) = &project.ai_analysis {
                    render::analysis(analysis);
                }
            }
        }
        ProjectsCommand::Create => {
            workspace::save_project_form(app, &wizard, ProjectDraft::default(), None).await?;
        }
        ProjectsCommand::Edit { id } => {
            let id = ProjectId::from(id);
            let project = wizard
                .projects()
                .into_iter()
                .find(|p| p.id == id)
                .with_context(|| format!("Project {} not found", id))?;
            workspace::save_project_form(app, &wizard, ProjectDraft::from_project(&project), Some(&id))
                .await?;
        }
        ProjectsCommand::Delete { id } => {
            match wizard.delete_project(&ProjectId::from(id), &app.ui).await {
                Ok(()) => app.ui.notify("Project deleted."),
                Err(e) => render::wizard_error(&e),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_subcommands() {
        let args = Args::try_parse_from(["apollo", "--offline-demo", "step", "--project", "2", "goto", "3"])
            .unwrap();
        assert!(args.offline_demo);
        match args.command {
            Some(Command::Step {
                project,
                action: StepCommand::Goto { step },
            }) => {
                assert_eq!(project.as_deref(), Some("2"));
                assert_eq!(step, 3);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let args = Args::try_parse_from(["apollo"]).unwrap();
        assert!(args.command.is_none());
    }

    #[tokio::test]
    async fn test_load_settings_applies_api_url_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "apollo",
            "--data-dir",
            tmp.path().to_str().unwrap(),
            "--api-url",
            "https://apollo.example.com/api",
        ])
        .unwrap();

        let (data_dir, config) = load_settings(&args).await.unwrap();
        assert_eq!(data_dir, tmp.path());
        assert_eq!(config.api_base_url, "https://apollo.example.com/api");
        assert!(tmp.path().join(config::CONFIG_FILE).exists());
    }

    #[tokio::test]
    async fn test_load_settings_rejects_bad_api_url() {
        let tmp = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "apollo",
            "--data-dir",
            tmp.path().to_str().unwrap(),
            "--api-url",
            "not-a-url",
        ])
        .unwrap();
        assert!(load_settings(&args).await.is_err());
    }
}
