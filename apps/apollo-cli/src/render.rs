use apollo_engine::domain::steps::{N_STEPS, WIZARD_STEPS, progress_percent, step};
use apollo_engine::domain::types::{AnalysisResult, Priority, Project, UploadedFile};
use apollo_engine::error::WizardError;
use apollo_engine::health::BackendStatus;
use apollo_engine::journal::{JournalEvent, Severity};
use apollo_engine::validation::ValidationErrors;
use console::style;

pub fn banner(offline_demo: bool) {
    println!(
        "\n{}",
        style("   APOLLO PROJECT ORCHESTRATOR   ")
            .bold()
            .on_blue()
            .white()
    );
    println!("{}", style("---------------------------------").dim());
    if offline_demo {
        println!(
            "{}",
            style("Offline demo: data lives in memory and is lost on exit").yellow()
        );
    }
}

pub fn header(text: &str) {
    println!("\n{}", style(text).bold().cyan());
}

pub fn backend_status(status: &BackendStatus) {
    let label = match status {
        BackendStatus::Online { .. } => style(status.to_string()).green(),
        BackendStatus::Checking => style(status.to_string()).dim(),
        BackendStatus::Offline { .. } => style(status.to_string()).red(),
    };
    println!("{} {}", style("Backend:").dim(), label);
}

pub fn steps_catalog(current: Option<usize>) {
    for s in WIZARD_STEPS.iter() {
        let marker = match current {
            Some(c) if c == s.index => style("➜").cyan().bold(),
            Some(c) if s.index < c => style("✔").green(),
            _ => style("·").dim(),
        };
        println!(
            "  {} {}. {} {}",
            marker,
            s.index + 1,
            style(s.title).bold(),
            style(format!("({})", s.description)).dim()
        );
    }
}

pub fn step_line(index: usize) -> String {
    let title = step(index).map_or("?", |s| s.title);
    format!(
        "Step {}/{} · {} ({}%)",
        index + 1,
        N_STEPS,
        title,
        progress_percent(index)
    )
}

fn priority_label(priority: Priority) -> console::StyledObject<String> {
    let text = priority.to_string();
    match priority {
        Priority::Low => style(text).dim(),
        Priority::Medium => style(text).cyan(),
        Priority::High => style(text).yellow(),
        Priority::Urgent => style(text).red().bold(),
    }
}

pub fn project_table(projects: &[Project], selected: Option<&Project>) {
    if projects.is_empty() {
        println!("{}", style("No projects yet.").dim());
        return;
    }
    for p in projects {
        let marker = if selected.is_some_and(|s| s.id == p.id) {
            style("●").green()
        } else {
            style("○").dim()
        };
        println!(
            "  {} [{}] {} {} {} {}",
            marker,
            style(&p.id).dim(),
            style(&p.name).bold(),
            style(format!("for {}", p.client)).dim(),
            priority_label(p.priority),
            style(step_line(p.current_step)).dim()
        );
    }
}

pub fn project_details(project: &Project, displayed_step: usize) {
    println!(
        "\n{} {}",
        style(&project.name).bold().underlined(),
        style(format!("[{}]", project.id)).dim()
    );
    println!("  {} {}", style("Client:").dim(), project.client);
    println!("  {} {}", style("Responsible:").dim(), project.responsible);
    println!("  {} {}", style("Objective:").dim(), project.objective);
    if let Some(description) = project.description.as_deref().filter(|d| !d.is_empty()) {
        println!("  {} {}", style("Description:").dim(), description);
    }
    println!(
        "  {} {}  {} {}",
        style("Priority:").dim(),
        priority_label(project.priority),
        style("Status:").dim(),
        project.status
    );
    if let Some(deadline) = project.deadline {
        let today = chrono::Local::now().date_naive();
        let days = project.days_until_deadline(today).unwrap_or_default();
        let left = match days {
            d if d < 0 => style(format!("{} days overdue", -d)).red(),
            0 => style("due today".to_string()).yellow(),
            d => style(format!("{} days left", d)).green(),
        };
        println!("  {} {} ({})", style("Deadline:").dim(), deadline, left);
    }
    println!("  {}", style(step_line(displayed_step)).cyan());
    files(&project.uploaded_files);
    if project.ai_analysis.is_some() {
        println!("  {}", style("AI analysis available").green());
    }
}

pub fn files(files: &[UploadedFile]) {
    if files.is_empty() {
        println!("  {}", style("No documents uploaded").dim());
        return;
    }
    println!("  {}", style("Documents:").dim());
    for f in files {
        println!(
            "    • {} {} {}",
            f.name,
            style(human_size(f.size)).dim(),
            style(format!("[{}]", f.id)).dim()
        );
    }
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

pub fn analysis(result: &AnalysisResult) {
    header("AI ANALYSIS");
    println!("{}", result.summary);

    println!("\n{}:", style("Questions").bold());
    for q in &result.questions {
        println!(
            "  {}. {} {} {}",
            q.id,
            style(format!("[{}]", q.category)).cyan(),
            q.question,
            priority_label(q.priority)
        );
        if !q.context.is_empty() {
            println!("     {}", style(&q.context).dim());
        }
    }

    println!("\n{}:", style("Insights").bold());
    for insight in &result.insights {
        println!("  {} {}", style("✦").yellow(), insight);
    }

    println!("\n{}:", style("Next steps").bold());
    for next in &result.next_steps {
        println!("  {} {}", style("➜").cyan(), next);
    }
}

pub fn validation_errors(errors: &ValidationErrors) {
    for (field, message) in errors.iter() {
        println!("  {} {}", style(format!("{}:", field)).red().bold(), message);
    }
}

pub fn wizard_error(error: &WizardError) {
    match error {
        WizardError::Validation(errors) => {
            println!("{}", style("Please fix the following:").red());
            validation_errors(errors);
        }
        WizardError::Declined => println!("{}", style("Cancelled.").dim()),
        WizardError::Busy(_) => println!("{}", style(error.to_string()).yellow()),
        other => println!("{}", style(other.to_string()).red()),
    }
}

pub fn journal(events: &[JournalEvent]) {
    if events.is_empty() {
        println!("{}", style("No activity recorded yet.").dim());
        return;
    }
    for e in events {
        let level = match e.severity {
            Severity::Error => style("ERROR").red().bold(),
            Severity::Warn => style("WARN ").yellow(),
            Severity::Info => style("INFO ").green(),
        };
        let at = e.at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S");
        println!("{} {} {}", style(at).dim(), level, e.message);
    }
}
