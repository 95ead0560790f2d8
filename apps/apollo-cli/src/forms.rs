use crate::render;
use anyhow::Result;
use apollo_engine::domain::types::{Credentials, Priority, ProjectDraft, Registration};
use apollo_engine::validation::{ValidationErrors, validate_draft, validate_registration};
use chrono::NaiveDate;
use console::style;
use dialoguer::{Input, Password, Select, theme::ColorfulTheme};

const PRIORITIES: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

fn text(prompt: &str, initial: &str, required: bool) -> Result<String> {
    let theme = ColorfulTheme::default();
    let mut input = Input::<String>::with_theme(&theme)
        .with_prompt(prompt)
        .allow_empty(!required);
    if !initial.is_empty() {
        input = input.with_initial_text(initial);
    }
    Ok(input.interact_text()?.trim().to_string())
}

pub fn parse_date(raw: &str) -> std::result::Result<Option<NaiveDate>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| format!("'{}' is not a date in YYYY-MM-DD form", raw))
}

fn date(prompt: &str, initial: Option<NaiveDate>) -> Result<Option<NaiveDate>> {
    let initial = initial.map(|d| d.to_string()).unwrap_or_default();
    loop {
        let raw = text(&format!("{} (YYYY-MM-DD, optional)", prompt), &initial, false)?;
        match parse_date(&raw) {
            Ok(d) => return Ok(d),
            Err(e) => println!("{}", style(e).red()),
        }
    }
}

/// Prompts until the draft passes client-side validation.
pub fn project_form(initial: &ProjectDraft) -> Result<ProjectDraft> {
    let mut draft = initial.clone();
    loop {
        draft.name = text("Project name", &draft.name, true)?;
        draft.client = text("Client", &draft.client, true)?;
        draft.responsible = text("Responsible", &draft.responsible, true)?;
        draft.objective = text("Objective", &draft.objective, true)?;
        let description = text(
            "Description (optional)",
            draft.description.as_deref().unwrap_or_default(),
            false,
        )?;
        draft.description = (!description.is_empty()).then_some(description);

        let labels: Vec<String> = PRIORITIES.iter().map(|p| p.to_string()).collect();
        let current = PRIORITIES.iter().position(|p| *p == draft.priority).unwrap_or(1);
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Priority")
            .items(&labels)
            .default(current)
            .interact()?;
        draft.priority = PRIORITIES[choice];

        draft.start_date = date("Start date", draft.start_date)?;
        draft.deadline = date("Deadline", draft.deadline)?;

        match validate_draft(&draft) {
            Ok(()) => return Ok(draft),
            Err(errors) => show_errors(&errors),
        }
    }
}

pub fn credentials(email: Option<String>) -> Result<Credentials> {
    let email = match email {
        Some(e) => e,
        None => text("Email", "", true)?,
    };
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Password")
        .interact()?;
    Ok(Credentials { email, password })
}

pub fn registration(
    name: Option<String>,
    email: Option<String>,
    company: Option<String>,
) -> Result<Registration> {
    let mut registration = Registration {
        name: name.unwrap_or_default(),
        email: email.unwrap_or_default(),
        password: String::new(),
        company,
    };
    loop {
        registration.name = text("Full name", &registration.name, true)?;
        registration.email = text("Email", &registration.email, true)?;
        let company = text(
            "Company (optional)",
            registration.company.as_deref().unwrap_or_default(),
            false,
        )?;
        registration.company = (!company.is_empty()).then_some(company);
        registration.password = Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact()?;

        match validate_registration(&registration) {
            Ok(()) => return Ok(registration),
            Err(errors) => show_errors(&errors),
        }
    }
}

pub fn show_errors(errors: &ValidationErrors) {
    println!("{}", style("Please fix the following:").red());
    render::validation_errors(errors);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("  "), Ok(None));
        assert_eq!(
            parse_date("2026-03-01"),
            Ok(NaiveDate::from_ymd_opt(2026, 3, 1))
        );
        assert!(parse_date("01/03/2026").is_err());
    }
}
