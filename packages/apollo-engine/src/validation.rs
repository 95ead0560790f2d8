//! Client-side form validation.
//!
//! Every check here runs before a request is sent. Backend rejections that carry a
//! recognisable message are folded back into the same per-field shape so the caller
//! can highlight the offending input.

use crate::domain::types::{Credentials, ProjectDraft, Registration};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const MIN_OBJECTIVE_LEN: usize = 10;
pub const MIN_USER_NAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Client,
    Responsible,
    Objective,
    Deadline,
    Email,
    Password,
    General,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Field::Name => "name",
            Field::Client => "client",
            Field::Responsible => "responsible",
            Field::Objective => "objective",
            Field::Deadline => "deadline",
            Field::Email => "email",
            Field::Password => "password",
            Field::General => "general",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    errors: BTreeMap<Field, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: Field, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Records the first message per field; later ones for the same field are dropped.
    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.errors.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.errors.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.errors.iter().map(|(f, m)| (*f, m.as_str()))
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Maps a backend rejection message onto form fields. Backends join several
    /// failures with `;`, each part is classified on its own.
    pub fn from_backend_message(message: &str) -> Self {
        let mut errors = Self::new();
        for part in message.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            errors.add(classify_message(part), part);
        }
        if errors.is_empty() {
            errors.add(Field::General, message.trim());
        }
        errors
    }
}

fn classify_message(message: &str) -> Field {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["objective", "objetivo"]) {
        Field::Objective
    } else if has(&["deadline", "prazo", "end_date", "start date", "data de"]) {
        Field::Deadline
    } else if has(&["responsible", "respons"]) {
        Field::Responsible
    } else if has(&["client", "cliente"]) {
        Field::Client
    } else if has(&["email"]) {
        Field::Email
    } else if has(&["password", "senha"]) {
        Field::Password
    } else if has(&["name", "nome"]) {
        Field::Name
    } else {
        Field::General
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, msg)| format!("{}: {}", field, msg))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn validate_draft(draft: &ProjectDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if draft.name.trim().is_empty() {
        errors.add(Field::Name, "Project name is required");
    }
    if draft.client.trim().is_empty() {
        errors.add(Field::Client, "Client is required");
    }
    if draft.responsible.trim().is_empty() {
        errors.add(Field::Responsible, "Responsible person is required");
    }

    let objective = draft.objective.trim();
    if objective.is_empty() {
        errors.add(Field::Objective, "Objective is required");
    } else if objective.chars().count() < MIN_OBJECTIVE_LEN {
        errors.add(
            Field::Objective,
            format!("Objective must be at least {} characters", MIN_OBJECTIVE_LEN),
        );
    }

    if let (Some(start), Some(deadline)) = (draft.start_date, draft.deadline) {
        if deadline <= start {
            errors.add(Field::Deadline, "Deadline must be after the start date");
        }
    }

    errors.into_result()
}

pub fn validate_credentials(credentials: &Credentials) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if credentials.email.trim().is_empty() {
        errors.add(Field::Email, "Email is required");
    }
    if credentials.password.is_empty() {
        errors.add(Field::Password, "Password is required");
    }
    errors.into_result()
}

pub fn validate_registration(registration: &Registration) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = registration.name.trim();
    if name.is_empty() {
        errors.add(Field::Name, "Name is required");
    } else if name.chars().count() < MIN_USER_NAME_LEN {
        errors.add(
            Field::Name,
            format!("Name must be at least {} characters", MIN_USER_NAME_LEN),
        );
    }

    let email = registration.email.trim();
    if email.is_empty() {
        errors.add(Field::Email, "Email is required");
    } else if !EMAIL_RE.is_match(email) {
        errors.add(Field::Email, "Invalid email format");
    }

    if let Some(problem) = password_problem(&registration.password) {
        errors.add(Field::Password, problem);
    }

    errors.into_result()
}

fn password_problem(password: &str) -> Option<String> {
    const SPECIAL: &str = "!@#$%^&*(),.?\":{}|<>";

    if password.is_empty() {
        return Some("Password is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Some("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Some("Password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some("Password must contain a digit".to_string());
    }
    if !password.chars().any(|c| SPECIAL.contains(c)) {
        return Some("Password must contain a special character".to_string());
    }
    None
}
