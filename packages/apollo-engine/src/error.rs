use crate::domain::steps::N_STEPS;
use crate::domain::types::ProjectId;
use crate::validation::ValidationErrors;
use crate::wizard::BusyReason;

/// Failures talking to the REST backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a usable response (offline, timeout, bad payload).
    #[error("connection to the backend failed: {0}")]
    Network(String),

    /// The bearer token was missing, expired or rejected.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The backend answered with an error payload.
    #[error("backend rejected the request ({status}): {message}")]
    Backend { status: u16, message: String },

    /// A document picked for upload could not be read from disk.
    #[error("failed to read local file: {0}")]
    LocalFile(String),
}

impl ApiError {
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Network(m) | ApiError::Unauthorized(m) | ApiError::LocalFile(m) => m,
            ApiError::Backend { message, .. } => message,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("wizard is busy ({0}), try again when it finishes")]
    Busy(BusyReason),

    #[error("no project is selected")]
    NoProjectSelected,

    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("step {0} is outside the wizard (valid steps are 0..{max})", max = N_STEPS)]
    InvalidStep(usize),

    #[error("upload at least one document before requesting the AI analysis")]
    NoFiles,

    #[error("file {0} is not attached to the selected project")]
    FileNotFound(String),

    #[error("invalid input: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("interaction failed: {0}")]
    Interaction(String),

    #[error("action declined by the user")]
    Declined,
}

impl From<ValidationErrors> for WizardError {
    fn from(errors: ValidationErrors) -> Self {
        WizardError::Validation(errors)
    }
}

pub type WizardResult<T> = std::result::Result<T, WizardError>;

/// Failures of the login/register/restore flows.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Reading or writing the persisted session failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        AuthError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = WizardError::Busy(BusyReason::Analysis);
        assert!(e.to_string().contains("AI analysis"));

        let e = WizardError::InvalidStep(9);
        assert_eq!(
            e.to_string(),
            "step 9 is outside the wizard (valid steps are 0..8)"
        );

        let e: WizardError = ApiError::Backend {
            status: 400,
            message: "bad".to_string(),
        }
        .into();
        assert!(matches!(e, WizardError::Api(ApiError::Backend { status: 400, .. })));
    }
}
