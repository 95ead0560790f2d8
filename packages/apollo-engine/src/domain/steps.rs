use serde::Serialize;

pub const N_STEPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WizardStep {
    pub index: usize,
    pub id: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

/// The fixed, ordered stages every project goes through.
pub const WIZARD_STEPS: [WizardStep; N_STEPS] = [
    WizardStep {
        index: 0,
        id: "registration",
        title: "Project Registration",
        icon: "FileText",
        description: "Basic project information",
    },
    WizardStep {
        index: 1,
        id: "upload",
        title: "Document Upload",
        icon: "Upload",
        description: "Attach the project documentation",
    },
    WizardStep {
        index: 2,
        id: "questions",
        title: "Question Generation",
        icon: "MessageSquare",
        description: "AI generates critical questions",
    },
    WizardStep {
        index: 3,
        id: "collection",
        title: "Information Collection",
        icon: "Database",
        description: "Documentation and clarifications",
    },
    WizardStep {
        index: 4,
        id: "technical-analysis",
        title: "Technical Analysis",
        icon: "Settings",
        description: "Survey of the target environment",
    },
    WizardStep {
        index: 5,
        id: "execution",
        title: "Project Execution",
        icon: "Code",
        description: "Automated development",
    },
    WizardStep {
        index: 6,
        id: "testing",
        title: "Testing",
        icon: "TestTube",
        description: "Integrated tests and fixes",
    },
    WizardStep {
        index: 7,
        id: "go-live",
        title: "Go Live",
        icon: "Rocket",
        description: "Final documentation and deploy",
    },
];

pub fn step(index: usize) -> Option<&'static WizardStep> {
    WIZARD_STEPS.get(index)
}

/// Progress through the wizard as a percentage, 0 on the first step and 100 on the last.
pub fn progress_percent(index: usize) -> u8 {
    let clamped = index.min(N_STEPS - 1);
    ((clamped * 100) / (N_STEPS - 1)) as u8
}
