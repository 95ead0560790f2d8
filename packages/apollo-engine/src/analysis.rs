use crate::api::AnalysisBackend;
use crate::domain::types::{AnalysisResult, Priority, ProjectMeta, Question, UploadedFile};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_ANALYSIS_DELAY: Duration = Duration::from_secs(3);

/// Produces the question-generation result for a project's documents.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, files: &[UploadedFile], meta: &ProjectMeta) -> Result<AnalysisResult>;
}

#[async_trait]
impl<T: AnalysisProvider + ?Sized> AnalysisProvider for Box<T> {
    async fn analyze(&self, files: &[UploadedFile], meta: &ProjectMeta) -> Result<AnalysisResult> {
        (**self).analyze(files, meta).await
    }
}

/// Deterministic stand-in: waits a fixed delay and returns the canned analysis.
#[derive(Debug, Clone)]
pub struct MockAnalysisProvider {
    pub delay: Duration,
}

impl MockAnalysisProvider {
    pub fn new() -> Self {
        Self {
            delay: DEFAULT_ANALYSIS_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for MockAnalysisProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisProvider for MockAnalysisProvider {
    async fn analyze(&self, files: &[UploadedFile], meta: &ProjectMeta) -> Result<AnalysisResult> {
        info!(project = %meta.name, files = files.len(), "Simulating document analysis");
        tokio::time::sleep(self.delay).await;
        Ok(canned_analysis(meta, files.len()))
    }
}

/// Delegates to the backend's `/ai/analyze` endpoint.
#[derive(Clone)]
pub struct RemoteAnalysisProvider<B: AnalysisBackend> {
    backend: B,
}

impl<B: AnalysisBackend> RemoteAnalysisProvider<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: AnalysisBackend> AnalysisProvider for RemoteAnalysisProvider<B> {
    async fn analyze(&self, files: &[UploadedFile], meta: &ProjectMeta) -> Result<AnalysisResult> {
        Ok(self.backend.analyze_documents(meta, files).await?)
    }
}

pub fn canned_analysis(meta: &ProjectMeta, file_count: usize) -> AnalysisResult {
    let question = |id, category: &str, text: &str, priority, context: &str| Question {
        id,
        category: category.to_string(),
        question: text.to_string(),
        priority,
        context: context.to_string(),
    };

    AnalysisResult {
        summary: format!(
            "Analysis completed for project \"{}\". {} relevant documents were identified, \
             providing information on requirements, scope and project objectives.",
            meta.name, file_count
        ),
        questions: vec![
            question(
                1,
                "Functional Requirements",
                "What are the main modules the system must contain?",
                Priority::High,
                "The documents point to a need to better define the modular architecture.",
            ),
            question(
                2,
                "Integration",
                "Does the system need to integrate with existing systems? If so, which ones?",
                Priority::High,
                "Needed to guarantee compatibility and a proper data flow.",
            ),
            question(
                3,
                "Users",
                "How many concurrent users must the system support?",
                Priority::Medium,
                "Important for sizing the infrastructure.",
            ),
            question(
                4,
                "Security",
                "What are the security and compliance requirements?",
                Priority::High,
                "Considering security practices for commercial systems.",
            ),
            question(
                5,
                "Technology",
                "Is there any specific technology preference or restriction?",
                Priority::Medium,
                "To align with the company's existing technology environment.",
            ),
        ],
        insights: vec![
            "Well structured project with clear objectives".to_string(),
            "Documentation provides a good basis for development".to_string(),
            "Opportunities for process optimization identified".to_string(),
        ],
        next_steps: vec![
            "Wait for answers to the critical questions".to_string(),
            "Define the detailed technical architecture".to_string(),
            "Draw up the development schedule".to_string(),
        ],
    }
}
