use anyhow::Result;
use async_trait::async_trait;

/// Whoever drives the wizard: the terminal in the CLI, a script in tests.
///
/// The wizard itself only ever calls [`UserInteraction::confirm`]; the rest is
/// shared vocabulary for the presentation layer.
#[async_trait]
pub trait UserInteraction: Send + Sync {
    /// Yes/no question. `false` abandons the action that asked.
    async fn confirm(&self, prompt: &str) -> Result<bool>;

    async fn ask_text(&self, prompt: &str) -> Result<String>;

    /// Returns an index into `options`.
    async fn choose(&self, prompt: &str, options: &[String]) -> Result<usize>;

    /// A slow call (upload, analysis) started; `label` says which.
    fn busy(&self, label: &str);

    /// The last `busy` call finished.
    fn idle(&self);

    fn notify(&self, msg: &str);

    fn warn(&self, msg: &str);
}

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Answers confirmations from a queue and remembers every question asked.
    #[derive(Default, Clone)]
    pub struct ScriptedInteraction {
        answers: Arc<Mutex<VecDeque<bool>>>,
        asked: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedInteraction {
        pub fn new() -> Self {
            Self::default()
        }

        /// Once the queue runs dry every confirmation is accepted.
        pub fn answer_next(&self, accept: bool) {
            self.answers.lock().unwrap().push_back(accept);
        }

        pub fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UserInteraction for ScriptedInteraction {
        async fn confirm(&self, prompt: &str) -> Result<bool> {
            self.asked.lock().unwrap().push(prompt.to_string());
            let answer = self.answers.lock().unwrap().pop_front();
            Ok(answer.unwrap_or(true))
        }

        async fn ask_text(&self, prompt: &str) -> Result<String> {
            anyhow::bail!("no scripted text answer for '{}'", prompt)
        }

        async fn choose(&self, _prompt: &str, options: &[String]) -> Result<usize> {
            if options.is_empty() {
                anyhow::bail!("nothing to choose from");
            }
            Ok(0)
        }

        fn busy(&self, _label: &str) {}
        fn idle(&self) {}
        fn notify(&self, _msg: &str) {}
        fn warn(&self, _msg: &str) {}
    }
}
