use anyhow::{Context, Result};
use apollo_engine::interaction::UserInteraction;
use async_trait::async_trait;
use console::style;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct CliInteraction {
    assume_yes: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliInteraction {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            spinner: Mutex::new(None),
        }
    }

    fn spinner(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.spinner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserInteraction for CliInteraction {
    async fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    }

    async fn ask_text(&self, prompt: &str) -> Result<String> {
        let input = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .interact_text()?;
        Ok(input)
    }

    async fn choose(&self, prompt: &str, options: &[String]) -> Result<usize> {
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact()?;
        Ok(selection)
    }

    fn busy(&self, label: &str) {
        debug!(label, "Waiting on backend");
        let spinner = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}") {
            spinner.set_style(template);
        }
        spinner.set_message(label.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        if let Some(previous) = self.spinner().replace(spinner) {
            previous.finish_and_clear();
        }
    }

    fn idle(&self) {
        if let Some(spinner) = self.spinner().take() {
            spinner.finish_and_clear();
        }
    }

    fn notify(&self, msg: &str) {
        info!("{}", msg);
        println!("{}", style(msg).green());
    }

    fn warn(&self, msg: &str) {
        warn!("{}", msg);
        println!("{}", style(msg).red());
    }
}
