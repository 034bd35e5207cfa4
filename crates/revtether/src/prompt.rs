//! Terminal prompts for the session's confirmation and interface choice.

use async_trait::async_trait;
use dialoguer::{Confirm, Select};
use indicatif::ProgressBar;

use revtether_core::{Approver, CoreError, InterfaceCandidate};

/// Asks on the terminal, or auto-approves with `--yes`.
///
/// Prompts block, so they run on the blocking pool with the spinner
/// suspended.
#[derive(Debug, Clone)]
pub struct TerminalApprover {
    assume_yes: bool,
    progress: Option<ProgressBar>,
}

impl TerminalApprover {
    pub fn new(assume_yes: bool, progress: Option<ProgressBar>) -> Self {
        Self {
            assume_yes,
            progress,
        }
    }

    async fn blocking<T, F>(&self, prompt: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, dialoguer::Error> + Send + 'static,
    {
        let progress = self.progress.clone();
        let answer = tokio::task::spawn_blocking(move || match progress {
            Some(bar) => bar.suspend(prompt),
            None => prompt(),
        })
        .await
        .map_err(|e| CoreError::Internal(format!("prompt task failed: {e}")))?;

        answer.map_err(|e| CoreError::Rejected {
            message: format!("prompt failed: {e}"),
        })
    }
}

#[async_trait]
impl Approver for TerminalApprover {
    async fn confirm(&self, message: &str) -> Result<bool, CoreError> {
        if self.assume_yes {
            return Ok(true);
        }
        let message = message.to_owned();
        self.blocking(move || {
            Confirm::new()
                .with_prompt(message)
                .default(false)
                .interact()
        })
        .await
    }

    /// `--yes` never guesses an interface; the caller gets `None` and
    /// reports the ambiguity.
    async fn choose_interface(
        &self,
        candidates: &[InterfaceCandidate],
    ) -> Result<Option<String>, CoreError> {
        if self.assume_yes || candidates.is_empty() {
            return Ok(None);
        }
        let names: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();
        let items: Vec<String> = candidates.iter().map(ToString::to_string).collect();

        let picked = self
            .blocking(move || {
                Select::new()
                    .with_prompt("Several interfaces could be the tether; which one?")
                    .items(&items)
                    .default(0)
                    .interact_opt()
            })
            .await?;

        Ok(picked.and_then(|index| names.get(index).cloned()))
    }
}
