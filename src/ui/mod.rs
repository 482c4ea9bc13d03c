//! Terminal output for the CLI
//!
//! Uses `cliclack` in an interactive terminal and falls back to plain
//! bracketed lines (`[OK]`, `[WARN]`, ...) when output is piped or in CI.

mod output;
mod progress;

pub use output::{
    intro, key_value, outro_success, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;

use crate::error::{AgentError, AgentResult};
use std::io::IsTerminal;

/// Environment variables set by common CI systems
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Whether output may use spinners and prompts
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        let tty = std::io::stdout().is_terminal() && std::io::stdin().is_terminal();
        let ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            interactive: tty && !ci,
            auto_yes: false,
        }
    }

    /// Plain output, no prompts
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    /// Approve confirmations without asking
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }
}

/// Ask a yes/no question. Returns `default` when no one can answer.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> AgentResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| AgentError::User(format!("Prompt task failed: {}", e)))?
    .map_err(|e| AgentError::User(format!("Prompt failed: {}", e)))
}
