//! Message command - deliver a page message to the agent

use super::AgentContext;
use crate::cli::args::MessageArgs;
use crate::config::Config;
use crate::error::AgentResult;
use crate::host::LifecycleState;
use crate::ui::{self, UiContext};

/// Execute the message command
pub async fn execute(args: MessageArgs, config: &Config) -> AgentResult<()> {
    let ctx = UiContext::detect();
    let mut agent = AgentContext::resume(config).await?;
    let before = agent.host.state();

    let state = agent.host.message(&args.payload).await?;
    if state != before {
        agent.save().await?;
    }

    match state {
        LifecycleState::Active if before != LifecycleState::Active => {
            ui::outro_success(&ctx, "Agent activated")
        }
        _ => ui::step_info(&ctx, &format!("Message delivered, agent {}", state)),
    }

    Ok(())
}
