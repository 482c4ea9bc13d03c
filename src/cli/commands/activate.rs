//! Activate command - take control and delete stale generations

use super::AgentContext;
use crate::agent::ActivationReport;
use crate::config::Config;
use crate::error::AgentResult;
use crate::host::LifecycleState;
use crate::ui::{self, UiContext};

/// Execute the activate command
pub async fn execute(config: &Config) -> AgentResult<()> {
    let ctx = UiContext::detect();
    let mut agent = AgentContext::resume(config).await?;

    if agent.host.state() == LifecycleState::Active {
        ui::step_info(
            &ctx,
            &format!("Agent for {} is already active", config.agent.generation),
        );
        let report = agent.host.cleanup().await?;
        print_report(&ctx, &report);
        return Ok(());
    }

    let result = agent.host.activate().await;
    if agent.host.state() != LifecycleState::Unregistered {
        agent.save().await?;
    }
    let report = result?;

    print_report(&ctx, &report);
    ui::outro_success(
        &ctx,
        &format!("Agent active for {}", config.agent.generation),
    );

    Ok(())
}

fn print_report(ctx: &UiContext, report: &ActivationReport) {
    for name in &report.deleted {
        ui::step_ok(ctx, &format!("Deleted old cache {}", name));
    }
    for name in &report.failed {
        ui::step_warn_hint(
            ctx,
            &format!("Could not delete {}", name),
            "Run `shellcache activate` again to retry",
        );
    }
}
