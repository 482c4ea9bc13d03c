//! Install command - cache the shell for the current generation

use super::AgentContext;
use crate::cli::args::InstallArgs;
use crate::config::Config;
use crate::error::AgentResult;
use crate::host::LifecycleState;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> AgentResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "shellcache install");

    let mut agent = AgentContext::register(config, args.no_activate)?;
    let generation = &config.agent.generation;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!(
        "Caching {} shell file(s) into {}",
        config.agent.shell_manifest.len(),
        generation
    ));

    // A failed install leaves the previous registration untouched
    let state = match agent.host.install().await {
        Ok(state) => state,
        Err(e) => {
            spinner.stop_error("Install failed");
            return Err(e);
        }
    };
    spinner.stop(&format!("Installed {}", generation));

    agent.save().await?;

    for path in &config.agent.shell_manifest {
        ui::key_value(&ctx, "cached", path);
    }
    ui::key_value(&ctx, "origin", &config.network.origin);

    match state {
        LifecycleState::Active => ui::outro_success(&ctx, "Agent active"),
        _ => {
            ui::step_warn_hint(
                &ctx,
                &format!("Agent is {}", state),
                "Run: shellcache activate",
            );
        }
    }

    Ok(())
}
