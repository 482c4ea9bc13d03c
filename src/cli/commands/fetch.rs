//! Fetch command - send one request through the agent

use super::AgentContext;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{AgentError, AgentResult};
use crate::request::{Request, ResponseKind};
use crate::ui::{self, UiContext};
use tokio::fs;
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> AgentResult<()> {
    let ctx = UiContext::detect();
    let agent = AgentContext::resume(config).await?;

    let url = config.network.resolve(&args.target)?;
    let destination = args.destination_for(url.path());
    let request = args.headers.iter().fold(
        Request::get(url)
            .with_method(args.method.clone())
            .with_destination(destination),
        |request, (name, value)| request.with_header(name.as_str(), value.as_str()),
    );

    debug!(
        "Dispatching {} {} ({}) to {} agent",
        request.method,
        request.url,
        destination.as_str(),
        agent.host.state()
    );
    let response = agent.host.fetch(&request).await;

    // Cache writes started by the agent must land before the process exits
    agent.host.settle().await;
    let response = response?;

    if response.kind == ResponseKind::Error {
        return Err(AgentError::network(
            request.url.as_str(),
            "no response could be produced",
        ));
    }

    ui::key_value(&ctx, "status", &response.status.to_string());
    ui::key_value(&ctx, "type", &response.kind.to_string());
    ui::key_value(&ctx, "bytes", &response.body.len().to_string());
    if let Some(content_type) = response.header("content-type") {
        ui::key_value(&ctx, "content-type", content_type);
    }

    if let Some(path) = &args.output {
        fs::write(path, &response.body)
            .await
            .map_err(|e| AgentError::io(format!("writing {}", path.display()), e))?;
        ui::step_ok_detail(&ctx, "Body written", &path.display().to_string());
    }

    Ok(())
}
