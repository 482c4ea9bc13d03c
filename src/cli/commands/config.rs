//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{AgentError, AgentResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> AgentResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let mut updated = config.clone();
            set_value(&mut updated, &key, &value)?;
            updated.validate().map_err(|reason| AgentError::ConfigInvalid {
                path: manager.path().to_path_buf(),
                reason,
            })?;
            manager.save(&updated).await?;
            ui::step_ok(&UiContext::detect(), &format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> AgentResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> AgentResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(
        &ctx,
        "Configuration initialized",
        &path.display().to_string(),
    );

    Ok(())
}

/// Apply one dot-separated key to a config
fn set_value(config: &mut Config, key: &str, value: &str) -> AgentResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => config.general.log_format = value.to_string(),

        ["agent", "generation"] => config.agent.generation = value.to_string(),
        ["agent", "shell_manifest"] => config.agent.shell_manifest = parse_list(value),
        ["agent", "bypass_prefixes"] => config.agent.bypass_prefixes = parse_list(value),
        ["agent", "offline_document"] => config.agent.offline_document = value.to_string(),

        ["network", "origin"] => config.network.origin = value.to_string(),
        ["network", "timeout_secs"] => config.network.timeout_secs = parse_number(value)?,
        ["network", "user_agent"] => config.network.user_agent = value.to_string(),
        ["network", "max_body_mb"] => config.network.max_body_mb = parse_number(value)?,

        ["storage", "dir"] => config.storage.dir = Some(PathBuf::from(value)),
        ["storage", "registration"] => config.storage.registration = Some(PathBuf::from(value)),

        _ => return Err(AgentError::User(format!("Unknown config key: {}", key))),
    }

    Ok(())
}

/// Comma-separated list, blanks dropped
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number<T: std::str::FromStr>(value: &str) -> AgentResult<T> {
    value
        .parse()
        .map_err(|_| AgentError::User(format!("Invalid number: {}", value)))
}
