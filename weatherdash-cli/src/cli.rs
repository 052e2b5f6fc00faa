use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomUserError, Password, PasswordDisplayMode, Text, validator::Validation};
use weatherdash_core::{Config, ProviderId, Units, provider_from_config};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Current weather for a city")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name: "openweather", "weatherapi" or "generic".
        provider: String,
    },

    /// Show current weather for a city.
    Show {
        /// City name, e.g. "London" or "New York".
        city: String,

        /// Provider to query instead of the configured default.
        #[arg(long)]
        provider: Option<String>,

        /// Unit system: metric, imperial or standard.
        #[arg(long)]
        units: Option<String>,

        /// Print the record as JSON instead of the dashboard.
        #[arg(long)]
        json: bool,
    },

    /// List supported providers and which ones are configured.
    Providers,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { city, provider, units, json } => {
                show(&city, provider.as_deref(), units.as_deref(), json).await
            }
            Command::Providers => providers(),
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_validator(non_empty)
        .prompt()
        .context("Failed to read API key")?;

    if id == ProviderId::Generic {
        let current = config
            .provider_config(id)
            .and_then(|p| p.base_url.clone())
            .unwrap_or_default();

        let base_url = Text::new("Endpoint URL:")
            .with_initial_value(&current)
            .with_help_message("Full URL of the current-weather endpoint")
            .prompt()
            .context("Failed to read endpoint URL")?;

        let base_url = base_url.trim();
        if base_url.is_empty() {
            bail!("The generic provider needs an endpoint URL.");
        }
        config.set_provider_base_url(id, base_url.to_string());
    }

    config.upsert_provider_api_key(id, api_key.trim().to_string());

    if config.default_provider_id().ok() != Some(id) {
        let make_default = Confirm::new(&format!("Make {id} the default provider?"))
            .with_default(false)
            .prompt()
            .context("Failed to read confirmation")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    let path = config.save()?;
    tracing::info!(provider = %id, path = %path.display(), "configuration saved");
    println!("Saved {id} configuration to {}", path.display());

    Ok(())
}

fn non_empty(input: &str) -> Result<Validation, CustomUserError> {
    if input.trim().is_empty() {
        Ok(Validation::Invalid("API key must not be empty".into()))
    } else {
        Ok(Validation::Valid)
    }
}

async fn show(
    city: &str,
    provider: Option<&str>,
    units: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    if let Some(units) = units {
        config.units = Units::try_from(units)?;
    }

    let id = match provider {
        Some(name) => ProviderId::try_from(name)?,
        None => config.default_provider_id()?,
    };

    let credential = config.credential_for(id, |name| std::env::var(name).ok())?;
    let provider = provider_from_config(id, &config)?;

    match provider.fetch(city, &credential).await {
        Ok(record) => {
            tracing::info!(provider = %id, city = %record.city, "weather retrieved");
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("{}", render::dashboard(&record));
            }
            Ok(())
        }
        Err(err) => {
            if let Some(diagnostic) = err.diagnostic() {
                tracing::warn!(provider = %id, %diagnostic, "weather fetch failed");
            }
            bail!(render::failure(&err))
        }
    }
}

fn providers() -> anyhow::Result<()> {
    let config = Config::load()?;
    let default = config.default_provider_id().ok();

    for id in ProviderId::all() {
        let status = if config.is_provider_configured(*id) { "configured" } else { "not configured" };
        let marker = if default == Some(*id) { " (default)" } else { "" };
        println!("{:<12} {status}{marker}", id.as_str());
    }

    Ok(())
}
