use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create the global config instead of a project config"
        )]
        global: bool,
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Show configuration file paths")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(),
    }
}

fn handle_init(global: bool, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let config_path = if global {
        Config::config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?
    } else {
        Config::project_config_path()
    };

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create config directory")?;
    }

    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(&config_path, content).context("failed to write config")?;

    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", config_path.display()))
    );

    Ok(())
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let config = masked(Config::load()?);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let project = Config::project_config_path();
    if project.exists() {
        println!("# Project config: {}", project.display());
    }
    if let Some(path) = Config::config_path()
        && path.exists()
    {
        println!("# Global config: {}", path.display());
    }
    println!();

    print!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}

/// API keys never reach stdout.
fn masked(mut config: Config) -> Config {
    if config.extraction.api_key.is_some() {
        config.extraction.api_key = Some("********".to_string());
    }
    if config.vector_index.api_key.is_some() {
        config.vector_index.api_key = Some("********".to_string());
    }
    config
}

fn handle_path() -> Result<()> {
    println!("Configuration paths:");
    println!();

    let project = Config::project_config_path();
    if project.exists() {
        println!("Project config (active): {}", project.display());
    } else {
        println!("Project config (would be): {}", project.display());
    }

    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("Global config (active): {}", path.display());
        } else {
            println!("Global config (would be): {}", path.display());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        if env_path.exists() {
            println!(".env file (active): {}", env_path.display());
        }
    }

    Ok(())
}
