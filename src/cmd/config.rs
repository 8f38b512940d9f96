//! Configuration view and validation commands: `worklog config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use worklog::config::{CONFIG_FILE_NAME, WorklogConfig};

    let config_path = project_dir.join(CONFIG_FILE_NAME);

    match command {
        None | Some(ConfigCommands::Show) => {
            if config_path.exists() {
                println!("# Config file: {}", config_path.display());
            } else {
                println!("# No {} found; showing defaults", CONFIG_FILE_NAME);
            }
            println!("# Effective values (with WORKLOG_* overrides):");
            println!();
            let config = WorklogConfig::load_or_default(project_dir)?.apply_env();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Some(ConfigCommands::Validate) => {
            if !config_path.exists() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE_NAME);
                return Ok(());
            }

            let config = WorklogConfig::load(&config_path)?.apply_env();
            let problems = config.validate();

            if problems.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration problems:");
                for problem in &problems {
                    println!("  - {}", problem);
                }
                anyhow::bail!("{} configuration problem(s)", problems.len());
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists at {}", CONFIG_FILE_NAME, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            WorklogConfig::default().save(&config_path)?;
            println!("Created {} at {}", CONFIG_FILE_NAME, config_path.display());
        }
    }

    Ok(())
}
