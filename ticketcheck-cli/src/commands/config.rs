//! `ticketcheck config validate|generate`

use anyhow::{anyhow, Context, Result};
use colored::*;
use std::fs;
use std::path::Path;
use ticketcheck_config::{ConfigLoader, TicketcheckConfig};
use tracing::{error, info};

/// Handle configuration validation
pub fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow!("Configuration file not found: {:?}", config_file));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(config) => {
            let resolved = config.target.resolve_strategy();
            println!("{} Configuration file is valid", "✓".bright_green().bold());
            if resolved.fell_back {
                println!(
                    "{} Unknown strategy {:?}, runs will use {}",
                    "!".bright_yellow().bold(),
                    resolved.requested.unwrap_or_default(),
                    resolved.strategy
                );
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Configuration validation failed: {}", "✗".bright_red().bold(), e);
            error!("Configuration validation failed: {}", e);
            Err(e).context(format!("Invalid configuration in {:?}", config_file))
        }
    }
}

/// YAML for a built-in scenario, or the plain defaults
pub fn render_config(scenario: Option<&str>) -> Result<String> {
    match scenario {
        Some(name) => {
            let config = TicketcheckConfig::scenario(name)?;
            serde_yaml::to_string(&config).context("Failed to serialize configuration")
        }
        None => Ok(TicketcheckConfig::generate_sample()),
    }
}

/// Handle configuration generation
pub fn handle_config_generate(scenario: Option<&str>, output: &Path, force: bool) -> Result<()> {
    info!(
        "Generating {} configuration at: {:?}",
        scenario.unwrap_or("default"),
        output
    );

    if output.exists() && !force {
        return Err(anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    let content = render_config(scenario)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, content).context("Failed to write configuration file")?;

    println!(
        "{} Configuration generated at: {:?}",
        "✓".bright_green().bold(),
        output
    );
    println!(
        "  Validate with: ticketcheck config validate --config-file {:?}",
        output
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs").join("kafka.yaml");

        handle_config_generate(Some("kafka"), &path, false).unwrap();
        handle_config_validate(&path).unwrap();

        let loaded = ConfigLoader::new().from_file(&path).unwrap();
        assert_eq!(loaded.target.strategy.as_deref(), Some("queued-async"));
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticketcheck.yaml");
        fs::write(&path, "keep me").unwrap();

        assert!(handle_config_generate(None, &path, false).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");

        handle_config_generate(None, &path, true).unwrap();
        assert!(ConfigLoader::new().from_file(&path).is_ok());
    }

    #[test]
    fn test_unknown_scenario() {
        let err = render_config(Some("spinlock")).unwrap_err();
        assert!(err.to_string().contains("spinlock"));
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(handle_config_validate(&dir.path().join("absent.yaml")).is_err());
    }
}
