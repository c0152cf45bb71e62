use std::path::{Path, PathBuf};

use crate::config::schema::{CommandTemplate, Config};
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = serde_json::from_str(content)?;

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Applies `LABELPOOL_*` and `PDF_*` environment overrides on top of the
/// parsed file.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Some(path) = env_value("LABELPOOL_DATABASE_PATH") {
        config.database_path = Some(PathBuf::from(path));
    }
    if let Some(path) = env_value("LABELPOOL_STORAGE_ROOT") {
        config.storage_root = Some(PathBuf::from(path));
    }
    if let Some(raw) = env_value("PDF_WORKER_TIMEOUT_MS") {
        config.worker.timeout_ms = raw.parse().map_err(|_| ConfigError::InvalidOverride {
            var: "PDF_WORKER_TIMEOUT_MS".to_string(),
            value: raw.clone(),
        })?;
    }
    if let Some(raw) = env_value("PDF_RENDER_SCALE") {
        config.worker.render_scale = raw.parse().map_err(|_| ConfigError::InvalidOverride {
            var: "PDF_RENDER_SCALE".to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let worker = &config.worker;
    if worker.timeout_ms == 0 {
        return Err(ConfigError::Validation {
            message: "worker.timeout_ms must be greater than zero".to_string(),
        });
    }
    if !worker.render_scale.is_finite() || worker.render_scale <= 0.0 {
        return Err(ConfigError::Validation {
            message: format!(
                "worker.render_scale must be a positive number, got {}",
                worker.render_scale
            ),
        });
    }
    if worker.concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "worker.concurrency must be at least 1".to_string(),
        });
    }

    validate_command("text_command", &worker.text_command, &["{input}"])?;
    validate_command(
        "render_command",
        &worker.render_command,
        &["{input}", "{output}"],
    )?;

    if config.pool.retention_days == 0 {
        return Err(ConfigError::Validation {
            message: "pool.retention_days must be at least 1".to_string(),
        });
    }

    Ok(())
}

fn validate_command(
    name: &str,
    command: &CommandTemplate,
    required: &[&str],
) -> Result<(), ConfigError> {
    if command.program.trim().is_empty() {
        return Err(ConfigError::InvalidCommand {
            name: name.to_string(),
            reason: "program must not be empty".to_string(),
        });
    }
    for placeholder in required {
        if !command.uses_placeholder(placeholder) {
            return Err(ConfigError::InvalidCommand {
                name: name.to_string(),
                reason: format!("args must reference {}", placeholder),
            });
        }
    }
    Ok(())
}
