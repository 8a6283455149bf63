use anyhow::Result;
use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::AppConfig;

const APP_NAME: &str = "TagLogCurator";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("io", "taglog", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

/// Loads the application configuration from the config file.
/// If the file doesn't exist, it creates a default one.
/// If the file is corrupted or cannot be parsed, it logs a warning
/// and falls back to the default configuration to prevent a crash.
///
/// `override_path` points at an alternative config file, used by tests.
pub fn load_config(override_path: Option<&Path>) -> Result<AppConfig> {
    let config_path = match override_path {
        Some(path) => path.to_path_buf(),
        None => get_config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?,
    };

    if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = AppConfig::default();
        save_config(&default_config, override_path)?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path)?;

    match serde_json::from_str::<AppConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", config_path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Falling back to default config.",
                config_path,
                e
            );
            fill_missing_fields(&config_content).or_else(|_| Ok(AppConfig::default()))
        }
    }
}

/// Re-parses a config written by an older release, inserting defaults for
/// fields that did not exist yet.
fn fill_missing_fields(config_content: &str) -> Result<AppConfig> {
    let mut value: Value = serde_json::from_str(config_content)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Config is not a JSON object"))?;

    let defaults = AppConfig::default();

    let ensure_field = |obj: &mut serde_json::Map<String, Value>, key: &str, default_val: Value| {
        if !obj.contains_key(key) || obj.get(key) == Some(&Value::Null) {
            obj.insert(key.to_string(), default_val);
        }
    };

    ensure_field(obj, "min_count", serde_json::to_value(defaults.min_count)?);
    ensure_field(obj, "case_insensitive", Value::Bool(defaults.case_insensitive));
    ensure_field(obj, "sort_lines", Value::Bool(defaults.sort_lines));
    ensure_field(
        obj,
        "banned_export_filename",
        serde_json::to_value(&defaults.banned_export_filename)?,
    );

    let migrated_config: AppConfig = serde_json::from_value(Value::Object(obj.clone()))?;
    tracing::info!("Successfully migrated legacy config");
    Ok(migrated_config)
}

/// Saves the provided configuration to the config file.
pub fn save_config(config: &AppConfig, override_path: Option<&Path>) -> Result<()> {
    let config_path = match override_path {
        Some(path) => path.to_path_buf(),
        None => {
            let config_dir = get_config_directory()
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
            if !config_dir.exists() {
                fs::create_dir_all(&config_dir)?;
                tracing::info!("Created config directory: {:?}", config_dir);
            }
            config_dir.join(CONFIG_FILE)
        }
    };

    let config_json = serde_json::to_string_pretty(config)?;

    fs::write(&config_path, config_json)?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

/// Exports the current configuration to a user-specified JSON file.
pub fn export_config(config: &AppConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Imports an application configuration from a user-specified JSON file.
pub fn import_config(import_path: &Path) -> Result<AppConfig> {
    let config_content = fs::read_to_string(import_path)?;
    match serde_json::from_str::<AppConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Imported config from {:?}", import_path);
            Ok(config)
        }
        Err(_) => {
            tracing::info!("Importing legacy config format from {:?}", import_path);
            fill_missing_fields(&config_content)
        }
    }
}
