use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::AriseConfig;

pub const CONFIG_FILE_NAME: &str = "opencode-arise.json";

/// Directory holding the user-level OpenCode configuration.
pub fn opencode_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".config").join("opencode"))
}

/// Global config file path (`~/.config/opencode/opencode-arise.json`).
pub fn global_config_path() -> Option<PathBuf> {
    opencode_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Project-local config file path (`./.opencode/opencode-arise.json`).
pub fn project_config_path() -> PathBuf {
    PathBuf::from(".opencode").join(CONFIG_FILE_NAME)
}

/// Load the effective configuration: defaults, overlaid by the global
/// file, overlaid by the project-local file. Nearest layer wins per field.
///
/// Missing files are fine. A file that fails to read or parse is skipped
/// with a warning rather than aborting, so a broken project config never
/// takes the whole plugin down. `ARISE_SERVER_URL` overrides the server
/// URL last.
pub fn load_config() -> AriseConfig {
    let mut paths = Vec::new();
    if let Some(global) = global_config_path() {
        paths.push(global);
    }
    paths.push(project_config_path());

    let mut config = load_config_from_paths(&paths);

    if let Ok(url) = std::env::var("ARISE_SERVER_URL") {
        if !url.is_empty() {
            config.server.base_url = url;
        }
    }

    config
}

/// Merge the given config files over the defaults, in order.
pub fn load_config_from_paths(paths: &[PathBuf]) -> AriseConfig {
    let mut merged = serde_json::Value::Object(serde_json::Map::new());

    for path in paths {
        match read_layer(path) {
            Ok(Some(layer)) => merge_values(&mut merged, layer),
            Ok(None) => {}
            Err(err) => warn!("ignoring config '{}': {err:#}", path.display()),
        }
    }

    match serde_json::from_value(merged) {
        Ok(config) => config,
        Err(err) => {
            warn!("config did not match the expected shape, using defaults: {err}");
            AriseConfig::default()
        }
    }
}

fn read_layer(path: &Path) -> Result<Option<serde_json::Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config '{}'", path.display()))?;
    Ok(Some(value))
}

/// Recursive field-level merge: objects merge key by key, everything else
/// is replaced by the overlay.
fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Save configuration to a JSON file, creating parent directories.
pub fn save_config(path: &Path, config: &AriseConfig) -> Result<()> {
    let contents = serde_json::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create config directory '{}'",
                parent.to_string_lossy()
            )
        })?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config '{}'", path.display()))?;
    Ok(())
}
