use crate::config::PublishConfig;
use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Loads a YAML config file, or returns defaults when no path is given.
/// Every field is optional in the file; unknown keys are rejected.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<PublishConfig> {
    let Some(path) = path else {
        info!("No config file given, using default PublishConfig");
        let config = PublishConfig::default();
        config.trace_loaded();
        return Ok(config);
    };
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: PublishConfig = match serde_yaml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    config.trace_loaded();
    Ok(config)
}
