use medgate_authz::AuthzConfig;
use serde::{Deserialize, Serialize};

/// Tool configuration: logging plus the `[authz]` section shared with the
/// services embedding the engine.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub authz: AuthzConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        self.authz.validate().map_err(|e| e.to_string())
    }
}

pub mod loader {
    use super::AppConfig;
    use anyhow::{Context, Result, bail};
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    const DEFAULT_PATH: &str = "medgate.toml";

    /// Load configuration from `path` (or `./medgate.toml` when present),
    /// then apply `MEDGATE__SECTION__KEY` environment overrides.
    pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
        load_config_with_env(path, environment())
    }

    fn environment() -> Environment {
        // e.g. MEDGATE__AUTHZ__REQUIRE_ALL_ROLES=false
        Environment::with_prefix("MEDGATE")
            .try_parsing(true)
            .separator("__")
    }

    pub(crate) fn load_config_with_env(path: Option<&Path>, env: Environment) -> Result<AppConfig> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                if !p.exists() {
                    bail!("config file {} does not exist", p.display());
                }
                builder = builder.add_source(File::from(p.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_PATH);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(env);

        let merged: AppConfig = builder
            .build()
            .context("config build error")?
            .try_deserialize()
            .context("config deserialize error")?;
        merged
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        Ok(merged)
    }
}
