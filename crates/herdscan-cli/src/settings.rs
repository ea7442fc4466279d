//! Layered CLI settings
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. `herdscan.yaml` in the working directory, or the file given by `--config`
//! 3. `HERDSCAN__*` environment variables (e.g. `HERDSCAN__STORE`)
//! 4. command-line flags

use crate::cli::Cli;
use herdscan_telemetry::DEFAULT_SCAN_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "HERDSCAN";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Model registry YAML
    #[serde(default = "default_models")]
    pub models: PathBuf,

    /// Scan record file
    #[serde(default = "default_store")]
    pub store: PathBuf,

    #[serde(default)]
    pub gate_model: Option<PathBuf>,

    #[serde(default)]
    pub diagnostic_model: Option<PathBuf>,

    /// Where Hugging Face downloads are cached
    #[serde(default)]
    pub model_cache_dir: Option<PathBuf>,

    #[serde(default = "default_scan_type")]
    pub scan_type: String,

    /// Requester recorded when `scan` is not given one
    #[serde(default = "default_requester")]
    pub requester: String,
}

fn default_models() -> PathBuf {
    PathBuf::from("models.yaml")
}

fn default_store() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("herdscan").join("scans.jsonl"))
        .unwrap_or_else(|| PathBuf::from("herdscan-scans.jsonl"))
}

fn default_scan_type() -> String {
    DEFAULT_SCAN_TYPE.to_string()
}

fn default_requester() -> String {
    "local".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            models: default_models(),
            store: default_store(),
            gate_model: None,
            diagnostic_model: None,
            model_cache_dir: None,
            scan_type: default_scan_type(),
            requester: default_requester(),
        }
    }
}

impl Settings {
    /// Load settings from the optional file and the process environment
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with_env(config_path, None)
    }

    /// Load settings, reading environment variables from `env` instead of the
    /// process when given
    pub fn load_with_env(
        config_path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> anyhow::Result<Self> {
        let file = match config_path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("herdscan").required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Apply command-line overrides
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(models) = &cli.models {
            self.models = models.clone();
        }
        if let Some(store) = &cli.store {
            self.store = store.clone();
        }
        if let Some(path) = &cli.gate_model {
            self.gate_model = Some(path.clone());
        }
        if let Some(path) = &cli.diagnostic_model {
            self.diagnostic_model = Some(path.clone());
        }
    }
}
