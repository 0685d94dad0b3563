//! Optional provider overrides file
//!
//! ```toml
//! disabled = ["books/gale"]
//!
//! [[provider]]
//! name = "springer"
//! category = "books"
//! endpoint = "https://sushi.springernature.com/reports/tr_b1"
//!
//! [provider.params]
//! platform = "springerlink"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::providers::{Category, ProviderCatalog, ProviderSpec};

const CONFIG_DIR: &str = "sushi-stats";
const CONFIG_FILE: &str = "providers.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid disabled entry {0:?}, expected <category>/<name>")]
    InvalidDisabled(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default, rename = "provider")]
    pub providers: Vec<ProviderConfig>,
    /// `<category>/<name>` entries removed from the catalogue
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub category: Category,
    pub endpoint: String,
    pub requestor_id_env: Option<String>,
    pub customer_id_env: Option<String>,
    /// Extra credential parameters, query name to environment key
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
    /// Extra literal query parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn to_spec(&self) -> ProviderSpec {
        let prefix = env_prefix(&self.name);
        let requestor_key = self
            .requestor_id_env
            .clone()
            .unwrap_or_else(|| format!("{prefix}_REQUESTOR_ID"));
        let customer_key = self
            .customer_id_env
            .clone()
            .unwrap_or_else(|| format!("{prefix}_CUSTOMER_ID"));

        let mut spec = ProviderSpec::new(self.name.clone(), self.category, self.endpoint.clone())
            .credential("requestor_id", requestor_key)
            .credential("customer_id", customer_key);
        for (name, key) in &self.credentials {
            spec = spec.credential(name.clone(), key.clone());
        }
        for (name, value) in &self.params {
            spec = spec.literal(name.clone(), value.clone());
        }
        spec
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load `path`, or the default file when no path is given.
    ///
    /// A missing default file is an empty config; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            "Loaded {} provider override(s) from {}",
            config.providers.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merge overrides into `catalog`, then drop disabled providers
    pub fn apply(&self, catalog: &mut ProviderCatalog) -> Result<(), ConfigError> {
        for provider in &self.providers {
            catalog.upsert(provider.to_spec());
        }

        for entry in &self.disabled {
            let (category, name) = entry
                .split_once('/')
                .ok_or_else(|| ConfigError::InvalidDisabled(entry.clone()))?;
            let category: Category = category
                .parse()
                .map_err(|_| ConfigError::InvalidDisabled(entry.clone()))?;
            if !catalog.remove(category, name.trim()) {
                tracing::warn!("Disabled provider {} is not in the catalogue", entry);
            }
        }
        Ok(())
    }
}

/// `alexander-street` -> `ALEXANDER_STREET`
fn env_prefix(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
