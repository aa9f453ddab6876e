//! Engine configuration.
//!
//! Every section has a `Default` so an empty TOML file (or no file at
//! all) yields a working engine. The emergency-indicator list and the
//! routing table are static configuration consumed at startup;
//! [`EngineConfig::from_toml_str`] lets the embedding application
//! rebuild the engine from fresh configuration without a process
//! restart.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::citation::CitationConfig;
use crate::classify::ClassifierConfig;
use crate::compose::ComposeConfig;
use crate::enhance::EnhancerConfig;
use crate::gateway::GatewayConfig;
use crate::ranking::RankerConfig;
use crate::routing::RoutingTable;

/// Top-level configuration, one section per component
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub enhancer: EnhancerConfig,
    #[serde(default)]
    pub routing: RoutingTable,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub ranker: RankerConfig,
    #[serde(default)]
    pub citation: CitationConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file, creating it with defaults if
    /// it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = EngineConfig::default();
            config.save(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }
}
