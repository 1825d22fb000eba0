//! TOML configuration for the runner.
//!
//! Each typed section is read from its own table, `[client]`, `[plugin]`
//! and `[step]`. Missing sections fall back to their defaults.

use std::path::Path;

use anyhow::{Context, Result};
use atp_client::{ClientConfig, PluginConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

// ============================================================================
// Configurable Trait
// ============================================================================

/// Trait for types that can be loaded from a configuration section
pub trait Configurable: DeserializeOwned + Default {
    /// Section name in the TOML file
    const PREFIX: &'static str;
}

impl Configurable for ClientConfig {
    const PREFIX: &'static str = "client";
}

impl Configurable for PluginConfig {
    const PREFIX: &'static str = "plugin";
}

// ============================================================================
// Configuration Store
// ============================================================================

/// Typed sections of one TOML document
pub struct ConfigStore {
    data: toml::Table,
}

impl ConfigStore {
    pub fn parse(content: &str) -> Result<Self> {
        let data = content.parse::<toml::Table>().context("Failed to parse TOML")?;
        Ok(Self { data })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// Typed section, or its default when the section is missing
    pub fn get<C: Configurable>(&self) -> Result<C> {
        let Some(section) = self.data.get(C::PREFIX).cloned() else {
            debug!("Config section '{}' missing, using defaults", C::PREFIX);
            return Ok(C::default());
        };

        section
            .try_into()
            .with_context(|| format!("Failed to deserialize config section '{}'", C::PREFIX))
    }
}

// ============================================================================
// Step Section
// ============================================================================

/// The step to run and its input
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StepConfig {
    /// Step id; may be left out when the plugin has a single step
    #[serde(default)]
    pub id: Option<String>,

    /// Input data, checked against the step's input schema
    #[serde(default)]
    pub input: toml::Table,
}

impl Configurable for StepConfig {
    const PREFIX: &'static str = "step";
}

impl StepConfig {
    pub fn input_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.input).context("Failed to convert step input")
    }
}
