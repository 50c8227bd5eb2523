//! Configuration loading and representation.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use bakehouse_observability::LogConfig;
use bakehouse_validation::ValidationConfig;

pub const ENV_POSTAL_REGIONS: &str = "BAKEHOUSE_POSTAL_REGIONS";
pub const ENV_TAX_CHECKSUMS: &str = "BAKEHOUSE_TAX_CHECKSUMS";
pub const ENV_LOG: &str = "BAKEHOUSE_LOG";

/// Process configuration: which validation predicates are active and how
/// logs are emitted. Every field has a default, so `{}` is a valid document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakehouseConfig {
    pub validation: ValidationConfig,
    pub logging: LogConfig,
}

impl BakehouseConfig {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("parsing bakehouse configuration")
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// Apply `BAKEHOUSE_*` environment variables on top of this configuration.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source.
    ///
    /// - `BAKEHOUSE_POSTAL_REGIONS`: allowed first digits, e.g. `"5,6"` or `"56"`
    /// - `BAKEHOUSE_TAX_CHECKSUMS`: `true`/`false`/`1`/`0`
    /// - `BAKEHOUSE_LOG`: tracing filter directive
    ///
    /// Values that do not parse are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(ENV_POSTAL_REGIONS) {
            let regions: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
            if !regions.is_empty() {
                self.validation.postal_regions = regions;
            }
        }
        if let Some(flag) = lookup(ENV_TAX_CHECKSUMS).as_deref().and_then(parse_flag) {
            self.validation.tax_checksums = flag;
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|f| !f.trim().is_empty()) {
            self.logging.filter = filter;
        }
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
