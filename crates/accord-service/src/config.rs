//! Service configuration

use crate::error::{ServiceError, ServiceResult};
use accord_core::{CompliancePolicyConfig, OrchestratorConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// JSON files under `data_dir`.
    #[default]
    File,
    Memory,
}

impl StorageBackend {
    pub fn name(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Configuration for `accordd`, read from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen: SocketAddr,
    pub storage: StorageBackend,
    pub data_dir: PathBuf,

    /// Retrieval service base url. Without one, records come from `fixtures_path`.
    pub extraction_url: Option<String>,

    /// Compliance service base url. Without one, the built-in rule engine decides.
    pub compliance_url: Option<String>,

    pub fixtures_path: Option<PathBuf>,
    pub orchestrator: OrchestratorConfig,
    pub policy: CompliancePolicyConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8094)),
            storage: StorageBackend::File,
            data_dir: PathBuf::from("accord/data"),
            extraction_url: None,
            compliance_url: None,
            fixtures_path: None,
            orchestrator: OrchestratorConfig::default(),
            policy: CompliancePolicyConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from file; a missing file yields the defaults.
    pub fn load(path: &Path) -> ServiceResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> ServiceResult<Self> {
        toml::from_str(contents).map_err(|e| ServiceError::Config(e.to_string()))
    }
}
