//! User preferences persistence.
//!
//! Reads ownership entries, RTP ports and the executor command from
//! ~/.config/pathdiag/config.toml (or a file given with `--registry`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::lookup::{OwnershipEntry, OwnershipRegistry};
use crate::probe::CommandExecutor;

/// Program run when neither the command line nor the config names one
pub const DEFAULT_EXECUTOR: &str = "pathdiag-probe";

/// User preferences
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prefs {
    /// Known CIDR blocks, checked in order (first match wins)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ownership: Vec<OwnershipEntry>,
    /// UDP ports for the rtp-range scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp_ports: Option<Vec<u16>>,
    /// External traceroute backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<CommandExecutor>,
}

impl Prefs {
    /// Get config file path: ~/.config/pathdiag/config.toml
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pathdiag").join("config.toml"))
    }

    /// Load preferences from the default location (default if missing)
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load preferences from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn registry(&self) -> OwnershipRegistry {
        OwnershipRegistry::new(self.ownership.clone())
    }

    /// Executor to run: CLI program overrides the configured one
    pub fn command_executor(&self, program: Option<&str>) -> CommandExecutor {
        match (program, &self.executor) {
            (Some(program), _) => CommandExecutor::new(program),
            (None, Some(configured)) => configured.clone(),
            (None, None) => CommandExecutor::new(DEFAULT_EXECUTOR),
        }
    }
}
