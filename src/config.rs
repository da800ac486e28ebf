//! Configuration Management
//!
//! Persistent defaults for the `gcp-snippets` binary: project, zone, region,
//! Vertex AI location, organization and endpoint overrides.

use crate::gcp::client::Endpoints;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_ZONE: &str = "us-central1-a";
const DEFAULT_LOCATION: &str = "us-central1";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Default project ID
    #[serde(default)]
    pub project_id: Option<String>,
    /// Default Compute Engine zone
    #[serde(default)]
    pub zone: Option<String>,
    /// Default region; derived from the zone when unset
    #[serde(default)]
    pub region: Option<String>,
    /// Default location for Vertex AI, CA Service and regional parameters
    #[serde(default)]
    pub location: Option<String>,
    /// Organization used by Security Command Center
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Per-service base URL overrides
    #[serde(default)]
    pub endpoints: Option<Endpoints>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcp-snippets").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit path; a missing or unreadable file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective project (CLI > config > environment > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(crate::gcp::auth::get_default_project)
    }

    /// Get effective zone (CLI > config > environment > gcloud default)
    pub fn effective_zone(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.zone.clone())
            .or_else(crate::gcp::auth::get_default_zone)
            .unwrap_or_else(|| DEFAULT_ZONE.to_string())
    }

    /// Configured region, else the region of `zone`
    pub fn effective_region(&self, zone: &str) -> String {
        self.region
            .clone()
            .unwrap_or_else(|| region_of_zone(zone).to_string())
    }

    pub fn effective_location(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.location.clone())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string())
    }

    /// Configured endpoints, with `base` pointing every service at one URL
    pub fn effective_endpoints(&self, base: Option<&str>) -> Endpoints {
        match base {
            Some(base) => Endpoints::with_base(base),
            None => self.endpoints.clone().unwrap_or_default(),
        }
    }

    /// Set project and save
    pub fn set_project(&mut self, project_id: &str) -> Result<()> {
        self.project_id = Some(project_id.to_string());
        self.save()
    }

    /// Set zone and save
    pub fn set_zone(&mut self, zone: &str) -> Result<()> {
        self.zone = Some(zone.to_string());
        self.save()
    }
}

/// `us-central1-a` -> `us-central1`
pub fn region_of_zone(zone: &str) -> &str {
    match zone.rsplit_once('-') {
        Some((region, suffix)) if suffix.len() == 1 => region,
        _ => zone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_of_zone() {
        assert_eq!(region_of_zone("us-central1-a"), "us-central1");
        assert_eq!(region_of_zone("europe-west4-c"), "europe-west4");
        assert_eq!(region_of_zone("us-central1"), "us-central1");
    }

    #[test]
    fn test_cli_values_win() {
        let config = Config {
            project_id: Some("config-project".to_string()),
            zone: Some("europe-west1-b".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.effective_project(Some("cli-project")).as_deref(),
            Some("cli-project")
        );
        assert_eq!(config.effective_project(None).as_deref(), Some("config-project"));
        assert_eq!(config.effective_zone(None), "europe-west1-b");
        assert_eq!(config.effective_region("europe-west1-b"), "europe-west1");
        assert_eq!(config.effective_location(None), "us-central1");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            organization_id: Some("123456".to_string()),
            endpoints: Some(Endpoints::with_base("http://localhost:9000")),
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
