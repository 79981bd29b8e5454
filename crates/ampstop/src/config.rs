use std::collections::HashSet;
use std::path::Path;

use ampstop_core::Station;
use ampstop_engine::{EngineSettings, NotifyOn};
use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};

/// Represents the venue configuration loaded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueConfig {
    pub venue_name: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Expected session length in minutes when staff start without an estimate
    #[serde(default = "default_session_minutes")]
    pub default_session_minutes: u32,
    #[serde(default)]
    pub notify_on: NotifyOn,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".into()
}

fn default_session_minutes() -> u32 {
    120
}

fn default_currency() -> String {
    "USD".into()
}

impl VenueConfig {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: VenueConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.default_session_minutes > 0,
            "defaultSessionMinutes must be positive"
        );
        ensure!(!self.currency.trim().is_empty(), "currency must not be empty");

        let mut codes = HashSet::new();
        for station in &self.stations {
            let code = station.station_id.trim().to_ascii_uppercase();
            ensure!(!code.is_empty(), "Station {} has no stationId", station.id);
            ensure!(
                codes.insert(code),
                "Duplicate station code {}",
                station.station_id
            );
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            default_session_length: chrono::Duration::minutes(i64::from(
                self.default_session_minutes,
            )),
            notify_on: self.notify_on,
            currency: self.currency.clone(),
        }
    }
}
