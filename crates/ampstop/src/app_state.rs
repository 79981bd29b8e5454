use std::sync::Arc;

use ampstop_core::{Clock, InMemoryStorage, SystemClock};
use ampstop_engine::{Engine, LogNotifier};
use anyhow::Context;

use crate::config::VenueConfig;

/// Everything the server needs, wired from the venue configuration
pub struct AppState {
    pub config: VenueConfig,
    pub engine: Engine,
}

impl AppState {
    pub fn new(config: VenueConfig) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Seeds the station registry from the configuration.
    pub fn with_clock(config: VenueConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let storage = InMemoryStorage::with_stations(config.stations.iter().cloned())
            .context("Failed to seed station registry")?;
        let engine = Engine::new(
            Arc::new(storage),
            clock,
            Arc::new(LogNotifier),
            config.engine_settings(),
        );
        Ok(Self { config, engine })
    }
}
