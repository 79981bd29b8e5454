use std::sync::Arc;

use ampstop_core::{
    ChargingError, ChargingResult, Clock, Station, StationAvailability, StationStatus, Storage,
    resolve,
};
use uuid::Uuid;

/// Staff-facing station registry plus the availability query.
pub struct StationRegistry {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

/// Find a station by id or by its human-facing code.
pub(crate) async fn lookup_station(
    storage: &dyn Storage,
    reference: &str,
) -> ChargingResult<Station> {
    let reference = reference.trim();
    if let Ok(id) = Uuid::parse_str(reference) {
        return storage
            .get_station(id)
            .await?
            .ok_or_else(|| ChargingError::not_found("Station", id));
    }
    storage
        .list_stations()
        .await?
        .into_iter()
        .find(|station| station.station_id.eq_ignore_ascii_case(reference))
        .ok_or_else(|| ChargingError::not_found("Station", reference))
}

impl StationRegistry {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        StationRegistry { storage, clock }
    }

    /// Every station (or the one matching `filter`) with its availability right now.
    ///
    /// Recomputed from storage on each call.
    pub async fn availability(
        &self,
        filter: Option<&str>,
    ) -> ChargingResult<Vec<StationAvailability>> {
        let stations = match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(reference) => vec![lookup_station(self.storage.as_ref(), reference).await?],
            None => self.storage.list_stations().await?,
        };
        let sessions = self.storage.list_tracked_sessions().await?;
        Ok(resolve(&stations, &sessions, self.clock.now()))
    }

    pub async fn get(&self, reference: &str) -> ChargingResult<Station> {
        lookup_station(self.storage.as_ref(), reference).await
    }

    pub async fn upsert(&self, station: Station) -> ChargingResult<Station> {
        if station.station_id.trim().is_empty() {
            return Err(ChargingError::Validation(
                "Station code (stationId) is required".into(),
            ));
        }
        let station = self.storage.upsert_station(station).await?;
        tracing::info!(station = %station.station_id, id = %station.id, "Station saved");
        Ok(station)
    }

    /// Manual flag; independent of any session data.
    pub async fn set_status(&self, id: Uuid, status: StationStatus) -> ChargingResult<Station> {
        let station = self
            .storage
            .set_station_status(id, status)
            .await?
            .ok_or_else(|| ChargingError::not_found("Station", id))?;
        tracing::info!(station = %station.station_id, %status, "Station status set");
        Ok(station)
    }

    pub async fn remove(&self, id: Uuid) -> ChargingResult<Station> {
        let station = self
            .storage
            .remove_station(id)
            .await?
            .ok_or_else(|| ChargingError::not_found("Station", id))?;
        tracing::info!(station = %station.station_id, "Station removed");
        Ok(station)
    }
}
