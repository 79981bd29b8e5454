use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChargingSession, Station, StationStatus};

/// Resolved availability of a station at a given instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Availability {
    Available,
    /// `free_at` is `None` when staff marked the station occupied without a tracked session.
    Occupied {
        #[serde(rename = "freeAt")]
        free_at: Option<DateTime<Utc>>,
    },
    Maintenance,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StationAvailability {
    #[serde(flatten)]
    pub station: Station,
    pub availability: Availability,
}

/// Sessions that can hold a station: booked or active, with an expected end time.
pub fn holds_station(session: &ChargingSession) -> bool {
    session.status.is_open() && session.expected_end_time.is_some()
}

/// Decide whether `station` is free at `now`.
///
/// Maintenance always wins. A tracked session holds the station only until its
/// expected end time; past that it no longer blocks anyone. With no tracked
/// session the manual flag decides.
pub fn resolve_station(
    station: &Station,
    sessions: &[ChargingSession],
    now: DateTime<Utc>,
) -> Availability {
    if station.status == StationStatus::Maintenance {
        return Availability::Maintenance;
    }

    let mut tracked = sessions
        .iter()
        .filter(|session| session.station_id == station.id && holds_station(session))
        .filter_map(|session| session.expected_end_time)
        .peekable();

    if tracked.peek().is_some() {
        return match tracked.filter(|end| *end > now).max() {
            Some(free_at) => Availability::Occupied {
                free_at: Some(free_at),
            },
            None => {
                tracing::debug!(
                    station = %station.station_id,
                    "Tracked session overran its expected end time, offering station"
                );
                Availability::Available
            }
        };
    }

    match station.status {
        StationStatus::Occupied => Availability::Occupied { free_at: None },
        _ => Availability::Available,
    }
}

/// Annotate every station with its availability at `now`.
pub fn resolve(
    stations: &[Station],
    sessions: &[ChargingSession],
    now: DateTime<Utc>,
) -> Vec<StationAvailability> {
    stations
        .iter()
        .map(|station| StationAvailability {
            station: station.clone(),
            availability: resolve_station(station, sessions, now),
        })
        .collect()
}
