//! Storage port for stations, charging sessions and reservations.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    ChargerReservation, ChargingSession, ReservationStatus, SessionStatus, Station, StationStatus,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Duplicate {entity} {field}: {value}")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{entity} {id} is still referenced by {referenced_by}")]
    Referenced {
        entity: &'static str,
        id: String,
        referenced_by: &'static str,
    },
    #[error("{entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: String },
    #[error("{entity} slot overlaps {entity} {with}")]
    Overlap { entity: &'static str, with: String },
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional<T, S> {
    /// The record had the expected status and the write went through.
    Applied(T),
    /// The record exists but its status changed under us.
    Mismatch { actual: S },
    Missing,
}

impl<T, S> Conditional<T, S> {
    /// The write did not happen; `actual` is the stored status, if the record exists.
    pub fn refused(actual: Option<S>) -> Self {
        match actual {
            Some(actual) => Conditional::Mismatch { actual },
            None => Conditional::Missing,
        }
    }
}

/// Filter for session listings. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub station_id: Option<Uuid>,
}

impl SessionFilter {
    pub fn matches(&self, session: &ChargingSession) -> bool {
        self.status.is_none_or(|status| session.status == status)
            && self.station_id.is_none_or(|id| session.station_id == id)
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    // Station registry
    async fn list_stations(&self) -> StorageResult<Vec<Station>>;
    async fn get_station(&self, id: Uuid) -> StorageResult<Option<Station>>;
    /// Insert or replace by id. Station codes stay unique.
    async fn upsert_station(&self, station: Station) -> StorageResult<Station>;
    async fn set_station_status(
        &self,
        id: Uuid,
        status: StationStatus,
    ) -> StorageResult<Option<Station>>;
    /// Refused with [`StorageError::Referenced`] while sessions or reservations point at it.
    async fn remove_station(&self, id: Uuid) -> StorageResult<Option<Station>>;

    // Session store
    /// Refused with [`StorageError::Duplicate`] on a reused id or order number,
    /// and with [`StorageError::MissingReference`] when the station is unknown.
    async fn insert_session(&self, session: ChargingSession) -> StorageResult<()>;
    async fn get_session(&self, id: Uuid) -> StorageResult<Option<ChargingSession>>;
    async fn list_sessions(&self, filter: SessionFilter) -> StorageResult<Vec<ChargingSession>>;
    /// Booked or active sessions with an expected end time.
    async fn list_tracked_sessions(&self) -> StorageResult<Vec<ChargingSession>>;
    /// Replace the session only if its stored status is still `expected`.
    async fn update_session_if(
        &self,
        id: Uuid,
        expected: SessionStatus,
        updated: ChargingSession,
    ) -> StorageResult<Conditional<ChargingSession, SessionStatus>>;
    async fn delete_session_if(
        &self,
        id: Uuid,
        expected: SessionStatus,
    ) -> StorageResult<Conditional<ChargingSession, SessionStatus>>;

    // Reservation ledger
    /// Refused with [`StorageError::Overlap`] when a non-cancelled slot on the
    /// same station and day overlaps it. The check and the insert are atomic.
    async fn insert_reservation(&self, reservation: ChargerReservation) -> StorageResult<()>;
    async fn get_reservation(&self, id: Uuid) -> StorageResult<Option<ChargerReservation>>;
    async fn list_reservations(
        &self,
        date: Option<NaiveDate>,
    ) -> StorageResult<Vec<ChargerReservation>>;
    async fn update_reservation_if(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        updated: ChargerReservation,
    ) -> StorageResult<Conditional<ChargerReservation, ReservationStatus>>;
    async fn delete_reservation_if(
        &self,
        id: Uuid,
        expected: ReservationStatus,
    ) -> StorageResult<Conditional<ChargerReservation, ReservationStatus>>;
}
