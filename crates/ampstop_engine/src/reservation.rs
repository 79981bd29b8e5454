//! Fixed time-slot charger reservations.
//!
//! This ledger is separate from charging sessions: a confirmed slot does not
//! make the availability query report the station as occupied, and booking a
//! session does not look at slots. Overlaps are only checked between slots.

use std::sync::Arc;

use ampstop_core::{
    ChargerReservation, ChargingError, ChargingResult, Clock, Conditional, CustomerContact,
    ReservationStatus, Storage, StorageError,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::lookup_station;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    #[serde(flatten)]
    pub customer: CustomerContact,
    /// Station id or station code
    pub station_id: Option<String>,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

pub struct ReservationLedger {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl ReservationLedger {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        ReservationLedger { storage, clock }
    }

    pub async fn get(&self, id: Uuid) -> ChargingResult<ChargerReservation> {
        self.storage
            .get_reservation(id)
            .await?
            .ok_or_else(|| ChargingError::not_found("Reservation", id))
    }

    pub async fn list(&self, date: Option<NaiveDate>) -> ChargingResult<Vec<ChargerReservation>> {
        Ok(self.storage.list_reservations(date).await?)
    }

    pub async fn create(&self, request: ReservationRequest) -> ChargingResult<ChargerReservation> {
        let mut missing = request.customer.missing_fields();
        let station_ref = request
            .station_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if station_ref.is_none() {
            missing.push("stationId");
        }
        let Some(station_ref) = station_ref.filter(|_| missing.is_empty()) else {
            return Err(ChargingError::Validation(format!(
                "Missing required reservation fields: {}",
                missing.join(", ")
            )));
        };
        if let Some(email) = request.customer.malformed_email() {
            return Err(ChargingError::Validation(format!(
                "Malformed customer email: {email}"
            )));
        }
        if request.end_time <= request.start_time {
            return Err(ChargingError::Validation(format!(
                "Reservation end {} must be after its start {}",
                request.end_time, request.start_time
            )));
        }

        let station = lookup_station(self.storage.as_ref(), station_ref).await?;
        let reservation = ChargerReservation {
            id: Uuid::new_v4(),
            customer: request.customer,
            station_id: station.id,
            reservation_date: request.reservation_date,
            start_time: request.start_time,
            end_time: request.end_time,
            status: ReservationStatus::Pending,
            created_at: self.clock.now(),
        };

        let same_day = self
            .storage
            .list_reservations(Some(reservation.reservation_date))
            .await?;
        if let Some(clash) = same_day.iter().find(|other| other.overlaps(&reservation)) {
            return Err(ChargingError::Conflict(format!(
                "Station {} is already reserved {}-{} on {}",
                station.station_id, clash.start_time, clash.end_time, clash.reservation_date
            )));
        }

        match self.storage.insert_reservation(reservation.clone()).await {
            Err(StorageError::Overlap { with, .. }) => {
                return Err(ChargingError::Conflict(format!(
                    "Station {} is already reserved on {} (reservation {with})",
                    station.station_id, reservation.reservation_date
                )));
            }
            Err(StorageError::MissingReference { .. }) => {
                return Err(ChargingError::not_found("Station", station.id));
            }
            result => result?,
        }
        tracing::info!(
            reservation_id = %reservation.id,
            station = %station.station_id,
            date = %reservation.reservation_date,
            start = %reservation.start_time,
            end = %reservation.end_time,
            "Charger reservation created"
        );
        Ok(reservation)
    }

    pub async fn confirm(&self, id: Uuid) -> ChargingResult<ChargerReservation> {
        self.transition(id, ReservationStatus::Confirmed, "confirm")
            .await
    }

    pub async fn cancel(&self, id: Uuid) -> ChargingResult<ChargerReservation> {
        self.transition(id, ReservationStatus::Cancelled, "cancel")
            .await
    }

    pub async fn complete(&self, id: Uuid) -> ChargingResult<ChargerReservation> {
        self.transition(id, ReservationStatus::Completed, "complete")
            .await
    }

    /// Only cancelled or completed reservations can be removed.
    pub async fn delete(&self, id: Uuid) -> ChargingResult<ChargerReservation> {
        let reservation = self.get(id).await?;
        if !reservation.status.is_terminal() {
            return Err(ChargingError::invalid_transition(
                "reservation",
                id,
                reservation.status,
                "delete",
            ));
        }
        match self
            .storage
            .delete_reservation_if(id, reservation.status)
            .await?
        {
            Conditional::Applied(deleted) => {
                tracing::info!(reservation_id = %id, "Charger reservation deleted");
                Ok(deleted)
            }
            Conditional::Mismatch { actual } => Err(ChargingError::invalid_transition(
                "reservation",
                id,
                actual,
                "delete",
            )),
            Conditional::Missing => Err(ChargingError::not_found("Reservation", id)),
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        next: ReservationStatus,
        attempted: &'static str,
    ) -> ChargingResult<ChargerReservation> {
        let reservation = self.get(id).await?;
        if !reservation.status.can_transition_to(next) {
            return Err(ChargingError::invalid_transition(
                "reservation",
                id,
                reservation.status,
                attempted,
            ));
        }

        let mut updated = reservation.clone();
        updated.status = next;
        match self
            .storage
            .update_reservation_if(id, reservation.status, updated)
            .await?
        {
            Conditional::Applied(updated) => {
                tracing::info!(
                    reservation_id = %id,
                    previous = %reservation.status,
                    status = %updated.status,
                    "Charger reservation updated"
                );
                Ok(updated)
            }
            Conditional::Mismatch { actual } => Err(ChargingError::invalid_transition(
                "reservation",
                id,
                actual,
                attempted,
            )),
            Conditional::Missing => Err(ChargingError::not_found("Reservation", id)),
        }
    }
}
