//! Charging order state machine.
//!
//! ```text
//! booked ──start──▶ active ──complete──▶ completed
//!    │                 │
//!    └─────cancel──────┴──────────────▶ cancelled
//! ```
//!
//! Every transition reads the session, checks the move is legal, then writes
//! conditionally on the status it read. A concurrent writer that got there
//! first turns the second attempt into an invalid-transition error.

use std::sync::Arc;

use ampstop_core::{
    Availability, BillingInput, ChargingError, ChargingResult, ChargingSession, Clock,
    Conditional, CustomerContact, PaymentStatus, SessionFilter, SessionStatus, Storage,
    StorageError, calculate, resolve_station,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineSettings;
use crate::notify::{NotificationKind, NotificationPayload, Notifier, dispatch};
use crate::registry::lookup_station;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(flatten)]
    pub customer: CustomerContact,
    pub vehicle: Option<String>,
    /// Station id or station code
    pub station_id: Option<String>,
    /// Defaults to the booking instant
    pub preferred_start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Operator estimate; falls back to the configured session length
    pub expected_end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub billing: Option<BillingInput>,
    /// Staff acknowledged the payment at the terminal
    #[serde(default)]
    pub paid: bool,
}

pub struct SessionController {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
}

fn order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_ascii_uppercase();
    format!("EV-{}-{}", now.format("%Y%m%d"), suffix)
}

fn is_duplicate_order_number(error: &StorageError) -> bool {
    matches!(
        error,
        StorageError::Duplicate {
            field: "orderNumber",
            ..
        }
    )
}

impl SessionController {
    pub fn new(
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
    ) -> Self {
        SessionController {
            storage,
            clock,
            notifier,
            settings,
        }
    }

    pub async fn get(&self, id: Uuid) -> ChargingResult<ChargingSession> {
        self.storage
            .get_session(id)
            .await?
            .ok_or_else(|| ChargingError::not_found("Session", id))
    }

    pub async fn list(&self, filter: SessionFilter) -> ChargingResult<Vec<ChargingSession>> {
        Ok(self.storage.list_sessions(filter).await?)
    }

    /// Create a session in `booked` state.
    ///
    /// Booking is advisory: a station that is occupied with a known free time
    /// can still be booked, but maintenance and untracked manual occupancy are
    /// refused.
    pub async fn book(&self, request: BookingRequest) -> ChargingResult<ChargingSession> {
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
                "Missing required booking fields: {}",
                missing.join(", ")
            )));
        };
        if let Some(email) = request.customer.malformed_email() {
            return Err(ChargingError::Validation(format!(
                "Malformed customer email: {email}"
            )));
        }

        let station = lookup_station(self.storage.as_ref(), station_ref).await?;
        let now = self.clock.now();
        let tracked = self.storage.list_tracked_sessions().await?;
        match resolve_station(&station, &tracked, now) {
            Availability::Maintenance => {
                return Err(ChargingError::Validation(format!(
                    "Station {} is under maintenance",
                    station.station_id
                )));
            }
            Availability::Occupied { free_at: None } => {
                return Err(ChargingError::Validation(format!(
                    "Station {} is marked occupied by staff",
                    station.station_id
                )));
            }
            Availability::Occupied {
                free_at: Some(free_at),
            } => {
                tracing::warn!(
                    station = %station.station_id,
                    %free_at,
                    "Booking a station that is currently occupied"
                );
            }
            Availability::Available => {}
        }

        let mut session = ChargingSession {
            id: Uuid::new_v4(),
            order_number: order_number(now),
            customer: request.customer,
            vehicle: request.vehicle,
            station_id: station.id,
            start_time: request.preferred_start_time.unwrap_or(now),
            expected_end_time: None,
            end_time: None,
            status: SessionStatus::Booked,
            payment_status: PaymentStatus::Pending,
            total_amount: None,
            created_at: now,
            updated_at: now,
        };

        let inserted = match self.storage.insert_session(session.clone()).await {
            Err(error) if is_duplicate_order_number(&error) => {
                tracing::debug!(order_number = %session.order_number, "Order number taken, regenerating");
                session.order_number = order_number(now);
                self.storage.insert_session(session.clone()).await
            }
            result => result,
        };
        match inserted {
            // Removed between the lookup and the insert
            Err(StorageError::MissingReference { .. }) => {
                return Err(ChargingError::not_found("Station", station.id));
            }
            result => result?,
        }

        tracing::info!(
            session_id = %session.id,
            order_number = %session.order_number,
            station_id = %session.station_id,
            station = %station.station_id,
            status = %session.status,
            "Charging session booked"
        );

        if self.settings.notify_on.covers(NotificationKind::Booked) {
            dispatch(
                &self.notifier,
                NotificationPayload::new(
                    NotificationKind::Booked,
                    &session,
                    &station,
                    &self.settings.currency,
                ),
            );
        }
        Ok(session)
    }

    /// `booked -> active`. The actual start instant replaces the preferred one.
    pub async fn start(&self, id: Uuid, request: StartRequest) -> ChargingResult<ChargingSession> {
        let session = self.get(id).await?;
        Self::check(&session, SessionStatus::Active, "start")?;

        let now = self.clock.now();
        let expected_end_time = request
            .expected_end_time
            .unwrap_or(now + self.settings.default_session_length);
        if expected_end_time <= now {
            return Err(ChargingError::Validation(format!(
                "Expected end time {expected_end_time} must be after the start time {now}"
            )));
        }

        let mut updated = session.clone();
        updated.start_time = now;
        updated.expected_end_time = Some(expected_end_time);
        updated.status = SessionStatus::Active;
        updated.updated_at = now;

        let started = self.commit(&session, updated, "start").await?;
        tracing::info!(
            session_id = %started.id,
            order_number = %started.order_number,
            station_id = %started.station_id,
            %expected_end_time,
            status = %started.status,
            "Charging session started"
        );

        if self.settings.notify_on.covers(NotificationKind::Started) {
            match self.storage.get_station(started.station_id).await {
                Ok(Some(station)) => dispatch(
                    &self.notifier,
                    NotificationPayload::new(
                        NotificationKind::Started,
                        &started,
                        &station,
                        &self.settings.currency,
                    ),
                ),
                Ok(None) => tracing::warn!(
                    order_number = %started.order_number,
                    station_id = %started.station_id,
                    "Station vanished, start notification skipped"
                ),
                Err(error) => tracing::warn!(
                    order_number = %started.order_number,
                    station_id = %started.station_id,
                    %error,
                    "Could not load station, start notification skipped"
                ),
            }
        }
        Ok(started)
    }

    /// `active -> completed`, optionally billing the session.
    pub async fn complete(
        &self,
        id: Uuid,
        request: CompleteRequest,
    ) -> ChargingResult<ChargingSession> {
        let session = self.get(id).await?;
        Self::check(&session, SessionStatus::Completed, "complete")?;

        if let Some(billing) = &request.billing {
            tracing::debug!(
                order_number = %session.order_number,
                station_id = %session.station_id,
                percentage = billing.has_percentage_readings(),
                energy = billing.has_energy_readings(),
                "Billing completed session"
            );
        }
        let breakdown = request.billing.as_ref().map(calculate).transpose()?;
        let now = self.clock.now();

        let mut updated = session.clone();
        updated.end_time = Some(now.max(session.start_time));
        updated.status = SessionStatus::Completed;
        updated.updated_at = now;
        if let Some(breakdown) = breakdown {
            updated.total_amount = Some(breakdown.total_amount);
        }
        updated.payment_status = if breakdown.is_some() && request.paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        };

        let completed = self.commit(&session, updated, "complete").await?;
        tracing::info!(
            session_id = %completed.id,
            order_number = %completed.order_number,
            station_id = %completed.station_id,
            total_amount = ?completed.total_amount,
            payment_status = %completed.payment_status,
            status = %completed.status,
            "Charging session completed"
        );
        Ok(completed)
    }

    /// `booked | active -> cancelled`. Any amount already set is left alone.
    pub async fn cancel(&self, id: Uuid) -> ChargingResult<ChargingSession> {
        let session = self.get(id).await?;
        Self::check(&session, SessionStatus::Cancelled, "cancel")?;

        let mut updated = session.clone();
        updated.status = SessionStatus::Cancelled;
        updated.updated_at = self.clock.now();

        let cancelled = self.commit(&session, updated, "cancel").await?;
        tracing::info!(
            session_id = %cancelled.id,
            order_number = %cancelled.order_number,
            station_id = %cancelled.station_id,
            previous = %session.status,
            status = %cancelled.status,
            "Charging session cancelled"
        );
        Ok(cancelled)
    }

    /// Record the outcome of payment for a completed session.
    pub async fn record_payment(
        &self,
        id: Uuid,
        payment_status: PaymentStatus,
    ) -> ChargingResult<ChargingSession> {
        let session = self.get(id).await?;
        if session.status != SessionStatus::Completed {
            return Err(ChargingError::invalid_transition(
                "session",
                &session.order_number,
                session.status,
                "record payment for",
            ));
        }

        let mut updated = session.clone();
        updated.payment_status = payment_status;
        updated.updated_at = self.clock.now();

        let recorded = self.commit(&session, updated, "record payment for").await?;
        tracing::info!(
            session_id = %recorded.id,
            order_number = %recorded.order_number,
            station_id = %recorded.station_id,
            %payment_status,
            "Payment recorded"
        );
        Ok(recorded)
    }

    /// Administrative cleanup of completed or cancelled sessions.
    pub async fn delete(&self, id: Uuid) -> ChargingResult<ChargingSession> {
        let session = self.get(id).await?;
        if !session.status.is_terminal() {
            return Err(ChargingError::invalid_transition(
                "session",
                &session.order_number,
                session.status,
                "delete",
            ));
        }

        match self.storage.delete_session_if(id, session.status).await? {
            Conditional::Applied(deleted) => {
                tracing::info!(
                    session_id = %deleted.id,
                    order_number = %deleted.order_number,
                    station_id = %deleted.station_id,
                    "Charging session deleted"
                );
                Ok(deleted)
            }
            Conditional::Mismatch { actual } => Err(ChargingError::invalid_transition(
                "session",
                &session.order_number,
                actual,
                "delete",
            )),
            Conditional::Missing => Err(ChargingError::not_found("Session", id)),
        }
    }

    fn check(
        session: &ChargingSession,
        next: SessionStatus,
        attempted: &'static str,
    ) -> ChargingResult<()> {
        if session.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(ChargingError::invalid_transition(
                "session",
                &session.order_number,
                session.status,
                attempted,
            ))
        }
    }

    async fn commit(
        &self,
        current: &ChargingSession,
        updated: ChargingSession,
        attempted: &'static str,
    ) -> ChargingResult<ChargingSession> {
        match self
            .storage
            .update_session_if(current.id, current.status, updated)
            .await?
        {
            Conditional::Applied(session) => Ok(session),
            Conditional::Mismatch { actual } => Err(ChargingError::invalid_transition(
                "session",
                &current.order_number,
                actual,
                attempted,
            )),
            Conditional::Missing => Err(ChargingError::not_found("Session", current.id)),
        }
    }
}
