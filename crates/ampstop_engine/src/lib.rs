//! Charging operations over a storage backend: station registry, session
//! lifecycle, reservation ledger and billing preview.

mod lifecycle;
mod notify;
mod registry;
mod reservation;

pub use crate::lifecycle::{BookingRequest, CompleteRequest, SessionController, StartRequest};
pub use crate::notify::{
    LogNotifier, NotificationError, NotificationKind, NotificationPayload, Notifier, NotifyOn,
};
pub use crate::registry::StationRegistry;
pub use crate::reservation::{ReservationLedger, ReservationRequest};

use std::sync::Arc;

use ampstop_core::{BillingBreakdown, BillingInput, ChargingResult, Clock, Storage, calculate};
use chrono::Duration;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Expected session length when staff start a session without an estimate
    pub default_session_length: Duration,
    pub notify_on: NotifyOn,
    /// ISO code carried in notification payloads
    pub currency: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            default_session_length: Duration::hours(2),
            notify_on: NotifyOn::default(),
            currency: "USD".into(),
        }
    }
}

pub struct Engine {
    stations: StationRegistry,
    sessions: SessionController,
    reservations: ReservationLedger,
}

impl Engine {
    pub fn new(
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
    ) -> Self {
        Engine {
            stations: StationRegistry::new(storage.clone(), clock.clone()),
            sessions: SessionController::new(storage.clone(), clock.clone(), notifier, settings),
            reservations: ReservationLedger::new(storage, clock),
        }
    }

    pub fn stations(&self) -> &StationRegistry {
        &self.stations
    }

    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    pub fn reservations(&self) -> &ReservationLedger {
        &self.reservations
    }

    /// Side-effect free; the same rounding as the amount stored at completion.
    pub fn preview_billing(&self, input: &BillingInput) -> ChargingResult<BillingBreakdown> {
        calculate(input)
    }
}
