//! Confirmation notifications handed to an external sender.
//!
//! Delivery runs after the transition has been stored and never feeds back
//! into it: a failed send is logged and forgotten.

use std::sync::Arc;

use ampstop_core::{ChargingSession, CustomerContact, Station};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Booked,
    Started,
}

/// Which transitions send a confirmation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyOn {
    Book,
    #[default]
    Start,
    Both,
}

impl NotifyOn {
    pub fn covers(&self, kind: NotificationKind) -> bool {
        matches!(
            (self, kind),
            (NotifyOn::Both, _)
                | (NotifyOn::Book, NotificationKind::Booked)
                | (NotifyOn::Start, NotificationKind::Started)
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub session_id: Uuid,
    pub order_number: String,
    #[serde(flatten)]
    pub customer: CustomerContact,
    pub vehicle: Option<String>,
    pub station_code: String,
    pub station_connector: String,
    pub start_time: DateTime<Utc>,
    pub expected_end_time: Option<DateTime<Utc>>,
    pub total_amount: Option<Decimal>,
    pub currency: String,
}

impl NotificationPayload {
    pub fn new(
        kind: NotificationKind,
        session: &ChargingSession,
        station: &Station,
        currency: &str,
    ) -> Self {
        NotificationPayload {
            kind,
            session_id: session.id,
            order_number: session.order_number.clone(),
            customer: session.customer.clone(),
            vehicle: session.vehicle.clone(),
            station_code: station.station_id.clone(),
            station_connector: station.connector.clone(),
            start_time: session.start_time,
            expected_end_time: session.expected_end_time,
            total_amount: session.total_amount,
            currency: currency.to_string(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: NotificationPayload) -> Result<(), NotificationError>;
}

/// Writes the prepared payload to the log instead of sending it anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, payload: NotificationPayload) -> Result<(), NotificationError> {
        tracing::info!(
            kind = ?payload.kind,
            order_number = %payload.order_number,
            station = %payload.station_code,
            customer_email = ?payload.customer.customer_email,
            "Confirmation notification prepared"
        );
        Ok(())
    }
}

/// Fire-and-forget delivery on the runtime.
pub(crate) fn dispatch(notifier: &Arc<dyn Notifier>, payload: NotificationPayload) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        let order_number = payload.order_number.clone();
        match notifier.notify(payload).await {
            Ok(()) => tracing::debug!(%order_number, "Notification delivered"),
            Err(error) => tracing::warn!(
                %order_number,
                %error,
                "Notification delivery failed, session transition is kept"
            ),
        }
    });
}
