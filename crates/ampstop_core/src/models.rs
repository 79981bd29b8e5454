use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Manual status flag of a charging station, set by staff.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    #[default]
    Available,
    Occupied,
    Maintenance,
}

impl StationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical charging point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Human-facing code, e.g. "CS-02"
    pub station_id: String,
    /// Connector family
    #[serde(rename = "type")]
    pub kind: String,
    /// Rated capacity, display string ("50 kW")
    pub power: String,
    pub connector: String,
    #[serde(default)]
    pub status: StationStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Booked,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Booked and active sessions hold a station.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Booked | Self::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Legal moves of the charging order state machine.
    ///
    /// `booked -> active -> completed`, and `booked | active -> cancelled`.
    /// There is no way back and no shortcut from `booked` to `completed`.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Booked, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Booked, Self::Cancelled)
                | (Self::Active, Self::Cancelled)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer contact details shared by sessions and reservations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
}

impl CustomerContact {
    /// Name plus at least one way to reach the customer.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(self.customer_name.as_deref()) {
            missing.push("customerName");
        }
        if is_blank(self.customer_phone.as_deref()) && is_blank(self.customer_email.as_deref()) {
            missing.push("customerPhone or customerEmail");
        }
        missing
    }

    pub fn malformed_email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .filter(|email| {
                let Some((local, domain)) = email.split_once('@') else {
                    return true;
                };
                local.is_empty() || domain.is_empty() || domain.contains('@')
            })
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// A charging order, from booking to completion or cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChargingSession {
    pub id: Uuid,
    pub order_number: String,
    #[serde(flatten)]
    pub customer: CustomerContact,
    pub vehicle: Option<String>,
    /// References [`Station::id`]
    pub station_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub expected_end_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChargingSession {
    /// `expected_end_time` strictly after `start_time`, `end_time` not before it.
    pub fn timing_is_consistent(&self) -> bool {
        self.expected_end_time.is_none_or(|end| end > self.start_time)
            && self.end_time.is_none_or(|end| end >= self.start_time)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
                | (Self::Confirmed, Self::Completed)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed time-slot booking of a charger, kept in its own ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChargerReservation {
    pub id: Uuid,
    #[serde(flatten)]
    pub customer: CustomerContact,
    pub station_id: Uuid,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl ChargerReservation {
    /// Half-open slot overlap on the same station and day. Cancelled slots never overlap.
    pub fn overlaps(&self, other: &ChargerReservation) -> bool {
        self.station_id == other.station_id
            && self.reservation_date == other.reservation_date
            && self.status != ReservationStatus::Cancelled
            && other.status != ReservationStatus::Cancelled
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reservation(start: (u32, u32), end: (u32, u32)) -> ChargerReservation {
        ChargerReservation {
            id: Uuid::new_v4(),
            customer: CustomerContact::default(),
            station_id: Uuid::nil(),
            reservation_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            status: ReservationStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_transitions() {
        use SessionStatus::*;
        assert!(Booked.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(Booked.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Cancelled));

        assert!(!Booked.can_transition_to(Completed));
        assert!(!Active.can_transition_to(Booked));
        for terminal in [Completed, Cancelled] {
            for next in [Booked, Active, Completed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_contact_validation() {
        let contact = CustomerContact {
            customer_name: Some("  ".into()),
            customer_phone: None,
            customer_email: Some("".into()),
        };
        assert_eq!(
            contact.missing_fields(),
            vec!["customerName", "customerPhone or customerEmail"]
        );

        let contact = CustomerContact {
            customer_name: Some("Dana".into()),
            customer_phone: None,
            customer_email: Some("dana.example.com".into()),
        };
        assert!(contact.missing_fields().is_empty());
        assert_eq!(contact.malformed_email(), Some("dana.example.com"));
    }

    #[test]
    fn test_timing_consistency() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let mut session = ChargingSession {
            id: Uuid::new_v4(),
            order_number: "EV-20260301-ABC123".into(),
            customer: CustomerContact::default(),
            vehicle: None,
            station_id: Uuid::nil(),
            start_time: start,
            expected_end_time: None,
            end_time: None,
            status: SessionStatus::Booked,
            payment_status: PaymentStatus::Pending,
            total_amount: None,
            created_at: start,
            updated_at: start,
        };
        assert!(session.timing_is_consistent());

        session.expected_end_time = Some(start);
        assert!(!session.timing_is_consistent());

        session.expected_end_time = Some(start + chrono::Duration::hours(2));
        session.end_time = Some(start);
        assert!(session.timing_is_consistent());
    }

    #[test]
    fn test_reservation_overlap() {
        let a = reservation((10, 0), (11, 0));
        let b = reservation((10, 30), (11, 30));
        let c = reservation((11, 0), (12, 0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));

        let mut cancelled = b.clone();
        cancelled.status = ReservationStatus::Cancelled;
        assert!(!a.overlaps(&cancelled));
    }

    #[test]
    fn test_station_json() {
        let json = r#"
        {
          "stationId": "CS-02",
          "type": "DC fast",
          "power": "50 kW",
          "connector": "CCS2"
        }
        "#;
        let station: Station = serde_json::from_str(json).unwrap();
        assert_eq!(station.station_id, "CS-02");
        assert_eq!(station.kind, "DC fast");
        assert_eq!(station.status, StationStatus::Available);
    }
}
