//! In-memory storage for development and testing

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::{
    ChargerReservation, ChargingSession, Conditional, ReservationStatus, SessionFilter,
    SessionStatus, Station, StationStatus, Storage, StorageError, StorageResult, holds_station,
};

/// Conditional writes hold the map shard lock between the status check and the
/// write, so two transitions racing on one record cannot both apply.
#[derive(Default)]
pub struct InMemoryStorage {
    stations: DashMap<Uuid, Station>,
    sessions: DashMap<Uuid, ChargingSession>,
    order_numbers: DashMap<String, Uuid>,
    reservations: DashMap<Uuid, ChargerReservation>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry. A duplicate station code fails the whole call.
    pub fn with_stations(stations: impl IntoIterator<Item = Station>) -> StorageResult<Self> {
        let storage = Self::new();
        for station in stations {
            storage.insert_station(station)?;
        }
        Ok(storage)
    }

    fn insert_station(&self, station: Station) -> StorageResult<Station> {
        let code_taken = self
            .stations
            .iter()
            .any(|s| s.id != station.id && s.station_id.eq_ignore_ascii_case(&station.station_id));
        if code_taken {
            return Err(StorageError::Duplicate {
                entity: "station",
                field: "stationId",
                value: station.station_id,
            });
        }
        self.stations.insert(station.id, station.clone());
        Ok(station)
    }

    fn referencing(&self, station_id: Uuid) -> Option<&'static str> {
        if self.sessions.iter().any(|s| s.station_id == station_id) {
            Some("charging sessions")
        } else if self.reservations.iter().any(|r| r.station_id == station_id) {
            Some("charger reservations")
        } else {
            None
        }
    }
}

fn missing_station(id: Uuid) -> StorageError {
    StorageError::MissingReference {
        entity: "station",
        id: id.to_string(),
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn list_stations(&self) -> StorageResult<Vec<Station>> {
        let mut stations: Vec<Station> = self.stations.iter().map(|s| s.value().clone()).collect();
        stations.sort_by(|a, b| a.station_id.cmp(&b.station_id));
        Ok(stations)
    }

    async fn get_station(&self, id: Uuid) -> StorageResult<Option<Station>> {
        Ok(self.stations.get(&id).map(|s| s.clone()))
    }

    async fn upsert_station(&self, station: Station) -> StorageResult<Station> {
        self.insert_station(station)
    }

    async fn set_station_status(
        &self,
        id: Uuid,
        status: StationStatus,
    ) -> StorageResult<Option<Station>> {
        Ok(self.stations.get_mut(&id).map(|mut station| {
            station.status = status;
            station.clone()
        }))
    }

    async fn remove_station(&self, id: Uuid) -> StorageResult<Option<Station>> {
        // Scanned under the station's shard lock, which inserts also take.
        let mut referenced_by = None;
        let removed = self.stations.remove_if(&id, |_, _| {
            referenced_by = self.referencing(id);
            referenced_by.is_none()
        });
        if let Some(referenced_by) = referenced_by {
            return Err(StorageError::Referenced {
                entity: "station",
                id: id.to_string(),
                referenced_by,
            });
        }
        Ok(removed.map(|(_, station)| station))
    }

    async fn insert_session(&self, session: ChargingSession) -> StorageResult<()> {
        let Some(_station) = self.stations.get(&session.station_id) else {
            return Err(missing_station(session.station_id));
        };
        if self.sessions.contains_key(&session.id) {
            return Err(StorageError::Duplicate {
                entity: "session",
                field: "id",
                value: session.id.to_string(),
            });
        }
        match self.order_numbers.entry(session.order_number.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate {
                entity: "session",
                field: "orderNumber",
                value: session.order_number,
            }),
            Entry::Vacant(slot) => {
                slot.insert(session.id);
                self.sessions.insert(session.id, session);
                Ok(())
            }
        }
    }

    async fn get_session(&self, id: Uuid) -> StorageResult<Option<ChargingSession>> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn list_sessions(&self, filter: SessionFilter) -> StorageResult<Vec<ChargingSession>> {
        let mut sessions: Vec<ChargingSession> = self
            .sessions
            .iter()
            .filter(|s| filter.matches(s.value()))
            .map(|s| s.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn list_tracked_sessions(&self) -> StorageResult<Vec<ChargingSession>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| holds_station(s.value()))
            .map(|s| s.value().clone())
            .collect())
    }

    async fn update_session_if(
        &self,
        id: Uuid,
        expected: SessionStatus,
        updated: ChargingSession,
    ) -> StorageResult<Conditional<ChargingSession, SessionStatus>> {
        let Some(mut entry) = self.sessions.get_mut(&id) else {
            return Ok(Conditional::Missing);
        };
        if entry.status != expected {
            return Ok(Conditional::Mismatch {
                actual: entry.status,
            });
        }
        *entry = updated;
        Ok(Conditional::Applied(entry.clone()))
    }

    async fn delete_session_if(
        &self,
        id: Uuid,
        expected: SessionStatus,
    ) -> StorageResult<Conditional<ChargingSession, SessionStatus>> {
        if let Some((_, removed)) = self.sessions.remove_if(&id, |_, s| s.status == expected) {
            self.order_numbers.remove(&removed.order_number);
            return Ok(Conditional::Applied(removed));
        }
        Ok(Conditional::refused(self.sessions.get(&id).map(|s| s.status)))
    }

    async fn insert_reservation(&self, reservation: ChargerReservation) -> StorageResult<()> {
        // Exclusive per station, so two inserts for one station serialize.
        let Some(_station) = self.stations.get_mut(&reservation.station_id) else {
            return Err(missing_station(reservation.station_id));
        };
        let clash = self
            .reservations
            .iter()
            .find(|other| other.overlaps(&reservation))
            .map(|other| other.id);
        if let Some(clash) = clash {
            return Err(StorageError::Overlap {
                entity: "reservation",
                with: clash.to_string(),
            });
        }
        match self.reservations.entry(reservation.id) {
            Entry::Occupied(_) => Err(StorageError::Duplicate {
                entity: "reservation",
                field: "id",
                value: reservation.id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(reservation);
                Ok(())
            }
        }
    }

    async fn get_reservation(&self, id: Uuid) -> StorageResult<Option<ChargerReservation>> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn list_reservations(
        &self,
        date: Option<NaiveDate>,
    ) -> StorageResult<Vec<ChargerReservation>> {
        let mut reservations: Vec<ChargerReservation> = self
            .reservations
            .iter()
            .filter(|r| date.is_none_or(|d| r.reservation_date == d))
            .map(|r| r.value().clone())
            .collect();
        reservations.sort_by_key(|r| (r.reservation_date, r.start_time));
        Ok(reservations)
    }

    async fn update_reservation_if(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        updated: ChargerReservation,
    ) -> StorageResult<Conditional<ChargerReservation, ReservationStatus>> {
        let Some(mut entry) = self.reservations.get_mut(&id) else {
            return Ok(Conditional::Missing);
        };
        if entry.status != expected {
            return Ok(Conditional::Mismatch {
                actual: entry.status,
            });
        }
        *entry = updated;
        Ok(Conditional::Applied(entry.clone()))
    }

    async fn delete_reservation_if(
        &self,
        id: Uuid,
        expected: ReservationStatus,
    ) -> StorageResult<Conditional<ChargerReservation, ReservationStatus>> {
        if let Some((_, removed)) = self.reservations.remove_if(&id, |_, r| r.status == expected) {
            return Ok(Conditional::Applied(removed));
        }
        Ok(Conditional::refused(self.reservations.get(&id).map(|r| r.status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CustomerContact, PaymentStatus};
    use chrono::{Duration, NaiveTime, TimeZone, Utc};

    fn station(code: &str) -> Station {
        Station {
            id: Uuid::new_v4(),
            station_id: code.into(),
            kind: "AC".into(),
            power: "22 kW".into(),
            connector: "Type 2".into(),
            status: StationStatus::Available,
        }
    }

    fn session(station_id: Uuid, order_number: &str, status: SessionStatus) -> ChargingSession {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        ChargingSession {
            id: Uuid::new_v4(),
            order_number: order_number.into(),
            customer: CustomerContact::default(),
            vehicle: None,
            station_id,
            start_time: now,
            expected_end_time: Some(now + Duration::hours(2)),
            end_time: None,
            status,
            payment_status: PaymentStatus::Pending,
            total_amount: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn seeded(codes: &[&str]) -> (InMemoryStorage, Vec<Uuid>) {
        let stations: Vec<Station> = codes.iter().map(|code| station(code)).collect();
        let ids = stations.iter().map(|s| s.id).collect();
        (InMemoryStorage::with_stations(stations).unwrap(), ids)
    }

    fn slot(station_id: Uuid, start: u32, end: u32) -> ChargerReservation {
        ChargerReservation {
            id: Uuid::new_v4(),
            customer: CustomerContact::default(),
            station_id,
            reservation_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            status: ReservationStatus::Pending,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_station_codes_are_unique() {
        let storage = InMemoryStorage::with_stations([station("CS-01")]).unwrap();
        let result = storage.upsert_station(station("CS-01")).await;
        assert!(matches!(result, Err(StorageError::Duplicate { .. })));

        let mut existing = storage.list_stations().await.unwrap().remove(0);
        existing.power = "11 kW".into();
        let updated = storage.upsert_station(existing.clone()).await.unwrap();
        assert_eq!(updated.power, "11 kW");
        assert_eq!(storage.list_stations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_referenced_station_cannot_be_removed() {
        let s = station("CS-01");
        let storage = InMemoryStorage::with_stations([s.clone()]).unwrap();
        let cancelled = session(s.id, "EV-1", SessionStatus::Cancelled);
        storage.insert_session(cancelled.clone()).await.unwrap();

        let result = storage.remove_station(s.id).await;
        assert!(matches!(result, Err(StorageError::Referenced { .. })));

        storage
            .delete_session_if(cancelled.id, SessionStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(storage.remove_station(s.id).await.unwrap(), Some(s));
    }

    #[tokio::test]
    async fn test_order_numbers_are_unique() {
        let (storage, ids) = seeded(&["CS-01"]);
        let id = ids[0];
        storage
            .insert_session(session(id, "EV-1", SessionStatus::Booked))
            .await
            .unwrap();
        let result = storage
            .insert_session(session(id, "EV-1", SessionStatus::Booked))
            .await;
        assert_eq!(
            result,
            Err(StorageError::Duplicate {
                entity: "session",
                field: "orderNumber",
                value: "EV-1".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_conditional_update() {
        let (storage, ids) = seeded(&["CS-01"]);
        let original = session(ids[0], "EV-1", SessionStatus::Booked);
        storage.insert_session(original.clone()).await.unwrap();

        let mut active = original.clone();
        active.status = SessionStatus::Active;

        let applied = storage
            .update_session_if(original.id, SessionStatus::Booked, active.clone())
            .await
            .unwrap();
        assert_eq!(applied, Conditional::Applied(active.clone()));

        let second = storage
            .update_session_if(original.id, SessionStatus::Booked, active)
            .await
            .unwrap();
        assert_eq!(
            second,
            Conditional::Mismatch {
                actual: SessionStatus::Active
            }
        );

        let missing = storage
            .update_session_if(Uuid::new_v4(), SessionStatus::Booked, original)
            .await
            .unwrap();
        assert_eq!(missing, Conditional::Missing);
    }

    #[tokio::test]
    async fn test_conditional_delete() {
        let (storage, ids) = seeded(&["CS-01"]);
        let booked = session(ids[0], "EV-1", SessionStatus::Booked);
        storage.insert_session(booked.clone()).await.unwrap();

        let refused = storage
            .delete_session_if(booked.id, SessionStatus::Completed)
            .await
            .unwrap();
        assert_eq!(
            refused,
            Conditional::Mismatch {
                actual: SessionStatus::Booked
            }
        );
        assert!(storage.get_session(booked.id).await.unwrap().is_some());

        let removed = storage
            .delete_session_if(booked.id, SessionStatus::Booked)
            .await
            .unwrap();
        assert_eq!(removed, Conditional::Applied(booked.clone()));
        // The order number is free again
        storage.insert_session(booked).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (storage, ids) = seeded(&["CS-01", "CS-02"]);
        let (s1, s2) = (ids[0], ids[1]);
        let mut untracked = session(s1, "EV-3", SessionStatus::Booked);
        untracked.expected_end_time = None;
        for s in [
            session(s1, "EV-1", SessionStatus::Active),
            session(s2, "EV-2", SessionStatus::Completed),
            untracked,
        ] {
            storage.insert_session(s).await.unwrap();
        }

        let on_s1 = storage
            .list_sessions(SessionFilter {
                station_id: Some(s1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(on_s1.len(), 2);

        let completed = storage
            .list_sessions(SessionFilter {
                status: Some(SessionStatus::Completed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].order_number, "EV-2");

        let tracked = storage.list_tracked_sessions().await.unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].order_number, "EV-1");
    }

    #[tokio::test]
    async fn test_session_needs_existing_station() {
        let (storage, ids) = seeded(&["CS-01"]);
        let unknown = Uuid::new_v4();
        let result = storage
            .insert_session(session(unknown, "EV-1", SessionStatus::Booked))
            .await;
        assert_eq!(
            result,
            Err(StorageError::MissingReference {
                entity: "station",
                id: unknown.to_string(),
            })
        );
        assert!(
            storage
                .list_sessions(SessionFilter::default())
                .await
                .unwrap()
                .is_empty()
        );
        // The order number was never claimed
        storage
            .insert_session(session(ids[0], "EV-1", SessionStatus::Booked))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reservation_needs_existing_station() {
        let (storage, _) = seeded(&["CS-01"]);
        let result = storage.insert_reservation(slot(Uuid::new_v4(), 10, 11)).await;
        assert!(matches!(result, Err(StorageError::MissingReference { .. })));
        assert!(storage.list_reservations(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_reservation_refused() {
        let (storage, ids) = seeded(&["CS-01", "CS-02"]);
        let first = slot(ids[0], 10, 12);
        storage.insert_reservation(first.clone()).await.unwrap();

        let result = storage.insert_reservation(slot(ids[0], 11, 13)).await;
        assert_eq!(
            result,
            Err(StorageError::Overlap {
                entity: "reservation",
                with: first.id.to_string(),
            })
        );

        storage.insert_reservation(slot(ids[0], 12, 13)).await.unwrap();
        storage.insert_reservation(slot(ids[1], 10, 12)).await.unwrap();
        assert_eq!(storage.list_reservations(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_station_with_reservation_cannot_be_removed() {
        let (storage, ids) = seeded(&["CS-01"]);
        storage.insert_reservation(slot(ids[0], 10, 11)).await.unwrap();

        assert!(matches!(
            storage.remove_station(ids[0]).await,
            Err(StorageError::Referenced {
                referenced_by: "charger reservations",
                ..
            })
        ));
        assert!(storage.get_station(ids[0]).await.unwrap().is_some());
        assert_eq!(storage.remove_station(Uuid::new_v4()).await, Ok(None));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_book_and_remove_keep_references() {
        for round in 0..50 {
            let (storage, ids) = seeded(&["CS-01"]);
            let storage = std::sync::Arc::new(storage);
            let station_id = ids[0];

            let insert = {
                let storage = storage.clone();
                tokio::spawn(async move {
                    let order_number = format!("EV-{round}");
                    storage
                        .insert_session(session(station_id, &order_number, SessionStatus::Booked))
                        .await
                })
            };
            let remove = {
                let storage = storage.clone();
                tokio::spawn(async move { storage.remove_station(station_id).await })
            };
            let inserted = insert.await.unwrap();
            let removed = remove.await.unwrap();

            // Either the station went first and the insert was refused, or the
            // session landed and the removal was refused.
            match (inserted, removed) {
                (Ok(()), Err(StorageError::Referenced { .. })) => {
                    assert!(storage.get_station(station_id).await.unwrap().is_some());
                }
                (Err(StorageError::MissingReference { .. }), Ok(Some(_))) => {
                    assert!(
                        storage
                            .list_sessions(SessionFilter::default())
                            .await
                            .unwrap()
                            .is_empty()
                    );
                }
                other => panic!("Dangling reference: {other:?}"),
            }
        }
    }
}
