use std::sync::Arc;

use tracing::debug;

use crate::model::{Booking, ClassId, UserId};
use crate::observability;
use crate::repository::BookingRepository;
use crate::store::StoreError;

/// Booking admission against the authoritative capacity counter.
///
/// The duplicate pre-check is a cheap early exit only. The repository repeats
/// it, together with the capacity check, under the class row lock.
pub struct CapacityGate {
    bookings: Arc<dyn BookingRepository>,
}

impl CapacityGate {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    pub async fn book(&self, user_id: UserId, class_id: ClassId) -> Result<Booking, StoreError> {
        let result = match self.bookings.is_booked(user_id, class_id).await {
            Ok(true) => Err(StoreError::AlreadyBooked { user_id, class_id }),
            Ok(false) => self.bookings.add_booking(user_id, class_id).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => {
                metrics::counter!(observability::BOOKINGS_ADMITTED_TOTAL).increment(1);
                debug!("user {user_id} booked class {class_id}");
            }
            Err(e) => {
                metrics::counter!(
                    observability::BOOKINGS_REJECTED_TOTAL,
                    "reason" => e.kind().as_str()
                )
                .increment(1);
                debug!("user {user_id} refused on class {class_id}: {e}");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use crate::error::ErrorKind;
    use crate::model::DayUnit;
    use crate::store::Database;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("classbook_test_gate");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    /// A class with `capacity` seats of which `registered` are already taken.
    async fn setup(name: &str, capacity: u32, registered: u32) -> (CapacityGate, Arc<Database>, ClassId) {
        let db = Arc::new(Database::open(&test_wal_path(name)).unwrap());
        let class = db
            .add_classes(&[DayUnit {
                name: "Crossfit".into(),
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                capacity,
            }])
            .await
            .unwrap()
            .remove(0);
        for i in 0..registered {
            let user = db.add_user(&format!("regular-{i}")).await.unwrap();
            db.add_booking(user.id, class.id).await.unwrap();
        }
        (CapacityGate::new(db.clone()), db, class.id)
    }

    #[tokio::test]
    async fn full_class_refuses_without_side_effects() {
        let (gate, db, class_id) = setup("full.wal", 3, 3).await;
        let user = db.add_user("late").await.unwrap();

        let err = gate.book(user.id, class_id).await.unwrap_err();
        assert!(matches!(err, StoreError::CapacityReached { capacity: 3, .. }));
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
        assert_eq!(db.get_class_by_id(class_id).await.unwrap().num_registrations, 3);
        assert!(!db.is_booked(user.id, class_id));
    }

    #[tokio::test]
    async fn last_seat_is_admitted() {
        let (gate, db, class_id) = setup("last_seat.wal", 3, 2).await;
        let user = db.add_user("just in time").await.unwrap();

        let booking = gate.book(user.id, class_id).await.unwrap();
        assert_eq!((booking.user_id, booking.class_id), (user.id, class_id));
        assert_eq!(db.get_class_by_id(class_id).await.unwrap().num_registrations, 3);
        let holders = db.class_reservations(class_id).await.unwrap();
        assert_eq!(holders.iter().filter(|u| u.user_id == user.id).count(), 1);
    }

    #[tokio::test]
    async fn double_booking_is_a_conflict() {
        let (gate, db, class_id) = setup("double.wal", 5, 0).await;
        let user = db.add_user("eager").await.unwrap();

        gate.book(user.id, class_id).await.unwrap();
        let err = gate.book(user.id, class_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(db.get_class_by_id(class_id).await.unwrap().num_registrations, 1);
    }

    #[tokio::test]
    async fn unknown_class_or_user_is_not_found() {
        let (gate, db, class_id) = setup("unknown.wal", 5, 0).await;
        let user = db.add_user("someone").await.unwrap();

        assert_eq!(gate.book(user.id, 999).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(gate.book(999, class_id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(db.get_class_by_id(class_id).await.unwrap().num_registrations, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_bookings_fill_exactly_the_free_seats() {
        let (capacity, registered, contenders) = (10, 4, 32);
        let (gate, db, class_id) = setup("concurrent.wal", capacity, registered).await;
        let gate = Arc::new(gate);

        let mut users = Vec::new();
        for i in 0..contenders {
            users.push(db.add_user(&format!("c{i}")).await.unwrap().id);
        }

        let handles: Vec<_> = users
            .into_iter()
            .map(|user_id| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.book(user_id, class_id).await })
            })
            .collect();

        let (mut admitted, mut full) = (0, 0);
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(StoreError::CapacityReached { .. }) => full += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(admitted, capacity - registered);
        assert_eq!(full, contenders - (capacity - registered));

        let class = db.get_class_by_id(class_id).await.unwrap();
        assert_eq!(class.num_registrations, capacity);
        assert_eq!(db.class_reservations(class_id).await.unwrap().len() as u32, capacity);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_duplicates_insert_once() {
        let (gate, db, class_id) = setup("concurrent_dup.wal", 50, 0).await;
        let gate = Arc::new(gate);
        let user_id = db.add_user("spammer").await.unwrap().id;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.book(user_id, class_id).await })
            })
            .collect();

        let mut admitted = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(db.get_class_by_id(class_id).await.unwrap().num_registrations, 1);
    }
}
