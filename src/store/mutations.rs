use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::limits::{MAX_CLASS_CAPACITY, check_name};
use crate::model::*;

use super::{Database, StoreError};

fn check_capacity(capacity: u32) -> Result<(), StoreError> {
    if capacity == 0 {
        return Err(StoreError::LimitExceeded("capacity must be at least 1"));
    }
    if capacity > MAX_CLASS_CAPACITY {
        return Err(StoreError::LimitExceeded("capacity too large"));
    }
    Ok(())
}

impl Database {
    pub async fn add_user(&self, name: &str) -> Result<User, StoreError> {
        check_name(name).map_err(StoreError::LimitExceeded)?;
        let id = self.next_user_id.fetch_add(1, Ordering::Relaxed);
        let at = Utc::now();
        self.wal_append(Record::UserCreated {
            id,
            name: name.to_owned(),
            at,
        })
        .await?;

        let row = UserRow {
            id,
            name: name.to_owned(),
            created_at: at,
            updated_at: at,
        };
        let user = row.user();
        self.users.insert(id, Arc::new(RwLock::new(row)));
        Ok(user)
    }

    pub async fn rename_user(&self, id: UserId, name: &str) -> Result<u64, StoreError> {
        check_name(name).map_err(StoreError::LimitExceeded)?;
        let row = self.user_row(id)?;
        let mut guard = row.write().await;
        let at = Utc::now();
        self.wal_append(Record::UserRenamed {
            id,
            name: name.to_owned(),
            at,
        })
        .await?;
        guard.name = name.to_owned();
        guard.updated_at = at;
        Ok(1)
    }

    /// Bulk insert. The whole batch is one journal record, so it lands entirely or not at all.
    pub async fn add_classes(&self, batch: &[DayUnit]) -> Result<Vec<ClassInfo>, StoreError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        for unit in batch {
            check_name(&unit.name).map_err(StoreError::LimitExceeded)?;
            check_capacity(unit.capacity)?;
        }

        let first_id = self
            .next_class_id
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        let rows: Vec<NewClass> = batch
            .iter()
            .zip(first_id..)
            .map(|(unit, id)| NewClass {
                id,
                name: unit.name.clone(),
                date: unit.date,
                capacity: unit.capacity,
            })
            .collect();
        let at = Utc::now();
        self.wal_append(Record::ClassesAdded {
            rows: rows.clone(),
            at,
        })
        .await?;

        let inserted = rows
            .iter()
            .map(|new| {
                let row = ClassRow::new(new, at);
                let info = row.info();
                self.classes.insert(new.id, Arc::new(RwLock::new(row)));
                info
            })
            .collect();
        Ok(inserted)
    }

    /// Apply `patch` under the class row lock. Returns rows affected: 0 for an empty patch.
    pub async fn update_class(&self, id: ClassId, patch: &ClassPatch) -> Result<u64, StoreError> {
        if let Some(name) = &patch.name {
            check_name(name).map_err(StoreError::LimitExceeded)?;
        }
        if let Some(capacity) = patch.capacity {
            check_capacity(capacity)?;
        }

        let row = self.class_row(id)?;
        let mut class = row.write().await;
        if patch.is_empty() {
            return Ok(0);
        }
        if let Some(capacity) = patch.capacity
            && capacity < class.num_registrations
        {
            return Err(StoreError::CapacityBelowRegistrations {
                capacity,
                registrations: class.num_registrations,
            });
        }

        let at = Utc::now();
        self.wal_append(Record::ClassUpdated {
            id,
            patch: patch.clone(),
            at,
        })
        .await?;
        class.apply_patch(patch, at);
        Ok(1)
    }

    /// Admit one booking.
    ///
    /// Runs entirely under the class row's write lock, so bookings on the same
    /// class are serialized: existence checks, the duplicate check and the
    /// capacity check all see the counter as it is at commit time. The counter
    /// increment and the booking row share one journal record; if the append
    /// fails neither is applied.
    pub async fn add_booking(&self, user_id: UserId, class_id: ClassId) -> Result<Booking, StoreError> {
        let row = self.class_row(class_id)?;
        let mut class = row.write().await;

        if !self.users.contains_key(&user_id) {
            return Err(StoreError::user_not_found(user_id));
        }
        if self.bookings.contains_key(&(user_id, class_id)) {
            return Err(StoreError::AlreadyBooked { user_id, class_id });
        }
        if class.is_full() {
            return Err(StoreError::CapacityReached {
                class_id,
                capacity: class.capacity,
            });
        }

        let booking = Booking {
            user_id,
            class_id,
            reserved_at: Utc::now(),
        };
        self.wal_append(Record::BookingAdded {
            user_id,
            class_id,
            reserved_at: booking.reserved_at,
        })
        .await?;

        class.num_registrations += 1;
        self.bookings.insert((user_id, class_id), booking.clone());
        debug!(
            "class {class_id}: admitted user {user_id} ({}/{})",
            class.num_registrations, class.capacity
        );
        Ok(booking)
    }
}
