use crate::model::*;

use super::{Database, SharedClassRow, SharedUserRow, StoreError};

impl Database {
    pub async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        let row = self.user_row(id)?;
        let guard = row.read().await;
        Ok(guard.user())
    }

    /// All users ordered by id.
    pub async fn list_users(&self) -> Vec<User> {
        let rows: Vec<SharedUserRow> = self.users.iter().map(|e| e.value().clone()).collect();
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(row.read().await.user());
        }
        users.sort_by_key(|u| u.id);
        users
    }

    pub async fn get_class_by_id(&self, id: ClassId) -> Result<ClassInfo, StoreError> {
        let row = self.class_row(id)?;
        let guard = row.read().await;
        Ok(guard.info())
    }

    /// Classes matching every set filter, ordered by id.
    pub async fn list_classes(&self, filters: &ClassFilters) -> Vec<ClassInfo> {
        // Clone the Arcs out first; no DashMap shard guard is held across an await.
        let rows: Vec<SharedClassRow> = self.classes.iter().map(|e| e.value().clone()).collect();
        let mut classes = Vec::new();
        for row in rows {
            let info = row.read().await.info();
            if filters.matches(&info) {
                classes.push(info);
            }
        }
        classes.sort_by_key(|c| c.id);
        classes
    }

    pub fn is_booked(&self, user_id: UserId, class_id: ClassId) -> bool {
        self.bookings.contains_key(&(user_id, class_id))
    }

    /// Classes booked by a user, oldest booking first.
    pub async fn user_bookings(&self, user_id: UserId) -> Result<Vec<ClassBooked>, StoreError> {
        self.user_row(user_id)?;
        let mut held: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|e| e.key().0 == user_id)
            .map(|e| e.value().clone())
            .collect();
        held.sort_by_key(|b| (b.reserved_at, b.class_id));

        let mut out = Vec::with_capacity(held.len());
        for booking in held {
            let row = self.class_row(booking.class_id)?;
            let class = row.read().await;
            out.push(ClassBooked {
                class_id: class.id,
                name: class.name.clone(),
                date: class.date,
                reserved_at: booking.reserved_at,
            });
        }
        Ok(out)
    }

    /// Users holding a booking on a class, ordered by user id.
    pub async fn class_reservations(&self, class_id: ClassId) -> Result<Vec<UserBooked>, StoreError> {
        self.class_row(class_id)?;
        let mut user_ids: Vec<UserId> = self
            .bookings
            .iter()
            .filter(|e| e.key().1 == class_id)
            .map(|e| e.key().0)
            .collect();
        user_ids.sort_unstable();

        let mut out = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let row = self.user_row(user_id)?;
            let user = row.read().await;
            out.push(UserBooked {
                class_id,
                user_id,
                user_name: user.name.clone(),
            });
        }
        Ok(out)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}
