//! Persistence seams consumed by the scheduling and booking core.
//!
//! `Database` implements all three; tests substitute doubles to inject failures.

use async_trait::async_trait;

use crate::model::*;
use crate::store::{Database, StoreError};

#[async_trait]
pub trait ClassRepository: Send + Sync {
    /// Insert every unit or none of them.
    async fn add_classes(&self, batch: &[DayUnit]) -> Result<Vec<ClassInfo>, StoreError>;
    async fn update_class(&self, id: ClassId, patch: &ClassPatch) -> Result<u64, StoreError>;
    async fn get_class_by_id(&self, id: ClassId) -> Result<ClassInfo, StoreError>;
    async fn list_classes(&self, filters: &ClassFilters) -> Result<Vec<ClassInfo>, StoreError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn is_booked(&self, user_id: UserId, class_id: ClassId) -> Result<bool, StoreError>;
    /// Lock the class row, check capacity, count the registration and insert the booking.
    async fn add_booking(&self, user_id: UserId, class_id: ClassId) -> Result<Booking, StoreError>;
    async fn user_bookings(&self, user_id: UserId) -> Result<Vec<ClassBooked>, StoreError>;
    async fn class_reservations(&self, class_id: ClassId) -> Result<Vec<UserBooked>, StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn add_user(&self, name: &str) -> Result<User, StoreError>;
    async fn rename_user(&self, id: UserId, name: &str) -> Result<u64, StoreError>;
    async fn get_user(&self, id: UserId) -> Result<User, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

#[async_trait]
impl ClassRepository for Database {
    async fn add_classes(&self, batch: &[DayUnit]) -> Result<Vec<ClassInfo>, StoreError> {
        Database::add_classes(self, batch).await
    }

    async fn update_class(&self, id: ClassId, patch: &ClassPatch) -> Result<u64, StoreError> {
        Database::update_class(self, id, patch).await
    }

    async fn get_class_by_id(&self, id: ClassId) -> Result<ClassInfo, StoreError> {
        Database::get_class_by_id(self, id).await
    }

    async fn list_classes(&self, filters: &ClassFilters) -> Result<Vec<ClassInfo>, StoreError> {
        Ok(Database::list_classes(self, filters).await)
    }
}

#[async_trait]
impl BookingRepository for Database {
    async fn is_booked(&self, user_id: UserId, class_id: ClassId) -> Result<bool, StoreError> {
        Ok(Database::is_booked(self, user_id, class_id))
    }

    async fn add_booking(&self, user_id: UserId, class_id: ClassId) -> Result<Booking, StoreError> {
        Database::add_booking(self, user_id, class_id).await
    }

    async fn user_bookings(&self, user_id: UserId) -> Result<Vec<ClassBooked>, StoreError> {
        Database::user_bookings(self, user_id).await
    }

    async fn class_reservations(&self, class_id: ClassId) -> Result<Vec<UserBooked>, StoreError> {
        Database::class_reservations(self, class_id).await
    }
}

#[async_trait]
impl UserRepository for Database {
    async fn add_user(&self, name: &str) -> Result<User, StoreError> {
        Database::add_user(self, name).await
    }

    async fn rename_user(&self, id: UserId, name: &str) -> Result<u64, StoreError> {
        Database::rename_user(self, id, name).await
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        Database::get_user(self, id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(Database::list_users(self).await)
    }
}
