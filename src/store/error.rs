use std::fmt;

use thiserror::Error;

use crate::error::ErrorKind;
use crate::model::{ClassId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Class,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::User => "user",
            Entity::Class => "class",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: u64 },
    #[error("user {user_id} has already booked class {class_id}")]
    AlreadyBooked { user_id: UserId, class_id: ClassId },
    #[error("class {class_id} is full (capacity {capacity})")]
    CapacityReached { class_id: ClassId, capacity: u32 },
    #[error("capacity {capacity} is below the {registrations} current registrations")]
    CapacityBelowRegistrations { capacity: u32, registrations: u32 },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("journal error: {0}")]
    Journal(String),
}

impl StoreError {
    pub fn class_not_found(id: ClassId) -> Self {
        StoreError::NotFound { entity: Entity::Class, id }
    }

    pub fn user_not_found(id: UserId) -> Self {
        StoreError::NotFound { entity: Entity::User, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::AlreadyBooked { .. } => ErrorKind::Conflict,
            StoreError::CapacityReached { .. } => ErrorKind::CapacityExceeded,
            StoreError::CapacityBelowRegistrations { .. } | StoreError::LimitExceeded(_) => {
                ErrorKind::Validation
            }
            StoreError::Journal(_) => ErrorKind::Persistence,
        }
    }
}
