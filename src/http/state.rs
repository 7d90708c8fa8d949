use std::sync::Arc;

use crate::cache::AvailabilityCache;
use crate::gate::CapacityGate;
use crate::repository::{BookingRepository, ClassRepository, UserRepository};
use crate::scheduler::SchedulingCoordinator;
use crate::store::Database;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<SchedulingCoordinator>,
    pub gate: Arc<CapacityGate>,
    pub classes: Arc<dyn ClassRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl AppState {
    /// Wire the coordinator, the gate and every repository onto one store.
    pub fn from_database(db: Arc<Database>, cache: Arc<AvailabilityCache>) -> Self {
        Self {
            scheduler: Arc::new(SchedulingCoordinator::new(cache, db.clone())),
            gate: Arc::new(CapacityGate::new(db.clone())),
            classes: db.clone(),
            bookings: db.clone(),
            users: db,
        }
    }
}
