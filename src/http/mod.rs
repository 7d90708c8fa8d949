//! axum REST surface under `/v1/fitnessstudio`.
//!
//! Handlers decode requests, call the scheduling coordinator, the capacity
//! gate or a repository, and map failures to `{"code","message","details"}`.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::{BASE_PATH, create_router};
pub use state::AppState;
