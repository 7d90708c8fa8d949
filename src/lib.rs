pub mod cache;
pub mod compactor;
pub mod error;
pub mod gate;
pub mod http;
pub mod limits;
pub mod model;
pub mod observability;
pub mod repository;
pub mod scheduler;
pub mod store;
pub mod wal;
