pub mod app;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod migrate;
pub mod predictions;
pub mod state;
pub mod store;
pub mod telemetry;

pub use backend::PersistenceBackend;
pub use error::StoreError;
