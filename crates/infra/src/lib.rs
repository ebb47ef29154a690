//! Infrastructure layer: storage backends, the workshop service and configuration.

pub mod billing;
pub mod config;
pub mod error;
pub mod seed;
pub mod store;
pub mod workshop;


pub use billing::{InvoiceRequest, issue_invoice};
pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use error::{ErrorKind, WorkshopError, WorkshopResult};
pub use store::{
    InMemoryStore, SqliteStore, Store, StoreError, StoreResult, UnitOfWork, open_store,
};
pub use workshop::{
    InvoiceCandidates, SubmissionReport, SubmissionStatus, VehicleCard, Workshop,
};
