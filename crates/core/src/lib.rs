//! `garagebook-core`: ids, the domain error and the entity traits shared by every crate.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, InterventionId, InvoiceId, VehicleId};
pub use value_object::ValueObject;
