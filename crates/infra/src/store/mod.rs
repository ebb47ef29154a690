//! Transactional storage for the workshop records.
//!
//! Every command of the [`Workshop`](crate::workshop::Workshop) service runs inside one
//! [`UnitOfWork`]: a transaction opened with [`Store::begin`] and closed with either
//! [`UnitOfWork::commit`] or [`UnitOfWork::rollback`]. Nothing a unit of work writes is
//! visible to other units of work until it commits.
//!
//! Two backends exist:
//! - [`InMemoryStore`]: snapshot transactions, for tests and local runs.
//! - [`SqliteStore`]: the persistent store, backed by `sqlx` and SQLite.
//!
//! Both enforce the same relational constraints (unique plate, unique national id,
//! unique invoice number, referential integrity) and surface violations as
//! [`StoreError`] values.

mod in_memory;
pub mod schema;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use garagebook_core::{CustomerId, InterventionId, InvoiceId, VehicleId};
use garagebook_fleet::{
    Customer, CustomerDetails, Intervention, InterventionDetails, Vehicle, VehicleDetails,
};
use garagebook_invoicing::{Invoice, NewInvoice};

use crate::config::DatabaseConfig;

pub use in_memory::{InMemoryStore, InMemoryUnitOfWork};
pub use sqlite::{SqliteStore, SqliteUnitOfWork};

/// Storage-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("row not found: {0}")]
    RowNotFound(String),

    /// A conditional bind found the intervention already attached to an invoice.
    #[error("intervention {0} is already bound to an invoice")]
    AlreadyBound(InterventionId),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A storage backend that can open transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        (**self).begin().await
    }
}

/// One open transaction.
///
/// Listing methods return rows in their display order:
/// customers by name, vehicles by plate, invoices and interventions newest first.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn customer(&mut self, id: CustomerId) -> StoreResult<Option<Customer>>;
    async fn customers(&mut self) -> StoreResult<Vec<Customer>>;
    async fn insert_customer(
        &mut self,
        details: CustomerDetails,
        registered_at: DateTime<Utc>,
    ) -> StoreResult<Customer>;
    async fn update_customer(
        &mut self,
        id: CustomerId,
        details: CustomerDetails,
    ) -> StoreResult<Customer>;
    async fn delete_customer(&mut self, id: CustomerId) -> StoreResult<()>;

    async fn vehicle(&mut self, id: VehicleId) -> StoreResult<Option<Vehicle>>;
    async fn vehicles(&mut self) -> StoreResult<Vec<Vehicle>>;
    async fn insert_vehicle(
        &mut self,
        details: VehicleDetails,
        registered_at: DateTime<Utc>,
    ) -> StoreResult<Vehicle>;
    async fn update_vehicle(&mut self, id: VehicleId, details: VehicleDetails)
    -> StoreResult<Vehicle>;
    async fn delete_vehicle(&mut self, id: VehicleId) -> StoreResult<()>;
    /// Clears the owner of every vehicle owned by `owner`. Returns the number of rows touched.
    async fn detach_vehicles(&mut self, owner: CustomerId) -> StoreResult<u64>;

    async fn intervention(&mut self, id: InterventionId) -> StoreResult<Option<Intervention>>;
    async fn interventions_for_vehicle(&mut self, id: VehicleId)
    -> StoreResult<Vec<Intervention>>;
    /// Lines of an invoice, in insertion order.
    async fn interventions_for_invoice(&mut self, id: InvoiceId)
    -> StoreResult<Vec<Intervention>>;
    async fn unbilled_interventions(&mut self) -> StoreResult<Vec<Intervention>>;
    async fn insert_intervention(
        &mut self,
        vehicle_id: VehicleId,
        details: InterventionDetails,
    ) -> StoreResult<Intervention>;
    async fn update_intervention(
        &mut self,
        id: InterventionId,
        details: InterventionDetails,
    ) -> StoreResult<Intervention>;
    async fn delete_intervention(&mut self, id: InterventionId) -> StoreResult<()>;
    async fn delete_interventions_for_vehicle(&mut self, id: VehicleId) -> StoreResult<u64>;
    /// Clears the billing customer of every intervention billed to `customer`.
    async fn clear_billing_customer(&mut self, customer: CustomerId) -> StoreResult<u64>;
    /// Attaches an unbilled intervention to an invoice.
    ///
    /// The write is conditional on the intervention still being unbilled; otherwise it
    /// fails with [`StoreError::AlreadyBound`].
    async fn bind_intervention(
        &mut self,
        id: InterventionId,
        invoice: InvoiceId,
    ) -> StoreResult<()>;

    async fn invoice(&mut self, id: InvoiceId) -> StoreResult<Option<Invoice>>;
    async fn invoices(&mut self) -> StoreResult<Vec<Invoice>>;
    async fn count_invoices_for_customer(&mut self, id: CustomerId) -> StoreResult<u64>;
    async fn highest_invoice_id(&mut self) -> StoreResult<Option<InvoiceId>>;
    async fn insert_invoice(&mut self, invoice: NewInvoice) -> StoreResult<Invoice>;
    /// Flags an invoice as submitted at `at`.
    ///
    /// Conditional on the invoice not being submitted yet: returns `false`, leaving the
    /// stored timestamp alone, when it already was.
    async fn mark_invoice_submitted(
        &mut self,
        id: InvoiceId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Opens the configured store, bringing a SQLite schema up to date first.
pub async fn open_store(config: &DatabaseConfig) -> StoreResult<Arc<dyn Store>> {
    match config {
        DatabaseConfig::InMemory => Ok(Arc::new(InMemoryStore::new())),
        DatabaseConfig::Sqlite(url) => {
            let store = SqliteStore::connect(url).await?;
            let applied = store.migrate().await?;
            tracing::info!(applied, "database schema ready");
            Ok(Arc::new(store))
        }
    }
}
