//! The workshop service: every command and query of the application.
//!
//! Each public method opens one [`UnitOfWork`], runs its steps against it and then
//! commits (commands) or releases it (queries). A command that fails at any step rolls
//! back, so storage never observes a half-applied command.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use garagebook_core::{CustomerId, InterventionId, InvoiceId, VehicleId};
use garagebook_fleet::{
    Customer, CustomerDetails, Intervention, InterventionBatch, InterventionDetails, Vehicle,
    VehicleDetails,
};
use garagebook_invoicing::{
    FiscalSubmitter, Invoice, InvoiceDocument, Rates, ensure_deletable, ensure_editable,
};

use crate::billing::{InvoiceRequest, issue_invoice};
use crate::error::{WorkshopError, WorkshopResult};
use crate::seed;
use crate::store::{Store, UnitOfWork};

/// A vehicle with its owner and full service history (newest first).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleCard {
    pub vehicle: Vehicle,
    pub owner: Option<Customer>,
    pub interventions: Vec<Intervention>,
}

/// What a caller needs to assemble a new invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceCandidates {
    pub customers: Vec<Customer>,
    pub unbilled: Vec<Intervention>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    AlreadySubmitted,
    Rejected,
}

/// Result of a fiscal submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReport {
    pub status: SubmissionStatus,
    pub message: String,
    pub invoice: Invoice,
}

#[derive(Clone)]
pub struct Workshop {
    store: Arc<dyn Store>,
    submitter: Arc<dyn FiscalSubmitter>,
    rates: Rates,
    clock: fn() -> DateTime<Utc>,
    /// Held for the whole of a submission, from the "already submitted?" read to the write.
    submissions: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Workshop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workshop")
            .field("rates", &self.rates)
            .finish_non_exhaustive()
    }
}

/// Commits on success; otherwise rolls back and hands the original error back.
async fn finish<T>(
    tx: Box<dyn UnitOfWork>,
    operation: &'static str,
    result: WorkshopResult<T>,
) -> WorkshopResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            warn!(operation, error = %err, "command rejected");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(operation, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Ends a read-only unit of work.
async fn release<T>(tx: Box<dyn UnitOfWork>, result: WorkshopResult<T>) -> WorkshopResult<T> {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "releasing read transaction failed");
    }
    result
}

async fn require_customer(tx: &mut dyn UnitOfWork, id: CustomerId) -> WorkshopResult<Customer> {
    tx.customer(id)
        .await?
        .ok_or_else(|| WorkshopError::not_found(format!("customer {id}")))
}

async fn require_vehicle(tx: &mut dyn UnitOfWork, id: VehicleId) -> WorkshopResult<Vehicle> {
    tx.vehicle(id)
        .await?
        .ok_or_else(|| WorkshopError::not_found(format!("vehicle {id}")))
}

async fn require_intervention(
    tx: &mut dyn UnitOfWork,
    id: InterventionId,
) -> WorkshopResult<Intervention> {
    tx.intervention(id)
        .await?
        .ok_or_else(|| WorkshopError::not_found(format!("intervention {id}")))
}

async fn require_invoice(tx: &mut dyn UnitOfWork, id: InvoiceId) -> WorkshopResult<Invoice> {
    tx.invoice(id)
        .await?
        .ok_or_else(|| WorkshopError::not_found(format!("invoice {id}")))
}

fn already_submitted(invoice: Invoice) -> SubmissionReport {
    SubmissionReport {
        status: SubmissionStatus::AlreadySubmitted,
        message: format!("invoice {} was already submitted", invoice.number),
        invoice,
    }
}

async fn load_document(tx: &mut dyn UnitOfWork, id: InvoiceId) -> WorkshopResult<InvoiceDocument> {
    let invoice = require_invoice(tx, id).await?;
    let customer = require_customer(tx, invoice.customer_id).await?;
    let lines = tx.interventions_for_invoice(id).await?;
    Ok(InvoiceDocument {
        invoice,
        customer,
        lines,
    })
}

impl Workshop {
    pub fn new(store: Arc<dyn Store>, submitter: Arc<dyn FiscalSubmitter>) -> Self {
        Self {
            store,
            submitter,
            rates: Rates::default(),
            clock: Utc::now,
            submissions: Arc::new(Mutex::new(())),
        }
    }

    /// Rates applied when an invoice request leaves them unspecified.
    pub fn with_default_rates(mut self, rates: Rates) -> Self {
        self.rates = rates;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_rates(&self) -> Rates {
        self.rates
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn begin(&self) -> WorkshopResult<Box<dyn UnitOfWork>> {
        Ok(self.store.begin().await?)
    }

    // ---- customers ----

    pub async fn list_customers(&self) -> WorkshopResult<Vec<Customer>> {
        let mut tx = self.begin().await?;
        let result = tx.customers().await.map_err(WorkshopError::from);
        release(tx, result).await
    }

    pub async fn customer(&self, id: CustomerId) -> WorkshopResult<Customer> {
        let mut tx = self.begin().await?;
        let result = require_customer(tx.as_mut(), id).await;
        release(tx, result).await
    }

    #[instrument(skip(self, details), err)]
    pub async fn register_customer(&self, details: CustomerDetails) -> WorkshopResult<Customer> {
        let now = self.now();
        let mut tx = self.begin().await?;
        let result = async {
            let details = details.validate()?;
            Ok::<_, WorkshopError>(tx.insert_customer(details, now).await?)
        }
        .await;
        let customer = finish(tx, "register_customer", result).await?;
        info!(customer_id = %customer.id, "customer registered");
        Ok(customer)
    }

    #[instrument(skip(self, details), err)]
    pub async fn update_customer(
        &self,
        id: CustomerId,
        details: CustomerDetails,
    ) -> WorkshopResult<Customer> {
        let mut tx = self.begin().await?;
        let result = async {
            let details = details.validate()?;
            require_customer(tx.as_mut(), id).await?;
            Ok::<_, WorkshopError>(tx.update_customer(id, details).await?)
        }
        .await;
        let customer = finish(tx, "update_customer", result).await?;
        info!(customer_id = %id, "customer updated");
        Ok(customer)
    }

    /// Deletes a customer that has never been invoiced.
    ///
    /// Its vehicles are kept without an owner and interventions billed to it lose their
    /// billing customer.
    #[instrument(skip(self), err)]
    pub async fn delete_customer(&self, id: CustomerId) -> WorkshopResult<()> {
        let mut tx = self.begin().await?;
        let result = async {
            require_customer(tx.as_mut(), id).await?;
            let invoices = tx.count_invoices_for_customer(id).await?;
            if invoices > 0 {
                return Err(WorkshopError::conflict(format!(
                    "customer {id} has {invoices} invoice(s) and cannot be deleted"
                )));
            }
            let detached = tx.detach_vehicles(id).await?;
            let cleared = tx.clear_billing_customer(id).await?;
            tx.delete_customer(id).await?;
            Ok::<_, WorkshopError>((detached, cleared))
        }
        .await;
        let (detached, cleared) = finish(tx, "delete_customer", result).await?;
        info!(customer_id = %id, detached, cleared, "customer deleted");
        Ok(())
    }

    // ---- vehicles ----

    pub async fn list_vehicles(&self) -> WorkshopResult<Vec<Vehicle>> {
        let mut tx = self.begin().await?;
        let result = tx.vehicles().await.map_err(WorkshopError::from);
        release(tx, result).await
    }

    pub async fn vehicle(&self, id: VehicleId) -> WorkshopResult<Vehicle> {
        let mut tx = self.begin().await?;
        let result = require_vehicle(tx.as_mut(), id).await;
        release(tx, result).await
    }

    pub async fn vehicle_card(&self, id: VehicleId) -> WorkshopResult<VehicleCard> {
        let mut tx = self.begin().await?;
        let result = async {
            let vehicle = require_vehicle(tx.as_mut(), id).await?;
            let owner = match vehicle.owner_id() {
                Some(owner_id) => tx.customer(owner_id).await?,
                None => None,
            };
            let interventions = tx.interventions_for_vehicle(id).await?;
            Ok::<_, WorkshopError>(VehicleCard {
                vehicle,
                owner,
                interventions,
            })
        }
        .await;
        release(tx, result).await
    }

    #[instrument(skip(self, details), err)]
    pub async fn register_vehicle(&self, details: VehicleDetails) -> WorkshopResult<Vehicle> {
        let now = self.now();
        let mut tx = self.begin().await?;
        let result = async {
            let details = details.validate()?;
            if let Some(owner) = details.owner_id {
                require_customer(tx.as_mut(), owner).await?;
            }
            Ok::<_, WorkshopError>(tx.insert_vehicle(details, now).await?)
        }
        .await;
        let vehicle = finish(tx, "register_vehicle", result).await?;
        info!(vehicle_id = %vehicle.id, plate = %vehicle.plate(), "vehicle registered");
        Ok(vehicle)
    }

    #[instrument(skip(self, details), err)]
    pub async fn update_vehicle(
        &self,
        id: VehicleId,
        details: VehicleDetails,
    ) -> WorkshopResult<Vehicle> {
        let mut tx = self.begin().await?;
        let result = async {
            let details = details.validate()?;
            require_vehicle(tx.as_mut(), id).await?;
            if let Some(owner) = details.owner_id {
                require_customer(tx.as_mut(), owner).await?;
            }
            Ok::<_, WorkshopError>(tx.update_vehicle(id, details).await?)
        }
        .await;
        let vehicle = finish(tx, "update_vehicle", result).await?;
        info!(vehicle_id = %id, "vehicle updated");
        Ok(vehicle)
    }

    /// Deletes a vehicle together with its interventions, provided none was invoiced.
    #[instrument(skip(self), err)]
    pub async fn delete_vehicle(&self, id: VehicleId) -> WorkshopResult<()> {
        let mut tx = self.begin().await?;
        let result = async {
            require_vehicle(tx.as_mut(), id).await?;
            let history = tx.interventions_for_vehicle(id).await?;
            if let Some(billed) = history.iter().find(|i| i.is_billed()) {
                return Err(WorkshopError::conflict(format!(
                    "vehicle {id} has invoiced intervention {} and cannot be deleted",
                    billed.id
                )));
            }
            let removed = tx.delete_interventions_for_vehicle(id).await?;
            tx.delete_vehicle(id).await?;
            Ok::<_, WorkshopError>(removed)
        }
        .await;
        let removed = finish(tx, "delete_vehicle", result).await?;
        info!(vehicle_id = %id, interventions = removed, "vehicle deleted");
        Ok(())
    }

    // ---- interventions ----

    pub async fn intervention(&self, id: InterventionId) -> WorkshopResult<Intervention> {
        let mut tx = self.begin().await?;
        let result = require_intervention(tx.as_mut(), id).await;
        release(tx, result).await
    }

    pub async fn unbilled_interventions(&self) -> WorkshopResult<Vec<Intervention>> {
        let mut tx = self.begin().await?;
        let result = tx.unbilled_interventions().await.map_err(WorkshopError::from);
        release(tx, result).await
    }

    /// Records every non-blank line of `batch` as an unbilled intervention on the vehicle.
    #[instrument(skip(self, batch), err)]
    pub async fn record_interventions(
        &self,
        vehicle_id: VehicleId,
        batch: InterventionBatch,
    ) -> WorkshopResult<Vec<Intervention>> {
        let mut tx = self.begin().await?;
        let result = async {
            let lines = batch.into_details()?;
            require_vehicle(tx.as_mut(), vehicle_id).await?;
            if let Some(customer) = lines.first().and_then(|line| line.customer_id) {
                require_customer(tx.as_mut(), customer).await?;
            }
            let mut recorded = Vec::with_capacity(lines.len());
            for details in lines {
                recorded.push(tx.insert_intervention(vehicle_id, details).await?);
            }
            Ok::<_, WorkshopError>(recorded)
        }
        .await;
        let recorded = finish(tx, "record_interventions", result).await?;
        info!(vehicle_id = %vehicle_id, lines = recorded.len(), "interventions recorded");
        Ok(recorded)
    }

    /// Edits an intervention that is not yet on an invoice.
    #[instrument(skip(self, details), err)]
    pub async fn update_intervention(
        &self,
        id: InterventionId,
        details: InterventionDetails,
    ) -> WorkshopResult<Intervention> {
        let mut tx = self.begin().await?;
        let result = async {
            let current = require_intervention(tx.as_mut(), id).await?;
            ensure_editable(&current)?;
            let details = details.validate()?;
            if let Some(customer) = details.customer_id {
                require_customer(tx.as_mut(), customer).await?;
            }
            Ok::<_, WorkshopError>(tx.update_intervention(id, details).await?)
        }
        .await;
        let intervention = finish(tx, "update_intervention", result).await?;
        info!(intervention_id = %id, "intervention updated");
        Ok(intervention)
    }

    /// Deletes an unbilled intervention. Invoiced interventions are permanent.
    #[instrument(skip(self), err)]
    pub async fn delete_intervention(&self, id: InterventionId) -> WorkshopResult<()> {
        let mut tx = self.begin().await?;
        let result = async {
            let current = require_intervention(tx.as_mut(), id).await?;
            ensure_deletable(&current)?;
            Ok::<_, WorkshopError>(tx.delete_intervention(id).await?)
        }
        .await;
        finish(tx, "delete_intervention", result).await?;
        info!(intervention_id = %id, "intervention deleted");
        Ok(())
    }

    // ---- invoices ----

    pub async fn list_invoices(&self) -> WorkshopResult<Vec<Invoice>> {
        let mut tx = self.begin().await?;
        let result = tx.invoices().await.map_err(WorkshopError::from);
        release(tx, result).await
    }

    pub async fn invoice_view(&self, id: InvoiceId) -> WorkshopResult<InvoiceDocument> {
        let mut tx = self.begin().await?;
        let result = load_document(tx.as_mut(), id).await;
        release(tx, result).await
    }

    pub async fn invoice_candidates(&self) -> WorkshopResult<InvoiceCandidates> {
        let mut tx = self.begin().await?;
        let result = async {
            let customers = tx.customers().await?;
            let unbilled = tx.unbilled_interventions().await?;
            Ok::<_, WorkshopError>(InvoiceCandidates {
                customers,
                unbilled,
            })
        }
        .await;
        release(tx, result).await
    }

    /// Issues one invoice over selected and newly entered lines, all or nothing.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id), err)]
    pub async fn compute_invoice(&self, request: InvoiceRequest) -> WorkshopResult<Invoice> {
        let now = self.now();
        let mut tx = self.begin().await?;
        let result = issue_invoice(tx.as_mut(), &request, self.rates, now).await;
        let invoice = finish(tx, "compute_invoice", result).await?;
        info!(
            invoice_id = %invoice.id,
            number = %invoice.number,
            total = invoice.total(),
            "invoice issued"
        );
        Ok(invoice)
    }

    /// Reports an invoice to the fiscal submitter.
    ///
    /// An invoice already submitted is reported as such without calling the submitter.
    /// A rejected submission leaves the invoice untouched. Submissions through one
    /// `Workshop` run one at a time, so concurrent requests for the same invoice reach
    /// the submitter once.
    #[instrument(skip(self), err)]
    pub async fn submit_invoice(&self, id: InvoiceId) -> WorkshopResult<SubmissionReport> {
        let _gate = self.submissions.lock().await;

        let mut tx = self.begin().await?;
        let result = load_document(tx.as_mut(), id).await;
        let document = release(tx, result).await?;

        if document.invoice.submitted {
            return Ok(already_submitted(document.invoice));
        }

        let outcome = self.submitter.submit(&document).await;
        if !outcome.success {
            warn!(invoice_id = %id, message = %outcome.message, "fiscal submission rejected");
            return Ok(SubmissionReport {
                status: SubmissionStatus::Rejected,
                message: outcome.message,
                invoice: document.invoice,
            });
        }

        let now = self.now();
        let mut tx = self.begin().await?;
        let result = async {
            let marked = tx.mark_invoice_submitted(id, now).await?;
            let invoice = require_invoice(tx.as_mut(), id).await?;
            Ok::<_, WorkshopError>((marked, invoice))
        }
        .await;
        let (marked, invoice) = finish(tx, "submit_invoice", result).await?;

        if !marked {
            // Another process flagged it between our read and our write.
            warn!(invoice_id = %id, "invoice was submitted concurrently; keeping the stored timestamp");
            return Ok(already_submitted(invoice));
        }

        info!(invoice_id = %id, number = %invoice.number, "invoice submitted");
        Ok(SubmissionReport {
            status: SubmissionStatus::Submitted,
            message: outcome.message,
            invoice,
        })
    }

    // ---- demo data ----

    /// Inserts a small demo dataset into an empty store. Returns whether anything was inserted.
    pub async fn seed_demo_data(&self) -> WorkshopResult<bool> {
        let now = self.now();
        let mut tx = self.begin().await?;
        let result = seed::seed_demo(tx.as_mut(), now).await;
        finish(tx, "seed_demo_data", result).await
    }
}
