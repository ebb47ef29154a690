//! Invoice issuance: the one multi-step write of the system.
//!
//! [`issue_invoice`] runs inside a caller-owned [`UnitOfWork`]. It performs all of its
//! checks before the first write, so a rejected request never touches storage; any
//! failure after that point is undone by the caller rolling the unit of work back.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use garagebook_core::{CustomerId, DomainResult, InterventionId};
use garagebook_fleet::Intervention;
use garagebook_invoicing::{
    Invoice, InvoiceTotals, LineSelection, NewInvoice, NewLineItem, Rates, accept_lines,
    ensure_unbilled, next_invoice_number,
};

use crate::error::{WorkshopError, WorkshopResult};
use crate::store::UnitOfWork;

/// Everything needed to issue one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub customer_id: CustomerId,
    /// Existing unbilled interventions to put on the invoice. Duplicates are ignored.
    #[serde(default)]
    pub intervention_ids: Vec<InterventionId>,
    /// Lines entered while building the invoice; incomplete ones are dropped.
    #[serde(default)]
    pub new_lines: Vec<NewLineItem>,
    #[serde(default)]
    pub discount_pct: Option<f64>,
    #[serde(default)]
    pub tax_pct: Option<f64>,
}

impl InvoiceRequest {
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            intervention_ids: Vec::new(),
            new_lines: Vec::new(),
            discount_pct: None,
            tax_pct: None,
        }
    }

    /// Effective rates, falling back to `defaults` for any rate left unspecified.
    pub fn rates(&self, defaults: Rates) -> DomainResult<Rates> {
        Rates::new(
            self.discount_pct.unwrap_or(defaults.discount_pct),
            self.tax_pct.unwrap_or(defaults.tax_pct),
        )
    }
}

/// Issues an invoice inside `tx`.
///
/// Steps, in order:
/// 1. accept the new lines and reject an invoice with no lines at all;
/// 2. load the customer, every selected intervention, and the vehicle and billing
///    customer of every new line;
///    a selected intervention that is already billed is a conflict;
/// 3. compute the totals over selected and new prices;
/// 4. number the invoice after the highest invoice id seen by this transaction;
/// 5. insert the invoice, bind the selected interventions, then insert and bind the
///    new ones.
///
/// Two transactions issuing concurrently may compute the same number; the unique
/// number constraint makes the later commit fail.
#[tracing::instrument(skip(tx, request), fields(customer_id = %request.customer_id))]
pub async fn issue_invoice(
    tx: &mut dyn UnitOfWork,
    request: &InvoiceRequest,
    defaults: Rates,
    now: DateTime<Utc>,
) -> WorkshopResult<Invoice> {
    let customer_id = request.customer_id;
    let selection = LineSelection::new(request.intervention_ids.iter().copied());
    let accepted = accept_lines(&request.new_lines, customer_id);
    selection.ensure_non_empty(accepted.len())?;
    let rates = request.rates(defaults)?;

    if tx.customer(customer_id).await?.is_none() {
        return Err(WorkshopError::not_found(format!("customer {customer_id}")));
    }

    let mut selected: Vec<Intervention> = Vec::with_capacity(selection.len());
    for id in selection.ids() {
        let intervention = tx
            .intervention(*id)
            .await?
            .ok_or_else(|| WorkshopError::not_found(format!("intervention {id}")))?;
        ensure_unbilled(&intervention)?;
        selected.push(intervention);
    }
    for line in &accepted {
        if tx.vehicle(line.vehicle_id).await?.is_none() {
            return Err(WorkshopError::not_found(format!("vehicle {}", line.vehicle_id)));
        }
        if let Some(billed_to) = line.details.customer_id {
            if billed_to != customer_id && tx.customer(billed_to).await?.is_none() {
                return Err(WorkshopError::not_found(format!("customer {billed_to}")));
            }
        }
    }

    let prices = selected
        .iter()
        .map(Intervention::price)
        .chain(accepted.iter().map(|line| line.details.price));
    let totals = InvoiceTotals::compute(prices, rates);

    let number = next_invoice_number(now.year(), tx.highest_invoice_id().await?);
    let invoice = tx
        .insert_invoice(NewInvoice {
            customer_id,
            number,
            issued_at: now,
            amounts: totals.rounded(),
        })
        .await?;

    let line_count = selected.len() + accepted.len();
    for intervention in &selected {
        tx.bind_intervention(intervention.id, invoice.id).await?;
    }
    for line in accepted {
        let created = tx.insert_intervention(line.vehicle_id, line.details).await?;
        tx.bind_intervention(created.id, invoice.id).await?;
    }

    tracing::debug!(
        invoice_id = %invoice.id,
        number = %invoice.number,
        lines = line_count,
        "invoice issued"
    );
    Ok(invoice)
}
