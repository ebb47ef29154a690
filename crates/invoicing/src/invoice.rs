use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use garagebook_core::{CustomerId, Entity, InvoiceId};

/// Monetary figures of an issued invoice, rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAmounts {
    /// Sum of line prices before discount.
    pub base: f64,
    pub discount_pct: f64,
    pub discount_amount: f64,
    pub tax_pct: f64,
    pub tax_amount: f64,
    pub total: f64,
}

impl InvoiceAmounts {
    /// Taxable base (base imponible): base minus discount.
    pub fn taxable_base(&self) -> f64 {
        crate::totals::round_currency(self.base - self.discount_amount)
    }
}

/// An invoice ready to be inserted (the store assigns its id).
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub customer_id: CustomerId,
    pub number: String,
    pub issued_at: DateTime<Utc>,
    pub amounts: InvoiceAmounts,
}

/// An issued invoice.
///
/// Lines are the interventions whose `invoice_id` points here. Once issued,
/// only the submission flags ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    pub number: String,
    pub issued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub amounts: InvoiceAmounts,
    pub submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn from_new(id: InvoiceId, new: NewInvoice) -> Self {
        Self {
            id,
            customer_id: new.customer_id,
            number: new.number,
            issued_at: new.issued_at,
            amounts: new.amounts,
            submitted: false,
            submitted_at: None,
        }
    }

    pub fn total(&self) -> f64 {
        self.amounts.total
    }

    /// Record a successful fiscal submission.
    pub fn mark_submitted(&mut self, at: DateTime<Utc>) {
        self.submitted = true;
        self.submitted_at = Some(at);
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
