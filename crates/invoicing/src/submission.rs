//! Fiscal submission seam.
//!
//! Issued invoices may be reported to an external tax-compliance service.
//! [`FiscalSubmitter`] is the capability the invoicing workflow depends on; the
//! shipped [`UnimplementedSubmitter`] never talks to the network and always
//! reports failure. A real client can replace it without touching invoice logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use garagebook_fleet::{Customer, Intervention};

use crate::invoice::Invoice;

/// Everything a fiscal authority needs to know about one invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceDocument {
    pub invoice: Invoice,
    pub customer: Customer,
    pub lines: Vec<Intervention>,
}

/// Result reported by a submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub success: bool,
    pub message: String,
}

impl SubmissionOutcome {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait FiscalSubmitter: Send + Sync {
    /// Report one invoice. Failures are returned as an outcome, not raised.
    async fn submit(&self, document: &InvoiceDocument) -> SubmissionOutcome;
}

/// Placeholder submitter: performs no call and always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedSubmitter;

impl UnimplementedSubmitter {
    pub const MESSAGE: &'static str = "not implemented";
}

#[async_trait]
impl FiscalSubmitter for UnimplementedSubmitter {
    async fn submit(&self, _document: &InvoiceDocument) -> SubmissionOutcome {
        SubmissionOutcome::rejected(Self::MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use garagebook_core::{CustomerId, InterventionId, InvoiceId, VehicleId};
    use garagebook_fleet::{CustomerDetails, InterventionDetails};

    use crate::totals::{InvoiceTotals, Rates};

    fn document() -> InvoiceDocument {
        let issued_at = Utc.with_ymd_and_hms(2026, 4, 1, 9, 30, 0).unwrap();
        let customer = Customer {
            id: CustomerId::new(1),
            details: CustomerDetails::named("Ana Ruiz"),
            registered_at: issued_at,
        };
        let line = Intervention {
            id: InterventionId::new(5),
            vehicle_id: VehicleId::new(2),
            details: InterventionDetails::new(
                NaiveDate::from_ymd_opt(2026, 3, 30).unwrap(),
                "Clutch",
                500.0,
            ),
            invoice_id: Some(InvoiceId::new(1)),
        };
        let invoice = Invoice::from_new(
            InvoiceId::new(1),
            crate::invoice::NewInvoice {
                customer_id: customer.id,
                number: "FAC-2026-0001".to_string(),
                issued_at,
                amounts: InvoiceTotals::compute([500.0], Rates::default()).rounded(),
            },
        );
        InvoiceDocument {
            invoice,
            customer,
            lines: vec![line],
        }
    }

    #[tokio::test]
    async fn stub_always_reports_not_implemented() {
        let outcome = UnimplementedSubmitter.submit(&document()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "not implemented");
    }
}
