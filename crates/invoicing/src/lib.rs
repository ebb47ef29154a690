//! Invoicing domain module.
//!
//! This crate contains the business rules for turning interventions into
//! invoices (totals arithmetic, numbering, which lines may be billed) and the
//! fiscal-submission seam, implemented purely as deterministic domain logic
//! (no storage, no HTTP).

pub mod binding;
pub mod invoice;
pub mod lines;
pub mod numbering;
pub mod submission;
pub mod totals;

pub use binding::{LineSelection, ensure_deletable, ensure_editable, ensure_unbilled};
pub use invoice::{Invoice, InvoiceAmounts, NewInvoice};
pub use lines::{AcceptedLine, FormValue, NewLineItem, accept_lines};
pub use numbering::next_invoice_number;
pub use submission::{
    FiscalSubmitter, InvoiceDocument, SubmissionOutcome, UnimplementedSubmitter,
};
pub use totals::{DEFAULT_TAX_PCT, InvoiceTotals, Rates, round_currency};
