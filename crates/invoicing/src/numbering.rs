//! Human-readable invoice numbers: `FAC-<year>-<seq>`.
//!
//! The sequence is derived from the highest existing invoice id, so two
//! transactions reading the same snapshot compute the same number. The store's
//! unique index on the number is what rejects the second one.

use garagebook_core::InvoiceId;

const PREFIX: &str = "FAC";

/// Number for the next invoice, given the highest id currently stored.
pub fn next_invoice_number(year: i32, highest_id: Option<InvoiceId>) -> String {
    let sequence = highest_id.map_or(0, InvoiceId::get) + 1;
    format!("{PREFIX}-{year}-{sequence:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_invoice_of_an_empty_store() {
        assert_eq!(next_invoice_number(2026, None), "FAC-2026-0001");
    }

    #[test]
    fn follows_the_highest_id() {
        assert_eq!(next_invoice_number(2026, Some(InvoiceId::new(41))), "FAC-2026-0042");
    }

    #[test]
    fn sequence_widens_past_four_digits() {
        assert_eq!(next_invoice_number(2027, Some(InvoiceId::new(12_344))), "FAC-2027-12345");
    }
}
