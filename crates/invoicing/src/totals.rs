//! Invoice arithmetic: base, discount, tax and total.
//!
//! Amounts accumulate in full `f64` precision; rounding to cents happens only
//! when the persisted amounts are produced ([`InvoiceTotals::rounded`]).

use serde::{Deserialize, Serialize};

use garagebook_core::{DomainError, DomainResult};

use crate::invoice::InvoiceAmounts;

/// Default VAT rate applied when the caller does not specify one.
pub const DEFAULT_TAX_PCT: f64 = 21.0;

/// Discount and tax percentages for one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub discount_pct: f64,
    pub tax_pct: f64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            discount_pct: 0.0,
            tax_pct: DEFAULT_TAX_PCT,
        }
    }
}

impl Rates {
    pub fn new(discount_pct: f64, tax_pct: f64) -> DomainResult<Self> {
        if !discount_pct.is_finite() || !(0.0..=100.0).contains(&discount_pct) {
            return Err(DomainError::validation(format!(
                "discount percentage must be between 0 and 100, got {discount_pct}"
            )));
        }
        if !tax_pct.is_finite() || tax_pct < 0.0 {
            return Err(DomainError::validation(format!(
                "tax percentage must be zero or positive, got {tax_pct}"
            )));
        }
        Ok(Self {
            discount_pct,
            tax_pct,
        })
    }
}

/// Unrounded totals of an invoice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvoiceTotals {
    pub rates: Rates,
    pub base: f64,
    pub discount_amount: f64,
    pub taxable_base: f64,
    pub tax_amount: f64,
    pub total: f64,
}

impl InvoiceTotals {
    /// Compute totals over line prices, each taken at face value.
    pub fn compute<I>(prices: I, rates: Rates) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let base: f64 = prices.into_iter().sum();
        let discount_amount = base * (rates.discount_pct / 100.0);
        let taxable_base = base - discount_amount;
        let tax_amount = taxable_base * (rates.tax_pct / 100.0);
        let total = taxable_base + tax_amount;

        Self {
            rates,
            base,
            discount_amount,
            taxable_base,
            tax_amount,
            total,
        }
    }

    /// Amounts as persisted and displayed (cents precision).
    pub fn rounded(&self) -> InvoiceAmounts {
        InvoiceAmounts {
            base: round_currency(self.base),
            discount_pct: self.rates.discount_pct,
            discount_amount: round_currency(self.discount_amount),
            tax_pct: self.rates.tax_pct,
            tax_amount: round_currency(self.tax_amount),
            total: round_currency(self.total),
        }
    }
}

/// Round to two decimal places (half away from zero).
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn reference_invoice_matches_hand_computation() {
        let totals = InvoiceTotals::compute([100.0, 50.0], Rates::new(10.0, 21.0).unwrap());
        let amounts = totals.rounded();

        assert!(close(amounts.base, 150.00));
        assert!(close(amounts.discount_amount, 15.00));
        assert!(close(round_currency(totals.taxable_base), 135.00));
        assert!(close(amounts.tax_amount, 28.35));
        assert!(close(amounts.total, 163.35));
    }

    #[test]
    fn default_rates_are_no_discount_and_standard_vat() {
        let totals = InvoiceTotals::compute([200.0], Rates::default());
        let amounts = totals.rounded();
        assert!(close(amounts.discount_amount, 0.0));
        assert!(close(amounts.tax_amount, 42.0));
        assert!(close(amounts.total, 242.0));
    }

    #[test]
    fn intermediate_values_are_not_rounded() {
        // 3 x 0.333 = 0.999; rounding each step would lose the tax cents.
        let totals = InvoiceTotals::compute([0.333, 0.333, 0.333], Rates::new(0.0, 21.0).unwrap());
        assert!(close(totals.base, 0.999));
        assert!(close(totals.tax_amount, 0.999 * 0.21));
        assert!(close(totals.rounded().total, 1.21));
    }

    #[test]
    fn empty_price_list_totals_zero() {
        let totals = InvoiceTotals::compute(std::iter::empty(), Rates::default());
        assert_eq!(totals.rounded().total, 0.0);
    }

    #[test]
    fn out_of_range_rates_are_rejected() {
        assert!(matches!(Rates::new(-1.0, 21.0), Err(DomainError::Validation(_))));
        assert!(matches!(Rates::new(100.5, 21.0), Err(DomainError::Validation(_))));
        assert!(matches!(Rates::new(0.0, -4.0), Err(DomainError::Validation(_))));
        assert!(matches!(Rates::new(f64::NAN, 21.0), Err(DomainError::Validation(_))));
        assert!(Rates::new(100.0, 0.0).is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 1000,
            ..ProptestConfig::default()
        })]

        /// Property: the rounded total equals the closed-form expression, rounded once.
        #[test]
        fn total_matches_closed_form(
            cents in proptest::collection::vec(0u32..1_000_000, 1..20),
            discount in 0u32..=100,
            tax in 0u32..=30,
        ) {
            let prices: Vec<f64> = cents.iter().map(|c| f64::from(*c) / 100.0).collect();
            let rates = Rates::new(f64::from(discount), f64::from(tax)).unwrap();
            let totals = InvoiceTotals::compute(prices.iter().copied(), rates);

            let base: f64 = prices.iter().sum();
            let expected = round_currency(
                base * (1.0 - f64::from(discount) / 100.0) * (1.0 + f64::from(tax) / 100.0),
            );
            prop_assert!((totals.rounded().total - expected).abs() <= 0.010_000_1);
            prop_assert!((totals.total - base * (1.0 - f64::from(discount) / 100.0) * (1.0 + f64::from(tax) / 100.0)).abs() < 1e-6);
        }

        /// Property: base is the plain sum of line prices.
        #[test]
        fn base_is_sum_of_prices(cents in proptest::collection::vec(0u32..100_000, 0..30)) {
            let prices: Vec<f64> = cents.iter().map(|c| f64::from(*c) / 100.0).collect();
            let totals = InvoiceTotals::compute(prices.iter().copied(), Rates::default());
            let expected: f64 = prices.iter().sum();
            prop_assert!((totals.base - expected).abs() < 1e-9);
        }
    }
}
