//! Workshop entity model: customers, their vehicles and the interventions
//! performed on them.
//!
//! Pure structural validation only (no IO, no storage). Uniqueness of plates
//! and national IDs is a storage constraint and is enforced there.

pub mod customer;
pub mod intervention;
pub mod vehicle;

pub use customer::{Customer, CustomerDetails};
pub use intervention::{BatchLine, Intervention, InterventionBatch, InterventionDetails};
pub use vehicle::{Plate, Vehicle, VehicleDetails};

/// Trim an optional text field, mapping blank input to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
