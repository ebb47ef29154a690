//! Rules binding interventions to invoices.
//!
//! - an intervention is billed on at most one invoice, ever;
//! - a billed intervention can be neither deleted nor edited;
//! - there is no way to un-bill a line.

use garagebook_core::{DomainError, DomainResult, InterventionId};
use garagebook_fleet::Intervention;

/// Existing interventions picked for a new invoice, duplicates collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSelection {
    ids: Vec<InterventionId>,
}

impl LineSelection {
    pub fn new(ids: impl IntoIterator<Item = InterventionId>) -> Self {
        let mut unique: Vec<InterventionId> = Vec::new();
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self { ids: unique }
    }

    pub fn ids(&self) -> &[InterventionId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// An invoice needs at least one line, selected or newly entered.
    pub fn ensure_non_empty(&self, new_lines: usize) -> DomainResult<()> {
        if self.ids.is_empty() && new_lines == 0 {
            return Err(DomainError::validation("no line items"));
        }
        Ok(())
    }
}

/// A line may be put on an invoice only while it is unbilled.
pub fn ensure_unbilled(intervention: &Intervention) -> DomainResult<()> {
    match intervention.invoice_id {
        Some(invoice_id) => Err(DomainError::conflict(format!(
            "intervention {} already invoiced (invoice {invoice_id})",
            intervention.id
        ))),
        None => Ok(()),
    }
}

pub fn ensure_deletable(intervention: &Intervention) -> DomainResult<()> {
    if intervention.is_billed() {
        return Err(DomainError::conflict(format!(
            "cannot delete invoiced intervention {}",
            intervention.id
        )));
    }
    Ok(())
}

pub fn ensure_editable(intervention: &Intervention) -> DomainResult<()> {
    if intervention.is_billed() {
        return Err(DomainError::conflict(format!(
            "cannot edit invoiced intervention {}",
            intervention.id
        )));
    }
    Ok(())
}
