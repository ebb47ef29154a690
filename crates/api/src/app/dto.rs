use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use garagebook_core::{CustomerId, DomainResult};
use garagebook_fleet::{Plate, VehicleDetails};
use garagebook_invoicing::InvoiceDocument;

/// Vehicle registration / edit body. The plate arrives as free text and is
/// normalized here so a blank plate is a validation error rather than a body rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleRequest {
    pub plate: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub owner_id: Option<CustomerId>,
}

impl VehicleRequest {
    pub fn into_details(self) -> DomainResult<VehicleDetails> {
        Ok(VehicleDetails {
            make: self.make,
            model: self.model,
            kind: self.kind,
            year: self.year,
            color: self.color,
            owner_id: self.owner_id,
            ..VehicleDetails::new(Plate::parse(&self.plate)?)
        })
    }
}

pub fn items<T: Serialize>(items: Vec<T>) -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub fn ok<T: Serialize>(body: T) -> axum::response::Response {
    (StatusCode::OK, Json(body)).into_response()
}

pub fn created<T: Serialize>(body: T) -> axum::response::Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

/// Invoice header with its derived taxable base, customer and lines.
pub fn invoice_view_to_json(document: InvoiceDocument) -> serde_json::Value {
    let taxable_base = document.invoice.amounts.taxable_base();
    serde_json::json!({
        "invoice": document.invoice,
        "taxable_base": taxable_base,
        "customer": document.customer,
        "lines": document.lines,
    })
}
