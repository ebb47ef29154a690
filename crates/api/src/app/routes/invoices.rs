use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    routing::{get, post},
};

use garagebook_core::InvoiceId;
use garagebook_infra::InvoiceRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices).post(compute_invoice))
        .route("/candidates", get(invoice_candidates))
        .route("/:id", get(invoice_view))
        .route("/:id/submit", post(submit_invoice))
}

fn parse_invoice_id(raw: &str) -> Result<InvoiceId, axum::response::Response> {
    errors::parse_id(raw, "invoice")
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.workshop.list_invoices().await {
        Ok(invoices) => dto::items(invoices),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

/// Customers and unbilled interventions, i.e. what a new invoice can be built from.
pub async fn invoice_candidates(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.workshop.invoice_candidates().await {
        Ok(candidates) => dto::ok(candidates),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn compute_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<InvoiceRequest>,
) -> axum::response::Response {
    match services.workshop.compute_invoice(body).await {
        Ok(invoice) => dto::created(invoice),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn invoice_view(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_invoice_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.invoice_view(id).await {
        Ok(document) => dto::ok(dto::invoice_view_to_json(document)),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn submit_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_invoice_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.submit_invoice(id).await {
        Ok(report) => dto::ok(report),
        Err(e) => errors::workshop_error_to_response(e),
    }
}
