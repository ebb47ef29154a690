use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use garagebook_core::VehicleId;
use garagebook_fleet::InterventionBatch;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_vehicles).post(register_vehicle))
        .route(
            "/:id",
            get(vehicle_card).put(update_vehicle).delete(delete_vehicle),
        )
        .route("/:id/interventions", post(record_interventions))
}

fn parse_vehicle_id(raw: &str) -> Result<VehicleId, axum::response::Response> {
    errors::parse_id(raw, "vehicle")
}

pub async fn list_vehicles(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.workshop.list_vehicles().await {
        Ok(vehicles) => dto::items(vehicles),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn register_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::VehicleRequest>,
) -> axum::response::Response {
    let details = match body.into_details() {
        Ok(details) => details,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.workshop.register_vehicle(details).await {
        Ok(vehicle) => dto::created(vehicle),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

/// Vehicle with its owner and service history.
pub async fn vehicle_card(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_vehicle_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.vehicle_card(id).await {
        Ok(card) => dto::ok(card),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn update_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::VehicleRequest>,
) -> axum::response::Response {
    let id = match parse_vehicle_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let details = match body.into_details() {
        Ok(details) => details,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.workshop.update_vehicle(id, details).await {
        Ok(vehicle) => dto::ok(vehicle),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn delete_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_vehicle_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.delete_vehicle(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn record_interventions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<InterventionBatch>,
) -> axum::response::Response {
    let id = match parse_vehicle_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.record_interventions(id, body).await {
        Ok(recorded) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "items": recorded })),
        )
            .into_response(),
        Err(e) => errors::workshop_error_to_response(e),
    }
}
