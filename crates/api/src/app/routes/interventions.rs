use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use garagebook_core::InterventionId;
use garagebook_fleet::InterventionDetails;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/unbilled", get(list_unbilled))
        .route(
            "/:id",
            get(get_intervention)
                .put(update_intervention)
                .delete(delete_intervention),
        )
}

fn parse_intervention_id(raw: &str) -> Result<InterventionId, axum::response::Response> {
    errors::parse_id(raw, "intervention")
}

pub async fn list_unbilled(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.workshop.unbilled_interventions().await {
        Ok(lines) => dto::items(lines),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn get_intervention(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_intervention_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.intervention(id).await {
        Ok(intervention) => dto::ok(intervention),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn update_intervention(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<InterventionDetails>,
) -> axum::response::Response {
    let id = match parse_intervention_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.update_intervention(id, body).await {
        Ok(intervention) => dto::ok(intervention),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn delete_intervention(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_intervention_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.delete_intervention(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::workshop_error_to_response(e),
    }
}
