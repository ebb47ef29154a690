use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use garagebook_core::CustomerId;
use garagebook_fleet::CustomerDetails;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_customers).post(register_customer))
        .route(
            "/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.workshop.list_customers().await {
        Ok(customers) => dto::items(customers),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn register_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CustomerDetails>,
) -> axum::response::Response {
    match services.workshop.register_customer(body).await {
        Ok(customer) => dto::created(customer),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match errors::parse_id(&id, "customer") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.customer(id).await {
        Ok(customer) => dto::ok(customer),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<CustomerDetails>,
) -> axum::response::Response {
    let id: CustomerId = match errors::parse_id(&id, "customer") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.update_customer(id, body).await {
        Ok(customer) => dto::ok(customer),
        Err(e) => errors::workshop_error_to_response(e),
    }
}

pub async fn delete_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match errors::parse_id(&id, "customer") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.workshop.delete_customer(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::workshop_error_to_response(e),
    }
}
