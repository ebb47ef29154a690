use axum::Router;

pub mod customers;
pub mod interventions;
pub mod invoices;
pub mod system;
pub mod vehicles;

/// Router for all resource endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/customers", customers::router())
        .nest("/vehicles", vehicles::router())
        .nest("/interventions", interventions::router())
        .nest("/invoices", invoices::router())
}
