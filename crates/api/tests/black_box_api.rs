use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use garagebook_api::app::{build_app, services::AppServices};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a fresh in-memory store, bound to an ephemeral port.
        let app = build_app(Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn post_json(client: &reqwest::Client, url: String, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).json(&body).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get_json(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let res = client.get(url).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// Registers a customer, one vehicle and three priced lines (100, 50, 80).
async fn populate(server: &TestServer, client: &reqwest::Client) -> (i64, i64, Vec<i64>) {
    let (status, customer) = post_json(
        client,
        server.url("/customers"),
        json!({ "name": "Marta Soler", "national_id": "12345678Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let customer_id = customer["id"].as_i64().unwrap();

    let (status, vehicle) = post_json(
        client,
        server.url("/vehicles"),
        json!({ "plate": " 1234abc ", "make": "Seat", "owner_id": customer_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let vehicle_id = vehicle["id"].as_i64().unwrap();

    let (status, recorded) = post_json(
        client,
        server.url(&format!("/vehicles/{vehicle_id}/interventions")),
        json!({
            "date": "2026-03-02",
            "odometer_km": 84500,
            "customer_id": customer_id,
            "lines": [
                { "description": "Brake pads", "price": 100.0, "labor_hours": 1.5 },
                { "description": "Oil change", "price": 50.0 },
                { "description": "   " },
                { "description": "Timing belt", "price": 80.0 }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let lines: Vec<i64> = recorded["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| line["id"].as_i64().unwrap())
        .collect();
    assert_eq!(lines.len(), 3);

    (customer_id, vehicle_id, lines)
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/health"))
        .header("x-request-id", "0191f6a2-7c1e-7000-8000-000000000001")
        .send()
        .await
        .unwrap();
    assert_eq!(
        res.headers().get("x-request-id").unwrap(),
        "0191f6a2-7c1e-7000-8000-000000000001"
    );

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert!(res.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn register_vehicle_normalizes_the_plate() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, vehicle_id, _) = populate(&server, &client).await;

    let (status, card) = get_json(&client, server.url(&format!("/vehicles/{vehicle_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card["vehicle"]["plate"], "1234ABC");
    assert_eq!(card["owner"]["name"], "Marta Soler");
    assert_eq!(card["interventions"].as_array().unwrap().len(), 3);

    let (status, body) = post_json(
        &client,
        server.url("/vehicles"),
        json!({ "plate": "1234ABC" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) =
        post_json(&client, server.url("/vehicles"), json!({ "plate": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn invoice_flow_computes_totals_and_binds_lines() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (customer_id, _, lines) = populate(&server, &client).await;

    let (status, candidates) = get_json(&client, server.url("/invoices/candidates")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(candidates["unbilled"].as_array().unwrap().len(), 3);

    let (status, invoice) = post_json(
        &client,
        server.url("/invoices"),
        json!({
            "customer_id": customer_id,
            "intervention_ids": [lines[0], lines[1]],
            "discount_pct": 10.0,
            "tax_pct": 21.0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(invoice["number"].as_str().unwrap().starts_with("FAC-"));
    assert!(invoice["number"].as_str().unwrap().ends_with("-0001"));
    assert_eq!(invoice["base"].as_f64().unwrap(), 150.0);
    assert_eq!(invoice["discount_amount"].as_f64().unwrap(), 15.0);
    assert_eq!(invoice["tax_amount"].as_f64().unwrap(), 28.35);
    assert_eq!(invoice["total"].as_f64().unwrap(), 163.35);
    assert_eq!(invoice["submitted"], false);

    let invoice_id = invoice["id"].as_i64().unwrap();
    let (status, view) = get_json(&client, server.url(&format!("/invoices/{invoice_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!((view["taxable_base"].as_f64().unwrap() - 135.0).abs() < 1e-9);
    assert_eq!(view["customer"]["id"].as_i64().unwrap(), customer_id);
    assert_eq!(view["lines"].as_array().unwrap().len(), 2);

    let (_, unbilled) = get_json(&client, server.url("/interventions/unbilled")).await;
    let unbilled = unbilled["items"].as_array().unwrap();
    assert_eq!(unbilled.len(), 1);
    assert_eq!(unbilled[0]["id"].as_i64().unwrap(), lines[2]);

    let (status, listed) = get_json(&client, server.url("/invoices")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn billed_lines_cannot_be_rebilled_or_deleted() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (customer_id, vehicle_id, lines) = populate(&server, &client).await;

    let request = json!({ "customer_id": customer_id, "intervention_ids": [lines[0]] });
    let (status, _) = post_json(&client, server.url("/invoices"), request.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_json(&client, server.url("/invoices"), request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let res = client
        .delete(server.url(&format!("/interventions/{}", lines[0])))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .delete(server.url(&format!("/vehicles/{vehicle_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .delete(server.url(&format!("/interventions/{}", lines[2])))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn empty_invoice_is_a_validation_error() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (customer_id, _, _) = populate(&server, &client).await;

    let (status, body) = post_json(
        &client,
        server.url("/invoices"),
        json!({ "customer_id": customer_id, "new_lines": [{ "description": "no vehicle" }] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (_, listed) = get_json(&client, server.url("/invoices")).await;
    assert!(listed["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_and_unknown_ids_are_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = get_json(&client, server.url("/customers/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
    assert_eq!(body["message"], "invalid customer id");

    let (status, body) = get_json(&client, server.url("/invoices/0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = get_json(&client, server.url("/vehicles/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = post_json(
        &client,
        server.url("/invoices"),
        json!({ "customer_id": 42, "intervention_ids": [1] }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn submission_without_a_fiscal_client_is_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (customer_id, _, lines) = populate(&server, &client).await;

    let (_, invoice) = post_json(
        &client,
        server.url("/invoices"),
        json!({ "customer_id": customer_id, "intervention_ids": [lines[1]] }),
    )
    .await;
    let invoice_id = invoice["id"].as_i64().unwrap();

    let (status, report) = post_json(
        &client,
        server.url(&format!("/invoices/{invoice_id}/submit")),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["status"], "rejected");
    assert_eq!(report["message"], "not implemented");
    assert_eq!(report["invoice"]["submitted"], false);
}

#[tokio::test]
async fn customer_with_invoices_cannot_be_deleted() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (customer_id, _, lines) = populate(&server, &client).await;

    let (status, _) = post_json(
        &client,
        server.url("/invoices"),
        json!({ "customer_id": customer_id, "intervention_ids": [lines[0]] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let res = client
        .delete(server.url(&format!("/customers/{customer_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let (status, customers) = get_json(&client, server.url("/customers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customers["items"].as_array().unwrap().len(), 1);
}
