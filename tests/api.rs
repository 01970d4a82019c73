use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use salyq_engine::api::{build_router, AppState};
use salyq_engine::config::DEFAULT_DISCLAIMER;
use salyq_engine::explain::{ExplainerKind, EXPLANATION_UNAVAILABLE};
use salyq_engine::rates::{RateBook, RateTable};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn state(explainer: ExplainerKind) -> AppState {
    AppState {
        rates: RateBook::builtin(),
        default_year: None,
        explainer: explainer.build(),
        disclaimer: DEFAULT_DISCLAIMER.to_string(),
    }
}

fn router() -> Router {
    build_router(Arc::new(state(ExplainerKind::Template)))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is json")
}

#[tokio::test]
async fn health_reports_up() {
    let response = router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await, json!({ "status": "UP" }));
}

#[tokio::test]
async fn calculate_returns_amounts_explanation_and_disclaimer() {
    let response = router()
        .oneshot(post_json(
            "/api/v1/calculate",
            json!({ "revenue": 0.0, "months_worked": 6 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let calculation = &payload["calculation"];
    assert_eq!(calculation["opv"], json!(51000.0));
    assert_eq!(calculation["so"], json!(16065.0));
    assert_eq!(calculation["vosms"], json!(35700.0));
    assert_eq!(calculation["total_social"], json!(102765.0));
    assert_eq!(calculation["ipn"], json!(0.0));
    assert_eq!(calculation["sn"], json!(0.0));
    assert_eq!(calculation["total_tax"], json!(0.0));
    assert_eq!(calculation["year"], json!(2024));
    assert_eq!(calculation["warnings"], json!([]));
    assert_eq!(calculation["input"]["months_worked"], json!(6));
    assert!(payload["explanation"]
        .as_str()
        .expect("explanation is text")
        .contains("OPV: 51000.00 KZT"));
    assert_eq!(payload["disclaimer"], json!(DEFAULT_DISCLAIMER));
}

#[tokio::test]
async fn calculate_flags_revenue_over_limit() {
    let limit = RateTable::kz_2024().revenue_limit_value();
    let response = router()
        .oneshot(post_json(
            "/api/v1/calculate",
            json!({ "revenue": limit * 1.01, "months_worked": 6, "year": 2024 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let warnings = payload["calculation"]["warnings"]
        .as_array()
        .expect("warnings array");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("exceeds the limit"));
}

#[tokio::test]
async fn disabled_explainer_is_used_when_configured() {
    let router = build_router(Arc::new(state(ExplainerKind::Disabled)));
    let response = router
        .oneshot(post_json(
            "/api/v1/calculate",
            json!({ "revenue": 1_000_000.0, "months_worked": 3 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["explanation"], json!(EXPLANATION_UNAVAILABLE));
}

#[tokio::test]
async fn calculate_rejects_invalid_input() {
    for body in [
        json!({ "revenue": -1.0, "months_worked": 6 }),
        json!({ "revenue": 100.0, "months_worked": 0 }),
        json!({ "revenue": 100.0, "months_worked": 7 }),
        json!({ "revenue": 100.0, "months_worked": 6, "year": 1999 }),
    ] {
        let response = router()
            .oneshot(post_json("/api/v1/calculate", body.clone()))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let payload = read_json_body(response).await;
        assert_eq!(payload["error"], json!("invalid calculation input"));
        assert!(payload["details"].is_string());
    }
}

#[tokio::test]
async fn calculate_rejects_malformed_body() {
    let response = router()
        .oneshot(post_json(
            "/api/v1/calculate",
            json!({ "revenue": "a lot", "months_worked": 6 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], json!("invalid request body"));

    let response = router()
        .oneshot(
            Request::post("/api/v1/calculate")
                .body(Body::from("{\"revenue\": 1}"))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_computes_every_period_in_order() {
    let response = router()
        .oneshot(post_json(
            "/api/v1/calculate/batch",
            json!({
                "periods": [
                    { "revenue": 0.0, "months_worked": 6 },
                    { "revenue": 500000.0, "months_worked": 1 },
                    { "revenue": 12000000.0, "months_worked": 6 }
                ]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let calculations = payload["calculations"].as_array().expect("array");
    assert_eq!(calculations.len(), 3);
    assert_eq!(calculations[0]["total_social"], json!(102765.0));
    assert_eq!(calculations[1]["so"], json!(2677.5));
    assert_eq!(calculations[2]["total_tax"], json!(343935.0));
    assert_eq!(payload["disclaimer"], json!(DEFAULT_DISCLAIMER));
}

#[tokio::test]
async fn batch_reports_invalid_period_index() {
    let response = router()
        .oneshot(post_json(
            "/api/v1/calculate/batch",
            json!({
                "periods": [
                    { "revenue": 10.0, "months_worked": 6 },
                    { "revenue": -10.0, "months_worked": 6 }
                ]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["details"]
        .as_str()
        .unwrap()
        .starts_with("period 1:"));
}

#[tokio::test]
async fn calculate_rejects_revenue_above_ceiling() {
    let response = router()
        .oneshot(post_json(
            "/api/v1/calculate",
            json!({ "revenue": 1.7e308, "months_worked": 6 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], json!("invalid calculation input"));
    assert!(payload["details"]
        .as_str()
        .unwrap()
        .starts_with("revenue must not exceed"));
}

#[tokio::test]
async fn preflight_allows_any_origin() {
    let response = router()
        .oneshot(
            Request::options("/api/v1/calculate_from_form")
                .header(header::ORIGIN, "http://localhost:5500")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap();
    assert!(methods.contains("POST"));
}

#[tokio::test]
async fn form_route_serves_calculations_with_cors_headers() {
    let request = Request::post("/api/v1/calculate_from_form")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, "http://localhost:5500")
        .body(Body::from(
            serde_json::to_vec(&json!({ "revenue": 0.0, "months_worked": 6 })).unwrap(),
        ))
        .unwrap();
    let response = router().oneshot(request).await.expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let payload = read_json_body(response).await;
    assert_eq!(payload["calculation"]["total_social"], json!(102765.0));
}
