// tests/api_tests.rs
mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use common::*;
use orderflow_server::web::configure_app_routes;
use serde_json::{json, Value};

fn salt_order(user_id: &str) -> Value {
  json!({
    "userId": user_id,
    "items": [{ "id": "salt", "name": "Salt", "price": "10.00", "quantity": 2 }],
    "shippingAddress": "1 Harbour Road"
  })
}

#[actix_web::test]
async fn test_health_reports_ok() {
  let t = test_app();
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::get().uri("/api/v1/health").to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;

  assert_eq!(body["status"], "ok");
  assert_eq!(body["paymentProvider"], "mock");
  assert_eq!(body["persistentStore"], false);
}

#[actix_web::test]
async fn test_create_and_fetch_order() {
  let t = test_app();
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .set_json(salt_order("user-1"))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body: Value = test::read_body_json(resp).await;
  let order = &body["order"];
  assert_eq!(order["total"], "25.99");
  assert_eq!(order["status"], "processing");
  assert_eq!(order["items"][0]["productName"], "Salt");
  let order_id = order["id"].as_str().unwrap().to_string();

  let req = test::TestRequest::get()
    .uri(&format!("/api/v1/orders/{}", order_id))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["order"]["id"], order_id.as_str());

  let req = test::TestRequest::get()
    .uri("/api/v1/orders?userId=user-1")
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["orders"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_bad_requests_get_json_errors() {
  let t = test_app();
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let empty_cart = json!({ "userId": "user-1", "items": [] });
  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .set_json(empty_cart)
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].as_str().unwrap().contains("empty"));

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(("content-type", "application/json"))
    .set_payload("{not json")
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].is_string());

  let oversized = json!({
    "userId": "user-1",
    "items": [{ "id": "salt", "name": "Salt", "price": "79228162514264337593543950335", "quantity": 2 }]
  });
  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .set_json(oversized)
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let req = test::TestRequest::get().uri("/api/v1/orders").to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let req = test::TestRequest::get().uri("/api/v1/orders/not-a-uuid").to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_unknown_order_is_404() {
  let t = test_app();
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::get()
    .uri(&format!("/api/v1/orders/{}", uuid::Uuid::new_v4()))
    .to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_pay_and_verify_over_http() {
  let t = test_app();
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .set_json(salt_order("user-1"))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  let order_id = body["order"]["id"].as_str().unwrap().to_string();

  let req = test::TestRequest::post()
    .uri("/api/v1/payments")
    .set_json(json!({
      "orderId": order_id,
      "amount": "25.99",
      "customerEmail": "ada@example.com"
    }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  let payment = &body["payment"];
  assert_eq!(payment["provider"], "mock");
  assert_eq!(payment["amountMinor"], 2599);
  let transaction_id = payment["transactionId"].as_str().unwrap().to_string();

  t.provider.complete(&transaction_id).unwrap();

  let req = test::TestRequest::post()
    .uri("/api/v1/payments/verify")
    .set_json(json!({ "transactionId": transaction_id, "orderId": order_id }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["verified"], true);

  let req = test::TestRequest::get()
    .uri(&format!("/api/v1/orders/{}", order_id))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["order"]["status"], "paid");
}

#[actix_web::test]
async fn test_disallowed_status_change_is_409() {
  let t = test_app();
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .set_json(salt_order("user-1"))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  let order_id = body["order"]["id"].as_str().unwrap().to_string();

  let req = test::TestRequest::patch()
    .uri(&format!("/api/v1/orders/{}/status", order_id))
    .set_json(json!({ "status": "delivered" }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);

  let req = test::TestRequest::patch()
    .uri(&format!("/api/v1/orders/{}/status", order_id))
    .set_json(json!({ "status": "delivered", "origin": "override" }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["order"]["status"], "delivered");
}

#[actix_web::test]
async fn test_sync_endpoints() {
  let t = test_app();
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .set_json(salt_order("user-1"))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  let order_id: uuid::Uuid = body["order"]["id"].as_str().unwrap().parse().unwrap();

  let relay = t.state.checkout.outbox_relay(&t.state.config.outbox);
  relay.drain_once().await.unwrap();
  t.mirror.set_status(order_id, orderflow::OrderStatus::Cancelled);

  let req = test::TestRequest::get().uri("/api/v1/sync/orders").to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["rows"].as_array().unwrap().len(), 1);
  assert_eq!(body["rows"][0]["status"], "cancelled");

  let req = test::TestRequest::post().uri("/api/v1/sync/reconcile").to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["report"]["applied"], 1);
}
