// tests/payment_tests.rs
mod common;

use chrono::Utc;
use common::*;
use orderflow::config::{CheckoutSettings, PaymentConfig};
use orderflow::models::{Currency, PaymentAttempt};
use orderflow::payment::{signature, PaymentGateway, ProviderKind, RazorpayProvider};
use orderflow::store::{MemoryStore, OrderStore, OutboxStore};
use orderflow::sync::{MemoryMirror, SyncEventKind};
use orderflow::{AppError, CheckoutDeps, CheckoutService, CreateOrderRequest, InitiatePaymentRequest, Order, OrderStatus};
use serial_test::serial;
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

fn payment_request(order: &Order) -> InitiatePaymentRequest {
  InitiatePaymentRequest {
    order_id: order.id,
    amount: order.total,
    description: None,
    customer_email: "ada@example.com".to_string(),
    customer_name: Some("Ada".to_string()),
    customer_phone: None,
  }
}

#[tokio::test]
#[serial]
async fn test_salt_order_is_paid_end_to_end() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let subtotal: rust_decimal::Decimal = order
    .items
    .iter()
    .map(|i| i.price * rust_decimal::Decimal::from(i.quantity))
    .sum();
  assert_eq!(subtotal, dec("20.00"));

  let handle = h.service.initiate_payment(payment_request(&order)).await.unwrap();
  assert_eq!(handle.provider, ProviderKind::Mock);
  assert_eq!(handle.amount_minor, 2599);
  assert_eq!(handle.currency, Currency::Usd);
  assert!(handle.client_secret.is_some());

  h.provider.complete(&handle.transaction_id).unwrap();
  let verified = h
    .service
    .verify_payment(&handle.transaction_id, order.id, None)
    .await
    .unwrap();

  assert!(verified);
  let paid = h.service.get_order(order.id).await.unwrap();
  assert_eq!(paid.status, OrderStatus::Paid);

  let kinds: Vec<_> = h
    .store
    .events_for_order(order.id)
    .await
    .unwrap()
    .iter()
    .map(|e| e.kind)
    .collect();
  assert_eq!(kinds, vec![SyncEventKind::OrderCreated, SyncEventKind::StatusChanged]);
}

#[tokio::test]
#[serial]
async fn test_initiation_records_the_attempt_and_describes_the_order() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();

  let handle = h.service.initiate_payment(payment_request(&order)).await.unwrap();

  let attempt = h.store.latest_payment_attempt(order.id).await.unwrap().unwrap();
  assert_eq!(attempt.transaction_id, handle.transaction_id);
  assert_eq!(attempt.provider, ProviderKind::Mock);
  assert_eq!(attempt.amount_minor, 2599);
  let intent = h.provider.intent(&handle.transaction_id).unwrap();
  assert_eq!(intent.order_id, order.id.to_string());
}

#[tokio::test]
#[serial]
async fn test_mismatched_correlation_is_not_verified() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let handle = h.service.initiate_payment(payment_request(&order)).await.unwrap();
  h.provider.complete(&handle.transaction_id).unwrap();
  h.provider
    .set_correlation(&handle.transaction_id, &Uuid::new_v4().to_string());

  let verified = h
    .service
    .verify_payment(&handle.transaction_id, order.id, None)
    .await
    .unwrap();

  assert!(!verified);
  assert_eq!(h.service.get_order(order.id).await.unwrap().status, OrderStatus::Processing);
  assert_eq!(h.store.events_for_order(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_unfinished_and_declined_payments_are_not_verified() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let handle = h.service.initiate_payment(payment_request(&order)).await.unwrap();

  // The customer has not finished paying yet.
  assert!(!h.service.verify_payment(&handle.transaction_id, order.id, None).await.unwrap());

  // 5.24 + 5.99 = 11.23, which the mock declines.
  let declined_order = h
    .service
    .create_order(CreateOrderRequest {
      items: vec![cart_line("pepper", "Pepper", "5.24", 1)],
      ..salt_order_request("user-1")
    })
    .await
    .unwrap();
  let declined = h.service.initiate_payment(payment_request(&declined_order)).await.unwrap();
  h.provider.complete(&declined.transaction_id).unwrap();

  assert!(!h
    .service
    .verify_payment(&declined.transaction_id, declined_order.id, None)
    .await
    .unwrap());
  assert_eq!(
    h.service.get_order(declined_order.id).await.unwrap().status,
    OrderStatus::Processing
  );
}

#[tokio::test]
#[serial]
async fn test_verifying_a_paid_order_again_is_idempotent() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let handle = h.service.initiate_payment(payment_request(&order)).await.unwrap();
  h.provider.complete(&handle.transaction_id).unwrap();
  assert!(h.service.verify_payment(&handle.transaction_id, order.id, None).await.unwrap());

  assert!(h.service.verify_payment(&handle.transaction_id, order.id, None).await.unwrap());

  assert_eq!(h.store.events_for_order(order.id).await.unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn test_payment_from_another_provider_is_not_verified() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let handle = h.service.initiate_payment(payment_request(&order)).await.unwrap();
  h.provider.complete(&handle.transaction_id).unwrap();

  // A later attempt made while a different provider was configured.
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  h.store
    .record_payment_attempt(&PaymentAttempt {
      order_id: order.id,
      provider: ProviderKind::Stripe,
      transaction_id: "pi_123".to_string(),
      amount_minor: 2599,
      currency: Currency::Usd,
      created_at: Utc::now(),
    })
    .await
    .unwrap();

  assert!(!h.service.verify_payment(&handle.transaction_id, order.id, None).await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_verification_without_initiation_is_not_verified() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();

  assert!(!h.service.verify_payment("mock_pi_unknown", order.id, None).await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_verifying_unknown_order_fails() {
  let h = harness();

  let err = h
    .service
    .verify_payment("mock_pi_x", Uuid::new_v4(), None)
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
#[serial]
async fn test_initiation_validates_before_calling_the_provider() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();

  let mut wrong_amount = payment_request(&order);
  wrong_amount.amount = dec("20.00");
  let err = h.service.initiate_payment(wrong_amount).await.unwrap_err();
  assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);

  let mut no_email = payment_request(&order);
  no_email.customer_email = " ".to_string();
  let err = h.service.initiate_payment(no_email).await.unwrap_err();
  assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);

  let mut unknown = payment_request(&order);
  unknown.order_id = Uuid::new_v4();
  let err = h.service.initiate_payment(unknown).await.unwrap_err();
  assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);

  assert!(h.store.latest_payment_attempt(order.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_paid_order_cannot_be_paid_again() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let handle = h.service.initiate_payment(payment_request(&order)).await.unwrap();
  h.provider.complete(&handle.transaction_id).unwrap();
  h.service.verify_payment(&handle.transaction_id, order.id, None).await.unwrap();

  let err = h.service.initiate_payment(payment_request(&order)).await.unwrap_err();

  assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
#[serial]
async fn test_missing_provider_credentials_are_a_config_error() {
  setup_tracing();
  let store = Arc::new(MemoryStore::new());
  let deps = CheckoutDeps {
    store: store.clone(),
    outbox: store.clone(),
    payments: PaymentGateway::new(
      PaymentConfig {
        provider: ProviderKind::Razorpay,
        ..PaymentConfig::default()
      },
      reqwest::Client::new(),
    ),
    settings: CheckoutSettings::default(),
    relay_wake: Arc::new(Notify::new()),
  };
  let service = CheckoutService::new(deps, Arc::new(MemoryMirror::new()));
  let order = service.create_order(salt_order_request("user-1")).await.unwrap();

  let err = service.initiate_payment(payment_request(&order)).await.unwrap_err();

  assert!(matches!(err, AppError::Config(_)), "got {:?}", err);
  assert!(!err.is_retryable());
  assert!(store.latest_payment_attempt(order.id).await.unwrap().is_none());
  assert_eq!(store.events_for_order(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_razorpay_signature_is_checked_against_the_initiated_order() {
  setup_tracing();
  let store = Arc::new(MemoryStore::new());
  let config = PaymentConfig {
    provider: ProviderKind::Razorpay,
    currency: Currency::Inr,
    razorpay_key_id: Some("rzp_test_key".to_string()),
    razorpay_key_secret: Some("s3cret".to_string()),
    ..PaymentConfig::default()
  };
  // Signature checks never leave the process, so no API is needed.
  let razorpay = RazorpayProvider::new(
    reqwest::Client::new(),
    "http://127.0.0.1:9".to_string(),
    "rzp_test_key".to_string(),
    "s3cret".to_string(),
  );
  let deps = CheckoutDeps {
    store: store.clone(),
    outbox: store.clone(),
    payments: PaymentGateway::with_provider(config, Arc::new(razorpay)),
    settings: CheckoutSettings::default(),
    relay_wake: Arc::new(Notify::new()),
  };
  let service = CheckoutService::new(deps, Arc::new(MemoryMirror::new()));
  let order = service.create_order(salt_order_request("user-1")).await.unwrap();
  store
    .record_payment_attempt(&PaymentAttempt {
      order_id: order.id,
      provider: ProviderKind::Razorpay,
      transaction_id: "order_X".to_string(),
      amount_minor: 2599,
      currency: Currency::Inr,
      created_at: Utc::now(),
    })
    .await
    .unwrap();

  // Signed over the storefront order id instead of the Razorpay order.
  let wrong = signature::sign("s3cret", &order.id.to_string(), "pay_Y").unwrap();
  assert!(!service.verify_payment("pay_Y", order.id, Some(wrong)).await.unwrap());
  assert!(!service.verify_payment("pay_Y", order.id, None).await.unwrap());
  assert_eq!(service.get_order(order.id).await.unwrap().status, OrderStatus::Processing);

  let good = signature::sign("s3cret", "order_X", "pay_Y").unwrap();
  assert!(service.verify_payment("pay_Y", order.id, Some(good)).await.unwrap());
  assert_eq!(service.get_order(order.id).await.unwrap().status, OrderStatus::Paid);
}
