// orderflow-server/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use orderflow::{AppConfig, CheckoutService};
use orderflow_server::state::AppState;
use orderflow_server::web::configure_app_routes;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::fmt::format::FmtSpan; // For span events in tracing
use tracing_subscriber::EnvFilter;

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration

  // LOG_FORMAT=json for log shippers; human-readable otherwise.
  if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
    builder.json().init();
  } else {
    builder.init();
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  init_tracing();
  tracing::info!("Starting orderflow server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  let checkout = match CheckoutService::from_config(&app_config).await {
    Ok(service) => Arc::new(service),
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialise the checkout service.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let relay = Arc::new(checkout.outbox_relay(&app_config.outbox)).spawn(shutdown_rx);

  let app_state = AppState {
    checkout,
    config: app_config.clone(),
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  let served = HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await;

  tracing::info!("HTTP server stopped; stopping the outbox relay.");
  let _ = shutdown_tx.send(true);
  if let Err(e) = relay.await {
    tracing::error!(error = %e, "Outbox relay task ended abnormally.");
  }
  served
}
