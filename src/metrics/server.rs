use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

/// Checkout-specific state reported on `/health`
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub kafka_enabled: bool,
    /// `ofrep` or `static`
    pub flag_source: &'static str,
}

#[derive(Serialize)]
struct HealthBody<'a> {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    #[serde(flatten)]
    checkout: &'a ServiceStatus,
}

/// Serves `/metrics` and `/health`. Runs on its own actix system, off the
/// tonic runtime.
pub async fn start_metrics_server(
    registry: Arc<Registry>,
    status: ServiceStatus,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!(
        port = port,
        kafka_enabled = status.kafka_enabled,
        flag_source = status.flag_source,
        "Starting metrics server on http://0.0.0.0:{}/metrics",
        port
    );

    HttpServer::new(move || {
        App::new().configure(routes(registry.clone(), status.clone()))
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

fn routes(registry: Arc<Registry>, status: ServiceStatus) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(registry))
            .app_data(web::Data::new(status))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler));
    }
}

async fn metrics_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(status: web::Data<ServiceStatus>) -> impl Responder {
    HttpResponse::Ok().json(HealthBody {
        status: "healthy",
        service: "checkout",
        version: env!("CARGO_PKG_VERSION"),
        checkout: status.get_ref(),
    })
}
