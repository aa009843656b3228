use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Server;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod clients;
mod config;
mod domain;
mod flags;
mod messaging;
mod metrics;
mod models;
mod proto;
mod server;
mod utils;

#[cfg(test)]
mod testing;

use clients::{
    GrpcCartClient, GrpcCatalogClient, GrpcCurrencyClient, GrpcPaymentClient, GrpcShippingClient,
    HttpEmailClient,
};
use crate::config::CheckoutConfig;
use domain::checkout::{CheckoutPipeline, Collaborators, UNREACHABLE_PAYMENT_ADDR};
use flags::{FlagProvider, OfrepFlags};
use messaging::{EventPublisher, KafkaProducer};
use proto::pb;
use proto::pb::checkout_service_server::CheckoutServiceServer;
use server::CheckoutServer;
use utils::BackgroundTasks;

const PRODUCER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
const OVERLOAD_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, RUST_LOG overrides. Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,checkout=debug"))
        )
        .init();

    tracing::info!("Starting checkout service");

    // === 1. Configuration ===
    let config = CheckoutConfig::from_env()?;
    config.log_effective();

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    // actix-web runs on its own system, off the tonic runtime
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    let status = metrics::ServiceStatus {
        kafka_enabled: config.kafka_addr.is_some(),
        flag_source: if config.flagd_ofrep_url.is_some() { "ofrep" } else { "static" },
    };
    std::thread::spawn(move || {
        let served = actix_web::rt::System::new()
            .block_on(metrics::start_metrics_server(metrics_registry, status, metrics_port));
        if let Err(e) = served {
            tracing::error!(error = %e, "Metrics server error");
        }
    });

    // === 3. Feature flags ===
    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let flags: Arc<dyn FlagProvider> = match &config.flagd_ofrep_url {
        Some(url) => {
            tracing::info!(url = %url, "Evaluating feature flags over OFREP");
            Arc::new(OfrepFlags::new(http.clone(), url))
        }
        None => {
            tracing::info!("No flag endpoint configured, using static flag values");
            Arc::new(config.static_flags.clone())
        }
    };

    // === 4. Collaborators (lazy channels, nothing is dialed yet) ===
    let clients = Collaborators {
        cart: Arc::new(GrpcCartClient::connect_lazy(&config.cart_addr)?),
        catalog: Arc::new(GrpcCatalogClient::connect_lazy(&config.product_catalog_addr)?),
        currency: Arc::new(GrpcCurrencyClient::connect_lazy(&config.currency_addr)?),
        shipping: Arc::new(GrpcShippingClient::connect_lazy(&config.shipping_addr)?),
        payment: Arc::new(GrpcPaymentClient::connect_lazy(&config.payment_addr)?),
        unreachable_payment: Arc::new(GrpcPaymentClient::connect_lazy(UNREACHABLE_PAYMENT_ADDR)?),
        email: Arc::new(HttpEmailClient::new(http.clone(), &config.email_addr)),
    };

    // === 5. Kafka publisher (optional) ===
    let overload = Arc::new(BackgroundTasks::new("kafka-overload", config.overload_task_limit));
    let producer = match &config.kafka_addr {
        Some(addr) => Some(Arc::new(KafkaProducer::new(addr)?)),
        None => {
            tracing::info!("KAFKA_ADDR not set, order events will not be published");
            None
        }
    };
    let publisher = producer.clone().map(|producer| {
        EventPublisher::new(producer, flags.clone(), overload.clone(), metrics.clone())
    });

    let pipeline = Arc::new(CheckoutPipeline::new(clients, flags, publisher, metrics.clone()));

    // === 6. gRPC server with health and reflection ===
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<CheckoutServiceServer<CheckoutServer>>()
        .await;

    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(pb::FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Checkout service listening");

    Server::builder()
        .add_service(health_service)
        .add_service(reflection)
        .add_service(CheckoutServiceServer::new(CheckoutServer::new(pipeline)))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    // === 7. Drain ===
    if tokio::time::timeout(OVERLOAD_DRAIN_TIMEOUT, overload.wait_idle()).await.is_err() {
        tracing::warn!(in_flight = overload.in_flight().await, "Overload publishes still running at shutdown");
    }

    if let Some(producer) = producer {
        let flushed = tokio::task::spawn_blocking(move || producer.flush(PRODUCER_FLUSH_TIMEOUT)).await?;
        if let Err(e) = flushed {
            tracing::warn!(error = %e, "Kafka producer flush incomplete");
        }
    }

    tracing::info!("Checkout service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
