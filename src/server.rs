use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};

use crate::domain::checkout::CheckoutPipeline;
use crate::models::PlaceOrderRequest;
use crate::proto::pb;
use crate::proto::pb::checkout_service_server::CheckoutService;
use crate::utils::propagation::{BAGGAGE, TRACEPARENT, TRACESTATE};
use crate::utils::{CallContext, CancelHandle, TraceCarrier};

const GRPC_TIMEOUT: &str = "grpc-timeout";

/// gRPC front of the checkout pipeline
pub struct CheckoutServer {
    pipeline: Arc<CheckoutPipeline>,
}

impl CheckoutServer {
    pub fn new(pipeline: Arc<CheckoutPipeline>) -> Self {
        Self { pipeline }
    }
}

#[tonic::async_trait]
impl CheckoutService for CheckoutServer {
    async fn place_order(
        &self,
        request: Request<pb::PlaceOrderRequest>,
    ) -> Result<Response<pb::PlaceOrderResponse>, Status> {
        // Cancelled when the call returns or tonic drops it mid-flight
        let (ctx, cancel) = call_context(request.metadata());
        let _guard = cancel.drop_guard();
        let req = PlaceOrderRequest::from(request.into_inner());

        let order = self.pipeline.place_order(&ctx, &req).await?;

        Ok(Response::new(pb::PlaceOrderResponse {
            order: Some(pb::OrderResult::from(&order)),
        }))
    }
}

/// Builds the call's context from the trace headers and `grpc-timeout`
pub fn call_context(metadata: &MetadataMap) -> (CallContext, CancelHandle) {
    let headers = [TRACEPARENT, TRACESTATE, BAGGAGE]
        .into_iter()
        .filter_map(|key| {
            let value = metadata.get(key)?.to_str().ok()?;
            Some((key, value))
        });
    let trace = TraceCarrier::from_headers(headers);

    let deadline = metadata
        .get(GRPC_TIMEOUT)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_grpc_timeout)
        .map(|timeout| Instant::now() + timeout);

    CallContext::new(deadline, trace)
}

/// Parses a `grpc-timeout` value: up to 8 digits followed by a unit
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 {
        return None;
    }

    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let timeout = match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}
