use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::FlagProvider;

/// Upper bound on a single evaluation round trip
const EVALUATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Remote flags over the OpenFeature Remote Evaluation Protocol (as served by
/// flagd). Every evaluation is a single HTTP round trip.
#[derive(Clone)]
pub struct OfrepFlags {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Evaluation {
    value: Value,
}

impl OfrepFlags {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, flag: &str) -> String {
        format!("{}/ofrep/v1/evaluate/flags/{}", self.base_url, flag)
    }

    async fn evaluate(&self, flag: &str) -> Option<Value> {
        let response = match self
            .http
            .post(self.url(flag))
            .json(&json!({ "context": {} }))
            .timeout(EVALUATION_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(flag = flag, error = %e, "Flag evaluation request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(flag = flag, status = %response.status(), "Flag evaluation rejected");
            return None;
        }

        match response.json::<Evaluation>().await {
            Ok(evaluation) => Some(evaluation.value),
            Err(e) => {
                tracing::debug!(flag = flag, error = %e, "Malformed flag evaluation");
                None
            }
        }
    }
}

#[async_trait]
impl FlagProvider for OfrepFlags {
    async fn evaluate_bool(&self, flag: &str, default: bool) -> bool {
        self.evaluate(flag)
            .await
            .and_then(|value| value.as_bool())
            .unwrap_or(default)
    }

    async fn evaluate_int(&self, flag: &str, default: i64) -> i64 {
        self.evaluate(flag)
            .await
            .and_then(|value| value.as_i64())
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::int_flag;
    use crate::utils::{CallContext, TraceCarrier};
    use tokio::net::TcpListener;

    /// Accepts connections and never writes a byte back
    async fn silent_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_url_layout() {
        let flags = OfrepFlags::new(reqwest::Client::new(), "http://flagd:8016/");
        assert_eq!(
            flags.url("paymentUnreachable"),
            "http://flagd:8016/ofrep/v1/evaluate/flags/paymentUnreachable"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_default() {
        let flags = OfrepFlags::new(reqwest::Client::new(), "http://127.0.0.1:1");

        assert!(flags.evaluate_bool("paymentUnreachable", true).await);
        assert_eq!(flags.evaluate_int("kafkaQueueProblems", 3).await, 3);
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out_to_default() {
        let flags = OfrepFlags::new(reqwest::Client::new(), &silent_endpoint().await);

        let value = tokio::time::timeout(
            EVALUATION_TIMEOUT + Duration::from_secs(2),
            flags.evaluate_int("kafkaQueueProblems", 4),
        )
        .await
        .unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn test_silent_endpoint_yields_default_at_caller_deadline() {
        let flags = OfrepFlags::new(reqwest::Client::new(), &silent_endpoint().await);
        let (ctx, _cancel) = CallContext::with_timeout(Duration::from_millis(50), TraceCarrier::new_root());

        let started = tokio::time::Instant::now();
        let value = int_flag(&ctx, &flags, "checkoutFailureThreshold", 0).await;

        assert_eq!(value, 0);
        assert!(started.elapsed() < EVALUATION_TIMEOUT);
    }
}
