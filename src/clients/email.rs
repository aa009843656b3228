use async_trait::async_trait;
use serde::Serialize;

use super::{ClientError, EmailClient};
use crate::models::OrderResult;

/// Email service reached over HTTP/JSON
#[derive(Clone)]
pub struct HttpEmailClient {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct ConfirmationPayload<'a> {
    email: &'a str,
    order: &'a OrderResult,
}

impl HttpEmailClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/send_order_confirmation", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl EmailClient for HttpEmailClient {
    async fn send_order_confirmation(&self, email: &str, order: &OrderResult) -> Result<(), ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&ConfirmationPayload { email, order })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClientError::UnexpectedStatus(status.as_u16()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path() {
        let client = HttpEmailClient::new(reqwest::Client::new(), "http://email:6060/");
        assert_eq!(client.endpoint, "http://email:6060/send_order_confirmation");
    }
}
