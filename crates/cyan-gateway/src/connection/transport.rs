//! REST transport
//!
//! Authenticated requests against the bot OpenAPI. The session itself only
//! needs `GET /gateway`; handlers use the same transport for everything else.

use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use cyan_common::BotConfig;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Request/response transport used by the gateway client
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// Send an authenticated request to `{base}{path}` and decode the JSON reply
    ///
    /// `body` is sent as JSON when present. An empty reply decodes to `null`; an
    /// error status becomes [`GatewayError::Api`].
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> GatewayResult<Value>;

    async fn get_json(&self, path: &str) -> GatewayResult<Value> {
        self.request(Method::GET, path, None).await
    }

    async fn post_json(&self, path: &str, body: Value) -> GatewayResult<Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn put_json(&self, path: &str, body: Value) -> GatewayResult<Value> {
        self.request(Method::PUT, path, Some(body)).await
    }

    async fn patch_json(&self, path: &str, body: Value) -> GatewayResult<Value> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> GatewayResult<Value> {
        self.request(Method::DELETE, path, None).await
    }

    /// Ask the API where the gateway lives
    async fn resolve_gateway_url(&self) -> GatewayResult<String> {
        let body = self.get_json("/gateway").await?;
        body.get("url")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| GatewayError::InvalidGatewayResponse(body.to_string()))
    }
}

/// [`RestTransport`] over HTTPS
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    authorization: String,
}

impl HttpTransport {
    /// Create a transport for the given bot credentials
    pub fn new(bot: &BotConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cyan-gateway/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: bot.api_base_url.trim_end_matches('/').to_string(),
            authorization: bot.authorization(),
        })
    }

    /// Base URL requests are made against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RestTransport for HttpTransport {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> GatewayResult<Value> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(method = %method, url = %url, "OpenAPI request");

        let mut request = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, &self.authorization);
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let error = api_error(response).await;
            tracing::warn!(url = %url, error = %error, "OpenAPI request failed");
            return Err(error);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Error bodies look like `{"code": 11241, "message": "..."}`.
async fn api_error(response: Response) -> GatewayError {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    GatewayError::Api {
        status: status.as_u16(),
        code: body
            .get("code")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| i64::from(status.as_u16())),
        message: body
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| status.canonical_reason())
            .unwrap_or("unknown error")
            .to_string(),
    }
}
