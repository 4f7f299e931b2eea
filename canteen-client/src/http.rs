//! HTTP client for the canteen backend API

use crate::{ClientConfig, ClientError, ClientResult};
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::ApiResponse;
use std::sync::Arc;
use std::time::Duration;

/// HTTP client for making requests to the canteen backend
///
/// Every response body is the `{success, message, data}` envelope; the
/// typed methods unwrap it and return `data`.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let timeout = config.request_timeout();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(config.token.clone())),
            timeout,
        })
    }

    /// Replace the authentication token (e.g. after sign-in)
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    /// Whether a bearer token is configured
    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = self.token.read().as_ref() {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(self.request(Method::GET, path)).await
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> ClientResult<T> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    /// Make a POST request without body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(self.request(Method::POST, path)).await
    }

    /// Make a PATCH request with JSON body
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.send(self.request(Method::PATCH, path).json(body)).await
    }

    /// Send with the bounded timeout and unwrap the envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;

        let status = response.status();
        let body = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;

        Self::handle_response(status, &body)
    }

    /// Map the HTTP status and envelope to a result
    fn handle_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> ClientResult<T> {
        if !status.is_success() {
            let message = envelope_message(body).unwrap_or_else(|| body.to_string());
            tracing::debug!(status = status.as_u16(), %message, "Backend returned an error");
            return Err(match status {
                StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
                StatusCode::FORBIDDEN => ClientError::Forbidden(message),
                StatusCode::NOT_FOUND | StatusCode::GONE => ClientError::NotFound(message),
                StatusCode::CONFLICT => ClientError::Conflict(message),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    ClientError::Validation(message)
                }
                _ => ClientError::Internal(message),
            });
        }

        let envelope: ApiResponse<T> = serde_json::from_str(body)?;
        if !envelope.success {
            return Err(ClientError::Validation(
                envelope.message_or_default().to_string(),
            ));
        }
        envelope
            .data
            .ok_or_else(|| ClientError::InvalidResponse("Missing response data".to_string()))
    }
}

/// `message` from an error envelope, if the body is one
fn envelope_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
}
