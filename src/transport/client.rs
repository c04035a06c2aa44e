//! Coordinator HTTP transport
//!
//! Thin wrapper over reqwest that applies the cached trust decision and the
//! coordinator's headers. No retries and no timeouts: a hanging coordinator
//! blocks the run.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::TransportSettings;
use crate::error::{Error, Result};

use super::TrustResolver;

/// HTTP transport shared by every coordinator call of a run
pub struct Transport {
    trust: Arc<TrustResolver>,
    default_client: Client,
    headers: HeaderMap,
}

impl Transport {
    /// Create a transport sending `token` in the configured auth header
    pub fn new(settings: &TransportSettings, token: &str, trust: Arc<TrustResolver>) -> Result<Self> {
        let auth_header = HeaderName::from_bytes(settings.auth_header.as_bytes()).map_err(|e| {
            Error::config_field_invalid("transport.auth_header", format!("Invalid header name: {}", e))
        })?;
        let auth_value = HeaderValue::from_str(token)
            .map_err(|_| Error::config_validation("TOKEN contains characters not allowed in an HTTP header"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(auth_header, auth_value);

        let default_client = Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            trust,
            default_client,
            headers,
        })
    }

    /// Trust resolver backing this transport
    pub fn trust(&self) -> &TrustResolver {
        &self.trust
    }

    /// Pick the client for a request, probing trust on first use
    async fn client_for(&self, uri: &str) -> &Client {
        let use_custom_ca = self.trust.resolve(uri, &self.headers).await;
        match self.trust.custom_client() {
            Some(client) if use_custom_ca && self.trust.bundle_path().exists() => client,
            _ => &self.default_client,
        }
    }

    /// Send a request with the coordinator headers and an optional JSON body
    ///
    /// Transport failures surface as [`Error::Http`]; the status code is left
    /// for the caller to judge.
    pub async fn request(&self, method: Method, uri: &str, body: Option<&Value>) -> Result<Response> {
        let client = self.client_for(uri).await;
        debug!(method = %method, uri, "Coordinator request");

        let mut request = client.request(method, uri).headers(self.headers.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| Error::http(uri, e))
    }

    pub async fn get(&self, uri: &str) -> Result<Response> {
        self.request(Method::GET, uri, None).await
    }

    pub async fn head(&self, uri: &str) -> Result<Response> {
        self.request(Method::HEAD, uri, None).await
    }

    pub async fn patch<T: Serialize + ?Sized>(&self, uri: &str, body: &T) -> Result<Response> {
        let body = serde_json::to_value(body)
            .map_err(|e| Error::Internal(format!("Failed to encode request body: {}", e)))?;
        self.request(Method::PATCH, uri, Some(&body)).await
    }

    /// GET a resource outside the coordinator API
    ///
    /// Applies the trust decision like every other request but never sends
    /// the coordinator headers, so the auth token does not leave for
    /// third-party source hosts.
    pub async fn download(&self, uri: &str) -> Result<Response> {
        let client = self.client_for(uri).await;
        debug!(uri, "Downloading");
        client.get(uri).send().await.map_err(|e| Error::http(uri, e))
    }
}
