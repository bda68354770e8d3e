//! Typed REST transport for the backend API
//!
//! This module wraps a `reqwest` client with JSON helpers and exposes one
//! typed wrapper per backend resource. Calls here never touch the cache;
//! the `store` module layers caching on top of them.

pub mod catalogos;
pub mod terceros;

pub use catalogos::CatalogItem;
pub use terceros::{NewTercero, Tercero};

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when calling the backend
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Any other failure raised by a data producer
    #[error("{0}")]
    Producer(String),
}

/// Client for the backend REST API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Creates a new ApiClient rooted at `base_url`
    pub fn new(base_url: Url) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a new ApiClient with a custom HTTP client
    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Returns the base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the URL for an API path such as "terceros/12"
    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "api request");
        self.client.request(method, url)
    }

    /// Sends a request and returns the body of a successful response
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }

    /// Performs a GET request and parses the JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let text = self.send(self.request(Method::GET, path)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Performs a POST request with a JSON body and parses the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send(self.request(Method::POST, path).json(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Performs a PUT request with a JSON body and parses the JSON response
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send(self.request(Method::PUT, path).json(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Performs a DELETE request, discarding any response body
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}
