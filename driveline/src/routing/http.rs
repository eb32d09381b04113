//! HTTP client abstraction for testability

use std::time::Duration;

use super::service::BoxFuture;
use super::types::RouteError;

/// Default request timeout for routing calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Trait for async HTTP GET operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, RouteError>>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, RouteError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, RouteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("driveline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RouteError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, RouteError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| RouteError::Http(format!("Request failed: {}", e)))?;

            // Check HTTP status
            let status = response.status();
            if !status.is_success() {
                return Err(RouteError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            // Read response body
            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| RouteError::Http(format!("Failed to read response: {}", e)))
        })
    }
}
