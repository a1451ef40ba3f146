//! Pooled reqwest client for JSON-over-HTTPS calls

use crate::http::error::map_http_error;
use crate::http::RequestOptions;
use crate::providers::error::ProviderError;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Batch embedding replies for a whole corpus get large
const RESPONSE_LIMIT: usize = 32 * 1024 * 1024;

const USER_AGENT: &str = concat!("gemlab/", env!("CARGO_PKG_VERSION"));

/// Cheap to clone; clones share one connection pool
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    response_limit: usize,
}

impl HttpClient {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_config(Duration::from_secs(10), Duration::from_secs(120), 10)
    }

    pub fn with_config(
        connect_timeout: Duration,
        request_timeout: Duration,
        max_idle_per_host: usize,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::Custom {
                code: "CLIENT_BUILD".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            response_limit: RESPONSE_LIMIT,
        })
    }

    /// POST `body` as JSON to `url` and decode the JSON reply
    ///
    /// `headers` usually carry the API key and are never logged.
    pub async fn post_json<B, R>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
        options: &RequestOptions,
    ) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request_id = options.request_id;
        let call = options.call_kind.method();
        let started = Instant::now();
        debug!(call, %request_id, url, "Sending request");

        let request = headers.iter().fold(
            self.client
                .post(url)
                .timeout(options.timeout)
                .header("X-Request-ID", request_id.to_string())
                .json(body),
            |request, (name, value)| request.header(*name, value),
        );

        let response = request.send().await.map_err(|e| {
            warn!(call, %request_id, error = %e, "Request did not complete");
            ProviderError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.ok();
            warn!(call, %request_id, status = status.as_u16(), "Request rejected");
            return Err(map_http_error(status, Some(&headers), body, request_id));
        }

        let bytes = self.read_body(response).await?;
        let decoded = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(call, %request_id, error = %e, "Response did not decode");
            ProviderError::Parse {
                message: format!("unexpected response shape: {}", e),
            }
        })?;

        info!(
            call,
            %request_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        Ok(decoded)
    }

    async fn read_body(&self, response: Response) -> Result<Vec<u8>, ProviderError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        if let Some(content_type) = content_type.filter(|ct| !ct.contains("application/json")) {
            return Err(ProviderError::Custom {
                code: "INVALID_CONTENT_TYPE".to_string(),
                message: format!("expected application/json, got {}", content_type),
            });
        }

        let declared = response.content_length().map(|n| n as usize);
        if let Some(size) = declared.filter(|&n| n > self.response_limit) {
            return Err(self.too_large(size));
        }

        let bytes = response.bytes().await?;
        if bytes.len() > self.response_limit {
            return Err(self.too_large(bytes.len()));
        }
        Ok(bytes.to_vec())
    }

    fn too_large(&self, size: usize) -> ProviderError {
        ProviderError::Custom {
            code: "RESPONSE_TOO_LARGE".to_string(),
            message: format!("{} bytes exceeds the {} byte limit", size, self.response_limit),
        }
    }
}
