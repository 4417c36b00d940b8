//! HTTP calls against the service's REST API.

use crate::error::{ClientError, ProbeError};
use crate::index_config::IndexConfig;
use reqwest::{Client, StatusCode, Url};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Polling schedule for [`QuickwitClient::wait_ready`].
#[derive(Debug, Clone, Copy)]
pub struct ReadinessOptions {
    /// Give up after this long.
    pub timeout: Duration,
    /// Pause between probes.
    pub interval: Duration,
    /// Extra wait after the first positive probe.
    pub settle: Duration,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            interval: Duration::from_secs(1),
            settle: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuickwitClient {
    base_url: String,
    http: Client,
}

impl QuickwitClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::builder().build()?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&url).map_err(|e| ClientError::InvalidUrl {
            url,
            reason: e.to_string(),
        })
    }

    /// `POST {base}/api/v1/{index_id}/ingest`
    pub fn ingest_url(&self, index_id: &str) -> Result<Url, ClientError> {
        self.endpoint(&format!("api/v1/{index_id}/ingest"))
    }

    /// One readiness probe: `Ok(())` on 200 with a truthy JSON body,
    /// otherwise the reason it is not ready yet.
    pub async fn probe_ready(&self, request_timeout: Duration) -> Result<(), ProbeError> {
        let url = self
            .endpoint("health/readyz")
            .map_err(|e| ProbeError::Endpoint(Box::new(e)))?;
        let response = self
            .http
            .get(url)
            .timeout(request_timeout)
            .send()
            .await
            .map_err(ProbeError::Unreachable)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProbeError::Status(status.as_u16()));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(ProbeError::InvalidBody)?;
        if is_truthy(&body) {
            Ok(())
        } else {
            Err(ProbeError::NotReady(body))
        }
    }

    /// Poll `/health/readyz` until it reports ready or `options.timeout` passes.
    pub async fn wait_ready(&self, options: ReadinessOptions) -> Result<(), ClientError> {
        info!("Waiting for service at {} to be ready...", self.base_url);
        let start = Instant::now();
        let probe_timeout = options.interval.max(Duration::from_secs(1));

        loop {
            match self.probe_ready(probe_timeout).await {
                Ok(()) => {
                    tokio::time::sleep(options.settle).await;
                    info!(
                        "Service is ready after {:.1}s",
                        start.elapsed().as_secs_f64()
                    );
                    return Ok(());
                }
                Err(probe_error) => {
                    debug!("Service not ready: {probe_error}");
                    if start.elapsed() > options.timeout {
                        return Err(ClientError::NotReady {
                            url: self.base_url.clone(),
                            timeout: options.timeout,
                            last_error: probe_error.to_string(),
                        });
                    }
                }
            }
            tokio::time::sleep(options.interval).await;
        }
    }

    /// `POST {base}/api/v1/indexes` with the YAML config. Any status other
    /// than 200 is an error carrying the response body.
    pub async fn create_index(&self, config: &IndexConfig) -> Result<(), ClientError> {
        info!("Creating index {}...", config.index_id);
        let response = self
            .http
            .post(self.endpoint("api/v1/indexes")?)
            .header(reqwest::header::CONTENT_TYPE, "application/yaml")
            .body(config.to_yaml()?)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::IndexCreation {
                index_id: config.index_id.clone(),
                status: status.as_u16(),
                body,
            });
        }

        info!("Index {} created", config.index_id);
        Ok(())
    }
}

/// Truthiness of a JSON value: `false`, `null`, `0`, `""`, `[]` and `{}` are false.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
