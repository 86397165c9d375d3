//! JSON-over-HTTP client for the prediction/training service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::http_client;

/// Readiness probe endpoint.
pub const HEALTH_ENDPOINT: &str = "health";
/// Training endpoint.
pub const TRAIN_ENDPOINT: &str = "train";
/// Prediction endpoint.
pub const PREDICT_ENDPOINT: &str = "predict";
/// Graceful shutdown endpoint.
pub const SHUTDOWN_ENDPOINT: &str = "shutdown";

/// `status` value reported by a ready service.
const HEALTHY_STATUS: &str = "healthy";

/// Host and port of the local service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    pub host: String,
    pub port: u16,
}

impl Default for ServiceAddress {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
        }
    }
}

impl ServiceAddress {
    fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://{}:{}/", self.host, self.port))
    }
}

/// Request timeouts used by [`RpcClient`].
#[derive(Debug, Clone, Copy)]
pub struct RpcTimeouts {
    /// Timeout for health, train and predict requests.
    pub request: Duration,
    /// Timeout for the advisory shutdown request.
    pub shutdown: Duration,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_millis(5000),
            shutdown: Duration::from_millis(1000),
        }
    }
}

/// The address could not be turned into a URL.
#[derive(Debug, Error)]
#[error("Invalid service address {host}:{port}: {source}")]
pub struct InvalidAddress {
    pub host: String,
    pub port: u16,
    pub source: url::ParseError,
}

/// A request did not produce a readable response.
///
/// Connection failures, DNS errors, timeouts and unreadable bodies are not
/// distinguished further.
#[derive(Debug, Error)]
#[error("Request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

/// Body of a `/train` request.
#[derive(Debug, Clone, Serialize)]
pub struct TrainRequest<'a> {
    pub base_name: &'a str,
    pub base_path: &'a str,
    pub config_path: &'a str,
    pub model_type: &'a str,
}

/// Body of a `/predict` request.
#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest<'a> {
    pub file_path: &'a str,
    pub model_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_name: Option<&'a str>,
}

/// Fields of the `/health` response this client cares about.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(alias = "modelLoaded")]
    pub model_loaded: bool,
}

impl HealthStatus {
    /// True when the service reports itself healthy with a loaded model.
    pub fn is_ready(&self) -> bool {
        self.status == HEALTHY_STATUS && self.model_loaded
    }
}

/// Typed client for the service endpoints.
///
/// No retries happen here; callers decide whether to try again.
#[derive(Debug, Clone)]
pub struct RpcClient {
    agent: ureq::Agent,
    shutdown_agent: ureq::Agent,
    health_url: String,
    train_url: String,
    predict_url: String,
    shutdown_url: String,
}

impl RpcClient {
    /// Build a client for `address`.
    pub fn new(address: &ServiceAddress, timeouts: RpcTimeouts) -> Result<Self, InvalidAddress> {
        let endpoint = |path: &str| -> Result<String, InvalidAddress> {
            address
                .base_url()
                .and_then(|base| base.join(path))
                .map(String::from)
                .map_err(|source| InvalidAddress {
                    host: address.host.clone(),
                    port: address.port,
                    source,
                })
        };
        Ok(Self {
            agent: http_client::agent_with_timeout(timeouts.request),
            shutdown_agent: http_client::agent_with_timeout(timeouts.shutdown),
            health_url: endpoint(HEALTH_ENDPOINT)?,
            train_url: endpoint(TRAIN_ENDPOINT)?,
            predict_url: endpoint(PREDICT_ENDPOINT)?,
            shutdown_url: endpoint(SHUTDOWN_ENDPOINT)?,
        })
    }

    /// Probe `/health`. Every failure is reported as `false`.
    pub fn health_check(&self) -> bool {
        match self.fetch_health() {
            Ok(health) => {
                debug!(
                    "Health: status={} model_loaded={}",
                    health.status, health.model_loaded
                );
                health.is_ready()
            }
            Err(err) => {
                debug!("Health check failed: {err}");
                false
            }
        }
    }

    /// Ask the service to train on a stored learning base.
    ///
    /// The response body is returned as-is, whatever the HTTP status.
    pub fn train(
        &self,
        base_name: &str,
        base_path: &str,
        config_path: &str,
        model_type: &str,
    ) -> Result<String, TransportError> {
        info!("Training request: base={base_name} model_type={model_type}");
        let request = TrainRequest {
            base_name,
            base_path,
            config_path,
            model_type,
        };
        self.post_json(&self.train_url, &request)
    }

    /// Ask the service to predict on `file_path` with `model_name`.
    ///
    /// The response body is returned as-is, whatever the HTTP status.
    pub fn predict(
        &self,
        file_path: &str,
        model_name: &str,
        base_name: Option<&str>,
    ) -> Result<String, TransportError> {
        info!("Prediction request: file={file_path} model={model_name}");
        let request = PredictRequest {
            file_path,
            model_name,
            base_name,
        };
        self.post_json(&self.predict_url, &request)
    }

    /// Request a graceful shutdown. Failures are logged and otherwise ignored.
    pub fn shutdown(&self) {
        match self
            .shutdown_agent
            .post(&self.shutdown_url)
            .send_string("")
        {
            Ok(_) => debug!("Shutdown request accepted"),
            Err(err) => debug!("Shutdown request failed: {err}"),
        }
    }

    fn fetch_health(&self) -> Result<HealthStatus, String> {
        let response = match self.agent.get(&self.health_url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                debug!("Health endpoint answered HTTP {code}");
                response
            }
            Err(ureq::Error::Transport(err)) => return Err(err.to_string()),
        };
        let body = http_client::read_response_text(response, http_client::MAX_RESPONSE_BYTES)
            .map_err(|err| err.to_string())?;
        parse_health(&body)
    }

    fn post_json<T: Serialize>(&self, url: &str, body: &T) -> Result<String, TransportError> {
        let transport_err = |message: String| TransportError {
            url: url.to_string(),
            message,
        };
        let response = match self.agent.post(url).send_json(body) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                warn!("Service answered HTTP {code} for {url}");
                response
            }
            Err(ureq::Error::Transport(err)) => return Err(transport_err(err.to_string())),
        };
        http_client::read_response_text(response, http_client::MAX_RESPONSE_BYTES)
            .map_err(|err| transport_err(err.to_string()))
    }
}

fn parse_health(body: &str) -> Result<HealthStatus, String> {
    serde_json::from_str(body.trim()).map_err(|err| format!("{err}: {}", body.trim()))
}
