//! Client for the remote execution service
//!
//! Recipes are posted as JSON to `{endpoint}/v1/readyapi/executions`. In
//! sync mode the response body is the final report; in async mode it is a
//! status snapshot that is polled until the execution finishes.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use std::fmt;
use std::time::Duration;

use super::{validate_recipe, BackendKind, RecipeExecutor};
use crate::common::config::{ExecutionMode, RemoteConfig};
use crate::common::{Error, Result};
use crate::model::{ProjectResultReport, Recipe};

const EXECUTIONS_PATH: [&str; 3] = ["v1", "readyapi", "executions"];

/// Longest response body quoted in a rejection error
const MAX_BODY_IN_ERROR: usize = 512;

/// Basic-auth credentials fixed at construction
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: Option<String>) -> Self {
        Self {
            user: user.into(),
            password,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Accept only absolute http(s) URLs with a host
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let invalid = |reason: String| Error::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    client: reqwest::Client,
    endpoint: Url,
    credentials: Option<Credentials>,
    mode: ExecutionMode,
    poll_interval: Duration,
}

impl RemoteExecutor {
    pub fn new(
        endpoint: &str,
        credentials: Option<Credentials>,
        config: &RemoteConfig,
    ) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            credentials,
            mode: config.mode,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Submit the recipe and wait for the final report. Structurally invalid
    /// recipes are rejected before anything is sent.
    pub async fn submit(&self, recipe: &Recipe) -> Result<ProjectResultReport> {
        validate_recipe(recipe)?;
        let asynchronous = self.mode == ExecutionMode::Async;
        let mut url = self.executions_url(&[])?;
        url.query_pairs_mut()
            .append_pair("async", if asynchronous { "true" } else { "false" });

        let body = serde_json::to_vec(recipe)?;
        tracing::debug!(url = %url, bytes = body.len(), "Submitting recipe");

        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body);
        let mut report = self.read_report(self.send(request).await?).await?;

        if asynchronous {
            while !report.status.is_terminal() {
                if report.execution_id.is_empty() {
                    return Err(Error::Protocol(
                        "status report without an executionID".to_string(),
                    ));
                }
                tokio::time::sleep(self.poll_interval).await;
                report = self.poll(&report.execution_id).await?;
            }
        }

        tracing::info!(
            execution_id = %report.execution_id,
            status = report.status.as_str(),
            "Remote execution finished"
        );
        Ok(report)
    }

    async fn poll(&self, execution_id: &str) -> Result<ProjectResultReport> {
        let url = self.executions_url(&[execution_id, "status"])?;
        tracing::debug!(url = %url, "Polling execution status");
        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        self.read_report(self.send(request).await?).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match &self.credentials {
            Some(creds) => request.basic_auth(&creds.user, creds.password.as_ref()),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| Error::transport(self.endpoint.as_str(), e))
    }

    async fn read_report(&self, response: Response) -> Result<ProjectResultReport> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(self.endpoint.as_str(), e))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                user: self
                    .credentials
                    .as_ref()
                    .map(|c| c.user.clone())
                    .unwrap_or_else(|| "<anonymous>".to_string()),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(Error::RemoteRejected {
                status: status.as_u16(),
                message: truncate(&body, MAX_BODY_IN_ERROR),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Protocol(format!("unparseable result report: {}", e)))
    }

    /// `{endpoint}/v1/readyapi/executions/{extra...}`
    fn executions_url(&self, extra: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| Error::InvalidEndpoint {
                endpoint: self.endpoint.to_string(),
                reason: "cannot be used as a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(EXECUTIONS_PATH)
            .extend(extra);
        Ok(url)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[async_trait]
impl RecipeExecutor for RemoteExecutor {
    async fn execute(&self, recipe: &Recipe) -> Result<ProjectResultReport> {
        self.submit(recipe).await
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Remote {
            endpoint: self.endpoint.to_string(),
        }
    }
}
