//! HTTP engine used by the local executor for `REST Request` steps

use async_trait::async_trait;
use reqwest::{Method, Url};
use std::time::{Duration, Instant};

use crate::common::config::LocalConfig;
use crate::common::{Error, Result};
use crate::model::recipe::{
    AuthenticationType, ParameterType, RestRequestStep, HTTP_METHODS,
};

/// Credentials attached to a single call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallAuth {
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer(String),
}

/// A fully resolved HTTP request
#[derive(Debug, Clone)]
pub struct HttpCall {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub media_type: Option<String>,
    pub auth: Option<CallAuth>,
}

/// What a step's assertions and extractors see
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub time_taken_ms: u64,
}

impl StepResponse {
    /// First header with this name, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body parsed as JSON, if it is JSON
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Sends resolved calls; the seam for scripted engines
#[async_trait]
pub trait Engine: Send + Sync {
    async fn send(&self, call: &HttpCall) -> Result<StepResponse>;
}

/// Resolve a REST step into a call
///
/// Path parameters replace `{name}` placeholders in the URI, matrix
/// parameters are appended to the path, query and header parameters go
/// where their names say.
pub fn prepare_call(step: &RestRequestStep) -> Result<HttpCall> {
    let method_name = step.method.trim().to_ascii_uppercase();
    if !HTTP_METHODS.contains(&method_name.as_str()) {
        return Err(Error::InvalidRecipe(format!(
            "unknown HTTP method '{}'",
            step.method
        )));
    }
    let method = Method::from_bytes(method_name.as_bytes())
        .map_err(|e| Error::InvalidRecipe(format!("unknown HTTP method '{}': {}", step.method, e)))?;

    if step.uri.trim().is_empty() {
        return Err(Error::InvalidRecipe("REST Request step has an empty URI".to_string()));
    }

    let mut uri = step.uri.trim().to_string();
    for param in step.parameters.iter().filter(|p| p.kind == ParameterType::Path) {
        uri = uri.replace(&format!("{{{}}}", param.name), &param.value);
    }

    let mut url = Url::parse(&uri)
        .map_err(|e| Error::InvalidRecipe(format!("invalid URI '{}': {}", step.uri, e)))?;

    let matrix: String = step
        .parameters
        .iter()
        .filter(|p| p.kind == ParameterType::Matrix)
        .map(|p| format!(";{}={}", p.name, p.value))
        .collect();
    if !matrix.is_empty() {
        let path = format!("{}{}", url.path(), matrix);
        url.set_path(&path);
    }

    let query: Vec<_> = step
        .parameters
        .iter()
        .filter(|p| p.kind == ParameterType::Query)
        .collect();
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for param in query {
            pairs.append_pair(&param.name, &param.value);
        }
    }

    let headers = step
        .parameters
        .iter()
        .filter(|p| p.kind == ParameterType::Header)
        .map(|p| (p.name.clone(), p.value.clone()))
        .collect();

    let auth = step.authentication.as_ref().and_then(|a| match a.kind {
        AuthenticationType::Basic => a.username.as_ref().map(|username| CallAuth::Basic {
            username: username.clone(),
            password: a.password.clone(),
        }),
        AuthenticationType::OAuth2 => a.access_token.clone().map(CallAuth::Bearer),
    });

    Ok(HttpCall {
        method,
        url,
        headers,
        body: step.request_body.clone(),
        media_type: step.media_type.clone(),
        auth,
    })
}

/// reqwest-backed engine
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
}

impl HttpEngine {
    pub fn new(config: &LocalConfig) -> Self {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(redirect)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not configure HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self { client }
    }
}

impl Default for HttpEngine {
    fn default() -> Self {
        Self::new(&LocalConfig::default())
    }
}

#[async_trait]
impl Engine for HttpEngine {
    async fn send(&self, call: &HttpCall) -> Result<StepResponse> {
        let mut request = self.client.request(call.method.clone(), call.url.clone());

        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &call.body {
            let has_content_type = call
                .headers
                .iter()
                .any(|(k, _)| k.eq_ignore_ascii_case("content-type"));
            if let (Some(media_type), false) = (&call.media_type, has_content_type) {
                request = request.header(reqwest::header::CONTENT_TYPE, media_type.as_str());
            }
            request = request.body(body.clone());
        }
        request = match &call.auth {
            Some(CallAuth::Basic { username, password }) => {
                request.basic_auth(username, password.as_ref())
            }
            Some(CallAuth::Bearer(token)) => request.bearer_auth(token),
            None => request,
        };

        tracing::debug!(method = %call.method, url = %call.url, "Sending request");
        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(format!("{} {}: {}", call.method, call.url, e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Request(format!("{} {}: {}", call.method, call.url, e)))?;
        let time_taken_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(status, bytes = body.len(), time_taken_ms, "Received response");
        Ok(StepResponse {
            status,
            headers,
            body,
            time_taken_ms,
        })
    }
}
