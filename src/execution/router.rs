//! Backend selection
//!
//! The router reads the remote endpoint and credentials on first use, builds
//! exactly one backend and reuses it for the rest of its life. Later
//! configuration changes are not observed.

use std::fmt;
use std::sync::{Arc, OnceLock};

use super::extract::{run_extractors, ExtractedValues, ExtractionRequest};
use super::local::LocalExecutor;
use super::remote::{Credentials, RemoteExecutor};
use super::{BackendKind, RecipeExecutor};
use crate::common::config::{Config, Properties, RemoteConfig, Settings};
use crate::common::Result;
use crate::model::{ProjectResultReport, Recipe};

/// Builds the in-process backend when no remote endpoint is usable
pub type LocalFactory = Box<dyn Fn() -> Arc<dyn RecipeExecutor> + Send + Sync>;

pub struct ExecutionRouter {
    settings: Settings,
    remote_config: RemoteConfig,
    local_factory: LocalFactory,
    backend: OnceLock<Arc<dyn RecipeExecutor>>,
}

impl fmt::Debug for ExecutionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRouter")
            .field("settings", &self.settings)
            .field("remote_config", &self.remote_config)
            .field("backend", &self.backend.get().map(|b| b.backend_kind()))
            .finish_non_exhaustive()
    }
}

impl ExecutionRouter {
    pub fn new(config: &Config, settings: Settings) -> Self {
        let local = config.local.clone();
        Self {
            settings,
            remote_config: config.remote.clone(),
            local_factory: Box::new(move || Arc::new(LocalExecutor::from_config(&local))),
            backend: OnceLock::new(),
        }
    }

    /// Router reading the process environment and the config file properties
    pub fn from_config(config: &Config) -> Self {
        let properties = Arc::new(Properties::from_map(config.properties.clone()));
        Self::new(config, Settings::from_process(properties))
    }

    /// Replace how the local backend is built
    pub fn with_local_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn RecipeExecutor> + Send + Sync + 'static,
    {
        self.local_factory = Box::new(factory);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether a backend has been selected yet
    pub fn is_resolved(&self) -> bool {
        self.backend.get().is_some()
    }

    /// The selected backend, resolving it on first call
    pub fn backend(&self) -> Arc<dyn RecipeExecutor> {
        self.backend.get_or_init(|| self.select_backend()).clone()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend().backend_kind()
    }

    fn select_backend(&self) -> Arc<dyn RecipeExecutor> {
        let remote = self.settings.remote();
        let Some(endpoint) = remote.endpoint else {
            tracing::info!("No remote endpoint configured, executing recipes locally");
            return (self.local_factory)();
        };

        let credentials = remote
            .user
            .map(|user| Credentials::new(user, remote.password));
        match RemoteExecutor::new(&endpoint, credentials, &self.remote_config) {
            Ok(executor) => {
                tracing::info!(
                    endpoint = %executor.endpoint(),
                    user = executor.credentials().map(|c| c.user.as_str()).unwrap_or("-"),
                    "Executing recipes on remote service"
                );
                Arc::new(executor)
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %endpoint,
                    error = %e,
                    "Malformed remote endpoint, falling back to local execution"
                );
                (self.local_factory)()
            }
        }
    }

    /// Run the recipe on the selected backend; no retries
    pub async fn execute(&self, recipe: &Recipe) -> Result<ProjectResultReport> {
        self.backend().execute(recipe).await
    }

    /// Run the recipe, then the extraction pass over its report
    pub async fn execute_with_extractions(
        &self,
        recipe: &Recipe,
        pending: &[ExtractionRequest],
    ) -> Result<(ProjectResultReport, ExtractedValues)> {
        let mut report = self.execute(recipe).await?;
        let extracted = run_extractors(&mut report, pending);
        Ok((report, extracted))
    }
}
