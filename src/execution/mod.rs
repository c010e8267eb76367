//! Recipe execution
//!
//! A [`RecipeExecutor`] turns a recipe into a result report. Two backends
//! exist: [`local::LocalExecutor`] runs steps in process and
//! [`remote::RemoteExecutor`] submits the recipe to an execution service.
//! [`router::ExecutionRouter`] picks one from configuration on first use.

pub mod evaluate;
pub mod extract;
pub mod http;
pub mod jsonpath;
pub mod local;
pub mod remote;
pub mod router;

use async_trait::async_trait;
use std::fmt;
use std::sync::OnceLock;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::model::recipe::JdbcRequestStep;
use crate::model::{ProjectResultReport, Recipe, Step};

pub use extract::{run_extractors, ExtractedValue, ExtractedValues, ExtractionRequest};
pub use router::ExecutionRouter;

/// Runs recipes and reports their outcome
#[async_trait]
pub trait RecipeExecutor: Send + Sync {
    /// Execute the recipe to completion
    ///
    /// Step and assertion failures are recorded in the report; an error means
    /// the recipe could not be run at all.
    async fn execute(&self, recipe: &Recipe) -> Result<ProjectResultReport>;

    /// Which backend this is
    fn backend_kind(&self) -> BackendKind;
}

/// Backend chosen by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote { endpoint: String },
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Remote { endpoint } => write!(f, "remote ({})", endpoint),
        }
    }
}

/// Reject recipes that cannot run before any step is executed
pub fn validate_recipe(recipe: &Recipe) -> Result<()> {
    if recipe.is_empty() {
        return Err(Error::InvalidRecipe("recipe has no steps".to_string()));
    }

    for (index, step) in recipe.test_steps.iter().enumerate() {
        let problem = match step {
            Step::RestRequest(rest) => http::prepare_call(rest).err().map(|e| match e {
                Error::InvalidRecipe(message) => message,
                other => other.to_string(),
            }),
            Step::JdbcRequest(jdbc) => check_jdbc(jdbc),
            Step::Delay(_) | Step::Properties(_) | Step::Plugin(_) => None,
        };
        if let Some(problem) = problem {
            return Err(Error::InvalidRecipe(format!(
                "step '{}': {}",
                step.display_name(index),
                problem
            )));
        }
    }
    Ok(())
}

fn check_jdbc(step: &JdbcRequestStep) -> Option<String> {
    if step.sql_query.trim().is_empty() {
        Some("JDBC Request step has no query".to_string())
    } else {
        None
    }
}

static ROUTER: OnceLock<ExecutionRouter> = OnceLock::new();

/// Process-wide router built from the default config file and environment
pub fn global_router() -> Result<&'static ExecutionRouter> {
    if let Some(router) = ROUTER.get() {
        return Ok(router);
    }
    let config = Config::load()?;
    let router = ExecutionRouter::from_config(&config);
    Ok(ROUTER.get_or_init(|| router))
}

/// Execute through the process-wide router
pub async fn execute_recipe(recipe: &Recipe) -> Result<ProjectResultReport> {
    global_router()?.execute(recipe).await
}
