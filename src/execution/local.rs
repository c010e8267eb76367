//! In-process executor
//!
//! Produces a report of the same shape as the remote service: one suite
//! holding one case, whose property bag starts from the recipe properties.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::evaluate::{evaluate, unsupported};
use super::http::{prepare_call, Engine, HttpEngine, StepResponse};
use super::jsonpath;
use super::{validate_recipe, BackendKind, RecipeExecutor};
use crate::common::config::LocalConfig;
use crate::common::Result;
use crate::model::recipe::{ExtractSource, PropertyExtractor, RestRequestStep};
use crate::model::{
    AssertionResult, AssertionStatus, ExecutionStatus, ProjectResultReport, Recipe, Step,
    TestCaseResultReport, TestStepResultReport, TestSuiteResultReport,
};

const DEFAULT_PROJECT_NAME: &str = "recipe";

pub struct LocalExecutor {
    engine: Arc<dyn Engine>,
}

impl LocalExecutor {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Executor over the reqwest engine
    pub fn from_config(config: &LocalConfig) -> Self {
        Self::new(Arc::new(HttpEngine::new(config)))
    }

    async fn run_step(
        &self,
        index: usize,
        step: &Step,
        bag: &mut HashMap<String, String>,
    ) -> TestStepResultReport {
        let name = step.display_name(index);
        tracing::debug!(step = %name, tag = step.tag(), "Running step");

        match step {
            Step::RestRequest(rest) => self.run_rest(name, rest, bag).await,
            Step::Delay(delay) => {
                let started = Instant::now();
                tokio::time::sleep(Duration::from_millis(delay.delay)).await;
                step_report(name, AssertionStatus::Ok, elapsed_ms(started), Vec::new())
            }
            Step::Properties(props) => {
                bag.extend(props.properties.clone());
                step_report(name, AssertionStatus::Ok, 0, Vec::new())
            }
            Step::JdbcRequest(_) | Step::Plugin(_) => {
                let message = format!(
                    "'{}' steps are not supported by the local engine",
                    step.tag()
                );
                tracing::warn!(step = %name, "{}", message);
                let mut report = step_report(name, AssertionStatus::Failed, 0, vec![message]);
                report.assertion_results = step
                    .assertions()
                    .iter()
                    .map(|a| AssertionResult {
                        tag: a.tag().to_string(),
                        name: a.name().map(str::to_string),
                        status: AssertionStatus::Failed,
                        message: Some(unsupported(a.tag())),
                    })
                    .collect();
                report
            }
        }
    }

    async fn run_rest(
        &self,
        name: String,
        step: &RestRequestStep,
        bag: &mut HashMap<String, String>,
    ) -> TestStepResultReport {
        let call = match prepare_call(step) {
            Ok(call) => call,
            Err(e) => return step_report(name, AssertionStatus::Failed, 0, vec![e.to_string()]),
        };

        let response = match self.engine.send(&call).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(step = %name, error = %e, "Request failed");
                return step_report(name, AssertionStatus::Failed, 0, vec![e.to_string()]);
            }
        };

        let assertion_results: Vec<_> = step
            .assertions
            .iter()
            .map(|a| evaluate(a, &response))
            .collect();

        let mut messages = Vec::new();
        for extractor in &step.extractors {
            match extract_value(extractor, &response) {
                Some(value) => {
                    bag.insert(extractor.property.clone(), value);
                }
                None => messages.push(format!(
                    "no value found for property '{}'",
                    extractor.property
                )),
            }
        }

        let status = if assertion_results
            .iter()
            .any(|r| r.status == AssertionStatus::Failed)
        {
            AssertionStatus::Failed
        } else {
            AssertionStatus::Ok
        };

        let mut report = step_report(name, status, response.time_taken_ms, messages);
        report.assertion_results = assertion_results;
        report
    }
}

#[async_trait]
impl RecipeExecutor for LocalExecutor {
    async fn execute(&self, recipe: &Recipe) -> Result<ProjectResultReport> {
        validate_recipe(recipe)?;

        let project_name = recipe
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
        let execution_id = uuid::Uuid::new_v4().to_string();
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let started = Instant::now();

        tracing::info!(recipe = %project_name, steps = recipe.test_steps.len(), "Executing recipe locally");

        let mut bag: HashMap<String, String> = recipe
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut steps = Vec::with_capacity(recipe.test_steps.len());
        for (index, step) in recipe.test_steps.iter().enumerate() {
            steps.push(self.run_step(index, step, &mut bag).await);
        }

        let status = if steps
            .iter()
            .any(|s| s.assertion_status == AssertionStatus::Failed)
        {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Finished
        };

        tracing::info!(recipe = %project_name, status = status.as_str(), "Recipe finished");

        Ok(ProjectResultReport {
            project_name: project_name.clone(),
            status,
            execution_id,
            start_time,
            time_taken: elapsed_ms(started),
            messages: Vec::new(),
            test_suite_result_reports: vec![TestSuiteResultReport {
                test_suite_name: project_name.clone(),
                test_suite_status: status,
                test_case_result_reports: vec![TestCaseResultReport {
                    test_case_name: project_name,
                    test_case_status: status,
                    properties: bag,
                    test_step_result_reports: steps,
                }],
            }],
        })
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Local
    }
}

fn step_report(
    name: String,
    status: AssertionStatus,
    time_taken: u64,
    messages: Vec<String>,
) -> TestStepResultReport {
    TestStepResultReport {
        test_step_name: name,
        assertion_status: status,
        time_taken,
        messages,
        assertion_results: Vec::new(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn extract_value(extractor: &PropertyExtractor, response: &StepResponse) -> Option<String> {
    match extractor.source {
        ExtractSource::Status => Some(response.status.to_string()),
        ExtractSource::Body => Some(response.body.clone()),
        ExtractSource::Header => response
            .header(extractor.expression.as_deref()?)
            .map(str::to_string),
        ExtractSource::JsonPath => {
            let body = response.json()?;
            let path = extractor.expression.as_deref()?;
            let found = jsonpath::select(&body, path).ok()?;
            found.first().map(|v| jsonpath::value_to_string(v))
        }
    }
}
