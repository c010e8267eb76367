//! Recipe assembly helpers
//!
//! [`StepAssembler`] lets assertions be declared before the step they belong
//! to exists. [`Extraction`] wires property extractors to a correlation id so
//! values can be picked out of the report after execution.

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::common::{Error, Result};
use crate::execution::extract::{ExtractionRequest, EXTRACTOR_DATA_KEY};
use crate::model::recipe::{ExtractSource, PropertyExtractor};
use crate::model::{Assertion, Recipe, Step};

/// Buffers assertions until the step they attach to is materialized
#[derive(Debug, Clone, PartialEq)]
pub enum StepAssembler {
    Pending { buffered: Vec<Assertion> },
    Attached { step: Step },
}

impl Default for StepAssembler {
    fn default() -> Self {
        StepAssembler::Pending {
            buffered: Vec::new(),
        }
    }
}

impl StepAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer the assertion, or attach it directly once the step exists
    pub fn add_assertion(&mut self, assertion: impl Into<Assertion>) -> Result<()> {
        match self {
            StepAssembler::Pending { buffered } => {
                buffered.push(assertion.into());
                Ok(())
            }
            StepAssembler::Attached { step } => {
                let step_type = step.tag().to_string();
                match step.assertions_mut() {
                    Some(list) => {
                        list.push(assertion.into());
                        Ok(())
                    }
                    None => Err(Error::AssertionsNotSupported {
                        step_type,
                        buffered: 1,
                    }),
                }
            }
        }
    }

    /// Attach the step, flushing buffered assertions onto it in order
    ///
    /// On error the assembler is left unchanged.
    pub fn materialize(&mut self, step: impl Into<Step>) -> Result<()> {
        let mut step = step.into();
        let buffered = match self {
            StepAssembler::Attached { .. } => return Err(Error::StepAlreadyMaterialized),
            StepAssembler::Pending { buffered } => buffered,
        };

        if !buffered.is_empty() {
            let step_type = step.tag().to_string();
            let count = buffered.len();
            match step.assertions_mut() {
                Some(list) => list.append(buffered),
                None => {
                    return Err(Error::AssertionsNotSupported {
                        step_type,
                        buffered: count,
                    })
                }
            }
        }

        *self = StepAssembler::Attached { step };
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, StepAssembler::Attached { .. })
    }

    pub fn buffered(&self) -> &[Assertion] {
        match self {
            StepAssembler::Pending { buffered } => buffered,
            StepAssembler::Attached { .. } => &[],
        }
    }

    pub fn step(&self) -> Option<&Step> {
        match self {
            StepAssembler::Attached { step } => Some(step),
            StepAssembler::Pending { .. } => None,
        }
    }

    pub fn into_step(self) -> Option<Step> {
        match self {
            StepAssembler::Attached { step } => Some(step),
            StepAssembler::Pending { .. } => None,
        }
    }
}

/// Fluent recipe construction
#[derive(Debug, Clone, Default)]
pub struct RecipeBuilder {
    name: Option<String>,
    properties: BTreeMap<String, String>,
    steps: Vec<Step>,
    extraction: Option<ExtractionRequest>,
}

impl RecipeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn add_step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Add the step held by an assembler; pending assemblers are rejected
    pub fn add_assembled(mut self, assembler: StepAssembler) -> Result<Self> {
        match assembler {
            StepAssembler::Attached { step } => {
                self.steps.push(step);
                Ok(self)
            }
            StepAssembler::Pending { buffered } => Err(Error::InvalidRecipe(format!(
                "{} assertion(s) buffered but no step was materialized",
                buffered.len()
            ))),
        }
    }

    /// Correlate this recipe's extractors with `extraction`
    ///
    /// A recipe carries a single correlation id; a later call replaces it.
    pub fn with_extraction(mut self, extraction: Extraction) -> Self {
        let request = extraction.into_request();
        if let Some(previous) = &self.extraction {
            tracing::warn!(previous = %previous.id, id = %request.id, "Replacing extraction request");
        }
        self.properties
            .insert(EXTRACTOR_DATA_KEY.to_string(), request.id.clone());
        self.extraction = Some(request);
        self
    }

    pub fn build(self) -> Result<Recipe> {
        self.build_with_extractions().map(|(recipe, _)| recipe)
    }

    /// Build the recipe and hand back the pending extraction requests
    pub fn build_with_extractions(self) -> Result<(Recipe, Vec<ExtractionRequest>)> {
        if self.steps.is_empty() {
            return Err(Error::InvalidRecipe("recipe has no steps".to_string()));
        }
        let recipe = Recipe {
            name: self.name,
            properties: self.properties,
            test_steps: self.steps,
        };
        Ok((recipe, self.extraction.into_iter().collect()))
    }
}

/// Generates correlated property extractors for one recipe
#[derive(Debug, Clone)]
pub struct Extraction {
    request: ExtractionRequest,
}

impl Default for Extraction {
    fn default() -> Self {
        Self::new()
    }
}

impl Extraction {
    /// Fresh random correlation id
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            request: ExtractionRequest::new(id),
        }
    }

    pub fn id(&self) -> &str {
        &self.request.id
    }

    /// Extractor writing into `<id>.<target>`, registered for `target`
    pub fn extract(
        &mut self,
        source: ExtractSource,
        expression: Option<&str>,
        target: impl Into<String>,
    ) -> PropertyExtractor {
        let target = target.into();
        let property = format!("{}.{}", self.request.id, target);
        self.request.operators.insert(property.clone(), target);
        PropertyExtractor {
            source,
            expression: expression.map(str::to_string),
            property,
        }
    }

    pub fn json_path(&mut self, path: &str, target: impl Into<String>) -> PropertyExtractor {
        self.extract(ExtractSource::JsonPath, Some(path), target)
    }

    pub fn header(&mut self, name: &str, target: impl Into<String>) -> PropertyExtractor {
        self.extract(ExtractSource::Header, Some(name), target)
    }

    pub fn into_request(self) -> ExtractionRequest {
        self.request
    }
}
