//! Declarative API test recipes
//!
//! A recipe is an ordered list of typed steps, each carrying typed
//! assertions. Recipes are decoded through a tag registry, executed either
//! in process or on a remote execution service, and produce a result report
//! from which correlated values can be extracted.

pub mod builder;
pub mod cli;
pub mod codec;
pub mod commands;
pub mod common;
pub mod execution;
pub mod model;
pub mod registry;

// Re-export commonly used types for tests
pub use builder::{Extraction, RecipeBuilder, StepAssembler};
pub use codec::{Format, RecipeCodec, TagPolicy};
pub use common::{Error, ErrorCategory, Result};
pub use execution::{execute_recipe, BackendKind, ExecutionRouter, RecipeExecutor};
pub use model::{Assertion, ProjectResultReport, Recipe, Step};
pub use registry::TypeRegistry;
