//! Type registry
//!
//! Maps string type tags to the parser for the concrete record shape. The
//! table is append-only: a tag, once registered, keeps its meaning.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::common::{Error, Result};
use crate::model::{Assertion, Step};

/// Parses the fields of one record (without its `type` field)
pub type Parser<T> = fn(Value) -> serde_json::Result<T>;

/// A built-in tag and the parser for its shape
pub struct Shape<T> {
    pub tag: &'static str,
    pub parse: Parser<T>,
}

/// Deserialize a concrete shape and lift it into its family
pub fn parse_shape<S, T>(value: Value) -> serde_json::Result<T>
where
    S: DeserializeOwned + Into<T>,
{
    serde_json::from_value::<S>(value).map(Into::into)
}

/// Record families with their own tag namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Assertion,
    Step,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Family::Assertion => "assertion",
            Family::Step => "step",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tag -> parser lookup tables for both families
#[derive(Clone)]
pub struct TypeRegistry {
    assertions: HashMap<String, Parser<Assertion>>,
    steps: HashMap<String, Parser<Step>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("assertions", &self.assertion_tags())
            .field("steps", &self.step_tags())
            .finish()
    }
}

static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();

impl TypeRegistry {
    /// Registry holding only the built-in shapes
    pub fn standard() -> Self {
        Self {
            assertions: table(Assertion::SHAPES),
            steps: table(Step::SHAPES),
        }
    }

    /// Process-wide standard registry
    pub fn global() -> &'static TypeRegistry {
        GLOBAL.get_or_init(Self::standard)
    }

    pub fn register_assertion(&mut self, tag: &str, parse: Parser<Assertion>) -> Result<()> {
        insert(&mut self.assertions, Family::Assertion, tag, parse)
    }

    pub fn register_step(&mut self, tag: &str, parse: Parser<Step>) -> Result<()> {
        insert(&mut self.steps, Family::Step, tag, parse)
    }

    pub fn resolve_assertion(&self, tag: &str) -> Result<Parser<Assertion>> {
        self.assertions
            .get(tag)
            .copied()
            .ok_or_else(|| Error::unknown_tag(Family::Assertion.name(), tag))
    }

    pub fn resolve_step(&self, tag: &str) -> Result<Parser<Step>> {
        self.steps
            .get(tag)
            .copied()
            .ok_or_else(|| Error::unknown_tag(Family::Step.name(), tag))
    }

    pub fn contains(&self, family: Family, tag: &str) -> bool {
        match family {
            Family::Assertion => self.assertions.contains_key(tag),
            Family::Step => self.steps.contains_key(tag),
        }
    }

    /// Registered assertion tags, sorted
    pub fn assertion_tags(&self) -> Vec<&str> {
        sorted_keys(&self.assertions)
    }

    /// Registered step tags, sorted
    pub fn step_tags(&self) -> Vec<&str> {
        sorted_keys(&self.steps)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn table<T>(shapes: &[Shape<T>]) -> HashMap<String, Parser<T>> {
    shapes
        .iter()
        .map(|shape| (shape.tag.to_string(), shape.parse))
        .collect()
}

fn insert<T>(
    table: &mut HashMap<String, Parser<T>>,
    family: Family,
    tag: &str,
    parse: Parser<T>,
) -> Result<()> {
    if table.contains_key(tag) {
        return Err(Error::DuplicateTag {
            family: family.name(),
            tag: tag.to_string(),
        });
    }
    tracing::debug!(family = %family, tag, "Registered record type");
    table.insert(tag.to_string(), parse);
    Ok(())
}

fn sorted_keys<T>(table: &HashMap<String, T>) -> Vec<&str> {
    let mut keys: Vec<&str> = table.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}
