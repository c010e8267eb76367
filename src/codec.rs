//! Recipe serializer
//!
//! Converts recipes to and from their JSON/YAML wire form. Every polymorphic
//! record is decoded by reading its `type` field first, resolving the tag in
//! the [`TypeRegistry`] and then parsing the remaining fields against the
//! resolved shape.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::{Error, Result};
use crate::model::{Assertion, PluginRecord, Recipe, Step, TYPE_FIELD};
use crate::registry::{Family, TypeRegistry};

const ASSERTIONS_FIELD: &str = "assertions";

/// What to do with a record whose tag is not registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagPolicy {
    /// Fail with an unknown-tag error
    #[default]
    Strict,
    /// Keep the record verbatim as a plugin record
    PassThrough,
}

impl TagPolicy {
    pub fn from_allow_plugins(allow: bool) -> Self {
        if allow {
            TagPolicy::PassThrough
        } else {
            TagPolicy::Strict
        }
    }
}

/// Wire format of a recipe file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// `.yaml`/`.yml` is YAML, anything else JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }
}

/// Top-level envelope; steps are decoded through the registry
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "crate::model::text_map")]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    test_steps: Vec<Value>,
}

/// Registry-backed recipe encoder/decoder
#[derive(Debug, Clone, Copy)]
pub struct RecipeCodec<'r> {
    registry: &'r TypeRegistry,
    policy: TagPolicy,
}

impl RecipeCodec<'static> {
    /// Strict codec over the process-wide standard registry
    pub fn standard() -> Self {
        Self::new(TypeRegistry::global())
    }
}

impl<'r> RecipeCodec<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            policy: TagPolicy::Strict,
        }
    }

    pub fn with_policy(mut self, policy: TagPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read and decode a recipe file, picking the format from its extension
    pub fn load(&self, path: &Path) -> Result<Recipe> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        self.decode(&text, Format::from_path(path))
    }

    pub fn decode(&self, text: &str, format: Format) -> Result<Recipe> {
        let value: Value = match format {
            Format::Json => serde_json::from_str(text)?,
            Format::Yaml => serde_yaml::from_str(text)?,
        };
        self.decode_value(value)
    }

    pub fn decode_value(&self, value: Value) -> Result<Recipe> {
        let document: RecipeDocument =
            serde_json::from_value(value).map_err(|e| Error::malformed("recipe", e))?;

        let test_steps = document
            .test_steps
            .into_iter()
            .map(|step| self.decode_step(step))
            .collect::<Result<Vec<_>>>()?;

        Ok(Recipe {
            name: document.name,
            properties: document.properties,
            test_steps,
        })
    }

    pub fn decode_step(&self, value: Value) -> Result<Step> {
        let (tag, mut fields) = split_tag(Family::Step, value)?;

        let parse = match self.registry.resolve_step(&tag) {
            Ok(parse) => parse,
            Err(err) => return self.pass_through(err, tag, fields).map(Step::Plugin),
        };

        let raw_assertions = match fields.remove(ASSERTIONS_FIELD) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(Error::malformed(&tag, "'assertions' must be a list")),
        };

        let mut step = parse(Value::Object(fields)).map_err(|e| Error::malformed(&tag, e))?;
        let assertions = raw_assertions
            .into_iter()
            .map(|a| self.decode_assertion(a))
            .collect::<Result<Vec<_>>>()?;

        if !assertions.is_empty() {
            let buffered = assertions.len();
            match step.assertions_mut() {
                Some(list) => list.extend(assertions),
                None => {
                    return Err(Error::AssertionsNotSupported {
                        step_type: tag,
                        buffered,
                    })
                }
            }
        }
        Ok(step)
    }

    pub fn decode_assertion(&self, value: Value) -> Result<Assertion> {
        let (tag, fields) = split_tag(Family::Assertion, value)?;
        match self.registry.resolve_assertion(&tag) {
            Ok(parse) => parse(Value::Object(fields)).map_err(|e| Error::malformed(&tag, e)),
            Err(err) => self.pass_through(err, tag, fields).map(Assertion::Plugin),
        }
    }

    fn pass_through(&self, err: Error, tag: String, fields: Map<String, Value>) -> Result<PluginRecord> {
        match self.policy {
            TagPolicy::Strict => Err(err),
            TagPolicy::PassThrough => {
                tracing::debug!(tag = %tag, "Keeping unregistered record as plugin");
                Ok(PluginRecord { tag, fields })
            }
        }
    }

    pub fn encode(&self, recipe: &Recipe, format: Format) -> Result<String> {
        match format {
            Format::Json => Ok(serde_json::to_string_pretty(recipe)?),
            Format::Yaml => Ok(serde_yaml::to_string(recipe)?),
        }
    }

    pub fn encode_value(&self, recipe: &Recipe) -> Result<Value> {
        Ok(serde_json::to_value(recipe)?)
    }
}

/// Take the `type` discriminator off a record, returning it and the other fields
fn split_tag(family: Family, value: Value) -> Result<(String, Map<String, Value>)> {
    let mut fields = match value {
        Value::Object(map) => map,
        other => {
            return Err(Error::malformed(
                family.name(),
                format!("expected an object, found {}", kind_of(&other)),
            ))
        }
    };
    match fields.remove(TYPE_FIELD) {
        Some(Value::String(tag)) => Ok((tag, fields)),
        None | Some(Value::Null) => Err(Error::MissingTag {
            family: family.name(),
        }),
        Some(other) => Err(Error::malformed(
            family.name(),
            format!("'type' must be a string, found {}", kind_of(&other)),
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
