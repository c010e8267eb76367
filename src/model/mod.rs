//! Recipe and report data model
//!
//! Steps and assertions are polymorphic records identified by a string type
//! tag. Each family is a Rust enum generated by `tagged_family!`, which also
//! emits the tag -> parser table the type registry is seeded from, so a new
//! shape is added in exactly one place.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Name of the discriminator field carried by every polymorphic record
pub const TYPE_FIELD: &str = "type";

/// A record whose tag is not registered, kept verbatim
///
/// Only produced when the caller opts into pass-through decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub tag: String,
    pub fields: Map<String, Value>,
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

/// A scalar written where the wire format expects text. Unquoted YAML
/// (`expectedCount: 1`) arrives as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(Number),
    Flag(bool),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Number(number) => number.to_string(),
            Scalar::Flag(flag) => flag.to_string(),
        }
    }
}

pub(crate) fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

pub(crate) fn text_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    let items = Vec::<Scalar>::deserialize(deserializer)?;
    Ok(items.into_iter().map(String::from).collect())
}

pub(crate) fn text_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    let entries = BTreeMap::<String, Scalar>::deserialize(deserializer)?;
    Ok(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
}

/// Milliseconds written either as a number or as numeric text
pub(crate) fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Number(u64),
        Text(String),
    }

    match Millis::deserialize(deserializer)? {
        Millis::Number(n) => Ok(n),
        Millis::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid milliseconds '{}'", text))),
    }
}

/// Generates a tagged record family: the enum, its `tag()` accessor,
/// `From` conversions, a tag-writing `Serialize` impl and the `SHAPES` table.
macro_rules! tagged_family {
    (
        $(#[$meta:meta])*
        $family:ident {
            $($variant:ident($shape:ty) => $tag:path),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $family {
            $($variant($shape),)+
            /// Record with a tag the registry does not know
            Plugin($crate::model::PluginRecord),
        }

        impl $family {
            /// Built-in shapes, in registration order
            pub const SHAPES: &'static [$crate::registry::Shape<$family>] = &[
                $($crate::registry::Shape {
                    tag: $tag,
                    parse: $crate::registry::parse_shape::<$shape, $family>,
                },)+
            ];

            /// The type tag written as the `type` discriminator
            pub fn tag(&self) -> &str {
                match self {
                    $($family::$variant(_) => $tag,)+
                    $family::Plugin(record) => &record.tag,
                }
            }

            pub fn is_plugin(&self) -> bool {
                matches!(self, $family::Plugin(_))
            }

            fn fields(&self) -> serde_json::Result<serde_json::Value> {
                match self {
                    $($family::$variant(inner) => serde_json::to_value(inner),)+
                    $family::Plugin(record) => {
                        Ok(serde_json::Value::Object(record.fields.clone()))
                    }
                }
            }
        }

        $(
            impl From<$shape> for $family {
                fn from(shape: $shape) -> Self {
                    $family::$variant(shape)
                }
            }
        )+

        impl serde::Serialize for $family {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                use serde::ser::Error as _;

                let mut fields = match self.fields().map_err(S::Error::custom)? {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                fields.insert(
                    $crate::model::TYPE_FIELD.to_string(),
                    serde_json::Value::String(self.tag().to_string()),
                );
                serde::Serialize::serialize(&fields, serializer)
            }
        }
    };
}

pub mod assertion;
pub mod recipe;
pub mod report;

pub use assertion::Assertion;
pub use recipe::{Recipe, RestRequestStep, Step};
pub use report::{
    AssertionResult, AssertionStatus, ExecutionStatus, ProjectResultReport, TestCaseResultReport,
    TestStepResultReport, TestSuiteResultReport,
};
