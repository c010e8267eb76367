//! Recipe and step records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{is_false, millis, text_map};
use super::Assertion;

/// Step type tags
pub mod step_tags {
    pub const REST_REQUEST: &str = "REST Request";
    pub const JDBC_REQUEST: &str = "JDBC Request";
    pub const DELAY: &str = "Delay";
    pub const PROPERTIES: &str = "Properties";
}

/// HTTP methods a REST step may use
pub const HTTP_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "TRACE",
];

/// An ordered test recipe
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Seeded into the test case property bag before the first step
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    /// Execution order
    pub test_steps: Vec<Step>,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.test_steps.is_empty()
    }
}

tagged_family! {
    /// One step of a recipe
    Step {
        RestRequest(RestRequestStep) => step_tags::REST_REQUEST,
        JdbcRequest(JdbcRequestStep) => step_tags::JDBC_REQUEST,
        Delay(DelayStep) => step_tags::DELAY,
        Properties(PropertiesStep) => step_tags::PROPERTIES,
    }
}

impl Step {
    pub fn name(&self) -> Option<&str> {
        match self {
            Step::RestRequest(s) => s.name.as_deref(),
            Step::JdbcRequest(s) => s.name.as_deref(),
            Step::Delay(s) => s.name.as_deref(),
            Step::Properties(s) => s.name.as_deref(),
            Step::Plugin(record) => record.fields.get("name").and_then(|v| v.as_str()),
        }
    }

    /// Name used in reports: the explicit name, else the tag and position
    pub fn display_name(&self, index: usize) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("{} {}", self.tag(), index + 1),
        }
    }

    pub fn assertions(&self) -> &[Assertion] {
        match self {
            Step::RestRequest(s) => &s.assertions,
            Step::JdbcRequest(s) => &s.assertions,
            Step::Delay(_) | Step::Properties(_) | Step::Plugin(_) => &[],
        }
    }

    /// The assertion list, or `None` for step kinds that cannot carry one
    pub fn assertions_mut(&mut self) -> Option<&mut Vec<Assertion>> {
        match self {
            Step::RestRequest(s) => Some(&mut s.assertions),
            Step::JdbcRequest(s) => Some(&mut s.assertions),
            Step::Delay(_) | Step::Properties(_) | Step::Plugin(_) => None,
        }
    }
}

/// Where a REST parameter is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterType {
    #[default]
    Query,
    Path,
    Header,
    Matrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestParameter {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: ParameterType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationType {
    #[serde(rename = "Basic")]
    Basic,
    #[serde(rename = "OAuth 2.0")]
    OAuth2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
    #[serde(rename = "type")]
    pub kind: AuthenticationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Authentication {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind: AuthenticationType::Basic,
            username: Some(username.into()),
            password: Some(password.into()),
            access_token: None,
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            kind: AuthenticationType::OAuth2,
            username: None,
            password: None,
            access_token: Some(token.into()),
        }
    }
}

/// What part of a response a property extractor reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractSource {
    Status,
    Header,
    Body,
    JsonPath,
}

/// Copies part of a step response into the case property bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyExtractor {
    pub source: ExtractSource,
    /// Header name or JsonPath; unused for `STATUS` and `BODY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestRequestStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub method: String,
    #[serde(rename = "URI")]
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<RestParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extractors: Vec<PropertyExtractor>,
    /// Decoded separately through the registry
    #[serde(default, skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

impl RestRequestStep {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new("POST", uri)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>, media_type: impl Into<String>) -> Self {
        self.request_body = Some(body.into());
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_parameter(
        mut self,
        kind: ParameterType,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.parameters.push(RestParameter {
            name: name.into(),
            value: value.into(),
            kind,
        });
        self
    }

    pub fn with_authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = Some(authentication);
        self
    }

    pub fn with_extractor(mut self, extractor: PropertyExtractor) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn with_assertion(mut self, assertion: impl Into<Assertion>) -> Self {
        self.assertions.push(assertion.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdbcRequestStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub driver: String,
    pub connection_string: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sql_query: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stored_procedure: bool,
    #[serde(
        default,
        deserialize_with = "text_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Milliseconds
    #[serde(deserialize_with = "millis")]
    pub delay: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertiesStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "text_map")]
    pub properties: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rest_step_uses_uri_field_name() {
        let step: Step = RestRequestStep::get("http://localhost/api")
            .with_assertion(Assertion::valid_status_codes([200]))
            .into();
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "REST Request",
                "method": "GET",
                "URI": "http://localhost/api",
                "assertions": [
                    { "type": "Valid HTTP Status Codes", "validStatusCodes": ["200"] }
                ]
            })
        );
    }

    #[test]
    fn test_recipe_wire_shape() {
        let recipe = Recipe {
            name: Some("geocode".into()),
            properties: BTreeMap::new(),
            test_steps: vec![DelayStep { name: None, delay: 10 }.into()],
        };
        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(
            value,
            json!({ "name": "geocode", "testSteps": [ { "type": "Delay", "delay": 10 } ] })
        );
    }

    #[test]
    fn test_only_request_steps_carry_assertions() {
        let mut rest: Step = RestRequestStep::get("http://x").into();
        let mut delay: Step = DelayStep::default().into();
        assert!(rest.assertions_mut().is_some());
        assert!(delay.assertions_mut().is_none());
        assert!(delay.assertions().is_empty());
    }

    #[test]
    fn test_display_name_falls_back_to_tag() {
        let step: Step = DelayStep::default().into();
        assert_eq!(step.display_name(2), "Delay 3");
        let named: Step = RestRequestStep::get("http://x").named("lookup").into();
        assert_eq!(named.display_name(0), "lookup");
    }

    #[test]
    fn test_method_is_uppercased() {
        assert_eq!(RestRequestStep::new("patch", "http://x").method, "PATCH");
    }
}
