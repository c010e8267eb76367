//! Assertion records
//!
//! Field names follow the camelCase wire format. Unset optional fields and
//! `false` flags are omitted when serializing.

use serde::{Deserialize, Serialize};

use super::{is_false, text, text_list};

/// Assertion type tags
pub mod tags {
    pub const VALID_HTTP_STATUS_CODES: &str = "Valid HTTP Status Codes";
    pub const INVALID_HTTP_STATUS_CODES: &str = "Invalid HTTP Status Codes";
    pub const SIMPLE_CONTAINS: &str = "Contains";
    pub const SIMPLE_NOT_CONTAINS: &str = "Not Contains";
    pub const XPATH_MATCH: &str = "XPath Match";
    pub const XQUERY_MATCH: &str = "XQuery Match";
    pub const JSON_PATH_MATCH: &str = "JsonPath Match";
    pub const JSON_PATH_COUNT: &str = "JsonPath Count";
    pub const SCRIPT: &str = "Script Assertion";
    pub const RESPONSE_SLA: &str = "Response SLA";
    pub const JDBC_STATUS: &str = "JDBC Status";
    pub const JDBC_TIMEOUT: &str = "JDBC Timeout";
    pub const SCHEMA_COMPLIANCE: &str = "Schema Compliance";
    pub const SOAP_FAULT: &str = "SOAP Fault";
    pub const NOT_SOAP_FAULT: &str = "Not SOAP Fault";
}

tagged_family! {
    /// A typed check attached to a request step
    Assertion {
        ValidHttpStatusCodes(ValidHttpStatusCodesAssertion) => tags::VALID_HTTP_STATUS_CODES,
        InvalidHttpStatusCodes(InvalidHttpStatusCodesAssertion) => tags::INVALID_HTTP_STATUS_CODES,
        Contains(ContainsAssertion) => tags::SIMPLE_CONTAINS,
        NotContains(NotContainsAssertion) => tags::SIMPLE_NOT_CONTAINS,
        XPathMatch(XPathContainsAssertion) => tags::XPATH_MATCH,
        XQueryMatch(XQueryContainsAssertion) => tags::XQUERY_MATCH,
        JsonPathMatch(JsonPathContentAssertion) => tags::JSON_PATH_MATCH,
        JsonPathCount(JsonPathCountAssertion) => tags::JSON_PATH_COUNT,
        Script(ScriptAssertion) => tags::SCRIPT,
        ResponseSla(ResponseSlaAssertion) => tags::RESPONSE_SLA,
        JdbcStatus(JdbcStatusAssertion) => tags::JDBC_STATUS,
        JdbcTimeout(JdbcTimeoutAssertion) => tags::JDBC_TIMEOUT,
        SchemaCompliance(SchemaComplianceAssertion) => tags::SCHEMA_COMPLIANCE,
        SoapFault(SoapFaultAssertion) => tags::SOAP_FAULT,
        NotSoapFault(NotSoapFaultAssertion) => tags::NOT_SOAP_FAULT,
    }
}

impl Assertion {
    /// Display name if one was given
    pub fn name(&self) -> Option<&str> {
        match self {
            Assertion::ValidHttpStatusCodes(a) => a.name.as_deref(),
            Assertion::InvalidHttpStatusCodes(a) => a.name.as_deref(),
            Assertion::Contains(a) => a.name.as_deref(),
            Assertion::NotContains(a) => a.name.as_deref(),
            Assertion::XPathMatch(a) => a.name.as_deref(),
            Assertion::XQueryMatch(a) => a.name.as_deref(),
            Assertion::JsonPathMatch(a) => a.name.as_deref(),
            Assertion::JsonPathCount(a) => a.name.as_deref(),
            Assertion::Script(a) => a.name.as_deref(),
            Assertion::ResponseSla(a) => a.name.as_deref(),
            Assertion::JdbcStatus(a) => a.name.as_deref(),
            Assertion::JdbcTimeout(a) => a.name.as_deref(),
            Assertion::SchemaCompliance(a) => a.name.as_deref(),
            Assertion::SoapFault(a) => a.name.as_deref(),
            Assertion::NotSoapFault(a) => a.name.as_deref(),
            Assertion::Plugin(record) => record.fields.get("name").and_then(|v| v.as_str()),
        }
    }

    pub fn valid_status_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        ValidHttpStatusCodesAssertion {
            name: None,
            valid_status_codes: codes.into_iter().map(|c| c.to_string()).collect(),
        }
        .into()
    }

    pub fn invalid_status_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        InvalidHttpStatusCodesAssertion {
            name: None,
            invalid_status_codes: codes.into_iter().map(|c| c.to_string()).collect(),
        }
        .into()
    }

    pub fn contains(token: impl Into<String>) -> Self {
        ContainsAssertion {
            token: token.into(),
            ..Default::default()
        }
        .into()
    }

    pub fn not_contains(token: impl Into<String>) -> Self {
        NotContainsAssertion {
            token: token.into(),
            ..Default::default()
        }
        .into()
    }

    /// JsonPath content match, wildcards enabled
    pub fn json_path_match(json_path: impl Into<String>, expected: impl Into<String>) -> Self {
        JsonPathContentAssertion {
            name: None,
            json_path: json_path.into(),
            expected_content: expected.into(),
            allow_wildcards: true,
        }
        .into()
    }

    pub fn json_path_count(json_path: impl Into<String>, expected: usize) -> Self {
        JsonPathCountAssertion {
            name: None,
            json_path: json_path.into(),
            expected_count: expected.to_string(),
            allow_wildcards: true,
        }
        .into()
    }

    pub fn max_response_time(millis: u64) -> Self {
        ResponseSlaAssertion {
            name: None,
            max_response_time: millis.to_string(),
        }
        .into()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidHttpStatusCodesAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub valid_status_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidHttpStatusCodesAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub invalid_status_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainsAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "text")]
    pub token: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_case: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub use_regexp: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotContainsAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "text")]
    pub token: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_case: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub use_regexp: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XPathContainsAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub xpath: String,
    #[serde(deserialize_with = "text")]
    pub expected_content: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_wildcards: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_namespaces: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_comments: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XQueryContainsAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub xquery: String,
    #[serde(deserialize_with = "text")]
    pub expected_content: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_wildcards: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonPathContentAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub json_path: String,
    #[serde(deserialize_with = "text")]
    pub expected_content: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_wildcards: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonPathCountAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub json_path: String,
    #[serde(deserialize_with = "text")]
    pub expected_count: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_wildcards: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSlaAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Milliseconds, kept as text like the rest of the wire format
    #[serde(deserialize_with = "text")]
    pub max_response_time: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdbcStatusAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdbcTimeoutAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "text")]
    pub timeout: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaComplianceAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// URL of the schema definition; the service default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoapFaultAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotSoapFaultAssertion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
