//! Local assertion evaluation against a step response

use regex::{Regex, RegexBuilder};

use super::http::StepResponse;
use super::jsonpath::{self, PathError};
use crate::model::assertion::{
    ContainsAssertion, JsonPathContentAssertion, JsonPathCountAssertion, NotContainsAssertion,
};
use crate::model::{Assertion, AssertionResult, AssertionStatus};

/// Outcome of one check
type Verdict = std::result::Result<(), String>;

/// Evaluate one assertion; never fails, problems become a FAILED result
pub fn evaluate(assertion: &Assertion, response: &StepResponse) -> AssertionResult {
    let verdict = match assertion {
        Assertion::ValidHttpStatusCodes(a) => {
            let codes = status_codes(&a.valid_status_codes);
            if codes.is_empty() {
                Err("no valid status codes configured".to_string())
            } else if codes.contains(&response.status) {
                Ok(())
            } else {
                Err(format!(
                    "status {} is not one of [{}]",
                    response.status,
                    a.valid_status_codes.join(", ")
                ))
            }
        }
        Assertion::InvalidHttpStatusCodes(a) => {
            if status_codes(&a.invalid_status_codes).contains(&response.status) {
                Err(format!("status {} is listed as invalid", response.status))
            } else {
                Ok(())
            }
        }
        Assertion::Contains(a) => contains(a, &response.body),
        Assertion::NotContains(a) => not_contains(a, &response.body),
        Assertion::JsonPathMatch(a) => json_path_match(a, response),
        Assertion::JsonPathCount(a) => json_path_count(a, response),
        Assertion::ResponseSla(a) => match a.max_response_time.trim().parse::<u64>() {
            Ok(max) if response.time_taken_ms <= max => Ok(()),
            Ok(max) => Err(format!(
                "response took {} ms, limit is {} ms",
                response.time_taken_ms, max
            )),
            Err(_) => Err(format!("invalid response time '{}'", a.max_response_time)),
        },
        Assertion::SoapFault(_) => {
            if has_soap_fault(&response.body) {
                Ok(())
            } else {
                Err("response is not a SOAP fault".to_string())
            }
        }
        Assertion::NotSoapFault(_) => {
            if has_soap_fault(&response.body) {
                Err("response is a SOAP fault".to_string())
            } else {
                Ok(())
            }
        }
        Assertion::XPathMatch(_)
        | Assertion::XQueryMatch(_)
        | Assertion::Script(_)
        | Assertion::JdbcStatus(_)
        | Assertion::JdbcTimeout(_)
        | Assertion::SchemaCompliance(_)
        | Assertion::Plugin(_) => Err(unsupported(assertion.tag())),
    };

    let (status, message) = match verdict {
        Ok(()) => (AssertionStatus::Ok, None),
        Err(message) => (AssertionStatus::Failed, Some(message)),
    };
    AssertionResult {
        tag: assertion.tag().to_string(),
        name: assertion.name().map(str::to_string),
        status,
        message,
    }
}

/// Message for assertions this engine cannot evaluate
pub fn unsupported(tag: &str) -> String {
    format!("'{}' assertions are not supported by the local engine", tag)
}

/// Entries may themselves be comma separated
fn status_codes(entries: &[String]) -> Vec<u16> {
    entries
        .iter()
        .flat_map(|entry| entry.split(','))
        .filter_map(|code| code.trim().parse().ok())
        .collect()
}

fn token_matches(token: &str, ignore_case: bool, use_regexp: bool, body: &str) -> Result<bool, String> {
    if use_regexp {
        let pattern = RegexBuilder::new(token)
            .case_insensitive(ignore_case)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| format!("invalid pattern '{}': {}", token, e))?;
        Ok(pattern.is_match(body))
    } else if ignore_case {
        Ok(body.to_lowercase().contains(&token.to_lowercase()))
    } else {
        Ok(body.contains(token))
    }
}

fn contains(a: &ContainsAssertion, body: &str) -> Verdict {
    if token_matches(&a.token, a.ignore_case, a.use_regexp, body)? {
        Ok(())
    } else {
        Err(format!("response does not contain '{}'", a.token))
    }
}

fn not_contains(a: &NotContainsAssertion, body: &str) -> Verdict {
    if token_matches(&a.token, a.ignore_case, a.use_regexp, body)? {
        Err(format!("response contains '{}'", a.token))
    } else {
        Ok(())
    }
}

fn json_body(response: &StepResponse) -> Result<serde_json::Value, String> {
    response
        .json()
        .ok_or_else(|| "response body is not JSON".to_string())
}

fn path_error(e: PathError) -> String {
    e.to_string()
}

fn json_path_match(a: &JsonPathContentAssertion, response: &StepResponse) -> Verdict {
    let body = json_body(response)?;
    let found = jsonpath::select(&body, &a.json_path).map_err(path_error)?;
    let actual = match found.as_slice() {
        [] => return Err(format!("no match for '{}'", a.json_path)),
        [single] => jsonpath::value_to_string(single),
        many => serde_json::Value::Array(many.iter().map(|v| (*v).clone()).collect()).to_string(),
    };

    let matched = if a.allow_wildcards && a.expected_content.contains('*') {
        wildcard(&a.expected_content)?.is_match(&actual)
    } else {
        actual == a.expected_content
    };
    if matched {
        Ok(())
    } else {
        Err(format!(
            "'{}' is '{}', expected '{}'",
            a.json_path, actual, a.expected_content
        ))
    }
}

fn json_path_count(a: &JsonPathCountAssertion, response: &StepResponse) -> Verdict {
    let expected: usize = a
        .expected_count
        .trim()
        .parse()
        .map_err(|_| format!("invalid expected count '{}'", a.expected_count))?;
    let body = json_body(response)?;
    let found = jsonpath::select(&body, &a.json_path).map_err(path_error)?;
    let count = match found.as_slice() {
        [serde_json::Value::Array(items)] => items.len(),
        other => other.len(),
    };
    if count == expected {
        Ok(())
    } else {
        Err(format!("'{}' counted {}, expected {}", a.json_path, count, expected))
    }
}

/// `*` matches any run of characters, everything else is literal
fn wildcard(expected: &str) -> Result<Regex, String> {
    let pattern = expected
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?s)^{}$", pattern)).map_err(|e| e.to_string())
}

fn has_soap_fault(body: &str) -> bool {
    body.contains(":Fault>") || body.contains(":Fault ") || body.contains("<Fault>")
}
