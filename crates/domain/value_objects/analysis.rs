use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::errors::ErrorKind;

/// Text payload returned by the inference endpoint, before any validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawAnalyzerResponse {
    pub text: String,
    pub model_version: Option<String>,
    pub finish_reason: Option<String>,
}

impl RawAnalyzerResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Outcome of parsing the raw analyzer text. Never passed beyond the
/// normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Parsed(Map<String, Value>),
    Malformed(String),
}

impl ParsedResponse {
    pub fn parse(raw: &RawAnalyzerResponse) -> Self {
        let body = strip_code_fence(raw.text.trim());
        if body.is_empty() {
            return ParsedResponse::Malformed("analyzer returned an empty response".to_string());
        }

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => ParsedResponse::Parsed(map),
            Ok(other) => ParsedResponse::Malformed(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )),
            Err(err) => ParsedResponse::Malformed(format!("response is not valid JSON: {err}")),
        }
    }
}

// Models occasionally wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fields the caller expects from the analyzer, and the defaults substituted
/// when the analyzer leaves them out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSchema {
    required: BTreeSet<String>,
    optional: BTreeSet<String>,
    defaults: Map<String, Value>,
}

impl ResultSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every expected field is treated as required; a default still rescues a
    /// missing one.
    pub fn from_parts<I, S>(expected_fields: I, defaults: Map<String, Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: expected_fields.into_iter().map(Into::into).collect(),
            optional: BTreeSet::new(),
            defaults,
        }
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.optional.remove(&name);
        self.required.insert(name);
        self
    }

    pub fn optional(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.optional.insert(name);
        }
        self
    }

    pub fn with_default(mut self, name: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(name.into(), value);
        self
    }

    pub fn expected_fields(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .map(String::as_str)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    pub fn default_for(&self, name: &str) -> Option<&Value> {
        self.defaults.get(name)
    }
}

/// Validated analyzer output handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub fields: Map<String, Value>,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AnalysisResult {
    pub fn valid(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            is_valid: true,
            error: None,
            detail: None,
        }
    }

    pub fn invalid(kind: ErrorKind, detail: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            fields,
            is_valid: false,
            error: Some(kind),
            detail: Some(detail.into()),
        }
    }
}
