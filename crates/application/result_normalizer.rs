use tracing::{debug, warn};

use crate::domain::{
    errors::ErrorKind,
    value_objects::analysis::{AnalysisResult, ParsedResponse, RawAnalyzerResponse, ResultSchema},
};

/// Validates analyzer output against `schema`.
///
/// Missing fields (absent or `null`) get their registered default. A missing
/// required field without a default makes the result a `SchemaError`; a
/// missing optional one is left out. Fields the schema doesn't name pass
/// through untouched.
pub fn normalize(raw: &RawAnalyzerResponse, schema: &ResultSchema) -> AnalysisResult {
    let mut fields = match ParsedResponse::parse(raw) {
        ParsedResponse::Parsed(fields) => fields,
        ParsedResponse::Malformed(reason) => {
            warn!(reason = %reason, "result_normalizer: malformed analyzer response");
            return AnalysisResult::invalid(ErrorKind::MalformedResponse, reason, Default::default());
        }
    };

    let mut missing = Vec::new();
    for name in schema.expected_fields() {
        if fields.get(name).is_some_and(|value| !value.is_null()) {
            continue;
        }

        if let Some(default) = schema.default_for(name) {
            debug!(field = name, "result_normalizer: substituting default");
            fields.insert(name.to_string(), default.clone());
        } else if schema.is_required(name) {
            missing.push(name.to_string());
        } else {
            fields.remove(name);
        }
    }

    if !missing.is_empty() {
        warn!(missing = ?missing, "result_normalizer: required fields missing");
        return AnalysisResult::invalid(
            ErrorKind::SchemaError,
            format!("missing required fields: {}", missing.join(", ")),
            fields,
        );
    }

    AnalysisResult::valid(fields)
}
