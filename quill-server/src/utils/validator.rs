use quill_core::errors::QuillError;
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "email" => Some("must be a valid email"),
        "length" => Some("has invalid length"),
        _ => None,
    }
}

fn push_errors(out: &mut Map<String, Value>, errs: &ValidationErrors) {
    for (field, kind) in errs.errors() {
        if let ValidationErrorsKind::Struct(nested) = kind {
            // flattened request bodies report nested fields at the top level
            push_errors(out, nested);
        }
        if let ValidationErrorsKind::Field(field_errors) = kind {
            let messages: Vec<Value> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(str::to_string))
                        .unwrap_or_else(|| e.code.to_string())
                })
                .map(Value::String)
                .collect();
            out.insert(field.to_string(), Value::Array(messages));
        }
    }
}

/// Validate `value`, answering 400 with per-field messages under `errors`.
pub fn validated<T: Validate>(value: T, message: &str) -> anyhow::Result<T> {
    if let Err(errs) = value.validate() {
        let mut fields = Map::new();
        push_errors(&mut fields, &errs);
        return Err(QuillError::bad_request(message)
            .with_errors(Value::Object(fields))
            .into_anyhow());
    }
    Ok(value)
}

pub fn require_non_empty(field: &str, v: &str) -> anyhow::Result<()> {
    if v.trim().is_empty() {
        return Err(QuillError::bad_request(format!("{field} is required")).into_anyhow());
    }
    Ok(())
}
