// ── Normalized response envelope ──
//
// Every request produces exactly one `ApiResponse`, built once from the
// raw JSON payload and never mutated. The expected envelope shape is:
//
//   { success: bool,
//     data?: { [resourceName]: any },
//     error?: { code, text },
//     "field-errors"?: { [field]: any } }
//
// Keys inside `error` and `field-errors` arrive in snake_case and are
// converted to the PascalCase field naming used by the model layer.

use serde_json::{Map, Value};

use crate::casing::snake_to_pascal;

/// Fixed error code used for synthesized transport-failure responses.
pub const SERVER_ERROR_CODE: &str = "E-SERVER-ERROR";

/// Returns `true` for the values the wire contract treats as "not set":
/// `null`, `false`, numeric zero, and the empty string.
#[allow(clippy::float_cmp)]
pub fn json_is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Top-level error information from a response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorInfo {
    pub code: String,
    pub text: String,
}

/// Immutable per-request snapshot of a server response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    success: bool,
    data: Map<String, Value>,
    error: ApiErrorInfo,
    field_errors: Map<String, Value>,
}

impl ApiResponse {
    /// Normalize a raw JSON payload into a response.
    ///
    /// Unrecognized top-level keys are ignored; missing ones default to
    /// `success = false`, an empty data bag, and empty error info.
    pub fn from_payload(payload: &Value) -> Self {
        let success = payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let data = payload
            .get("data")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut error = ApiErrorInfo::default();
        if let Some(bag) = payload.get("error").and_then(Value::as_object) {
            for (key, value) in bag {
                let text = value.as_str().map_or_else(|| value.to_string(), str::to_owned);
                match snake_to_pascal(key).as_str() {
                    "Code" => error.code = text,
                    "Text" => error.text = text,
                    _ => {}
                }
            }
        }

        let mut field_errors = Map::new();
        if let Some(bag) = payload.get("field-errors").and_then(Value::as_object) {
            for (key, value) in bag {
                field_errors.insert(snake_to_pascal(key), value.clone());
            }
        }

        Self { success, data, error, field_errors }
    }

    /// The synthetic response produced when the transport itself fails.
    pub fn server_error() -> Self {
        Self {
            success: false,
            data: Map::new(),
            error: ApiErrorInfo {
                code: SERVER_ERROR_CODE.to_owned(),
                text: "Server error".to_owned(),
            },
            field_errors: Map::new(),
        }
    }

    /// `true` if the server flagged the request as successful.
    pub fn is_successful(&self) -> bool {
        self.success
    }

    /// `true` if the data bag contains an entry under `name`, even a
    /// falsy one.
    pub fn has_data(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    /// The data entry under `name`.
    ///
    /// Returns `None` both when the entry is missing and when it is
    /// present but falsy — callers cannot distinguish the two, which is
    /// part of the contract.
    pub fn get_data(&self, name: &str) -> Option<&Value> {
        self.data.get(name).filter(|v| !json_is_falsy(v))
    }

    /// Top-level error info (empty code/text on success).
    pub fn error(&self) -> &ApiErrorInfo {
        &self.error
    }

    /// Per-field validation errors, keyed by PascalCase field name.
    pub fn field_errors(&self) -> &Map<String, Value> {
        &self.field_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn successful_payload_with_data() {
        let r = ApiResponse::from_payload(&json!({
            "success": true,
            "data": { "user": { "id": 1 } }
        }));

        assert!(r.is_successful());
        assert!(r.has_data("user"));
        assert_eq!(r.get_data("user"), Some(&json!({ "id": 1 })));
        assert_eq!(r.get_data("missing"), None);
        assert_eq!(r.error(), &ApiErrorInfo::default());
    }

    #[test]
    fn defaults_for_empty_payload() {
        let r = ApiResponse::from_payload(&json!({}));
        assert!(!r.is_successful());
        assert!(!r.has_data("anything"));
        assert!(r.field_errors().is_empty());
    }

    #[test]
    fn falsy_data_collapses_to_none_but_counts_as_present() {
        let r = ApiResponse::from_payload(&json!({
            "success": true,
            "data": { "count": 0, "flag": false, "name": "", "gone": null }
        }));

        for key in ["count", "flag", "name", "gone"] {
            assert!(r.has_data(key), "{key} should be present");
            assert_eq!(r.get_data(key), None, "{key} should collapse");
        }
    }

    #[test]
    fn error_keys_are_pascal_cased() {
        let r = ApiResponse::from_payload(&json!({
            "success": false,
            "error": { "code": "E-VALIDATION", "text": "Invalid input" },
            "field-errors": { "first_name": "Required", "user_id": "Unknown" }
        }));

        assert_eq!(r.error().code, "E-VALIDATION");
        assert_eq!(r.error().text, "Invalid input");
        assert_eq!(r.field_errors().get("FirstName"), Some(&json!("Required")));
        assert_eq!(r.field_errors().get("UserId"), Some(&json!("Unknown")));
    }

    #[test]
    fn server_error_shape() {
        let r = ApiResponse::server_error();
        assert!(!r.is_successful());
        assert_eq!(r.error().code, SERVER_ERROR_CODE);
        assert_eq!(r.error().text, "Server error");
    }
}
