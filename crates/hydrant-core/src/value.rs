// ── Tagged field values ──
//
// A model field holds exactly one of: nothing yet (`Absent`), a raw JSON
// scalar, a parsed date, a nested entity, or a nested collection.
// `Absent` is a distinct sentinel — it is never conflated with zero,
// the empty string, or `false`.

use chrono::NaiveDate;
use serde_json::Value;

use hydrant_api::json_is_falsy;

use crate::model::Model;
use crate::repository::Repository;

/// The fixed wire format for date columns ("US date string").
pub const US_DATE_FORMAT: &str = "%m/%d/%Y";

/// Value of a single model field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// Never set. Distinct from every scalar, including falsy ones.
    Absent,
    /// Raw JSON scalar (string, number, bool, array, object).
    Scalar(Value),
    /// Parsed date column.
    Date(NaiveDate),
    /// Nested entity, produced by a relation factory.
    Entity(Model),
    /// Nested collection, repopulated wholesale on hydration.
    Collection(Repository),
}

impl FieldValue {
    /// The falsy rule used by filter suppression: `Absent`, JSON `null`,
    /// `false`, numeric zero, and the empty string.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Scalar(v) => json_is_falsy(v),
            Self::Date(_) | Self::Entity(_) | Self::Collection(_) => false,
        }
    }

    /// Serialize for a request body. Dates become date-only strings;
    /// nested values (which never appear in a diff) become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Absent | Self::Entity(_) | Self::Collection(_) => Value::Null,
            Self::Scalar(v) => v.clone(),
            Self::Date(d) => Value::String(d.format(US_DATE_FORMAT).to_string()),
        }
    }

    /// Text used when substituting a `{FieldName}` endpoint placeholder.
    pub fn substitution_text(&self) -> String {
        match self {
            Self::Absent | Self::Entity(_) | Self::Collection(_) => String::new(),
            Self::Scalar(Value::String(s)) => s.clone(),
            Self::Scalar(v) => v.to_string(),
            Self::Date(d) => d.format(US_DATE_FORMAT).to_string(),
        }
    }
}

/// Shallow equality for dirty-tracking. Scalars and dates compare by
/// value; collection fields are never reassigned and always compare
/// equal (no deep comparison); entity fields are excluded from
/// enumeration and conservatively compare unequal.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) => true,
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Collection(_), Self::Collection(_)) => true,
            _ => false,
        }
    }
}
