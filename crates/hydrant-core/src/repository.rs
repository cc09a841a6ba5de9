// ── Ordered, filterable entity collections ──
//
// A repository accumulates flat key/value filters through fluent
// builders, then fetches and replaces its items wholesale. Filter keys
// carry a fixed operator-suffix vocabulary understood by the server
// (`-GT`, `-IN`, `-CONTAINS`, …); values are plain text, comma-joined
// for the set and range operators.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use hydrant_api::{ApiDriver, json_is_falsy};

use crate::model::Model;
use crate::schema::Factory;

/// Filter text for a JSON value: strings stay raw (unquoted), everything
/// else uses its JSON rendering.
fn filter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An ordered collection of models with filter-building and bulk fetch.
///
/// Items keep server response order. Filters are consumed by every
/// [`get`](Self::get) call.
#[derive(Clone)]
pub struct Repository {
    driver: Arc<dyn ApiDriver>,
    factory: Arc<dyn Factory>,
    endpoint: String,
    response_field: String,
    filters: IndexMap<String, String>,
    items: Vec<Model>,
    loading: bool,
}

impl Repository {
    /// A fetchable repository. `response_field` is the key under which
    /// the response data bag carries this collection.
    pub fn new(
        driver: Arc<dyn ApiDriver>,
        factory: Arc<dyn Factory>,
        endpoint: impl Into<String>,
        response_field: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            factory,
            endpoint: endpoint.into(),
            response_field: response_field.into(),
            filters: IndexMap::new(),
            items: Vec::new(),
            loading: false,
        }
    }

    /// A container-only repository used for nested collection fields:
    /// it hydrates through its factory but has no endpoint of its own.
    pub fn detached(driver: Arc<dyn ApiDriver>, factory: Arc<dyn Factory>) -> Self {
        Self::new(driver, factory, "", "")
    }

    // ── Filter builders ──────────────────────────────────────────────
    //
    // The equals/comparison family suppresses falsy values (`0`, `""`,
    // `false`, `null` all leave the filter unset); the null, range, set,
    // and string-match builders always set theirs.

    pub fn where_equals(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.comparison(field, "", value.into())
    }

    pub fn where_not_equals(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.comparison(field, "-NOTEQ", value.into())
    }

    pub fn where_greater_than(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.comparison(field, "-GT", value.into())
    }

    pub fn where_greater_than_or_equals(
        &mut self,
        field: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.comparison(field, "-GTE", value.into())
    }

    /// Emits `-LTE`, same as [`where_less_than_or_equals`](Self::where_less_than_or_equals):
    /// the server contract has no `-LT` operator, and the long-observed
    /// behavior is preserved rather than silently diverged from.
    pub fn where_less_than(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.comparison(field, "-LTE", value.into())
    }

    pub fn where_less_than_or_equals(
        &mut self,
        field: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.comparison(field, "-LTE", value.into())
    }

    pub fn where_is_null(&mut self, field: &str) -> &mut Self {
        self.filters.insert(format!("{field}-ISNULL"), "null".to_owned());
        self
    }

    pub fn where_is_not_null(&mut self, field: &str) -> &mut Self {
        self.filters.insert(format!("{field}-ISNOTNULL"), "null".to_owned());
        self
    }

    pub fn where_between<V: Into<Value>>(
        &mut self,
        field: &str,
        bounds: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.joined(field, "-BETWEEN", bounds)
    }

    pub fn where_not_between<V: Into<Value>>(
        &mut self,
        field: &str,
        bounds: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.joined(field, "-NOTBETWEEN", bounds)
    }

    pub fn where_in<V: Into<Value>>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.joined(field, "-IN", values)
    }

    pub fn where_not_in<V: Into<Value>>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.joined(field, "-NOTIN", values)
    }

    pub fn where_starts_with(&mut self, field: &str, value: &str) -> &mut Self {
        self.filters.insert(format!("{field}-STARTSWITH"), value.to_owned());
        self
    }

    pub fn where_ends_with(&mut self, field: &str, value: &str) -> &mut Self {
        self.filters.insert(format!("{field}-ENDSWITH"), value.to_owned());
        self
    }

    pub fn where_contains(&mut self, field: &str, value: &str) -> &mut Self {
        self.filters.insert(format!("{field}-CONTAINS"), value.to_owned());
        self
    }

    fn comparison(&mut self, field: &str, suffix: &str, value: Value) -> &mut Self {
        if !json_is_falsy(&value) {
            self.filters
                .insert(format!("{field}{suffix}"), filter_text(&value));
        }
        self
    }

    fn joined<V: Into<Value>>(
        &mut self,
        field: &str,
        suffix: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        let joined = values
            .into_iter()
            .map(|v| filter_text(&v.into()))
            .collect::<Vec<_>>()
            .join(",");
        self.filters.insert(format!("{field}{suffix}"), joined);
        self
    }

    /// The accumulated filters, in insertion order.
    pub fn filters(&self) -> &IndexMap<String, String> {
        &self.filters
    }

    pub fn reset_filters(&mut self) {
        self.filters.clear();
    }

    // ── Item management ──────────────────────────────────────────────

    pub fn items(&self) -> &[Model] {
        &self.items
    }

    pub fn add_item(&mut self, item: Model) -> &mut Self {
        self.items.push(item);
        self
    }

    /// Construct a model from raw data via the factory and append it.
    pub fn add_item_from_data(&mut self, data: &serde_json::Map<String, Value>) -> &mut Self {
        let item = self.factory.from_data(data);
        self.items.push(item);
        self
    }

    pub fn reset_items(&mut self) {
        self.items.clear();
    }

    /// Append `count` blank models built by the factory (pre-seeding,
    /// e.g. for placeholder rows).
    pub fn set_items_count(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            self.items.push(self.factory.make());
        }
        self
    }

    /// `true` while a fetch is in flight.
    pub fn loading(&self) -> bool {
        self.loading
    }

    // ── Fetch ────────────────────────────────────────────────────────

    /// Fetch the collection.
    ///
    /// Snapshots and clears the filters, issues a GET with them as query
    /// parameters, and replaces the items wholesale: on success the
    /// named data bag is walked in key order (element order for arrays),
    /// one model per entry via the factory; on failure or missing data
    /// the items are cleared and an empty vec is returned.
    pub async fn get(&mut self) -> Vec<Model> {
        let query: Vec<(String, String)> = self.filters.drain(..).collect();
        self.loading = true;
        debug!(endpoint = self.endpoint.as_str(), "fetching collection");

        let driver = Arc::clone(&self.driver);
        let response = driver.get(&self.endpoint, &query).await;

        self.items.clear();
        self.loading = false;

        if !response.is_successful() {
            return Vec::new();
        }
        let Some(data) = response.get_data(&self.response_field) else {
            return Vec::new();
        };

        let entries: Vec<&Value> = match data {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => map.values().collect(),
            _ => Vec::new(),
        };

        let mut result = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(bag) = entry.as_object() {
                let record = self.factory.from_data(bag);
                result.push(record.clone());
                self.items.push(record);
            }
        }
        result
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("endpoint", &self.endpoint)
            .field("response_field", &self.response_field)
            .field("filters", &self.filters)
            .field("items", &self.items.len())
            .field("loading", &self.loading)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::{Schema, SchemaFactory};
    use hydrant_api::ApiResponse;
    use pretty_assertions::assert_eq;
    use serde_json::Map;

    struct NullDriver;

    #[async_trait::async_trait]
    impl ApiDriver for NullDriver {
        async fn get(&self, _: &str, _: &[(String, String)]) -> ApiResponse {
            ApiResponse::server_error()
        }
        async fn post(&self, _: &str, _: &Map<String, Value>) -> ApiResponse {
            ApiResponse::server_error()
        }
        async fn patch(&self, _: &str, _: &Map<String, Value>) -> ApiResponse {
            ApiResponse::server_error()
        }
        async fn delete(&self, _: &str, _: &Map<String, Value>) -> ApiResponse {
            ApiResponse::server_error()
        }
        async fn upload(
            &self,
            _: &str,
            _: hydrant_api::UploadFile,
            _: &[(String, String)],
        ) -> ApiResponse {
            ApiResponse::server_error()
        }
    }

    fn repo() -> Repository {
        let driver: Arc<dyn ApiDriver> = Arc::new(NullDriver);
        let schema = Schema::builder("user").scalar("Id").build();
        let factory = SchemaFactory::new(schema, Arc::clone(&driver));
        Repository::new(driver, factory, "users", "users")
    }

    fn filter(repo: &Repository, key: &str) -> Option<String> {
        repo.filters().get(key).cloned()
    }

    #[test]
    fn operator_suffix_vocabulary() {
        let mut r = repo();
        r.where_equals("status", "active")
            .where_not_equals("role", "admin")
            .where_greater_than("age", 18)
            .where_greater_than_or_equals("score", 10)
            .where_is_null("deleted_at")
            .where_is_not_null("verified_at")
            .where_between("created", ["01/01/2021", "12/31/2021"])
            .where_in("id", [1, 2, 3])
            .where_not_in("group", ["a", "b"])
            .where_starts_with("name", "Ad")
            .where_ends_with("email", ".com")
            .where_contains("bio", "rust");

        assert_eq!(filter(&r, "status").as_deref(), Some("active"));
        assert_eq!(filter(&r, "role-NOTEQ").as_deref(), Some("admin"));
        assert_eq!(filter(&r, "age-GT").as_deref(), Some("18"));
        assert_eq!(filter(&r, "score-GTE").as_deref(), Some("10"));
        assert_eq!(filter(&r, "deleted_at-ISNULL").as_deref(), Some("null"));
        assert_eq!(filter(&r, "verified_at-ISNOTNULL").as_deref(), Some("null"));
        assert_eq!(
            filter(&r, "created-BETWEEN").as_deref(),
            Some("01/01/2021,12/31/2021")
        );
        assert_eq!(filter(&r, "id-IN").as_deref(), Some("1,2,3"));
        assert_eq!(filter(&r, "group-NOTIN").as_deref(), Some("a,b"));
        assert_eq!(filter(&r, "name-STARTSWITH").as_deref(), Some("Ad"));
        assert_eq!(filter(&r, "email-ENDSWITH").as_deref(), Some(".com"));
        assert_eq!(filter(&r, "bio-CONTAINS").as_deref(), Some("rust"));
    }

    #[test]
    fn both_less_than_builders_emit_lte() {
        let mut r = repo();
        r.where_less_than("a", 5);
        r.where_less_than_or_equals("b", 9);

        assert_eq!(filter(&r, "a-LTE").as_deref(), Some("5"));
        assert_eq!(filter(&r, "b-LTE").as_deref(), Some("9"));
        assert!(filter(&r, "a-LT").is_none());
    }

    #[test]
    fn falsy_values_suppress_the_equals_family() {
        let mut r = repo();
        r.where_equals("count", 0)
            .where_equals("name", "")
            .where_equals("flag", false)
            .where_not_equals("other", 0)
            .where_greater_than("age", 0);

        assert!(r.filters().is_empty());
    }

    #[test]
    fn reset_filters_clears_everything() {
        let mut r = repo();
        r.where_equals("status", "active");
        assert_eq!(r.filters().len(), 1);

        r.reset_filters();
        assert!(r.filters().is_empty());
    }

    #[test]
    fn pre_seeding_builds_blank_models() {
        let mut r = repo();
        r.set_items_count(3);
        assert_eq!(r.items().len(), 3);
        assert!(r.items().iter().all(Model::is_new));
    }
}
