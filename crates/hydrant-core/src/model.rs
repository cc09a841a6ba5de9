// ── Single-entity hydration, dirty-tracking, and persistence ──
//
// A model is an ordered field bag driven by its `Schema`: hydration
// dispatches on the declared field kind (scalar, date, entity,
// collection), dirty-tracking diffs live values against the snapshot
// taken at the last load/save, and persistence submits exactly that diff.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::warn;

use hydrant_api::casing::{pascal_to_snake, snake_to_pascal};
use hydrant_api::{ApiDriver, ApiResponse};

use crate::repository::Repository;
use crate::schema::{FieldKind, Schema};
use crate::value::{FieldValue, US_DATE_FORMAT};

/// A single persisted entity with schema-driven field access.
///
/// Lifecycle: constructed blank → hydrated via [`load`](Self::load) →
/// originals snapshotted → mutated → [`save`](Self::save) → on success
/// re-hydrated from the response and re-snapshotted.
#[derive(Clone)]
pub struct Model {
    schema: Arc<Schema>,
    driver: Arc<dyn ApiDriver>,
    fields: IndexMap<String, FieldValue>,
    originals: IndexMap<String, FieldValue>,
    errors: IndexMap<String, String>,
}

impl Model {
    /// A blank model of the given type.
    ///
    /// Declared fields are initialized in schema order: collection
    /// fields with a registered factory get an empty nested repository,
    /// everything else starts [`FieldValue::Absent`].
    pub fn new(schema: Arc<Schema>, driver: Arc<dyn ApiDriver>) -> Self {
        let mut fields = IndexMap::new();
        for (name, kind) in schema.fields() {
            let value = match kind {
                FieldKind::Collection => match schema.factory(name) {
                    Some(factory) => FieldValue::Collection(Repository::detached(
                        Arc::clone(&driver),
                        Arc::clone(factory),
                    )),
                    None => FieldValue::Absent,
                },
                _ => FieldValue::Absent,
            };
            fields.insert(name.to_owned(), value);
        }

        Self {
            schema,
            driver,
            fields,
            originals: IndexMap::new(),
            errors: IndexMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The entity's logical resource name (the response data key).
    pub fn model_name(&self) -> &str {
        self.schema.name()
    }

    // ── Hydration ────────────────────────────────────────────────────

    /// Hydrate from a raw data bag.
    ///
    /// Input keys arrive in snake_case and are converted to the
    /// PascalCase field naming (`user_id` → `UserId`). Explicit `null`
    /// values are skipped silently — a known limitation: nulls cannot
    /// clear a field. Dispatch follows the declared field kind:
    ///
    /// - collection fields require array input (warned and skipped
    ///   otherwise) and are reset then repopulated via their factory;
    /// - entity fields require a registered relation factory (warned and
    ///   skipped otherwise) and are replaced wholesale;
    /// - date columns are parsed from the fixed US date string;
    /// - everything else — including keys not declared in the schema —
    ///   is assigned verbatim as a scalar.
    ///
    /// Every direct assignment clears that field's validation error.
    pub fn load(&mut self, data: &Map<String, Value>) {
        for (raw_key, passed) in data {
            let key = snake_to_pascal(raw_key);
            if passed.is_null() {
                continue;
            }

            match self.schema.field_kind(&key) {
                Some(FieldKind::Collection) => self.load_collection(&key, passed),
                Some(FieldKind::Entity) => self.load_entity(&key, passed),
                Some(FieldKind::Date) => self.load_date(&key, passed),
                _ => self.assign(key, FieldValue::Scalar(passed.clone())),
            }
        }
    }

    fn load_collection(&mut self, key: &str, passed: &Value) {
        let Some(items) = passed.as_array() else {
            warn!(
                model = self.schema.name(),
                field = key,
                "collection field did not receive an array, skipping"
            );
            return;
        };
        let Some(FieldValue::Collection(repo)) = self.fields.get_mut(key) else {
            warn!(
                model = self.schema.name(),
                field = key,
                "collection field has no registered factory, skipping"
            );
            return;
        };

        repo.reset_items();
        for item in items {
            if let Some(bag) = item.as_object() {
                repo.add_item_from_data(bag);
            } else {
                warn!(field = key, "collection entry is not an object, skipping");
            }
        }
    }

    fn load_entity(&mut self, key: &str, passed: &Value) {
        let Some(factory) = self.schema.factory(key).cloned() else {
            warn!(
                model = self.schema.name(),
                field = key,
                "relation field received an object but has no factory, skipping"
            );
            return;
        };
        let Some(bag) = passed.as_object() else {
            warn!(
                model = self.schema.name(),
                field = key,
                "relation field did not receive an object, skipping"
            );
            return;
        };
        self.assign(key.to_owned(), FieldValue::Entity(factory.from_data(bag)));
    }

    fn load_date(&mut self, key: &str, passed: &Value) {
        let parsed = passed
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, US_DATE_FORMAT).ok());
        if let Some(date) = parsed {
            self.assign(key.to_owned(), FieldValue::Date(date));
        } else {
            warn!(
                model = self.schema.name(),
                field = key,
                "date column input is not a parseable US date string, skipping"
            );
        }
    }

    /// Assign a field directly, clearing its validation error.
    fn assign(&mut self, key: String, value: FieldValue) {
        self.errors.shift_remove(&key);
        self.fields.insert(key, value);
    }

    // ── Dirty-tracking ───────────────────────────────────────────────

    /// Field names subject to dirty-tracking and submission.
    ///
    /// Excludes entity-valued fields and names carrying the reserved `$`
    /// marker — except declared date columns, which are always included
    /// even when `$`-prefixed. The asymmetry is contractual.
    pub fn own_property_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(name, value)| {
                self.schema.is_date(name)
                    || (!name.starts_with('$') && !matches!(value, FieldValue::Entity(_)))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Snapshot current values as the originals used for diffing.
    ///
    /// After this call the snapshot and the live own-property set share
    /// the same keys.
    pub fn load_original_values(&mut self) {
        self.originals = self
            .own_property_names()
            .into_iter()
            .filter_map(|name| {
                let value = self.fields.get(&name)?.clone();
                Some((name, value))
            })
            .collect();
    }

    /// Shallow comparison of the current value against the snapshot.
    pub fn has_property_changed(&self, prop: &str) -> bool {
        let current = self.fields.get(prop).unwrap_or(&FieldValue::Absent);
        let original = self.originals.get(prop).unwrap_or(&FieldValue::Absent);
        current != original
    }

    /// The dirty fields, keyed by snake_case name and serialized for
    /// direct submission as a request body. Date columns become
    /// date-only strings.
    pub fn changed_attributes(&self) -> Map<String, Value> {
        let mut result = Map::new();
        for name in self.own_property_names() {
            if !self.has_property_changed(&name) {
                continue;
            }
            if let Some(value) = self.fields.get(&name) {
                if matches!(value, FieldValue::Absent) {
                    continue;
                }
                result.insert(pascal_to_snake(&name), value.to_json());
            }
        }
        result
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// `true` while the instance has not been persisted: the key field
    /// is absent, null, or a number ≤ 0.
    pub fn is_new(&self) -> bool {
        match self.fields.get(self.schema.key_field()) {
            None | Some(FieldValue::Absent) => true,
            Some(FieldValue::Scalar(v)) => {
                v.is_null() || v.as_f64().is_some_and(|n| n <= 0.0)
            }
            Some(_) => false,
        }
    }

    // ── Relation factories ───────────────────────────────────────────

    /// `true` if a relation factory is registered for `field`.
    pub fn has_factory(&self, field: &str) -> bool {
        self.schema.has_factory(field)
    }

    /// Invoke the relation factory for `field`.
    ///
    /// Returns `None` when no factory is registered — invoking without
    /// checking [`has_factory`](Self::has_factory) is a caller error.
    pub fn invoke_factory(&self, field: &str, data: &Map<String, Value>) -> Option<Model> {
        self.schema.factory(field).map(|f| f.from_data(data))
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Persist the dirty fields.
    ///
    /// New models POST to the create endpoint; existing ones PATCH the
    /// edit endpoint. Both templates support `{FieldName}` placeholder
    /// substitution from current field values. `extra` entries are
    /// merged into the body and win on key collision. On success the
    /// model re-hydrates from the response data under its model name and
    /// re-snapshots its originals. The response is returned regardless —
    /// callers inspect `is_successful()` and `field_errors()` themselves.
    pub async fn save(&mut self, extra: &Map<String, Value>) -> ApiResponse {
        let is_new = self.is_new();
        let template = if is_new {
            self.schema.create_endpoint()
        } else {
            self.schema.edit_endpoint()
        };
        let url = self.resolve_endpoint(template);

        let mut body = self.changed_attributes();
        for (key, value) in extra {
            body.insert(key.clone(), value.clone());
        }

        let driver = Arc::clone(&self.driver);
        let response = if is_new {
            driver.post(&url, &body).await
        } else {
            driver.patch(&url, &body).await
        };

        self.absorb(&response);
        response
    }

    /// Refresh from the server: GET against the substituted edit
    /// endpoint, then re-hydrate and re-snapshot on success.
    pub async fn get_info(&mut self) -> ApiResponse {
        let url = self.resolve_endpoint(self.schema.edit_endpoint());
        let driver = Arc::clone(&self.driver);
        let response = driver.get(&url, &[]).await;
        self.absorb(&response);
        response
    }

    /// Substitute `{FieldName}` placeholders from current field values.
    fn resolve_endpoint(&self, template: &str) -> String {
        let mut url = template.to_owned();
        for (name, value) in &self.fields {
            let placeholder = format!("{{{name}}}");
            if url.contains(&placeholder) {
                url = url.replace(&placeholder, &value.substitution_text());
            }
        }
        url
    }

    fn absorb(&mut self, response: &ApiResponse) {
        if !response.is_successful() {
            return;
        }
        if let Some(bag) = response
            .get_data(self.schema.name())
            .and_then(Value::as_object)
        {
            self.load(bag);
            self.load_original_values();
        }
    }

    // ── Field access ─────────────────────────────────────────────────

    /// Current value of `field`.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Set a scalar field, clearing its validation error.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.assign(field.into(), FieldValue::Scalar(value.into()));
        self
    }

    /// Set a date column, clearing its validation error.
    pub fn set_date(&mut self, field: impl Into<String>, date: NaiveDate) -> &mut Self {
        self.assign(field.into(), FieldValue::Date(date));
        self
    }

    // ── Validation errors ────────────────────────────────────────────

    /// Per-field validation errors.
    pub fn errors(&self) -> &IndexMap<String, String> {
        &self.errors
    }

    /// The validation error for one field, if any.
    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    /// Replace the validation errors wholesale, e.g. from a response's
    /// field errors after a failed save.
    pub fn set_errors(&mut self, errors: &Map<String, Value>) -> &mut Self {
        self.errors = errors
            .iter()
            .map(|(field, message)| {
                let text = message
                    .as_str()
                    .map_or_else(|| message.to_string(), str::to_owned);
                (field.clone(), text)
            })
            .collect();
        self
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.schema.name())
            .field("fields", &self.fields)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::SchemaFactory;
    use pretty_assertions::assert_eq;
    use serde_json::json;

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

    fn driver() -> Arc<dyn ApiDriver> {
        Arc::new(NullDriver)
    }

    fn bag(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn user_schema() -> Arc<Schema> {
        Schema::builder("user")
            .create_endpoint("users")
            .edit_endpoint("users/{Id}")
            .scalar("Id")
            .scalar("FirstName")
            .scalar("Status")
            .date("CreatedAt")
            .build()
    }

    fn user_with_relations() -> Arc<Schema> {
        let address = Schema::builder("address")
            .scalar("Id")
            .scalar("City")
            .build();
        let order = Schema::builder("order")
            .scalar("Id")
            .scalar("Total")
            .build();
        Schema::builder("user")
            .create_endpoint("users")
            .edit_endpoint("users/{Id}")
            .scalar("Id")
            .entity("Address")
            .entity("Manager") // no factory on purpose
            .collection("Orders")
            .factory("Address", SchemaFactory::new(address, driver()))
            .factory("Orders", SchemaFactory::new(order, driver()))
            .build()
    }

    #[test]
    fn load_converts_snake_keys_and_skips_nulls() {
        let mut user = Model::new(user_schema(), driver());
        user.load(&bag(json!({
            "id": 3,
            "first_name": "Ada",
            "status": null
        })));

        assert_eq!(user.get("Id"), Some(&FieldValue::Scalar(json!(3))));
        assert_eq!(user.get("FirstName"), Some(&FieldValue::Scalar(json!("Ada"))));
        // Explicit null cannot clear (or set) a field.
        assert_eq!(user.get("Status"), Some(&FieldValue::Absent));
    }

    #[test]
    fn load_parses_date_columns_and_skips_garbage() {
        let mut user = Model::new(user_schema(), driver());
        user.load(&bag(json!({ "created_at": "03/05/2021" })));
        assert_eq!(
            user.get("CreatedAt"),
            Some(&FieldValue::Date(
                NaiveDate::from_ymd_opt(2021, 3, 5).unwrap()
            ))
        );

        user.load(&bag(json!({ "created_at": "not a date" })));
        // Unparseable input leaves the previous value in place.
        assert_eq!(
            user.get("CreatedAt"),
            Some(&FieldValue::Date(
                NaiveDate::from_ymd_opt(2021, 3, 5).unwrap()
            ))
        );
    }

    #[test]
    fn undeclared_keys_become_scalar_fields() {
        let mut user = Model::new(user_schema(), driver());
        user.load(&bag(json!({ "nick_name": "ada" })));
        assert_eq!(user.get("NickName"), Some(&FieldValue::Scalar(json!("ada"))));
    }

    #[test]
    fn entity_field_without_factory_warns_and_is_left_unchanged() {
        let mut user = Model::new(user_with_relations(), driver());
        user.load(&bag(json!({ "manager": { "id": 9 } })));
        assert_eq!(user.get("Manager"), Some(&FieldValue::Absent));
    }

    #[test]
    fn entity_field_with_factory_is_replaced() {
        let mut user = Model::new(user_with_relations(), driver());
        user.load(&bag(json!({ "address": { "id": 4, "city": "Turin" } })));

        let Some(FieldValue::Entity(address)) = user.get("Address") else {
            panic!("Address should hold a nested entity");
        };
        assert_eq!(address.get("City"), Some(&FieldValue::Scalar(json!("Turin"))));
        // A factory-built relation starts clean.
        assert!(!address.has_property_changed("City"));
    }

    #[test]
    fn collection_field_resets_and_repopulates() {
        let mut user = Model::new(user_with_relations(), driver());
        user.load(&bag(json!({ "orders": [ { "id": 1 }, { "id": 2 } ] })));

        let Some(FieldValue::Collection(orders)) = user.get("Orders") else {
            panic!("Orders should hold a collection");
        };
        assert_eq!(orders.items().len(), 2);

        // A later load replaces the contents wholesale.
        user.load(&bag(json!({ "orders": [ { "id": 7 } ] })));
        let Some(FieldValue::Collection(orders)) = user.get("Orders") else {
            panic!("Orders should hold a collection");
        };
        assert_eq!(orders.items().len(), 1);
    }

    #[test]
    fn collection_field_rejects_non_array_input() {
        let mut user = Model::new(user_with_relations(), driver());
        user.load(&bag(json!({ "orders": [ { "id": 1 } ] })));
        user.load(&bag(json!({ "orders": { "id": 2 } })));

        let Some(FieldValue::Collection(orders)) = user.get("Orders") else {
            panic!("Orders should hold a collection");
        };
        assert_eq!(orders.items().len(), 1, "non-array input must be skipped");
    }

    #[test]
    fn own_property_names_exclude_entities_include_dates() {
        let mut user = Model::new(user_with_relations(), driver());
        user.load(&bag(json!({ "address": { "id": 4 } })));

        let names = user.own_property_names();
        assert!(names.contains(&"Id".to_owned()));
        assert!(names.contains(&"Orders".to_owned()));
        assert!(!names.contains(&"Address".to_owned()));
    }

    #[test]
    fn dirty_tracking_diffs_against_snapshot() {
        let mut user = Model::new(user_schema(), driver());
        user.load(&bag(json!({ "id": 3, "first_name": "Ada" })));
        user.load_original_values();

        assert!(!user.has_property_changed("FirstName"));
        user.set("FirstName", "Grace");
        assert!(user.has_property_changed("FirstName"));

        let changed = user.changed_attributes();
        assert_eq!(changed, bag(json!({ "first_name": "Grace" })));
    }

    #[test]
    fn setting_a_field_to_zero_is_a_change_from_absent() {
        // Absent and falsy are distinct: 0 over no-value is a real diff.
        let mut user = Model::new(user_schema(), driver());
        user.load_original_values();
        user.set("Status", 0);
        assert!(user.has_property_changed("Status"));
        assert_eq!(user.changed_attributes(), bag(json!({ "status": 0 })));
    }

    #[test]
    fn changed_dates_serialize_as_us_date_strings() {
        let mut user = Model::new(user_schema(), driver());
        user.load_original_values();
        user.set_date("CreatedAt", NaiveDate::from_ymd_opt(2021, 3, 5).unwrap());

        assert_eq!(
            user.changed_attributes(),
            bag(json!({ "created_at": "03/05/2021" }))
        );
    }

    #[test]
    fn is_new_follows_the_key_field() {
        let mut user = Model::new(user_schema(), driver());
        assert!(user.is_new(), "absent key means new");

        user.set("Id", 0);
        assert!(user.is_new(), "zero key means new");

        user.set("Id", -1);
        assert!(user.is_new(), "negative key means new");

        user.set("Id", 42);
        assert!(!user.is_new());

        user.set("Id", "ext-7");
        assert!(!user.is_new(), "string keys count as persisted");
    }

    #[test]
    fn assignment_clears_the_field_error() {
        let mut user = Model::new(user_schema(), driver());
        user.set_errors(&bag(json!({ "FirstName": "Required" })));
        assert_eq!(user.error("FirstName"), Some("Required"));

        user.set("FirstName", "Ada");
        assert_eq!(user.error("FirstName"), None);
    }

    #[test]
    fn invoke_factory_requires_registration() {
        let user = Model::new(user_with_relations(), driver());
        assert!(user.has_factory("Address"));
        assert!(!user.has_factory("Manager"));

        assert!(user.invoke_factory("Address", &bag(json!({ "id": 1 }))).is_some());
        assert!(user.invoke_factory("Manager", &bag(json!({ "id": 1 }))).is_none());
    }
}
