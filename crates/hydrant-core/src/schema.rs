// ── Entity type descriptors ──
//
// A `Schema` is built once per entity type and shared as `Arc<Schema>`
// by every model instance of that type. It replaces implicit property
// enumeration with an explicit, ordered field walk, and per-instance
// factory registration with a static relation-factory map resolved at
// type-registration time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use hydrant_api::ApiDriver;

use crate::model::Model;

/// Declared kind of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain value assigned verbatim from the wire.
    Scalar,
    /// Date column: parsed from / serialized to the fixed US date string.
    Date,
    /// Opaque upload handle; sent via the driver's `upload` operation.
    File,
    /// Nested entity, hydrated through a registered relation factory.
    Entity,
    /// Nested collection, repopulated wholesale from array input.
    Collection,
}

/// Capability that constructs models of one entity type.
///
/// Used for relation hydration: a field is "relational" iff a factory is
/// registered for it in the schema.
pub trait Factory: Send + Sync {
    /// A blank, unsaved model.
    fn make(&self) -> Model;

    /// A model hydrated from a raw data bag, with its original values
    /// snapshotted so it starts clean.
    fn from_data(&self, data: &Map<String, Value>) -> Model {
        let mut model = self.make();
        model.load(data);
        model.load_original_values();
        model
    }
}

/// Static descriptor for one entity type.
pub struct Schema {
    name: String,
    key_field: String,
    create_endpoint: String,
    edit_endpoint: String,
    fields: IndexMap<String, FieldKind>,
    factories: HashMap<String, Arc<dyn Factory>>,
}

impl Schema {
    /// Start building a schema. `name` is the entity's logical resource
    /// name — the key under which responses carry its data.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            key_field: "Id".to_owned(),
            create_endpoint: String::new(),
            edit_endpoint: String::new(),
            fields: IndexMap::new(),
            factories: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn create_endpoint(&self) -> &str {
        &self.create_endpoint
    }

    pub fn edit_endpoint(&self) -> &str {
        &self.edit_endpoint
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// The declared kind of `field`, if declared.
    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.fields.get(field).copied()
    }

    /// `true` if `field` is a declared date column.
    pub fn is_date(&self, field: &str) -> bool {
        self.field_kind(field) == Some(FieldKind::Date)
    }

    /// `true` if a relation factory is registered for `field`.
    pub fn has_factory(&self, field: &str) -> bool {
        self.factories.contains_key(field)
    }

    /// The relation factory registered for `field`.
    pub fn factory(&self, field: &str) -> Option<&Arc<dyn Factory>> {
        self.factories.get(field)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("key_field", &self.key_field)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Schema`].
pub struct SchemaBuilder {
    name: String,
    key_field: String,
    create_endpoint: String,
    edit_endpoint: String,
    fields: IndexMap<String, FieldKind>,
    factories: HashMap<String, Arc<dyn Factory>>,
}

impl SchemaBuilder {
    /// The primary-key field (defaults to `"Id"`).
    pub fn key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    /// Endpoint template used when the model is new. Supports
    /// `{FieldName}` placeholders substituted from current field values.
    pub fn create_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.create_endpoint = endpoint.into();
        self
    }

    /// Endpoint template used for edits and refreshes. Supports
    /// `{FieldName}` placeholders.
    pub fn edit_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.edit_endpoint = endpoint.into();
        self
    }

    /// Declare a field of the given kind.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Scalar)
    }

    pub fn date(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Date)
    }

    pub fn file(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::File)
    }

    /// Declare a nested-entity field. Hydration requires a factory
    /// registered under the same name; without one, incoming objects are
    /// warned about and skipped.
    pub fn entity(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Entity)
    }

    /// Declare a nested-collection field.
    pub fn collection(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Collection)
    }

    /// Register the relation factory for an entity or collection field.
    pub fn factory(mut self, name: impl Into<String>, factory: Arc<dyn Factory>) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(Schema {
            name: self.name,
            key_field: self.key_field,
            create_endpoint: self.create_endpoint,
            edit_endpoint: self.edit_endpoint,
            fields: self.fields,
            factories: self.factories,
        })
    }
}

/// [`Factory`] that builds models from a schema + driver pair — the
/// common case; custom factories are only needed for polymorphic
/// hydration.
pub struct SchemaFactory {
    schema: Arc<Schema>,
    driver: Arc<dyn ApiDriver>,
}

impl SchemaFactory {
    pub fn new(schema: Arc<Schema>, driver: Arc<dyn ApiDriver>) -> Arc<Self> {
        Arc::new(Self { schema, driver })
    }
}

impl Factory for SchemaFactory {
    fn make(&self) -> Model {
        Model::new(Arc::clone(&self.schema), Arc::clone(&self.driver))
    }
}
