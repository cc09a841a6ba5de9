// hydrant-core: Schema-driven data-mapping layer on top of hydrant-api.
//
// A `Schema` describes an entity type once (fields, date columns, relation
// factories, endpoints); `Model` instances hydrate from response bags,
// track dirty fields, and persist their diffs; `Repository` fetches
// ordered, filterable collections. All I/O goes through the injected
// `ApiDriver` capability.

pub mod model;
pub mod repository;
pub mod schema;
pub mod value;

// ── Primary re-exports ──────────────────────────────────────────────
pub use model::Model;
pub use repository::Repository;
pub use schema::{Factory, FieldKind, Schema, SchemaBuilder, SchemaFactory};
pub use value::FieldValue;

// Transport surface, re-exported for consumers that wire their own driver.
pub use hydrant_api::{Api, ApiDriver, ApiResponse, Error, TransportConfig};
