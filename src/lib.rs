//! Grappelli: model schemas and nested persistence generated from entity
//! metadata.
//!
//! Given a mapped entity description, this crate introspects its columns,
//! composite attributes and relationships, and synthesizes a
//! validation/serialization schema without the user hand-declaring each
//! field: in the spirit of Django REST Framework's `ModelSerializer`, but
//! driven by an independent mapping layer's metadata.
//!
//! The pieces, leaf first:
//!
//! - [`meta`]: entity mapping declarations, introspection, and the
//!   [`meta::MetaRegistry`] cache.
//! - [`field_mapping`]: storage-type to field-kind resolution.
//! - [`fields`]: immutable field descriptors with per-kind validation.
//! - [`schema`]: the assembler turning metadata into an ordered field tree,
//!   plus whole-record validation and representation.
//! - [`save`]: the nested create/update reconciliation engine over an
//!   abstract unit of work.
//! - [`session`]: the unit-of-work collaborator surface and an in-memory
//!   implementation.
//! - [`expand`]: opt-in expansion of nested paths with eager-load hints.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use grappelli::meta::{ColumnDescriptor, EntityDef, MetaRegistry, SqlType};
//! use grappelli::schema::{SchemaBuilder, SchemaOpts};
//! use grappelli::session::MemorySession;
//!
//! let registry = Arc::new(MetaRegistry::new());
//! registry.register(
//!     EntityDef::new("Owner")
//!         .primary_key("id", ColumnDescriptor::new(SqlType::Integer).autoincrement())
//!         .column("name", ColumnDescriptor::new(SqlType::string())),
//! );
//!
//! let session = Arc::new(MemorySession::new(registry.clone()));
//! let schema = SchemaBuilder::new(registry, session)
//!     .build(&SchemaOpts::new("Owner").with_all_fields())
//!     .unwrap();
//!
//! let owner = schema.save(&json!({"name": "Joe"}), None).unwrap();
//! assert_eq!(owner.scalar("name"), Some(json!("Joe")));
//! ```

pub mod error;
pub mod expand;
pub mod field_mapping;
pub mod fields;
pub mod meta;
pub mod save;
pub mod schema;
pub mod session;

pub use error::{NON_FIELD_ERRORS, SchemaError, ValidationError};
pub use expand::{
	EXPAND_PARAM, EagerLoading, ExpandContext, ExpandQuerySchema, ExpandableField,
	ExpandableSchema, LOOKUP_SEP,
};
pub use field_mapping::field_type_for;
pub use fields::{Field, FieldKind, FieldKwargs};
pub use meta::{
	ColumnDescriptor, CompositeDef, EntityDef, EnumDef, MetaRegistry, ModelInfo, RelationshipDef,
	SqlType,
};
pub use schema::{
	CompositeSchema, FieldChoice, ModelSchema, SchemaBuilder, SchemaField, SchemaOpts,
};
pub use session::{
	AttrValue, CompositeValue, Instance, MemorySession, Session, StoreError, no_autoflush,
};
