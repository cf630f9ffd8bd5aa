//! Entity metadata: mapping declarations, introspection, and the registry
//! cache that schema assembly reads from.

pub mod column;
pub mod info;
pub mod mapping;
pub mod registry;

pub use column::{ColumnDescriptor, EnumDef, SqlType, ValueKind};
pub use info::{ColumnInfo, CompositeInfo, ModelInfo, RelationshipInfo};
pub use mapping::{CompositeDef, EntityDef, RelationDirection, RelationshipDef};
pub use registry::MetaRegistry;
