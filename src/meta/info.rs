//! Normalized entity metadata.
//!
//! [`ModelInfo`] is the introspected, immutable view of one mapped class:
//! primary keys, plain columns, composites, and relationships, each keyed by
//! attribute name in declaration order. It is computed once per entity by the
//! registry and shared for the life of the process.

use indexmap::IndexMap;
use std::collections::HashSet;

use super::column::ColumnDescriptor;
use super::mapping::{EntityDef, RelationDirection};
use crate::error::SchemaError;

/// One mapped column together with its owning attribute name.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
	/// Attribute name on the entity.
	pub key: String,
	/// The underlying column.
	pub column: ColumnDescriptor,
}

impl ColumnInfo {
	pub(crate) fn new(key: impl Into<String>, column: ColumnDescriptor) -> Self {
		Self {
			key: key.into(),
			column,
		}
	}
}

/// Normalized view of a composite attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeInfo {
	/// Attribute name on the owning entity.
	pub name: String,
	/// Composite value-object class name.
	pub class: String,
	/// Constituent attribute name -> backing column, in constructor order.
	pub properties: IndexMap<String, ColumnInfo>,
}

/// Normalized view of a relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipInfo {
	/// Attribute name on the declaring entity.
	pub name: String,
	/// Target entity name.
	pub target: String,
	/// Association direction.
	pub direction: RelationDirection,
	/// Whether the attribute holds a collection.
	pub uselist: bool,
	/// Whether every backing foreign-key column is nullable.
	pub nullable: bool,
	/// Inverse relationship name on the target, when declared.
	pub backref: Option<String>,
}

/// The introspected description of one mapped class.
///
/// Invariant: an attribute name appears in exactly one of `primary_keys`,
/// `properties`, `composites`, `relationships`, and [`ModelInfo::field_names`]
/// is the union of the four, filtered of underscore-prefixed names.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
	/// Entity name.
	pub name: String,
	/// Primary-key columns, declaration order.
	pub primary_keys: IndexMap<String, ColumnInfo>,
	/// Plain non-key columns, declaration order.
	pub properties: IndexMap<String, ColumnInfo>,
	/// Composite attributes.
	pub composites: IndexMap<String, CompositeInfo>,
	/// Relationships.
	pub relationships: IndexMap<String, RelationshipInfo>,
	/// Computed attributes exposed as read-only derived fields.
	pub attributes: Vec<String>,
}

impl ModelInfo {
	/// Introspect a raw [`EntityDef`] into its normalized view.
	///
	/// Composite attribute names are derived by zipping the value object's
	/// constructor parameters with its mapped columns in declaration order;
	/// the parameter order matching the column order is a hard precondition
	/// of the mapping, only the arity is verified here.
	pub fn from_def(def: &EntityDef) -> Result<Self, SchemaError> {
		let mut composites = IndexMap::new();
		let mut claimed: HashSet<&str> = HashSet::new();

		for composite in &def.composites {
			if composite.constructor_params.len() != composite.columns.len() {
				return Err(SchemaError::CompositeArity {
					composite: composite.name.clone(),
					entity: def.name.clone(),
					params: composite.constructor_params.len(),
					columns: composite.columns.len(),
				});
			}

			let mut properties = IndexMap::new();
			for (param, column_name) in composite
				.constructor_params
				.iter()
				.zip(composite.columns.iter())
			{
				let column = def.find_column(column_name).cloned().ok_or_else(|| {
					SchemaError::UnknownField {
						field: column_name.clone(),
						entity: def.name.clone(),
					}
				})?;
				claimed.insert(column_name.as_str());
				properties.insert(param.clone(), ColumnInfo::new(column_name.clone(), column));
			}

			composites.insert(
				composite.name.clone(),
				CompositeInfo {
					name: composite.name.clone(),
					class: composite.class.clone(),
					properties,
				},
			);
		}

		let mut primary_keys = IndexMap::new();
		let mut properties = IndexMap::new();
		for (name, column, is_pk) in &def.columns {
			if *is_pk {
				primary_keys.insert(name.clone(), ColumnInfo::new(name.clone(), column.clone()));
			} else if !claimed.contains(name.as_str()) {
				properties.insert(name.clone(), ColumnInfo::new(name.clone(), column.clone()));
			}
		}

		let mut relationships = IndexMap::new();
		for rel in &def.relationships {
			// all() over an empty foreign-key list is true: a relationship
			// with no local FK columns is treated as nullable.
			let nullable = rel
				.foreign_keys
				.iter()
				.all(|fk| def.find_column(fk).map(|c| c.nullable).unwrap_or(true));

			relationships.insert(
				rel.name.clone(),
				RelationshipInfo {
					name: rel.name.clone(),
					target: rel.target.clone(),
					direction: rel.direction,
					uselist: rel.uselist,
					nullable,
					backref: rel.backref.clone(),
				},
			);
		}

		Ok(Self {
			name: def.name.clone(),
			primary_keys,
			properties,
			composites,
			relationships,
			attributes: def.attributes.clone(),
		})
	}

	/// Public field names: primary keys, plain properties, composites and
	/// relationships in declaration order, with underscore-prefixed
	/// (implementation) names filtered out.
	pub fn field_names(&self) -> Vec<String> {
		self.primary_keys
			.keys()
			.chain(self.properties.keys())
			.chain(self.composites.keys())
			.chain(self.relationships.keys())
			.filter(|name| !name.starts_with('_'))
			.cloned()
			.collect()
	}

	/// True when the entity declares `name` as a computed attribute.
	pub fn has_attribute(&self, name: &str) -> bool {
		self.attributes.iter().any(|a| a == name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::{CompositeDef, RelationshipDef, SqlType};

	fn vehicle_def() -> EntityDef {
		EntityDef::new("Vehicle")
			.primary_key(
				"id",
				ColumnDescriptor::new(SqlType::Integer).autoincrement(),
			)
			.column("name", ColumnDescriptor::new(SqlType::string()))
			.column(
				"_engine_cylinders",
				ColumnDescriptor::new(SqlType::BigInteger),
			)
			.column(
				"_engine_displacement",
				ColumnDescriptor::new(SqlType::Numeric {
					precision: Some(10),
					scale: Some(2),
				}),
			)
			.column("_owner_id", ColumnDescriptor::new(SqlType::Integer))
			.composite(CompositeDef::new(
				"engine",
				"Engine",
				["cylinders", "displacement"],
				["_engine_cylinders", "_engine_displacement"],
			))
			.relationship(
				RelationshipDef::to_one("owner", "Owner")
					.with_foreign_keys(["_owner_id"])
					.with_backref("vehicles"),
			)
			.attribute("lower_name")
	}

	#[test]
	fn test_field_names_exclude_underscored() {
		let info = ModelInfo::from_def(&vehicle_def()).unwrap();
		assert_eq!(info.field_names(), vec!["id", "name", "engine", "owner"]);
	}

	#[test]
	fn test_name_sets_are_disjoint() {
		let info = ModelInfo::from_def(&vehicle_def()).unwrap();
		let mut seen = HashSet::new();
		for name in info
			.primary_keys
			.keys()
			.chain(info.properties.keys())
			.chain(info.composites.keys())
			.chain(info.relationships.keys())
		{
			assert!(seen.insert(name.clone()), "duplicate field name {name}");
		}
	}

	#[test]
	fn test_composite_zip_by_constructor_order() {
		let info = ModelInfo::from_def(&vehicle_def()).unwrap();
		let engine = &info.composites["engine"];
		assert_eq!(engine.class, "Engine");
		let attrs: Vec<&str> = engine.properties.keys().map(|k| k.as_str()).collect();
		assert_eq!(attrs, vec!["cylinders", "displacement"]);
		assert_eq!(engine.properties["cylinders"].key, "_engine_cylinders");
	}

	#[test]
	fn test_composite_arity_mismatch_is_fatal() {
		let def = EntityDef::new("Broken")
			.primary_key("id", ColumnDescriptor::new(SqlType::Integer))
			.column("_a", ColumnDescriptor::new(SqlType::Integer))
			.composite(CompositeDef::new("c", "C", ["x", "y"], ["_a"]));
		assert!(matches!(
			ModelInfo::from_def(&def),
			Err(SchemaError::CompositeArity { .. })
		));
	}

	#[test]
	fn test_relationship_nullability_from_foreign_keys() {
		let info = ModelInfo::from_def(&vehicle_def()).unwrap();
		assert!(info.relationships["owner"].nullable);

		let def = EntityDef::new("Strict")
			.primary_key("id", ColumnDescriptor::new(SqlType::Integer))
			.column(
				"_ref_id",
				ColumnDescriptor::new(SqlType::Integer).not_null(),
			)
			.relationship(RelationshipDef::to_one("ref", "Other").with_foreign_keys(["_ref_id"]));
		let info = ModelInfo::from_def(&def).unwrap();
		assert!(!info.relationships["ref"].nullable);
	}
}
