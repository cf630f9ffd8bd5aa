//! Entity mapping declarations: the collaborator surface a persistence layer
//! (or the application itself) uses to describe its mapped classes.
//!
//! An [`EntityDef`] is the raw declaration; the normalized, introspected view
//! lives in [`super::info::ModelInfo`].

use super::column::ColumnDescriptor;

/// Direction of a relationship, seen from the declaring entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationDirection {
	/// Foreign key lives on the declaring entity; target is the "one" side.
	ManyToOne,
	/// Foreign key lives on the target; the declaring entity is the "one".
	OneToMany,
}

/// A composite attribute declaration: a value object spanning several
/// columns of the owning entity.
///
/// The constructor parameter order **must** match the mapped column
/// declaration order; attribute names are zipped positionally against the
/// columns and a mismatch is not detectable at introspection time.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeDef {
	/// Attribute name on the owning entity.
	pub name: String,
	/// Name of the composite value-object class.
	pub class: String,
	/// Constructor parameter names, excluding the receiver.
	pub constructor_params: Vec<String>,
	/// Mapped column names, in declaration order.
	pub columns: Vec<String>,
}

impl CompositeDef {
	/// Declare a composite attribute.
	pub fn new<P, C>(
		name: impl Into<String>,
		class: impl Into<String>,
		constructor_params: P,
		columns: C,
	) -> Self
	where
		P: IntoIterator,
		P::Item: Into<String>,
		C: IntoIterator,
		C::Item: Into<String>,
	{
		Self {
			name: name.into(),
			class: class.into(),
			constructor_params: constructor_params.into_iter().map(Into::into).collect(),
			columns: columns.into_iter().map(Into::into).collect(),
		}
	}
}

/// A relationship declaration between two entities.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDef {
	/// Attribute name on the declaring entity.
	pub name: String,
	/// Target entity name.
	pub target: String,
	/// Direction of the association.
	pub direction: RelationDirection,
	/// Whether the attribute holds a collection.
	pub uselist: bool,
	/// Names of the foreign-key columns backing this relationship, on the
	/// declaring entity. May be empty for the "one" side.
	pub foreign_keys: Vec<String>,
	/// Name of the inverse relationship on the target, when declared.
	pub backref: Option<String>,
}

impl RelationshipDef {
	/// A to-one relationship.
	pub fn to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			target: target.into(),
			direction: RelationDirection::ManyToOne,
			uselist: false,
			foreign_keys: vec![],
			backref: None,
		}
	}

	/// A to-many relationship.
	pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			target: target.into(),
			direction: RelationDirection::OneToMany,
			uselist: true,
			backref: None,
			foreign_keys: vec![],
		}
	}

	/// A one-to-one relationship on the "one" side (no collection).
	pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
		Self {
			uselist: false,
			..Self::to_many(name, target)
		}
	}

	/// Name the foreign-key columns backing this relationship.
	pub fn with_foreign_keys<I>(mut self, columns: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<String>,
	{
		self.foreign_keys = columns.into_iter().map(Into::into).collect();
		self
	}

	/// Declare the inverse relationship name on the target entity.
	pub fn with_backref(mut self, name: impl Into<String>) -> Self {
		self.backref = Some(name.into());
		self
	}
}

/// The raw mapped-class declaration consumed by the metadata registry.
///
/// Built fluently; column declaration order is preserved and becomes the
/// field order of generated schemas.
///
/// # Examples
///
/// ```
/// use grappelli::meta::{ColumnDescriptor, EntityDef, RelationshipDef, SqlType};
///
/// let def = EntityDef::new("Owner")
///     .primary_key("id", ColumnDescriptor::new(SqlType::Integer).autoincrement())
///     .column("name", ColumnDescriptor::new(SqlType::string()))
///     .relationship(RelationshipDef::to_many("vehicles", "Vehicle"));
/// assert_eq!(def.name, "Owner");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
	/// Entity (mapped class) name.
	pub name: String,
	/// Columns in declaration order: `(name, descriptor, is primary key)`.
	pub columns: Vec<(String, ColumnDescriptor, bool)>,
	/// Composite attribute declarations.
	pub composites: Vec<CompositeDef>,
	/// Relationship declarations.
	pub relationships: Vec<RelationshipDef>,
	/// Names of computed (read-only, non-column) attributes.
	pub attributes: Vec<String>,
}

impl EntityDef {
	/// Start declaring an entity.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			columns: vec![],
			composites: vec![],
			relationships: vec![],
			attributes: vec![],
		}
	}

	/// Declare a primary-key column.
	pub fn primary_key(mut self, name: impl Into<String>, column: ColumnDescriptor) -> Self {
		self.columns.push((name.into(), column, true));
		self
	}

	/// Declare a plain column.
	pub fn column(mut self, name: impl Into<String>, column: ColumnDescriptor) -> Self {
		self.columns.push((name.into(), column, false));
		self
	}

	/// Declare a composite attribute.
	pub fn composite(mut self, composite: CompositeDef) -> Self {
		self.composites.push(composite);
		self
	}

	/// Declare a relationship.
	pub fn relationship(mut self, relationship: RelationshipDef) -> Self {
		self.relationships.push(relationship);
		self
	}

	/// Declare a computed attribute exposed as a read-only derived field.
	pub fn attribute(mut self, name: impl Into<String>) -> Self {
		self.attributes.push(name.into());
		self
	}

	/// Find a column descriptor by name.
	pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
		self.columns
			.iter()
			.find(|(n, _, _)| n == name)
			.map(|(_, c, _)| c)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::SqlType;

	#[test]
	fn test_entity_def_preserves_declaration_order() {
		let def = EntityDef::new("Thing")
			.primary_key("id", ColumnDescriptor::new(SqlType::Integer))
			.column("b", ColumnDescriptor::new(SqlType::string()))
			.column("a", ColumnDescriptor::new(SqlType::string()));

		let names: Vec<&str> = def.columns.iter().map(|(n, _, _)| n.as_str()).collect();
		assert_eq!(names, vec!["id", "b", "a"]);
	}

	#[test]
	fn test_relationship_builders() {
		let rel = RelationshipDef::to_one("owner", "Owner")
			.with_foreign_keys(["_owner_id"])
			.with_backref("vehicles");
		assert_eq!(rel.direction, RelationDirection::ManyToOne);
		assert!(!rel.uselist);
		assert_eq!(rel.backref.as_deref(), Some("vehicles"));

		let rel = RelationshipDef::one_to_one("other", "VehicleOther");
		assert_eq!(rel.direction, RelationDirection::OneToMany);
		assert!(!rel.uselist);
	}
}
