//! Storage-type to field-kind resolution.
//!
//! Resolution order matters: enum and array columns are handled before the
//! generic storage table, otherwise their underlying storage type would match
//! a generic fallback incorrectly. Anything unresolvable is a fatal
//! configuration error naming the entity and attribute, never a per-request
//! failure.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::SchemaError;
use crate::fields::FieldKind;
use crate::meta::{ColumnDescriptor, SqlType, ValueKind};

/// Fallback table keyed by a column's native value kind.
static VALUE_KIND_TABLE: Lazy<HashMap<ValueKind, FieldKind>> = Lazy::new(|| {
	HashMap::from([
		(ValueKind::Bool, FieldKind::Boolean),
		(ValueKind::Int, FieldKind::Integer),
		(ValueKind::Float, FieldKind::Float),
		(ValueKind::Decimal, FieldKind::Decimal),
		(ValueKind::Str, FieldKind::Char),
		(ValueKind::Date, FieldKind::Date),
		(ValueKind::Time, FieldKind::Time),
		(ValueKind::DateTime, FieldKind::DateTime),
		(ValueKind::Duration, FieldKind::Duration),
		(ValueKind::Uuid, FieldKind::Uuid),
	])
});

/// Exact storage-type table. Boolean is deliberately absent: boolean columns
/// resolve through the value-kind step so nullability can pick the tri-state
/// variant.
fn storage_field_type(sql_type: &SqlType) -> Option<FieldKind> {
	match sql_type {
		SqlType::KeyValue => Some(FieldKind::Dict),
		SqlType::SmallInteger | SqlType::Integer | SqlType::BigInteger => Some(FieldKind::Integer),
		SqlType::Numeric { .. } => Some(FieldKind::Decimal),
		SqlType::Float => Some(FieldKind::Float),
		SqlType::String { .. } | SqlType::Text => Some(FieldKind::Char),
		SqlType::Date => Some(FieldKind::Date),
		SqlType::Time => Some(FieldKind::Time),
		SqlType::DateTime => Some(FieldKind::DateTime),
		SqlType::Interval => Some(FieldKind::Duration),
		SqlType::Uuid => Some(FieldKind::Uuid),
		SqlType::Boolean | SqlType::Enum { .. } | SqlType::Array { .. } => None,
	}
}

/// Resolve the field kind for one column.
///
/// # Errors
///
/// [`SchemaError::UnmappedType`] when no step of the resolution order
/// produces a kind, including an array column whose item type cannot be
/// resolved.
pub fn field_type_for(
	entity: &str,
	attribute: &str,
	column: &ColumnDescriptor,
) -> Result<FieldKind, SchemaError> {
	let unmapped = || SchemaError::UnmappedType {
		entity: entity.to_string(),
		attribute: attribute.to_string(),
	};

	match &column.sql_type {
		SqlType::Enum { class: None, .. } => return Ok(FieldKind::Choice),
		SqlType::Enum {
			class: Some(def), ..
		} => return Ok(FieldKind::Enum(def.clone())),
		SqlType::Array { item } => {
			// Structural item types have no scalar fallback; a nested array
			// or enum item is unresolvable.
			let child = match &**item {
				SqlType::Array { .. } | SqlType::Enum { .. } => None,
				other => storage_field_type(other).or_else(|| {
					other
						.value_kind()
						.chain()
						.into_iter()
						.find_map(|kind| VALUE_KIND_TABLE.get(&kind).cloned())
				}),
			}
			.ok_or_else(unmapped)?;
			return Ok(FieldKind::List(Box::new(child)));
		}
		_ => {}
	}

	if let Some(kind) = storage_field_type(&column.sql_type) {
		return Ok(kind);
	}

	if column.value_kind() == ValueKind::Bool {
		return Ok(if column.nullable {
			FieldKind::NullBoolean
		} else {
			FieldKind::Boolean
		});
	}

	column
		.value_kind()
		.chain()
		.into_iter()
		.find_map(|kind| VALUE_KIND_TABLE.get(&kind).cloned())
		.ok_or_else(unmapped)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::EnumDef;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(SqlType::Integer, FieldKind::Integer)]
	#[case(SqlType::BigInteger, FieldKind::Integer)]
	#[case(SqlType::SmallInteger, FieldKind::Integer)]
	#[case(SqlType::string(), FieldKind::Char)]
	#[case(SqlType::Text, FieldKind::Char)]
	#[case(SqlType::Float, FieldKind::Float)]
	#[case(SqlType::Numeric { precision: Some(10), scale: Some(2) }, FieldKind::Decimal)]
	#[case(SqlType::Date, FieldKind::Date)]
	#[case(SqlType::Time, FieldKind::Time)]
	#[case(SqlType::DateTime, FieldKind::DateTime)]
	#[case(SqlType::Interval, FieldKind::Duration)]
	#[case(SqlType::Uuid, FieldKind::Uuid)]
	#[case(SqlType::KeyValue, FieldKind::Dict)]
	fn test_storage_table(#[case] sql_type: SqlType, #[case] expected: FieldKind) {
		let column = ColumnDescriptor::new(sql_type);
		assert_eq!(field_type_for("E", "a", &column).unwrap(), expected);
	}

	#[test]
	fn test_enum_without_class_is_choice() {
		let column = ColumnDescriptor::new(SqlType::enum_values(["red", "green"]));
		assert_eq!(field_type_for("E", "a", &column).unwrap(), FieldKind::Choice);
	}

	#[test]
	fn test_enum_with_class_is_enum_field() {
		let def = EnumDef::new("VehicleType", [("bus", json!(1))]);
		let column = ColumnDescriptor::new(SqlType::enum_class(def.clone()));
		assert_eq!(
			field_type_for("E", "a", &column).unwrap(),
			FieldKind::Enum(def)
		);
	}

	#[test]
	fn test_boolean_nullability_picks_tri_state() {
		let nullable = ColumnDescriptor::new(SqlType::Boolean);
		assert_eq!(
			field_type_for("E", "a", &nullable).unwrap(),
			FieldKind::NullBoolean
		);

		let strict = ColumnDescriptor::new(SqlType::Boolean).not_null();
		assert_eq!(
			field_type_for("E", "a", &strict).unwrap(),
			FieldKind::Boolean
		);
	}

	#[test]
	fn test_array_resolves_item_type() {
		let column = ColumnDescriptor::new(SqlType::Array {
			item: Box::new(SqlType::Integer),
		});
		assert_eq!(
			field_type_for("E", "a", &column).unwrap(),
			FieldKind::List(Box::new(FieldKind::Integer))
		);
	}

	#[test]
	fn test_unresolvable_array_item_raises_lookup_failure() {
		let column = ColumnDescriptor::new(SqlType::Array {
			item: Box::new(SqlType::Array {
				item: Box::new(SqlType::Integer),
			}),
		});
		let err = field_type_for("Vehicle", "tags", &column).unwrap_err();
		assert_eq!(
			err,
			SchemaError::UnmappedType {
				entity: "Vehicle".to_string(),
				attribute: "tags".to_string(),
			}
		);
	}

	#[test]
	fn test_resolution_is_pure() {
		let column = ColumnDescriptor::new(SqlType::string_with_length(25));
		let first = field_type_for("E", "a", &column).unwrap();
		let second = field_type_for("E", "a", &column).unwrap();
		assert_eq!(first, second);
	}
}
