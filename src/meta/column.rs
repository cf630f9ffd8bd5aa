//! Column descriptors: the storage-level surface the type mapper and field
//! builder consume.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage type of a mapped column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlType {
	SmallInteger,
	Integer,
	BigInteger,
	/// Variable-length string, optionally bounded.
	String {
		length: Option<usize>,
	},
	Text,
	Boolean,
	Float,
	/// Arbitrary-precision numeric.
	Numeric {
		precision: Option<u32>,
		scale: Option<u32>,
	},
	Date,
	Time,
	DateTime,
	Interval,
	Uuid,
	/// Enumerated column. `class` is present when the column is bound to an
	/// enum type; `values` carries the raw allowed values otherwise.
	Enum {
		class: Option<EnumDef>,
		values: Vec<String>,
	},
	/// Array column with a typed item.
	Array {
		item: Box<SqlType>,
	},
	/// Key-value mapping column (HSTORE-style).
	KeyValue,
}

impl SqlType {
	/// Convenience constructor for an unbounded string column.
	pub fn string() -> Self {
		SqlType::String { length: None }
	}

	/// Convenience constructor for a bounded string column.
	pub fn string_with_length(length: usize) -> Self {
		SqlType::String {
			length: Some(length),
		}
	}

	/// Convenience constructor for a raw-valued enum column.
	pub fn enum_values<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		SqlType::Enum {
			class: None,
			values: values.into_iter().map(Into::into).collect(),
		}
	}

	/// Convenience constructor for an enum column bound to an enum class.
	pub fn enum_class(def: EnumDef) -> Self {
		SqlType::Enum {
			class: Some(def),
			values: vec![],
		}
	}

	/// The native value kind stored by this column.
	pub fn value_kind(&self) -> ValueKind {
		match self {
			SqlType::SmallInteger | SqlType::Integer | SqlType::BigInteger => ValueKind::Int,
			SqlType::String { .. } | SqlType::Text => ValueKind::Str,
			SqlType::Boolean => ValueKind::Bool,
			SqlType::Float => ValueKind::Float,
			SqlType::Numeric { .. } => ValueKind::Decimal,
			SqlType::Date => ValueKind::Date,
			SqlType::Time => ValueKind::Time,
			SqlType::DateTime => ValueKind::DateTime,
			SqlType::Interval => ValueKind::Duration,
			SqlType::Uuid => ValueKind::Uuid,
			SqlType::Enum { .. } => ValueKind::Str,
			SqlType::Array { item } => item.value_kind(),
			SqlType::KeyValue => ValueKind::Str,
		}
	}
}

/// Native value kind of a column, used as the fallback lookup key when the
/// storage type has no direct field mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
	Bool,
	Int,
	Float,
	Decimal,
	Str,
	Date,
	Time,
	DateTime,
	Duration,
	Uuid,
}

impl ValueKind {
	/// Ancestor chain of this kind, most-derived first and excluding `self`.
	///
	/// Mirrors the method-resolution-order walk of the source system: a
	/// boolean is looked up as an integer when no boolean mapping exists, a
	/// decimal falls back to float.
	pub fn ancestors(self) -> &'static [ValueKind] {
		match self {
			ValueKind::Bool => &[ValueKind::Int],
			ValueKind::Decimal => &[ValueKind::Float],
			ValueKind::DateTime => &[ValueKind::Date],
			_ => &[],
		}
	}

	/// `self` followed by its ancestors.
	pub fn chain(self) -> Vec<ValueKind> {
		let mut chain = vec![self];
		chain.extend_from_slice(self.ancestors());
		chain
	}
}

/// An enum class bound to a column: symbolic member names paired with their
/// underlying values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
	/// Enum class name.
	pub name: String,
	/// Members in declaration order: `(member name, underlying value)`.
	pub members: Vec<(String, Value)>,
}

impl EnumDef {
	/// Describe an enum class.
	///
	/// # Examples
	///
	/// ```
	/// use grappelli::meta::EnumDef;
	/// use serde_json::json;
	///
	/// let def = EnumDef::new("VehicleType", [("bus", json!(1)), ("car", json!(2))]);
	/// assert_eq!(def.value_of("bus"), Some(&json!(1)));
	/// assert_eq!(def.name_for(&json!(2)), Some("car"));
	/// ```
	pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
	where
		I: IntoIterator<Item = (S, Value)>,
		S: Into<String>,
	{
		Self {
			name: name.into(),
			members: members
				.into_iter()
				.map(|(n, v)| (n.into(), v))
				.collect(),
		}
	}

	/// The underlying value of `member`, if it exists.
	pub fn value_of(&self, member: &str) -> Option<&Value> {
		self.members
			.iter()
			.find(|(name, _)| name == member)
			.map(|(_, value)| value)
	}

	/// The member name holding `value`, if any.
	pub fn name_for(&self, value: &Value) -> Option<&str> {
		self.members
			.iter()
			.find(|(_, v)| v == value)
			.map(|(name, _)| name.as_str())
	}
}

/// One mapped storage column.
///
/// Carries everything the field builder derives schema kwargs from:
/// nullability, length, precision, enum binding, documentation, and the
/// database-side default/autoincrement flags that drive primary-key rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
	/// Storage type.
	pub sql_type: SqlType,
	/// Whether NULL is a legal stored value.
	pub nullable: bool,
	/// Documentation string, surfaced as field help text.
	pub doc: Option<String>,
	/// Whether the column has a database-side default.
	pub has_default: bool,
	/// Whether the column is auto-incrementing.
	pub autoincrement: bool,
}

impl ColumnDescriptor {
	/// A nullable column of the given storage type.
	pub fn new(sql_type: SqlType) -> Self {
		Self {
			sql_type,
			nullable: true,
			doc: None,
			has_default: false,
			autoincrement: false,
		}
	}

	/// Mark the column NOT NULL.
	pub fn not_null(mut self) -> Self {
		self.nullable = false;
		self
	}

	/// Attach a documentation string.
	pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
		self.doc = Some(doc.into());
		self
	}

	/// Mark the column as having a database-side default.
	pub fn with_default(mut self) -> Self {
		self.has_default = true;
		self
	}

	/// Mark the column auto-incrementing.
	pub fn autoincrement(mut self) -> Self {
		self.autoincrement = true;
		self
	}

	/// The column's native value kind.
	pub fn value_kind(&self) -> ValueKind {
		self.sql_type.value_kind()
	}

	/// Maximum length, for bounded string columns.
	pub fn max_length(&self) -> Option<usize> {
		match self.sql_type {
			SqlType::String { length } => length,
			_ => None,
		}
	}

	/// Numeric precision and scale, for numeric columns.
	pub fn precision_scale(&self) -> (Option<u32>, Option<u32>) {
		match self.sql_type {
			SqlType::Numeric { precision, scale } => (precision, scale),
			_ => (None, None),
		}
	}
}
