//! Field descriptors.
//!
//! A schema is a tree of immutable field value objects. Primitive fields are
//! a [`Field`] carrying a tagged [`FieldKind`] rather than a subclass
//! hierarchy; nested and composite sub-schemas live in [`crate::schema`].
//!
//! `to_internal` coerces and validates one raw JSON value; `to_representation`
//! renders one stored value. Both are pure with respect to the field.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::meta::EnumDef;

/// The kind of a primitive field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
	/// Textual field.
	Char,
	/// 64-bit integer field.
	Integer,
	/// Floating-point field.
	Float,
	/// Arbitrary-precision decimal field.
	Decimal,
	/// Strict two-state boolean field.
	Boolean,
	/// Tri-state boolean field (accepts null regardless of `allow_null`).
	NullBoolean,
	Date,
	Time,
	DateTime,
	/// Time interval, normalized to seconds.
	Duration,
	Uuid,
	/// Fixed choice set; validated against [`Field::choices`].
	Choice,
	/// Enum-class field; accepts member name or value, name first.
	Enum(EnumDef),
	/// Homogeneous list with a typed child.
	List(Box<FieldKind>),
	/// Key-value mapping field with nullable string values.
	Dict,
	/// Identity-URI field rendered from the owning instance's primary keys.
	Uri,
	/// Read-only derived field (computed attribute pass-through).
	ReadOnly,
	/// Placeholder that is omitted from representation entirely.
	Skip,
}

impl FieldKind {
	/// Whether `allow_blank` makes sense for this kind.
	pub fn is_textual(&self) -> bool {
		matches!(self, FieldKind::Char | FieldKind::Choice | FieldKind::Enum(_))
	}

	/// Whether this is one of the boolean kinds.
	pub fn is_boolean(&self) -> bool {
		matches!(self, FieldKind::Boolean | FieldKind::NullBoolean)
	}

	/// Whether fields of this kind are implicitly read-only.
	pub fn is_read_only_kind(&self) -> bool {
		matches!(self, FieldKind::Uri | FieldKind::ReadOnly | FieldKind::Skip)
	}
}

/// A custom validation callback run after kind coercion.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), ValidationError> + Send + Sync>;

/// An ordered list of [`Validator`]s.
#[derive(Clone, Default)]
pub struct Validators(pub Vec<Validator>);

impl Validators {
	/// No validators.
	pub fn none() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl std::fmt::Debug for Validators {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Validators(len={})", self.0.len())
	}
}

/// Keyword arguments a field is constructed from.
///
/// Unset options fall back to kind- and context-dependent defaults when the
/// field is finalized. The merge semantics of caller overrides live in
/// [`FieldKwargs::merge_extra`].
#[derive(Debug, Clone, Default)]
pub struct FieldKwargs {
	pub read_only: Option<bool>,
	pub write_only: Option<bool>,
	pub required: Option<bool>,
	pub allow_null: Option<bool>,
	pub allow_blank: Option<bool>,
	pub default: Option<Value>,
	pub initial: Option<Value>,
	/// Attribute the field reads/writes; defaults to the field name.
	pub source: Option<String>,
	pub label: Option<String>,
	pub help_text: Option<String>,
	pub choices: Option<Vec<Value>>,
	pub max_length: Option<usize>,
	pub min_length: Option<usize>,
	pub max_digits: Option<u32>,
	pub decimal_places: Option<u32>,
	pub validators: Validators,
	/// Relationship-only: permit nested updates through this field.
	pub allow_nested_updates: Option<bool>,
	/// Relationship-only: permit creating new related instances.
	pub allow_create: Option<bool>,
}

impl FieldKwargs {
	/// Empty kwargs.
	pub fn new() -> Self {
		Self::default()
	}

	/// Merge caller-supplied overrides into computed kwargs.
	///
	/// Overrides take final precedence. A read-only override strips the
	/// base kwargs that are incompatible with read-only; an override
	/// default drops a redundant `required: false`; a field that ends up
	/// read-only never carries `required` from the override.
	pub fn merge_extra(mut self, extra: &FieldKwargs) -> FieldKwargs {
		if extra.read_only == Some(true) {
			self.required = None;
			self.default = None;
			self.allow_blank = None;
			self.allow_null = None;
			self.min_length = None;
			self.max_length = None;
			self.max_digits = None;
			self.decimal_places = None;
			self.validators = Validators::none();
		}

		if extra.default.is_some() && self.required == Some(false) {
			self.required = None;
		}

		let read_only = extra
			.read_only
			.unwrap_or_else(|| self.read_only.unwrap_or(false));

		macro_rules! overlay {
			($($field:ident),* $(,)?) => {
				$(if extra.$field.is_some() {
					self.$field = extra.$field.clone();
				})*
			};
		}
		overlay!(
			read_only,
			write_only,
			allow_null,
			allow_blank,
			default,
			initial,
			source,
			label,
			help_text,
			choices,
			max_length,
			min_length,
			max_digits,
			decimal_places,
			allow_nested_updates,
			allow_create,
		);
		if !extra.validators.is_empty() {
			self.validators = extra.validators.clone();
		}
		if !read_only && extra.required.is_some() {
			self.required = extra.required;
		}

		self
	}

	/// Keep only the kwargs valid for a generic choice field.
	pub fn restrict_to_choice_kwargs(mut self) -> FieldKwargs {
		self.max_length = None;
		self.min_length = None;
		self.max_digits = None;
		self.decimal_places = None;
		self
	}
}

/// An immutable primitive field descriptor.
#[derive(Debug, Clone)]
pub struct Field {
	/// Field name in the schema.
	pub name: String,
	/// Attribute the field reads/writes; `"*"` means the whole record.
	pub source: String,
	pub kind: FieldKind,
	pub required: bool,
	pub allow_null: bool,
	pub allow_blank: bool,
	pub read_only: bool,
	pub write_only: bool,
	pub default: Option<Value>,
	pub label: Option<String>,
	pub help_text: Option<String>,
	pub choices: Option<Vec<Value>>,
	pub max_length: Option<usize>,
	pub min_length: Option<usize>,
	pub max_digits: Option<u32>,
	pub decimal_places: Option<u32>,
	pub validators: Validators,
	/// Enum representation: emit the member name instead of its value.
	pub by_name: bool,
}

impl Field {
	/// A field with kind defaults and no constraints.
	pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
		let name = name.into();
		let read_only = kind.is_read_only_kind();
		Self {
			source: name.clone(),
			name,
			required: !read_only,
			allow_null: false,
			allow_blank: false,
			read_only,
			write_only: false,
			default: None,
			label: None,
			help_text: None,
			choices: None,
			max_length: None,
			min_length: None,
			max_digits: None,
			decimal_places: None,
			validators: Validators::none(),
			kind,
			by_name: false,
		}
	}

	/// Finalize a field from computed-and-merged kwargs.
	pub fn from_kwargs(name: impl Into<String>, kind: FieldKind, kwargs: FieldKwargs) -> Self {
		let name = name.into();
		let read_only = kwargs.read_only.unwrap_or(kind.is_read_only_kind());
		let required = kwargs
			.required
			.unwrap_or(!read_only && kwargs.default.is_none());
		Self {
			source: kwargs.source.clone().unwrap_or_else(|| name.clone()),
			name,
			required: !read_only && required,
			allow_null: kwargs.allow_null.unwrap_or(false),
			allow_blank: kwargs.allow_blank.unwrap_or(false),
			read_only,
			write_only: kwargs.write_only.unwrap_or(false),
			default: kwargs.default,
			label: kwargs.label,
			help_text: kwargs.help_text,
			choices: kwargs.choices,
			max_length: kwargs.max_length,
			min_length: kwargs.min_length,
			max_digits: kwargs.max_digits,
			decimal_places: kwargs.decimal_places,
			validators: kwargs.validators,
			kind,
			by_name: false,
		}
	}

	/// Mark the field read-only.
	pub fn read_only(mut self) -> Self {
		self.read_only = true;
		self.required = false;
		self
	}

	/// Override the source attribute.
	pub fn with_source(mut self, source: impl Into<String>) -> Self {
		self.source = source.into();
		self
	}

	/// Coerce and validate one raw value.
	pub fn to_internal(&self, value: &Value) -> Result<Value, ValidationError> {
		if value.is_null() {
			if matches!(self.kind, FieldKind::NullBoolean) || self.allow_null {
				return Ok(Value::Null);
			}
			return Err(ValidationError::message("This field may not be null."));
		}

		let internal = self.coerce(value)?;
		for validator in &self.validators.0 {
			validator(&internal)?;
		}
		Ok(internal)
	}

	fn coerce(&self, value: &Value) -> Result<Value, ValidationError> {
		match &self.kind {
			FieldKind::Char => self.coerce_char(value),
			FieldKind::Integer => coerce_integer(value),
			FieldKind::Float => coerce_float(value),
			FieldKind::Decimal => self.coerce_decimal(value),
			FieldKind::Boolean | FieldKind::NullBoolean => coerce_boolean(value),
			FieldKind::Date => coerce_date(value),
			FieldKind::Time => coerce_time(value),
			FieldKind::DateTime => coerce_datetime(value),
			FieldKind::Duration => coerce_duration(value),
			FieldKind::Uuid => coerce_uuid(value),
			FieldKind::Choice => self.coerce_choice(value),
			FieldKind::Enum(def) => coerce_enum(def, value),
			FieldKind::List(child) => self.coerce_list(child, value),
			FieldKind::Dict => coerce_dict(value),
			// Read-only kinds never receive input; pass through defensively.
			FieldKind::Uri | FieldKind::ReadOnly | FieldKind::Skip => Ok(value.clone()),
		}
	}

	fn coerce_char(&self, value: &Value) -> Result<Value, ValidationError> {
		let text = match value {
			Value::String(s) => s.clone(),
			Value::Number(n) => n.to_string(),
			_ => return Err(ValidationError::message("Not a valid string.")),
		};
		if text.is_empty() && !self.allow_blank {
			return Err(ValidationError::message("This field may not be blank."));
		}
		if let Some(max) = self.max_length {
			if text.chars().count() > max {
				return Err(ValidationError::message(format!(
					"Ensure this field has no more than {max} characters."
				)));
			}
		}
		if let Some(min) = self.min_length {
			if text.chars().count() < min {
				return Err(ValidationError::message(format!(
					"Ensure this field has at least {min} characters."
				)));
			}
		}
		Ok(Value::String(text))
	}

	fn coerce_decimal(&self, value: &Value) -> Result<Value, ValidationError> {
		let text = match value {
			Value::String(s) => s.clone(),
			Value::Number(n) => n.to_string(),
			_ => return Err(ValidationError::message("A valid number is required.")),
		};
		let decimal = Decimal::from_str(&text)
			.map_err(|_| ValidationError::message("A valid number is required."))?;

		let scale = decimal.scale();
		let mantissa_digits = decimal.mantissa().abs().to_string().len() as u32;
		let total_digits = mantissa_digits.max(scale);

		if let Some(places) = self.decimal_places {
			if scale > places {
				return Err(ValidationError::message(format!(
					"Ensure that there are no more than {places} decimal places."
				)));
			}
		}
		if let Some(digits) = self.max_digits {
			if total_digits > digits {
				return Err(ValidationError::message(format!(
					"Ensure that there are no more than {digits} digits in total."
				)));
			}
		}
		Ok(Value::String(decimal.to_string()))
	}

	fn coerce_choice(&self, value: &Value) -> Result<Value, ValidationError> {
		let choices = self.choices.as_deref().unwrap_or(&[]);
		if choices.contains(value) {
			return Ok(value.clone());
		}
		// A stringified number may reference a numeric choice and vice versa.
		if let Some(matched) = choices.iter().find(|c| stringify(c) == stringify(value)) {
			return Ok(matched.clone());
		}
		Err(invalid_choice(value))
	}

	fn coerce_list(&self, child: &FieldKind, value: &Value) -> Result<Value, ValidationError> {
		let Value::Array(items) = value else {
			return Err(ValidationError::message(format!(
				"Expected a list of items but got type \"{}\".",
				type_name(value)
			)));
		};

		let child_field = Field::new(format!("{}.child", self.name), child.clone());
		let mut out = Vec::with_capacity(items.len());
		let mut errors: IndexMap<String, ValidationError> = IndexMap::new();
		for (index, item) in items.iter().enumerate() {
			match child_field.to_internal(item) {
				Ok(item) => out.push(item),
				Err(err) => {
					errors.insert(index.to_string(), err);
				}
			}
		}
		if errors.is_empty() {
			Ok(Value::Array(out))
		} else {
			Err(ValidationError::Fields(errors))
		}
	}

	/// Render one stored value for output.
	pub fn to_representation(&self, value: &Value) -> Value {
		if value.is_null() {
			return Value::Null;
		}
		match &self.kind {
			FieldKind::Enum(def) => represent_enum(def, value, self.by_name),
			FieldKind::List(child) => match value {
				Value::Array(items) => {
					let child_field = Field::new(format!("{}.child", self.name), (**child).clone());
					Value::Array(
						items
							.iter()
							.map(|item| child_field.to_representation(item))
							.collect(),
					)
				}
				other => other.clone(),
			},
			_ => value.clone(),
		}
	}
}

fn stringify(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "str",
		Value::Array(_) => "list",
		Value::Object(_) => "dict",
	}
}

fn invalid_choice(value: &Value) -> ValidationError {
	ValidationError::message(format!("\"{}\" is not a valid choice.", stringify(value)))
}

fn coerce_integer(value: &Value) -> Result<Value, ValidationError> {
	let parsed = match value {
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				Some(i)
			} else {
				n.as_f64()
					.filter(|f| f.fract() == 0.0)
					.map(|f| f as i64)
			}
		}
		Value::String(s) => s.trim().parse::<i64>().ok(),
		_ => None,
	};
	parsed
		.map(Value::from)
		.ok_or_else(|| ValidationError::message("A valid integer is required."))
}

fn coerce_float(value: &Value) -> Result<Value, ValidationError> {
	let parsed = match value {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.trim().parse::<f64>().ok(),
		_ => None,
	};
	parsed
		.and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
		.ok_or_else(|| ValidationError::message("A valid number is required."))
}

fn coerce_boolean(value: &Value) -> Result<Value, ValidationError> {
	let parsed = match value {
		Value::Bool(b) => Some(*b),
		Value::Number(n) => match n.as_i64() {
			Some(0) => Some(false),
			Some(1) => Some(true),
			_ => None,
		},
		Value::String(s) => match s.to_ascii_lowercase().as_str() {
			"true" | "1" | "yes" => Some(true),
			"false" | "0" | "no" => Some(false),
			_ => None,
		},
		_ => None,
	};
	parsed
		.map(Value::Bool)
		.ok_or_else(|| ValidationError::message("Must be a valid boolean."))
}

fn coerce_date(value: &Value) -> Result<Value, ValidationError> {
	let Value::String(s) = value else {
		return Err(date_format_error());
	};
	NaiveDate::parse_from_str(s, "%Y-%m-%d")
		.map(|d| Value::String(d.to_string()))
		.map_err(|_| date_format_error())
}

fn date_format_error() -> ValidationError {
	ValidationError::message("Date has wrong format. Use one of these formats instead: YYYY-MM-DD.")
}

fn coerce_time(value: &Value) -> Result<Value, ValidationError> {
	let Value::String(s) = value else {
		return Err(time_format_error());
	};
	NaiveTime::parse_from_str(s, "%H:%M:%S")
		.or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
		.map(|t| Value::String(t.to_string()))
		.map_err(|_| time_format_error())
}

fn time_format_error() -> ValidationError {
	ValidationError::message("Time has wrong format. Use one of these formats instead: hh:mm[:ss].")
}

fn coerce_datetime(value: &Value) -> Result<Value, ValidationError> {
	let Value::String(s) = value else {
		return Err(datetime_format_error());
	};
	NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
		.or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
		.or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
		.map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
		.map_err(|_| datetime_format_error())
}

fn datetime_format_error() -> ValidationError {
	ValidationError::message(
		"Datetime has wrong format. Use one of these formats instead: YYYY-MM-DDThh:mm:ss.",
	)
}

fn coerce_duration(value: &Value) -> Result<Value, ValidationError> {
	let seconds = match value {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => {
			let parts: Vec<&str> = s.split(':').collect();
			match parts.as_slice() {
				[h, m, sec] => match (
					h.parse::<f64>(),
					m.parse::<f64>(),
					sec.parse::<f64>(),
				) {
					(Ok(h), Ok(m), Ok(sec)) => Some(h * 3600.0 + m * 60.0 + sec),
					_ => None,
				},
				[single] => single.parse::<f64>().ok(),
				_ => None,
			}
		}
		_ => None,
	};
	seconds
		.and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
		.ok_or_else(|| {
			ValidationError::message(
				"Duration has wrong format. Use one of these formats instead: [hh:]mm:ss or seconds.",
			)
		})
}

fn coerce_uuid(value: &Value) -> Result<Value, ValidationError> {
	let Value::String(s) = value else {
		return Err(ValidationError::message("Must be a valid UUID."));
	};
	uuid::Uuid::parse_str(s)
		.map(|u| Value::String(u.hyphenated().to_string()))
		.map_err(|_| ValidationError::message("Must be a valid UUID."))
}

/// Enum lookup: exact member-name match first, value lookup second.
fn coerce_enum(def: &EnumDef, value: &Value) -> Result<Value, ValidationError> {
	if let Value::String(s) = value {
		if def.value_of(s).is_some() {
			return Ok(Value::String(s.clone()));
		}
	}
	if let Some(name) = def.name_for(value) {
		return Ok(Value::String(name.to_string()));
	}
	Err(invalid_choice(value))
}

fn represent_enum(def: &EnumDef, value: &Value, by_name: bool) -> Value {
	// The internal form is the member name; tolerate a raw value too.
	let name = match value {
		Value::String(s) if def.value_of(s).is_some() => Some(s.as_str()),
		other => def.name_for(other),
	};
	match name {
		Some(name) if by_name => Value::String(name.to_string()),
		Some(name) => def.value_of(name).cloned().unwrap_or(Value::Null),
		None => value.clone(),
	}
}

fn coerce_dict(value: &Value) -> Result<Value, ValidationError> {
	let Value::Object(map) = value else {
		return Err(ValidationError::message(format!(
			"Expected a dictionary of items but got type \"{}\".",
			type_name(value)
		)));
	};

	let mut errors: IndexMap<String, ValidationError> = IndexMap::new();
	for (key, item) in map {
		if !item.is_null() && !item.is_string() {
			errors.insert(key.clone(), ValidationError::message("Not a valid string."));
		}
	}
	if errors.is_empty() {
		Ok(value.clone())
	} else {
		Err(ValidationError::Fields(errors))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn enum_def() -> EnumDef {
		EnumDef::new("VehicleType", [("bus", json!(1)), ("car", json!(2))])
	}

	#[test]
	fn test_enum_accepts_name_then_value() {
		let field = Field::new("type", FieldKind::Enum(enum_def()));
		assert_eq!(field.to_internal(&json!("bus")).unwrap(), json!("bus"));
		assert_eq!(field.to_internal(&json!(2)).unwrap(), json!("car"));

		let err = field.to_internal(&json!("boat")).unwrap_err();
		assert_eq!(err.messages(), vec!["\"boat\" is not a valid choice."]);
	}

	#[test]
	fn test_enum_round_trip_every_member() {
		let def = enum_def();
		let field = Field::new("type", FieldKind::Enum(def.clone()));
		for (name, _) in &def.members {
			let rendered = field.to_representation(&json!(name));
			let back = field.to_internal(&rendered).unwrap();
			assert_eq!(back, json!(name));
		}
	}

	#[test]
	fn test_enum_representation_by_name() {
		let mut field = Field::new("type", FieldKind::Enum(enum_def()));
		assert_eq!(field.to_representation(&json!("bus")), json!(1));
		field.by_name = true;
		assert_eq!(field.to_representation(&json!("bus")), json!("bus"));
		assert_eq!(field.to_representation(&Value::Null), Value::Null);
	}

	#[test]
	fn test_char_blank_and_length() {
		let mut field = Field::new("name", FieldKind::Char);
		field.max_length = Some(5);
		assert_eq!(field.to_internal(&json!("abc")).unwrap(), json!("abc"));
		assert!(field.to_internal(&json!("")).is_err());
		assert!(field.to_internal(&json!("toolong")).is_err());

		field.allow_blank = true;
		assert_eq!(field.to_internal(&json!("")).unwrap(), json!(""));
	}

	#[test]
	fn test_integer_coercion() {
		let field = Field::new("n", FieldKind::Integer);
		assert_eq!(field.to_internal(&json!(4)).unwrap(), json!(4));
		assert_eq!(field.to_internal(&json!("17")).unwrap(), json!(17));
		assert!(field.to_internal(&json!("x")).is_err());
		assert!(field.to_internal(&json!(1.5)).is_err());
	}

	#[test]
	fn test_null_handling() {
		let field = Field::new("n", FieldKind::Integer);
		assert!(field.to_internal(&Value::Null).is_err());

		let mut nullable = Field::new("n", FieldKind::Integer);
		nullable.allow_null = true;
		assert_eq!(nullable.to_internal(&Value::Null).unwrap(), Value::Null);
	}

	#[test]
	fn test_tri_state_boolean_accepts_null() {
		let field = Field::new("flag", FieldKind::NullBoolean);
		assert_eq!(field.to_internal(&Value::Null).unwrap(), Value::Null);
		assert_eq!(field.to_internal(&json!("1")).unwrap(), json!(true));

		let strict = Field::new("flag", FieldKind::Boolean);
		assert!(strict.to_internal(&Value::Null).is_err());
		assert_eq!(strict.to_internal(&json!(false)).unwrap(), json!(false));
	}

	#[test]
	fn test_decimal_digit_limits() {
		let mut field = Field::new("price", FieldKind::Decimal);
		field.max_digits = Some(4);
		field.decimal_places = Some(2);
		assert_eq!(field.to_internal(&json!("12.50")).unwrap(), json!("12.50"));
		assert!(field.to_internal(&json!("1.505")).is_err());
		assert!(field.to_internal(&json!("12345")).is_err());
		assert!(field.to_internal(&json!("abc")).is_err());
	}

	#[test]
	fn test_choice_matches_exact_then_stringified() {
		let mut field = Field::new("paint", FieldKind::Choice);
		field.choices = Some(vec![json!("red"), json!(3)]);
		assert_eq!(field.to_internal(&json!("red")).unwrap(), json!("red"));
		assert_eq!(field.to_internal(&json!("3")).unwrap(), json!(3));
		assert!(field.to_internal(&json!("blue")).is_err());
	}

	#[test]
	fn test_list_collects_index_keyed_errors() {
		let field = Field::new("tags", FieldKind::List(Box::new(FieldKind::Integer)));
		assert_eq!(
			field.to_internal(&json!([1, "2"])).unwrap(),
			json!([1, 2])
		);

		let err = field.to_internal(&json!([1, "x", 3, "y"])).unwrap_err();
		assert!(err.field("1").is_some());
		assert!(err.field("3").is_some());
		assert!(err.field("0").is_none());

		assert!(field.to_internal(&json!("nope")).is_err());
	}

	#[test]
	fn test_dict_values_must_be_strings_or_null() {
		let field = Field::new("meta", FieldKind::Dict);
		let ok = json!({"a": "x", "b": null});
		assert_eq!(field.to_internal(&ok).unwrap(), ok);

		let err = field.to_internal(&json!({"a": 1})).unwrap_err();
		assert!(err.field("a").is_some());
	}

	#[test]
	fn test_date_and_datetime_formats() {
		let date = Field::new("d", FieldKind::Date);
		assert_eq!(
			date.to_internal(&json!("2020-02-29")).unwrap(),
			json!("2020-02-29")
		);
		assert!(date.to_internal(&json!("29/02/2020")).is_err());

		let dt = Field::new("ts", FieldKind::DateTime);
		assert_eq!(
			dt.to_internal(&json!("2020-02-29 10:30:00")).unwrap(),
			json!("2020-02-29T10:30:00")
		);
	}

	#[test]
	fn test_merge_extra_read_only_strips_incompatible_kwargs() {
		let base = FieldKwargs {
			required: Some(true),
			max_length: Some(10),
			default: Some(json!("x")),
			..FieldKwargs::default()
		};
		let extra = FieldKwargs {
			read_only: Some(true),
			required: Some(true),
			..FieldKwargs::default()
		};
		let merged = base.merge_extra(&extra);
		assert_eq!(merged.read_only, Some(true));
		assert_eq!(merged.required, None);
		assert_eq!(merged.max_length, None);
		assert_eq!(merged.default, None);
	}

	#[test]
	fn test_merge_extra_default_drops_redundant_required() {
		let base = FieldKwargs {
			required: Some(false),
			..FieldKwargs::default()
		};
		let extra = FieldKwargs {
			default: Some(json!(0)),
			..FieldKwargs::default()
		};
		let merged = base.merge_extra(&extra);
		assert_eq!(merged.required, None);
		assert_eq!(merged.default, Some(json!(0)));
	}

	#[test]
	fn test_field_purity_on_successive_calls() {
		let field = Field::new("n", FieldKind::Integer);
		let first = field.to_internal(&json!("42")).unwrap();
		let second = field.to_internal(&json!("42")).unwrap();
		assert_eq!(first, second);
	}
}
