//! Error types for schema construction and validation.
//!
//! Two families of failures exist and never mix:
//!
//! - [`SchemaError`]: fatal configuration errors raised while a schema is
//!   being assembled. These indicate a broken mapping or schema definition
//!   and always propagate; nothing catches them per request.
//! - [`ValidationError`]: per-request, structured, field-keyed errors
//!   produced while validating input or applying it onto entity graphs.

use indexmap::IndexMap;
use thiserror::Error;

/// Key under which errors not attributable to a single field are reported.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Fatal configuration errors raised at schema-construction time.
///
/// These are never recoverable per request; they mean the entity mapping or
/// the schema options are wrong and must be fixed in code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
	/// The entity was never registered with the metadata registry.
	#[error("entity `{0}` is not registered with the metadata registry")]
	UnknownEntity(String),

	/// No field type could be resolved for a column.
	#[error("could not determine a field type for attribute `{entity}.{attribute}`")]
	UnmappedType {
		/// Entity owning the attribute.
		entity: String,
		/// The offending attribute.
		attribute: String,
	},

	/// A requested field name does not exist on the entity.
	#[error("field `{field}` is not valid for entity `{entity}`")]
	UnknownField {
		/// The unknown field name.
		field: String,
		/// Entity the schema was built for.
		entity: String,
	},

	/// `fields` and `exclude` were both supplied.
	#[error("cannot set both `fields` and `exclude` on the schema for `{0}`")]
	FieldsAndExclude(String),

	/// Neither `fields` nor `exclude` was supplied.
	#[error("the schema for `{0}` requires either `fields` or `exclude`")]
	MissingFieldSelection(String),

	/// A declared field was left out of an explicit `fields` list.
	#[error(
		"field `{field}` was declared on the schema for `{entity}` but is not included in `fields`"
	)]
	DeclaredFieldNotIncluded {
		/// The declared field name.
		field: String,
		/// Entity the schema was built for.
		entity: String,
	},

	/// `exclude` named a field that is not part of the default field set.
	#[error("cannot exclude `{field}`: no such field on entity `{entity}`")]
	UnknownExclude {
		/// The excluded name.
		field: String,
		/// Entity the schema was built for.
		entity: String,
	},

	/// `depth` outside the supported 0..=5 range.
	#[error("`depth` must be between 0 and 5, got {0}")]
	InvalidDepth(usize),

	/// Composite constructor arity does not match its mapped columns.
	#[error(
		"composite `{composite}` on `{entity}` takes {params} constructor parameters but maps {columns} columns"
	)]
	CompositeArity {
		/// Composite attribute name.
		composite: String,
		/// Entity owning the composite.
		entity: String,
		/// Number of constructor parameters.
		params: usize,
		/// Number of mapped columns.
		columns: usize,
	},
}

/// Structured validation error: either a flat list of messages or a nested
/// name-to-error mapping mirroring the shape of the input data.
///
/// # Examples
///
/// ```
/// use grappelli::error::ValidationError;
///
/// let err = ValidationError::message("This field is required.");
/// assert_eq!(err.messages(), vec!["This field is required."]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
	/// A flat list of error messages.
	Messages(Vec<String>),
	/// Errors keyed by field name (or list index for sequences).
	Fields(IndexMap<String, ValidationError>),
}

impl ValidationError {
	/// Single-message error.
	pub fn message(msg: impl Into<String>) -> Self {
		ValidationError::Messages(vec![msg.into()])
	}

	/// Error from a prepared field map.
	pub fn fields(map: IndexMap<String, ValidationError>) -> Self {
		ValidationError::Fields(map)
	}

	/// Flat messages of this node; empty for nested maps.
	pub fn messages(&self) -> Vec<String> {
		match self {
			ValidationError::Messages(msgs) => msgs.clone(),
			ValidationError::Fields(_) => vec![],
		}
	}

	/// The nested error for `field`, if this is a field map containing it.
	pub fn field(&self, name: &str) -> Option<&ValidationError> {
		match self {
			ValidationError::Fields(map) => map.get(name),
			ValidationError::Messages(_) => None,
		}
	}

	/// True when no message and no field entry is present.
	pub fn is_empty(&self) -> bool {
		match self {
			ValidationError::Messages(msgs) => msgs.is_empty(),
			ValidationError::Fields(map) => map.is_empty(),
		}
	}
}

impl std::fmt::Display for ValidationError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ValidationError::Messages(msgs) => write!(f, "{}", msgs.join(" ")),
			ValidationError::Fields(map) => {
				let parts: Vec<String> =
					map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
				write!(f, "{}", parts.join("; "))
			}
		}
	}
}

impl std::error::Error for ValidationError {}

/// Accumulates per-field errors during a nested apply pass.
///
/// One bad field does not abort the walk; every writable field gets a chance
/// to report. A structured [`ValidationError::Fields`] is merged in verbatim
/// as the payload for its scope, while plain messages append to a list keyed
/// by the field name.
#[derive(Debug, Default)]
pub struct ErrorCollector {
	errors: IndexMap<String, ValidationError>,
}

impl ErrorCollector {
	/// Empty collector.
	pub fn new() -> Self {
		Self::default()
	}

	/// Record `error` under `field`.
	pub fn insert(&mut self, field: &str, error: ValidationError) {
		match error {
			nested @ ValidationError::Fields(_) => {
				self.errors.insert(field.to_string(), nested);
			}
			ValidationError::Messages(msgs) => {
				match self
					.errors
					.entry(field.to_string())
					.or_insert_with(|| ValidationError::Messages(vec![]))
				{
					ValidationError::Messages(existing) => existing.extend(msgs),
					// A structured entry already claimed the scope; keep it.
					ValidationError::Fields(_) => {}
				}
			}
		}
	}

	/// True when nothing was recorded.
	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	/// Finish the pass: `Ok(())` when clean, the aggregated error otherwise.
	pub fn into_result(self) -> Result<(), ValidationError> {
		if self.errors.is_empty() {
			Ok(())
		} else {
			Err(ValidationError::Fields(self.errors))
		}
	}
}
