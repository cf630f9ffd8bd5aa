//! The expansion overlay.
//!
//! Keeps default representations shallow while letting callers opt into
//! expanding specific nested paths, and guarantees that a field written
//! during the current request is rendered in full so a client always sees
//! what it wrote.
//!
//! Expand paths are `__`-separated relationship-name chains. Every accepted
//! path also becomes an eager-load hint on the query collaborator so
//! expansion never degenerates into per-row lookups.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::ValidationError;
use crate::fields::{Field, FieldKind};
use crate::meta::{MetaRegistry, ModelInfo};
use crate::schema::{ModelSchema, SchemaField};
use crate::session::Instance;

/// Separator for dotted expand paths.
pub const LOOKUP_SEP: &str = "__";

/// Default query parameter carrying expand directives.
pub const EXPAND_PARAM: &str = "expand";

/// A lightweight stand-in for an expandable field, plus the query parameter
/// that controls it.
#[derive(Debug, Clone)]
pub struct ExpandableField {
	/// Rendered instead of the declared field while collapsed. A
	/// [`FieldKind::Skip`] placeholder omits the field entirely.
	pub placeholder: SchemaField,
	/// Query parameter name this field's expansion is requested through.
	pub query_param: String,
}

impl ExpandableField {
	/// Placeholder under the default `expand` parameter.
	pub fn new(placeholder: SchemaField) -> Self {
		Self {
			placeholder,
			query_param: EXPAND_PARAM.to_string(),
		}
	}

	/// A skip placeholder: the field disappears while collapsed.
	pub fn skipped() -> Self {
		Self::new(SchemaField::Primitive(Field::new("", FieldKind::Skip)))
	}

	/// Use a different query parameter.
	pub fn with_query_param(mut self, param: impl Into<String>) -> Self {
		self.query_param = param.into();
		self
	}
}

/// Per-request expansion state consulted at representation time.
#[derive(Debug, Clone, Default)]
pub struct ExpandContext {
	/// Paths explicitly requested via the expand directive.
	pub requested: HashSet<String>,
	/// Paths accepted by a companion query-validation pass.
	pub query_requested: HashSet<String>,
}

impl ExpandContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record an explicitly requested path.
	pub fn request(mut self, path: impl Into<String>) -> Self {
		self.requested.insert(path.into());
		self
	}

	/// Context from validated query values.
	pub fn from_query(values: &[String]) -> Self {
		Self {
			requested: HashSet::new(),
			query_requested: values.iter().cloned().collect(),
		}
	}

	fn wants(&self, path: &str) -> bool {
		self.requested.contains(path) || self.query_requested.contains(path)
	}
}

/// A schema with expandable-field replacements layered on top.
///
/// The registry maps dotted paths (relative to this schema) to placeholder
/// fields; everything else delegates to the wrapped [`ModelSchema`].
pub struct ExpandableSchema {
	/// The underlying schema.
	pub schema: ModelSchema,
	expandable: IndexMap<String, ExpandableField>,
	written: HashSet<String>,
}

impl ExpandableSchema {
	/// Wrap a schema with no expandable fields yet.
	pub fn new(schema: ModelSchema) -> Self {
		Self {
			schema,
			expandable: IndexMap::new(),
			written: HashSet::new(),
		}
	}

	/// Register an expandable replacement for a dotted path.
	pub fn expandable(mut self, path: impl Into<String>, field: ExpandableField) -> Self {
		self.expandable.insert(path.into(), field);
		self
	}

	/// Registered expandable paths grouped by query parameter.
	pub fn expandable_inventory(&self) -> IndexMap<String, Vec<String>> {
		let mut inventory: IndexMap<String, Vec<String>> = IndexMap::new();
		for (path, field) in &self.expandable {
			inventory
				.entry(field.query_param.clone())
				.or_default()
				.push(path.clone());
		}
		inventory
	}

	/// Save through the wrapped schema, remembering which expandable fields
	/// the payload wrote so they render in full for this request.
	pub fn save(
		&mut self,
		raw: &Value,
		instance: Option<Instance>,
	) -> Result<Instance, ValidationError> {
		let saved = self.schema.save(raw, instance)?;
		if let Value::Object(input) = raw {
			for name in input.keys() {
				if self.schema.fields.contains_key(name) {
					self.written.insert(name.clone());
				}
			}
		}
		Ok(saved)
	}

	/// Render an instance, collapsing expandable fields that were neither
	/// requested nor written. With no context at all (documentation
	/// generation), declared defaults render unchanged.
	pub fn to_representation(&self, instance: &Instance, ctx: Option<&ExpandContext>) -> Value {
		represent(
			&self.schema,
			instance,
			"",
			ctx,
			&self.expandable,
			&self.written,
		)
	}

	/// Translate accepted expand paths into eager-load hints on the query.
	///
	/// Each path is walked segment by segment through the relationship
	/// graph; a segment that is not a navigable relationship invalidates
	/// the whole path and contributes nothing.
	pub fn apply_eager_loads<Q: EagerLoading>(&self, paths: &[String], query: &mut Q) {
		for path in paths {
			let segments: Vec<String> = path.split(LOOKUP_SEP).map(str::to_string).collect();
			if relationship_chain_exists(&self.schema.registry, &self.schema.info, &segments) {
				query.add_eager_load(&segments);
			} else {
				debug!(path = %path, "ignoring non-relationship expand path");
			}
		}
	}

	/// Synthesize the query-validation schemas for the expandable
	/// inventory, one per query parameter.
	///
	/// `exclude` removes paths from the inventory; `disallow` restricts the
	/// accepted choices without removing the field itself.
	pub fn query_schemas(
		&self,
		exclude: &[String],
		disallow: &[String],
	) -> IndexMap<String, ExpandQuerySchema> {
		let mut out = IndexMap::new();
		for (param, paths) in self.expandable_inventory() {
			let choices: Vec<String> = paths
				.into_iter()
				.filter(|path| !exclude.contains(path))
				.collect();
			let allowed: Vec<String> = choices
				.iter()
				.filter(|path| !disallow.contains(path))
				.cloned()
				.collect();
			out.insert(
				param.clone(),
				ExpandQuerySchema {
					param,
					choices,
					allowed,
				},
			);
		}
		out
	}
}

impl std::fmt::Debug for ExpandableSchema {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ExpandableSchema")
			.field("entity", &self.schema.info.name)
			.field("expandable", &self.expandable.keys().collect::<Vec<_>>())
			.finish()
	}
}

fn represent(
	schema: &ModelSchema,
	instance: &Instance,
	prefix: &str,
	ctx: Option<&ExpandContext>,
	expandable: &IndexMap<String, ExpandableField>,
	written: &HashSet<String>,
) -> Value {
	let mut out = Map::new();
	for (name, field) in &schema.fields {
		let path = if prefix.is_empty() {
			name.clone()
		} else {
			format!("{prefix}{LOOKUP_SEP}{name}")
		};

		let replacement = expandable.get(&path).and_then(|exp| {
			let expand = match ctx {
				// No context: leave declared defaults alone.
				None => return None,
				Some(ctx) => ctx.wants(&path) || written.contains(&path),
			};
			if expand { None } else { Some(exp) }
		});

		if let Some(exp) = replacement {
			match &exp.placeholder {
				SchemaField::Primitive(f) if matches!(f.kind, FieldKind::Skip) => continue,
				SchemaField::Primitive(f) => {
					let source = if f.source.is_empty() || f.source == "*" {
						name.as_str()
					} else {
						f.source.as_str()
					};
					let stored = match field {
						SchemaField::NestedOne(s) => match instance.related_one(&s.source) {
							Some(child) => child.scalar(source).unwrap_or(Value::Null),
							None => Value::Null,
						},
						_ => instance.scalar(source).unwrap_or(Value::Null),
					};
					out.insert(name.clone(), f.to_representation(&stored));
				}
				other => {
					// A full replacement sub-schema renders as declared.
					out.insert(name.clone(), represent_field(other, instance));
				}
			}
			continue;
		}

		match field {
			SchemaField::NestedOne(s) => {
				let rendered = match instance.related_one(&s.source) {
					Some(child) => represent(s, &child, &path, ctx, expandable, written),
					None => Value::Null,
				};
				out.insert(name.clone(), rendered);
			}
			SchemaField::NestedMany(s) => {
				let items: Vec<Value> = instance
					.related_many(&s.source)
					.iter()
					.map(|child| represent(s, child, &path, ctx, expandable, written))
					.collect();
				out.insert(name.clone(), Value::Array(items));
			}
			_ => {
				if let Value::Object(mut rendered) = render_single(schema, name, field, instance) {
					if let Some(value) = rendered.remove(name.as_str()) {
						out.insert(name.clone(), value);
					}
				}
			}
		}
	}
	Value::Object(out)
}

// Renders one non-nested field through the schema's own representation
// logic, keeping uri/composite/write-only handling in one place.
fn render_single(
	schema: &ModelSchema,
	name: &str,
	field: &SchemaField,
	instance: &Instance,
) -> Value {
	let mut narrowed = schema.clone();
	narrowed.fields = IndexMap::from([(name.to_string(), field.clone())]);
	narrowed.to_representation(instance)
}

fn represent_field(field: &SchemaField, instance: &Instance) -> Value {
	match field {
		SchemaField::Primitive(f) => {
			let stored = instance.scalar(&f.source).unwrap_or(Value::Null);
			f.to_representation(&stored)
		}
		SchemaField::Composite(c) => {
			let stored = instance.composite(&c.source);
			c.to_representation(stored.as_ref())
		}
		SchemaField::NestedOne(s) => match instance.related_one(&s.source) {
			Some(child) => s.to_representation(&child),
			None => Value::Null,
		},
		SchemaField::NestedMany(s) => Value::Array(
			instance
				.related_many(&s.source)
				.iter()
				.map(|child| s.to_representation(child))
				.collect(),
		),
	}
}

/// Query collaborator accepting relationship-chain eager-load hints.
pub trait EagerLoading {
	/// Add one relationship-traversal chain to eager-load.
	fn add_eager_load(&mut self, path: &[String]);
}

fn relationship_chain_exists(
	registry: &Arc<MetaRegistry>,
	start: &Arc<ModelInfo>,
	segments: &[String],
) -> bool {
	let mut current = start.clone();
	for segment in segments {
		let Some(rel) = current.relationships.get(segment.as_str()) else {
			return false;
		};
		let Ok(next) = registry.model_info(&rel.target) else {
			return false;
		};
		current = next;
	}
	!segments.is_empty()
}

/// The synthesized query-validation schema for one expand parameter: a
/// single repeatable field accepting only the known valid dotted paths.
#[derive(Debug, Clone)]
pub struct ExpandQuerySchema {
	/// Query parameter name.
	pub param: String,
	/// Every registered path (the field's full choice set).
	pub choices: Vec<String>,
	/// Choices currently accepted (choice set minus the disallow list).
	pub allowed: Vec<String>,
}

impl ExpandQuerySchema {
	/// Validate repeated query values into accepted expand paths.
	///
	/// Requesting a child path implicitly requests every ancestor path that
	/// is itself a known choice.
	pub fn validate(&self, values: &[String]) -> Result<Vec<String>, ValidationError> {
		let mut errors: IndexMap<String, ValidationError> = IndexMap::new();
		for (index, value) in values.iter().enumerate() {
			if !self.allowed.contains(value) {
				errors.insert(
					index.to_string(),
					ValidationError::message(format!("\"{value}\" is not a valid choice.")),
				);
			}
		}
		if !errors.is_empty() {
			return Err(ValidationError::Fields(errors));
		}

		let mut accepted: Vec<String> = values.to_vec();
		for value in values {
			let parts: Vec<&str> = value.split(LOOKUP_SEP).collect();
			for end in 1..parts.len() {
				let parent = parts[..end].join(LOOKUP_SEP);
				if self.choices.contains(&parent) && !accepted.contains(&parent) {
					accepted.push(parent);
				}
			}
		}
		Ok(accepted)
	}
}
