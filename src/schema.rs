//! Schema assembly.
//!
//! [`SchemaBuilder`] turns cached entity metadata into a [`ModelSchema`]: an
//! ordered tree of field descriptors, with relationships and composites
//! recursing into sub-schemas. Schemas are assembled per request and are
//! plain values; nothing here synthesizes types.
//!
//! Validation (`to_internal`) and representation (`to_representation`) of a
//! whole record live on the schema; the persistence walk lives in
//! [`crate::save`].

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::error::{SchemaError, ValidationError};
use crate::field_mapping::field_type_for;
use crate::fields::{Field, FieldKind, FieldKwargs};
use crate::meta::{
	ColumnInfo, CompositeInfo, MetaRegistry, ModelInfo, RelationDirection, RelationshipInfo,
	SqlType,
};
use crate::session::{AttrValue, Instance, Session};

/// Maximum supported nesting depth.
pub const MAX_DEPTH: usize = 5;

/// Source value meaning "the whole record" rather than one attribute.
pub const WHOLE_RECORD: &str = "*";

/// A custom setter callback: `(instance, source attribute, value)`.
pub type Setter = Arc<dyn Fn(&Instance, &str, AttrValue) -> Result<(), ValidationError> + Send + Sync>;

/// Registered custom setters, keyed by field name.
///
/// Replaces convention-based `set_<field>` reflection with an explicit
/// table supplied through [`SchemaOpts::with_setter`].
#[derive(Clone, Default)]
pub struct SetterMap(HashMap<String, Setter>);

impl SetterMap {
	pub fn insert(&mut self, field: impl Into<String>, setter: Setter) {
		self.0.insert(field.into(), setter);
	}

	pub fn get(&self, field: &str) -> Option<&Setter> {
		self.0.get(field)
	}
}

impl std::fmt::Debug for SetterMap {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_set().entries(self.0.keys()).finish()
	}
}

/// Field selection for a schema: an explicit list or the all-fields default.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChoice {
	/// Use the entity's default field set.
	All,
	/// Use exactly these names.
	List(Vec<String>),
}

/// Options a [`ModelSchema`] is assembled from.
///
/// Exactly one of `fields` / `exclude` must be supplied.
#[derive(Clone)]
pub struct SchemaOpts {
	/// Target entity name.
	pub entity: String,
	/// Field selection; mutually exclusive with `exclude`.
	pub fields: Option<FieldChoice>,
	/// Exclusions from the default field set; mutually exclusive with `fields`.
	pub exclude: Option<Vec<String>>,
	/// Nested expansion depth, 0..=5.
	pub depth: usize,
	/// Per-field keyword-argument overrides.
	pub extra_kwargs: HashMap<String, FieldKwargs>,
	/// Names forced read-only (shorthand for a read-only override).
	pub read_only_fields: Vec<String>,
	/// Explicitly declared fields; always win verbatim.
	pub declared_fields: IndexMap<String, SchemaField>,
	/// Name of the synthetic identity-URI field, when configured.
	pub url_field: Option<String>,
	/// Permit creating related instances during reconciliation.
	pub allow_create: bool,
	/// Permit nested updates through this schema.
	pub allow_nested_updates: bool,
	/// Whether a null value is acceptable where this schema is nested.
	pub allow_null: bool,
	/// Relax non-key fields when the payload carries primary-key values.
	pub partial_by_pk: bool,
	/// Registered custom setters.
	pub setters: SetterMap,
}

impl SchemaOpts {
	/// Options for `entity` with no field selection yet.
	pub fn new(entity: impl Into<String>) -> Self {
		Self {
			entity: entity.into(),
			fields: None,
			exclude: None,
			depth: 0,
			extra_kwargs: HashMap::new(),
			read_only_fields: vec![],
			declared_fields: IndexMap::new(),
			url_field: None,
			allow_create: false,
			allow_nested_updates: false,
			allow_null: false,
			partial_by_pk: false,
			setters: SetterMap::default(),
		}
	}

	/// Select the default (all-fields) set.
	pub fn with_all_fields(mut self) -> Self {
		self.fields = Some(FieldChoice::All);
		self
	}

	/// Select an explicit field list.
	pub fn with_fields<I>(mut self, fields: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<String>,
	{
		self.fields = Some(FieldChoice::List(
			fields.into_iter().map(Into::into).collect(),
		));
		self
	}

	/// Exclude names from the default field set.
	pub fn with_exclude<I>(mut self, exclude: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<String>,
	{
		self.exclude = Some(exclude.into_iter().map(Into::into).collect());
		self
	}

	/// Set the nesting depth.
	pub fn with_depth(mut self, depth: usize) -> Self {
		self.depth = depth;
		self
	}

	/// Attach keyword-argument overrides for one field.
	pub fn with_extra_kwargs(mut self, field: impl Into<String>, kwargs: FieldKwargs) -> Self {
		self.extra_kwargs.insert(field.into(), kwargs);
		self
	}

	/// Force the named fields read-only.
	pub fn with_read_only_fields<I>(mut self, fields: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<String>,
	{
		self.read_only_fields = fields.into_iter().map(Into::into).collect();
		self
	}

	/// Declare a field explicitly; it is used verbatim.
	pub fn declare_field(mut self, name: impl Into<String>, field: SchemaField) -> Self {
		self.declared_fields.insert(name.into(), field);
		self
	}

	/// Configure the synthetic identity-URI field.
	pub fn with_url_field(mut self, name: impl Into<String>) -> Self {
		self.url_field = Some(name.into());
		self
	}

	/// Permit creation of new instances during reconciliation.
	pub fn allow_create(mut self) -> Self {
		self.allow_create = true;
		self
	}

	/// Permit nested updates through relationships.
	pub fn allow_nested_updates(mut self) -> Self {
		self.allow_nested_updates = true;
		self
	}

	/// Enable partial-by-primary-key validation.
	pub fn partial_by_pk(mut self) -> Self {
		self.partial_by_pk = true;
		self
	}

	/// Register a custom setter for one field.
	pub fn with_setter(mut self, field: impl Into<String>, setter: Setter) -> Self {
		self.setters.insert(field, setter);
		self
	}

	fn extra_for(&self, name: &str) -> FieldKwargs {
		let mut extra = self.extra_kwargs.get(name).cloned().unwrap_or_default();
		if self.read_only_fields.iter().any(|f| f == name) {
			extra.read_only = Some(true);
		}
		extra
	}
}

/// One field of an assembled schema.
#[derive(Clone)]
pub enum SchemaField {
	/// A primitive field.
	Primitive(Field),
	/// A composite value-object sub-schema.
	Composite(CompositeSchema),
	/// A to-one nested entity sub-schema.
	NestedOne(ModelSchema),
	/// A to-many nested entity sub-schema.
	NestedMany(ModelSchema),
}

impl SchemaField {
	/// Field name within the parent schema.
	pub fn name(&self) -> &str {
		match self {
			SchemaField::Primitive(f) => &f.name,
			SchemaField::Composite(c) => &c.name,
			SchemaField::NestedOne(s) | SchemaField::NestedMany(s) => &s.name,
		}
	}

	/// Source attribute on the parent instance.
	pub fn source(&self) -> &str {
		match self {
			SchemaField::Primitive(f) => &f.source,
			SchemaField::Composite(c) => &c.source,
			SchemaField::NestedOne(s) | SchemaField::NestedMany(s) => &s.source,
		}
	}

	/// Read-only fields are skipped entirely by the apply walk.
	pub fn is_read_only(&self) -> bool {
		match self {
			SchemaField::Primitive(f) => f.read_only,
			SchemaField::Composite(_) => false,
			SchemaField::NestedOne(s) | SchemaField::NestedMany(s) => s.read_only,
		}
	}

	fn is_write_only(&self) -> bool {
		match self {
			SchemaField::Primitive(f) => f.write_only,
			_ => false,
		}
	}

	fn required(&self) -> bool {
		match self {
			SchemaField::Primitive(f) => f.required,
			SchemaField::Composite(_) => false,
			SchemaField::NestedOne(s) | SchemaField::NestedMany(s) => s.required,
		}
	}

	fn default(&self) -> Option<&Value> {
		match self {
			SchemaField::Primitive(f) => f.default.as_ref(),
			_ => None,
		}
	}
}

impl std::fmt::Debug for SchemaField {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SchemaField::Primitive(field) => write!(f, "Primitive({:?})", field.kind),
			SchemaField::Composite(c) => write!(f, "Composite({})", c.class),
			SchemaField::NestedOne(s) => write!(f, "NestedOne({})", s.info.name),
			SchemaField::NestedMany(s) => write!(f, "NestedMany({})", s.info.name),
		}
	}
}

/// A composite sub-schema: per-constituent fields over one value object.
///
/// Always optional, defaults to null, and permits nested updates; composites
/// have no identity of their own besides the owning row.
#[derive(Clone)]
pub struct CompositeSchema {
	/// Field name within the parent schema.
	pub name: String,
	/// Source attribute on the parent instance.
	pub source: String,
	/// Composite value-object class name.
	pub class: String,
	/// The composite's metadata (constituent attribute -> column).
	pub info: CompositeInfo,
	/// Constituent fields, constructor order.
	pub fields: IndexMap<String, Field>,
}

impl std::fmt::Debug for CompositeSchema {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CompositeSchema")
			.field("name", &self.name)
			.field("class", &self.class)
			.field("fields", &self.fields.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl CompositeSchema {
	/// Validate one composite payload.
	pub fn to_internal(&self, raw: &Value) -> Result<Value, ValidationError> {
		if raw.is_null() {
			return Ok(Value::Null);
		}
		let Value::Object(input) = raw else {
			return Err(ValidationError::message(format!(
				"Invalid data. Expected a dictionary, but got {}.",
				json_type(raw)
			)));
		};

		let mut out = Map::new();
		let mut errors: IndexMap<String, ValidationError> = IndexMap::new();
		for (name, field) in &self.fields {
			if field.read_only {
				continue;
			}
			match input.get(name) {
				None => {
					if let Some(default) = &field.default {
						out.insert(field.source.clone(), default.clone());
					} else if field.required {
						errors.insert(
							name.clone(),
							ValidationError::message("This field is required."),
						);
					}
				}
				Some(value) => match field.to_internal(value) {
					Ok(value) => {
						out.insert(field.source.clone(), value);
					}
					Err(err) => {
						errors.insert(name.clone(), err);
					}
				},
			}
		}

		if errors.is_empty() {
			Ok(Value::Object(out))
		} else {
			Err(ValidationError::Fields(errors))
		}
	}

	/// Render one composite value.
	pub fn to_representation(&self, value: Option<&crate::session::CompositeValue>) -> Value {
		match value {
			None => Value::Null,
			Some(composite) => {
				let mut out = Map::new();
				for (name, field) in &self.fields {
					let stored = composite.get(name).cloned().unwrap_or(Value::Null);
					out.insert(name.clone(), field.to_representation(&stored));
				}
				Value::Object(out)
			}
		}
	}
}

/// An assembled schema for one entity and one request shape.
#[derive(Clone)]
pub struct ModelSchema {
	/// Field name when nested; the entity name at the root.
	pub name: String,
	/// Source attribute when nested.
	pub source: String,
	/// The entity's cached metadata.
	pub info: Arc<ModelInfo>,
	/// Ordered field map.
	pub fields: IndexMap<String, SchemaField>,
	/// Whether a value is required where this schema is nested.
	pub required: bool,
	/// Whether null is acceptable where this schema is nested.
	pub allow_null: bool,
	/// Whether the whole sub-schema is read-only.
	pub read_only: bool,
	/// Permit creating new instances during reconciliation.
	pub allow_create: bool,
	/// Permit nested updates through this schema.
	pub allow_nested_updates: bool,
	/// Relax non-key fields when the payload carries primary-key values.
	pub partial_by_pk: bool,
	/// Synthetic URI field name, when configured.
	pub url_field: Option<String>,
	/// Registered custom setters.
	pub setters: SetterMap,
	/// The unit of work this schema (and every sub-schema) operates in.
	pub session: Arc<dyn Session>,
	/// Registry the schema was assembled from.
	pub registry: Arc<MetaRegistry>,
}

impl std::fmt::Debug for ModelSchema {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModelSchema")
			.field("entity", &self.info.name)
			.field("fields", &self.fields.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Assembles [`ModelSchema`] values from registry metadata.
pub struct SchemaBuilder {
	registry: Arc<MetaRegistry>,
	session: Arc<dyn Session>,
}

impl SchemaBuilder {
	/// Builder over a registry and a request-scoped unit of work.
	pub fn new(registry: Arc<MetaRegistry>, session: Arc<dyn Session>) -> Self {
		Self { registry, session }
	}

	/// Assemble a schema from options.
	///
	/// # Errors
	///
	/// Any [`SchemaError`]: unknown entity or field, invalid field
	/// selection, out-of-range depth, unresolvable column type.
	pub fn build(&self, opts: &SchemaOpts) -> Result<ModelSchema, SchemaError> {
		self.build_schema(opts, false)
	}

	fn build_schema(&self, opts: &SchemaOpts, nested: bool) -> Result<ModelSchema, SchemaError> {
		if opts.depth > MAX_DEPTH {
			return Err(SchemaError::InvalidDepth(opts.depth));
		}
		let info = self.registry.model_info(&opts.entity)?;
		let field_names = self.field_names(opts, &info)?;
		debug!(entity = %info.name, fields = field_names.len(), "assembling model schema");

		let mut fields = IndexMap::new();
		for name in field_names {
			if let Some(declared) = opts.declared_fields.get(&name) {
				fields.insert(name, declared.clone());
				continue;
			}
			let field = self.build_field(&name, opts, &info, nested)?;
			fields.insert(name, field);
		}

		Ok(ModelSchema {
			name: info.name.clone(),
			source: info.name.clone(),
			info,
			fields,
			required: true,
			allow_null: opts.allow_null,
			read_only: false,
			allow_create: opts.allow_create,
			allow_nested_updates: opts.allow_nested_updates,
			partial_by_pk: opts.partial_by_pk,
			url_field: opts.url_field.clone(),
			setters: opts.setters.clone(),
			session: self.session.clone(),
			registry: self.registry.clone(),
		})
	}

	fn field_names(&self, opts: &SchemaOpts, info: &ModelInfo) -> Result<Vec<String>, SchemaError> {
		if opts.fields.is_some() && opts.exclude.is_some() {
			return Err(SchemaError::FieldsAndExclude(info.name.clone()));
		}

		match (&opts.fields, &opts.exclude) {
			(Some(FieldChoice::List(names)), None) => {
				for declared in opts.declared_fields.keys() {
					if !names.contains(declared) {
						return Err(SchemaError::DeclaredFieldNotIncluded {
							field: declared.clone(),
							entity: info.name.clone(),
						});
					}
				}
				Ok(names.clone())
			}
			(Some(FieldChoice::All), None) => Ok(self.default_field_names(opts, info)),
			(None, Some(excluded)) => {
				let mut names = self.default_field_names(opts, info);
				for name in excluded {
					if !names.contains(name) {
						return Err(SchemaError::UnknownExclude {
							field: name.clone(),
							entity: info.name.clone(),
						});
					}
					names.retain(|n| n != name);
				}
				Ok(names)
			}
			(None, None) => Err(SchemaError::MissingFieldSelection(info.name.clone())),
			(Some(_), Some(_)) => unreachable!("checked above"),
		}
	}

	fn default_field_names(&self, opts: &SchemaOpts, info: &ModelInfo) -> Vec<String> {
		let mut names = info.field_names();
		if let Some(url_field) = &opts.url_field {
			if !names.contains(url_field) {
				names.push(url_field.clone());
			}
		}
		for declared in opts.declared_fields.keys() {
			if !names.contains(declared) {
				names.push(declared.clone());
			}
		}
		names.retain(|n| !n.starts_with('_'));
		names
	}

	fn build_field(
		&self,
		name: &str,
		opts: &SchemaOpts,
		info: &ModelInfo,
		nested: bool,
	) -> Result<SchemaField, SchemaError> {
		let extra = opts.extra_for(name);
		let source = extra.source.clone().unwrap_or_else(|| name.to_string());

		if let Some(pk) = info.primary_keys.get(source.as_str()) {
			return Ok(SchemaField::Primitive(self.build_primary_key_field(
				name, &source, pk, opts, info, nested, &extra,
			)?));
		}
		if let Some(prop) = info.properties.get(source.as_str()) {
			return Ok(SchemaField::Primitive(self.build_standard_field(
				name, &source, prop, info, &extra,
			)?));
		}
		if let Some(rel) = info.relationships.get(source.as_str()) {
			return self.build_nested_field(name, &source, rel, opts, info, &extra);
		}
		if let Some(composite) = info.composites.get(source.as_str()) {
			return Ok(SchemaField::Composite(self.build_composite_field(
				name, &source, composite, info,
			)?));
		}
		if info.has_attribute(&source) {
			return Ok(SchemaField::Primitive(
				Field::new(name, FieldKind::ReadOnly).with_source(source),
			));
		}
		if opts.url_field.as_deref() == Some(name) {
			return Ok(SchemaField::Primitive(self.build_url_field(name, &extra)));
		}

		Err(SchemaError::UnknownField {
			field: name.to_string(),
			entity: info.name.clone(),
		})
	}

	fn build_standard_field(
		&self,
		name: &str,
		source: &str,
		column: &ColumnInfo,
		info: &ModelInfo,
		extra: &FieldKwargs,
	) -> Result<Field, SchemaError> {
		let kind = field_type_for(&info.name, &column.key, &column.column)?;
		let kwargs = column_kwargs(name, column).merge_extra(extra);
		let (kind, kwargs) = finalize_kwargs(kind, kwargs);
		Ok(Field::from_kwargs(name, kind, kwargs).with_source(source))
	}

	fn build_primary_key_field(
		&self,
		name: &str,
		source: &str,
		column: &ColumnInfo,
		opts: &SchemaOpts,
		info: &ModelInfo,
		nested: bool,
		extra: &FieldKwargs,
	) -> Result<Field, SchemaError> {
		let kind = field_type_for(&info.name, &column.key, &column.column)?;
		let mut kwargs = column_kwargs(name, column).merge_extra(extra);

		if nested {
			if opts.allow_create || opts.allow_null {
				// A not-yet-persisted instance has no key yet.
				kwargs.required = Some(false);
			}
		} else if column.column.has_default || column.column.autoincrement {
			kwargs.required = None;
			kwargs.read_only = Some(true);
		}

		let (kind, kwargs) = finalize_kwargs(kind, kwargs);
		Ok(Field::from_kwargs(name, kind, kwargs).with_source(source))
	}

	fn build_composite_field(
		&self,
		name: &str,
		source: &str,
		composite: &CompositeInfo,
		info: &ModelInfo,
	) -> Result<CompositeSchema, SchemaError> {
		let mut fields = IndexMap::new();
		for (attr, column) in &composite.properties {
			let field = self.build_standard_field(attr, attr, column, info, &FieldKwargs::new())?;
			fields.insert(attr.clone(), field);
		}
		Ok(CompositeSchema {
			name: name.to_string(),
			source: source.to_string(),
			class: composite.class.clone(),
			info: composite.clone(),
			fields,
		})
	}

	fn build_nested_field(
		&self,
		name: &str,
		source: &str,
		rel: &RelationshipInfo,
		opts: &SchemaOpts,
		info: &ModelInfo,
		extra: &FieldKwargs,
	) -> Result<SchemaField, SchemaError> {
		let target_info = self.registry.model_info(&rel.target)?;
		let kwargs = relationship_kwargs(rel).merge_extra(extra);

		let mut nested_depth = opts.depth;
		let mut nested_extra: HashMap<String, FieldKwargs> = HashMap::new();

		if kwargs.required == Some(false) {
			for pk in target_info.primary_keys.keys() {
				nested_extra.entry(pk.clone()).or_default().required = Some(false);
			}
		}

		if kwargs.allow_nested_updates == Some(false) {
			// Reference-only lookup: the nested schema becomes a pk-keyed
			// pointer, everything else read-only.
			nested_depth = 0;
			for prop in target_info.properties.keys() {
				let entry = nested_extra.entry(prop.clone()).or_default();
				entry.read_only = Some(true);
				entry.required = None;
			}
		}

		let nested_fields =
			self.nested_relationship_fields(rel, info, &target_info, nested_depth);

		let child_opts = SchemaOpts {
			entity: rel.target.clone(),
			fields: Some(FieldChoice::List(nested_fields)),
			exclude: None,
			depth: nested_depth.saturating_sub(1),
			extra_kwargs: nested_extra,
			read_only_fields: vec![],
			declared_fields: IndexMap::new(),
			url_field: None,
			allow_create: kwargs.allow_create.unwrap_or(false),
			allow_nested_updates: kwargs.allow_nested_updates.unwrap_or(false),
			allow_null: kwargs.allow_null.unwrap_or(false),
			partial_by_pk: false,
			setters: SetterMap::default(),
		};

		let mut nested = self.build_schema(&child_opts, true)?;
		nested.name = name.to_string();
		nested.source = source.to_string();
		nested.required = kwargs.required.unwrap_or(true);
		nested.allow_null = kwargs.allow_null.unwrap_or(false);
		nested.read_only = kwargs.read_only.unwrap_or(false);

		Ok(if rel.uselist {
			SchemaField::NestedMany(nested)
		} else {
			SchemaField::NestedOne(nested)
		})
	}

	/// Field names for a nested relationship schema: the target's keys and
	/// properties, plus composites and relationships while depth remains,
	/// minus back-references and implementation names.
	fn nested_relationship_fields(
		&self,
		rel: &RelationshipInfo,
		parent: &ModelInfo,
		target: &Arc<ModelInfo>,
		depth: usize,
	) -> Vec<String> {
		// Prefer exact inverse identity; fall back to target-class match.
		let mut backrefs: HashSet<&str> = target
			.relationships
			.iter()
			.filter(|(key, inverse)| {
				rel.backref.as_deref() == Some(key.as_str())
					|| inverse.backref.as_deref() == Some(rel.name.as_str())
			})
			.map(|(key, _)| key.as_str())
			.collect();
		if backrefs.is_empty() {
			backrefs = target
				.relationships
				.iter()
				.filter(|(_, inverse)| inverse.target == parent.name)
				.map(|(key, _)| key.as_str())
				.collect();
		}

		let mut names: Vec<String> = target
			.primary_keys
			.keys()
			.chain(target.properties.keys())
			.cloned()
			.collect();
		if depth > 0 {
			names.extend(target.composites.keys().cloned());
			names.extend(target.relationships.keys().cloned());
		}

		names
			.into_iter()
			.filter(|name| !backrefs.contains(name.as_str()) && !name.starts_with('_'))
			.collect()
	}

	fn build_url_field(&self, name: &str, extra: &FieldKwargs) -> Field {
		let kwargs = FieldKwargs {
			read_only: Some(true),
			source: Some(WHOLE_RECORD.to_string()),
			..FieldKwargs::default()
		}
		.merge_extra(extra);
		Field::from_kwargs(name, FieldKind::Uri, kwargs)
	}
}

/// Base kwargs computed from a column.
fn column_kwargs(field_name: &str, column: &ColumnInfo) -> FieldKwargs {
	let mut kwargs = FieldKwargs::new();
	kwargs.required = Some(!column.column.nullable);
	kwargs.allow_null = Some(column.column.nullable);
	kwargs.label = Some(pretty_label(field_name));
	kwargs.help_text = column.column.doc.clone();
	kwargs.max_length = column.column.max_length();
	let (precision, scale) = column.column.precision_scale();
	kwargs.max_digits = precision;
	kwargs.decimal_places = scale;
	if let SqlType::Enum {
		class: None,
		values,
	} = &column.column.sql_type
	{
		if !values.is_empty() {
			kwargs.choices = Some(values.iter().map(|v| Value::String(v.clone())).collect());
		}
	}
	kwargs
}

/// Final kwargs/kind adjustments shared by every primitive field build.
fn finalize_kwargs(kind: FieldKind, mut kwargs: FieldKwargs) -> (FieldKind, FieldKwargs) {
	let kind = if kwargs.choices.is_some() {
		// A fixed choice set coerces the field into the generic choice kind.
		kwargs = kwargs.restrict_to_choice_kwargs();
		FieldKind::Choice
	} else {
		kind
	};

	if !kind.is_textual() {
		kwargs.allow_blank = None;
	}
	if kind.is_boolean() {
		kwargs.allow_null = None;
		kwargs.max_length = None;
	}
	(kind, kwargs)
}

/// Default kwargs for a relationship field.
fn relationship_kwargs(rel: &RelationshipInfo) -> FieldKwargs {
	let mut kwargs = FieldKwargs::new();
	if rel.direction == RelationDirection::OneToMany || rel.nullable {
		kwargs.required = Some(false);
		kwargs.allow_null = Some(true);
	}
	if rel.uselist {
		kwargs.required = Some(false);
	}
	kwargs
}

/// `first_name` -> `First name`.
fn pretty_label(name: &str) -> String {
	let spaced = name.split('_').collect::<Vec<_>>().join(" ");
	let mut chars = spaced.trim().chars();
	match chars.next() {
		Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
		None => String::new(),
	}
}

pub(crate) fn json_type(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "str",
		Value::Array(_) => "list",
		Value::Object(_) => "dict",
	}
}

impl ModelSchema {
	/// Iterate the writable fields (read-only fields are skipped entirely).
	pub fn writable_fields(&self) -> impl Iterator<Item = (&String, &SchemaField)> {
		self.fields.iter().filter(|(_, f)| !f.is_read_only())
	}

	/// Whether every primary-key value is present and non-null in `input`.
	pub fn pks_present(&self, input: &Map<String, Value>) -> bool {
		!self.info.primary_keys.is_empty()
			&& self
				.info
				.primary_keys
				.keys()
				.all(|pk| input.get(pk).is_some_and(|v| !v.is_null()))
	}

	/// Validate one raw payload into the schema's internal shape, keyed by
	/// field source.
	///
	/// Per-field failures aggregate into one [`ValidationError::Fields`];
	/// validation never stops at the first bad field.
	pub fn to_internal(&self, raw: &Value) -> Result<Value, ValidationError> {
		let Value::Object(input) = raw else {
			return Err(ValidationError::message(format!(
				"Invalid data. Expected a dictionary, but got {}.",
				json_type(raw)
			)));
		};

		// Partial-by-pk: a payload keyed by identity relaxes everything
		// else and never picks up computed defaults.
		let partial = self.partial_by_pk && self.pks_present(input);

		let mut out = Map::new();
		let mut errors: IndexMap<String, ValidationError> = IndexMap::new();

		for (name, field) in &self.fields {
			if field.is_read_only() {
				// A partial-by-pk payload carries its identity through
				// validation even where the key field is read-only.
				let pk_in_partial = partial
					&& self.info.primary_keys.contains_key(field.source())
					&& input.contains_key(name);
				if !pk_in_partial {
					continue;
				}
			}
			let source = field.source().to_string();
			match input.get(name) {
				None => {
					if partial {
						continue;
					}
					if let Some(default) = field.default() {
						out.insert(source, default.clone());
					} else if field.required() {
						errors.insert(
							name.clone(),
							ValidationError::message("This field is required."),
						);
					}
				}
				Some(value) => {
					let result = match field {
						SchemaField::Primitive(f) => f.to_internal(value),
						SchemaField::Composite(c) => c.to_internal(value),
						SchemaField::NestedOne(s) => s.nested_to_internal(value),
						SchemaField::NestedMany(s) => s.many_to_internal(value),
					};
					match result {
						Ok(value) => {
							out.insert(source, value);
						}
						Err(err) => {
							errors.insert(name.clone(), err);
						}
					}
				}
			}
		}

		if errors.is_empty() {
			Ok(Value::Object(out))
		} else {
			Err(ValidationError::Fields(errors))
		}
	}

	fn nested_to_internal(&self, raw: &Value) -> Result<Value, ValidationError> {
		if raw.is_null() {
			if self.allow_null {
				return Ok(Value::Null);
			}
			return Err(ValidationError::message("This field may not be null."));
		}
		self.to_internal(raw)
	}

	fn many_to_internal(&self, raw: &Value) -> Result<Value, ValidationError> {
		let Value::Array(items) = raw else {
			return Err(ValidationError::message(format!(
				"Expected a list of items but got type \"{}\".",
				json_type(raw)
			)));
		};

		let mut out = Vec::with_capacity(items.len());
		let mut errors: IndexMap<String, ValidationError> = IndexMap::new();
		for (index, item) in items.iter().enumerate() {
			match self.to_internal(item) {
				Ok(value) => out.push(value),
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

	/// Render one instance.
	pub fn to_representation(&self, instance: &Instance) -> Value {
		let mut out = Map::new();
		for (name, field) in &self.fields {
			if field.is_write_only() {
				continue;
			}
			match field {
				SchemaField::Primitive(f) => match f.kind {
					FieldKind::Skip => continue,
					FieldKind::Uri => {
						out.insert(name.clone(), self.uri_for(instance));
					}
					_ => {
						let stored = instance.scalar(&f.source).unwrap_or(Value::Null);
						out.insert(name.clone(), f.to_representation(&stored));
					}
				},
				SchemaField::Composite(c) => {
					let stored = instance.composite(&c.source);
					out.insert(name.clone(), c.to_representation(stored.as_ref()));
				}
				SchemaField::NestedOne(s) => {
					let rendered = match instance.related_one(&s.source) {
						Some(child) => s.to_representation(&child),
						None => Value::Null,
					};
					out.insert(name.clone(), rendered);
				}
				SchemaField::NestedMany(s) => {
					let items: Vec<Value> = instance
						.related_many(&s.source)
						.iter()
						.map(|child| s.to_representation(child))
						.collect();
					out.insert(name.clone(), Value::Array(items));
				}
			}
		}
		Value::Object(out)
	}

	/// The identity URI for `instance`, or null while any key is unset.
	pub fn uri_for(&self, instance: &Instance) -> Value {
		let mut pks = Vec::new();
		for pk in self.info.primary_keys.keys() {
			match instance.scalar(pk) {
				Some(value) if !value.is_null() => pks.push(stringify_pk(&value)),
				_ => return Value::Null,
			}
		}
		Value::String(format!(
			"/{}s/{}",
			self.info.name.to_lowercase(),
			pks.join("/")
		))
	}
}

fn stringify_pk(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}
