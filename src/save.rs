//! The nested reconciliation engine.
//!
//! One top-level save runs Validate -> Resolve -> Apply -> Flush. Resolution
//! matches payloads against persisted instances by primary key; Apply walks
//! the validated tree depth-first over writable fields, catching each field's
//! failure instead of aborting; Flush happens exactly once, at the top level,
//! with autoflush suspended for the duration of Apply so half-built entity
//! graphs never reach the store.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ErrorCollector, ValidationError};
use crate::schema::{CompositeSchema, ModelSchema, SchemaField, WHOLE_RECORD};
use crate::session::{AttrValue, CompositeValue, Instance, no_autoflush};

impl ModelSchema {
	/// Primary-key values extracted from a validated payload, present only
	/// when every key attribute is supplied and non-null.
	pub fn primary_key_values(&self, validated: &Map<String, Value>) -> Option<Vec<Value>> {
		let mut pks = Vec::with_capacity(self.info.primary_keys.len());
		for pk in self.info.primary_keys.keys() {
			match validated.get(pk) {
				Some(value) if !value.is_null() => pks.push(value.clone()),
				_ => return None,
			}
		}
		if pks.is_empty() { None } else { Some(pks) }
	}

	/// Resolve the instance a payload refers to.
	///
	/// - null payload: explicit clear, resolves to `None`.
	/// - primary keys supplied: the instance must exist; not-found is
	///   terminal for the sub-tree and never falls back to creation.
	/// - no keys: the existing instance, a fresh one when creation is
	///   allowed, `None` when null is allowed, otherwise a required error.
	pub fn get_object(
		&self,
		validated: Option<&Value>,
		existing: Option<Instance>,
	) -> Result<Option<Instance>, ValidationError> {
		let data = match validated {
			None => return Ok(None),
			Some(value) if value.is_null() => return Ok(None),
			Some(value) => value.as_object(),
		};
		let data = data.cloned().unwrap_or_default();

		if let Some(pks) = self.primary_key_values(&data) {
			return match self.session.get(&self.info.name, &pks) {
				Some(instance) => Ok(Some(instance)),
				None => Err(ValidationError::message(format!(
					"No instance of `{}` found with primary keys `{}`",
					self.info.name,
					format_pks(&pks)
				))),
			};
		}

		if existing.is_some() {
			return Ok(existing);
		}
		if self.allow_create {
			return Ok(Some(Instance::new(&self.info.name)));
		}
		if self.allow_null {
			return Ok(None);
		}
		Err(ValidationError::message("This field is required."))
	}

	/// Validate `raw` and persist it, updating `instance` when given and
	/// creating otherwise. Flushes once; autoflush stays suspended while the
	/// entity graph is being applied.
	pub fn save(
		&self,
		raw: &Value,
		instance: Option<Instance>,
	) -> Result<Instance, ValidationError> {
		let validated = self.to_internal(raw)?;

		let saved = {
			let _guard = no_autoflush(self.session.as_ref());
			match instance {
				Some(existing) => self.update(existing, &validated)?,
				None => self.create(&validated)?,
			}
		};

		self.perform_flush()?;
		Ok(saved)
	}

	/// Create a fresh instance from validated data and register it with the
	/// unit of work.
	pub fn create(&self, validated: &Value) -> Result<Instance, ValidationError> {
		let instance = self.update(Instance::new(&self.info.name), validated)?;
		self.session.add(instance.clone());
		Ok(instance)
	}

	/// Apply validated data onto `instance`, aggregating per-field errors.
	///
	/// Assignments already applied to in-memory instances are not rolled
	/// back on failure; persistence only happens at flush, which an error
	/// here prevents from being reached.
	pub fn update(
		&self,
		instance: Instance,
		validated: &Value,
	) -> Result<Instance, ValidationError> {
		let mut errors = ErrorCollector::new();
		self.perform_update(&instance, validated, &mut errors);
		errors.into_result()?;
		Ok(instance)
	}

	/// The apply walk: depth-first over writable fields only. Each field's
	/// failure is folded into `errors`; the walk always continues.
	pub fn perform_update(
		&self,
		instance: &Instance,
		validated: &Value,
		errors: &mut ErrorCollector,
	) {
		let Some(data) = validated.as_object() else {
			return;
		};

		for (name, field) in self.writable_fields() {
			let source = field.source().to_string();

			if source == WHOLE_RECORD {
				// Whole-record nested schema: contributes sibling-level
				// fields onto the same row from the same validated tree.
				if let SchemaField::NestedOne(nested) = field {
					nested.perform_update(instance, validated, errors);
				}
				continue;
			}

			if !data.contains_key(&source) {
				continue;
			}
			let value = &data[&source];

			let applied = self.apply_field(instance, field, &source, value, errors);
			match applied {
				Ok(Some(attr)) => {
					if let Err(err) = self.set_attribute(instance, name, &source, attr) {
						errors.insert(name, err);
					}
				}
				Ok(None) => {}
				Err(err) => errors.insert(name, err),
			}
		}
	}

	fn apply_field(
		&self,
		instance: &Instance,
		field: &SchemaField,
		source: &str,
		value: &Value,
		errors: &mut ErrorCollector,
	) -> Result<Option<AttrValue>, ValidationError> {
		match field {
			SchemaField::NestedOne(nested) => {
				let child = instance.related_one(source);
				let resolved = nested.get_object(Some(value), child)?;
				if let Some(obj) = &resolved {
					if nested.allow_nested_updates {
						nested.perform_update(obj, value, errors);
					}
				}
				Ok(Some(AttrValue::One(resolved)))
			}
			SchemaField::NestedMany(nested) => {
				let items = match value {
					Value::Array(items) => items.as_slice(),
					Value::Null => &[],
					_ => return Ok(Some(AttrValue::Many(vec![]))),
				};
				let mut out = Vec::with_capacity(items.len());
				for item in items {
					let resolved = nested.get_object(Some(item), None)?;
					// An item resolving to nothing is dropped, not an
					// error: the payload defines the new child set.
					if let Some(obj) = resolved {
						if nested.allow_create || nested.allow_nested_updates {
							nested.perform_update(&obj, item, errors);
						}
						out.push(obj);
					}
				}
				Ok(Some(AttrValue::Many(out)))
			}
			SchemaField::Composite(composite) => {
				let existing = instance.composite(source);
				let mut object = composite.get_object(value, existing);
				composite.perform_update(&mut object, value);
				Ok(Some(AttrValue::Composite(Some(object))))
			}
			SchemaField::Primitive(_) => Ok(Some(AttrValue::Scalar(value.clone()))),
		}
	}

	fn set_attribute(
		&self,
		instance: &Instance,
		name: &str,
		source: &str,
		value: AttrValue,
	) -> Result<(), ValidationError> {
		if let Some(setter) = self.setters.get(name) {
			setter(instance, source, value)
		} else {
			instance.set(source, value);
			Ok(())
		}
	}

	fn perform_flush(&self) -> Result<(), ValidationError> {
		debug!(entity = %self.info.name, "flushing unit of work");
		self.session
			.flush()
			.map_err(|err| err.into_validation_error())
	}
}

impl CompositeSchema {
	/// Resolve the composite value a payload applies to: the existing value
	/// object when present, otherwise one constructed from the validated
	/// values in constructor-parameter order.
	pub fn get_object(&self, validated: &Value, existing: Option<CompositeValue>) -> CompositeValue {
		if let Some(existing) = existing {
			return existing;
		}
		let data = validated.as_object();
		CompositeValue::new(
			self.class.clone(),
			self.info.properties.keys().map(|attr| {
				let value = data
					.and_then(|map| map.get(attr.as_str()))
					.cloned()
					.unwrap_or(Value::Null);
				(attr.clone(), value)
			}),
		)
	}

	/// Apply validated constituent values onto the value object.
	pub fn perform_update(&self, object: &mut CompositeValue, validated: &Value) {
		let Some(data) = validated.as_object() else {
			return;
		};
		for (name, field) in &self.fields {
			if field.read_only {
				continue;
			}
			if let Some(value) = data.get(&field.source) {
				object.set(name.clone(), value.clone());
			}
		}
	}
}

fn format_pks(pks: &[Value]) -> String {
	pks.iter()
		.map(|value| match value {
			Value::String(s) => s.clone(),
			other => other.to_string(),
		})
		.collect::<Vec<_>>()
		.join(", ")
}
