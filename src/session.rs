//! The unit-of-work collaborator surface.
//!
//! The reconciliation engine never talks to a persistence backend directly;
//! it consumes a [`Session`]: primary-key lookup, registration of new
//! instances, a single flush, and a scoped autoflush suspension. Entities are
//! [`Instance`] handles: shared, mutable attribute maps with identity
//! semantics, the in-memory stand-in for a mapped row.
//!
//! [`MemorySession`] is the bundled in-memory implementation used by the
//! test-suite and doctests.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::error::{NON_FIELD_ERRORS, ValidationError};
use crate::meta::MetaRegistry;

/// A single attribute slot on an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
	/// A plain column value.
	Scalar(Value),
	/// A composite value object, or an explicit absence of one.
	Composite(Option<CompositeValue>),
	/// A to-one relationship target.
	One(Option<Instance>),
	/// A to-many relationship collection.
	Many(Vec<Instance>),
}

impl AttrValue {
	/// The scalar payload, when this slot holds one.
	pub fn as_scalar(&self) -> Option<&Value> {
		match self {
			AttrValue::Scalar(value) => Some(value),
			_ => None,
		}
	}
}

/// A composite value object: a class name plus its constituent attribute
/// values in constructor order.
///
/// Equality is structural (same class, same constituent values), matching
/// the value-object semantics of the mapped composite.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeValue {
	/// Composite class name.
	pub class: String,
	/// Constituent attribute name -> value, constructor order.
	pub values: IndexMap<String, Value>,
}

impl CompositeValue {
	/// Construct from constituent values in constructor-parameter order.
	pub fn new<I, S>(class: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = (S, Value)>,
		S: Into<String>,
	{
		Self {
			class: class.into(),
			values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
		}
	}

	/// A constituent attribute value.
	pub fn get(&self, attr: &str) -> Option<&Value> {
		self.values.get(attr)
	}

	/// Set a constituent attribute value.
	pub fn set(&mut self, attr: impl Into<String>, value: Value) {
		self.values.insert(attr.into(), value);
	}
}

#[derive(Debug)]
struct InstanceData {
	model: String,
	attrs: IndexMap<String, AttrValue>,
}

/// A shared, mutable entity instance handle.
///
/// Clones share state; equality is identity (two handles are equal when they
/// refer to the same underlying instance), mirroring object identity in the
/// unit of work.
#[derive(Clone)]
pub struct Instance {
	inner: Arc<RwLock<InstanceData>>,
}

impl Instance {
	/// A fresh, unpersisted instance of `model` with no attributes set.
	pub fn new(model: impl Into<String>) -> Self {
		Self {
			inner: Arc::new(RwLock::new(InstanceData {
				model: model.into(),
				attrs: IndexMap::new(),
			})),
		}
	}

	/// The entity name this instance belongs to.
	pub fn model(&self) -> String {
		self.inner.read().model.clone()
	}

	/// Read an attribute slot.
	pub fn get(&self, name: &str) -> Option<AttrValue> {
		self.inner.read().attrs.get(name).cloned()
	}

	/// Write an attribute slot.
	pub fn set(&self, name: impl Into<String>, value: AttrValue) {
		self.inner.write().attrs.insert(name.into(), value);
	}

	/// Read a scalar attribute, `None` when unset or non-scalar.
	pub fn scalar(&self, name: &str) -> Option<Value> {
		match self.get(name) {
			Some(AttrValue::Scalar(value)) => Some(value),
			_ => None,
		}
	}

	/// Read a to-one relationship slot.
	pub fn related_one(&self, name: &str) -> Option<Instance> {
		match self.get(name) {
			Some(AttrValue::One(instance)) => instance,
			_ => None,
		}
	}

	/// Read a to-many relationship slot.
	pub fn related_many(&self, name: &str) -> Vec<Instance> {
		match self.get(name) {
			Some(AttrValue::Many(instances)) => instances,
			_ => vec![],
		}
	}

	/// Read a composite slot.
	pub fn composite(&self, name: &str) -> Option<CompositeValue> {
		match self.get(name) {
			Some(AttrValue::Composite(value)) => value,
			_ => None,
		}
	}

	/// Identity comparison: do both handles refer to the same instance?
	pub fn same_as(&self, other: &Instance) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl PartialEq for Instance {
	fn eq(&self, other: &Self) -> bool {
		self.same_as(other)
	}
}

impl std::fmt::Debug for Instance {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let data = self.inner.read();
		f.debug_struct("Instance")
			.field("model", &data.model)
			.field("attrs", &data.attrs.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// The persistence layer's native validation failure, surfaced at flush.
///
/// Either a bag of messages or a field-keyed map; translated into the
/// request-level [`ValidationError`] shape before it reaches callers.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
	/// Messages not attributed to any field.
	Messages(Vec<String>),
	/// Errors keyed by the store's field names.
	Fields(IndexMap<String, StoreError>),
}

impl StoreError {
	/// Single-message store error.
	pub fn message(msg: impl Into<String>) -> Self {
		StoreError::Messages(vec![msg.into()])
	}

	/// Translate into the request-level error shape.
	///
	/// Field keys are carried over, with the store's whole-record key
	/// (`__all__`) normalized to [`NON_FIELD_ERRORS`]; a bare message list
	/// becomes a map under [`NON_FIELD_ERRORS`].
	pub fn into_validation_error(self) -> ValidationError {
		fn translate(err: StoreError) -> ValidationError {
			match err {
				StoreError::Messages(msgs) => ValidationError::Messages(msgs),
				StoreError::Fields(map) => ValidationError::Fields(
					map.into_iter()
						.map(|(key, value)| {
							let key = if key == "__all__" {
								NON_FIELD_ERRORS.to_string()
							} else {
								key
							};
							(key, translate(value))
						})
						.collect(),
				),
			}
		}

		match self {
			messages @ StoreError::Messages(_) => {
				let mut map = IndexMap::new();
				map.insert(NON_FIELD_ERRORS.to_string(), translate(messages));
				ValidationError::Fields(map)
			}
			fields @ StoreError::Fields(_) => translate(fields),
		}
	}
}

impl std::fmt::Display for StoreError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			StoreError::Messages(msgs) => write!(f, "{}", msgs.join(" ")),
			StoreError::Fields(map) => {
				let parts: Vec<String> =
					map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
				write!(f, "{}", parts.join("; "))
			}
		}
	}
}

impl std::error::Error for StoreError {}

/// The unit-of-work contract the reconciliation engine runs against.
pub trait Session: Send + Sync {
	/// Look up a persisted instance by primary-key values.
	fn get(&self, model: &str, pks: &[Value]) -> Option<Instance>;

	/// Register a new instance with the unit of work.
	fn add(&self, instance: Instance);

	/// Flush pending changes to the backing store.
	fn flush(&self) -> Result<(), StoreError>;

	/// Toggle autoflush. Prefer the [`no_autoflush`] guard over calling
	/// this directly, so resumption is guaranteed.
	fn set_autoflush(&self, enabled: bool);

	/// Current autoflush state.
	fn autoflush(&self) -> bool;
}

/// RAII guard suspending autoflush for the duration of a nested apply.
///
/// Restores the previous state on drop, including on the error path.
pub struct NoAutoflush<'a> {
	session: &'a dyn Session,
	previous: bool,
}

impl Drop for NoAutoflush<'_> {
	fn drop(&mut self) {
		self.session.set_autoflush(self.previous);
	}
}

/// Suspend autoflush until the returned guard is dropped.
pub fn no_autoflush(session: &dyn Session) -> NoAutoflush<'_> {
	let previous = session.autoflush();
	session.set_autoflush(false);
	NoAutoflush { session, previous }
}

/// Validation hook invoked per pending instance at flush time.
pub type FlushCheck = Box<dyn Fn(&Instance) -> Result<(), StoreError> + Send + Sync>;

/// In-memory [`Session`] used by the test-suite and doctests.
///
/// Persisted instances live in per-entity tables keyed by their primary-key
/// scalars; `flush` moves pending instances into the tables, assigning
/// autoincrement keys where missing.
pub struct MemorySession {
	registry: Arc<MetaRegistry>,
	tables: RwLock<IndexMap<String, Vec<Instance>>>,
	pending: RwLock<Vec<Instance>>,
	autoflush: AtomicBool,
	next_id: AtomicI64,
	flush_check: Option<FlushCheck>,
}

impl MemorySession {
	/// Empty session over the given metadata registry.
	pub fn new(registry: Arc<MetaRegistry>) -> Self {
		Self {
			registry,
			tables: RwLock::new(IndexMap::new()),
			pending: RwLock::new(Vec::new()),
			autoflush: AtomicBool::new(true),
			next_id: AtomicI64::new(1),
			flush_check: None,
		}
	}

	/// Install a validation hook run against each pending instance at flush.
	pub fn with_flush_check(mut self, check: FlushCheck) -> Self {
		self.flush_check = Some(check);
		self
	}

	/// Persist an instance directly, bypassing pending state. Test setup
	/// helper; assigns an autoincrement key when the instance has none.
	pub fn seed(&self, instance: Instance) -> Instance {
		self.assign_keys(&instance);
		self.tables
			.write()
			.entry(instance.model())
			.or_default()
			.push(instance.clone());
		instance
	}

	/// Number of persisted instances of `model`.
	pub fn count(&self, model: &str) -> usize {
		self.tables.read().get(model).map(|t| t.len()).unwrap_or(0)
	}

	fn assign_keys(&self, instance: &Instance) {
		let Ok(info) = self.registry.model_info(&instance.model()) else {
			return;
		};
		for (name, column) in &info.primary_keys {
			let missing = matches!(
				instance.scalar(name),
				None | Some(Value::Null)
			);
			if missing && column.column.autoincrement {
				let id = self.next_id.fetch_add(1, Ordering::SeqCst);
				instance.set(name.clone(), AttrValue::Scalar(Value::from(id)));
			}
		}
	}

	fn pk_values(&self, instance: &Instance) -> Vec<Value> {
		let Ok(info) = self.registry.model_info(&instance.model()) else {
			return vec![];
		};
		info.primary_keys
			.keys()
			.map(|name| instance.scalar(name).unwrap_or(Value::Null))
			.collect()
	}
}

impl Session for MemorySession {
	fn get(&self, model: &str, pks: &[Value]) -> Option<Instance> {
		self.tables
			.read()
			.get(model)?
			.iter()
			.find(|instance| self.pk_values(instance) == pks)
			.cloned()
	}

	fn add(&self, instance: Instance) {
		self.pending.write().push(instance);
	}

	fn flush(&self) -> Result<(), StoreError> {
		let pending: Vec<Instance> = self.pending.write().drain(..).collect();

		if let Some(check) = &self.flush_check {
			for instance in &pending {
				check(instance)?;
			}
		}

		for instance in pending {
			self.assign_keys(&instance);
			self.tables
				.write()
				.entry(instance.model())
				.or_default()
				.push(instance);
		}
		Ok(())
	}

	fn set_autoflush(&self, enabled: bool) {
		self.autoflush.store(enabled, Ordering::SeqCst);
	}

	fn autoflush(&self) -> bool {
		self.autoflush.load(Ordering::SeqCst)
	}
}
