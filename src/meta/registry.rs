//! The metadata registry: an explicit, injectable cache of introspected
//! entity metadata.
//!
//! Schema assembly happens per request and must not re-walk the mapping each
//! time, so [`MetaRegistry::model_info`] introspects once per entity and
//! returns the same shared [`ModelInfo`] thereafter. The cache is guarded by
//! a lock; a concurrent first access may race to introspect, but the first
//! published value wins and introspection is idempotent.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::info::ModelInfo;
use super::mapping::EntityDef;
use crate::error::SchemaError;

/// Registry of entity mappings and their cached introspection results.
#[derive(Debug, Default)]
pub struct MetaRegistry {
	defs: RwLock<HashMap<String, EntityDef>>,
	cache: RwLock<HashMap<String, Arc<ModelInfo>>>,
}

impl MetaRegistry {
	/// Empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an entity mapping. Re-registering a name replaces the
	/// mapping and drops its cached introspection.
	pub fn register(&self, def: EntityDef) {
		let name = def.name.clone();
		self.defs.write().insert(name.clone(), def);
		self.cache.write().remove(&name);
	}

	/// The normalized metadata for `entity`.
	///
	/// Idempotent and identity-stable: repeated calls return the identical
	/// cached `Arc`. An unregistered entity is a fatal configuration error.
	pub fn model_info(&self, entity: &str) -> Result<Arc<ModelInfo>, SchemaError> {
		if let Some(info) = self.cache.read().get(entity) {
			return Ok(info.clone());
		}

		let def = self
			.defs
			.read()
			.get(entity)
			.cloned()
			.ok_or_else(|| SchemaError::UnknownEntity(entity.to_string()))?;
		let info = Arc::new(ModelInfo::from_def(&def)?);

		// First published value wins under a write race.
		let mut cache = self.cache.write();
		Ok(cache.entry(entity.to_string()).or_insert(info).clone())
	}

	/// Names of all registered entities.
	pub fn entity_names(&self) -> Vec<String> {
		self.defs.read().keys().cloned().collect()
	}
}
