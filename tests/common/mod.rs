//! Shared test fixtures: an Owner / Vehicle / Option entity graph with an
//! engine composite, mirroring a small dealership mapping.

use std::sync::Arc;

use grappelli::meta::{
	ColumnDescriptor, CompositeDef, EntityDef, EnumDef, MetaRegistry, RelationshipDef, SqlType,
};
use grappelli::schema::{SchemaBuilder, SchemaOpts};
use grappelli::session::{AttrValue, Instance, MemorySession};
use serde_json::{Value, json};

pub fn vehicle_type() -> EnumDef {
	EnumDef::new("VehicleType", [("bus", json!(1)), ("car", json!(2))])
}

pub const COLORS: [&str; 4] = ["red", "green", "blue", "silver"];

pub fn registry() -> Arc<MetaRegistry> {
	let registry = MetaRegistry::new();

	registry.register(
		EntityDef::new("Owner")
			.primary_key(
				"id",
				ColumnDescriptor::new(SqlType::Integer).autoincrement(),
			)
			.column("name", ColumnDescriptor::new(SqlType::string()))
			.relationship(RelationshipDef::to_many("vehicles", "Vehicle").with_backref("owner")),
	);

	registry.register(
		EntityDef::new("Vehicle")
			.primary_key(
				"id",
				ColumnDescriptor::new(SqlType::Integer)
					.autoincrement()
					.with_doc("The primary key"),
			)
			.column(
				"name",
				ColumnDescriptor::new(SqlType::string()).with_doc("The name of the vehicle"),
			)
			.column(
				"type",
				ColumnDescriptor::new(SqlType::enum_class(vehicle_type())).not_null(),
			)
			.column("created_at", ColumnDescriptor::new(SqlType::DateTime))
			.column("paint", ColumnDescriptor::new(SqlType::enum_values(COLORS)))
			.column(
				"_engine_cylinders",
				ColumnDescriptor::new(SqlType::BigInteger),
			)
			.column(
				"_engine_displacement",
				ColumnDescriptor::new(SqlType::Numeric {
					precision: Some(10),
					scale: Some(2),
				}),
			)
			.column(
				"_engine_type",
				ColumnDescriptor::new(SqlType::string_with_length(25)),
			)
			.column(
				"_engine_fuel_type",
				ColumnDescriptor::new(SqlType::string_with_length(10)),
			)
			.column("_owner_id", ColumnDescriptor::new(SqlType::Integer))
			.composite(CompositeDef::new(
				"engine",
				"Engine",
				["cylinders", "displacement", "type_", "fuel_type"],
				[
					"_engine_cylinders",
					"_engine_displacement",
					"_engine_type",
					"_engine_fuel_type",
				],
			))
			.relationship(
				RelationshipDef::to_one("owner", "Owner")
					.with_foreign_keys(["_owner_id"])
					.with_backref("vehicles"),
			)
			.relationship(RelationshipDef::to_many("options", "Option").with_backref("vehicle"))
			.attribute("lower_name"),
	);

	registry.register(
		EntityDef::new("Option")
			.primary_key(
				"id",
				ColumnDescriptor::new(SqlType::Integer).autoincrement(),
			)
			.column("name", ColumnDescriptor::new(SqlType::string()))
			.column("_vehicle_id", ColumnDescriptor::new(SqlType::Integer))
			.relationship(
				RelationshipDef::to_one("vehicle", "Vehicle")
					.with_foreign_keys(["_vehicle_id"])
					.with_backref("options"),
			),
	);

	Arc::new(registry)
}

pub fn builder(
	registry: &Arc<MetaRegistry>,
	session: &Arc<MemorySession>,
) -> SchemaBuilder {
	SchemaBuilder::new(registry.clone(), session.clone() as Arc<dyn grappelli::Session>)
}

pub fn vehicle_opts() -> SchemaOpts {
	SchemaOpts::new("Vehicle").with_all_fields()
}

pub fn seed_owner(session: &MemorySession, name: &str) -> Instance {
	let owner = Instance::new("Owner");
	owner.set("name", AttrValue::Scalar(Value::String(name.to_string())));
	session.seed(owner)
}

pub fn seed_option(session: &MemorySession, name: &str) -> Instance {
	let option = Instance::new("Option");
	option.set("name", AttrValue::Scalar(Value::String(name.to_string())));
	session.seed(option)
}
