//! Schema assembly against the dealership fixture graph.

mod common;

use std::sync::Arc;

use common::{builder, registry, vehicle_opts};
use grappelli::error::SchemaError;
use grappelli::fields::{Field, FieldKind, FieldKwargs};
use grappelli::schema::{SchemaField, SchemaOpts};
use grappelli::session::MemorySession;

fn setup() -> (Arc<grappelli::MetaRegistry>, Arc<MemorySession>) {
	let registry = registry();
	let session = Arc::new(MemorySession::new(registry.clone()));
	(registry, session)
}

#[test]
fn test_all_fields_default_set() {
	let (registry, session) = setup();
	let schema = builder(&registry, &session).build(&vehicle_opts()).unwrap();

	let names: Vec<&str> = schema.fields.keys().map(|k| k.as_str()).collect();
	assert_eq!(
		names,
		vec!["id", "name", "type", "created_at", "paint", "engine", "owner", "options"]
	);
}

#[test]
fn test_schema_build_is_idempotent() {
	let (registry, session) = setup();
	let b = builder(&registry, &session);
	let first = b.build(&vehicle_opts()).unwrap();
	let second = b.build(&vehicle_opts()).unwrap();

	let first_names: Vec<&String> = first.fields.keys().collect();
	let second_names: Vec<&String> = second.fields.keys().collect();
	assert_eq!(first_names, second_names);
}

#[test]
fn test_autoincrement_primary_key_is_read_only() {
	let (registry, session) = setup();
	let schema = builder(&registry, &session).build(&vehicle_opts()).unwrap();

	let SchemaField::Primitive(id) = &schema.fields["id"] else {
		panic!("id should be a primitive field");
	};
	assert!(id.read_only);
	assert!(!id.required);
	assert_eq!(id.help_text.as_deref(), Some("The primary key"));
}

#[test]
fn test_enum_column_with_class_builds_enum_field() {
	let (registry, session) = setup();
	let schema = builder(&registry, &session).build(&vehicle_opts()).unwrap();

	let SchemaField::Primitive(type_field) = &schema.fields["type"] else {
		panic!("type should be a primitive field");
	};
	assert!(matches!(type_field.kind, FieldKind::Enum(_)));
	assert!(type_field.required);
}

#[test]
fn test_raw_enum_column_builds_choice_field() {
	let (registry, session) = setup();
	let schema = builder(&registry, &session).build(&vehicle_opts()).unwrap();

	let SchemaField::Primitive(paint) = &schema.fields["paint"] else {
		panic!("paint should be a primitive field");
	};
	assert_eq!(paint.kind, FieldKind::Choice);
	let choices = paint.choices.as_ref().unwrap();
	assert_eq!(choices.len(), common::COLORS.len());
	assert!(!paint.required);
}

#[test]
fn test_composite_sub_schema_constituents() {
	let (registry, session) = setup();
	let schema = builder(&registry, &session).build(&vehicle_opts()).unwrap();

	let SchemaField::Composite(engine) = &schema.fields["engine"] else {
		panic!("engine should be a composite sub-schema");
	};
	assert_eq!(engine.class, "Engine");
	let attrs: Vec<&str> = engine.fields.keys().map(|k| k.as_str()).collect();
	assert_eq!(attrs, vec!["cylinders", "displacement", "type_", "fuel_type"]);

	let displacement = &engine.fields["displacement"];
	assert_eq!(displacement.kind, FieldKind::Decimal);
	assert_eq!(displacement.max_digits, Some(10));
	assert_eq!(displacement.decimal_places, Some(2));

	let engine_type = &engine.fields["type_"];
	assert_eq!(engine_type.max_length, Some(25));
}

#[test]
fn test_nested_owner_excludes_back_reference() {
	let (registry, session) = setup();
	let schema = builder(&registry, &session)
		.build(&vehicle_opts().with_depth(1))
		.unwrap();

	let SchemaField::NestedOne(owner) = &schema.fields["owner"] else {
		panic!("owner should be a to-one nested schema");
	};
	assert!(
		!owner.fields.contains_key("vehicles"),
		"back-reference must be elided to avoid mutual recursion"
	);
	assert!(owner.fields.contains_key("id"));
	assert!(owner.fields.contains_key("name"));
	assert!(!owner.required);
	assert!(owner.allow_null);
}

#[test]
fn test_nested_primary_key_not_required_when_nullable() {
	let (registry, session) = setup();
	let schema = builder(&registry, &session).build(&vehicle_opts()).unwrap();

	let SchemaField::NestedOne(owner) = &schema.fields["owner"] else {
		panic!("owner should be a to-one nested schema");
	};
	let SchemaField::Primitive(pk) = &owner.fields["id"] else {
		panic!("nested id should be primitive");
	};
	assert!(!pk.required);
	assert!(!pk.read_only);
}

#[test]
fn test_to_many_relationship_builds_nested_many() {
	let (registry, session) = setup();
	let schema = builder(&registry, &session).build(&vehicle_opts()).unwrap();

	let SchemaField::NestedMany(options) = &schema.fields["options"] else {
		panic!("options should be a to-many nested schema");
	};
	assert!(!options.required);
	assert!(!options.fields.contains_key("vehicle"), "back-reference");
}

#[test]
fn test_reference_only_relationship_forces_read_only() {
	let (registry, session) = setup();
	let opts = vehicle_opts().with_extra_kwargs(
		"owner",
		FieldKwargs {
			allow_nested_updates: Some(false),
			..FieldKwargs::default()
		},
	);
	let schema = builder(&registry, &session).build(&opts).unwrap();

	let SchemaField::NestedOne(owner) = &schema.fields["owner"] else {
		panic!("owner should be a to-one nested schema");
	};
	let SchemaField::Primitive(name) = &owner.fields["name"] else {
		panic!("nested name should be primitive");
	};
	assert!(name.read_only);
	let SchemaField::Primitive(pk) = &owner.fields["id"] else {
		panic!("nested id should be primitive");
	};
	assert!(!pk.read_only, "primary keys stay writable for lookup");
}

#[test]
fn test_explicit_field_list_used_verbatim() {
	let (registry, session) = setup();
	let opts = SchemaOpts::new("Vehicle").with_fields(["id", "name", "lower_name"]);
	let schema = builder(&registry, &session).build(&opts).unwrap();

	let names: Vec<&str> = schema.fields.keys().map(|k| k.as_str()).collect();
	assert_eq!(names, vec!["id", "name", "lower_name"]);

	let SchemaField::Primitive(derived) = &schema.fields["lower_name"] else {
		panic!("lower_name should be primitive");
	};
	assert_eq!(derived.kind, FieldKind::ReadOnly);
	assert!(derived.read_only);
}

#[test]
fn test_declared_field_wins_verbatim() {
	let (registry, session) = setup();
	let declared = Field::new("name", FieldKind::Char).read_only();
	let opts = SchemaOpts::new("Vehicle")
		.with_all_fields()
		.declare_field("name", SchemaField::Primitive(declared));
	let schema = builder(&registry, &session).build(&opts).unwrap();

	let SchemaField::Primitive(name) = &schema.fields["name"] else {
		panic!("name should be primitive");
	};
	assert!(name.read_only);
}

#[test]
fn test_read_only_fields_shorthand() {
	let (registry, session) = setup();
	let opts = SchemaOpts::new("Vehicle")
		.with_fields(["type", "name"])
		.with_read_only_fields(["name"]);
	let schema = builder(&registry, &session).build(&opts).unwrap();

	let SchemaField::Primitive(name) = &schema.fields["name"] else {
		panic!("name should be primitive");
	};
	assert!(name.read_only);
	assert!(!name.required);
}

#[test]
fn test_exclude_removes_from_default_set() {
	let (registry, session) = setup();
	let opts = SchemaOpts::new("Vehicle").with_exclude(["paint", "options"]);
	let schema = builder(&registry, &session).build(&opts).unwrap();

	assert!(!schema.fields.contains_key("paint"));
	assert!(!schema.fields.contains_key("options"));
	assert!(schema.fields.contains_key("name"));
}

#[test]
fn test_url_field_renders_identity_uri() {
	let (registry, session) = setup();
	let opts = SchemaOpts::new("Owner").with_all_fields().with_url_field("url");
	let schema = builder(&registry, &session).build(&opts).unwrap();

	assert!(schema.fields.contains_key("url"));

	let owner = common::seed_owner(&session, "Joe");
	let rendered = schema.to_representation(&owner);
	let id = owner.scalar("id").unwrap();
	assert_eq!(
		rendered["url"],
		serde_json::Value::String(format!("/owners/{id}"))
	);

	let unsaved = grappelli::Instance::new("Owner");
	let rendered = schema.to_representation(&unsaved);
	assert!(rendered["url"].is_null(), "unsaved instances have no URI");
}

#[test]
fn test_fields_and_exclude_is_fatal() {
	let (registry, session) = setup();
	let opts = SchemaOpts::new("Vehicle")
		.with_fields(["id"])
		.with_exclude(["name"]);
	assert!(matches!(
		builder(&registry, &session).build(&opts),
		Err(SchemaError::FieldsAndExclude(_))
	));
}

#[test]
fn test_missing_field_selection_is_fatal() {
	let (registry, session) = setup();
	let opts = SchemaOpts::new("Vehicle");
	assert!(matches!(
		builder(&registry, &session).build(&opts),
		Err(SchemaError::MissingFieldSelection(_))
	));
}

#[test]
fn test_excluding_unknown_field_is_fatal() {
	let (registry, session) = setup();
	let opts = SchemaOpts::new("Vehicle").with_exclude(["garage"]);
	assert!(matches!(
		builder(&registry, &session).build(&opts),
		Err(SchemaError::UnknownExclude { field, .. }) if field == "garage"
	));
}

#[test]
fn test_unknown_field_name_is_fatal() {
	let (registry, session) = setup();
	let opts = SchemaOpts::new("Vehicle").with_fields(["id", "garage"]);
	assert!(matches!(
		builder(&registry, &session).build(&opts),
		Err(SchemaError::UnknownField { field, entity }) if field == "garage" && entity == "Vehicle"
	));
}

#[test]
fn test_declared_field_missing_from_fields_is_fatal() {
	let (registry, session) = setup();
	let opts = SchemaOpts::new("Vehicle")
		.with_fields(["id"])
		.declare_field(
			"extra",
			SchemaField::Primitive(Field::new("extra", FieldKind::Char)),
		);
	assert!(matches!(
		builder(&registry, &session).build(&opts),
		Err(SchemaError::DeclaredFieldNotIncluded { field, .. }) if field == "extra"
	));
}

#[test]
fn test_depth_out_of_range_is_fatal() {
	let (registry, session) = setup();
	let opts = vehicle_opts().with_depth(6);
	assert!(matches!(
		builder(&registry, &session).build(&opts),
		Err(SchemaError::InvalidDepth(6))
	));
}

#[test]
fn test_depth_gates_nested_expansion() {
	let (registry, session) = setup();

	// At depth 1 the nested owner carries its own relationships minus the
	// back-reference; Owner has nothing besides `vehicles`, so the field
	// sets match, but the nested-of-nested level must be gone at depth 0.
	let shallow = builder(&registry, &session).build(&vehicle_opts()).unwrap();
	let SchemaField::NestedMany(options) = &shallow.fields["options"] else {
		panic!("options should be nested");
	};
	let names: Vec<&str> = options.fields.keys().map(|k| k.as_str()).collect();
	assert_eq!(names, vec!["id", "name"]);
}
