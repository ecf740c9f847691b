use aws_sdk_dynamodb::{primitives::Blob, types};
use dynamodb_mapper::{
    attribute::{Attribute, value::Value},
    error::Error,
    record::Record,
    schema::{
        Schema,
        index::{Index, Projection},
        registry::Registry,
    },
};
use std::sync::Arc;

fn base() -> Schema {
    Schema::builder("Shape", "shapes")
        .attribute(Attribute::string("id").hash_key())
        .attribute(Attribute::discriminator("cls"))
        .discriminator_value("Shape")
        .build()
        .unwrap()
}

#[test]
fn test_subtype_indexes_are_merged() {
    let base = base();
    let circle = base
        .subtype("Circle")
        .discriminator_value("Circle")
        .attribute(Attribute::number("radius"))
        .index(
            Index::global("by_radius", Attribute::number("radius"))
                .projection(Projection::KeysOnly),
        )
        .build()
        .unwrap();
    let square = base
        .subtype("Square")
        .discriminator_value("Square")
        .attribute(Attribute::string("color"))
        .index(Index::global("by_color", Attribute::string("color")))
        .build()
        .unwrap();
    let mut registry = Registry::new();
    registry.register(base).unwrap();
    registry.register(circle).unwrap();
    registry.register(square).unwrap();

    let definition = registry.table_definition("shapes").unwrap();

    assert_eq!(
        definition.attribute_definitions,
        vec![
            ("id".to_string(), types::ScalarAttributeType::S),
            ("radius".to_string(), types::ScalarAttributeType::N),
            ("color".to_string(), types::ScalarAttributeType::S),
        ]
    );
    let names: Vec<_> = definition
        .global_secondary_indexes
        .iter()
        .map(|index| index.name())
        .collect();
    assert_eq!(names, vec!["by_radius", "by_color"]);
    assert!(definition.local_secondary_indexes.is_empty());
    assert_eq!(definition.sdk_global_secondary_indexes().unwrap().len(), 2);
}

#[test]
fn test_conflicting_attribute_types_are_rejected() {
    let base = base();
    let circle = base
        .subtype("Circle")
        .discriminator_value("Circle")
        .attribute(Attribute::number("size"))
        .build()
        .unwrap();
    let square = base
        .subtype("Square")
        .discriminator_value("Square")
        .attribute(Attribute::string("size"))
        .build()
        .unwrap();
    let mut registry = Registry::new();
    registry.register(base).unwrap();
    registry.register(circle).unwrap();
    registry.register(square).unwrap();

    let error = registry.table_definition("shapes").unwrap_err();

    assert!(matches!(error, Error::Table(_)));
    assert!(
        error
            .to_string()
            .contains("Cannot have two attributes with the same name size")
    );
}

#[test]
fn test_subtypes_of_discriminated_tables_need_a_tag() {
    let base = base();
    let untagged = base.subtype("Triangle").build().unwrap();
    let mut registry = Registry::new();
    let base = registry.register(base).unwrap();

    let error = registry.register(untagged).unwrap_err();

    assert!(matches!(error, Error::Schema(_)));
    assert!(error.to_string().contains("Triangle"));
    assert_eq!(registry.subtype_tags(&base), vec!["Shape".to_string()]);
}

#[test]
fn test_items_decode_into_their_subtype() {
    let base = base();
    let circle = base
        .subtype("Circle")
        .discriminator_value("Circle")
        .attribute(Attribute::number("radius"))
        .build()
        .unwrap();
    let mut registry = Registry::new();
    registry.register(base).unwrap();
    let circle = registry.register(circle).unwrap();

    let record = Record::new(&circle)
        .with("id", "c1")
        .unwrap()
        .with("radius", 3)
        .unwrap();
    let item = record.serialize().unwrap();
    assert_eq!(
        item.get("cls"),
        Some(&types::AttributeValue::S("Circle".to_string()))
    );

    let decoded = registry.decode("shapes", &item).unwrap();
    assert_eq!(decoded.schema().name(), "Circle");
    assert_eq!(decoded.get("radius").and_then(Value::as_i64), Some(3));

    let mut unknown = item.clone();
    unknown.insert("cls".to_string(), types::AttributeValue::S("Hexagon".to_string()));
    assert!(matches!(
        Record::decode(&registry, "shapes", &unknown),
        Err(Error::Schema(_))
    ));
}

#[test]
fn test_binary_attributes_round_trip_in_both_encodings() {
    let schema = Arc::new(
        Schema::builder("Blob", "blobs")
            .attribute(Attribute::string("id").hash_key())
            .attribute(Attribute::binary("legacy").legacy_encoding())
            .attribute(Attribute::binary("canonical"))
            .build()
            .unwrap(),
    );
    let payload = vec![0u8, 159, 146, 150, 255];
    let record = Record::new(&schema)
        .with("id", "b1")
        .unwrap()
        .with("legacy", payload.clone())
        .unwrap()
        .with("canonical", payload.clone())
        .unwrap();

    let item = record.serialize().unwrap();
    assert_eq!(
        item.get("legacy"),
        Some(&types::AttributeValue::B(Blob::new("AJ+Slv8=")))
    );
    assert_eq!(
        item.get("canonical"),
        Some(&types::AttributeValue::B(Blob::new(payload.clone())))
    );

    let decoded = Record::from_item(&schema, &item).unwrap();
    assert_eq!(decoded.get("legacy").and_then(Value::as_binary), Some(payload.as_slice()));
    assert_eq!(decoded.get("canonical").and_then(Value::as_binary), Some(payload.as_slice()));
}

#[test]
fn test_canonical_schema_reads_items_written_with_legacy_encoding() {
    let payload = vec![0u8, 159, 146, 150, 255];
    let legacy = Arc::new(
        Schema::builder("Blob", "blobs")
            .attribute(Attribute::string("id").hash_key())
            .attribute(Attribute::binary("data").legacy_encoding())
            .build()
            .unwrap(),
    );
    let item = Record::new(&legacy)
        .with("id", "b1")
        .unwrap()
        .with("data", payload.clone())
        .unwrap()
        .serialize()
        .unwrap();
    let migrated = Arc::new(
        Schema::builder("Blob", "blobs")
            .attribute(Attribute::string("id").hash_key())
            .attribute(Attribute::binary("data").accept_legacy_encoding())
            .build()
            .unwrap(),
    );
    let strict = Arc::new(
        Schema::builder("Blob", "blobs")
            .attribute(Attribute::string("id").hash_key())
            .attribute(Attribute::binary("data"))
            .build()
            .unwrap(),
    );

    let decoded = Record::from_item(&migrated, &item).unwrap();
    assert_eq!(decoded.get("data").and_then(Value::as_binary), Some(payload.as_slice()));
    let rewritten = decoded.serialize().unwrap();
    assert_eq!(
        rewritten.get("data"),
        Some(&types::AttributeValue::B(Blob::new(payload.clone())))
    );

    let raw = Record::from_item(&strict, &item).unwrap();
    assert_eq!(
        raw.get("data").and_then(Value::as_binary),
        Some(b"AJ+Slv8=".as_slice())
    );
}

#[test]
fn test_json_documents_are_stored_as_maps() {
    let schema = Arc::new(
        Schema::builder("Profile", "profiles")
            .attribute(Attribute::string("id").hash_key())
            .attribute(Attribute::map("settings"))
            .build()
            .unwrap(),
    );
    let settings =
        Value::from_serialize(serde_json::json!({ "theme": "dark", "font_size": 12 })).unwrap();
    let record = Record::new(&schema)
        .with("id", "p1")
        .unwrap()
        .with("settings", settings)
        .unwrap();

    let item = record.serialize().unwrap();
    let Some(types::AttributeValue::M(stored)) = item.get("settings") else {
        panic!("expected a map");
    };
    assert_eq!(
        stored.get("theme"),
        Some(&types::AttributeValue::S("dark".to_string()))
    );
    assert_eq!(
        stored.get("font_size"),
        Some(&types::AttributeValue::N("12".to_string()))
    );

    let decoded = Record::from_item(&schema, &item).unwrap();
    let json: serde_json::Value = decoded
        .get("settings")
        .cloned()
        .unwrap()
        .deserialize_into()
        .unwrap();
    assert_eq!(json["theme"], "dark");
}
