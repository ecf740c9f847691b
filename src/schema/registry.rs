use crate::{
    Item,
    error::{Error, Result},
    record::Record,
    schema::{
        Schema,
        index::{Index, IndexKind, key_schema_element, table_error},
    },
};

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use std::sync;

#[derive(Debug)]
struct Table {
    root: String,
    schemas: IndexMap<String, sync::Arc<Schema>>,
    tags: IndexMap<String, String>,
}

impl Table {
    fn is_descendant(&self, schema: &Schema, ancestor: &str) -> bool {
        let mut current = Some(schema);
        while let Some(schema) = current {
            if schema.name() == ancestor {
                return true;
            }
            current = schema
                .parent()
                .and_then(|parent| self.schemas.get(parent))
                .map(sync::Arc::as_ref);
        }
        false
    }
}

/// Registry of the schemas stored in each table.
///
/// Owned by the caller and handed to the mapper; there is no global registry.
///
/// ```rust
/// use dynamodb_mapper::{attribute::Attribute, schema::{Schema, registry::Registry}};
///
/// let parent = Schema::builder("Parent", "family")
///     .attribute(Attribute::string("id").hash_key())
///     .attribute(Attribute::discriminator("cls"))
///     .discriminator_value("Parent")
///     .build()
///     .unwrap();
/// let child = parent.subtype("Child").discriminator_value("Child").build().unwrap();
///
/// let mut registry = Registry::new();
/// registry.register(parent).unwrap();
/// registry.register(child).unwrap();
/// assert_eq!(registry.resolve("family", Some("Child")).unwrap().name(), "Child");
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    tables: IndexMap<String, Table>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema. Parents must be registered before their subtypes.
    pub fn register(&mut self, schema: Schema) -> Result<sync::Arc<Schema>> {
        schema.validate_roles()?;
        if schema.discriminator_value().is_some() && schema.discriminator_attribute().is_none() {
            return Err(Error::Schema(format!(
                "schema {} has a discriminator value but no discriminator attribute",
                schema.name()
            )));
        }
        let schema = sync::Arc::new(schema);
        match schema.parent() {
            Some(parent) => {
                let table = self
                    .tables
                    .get_mut(schema.table_name())
                    .filter(|table| table.schemas.contains_key(parent))
                    .ok_or_else(|| {
                        Error::Schema(format!(
                            "parent schema {parent} of {} is not registered",
                            schema.name()
                        ))
                    })?;
                if table.schemas.contains_key(schema.name()) {
                    return Err(Error::Schema(format!(
                        "schema {} is already registered",
                        schema.name()
                    )));
                }
                if schema.discriminator_attribute().is_some()
                    && schema.discriminator_value().is_none()
                {
                    return Err(Error::Schema(format!(
                        "subtype {} of {parent} needs a discriminator value",
                        schema.name()
                    )));
                }
                if let Some(tag) = schema.discriminator_value() {
                    if let Some(existing) = table.tags.get(tag) {
                        return Err(Error::Schema(format!(
                            "discriminator value {tag} of {} is already used by {existing}",
                            schema.name()
                        )));
                    }
                    table.tags.insert(tag.to_string(), schema.name().to_string());
                }
                table
                    .schemas
                    .insert(schema.name().to_string(), sync::Arc::clone(&schema));
            }
            None => {
                if let Some(table) = self.tables.get(schema.table_name()) {
                    return Err(Error::Schema(format!(
                        "table {} already has the root schema {}",
                        schema.table_name(),
                        table.root
                    )));
                }
                let mut table = Table {
                    root: schema.name().to_string(),
                    schemas: IndexMap::new(),
                    tags: IndexMap::new(),
                };
                if let Some(tag) = schema.discriminator_value() {
                    table.tags.insert(tag.to_string(), schema.name().to_string());
                }
                table
                    .schemas
                    .insert(schema.name().to_string(), sync::Arc::clone(&schema));
                self.tables.insert(schema.table_name().to_string(), table);
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            schema = %schema.name(),
            table = %schema.table_name(),
            tag = ?schema.discriminator_value(),
            "schema registered"
        );
        Ok(schema)
    }

    fn table(&self, table_name: &str) -> Result<&Table> {
        self.tables
            .get(table_name)
            .ok_or_else(|| Error::Schema(format!("no schema is registered for table {table_name}")))
    }

    /// Registered schema by name.
    pub fn schema(&self, table_name: &str, name: &str) -> Option<sync::Arc<Schema>> {
        self.tables
            .get(table_name)
            .and_then(|table| table.schemas.get(name))
            .cloned()
    }

    /// Schema of a stored item: the one registered for `tag`, or the table root without a tag.
    pub fn resolve(&self, table_name: &str, tag: Option<&str>) -> Result<sync::Arc<Schema>> {
        let table = self.table(table_name)?;
        let name = match tag {
            Some(tag) => table.tags.get(tag).ok_or_else(|| {
                Error::Schema(format!(
                    "unknown discriminator value {tag} for table {table_name}"
                ))
            })?,
            None => &table.root,
        };
        table
            .schemas
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Schema(format!("schema {name} is not registered")))
    }

    /// Discriminator tags of `schema` and all its registered descendants.
    pub fn subtype_tags(&self, schema: &Schema) -> Vec<String> {
        let Some(table) = self.tables.get(schema.table_name()) else {
            return schema
                .discriminator_value()
                .map(str::to_string)
                .into_iter()
                .collect();
        };
        table
            .tags
            .iter()
            .filter(|(_, name)| {
                table
                    .schemas
                    .get(name.as_str())
                    .is_some_and(|candidate| table.is_descendant(candidate, schema.name()))
            })
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    /// Decode an item of `table_name` into a record of the schema named by its discriminator.
    pub fn decode(&self, table_name: &str, item: &Item) -> Result<Record> {
        Record::decode(self, table_name, item)
    }

    /// Whether `schema` is a subtype whose reads must be restricted to its own tags.
    pub(crate) fn needs_subtype_filter(&self, schema: &Schema) -> bool {
        schema.discriminator_attribute().is_some()
            && self
                .tables
                .get(schema.table_name())
                .is_some_and(|table| table.root != schema.name())
    }

    /// Table definition merged across every schema registered for `table_name`.
    ///
    /// Indexes declared by several subtypes are merged by name. Two declarations of the same
    /// wire attribute with different types are rejected.
    pub fn table_definition(&self, table_name: &str) -> Result<TableDefinition> {
        let table = self.table(table_name)?;
        let root = self.resolve(table_name, None)?;

        let mut attribute_types: IndexMap<&str, (&str, &'static str)> = IndexMap::new();
        for schema in table.schemas.values() {
            for attribute in schema.attributes() {
                let tag = attribute.attribute_type().tag();
                match attribute_types.get(attribute.name()) {
                    Some((_, existing)) if *existing != tag => {
                        return Err(conflict(attribute.name(), existing, tag));
                    }
                    Some(_) => {}
                    None => {
                        attribute_types.insert(attribute.name(), (schema.name(), tag));
                    }
                }
            }
        }

        let mut indexes: IndexMap<&str, &Index> = IndexMap::new();
        for schema in table.schemas.values() {
            for index in schema.indexes() {
                match indexes.get(index.name()) {
                    Some(existing) if !existing.same_definition(index) => {
                        return Err(Error::Table(format!(
                            "index {} is declared with different definitions",
                            index.name()
                        )));
                    }
                    Some(_) => {}
                    None => {
                        indexes.insert(index.name(), index);
                    }
                }
            }
        }

        let mut attribute_definitions: IndexMap<String, types::ScalarAttributeType> =
            IndexMap::new();
        let mut define = |name: &str, scalar_type: types::ScalarAttributeType| -> Result<()> {
            match attribute_definitions.get(name) {
                Some(existing) if *existing != scalar_type => Err(conflict(
                    name,
                    existing.as_str(),
                    scalar_type.as_str(),
                )),
                Some(_) => Ok(()),
                None => {
                    attribute_definitions.insert(name.to_string(), scalar_type);
                    Ok(())
                }
            }
        };
        let mut key_schema = Vec::with_capacity(2);
        for (key, key_type) in std::iter::once((root.hash_key(), types::KeyType::Hash))
            .chain(root.range_key().map(|key| (key, types::KeyType::Range)))
        {
            let scalar_type = key.attribute_type().scalar_type().ok_or_else(|| {
                Error::Table(format!("key attribute {} has no scalar type", key.name()))
            })?;
            define(key.name(), scalar_type)?;
            key_schema.push((key.name().to_string(), key_type));
        }
        for index in indexes.values() {
            for (name, scalar_type) in index.key_types()? {
                define(name, scalar_type)?;
            }
        }

        let (global, local): (Vec<Index>, Vec<Index>) = indexes
            .into_values()
            .cloned()
            .partition(|index| matches!(index.kind(), IndexKind::Global { .. }));
        Ok(TableDefinition {
            table_name: table_name.to_string(),
            attribute_definitions: attribute_definitions.into_iter().collect(),
            key_schema,
            global_secondary_indexes: global,
            local_secondary_indexes: local,
        })
    }
}

fn conflict(name: &str, existing: &str, other: &str) -> Error {
    Error::Table(format!(
        "Cannot have two attributes with the same name {name} but different types ({existing} and {other})"
    ))
}

/// Key schema and indexes of a table, merged across all of its schemas.
#[derive(Clone, Debug)]
pub struct TableDefinition {
    /// Table name.
    pub table_name: String,
    /// Every key attribute of the table and its indexes.
    pub attribute_definitions: Vec<(String, types::ScalarAttributeType)>,
    /// Primary key.
    pub key_schema: Vec<(String, types::KeyType)>,
    /// Global secondary indexes.
    pub global_secondary_indexes: Vec<Index>,
    /// Local secondary indexes.
    pub local_secondary_indexes: Vec<Index>,
}

impl TableDefinition {
    /// `AttributeDefinitions` of a `CreateTable` request.
    pub fn sdk_attribute_definitions(&self) -> Result<Vec<types::AttributeDefinition>> {
        self.attribute_definitions
            .iter()
            .map(|(name, scalar_type)| {
                types::AttributeDefinition::builder()
                    .attribute_name(name)
                    .attribute_type(scalar_type.clone())
                    .build()
                    .map_err(table_error)
            })
            .collect()
    }

    /// `KeySchema` of a `CreateTable` request.
    pub fn sdk_key_schema(&self) -> Result<Vec<types::KeySchemaElement>> {
        self.key_schema
            .iter()
            .map(|(name, key_type)| key_schema_element(name, key_type.clone()))
            .collect()
    }

    /// `GlobalSecondaryIndexes` of a `CreateTable` request.
    pub fn sdk_global_secondary_indexes(&self) -> Result<Vec<types::GlobalSecondaryIndex>> {
        self.global_secondary_indexes
            .iter()
            .map(Index::to_global)
            .collect()
    }

    /// `LocalSecondaryIndexes` of a `CreateTable` request.
    pub fn sdk_local_secondary_indexes(&self) -> Result<Vec<types::LocalSecondaryIndex>> {
        self.local_secondary_indexes
            .iter()
            .map(Index::to_local)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::attribute::Attribute;

    use rstest::rstest;

    fn parent() -> Schema {
        Schema::builder("ParentModel", "discriminator_index_test")
            .attribute(Attribute::string("hash_key").hash_key())
            .attribute(Attribute::discriminator("cls"))
            .discriminator_value("Parent")
            .build()
            .unwrap()
    }

    fn child(parent: &Schema, name: &str, tag: &str, index: Index) -> Schema {
        parent
            .subtype(name)
            .attribute(Attribute::string("index_key").nullable())
            .index(index)
            .discriminator_value(tag)
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve() {
        let parent = parent();
        let child = child(
            &parent,
            "ChildModel1",
            "Child1",
            Index::global("child_index", Attribute::string("index_key")),
        );
        let mut registry = Registry::new();
        registry.register(parent).unwrap();
        registry.register(child).unwrap();
        let table = "discriminator_index_test";
        assert_eq!(registry.resolve(table, None).unwrap().name(), "ParentModel");
        assert_eq!(
            registry.resolve(table, Some("Child1")).unwrap().name(),
            "ChildModel1"
        );
        assert!(matches!(
            registry.resolve(table, Some("Unknown")),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            registry.resolve("missing", None),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_subtype_tags() {
        let parent = parent();
        let child = child(
            &parent,
            "ChildModel1",
            "Child1",
            Index::global("child_index", Attribute::string("index_key")),
        );
        let grandchild = child
            .subtype("GrandChild")
            .discriminator_value("GrandChild")
            .build()
            .unwrap();
        let mut registry = Registry::new();
        let parent = registry.register(parent).unwrap();
        let child = registry.register(child).unwrap();
        registry.register(grandchild).unwrap();
        assert_eq!(
            registry.subtype_tags(&child),
            vec!["Child1".to_string(), "GrandChild".to_string()]
        );
        assert_eq!(registry.subtype_tags(&parent).len(), 3);
        assert!(registry.needs_subtype_filter(&child));
        assert!(!registry.needs_subtype_filter(&parent));
    }

    #[rstest]
    #[case::duplicate_tag(|parent: &Schema| parent.subtype("Other").discriminator_value("Parent").build().unwrap())]
    #[case::missing_tag(|parent: &Schema| parent.subtype("Untagged").build().unwrap())]
    #[case::unregistered_parent(|_: &Schema| {
        let orphan = Schema::builder("Orphan", "discriminator_index_test")
            .attribute(Attribute::string("hash_key").hash_key())
            .build()
            .unwrap();
        orphan.subtype("Child").build().unwrap()
    })]
    #[case::second_root(|_: &Schema| {
        Schema::builder("Other", "discriminator_index_test")
            .attribute(Attribute::string("hash_key").hash_key())
            .build()
            .unwrap()
    })]
    #[case::two_versions(|parent: &Schema| {
        parent
            .subtype("Versioned")
            .attribute(Attribute::version("version"))
            .attribute(Attribute::version("version_invalid"))
            .build()
            .unwrap()
    })]
    fn test_register_error(#[case] build: fn(&Schema) -> Schema) {
        let parent = parent();
        let schema = build(&parent);
        let mut registry = Registry::new();
        registry.register(parent).unwrap();
        assert!(matches!(registry.register(schema), Err(Error::Schema(_))));
    }

    #[test]
    fn test_table_definition_merges_compatible_indexes() {
        let parent = parent();
        let index = Index::global("child_index", Attribute::string("index_key")).throughput(1, 1);
        let first = child(&parent, "ChildModel1", "Child1", index.clone());
        let second = child(&parent, "ChildModel2", "Child2", index);
        let mut registry = Registry::new();
        registry.register(parent).unwrap();
        registry.register(first).unwrap();
        registry.register(second).unwrap();
        let definition = registry.table_definition("discriminator_index_test").unwrap();
        assert_eq!(
            definition.attribute_definitions,
            vec![
                ("hash_key".to_string(), types::ScalarAttributeType::S),
                ("index_key".to_string(), types::ScalarAttributeType::S),
            ]
        );
        assert_eq!(definition.global_secondary_indexes.len(), 1);
        assert!(definition.local_secondary_indexes.is_empty());
        assert_eq!(definition.sdk_global_secondary_indexes().unwrap().len(), 1);
        assert_eq!(definition.sdk_key_schema().unwrap().len(), 1);
    }

    #[test]
    fn test_table_definition_rejects_incompatible_indexes() {
        let parent = parent();
        let first = child(
            &parent,
            "ChildModel1",
            "Child1",
            Index::global("child_index1", Attribute::string("index_key")),
        );
        let second = child(
            &parent,
            "ChildModel2",
            "Child2",
            Index::global("child_index2", Attribute::number("index_key")),
        );
        let mut registry = Registry::new();
        registry.register(parent).unwrap();
        registry.register(first).unwrap();
        registry.register(second).unwrap();
        let error = registry
            .table_definition("discriminator_index_test")
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "table error: Cannot have two attributes with the same name index_key but different types (S and N)"
        );
    }
}
