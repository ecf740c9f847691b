//! Schemas: the attribute layout of a stored entity type.
//!
//! A [`Schema`] lists the attributes of an entity, its primary key, its secondary indexes and,
//! for polymorphic tables, its discriminator tag. Subtypes inherit everything from their parent
//! and share its table.

/// Secondary index declarations.
pub mod index;

/// Registry of schemas, discriminator resolution and merged table definitions.
pub mod registry;

use crate::{
    attribute::{Attribute, AttributeType, KeyRole, Role},
    common::path::{Path, PathSegment},
    error::{Error, Result},
};
use index::Index;

use indexmap::IndexMap;

/// Attribute layout of an entity type.
///
/// ```rust
/// use dynamodb_mapper::{attribute::Attribute, schema::Schema};
///
/// let schema = Schema::builder("BankStatement", "statements")
///     .attribute(Attribute::string("user_id").hash_key())
///     .attribute(Attribute::number("balance").default_value(0))
///     .attribute(Attribute::version("version"))
///     .build()
///     .unwrap();
/// assert_eq!(schema.hash_key().name(), "user_id");
/// ```
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    table_name: String,
    attributes: IndexMap<String, Attribute>,
    indexes: Vec<Index>,
    discriminator_value: Option<String>,
    parent: Option<String>,
}

impl Schema {
    /// Start a root schema stored in `table_name`.
    pub fn builder(name: impl Into<String>, table_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Self {
                name: name.into(),
                table_name: table_name.into(),
                attributes: IndexMap::new(),
                indexes: Vec::new(),
                discriminator_value: None,
                parent: None,
            },
        }
    }

    /// Start a subtype inheriting all attributes and indexes of this schema.
    pub fn subtype(&self, name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Self {
                name: name.into(),
                table_name: self.table_name.clone(),
                attributes: self.attributes.clone(),
                indexes: self.indexes.clone(),
                discriminator_value: None,
                parent: Some(self.name.clone()),
            },
        }
    }

    /// Name of the entity type.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table the entity is stored in.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Name of the parent schema, for subtypes.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Discriminator tag identifying this schema.
    pub fn discriminator_value(&self) -> Option<&str> {
        self.discriminator_value.as_deref()
    }

    /// All attributes, inherited ones first.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Attribute by wire name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Secondary indexes, inherited ones first.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Secondary index by name.
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|index| index.name() == name)
    }

    fn key(&self, role: KeyRole) -> Option<&Attribute> {
        self.attributes
            .values()
            .find(|attribute| attribute.key_role() == Some(role))
    }

    /// Partition key attribute.
    pub fn hash_key(&self) -> &Attribute {
        // build() rejects schemas without a hash key
        self.key(KeyRole::Hash)
            .unwrap_or_else(|| unreachable!("schema {} has no hash key", self.name))
    }

    /// Sort key attribute.
    pub fn range_key(&self) -> Option<&Attribute> {
        self.key(KeyRole::Range)
    }

    fn with_role(&self, role: Role) -> Vec<&Attribute> {
        self.attributes
            .values()
            .filter(|attribute| attribute.role() == role)
            .collect()
    }

    /// Optimistic-locking version attribute.
    pub fn version_attribute(&self) -> Option<&Attribute> {
        self.with_role(Role::Version).into_iter().next()
    }

    /// Discriminator attribute.
    pub fn discriminator_attribute(&self) -> Option<&Attribute> {
        self.with_role(Role::Discriminator).into_iter().next()
    }

    /// Descriptor of the attribute a document path points to.
    ///
    /// Returns `None` when the path leaves the typed part of the schema.
    pub fn descriptor_for(&self, path: &Path) -> Option<&Attribute> {
        let mut segments = path.segments().iter();
        let mut current = match segments.next() {
            Some(PathSegment::Name(name)) => self.attributes.get(name)?,
            _ => return None,
        };
        for segment in segments {
            current = match (segment, current.attribute_type()) {
                (PathSegment::Name(name), AttributeType::Map(Some(_))) => current.child(name)?,
                (PathSegment::Index(_), AttributeType::List(Some(_))) => current.element()?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub(crate) fn validate_roles(&self) -> Result<()> {
        for (role, label) in [(Role::Version, "version"), (Role::Discriminator, "discriminator")] {
            let attributes = self.with_role(role);
            if attributes.len() > 1 {
                let names: Vec<_> = attributes.iter().map(|attribute| attribute.name()).collect();
                return Err(Error::Schema(format!(
                    "The schema {} has more than one {label} attribute: {}",
                    self.name,
                    names.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Builder of [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Declare an attribute.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        // redeclaring an inherited attribute replaces it in place
        self.schema
            .attributes
            .insert(attribute.name().to_string(), attribute);
        self
    }

    /// Declare a secondary index.
    pub fn index(mut self, index: Index) -> Self {
        self.schema.indexes.push(index);
        self
    }

    /// Tag written to the discriminator attribute of records of this schema.
    pub fn discriminator_value(mut self, value: impl Into<String>) -> Self {
        self.schema.discriminator_value = Some(value.into());
        self
    }

    /// Validate the key layout and finish the schema.
    pub fn build(self) -> Result<Schema> {
        let schema = self.schema;
        if schema.attributes.is_empty() {
            return Err(Error::Schema(format!(
                "schema {} declares no attributes",
                schema.name
            )));
        }
        for role in [KeyRole::Hash, KeyRole::Range] {
            let keys: Vec<_> = schema
                .attributes
                .values()
                .filter(|attribute| attribute.key_role() == Some(role))
                .collect();
            match (role, keys.len()) {
                (KeyRole::Hash, 0) => {
                    return Err(Error::Schema(format!(
                        "schema {} must declare a hash key",
                        schema.name
                    )));
                }
                (_, 0 | 1) => {}
                _ => {
                    return Err(Error::Schema(format!(
                        "schema {} declares {} {role:?} keys",
                        schema.name,
                        keys.len()
                    )));
                }
            }
            if let Some(key) = keys.first()
                && (key.attribute_type().scalar_type().is_none() || key.is_nullable())
            {
                return Err(Error::Schema(format!(
                    "key attribute {} of schema {} must be a non-null string, number or binary",
                    key.name(),
                    schema.name
                )));
            }
        }
        let mut index_names: Vec<_> = schema.indexes.iter().map(Index::name).collect();
        index_names.sort_unstable();
        if let Some(window) = index_names.windows(2).find(|window| window[0] == window[1]) {
            return Err(Error::Schema(format!(
                "schema {} declares index {} twice",
                schema.name, window[0]
            )));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(schema = %schema.name, table = %schema.table_name, "schema built");
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn statement() -> Schema {
        Schema::builder("BankStatement", "statements")
            .attribute(Attribute::string("user_id").hash_key())
            .attribute(Attribute::number("balance").default_value(0))
            .attribute(Attribute::map_of(
                "address",
                vec![
                    Attribute::string("city"),
                    Attribute::list_of("lines", Attribute::string("line")),
                ],
            ))
            .build()
            .unwrap()
    }

    #[rstest]
    #[case::top_level(Path::new("balance"), Some("balance"))]
    #[case::map_child(Path::new("address").field("city"), Some("city"))]
    #[case::list_element(Path::new("address").field("lines").index(0), Some("line"))]
    #[case::unknown_child(Path::new("address").field("street"), None)]
    #[case::untyped(Path::new("balance").field("cents"), None)]
    fn test_descriptor_for(#[case] path: Path, #[case] expected: Option<&str>) {
        let schema = statement();
        assert_eq!(
            schema.descriptor_for(&path).map(Attribute::name),
            expected
        );
    }

    #[rstest]
    #[case::no_hash_key(
        Schema::builder("Foo", "foo").attribute(Attribute::string("name"))
    )]
    #[case::two_hash_keys(
        Schema::builder("Foo", "foo")
            .attribute(Attribute::string("a").hash_key())
            .attribute(Attribute::string("b").hash_key())
    )]
    #[case::nullable_key(
        Schema::builder("Foo", "foo").attribute(Attribute::string("a").hash_key().nullable())
    )]
    #[case::list_key(
        Schema::builder("Foo", "foo").attribute(Attribute::list("a").hash_key())
    )]
    fn test_build_error(#[case] builder: SchemaBuilder) {
        assert!(matches!(builder.build(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_subtype_inherits() {
        let parent = statement();
        let child = parent
            .subtype("SavingsStatement")
            .attribute(Attribute::number("rate"))
            .build()
            .unwrap();
        assert_eq!(child.table_name(), "statements");
        assert_eq!(child.parent(), Some("BankStatement"));
        assert_eq!(child.hash_key().name(), "user_id");
        assert!(child.attribute("balance").is_some());
        assert!(child.attribute("rate").is_some());
    }

    #[test]
    fn test_validate_roles() {
        let schema = Schema::builder("TestModelC", "models")
            .attribute(Attribute::string("id").hash_key())
            .attribute(Attribute::version("version"))
            .attribute(Attribute::version("version_invalid"))
            .build()
            .unwrap();
        let error = schema.validate_roles().unwrap_err();
        assert_eq!(
            error.to_string(),
            "schema error: The schema TestModelC has more than one version attribute: version, version_invalid"
        );
    }
}
