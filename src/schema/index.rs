use crate::{
    attribute::Attribute,
    error::{Error, Result},
};

use aws_sdk_dynamodb::types;

/// Attributes copied into a secondary index.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Projection {
    /// Every attribute.
    #[default]
    All,
    /// Only table and index keys.
    KeysOnly,
    /// Keys plus the listed attributes.
    Include(Vec<String>),
}

impl From<&Projection> for types::Projection {
    fn from(projection: &Projection) -> Self {
        let (projection_type, non_key_attributes) = match projection {
            Projection::All => (types::ProjectionType::All, None),
            Projection::KeysOnly => (types::ProjectionType::KeysOnly, None),
            Projection::Include(attributes) => {
                (types::ProjectionType::Include, Some(attributes.clone()))
            }
        };
        Self::builder()
            .projection_type(projection_type)
            .set_non_key_attributes(non_key_attributes)
            .build()
    }
}

/// Global or local secondary index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IndexKind {
    /// Global secondary index with its own throughput.
    Global {
        /// Provisioned read capacity units.
        read_capacity_units: Option<i64>,
        /// Provisioned write capacity units.
        write_capacity_units: Option<i64>,
    },
    /// Local secondary index sharing the table partition key.
    Local,
}

/// Secondary index declaration.
///
/// ```rust
/// use dynamodb_mapper::{attribute::Attribute, schema::index::{Index, Projection}};
///
/// let index = Index::global("child_index", Attribute::string("index_key"))
///     .projection(Projection::KeysOnly)
///     .throughput(1, 1);
/// assert_eq!(index.name(), "child_index");
/// ```
#[derive(Clone, Debug)]
pub struct Index {
    name: String,
    kind: IndexKind,
    hash_key: Attribute,
    range_key: Option<Attribute>,
    projection: Projection,
}

impl Index {
    /// Global secondary index partitioned on `hash_key`.
    pub fn global(name: impl Into<String>, hash_key: Attribute) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Global {
                read_capacity_units: None,
                write_capacity_units: None,
            },
            hash_key,
            range_key: None,
            projection: Projection::default(),
        }
    }

    /// Local secondary index on the table partition key, sorted by `range_key`.
    pub fn local(name: impl Into<String>, hash_key: Attribute, range_key: Attribute) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Local,
            hash_key,
            range_key: Some(range_key),
            projection: Projection::default(),
        }
    }

    /// Sort the index by `range_key`.
    pub fn range_key(mut self, range_key: Attribute) -> Self {
        self.range_key = Some(range_key);
        self
    }

    /// Attributes copied into the index.
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Provisioned throughput of a global index. Ignored for local indexes.
    pub fn throughput(mut self, read_capacity_units: i64, write_capacity_units: i64) -> Self {
        if let IndexKind::Global { .. } = self.kind {
            self.kind = IndexKind::Global {
                read_capacity_units: Some(read_capacity_units),
                write_capacity_units: Some(write_capacity_units),
            };
        }
        self
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global or local.
    pub fn kind(&self) -> &IndexKind {
        &self.kind
    }

    /// Partition key of the index.
    pub fn hash_key(&self) -> &Attribute {
        &self.hash_key
    }

    /// Sort key of the index.
    pub fn sort_key(&self) -> Option<&Attribute> {
        self.range_key.as_ref()
    }

    /// Projected attributes.
    pub fn projected(&self) -> &Projection {
        &self.projection
    }

    /// Key attributes with their scalar types.
    pub(crate) fn key_types(&self) -> Result<Vec<(&str, types::ScalarAttributeType)>> {
        let mut keys = Vec::with_capacity(2);
        for key in std::iter::once(&self.hash_key).chain(self.range_key.as_ref()) {
            let scalar_type = key.attribute_type().scalar_type().ok_or_else(|| {
                Error::Table(format!(
                    "key attribute {} of index {} must be a string, number or binary",
                    key.name(),
                    self.name
                ))
            })?;
            keys.push((key.name(), scalar_type));
        }
        Ok(keys)
    }

    /// Whether two declarations describe the same index.
    pub(crate) fn same_definition(&self, other: &Self) -> bool {
        let keys = |index: &Self| {
            std::iter::once(&index.hash_key)
                .chain(index.range_key.as_ref())
                .map(|key| (key.name().to_string(), key.attribute_type().scalar_type()))
                .collect::<Vec<_>>()
        };
        self.name == other.name
            && self.kind == other.kind
            && self.projection == other.projection
            && keys(self) == keys(other)
    }

    fn key_schema(&self) -> Result<Vec<types::KeySchemaElement>> {
        let mut key_schema = vec![key_schema_element(
            self.hash_key.name(),
            types::KeyType::Hash,
        )?];
        if let Some(range_key) = &self.range_key {
            key_schema.push(key_schema_element(range_key.name(), types::KeyType::Range)?);
        }
        Ok(key_schema)
    }

    pub(crate) fn to_global(&self) -> Result<types::GlobalSecondaryIndex> {
        let provisioned_throughput = match self.kind {
            IndexKind::Global {
                read_capacity_units: Some(read_capacity_units),
                write_capacity_units: Some(write_capacity_units),
            } => Some(
                types::ProvisionedThroughput::builder()
                    .read_capacity_units(read_capacity_units)
                    .write_capacity_units(write_capacity_units)
                    .build()
                    .map_err(table_error)?,
            ),
            _ => None,
        };
        types::GlobalSecondaryIndex::builder()
            .index_name(&self.name)
            .set_key_schema(Some(self.key_schema()?))
            .projection((&self.projection).into())
            .set_provisioned_throughput(provisioned_throughput)
            .build()
            .map_err(table_error)
    }

    pub(crate) fn to_local(&self) -> Result<types::LocalSecondaryIndex> {
        types::LocalSecondaryIndex::builder()
            .index_name(&self.name)
            .set_key_schema(Some(self.key_schema()?))
            .projection((&self.projection).into())
            .build()
            .map_err(table_error)
    }
}

pub(crate) fn key_schema_element(
    name: &str,
    key_type: types::KeyType,
) -> Result<types::KeySchemaElement> {
    types::KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(table_error)
}

pub(crate) fn table_error(error: aws_sdk_dynamodb::error::BuildError) -> Error {
    Error::Table(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::same(
        Index::global("child_index", Attribute::string("index_key")),
        Index::global("child_index", Attribute::string("index_key").nullable()),
        true
    )]
    #[case::different_type(
        Index::global("child_index", Attribute::string("index_key")),
        Index::global("child_index", Attribute::number("index_key")),
        false
    )]
    #[case::different_projection(
        Index::global("child_index", Attribute::string("index_key")),
        Index::global("child_index", Attribute::string("index_key")).projection(Projection::KeysOnly),
        false
    )]
    fn test_same_definition(#[case] left: Index, #[case] right: Index, #[case] expected: bool) {
        assert_eq!(left.same_definition(&right), expected);
    }

    #[test]
    fn test_to_global() {
        let index = Index::global("by_email", Attribute::string("email"))
            .range_key(Attribute::number("created"))
            .projection(Projection::Include(vec!["name".to_string()]))
            .throughput(2, 3);
        let global = index.to_global().unwrap();
        assert_eq!(global.index_name(), "by_email");
        assert_eq!(global.key_schema().len(), 2);
        assert!(global.provisioned_throughput().is_some());
        assert_eq!(
            global
                .projection()
                .and_then(|projection| projection.projection_type()),
            Some(&types::ProjectionType::Include)
        );
    }

    #[test]
    fn test_to_local() {
        let index = Index::local(
            "by_created",
            Attribute::string("user_id"),
            Attribute::number("created"),
        )
        .projection(Projection::KeysOnly);
        let local = index.to_local().unwrap();
        assert_eq!(local.index_name(), "by_created");
        assert_eq!(local.key_schema()[1].attribute_name(), "created");
    }
}
