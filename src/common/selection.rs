use crate::common::{ExpressionInput, Placeholders, path::Path};

/// Attributes to retrieve, compiled into a projection expression.
///
/// ```rust
/// use dynamodb_mapper::common::{path::Path, selection::Selection};
///
/// let selection = Selection::new(["id", "name"]).path(Path::new("address").field("city"));
/// assert_eq!(selection.paths().len(), 3);
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Selection {
    paths: Vec<Path>,
}

impl Selection {
    /// Select top-level attributes by name.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: names.into_iter().map(|name| Path::new(name)).collect(),
        }
    }

    /// Also select a nested path.
    pub fn path(mut self, path: Path) -> Self {
        self.paths.push(path);
        self
    }

    /// Selected paths.
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub(crate) fn compile(&self, placeholders: &mut Placeholders) -> String {
        self.paths
            .iter()
            .map(|path| path.compile(placeholders))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<&Selection> for ExpressionInput {
    fn from(selection: &Selection) -> Self {
        let mut placeholders = Placeholders::default();
        let expression = selection.compile(&mut placeholders);
        Self::new(expression, &placeholders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use std::collections;

    #[rstest]
    #[case::single(
        Selection::new(["a"]),
        ExpressionInput {
            expression: "#0".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "a".to_string()),
                ]
            ),
            ..Default::default()
        }
    )]
    #[case::multiple(
        Selection::new(["a", "b"]),
        ExpressionInput {
            expression: "#0, #1".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "a".to_string()),
                    ("#1".to_string(), "b".to_string()),
                ]
            ),
            ..Default::default()
        }
    )]
    #[case::nested(
        Selection::new(["a"])
            .path(Path::new("a").field("b"))
            .path(Path::new("c").index(1).field("a")),
        ExpressionInput {
            expression: "#0, #0.#1, #2[1].#0".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "a".to_string()),
                    ("#1".to_string(), "b".to_string()),
                    ("#2".to_string(), "c".to_string()),
                ]
            ),
            ..Default::default()
        }
    )]
    fn test_selection(#[case] selection: Selection, #[case] expected: ExpressionInput) {
        let operation: ExpressionInput = (&selection).into();
        assert_eq!(operation, expected);
    }
}
