use crate::{attribute::Attribute, common::Placeholders};

use std::fmt;

/// Step of a document path.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum PathSegment {
    /// Map key or top-level attribute name.
    Name(String),
    /// List position.
    Index(usize),
}

/// Document path to a possibly nested attribute, e.g. `address.lines[0]`.
///
/// Names are always replaced by placeholders when compiled, so reserved words and
/// special characters are safe.
///
/// ```rust
/// use dynamodb_mapper::common::path::Path;
///
/// let path = Path::new("address").field("lines").index(0);
/// assert_eq!(path.to_string(), "address.lines[0]");
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// Path to a top-level attribute.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Name(name.into())],
        }
    }

    /// Descend into a map key.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Name(name.into()));
        self
    }

    /// Descend into a list element.
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    /// Name of the top-level attribute.
    pub fn root(&self) -> &str {
        match self.segments.first() {
            Some(PathSegment::Name(name)) => name,
            _ => "",
        }
    }

    /// All segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether the path names a top-level attribute.
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }

    pub(crate) fn compile(&self, placeholders: &mut Placeholders) -> String {
        let mut expression = String::new();
        for segment in &self.segments {
            match segment {
                PathSegment::Name(name) => {
                    if !expression.is_empty() {
                        expression.push('.');
                    }
                    expression.push_str(&placeholders.name(name));
                }
                PathSegment::Index(index) => {
                    expression.push_str(&format!("[{index}]"));
                }
            }
        }
        expression
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Name(name) if position == 0 => f.write_str(name)?,
                PathSegment::Name(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Path {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&Attribute> for Path {
    fn from(attribute: &Attribute) -> Self {
        Self::new(attribute.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::top_level(Path::new("a"), "#0")]
    #[case::nested(Path::new("a").field("b"), "#0.#1")]
    #[case::list_element(Path::new("a").index(2).field("b"), "#0[2].#1")]
    #[case::repeated_name(Path::new("a").field("a"), "#0.#0")]
    fn test_compile(#[case] path: Path, #[case] expected: &str) {
        let mut placeholders = Placeholders::default();
        assert_eq!(path.compile(&mut placeholders), expected);
    }

    #[test]
    fn test_root() {
        assert_eq!(Path::new("address").field("city").root(), "address");
        assert!(Path::from("id").is_top_level());
    }
}
