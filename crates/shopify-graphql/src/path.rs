//! Dotted path patterns addressing nodes of a JSON response tree.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// One step of a [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object field access.
    Key(String),
    /// Every element of an array, or every value of an object.
    Wildcard,
}

/// Compiled dotted path with literal keys and single-level wildcards.
///
/// `"customers.edges.*.node"` addresses the `node` of every edge. Empty
/// segments (a leading dot, consecutive dots, or the empty string) are
/// dropped, so `""` and `"."` both address the whole tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a dot-separated path.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part == "*" {
                    Segment::Wildcard
                } else {
                    Segment::Key(part.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    /// Pattern addressing the whole tree.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Segments in walk order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` for the empty pattern.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of wildcard segments.
    #[must_use]
    pub fn wildcard_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Wildcard))
            .count()
    }

    /// Copy of this pattern rooted under `key`.
    #[must_use]
    pub fn prefixed(&self, key: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.push(Segment::Key(key.into()));
        segments.extend(self.segments.iter().cloned());
        Self { segments }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for PathPattern {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for PathPattern {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for PathPattern {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}
