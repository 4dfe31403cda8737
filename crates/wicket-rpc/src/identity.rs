//! Object identities: the stable `(name, category)` key naming a remote object.

use crate::error::{WicketError, WicketResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Names one remote object. The category groups objects that share a
/// dispatch target; routing by category is how per-session callback
/// traffic finds its session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub category: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// Parse the `category/name` form; a string without `/` is a bare name.
    pub fn parse(s: &str) -> WicketResult<Self> {
        let (category, name) = match s.split_once('/') {
            Some((c, n)) => (c.to_string(), n.to_string()),
            None => (String::new(), s.to_string()),
        };
        if name.is_empty() {
            return Err(WicketError::Other(format!("empty identity name in {s:?}")));
        }
        Ok(Self { name, category })
    }
}

// Category-major ordering keeps all of a session's callback objects
// adjacent in sorted sequences.
impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.category, self.name)
        }
    }
}

impl std::str::FromStr for Identity {
    type Err = WicketError;

    fn from_str(s: &str) -> WicketResult<Self> {
        Identity::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_category() {
        let id = Identity::parse("printers/p1").unwrap();
        assert_eq!(id.category, "printers");
        assert_eq!(id.name, "p1");
        assert_eq!(id.to_string(), "printers/p1");
    }

    #[test]
    fn parse_bare_name() {
        let id = Identity::parse("hello").unwrap();
        assert_eq!(id.category, "");
        assert_eq!(id.name, "hello");
        assert_eq!(id.to_string(), "hello");
    }

    #[test]
    fn empty_name_rejected() {
        assert!(Identity::parse("cat/").is_err());
        assert!(Identity::parse("").is_err());
    }

    #[test]
    fn category_major_order() {
        let a = Identity::new("z", "alpha");
        let b = Identity::new("a", "beta");
        assert!(a < b);
    }
}
