//! Nested-tuple terms.
//!
//! KGReasoning writes both query signatures and query instances as nested
//! Python tuples, e.g. `('e', ('r', 'r'))` and `(5, (4, 9))`. `Nested<T>`
//! is the Rust rendering of that structure: equality and hashing are
//! structural, so a `Nested` can key a map exactly like the tuple did.

use std::fmt;

/// A leaf or a (possibly empty) tuple of nested terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Nested<T> {
    Leaf(T),
    Tuple(Vec<Nested<T>>),
}

impl<T> Nested<T> {
    pub fn tuple(items: impl IntoIterator<Item = Nested<T>>) -> Self {
        Nested::Tuple(items.into_iter().collect())
    }

    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            Nested::Leaf(value) => Some(value),
            Nested::Tuple(_) => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Nested<T>]> {
        match self {
            Nested::Leaf(_) => None,
            Nested::Tuple(items) => Some(items),
        }
    }

    /// Replace every leaf, keeping the nesting.
    pub fn map<U>(&self, f: &impl Fn(&T) -> U) -> Nested<U> {
        match self {
            Nested::Leaf(value) => Nested::Leaf(f(value)),
            Nested::Tuple(items) => Nested::Tuple(items.iter().map(|item| item.map(f)).collect()),
        }
    }

    /// Fallible `map`; stops at the first leaf that fails.
    pub fn try_map<U, E>(&self, f: &impl Fn(&T) -> Result<U, E>) -> Result<Nested<U>, E> {
        match self {
            Nested::Leaf(value) => Ok(Nested::Leaf(f(value)?)),
            Nested::Tuple(items) => items
                .iter()
                .map(|item| item.try_map(f))
                .collect::<Result<Vec<_>, E>>()
                .map(Nested::Tuple),
        }
    }

    /// Leaves in depth-first, left-to-right order.
    pub fn leaves(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            Nested::Leaf(value) => out.push(value),
            Nested::Tuple(items) => {
                for item in items {
                    item.collect_leaves(out);
                }
            }
        }
    }
}

impl<T: fmt::Display> fmt::Display for Nested<T> {
    /// Python tuple syntax, including the trailing comma of 1-tuples.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nested::Leaf(value) => write!(f, "{value}"),
            Nested::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Placeholder tokens used in shape signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    /// `'e'`
    Entity,
    /// `'r'`
    Relation,
}

impl Placeholder {
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Entity => "e",
            Placeholder::Relation => "r",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "e" => Some(Placeholder::Entity),
            "r" => Some(Placeholder::Relation),
            _ => None,
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.token())
    }
}

/// Structural pattern identifying a query topology.
pub type ShapeSignature = Nested<Placeholder>;

/// One concrete query: entity and relation ids in signature positions.
pub type ShapeInstance = Nested<u32>;
