//! The supported query topologies.
//!
//! KGReasoning identifies a query shape by a placeholder signature such as
//! `(('e', ('r',)), ('e', ('r',)))`. We keep the closed set of shapes as an
//! enum: signature lookup is a structural comparison against each variant,
//! and decoding an instance checks its nesting and arity explicitly instead
//! of trusting that it looks like its signature.

use crate::nested::{Nested, Placeholder, ShapeInstance, ShapeSignature};
use serde::Serialize;
use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("instance {instance} does not match shape {shape}: {detail}")]
    StructuralMismatch {
        shape: &'static str,
        instance: String,
        detail: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum QueryShape {
    /// `e →r→ target`
    #[serde(rename = "1hop")]
    OneHop,
    /// `e →r0→ v0 →r1→ target`
    #[serde(rename = "2hop")]
    TwoHop,
    /// `e →r0→ v0 →r1→ v1 →r2→ target`
    #[serde(rename = "3hop")]
    ThreeHop,
    /// Two anchored edges meeting at the target.
    #[serde(rename = "2i")]
    TwoIntersection,
    /// Three anchored edges meeting at the target.
    #[serde(rename = "3i")]
    ThreeIntersection,
    /// Two anchored edges meeting at `v0`, then `v0 →r→ target`.
    #[serde(rename = "2i-1hop")]
    IntersectionThenHop,
    /// A 2-hop chain and a direct anchored edge meeting at the target.
    #[serde(rename = "1hop-2i")]
    HopThenIntersection,
}

impl QueryShape {
    pub const ALL: [QueryShape; 7] = [
        QueryShape::OneHop,
        QueryShape::TwoHop,
        QueryShape::ThreeHop,
        QueryShape::TwoIntersection,
        QueryShape::ThreeIntersection,
        QueryShape::IntersectionThenHop,
        QueryShape::HopThenIntersection,
    ];

    /// Name used for output folders and logs.
    pub fn name(self) -> &'static str {
        match self {
            QueryShape::OneHop => "1hop",
            QueryShape::TwoHop => "2hop",
            QueryShape::ThreeHop => "3hop",
            QueryShape::TwoIntersection => "2i",
            QueryShape::ThreeIntersection => "3i",
            QueryShape::IntersectionThenHop => "2i-1hop",
            QueryShape::HopThenIntersection => "1hop-2i",
        }
    }

    pub fn num_triples(self) -> usize {
        match self {
            QueryShape::OneHop => 1,
            QueryShape::TwoHop | QueryShape::TwoIntersection => 2,
            QueryShape::ThreeHop
            | QueryShape::ThreeIntersection
            | QueryShape::IntersectionThenHop
            | QueryShape::HopThenIntersection => 3,
        }
    }

    /// Longest path from an anchor to the target, fixed per shape.
    pub fn diameter(self) -> u32 {
        match self {
            QueryShape::OneHop | QueryShape::TwoIntersection | QueryShape::ThreeIntersection => 1,
            QueryShape::TwoHop
            | QueryShape::IntersectionThenHop
            | QueryShape::HopThenIntersection => 2,
            QueryShape::ThreeHop => 3,
        }
    }

    /// The KGReasoning placeholder signature of this shape.
    pub fn signature(self) -> ShapeSignature {
        match self {
            QueryShape::OneHop => path_sig(1),
            QueryShape::TwoHop => path_sig(2),
            QueryShape::ThreeHop => path_sig(3),
            QueryShape::TwoIntersection => Nested::tuple([path_sig(1), path_sig(1)]),
            QueryShape::ThreeIntersection => {
                Nested::tuple([path_sig(1), path_sig(1), path_sig(1)])
            }
            QueryShape::IntersectionThenHop => Nested::tuple([
                Nested::tuple([path_sig(1), path_sig(1)]),
                relations_sig(1),
            ]),
            QueryShape::HopThenIntersection => Nested::tuple([path_sig(2), path_sig(1)]),
        }
    }

    /// Structural lookup; `None` for unsupported signatures.
    pub fn from_signature(signature: &ShapeSignature) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|shape| &shape.signature() == signature)
    }

    pub fn decode(self, instance: &ShapeInstance) -> Result<ShapedQuery, ShapeError> {
        let mismatch = |detail: String| ShapeError::StructuralMismatch {
            shape: self.name(),
            instance: instance.to_string(),
            detail,
        };
        self.decode_inner(instance).map_err(mismatch)
    }

    fn decode_inner(self, instance: &ShapeInstance) -> Result<ShapedQuery, String> {
        Ok(match self {
            QueryShape::OneHop => {
                let (anchor, [relation]) = path::<1>(instance, "query")?;
                ShapedQuery::OneHop { anchor, relation }
            }
            QueryShape::TwoHop => {
                let (anchor, relations) = path::<2>(instance, "query")?;
                ShapedQuery::TwoHop { anchor, relations }
            }
            QueryShape::ThreeHop => {
                let (anchor, relations) = path::<3>(instance, "query")?;
                ShapedQuery::ThreeHop { anchor, relations }
            }
            QueryShape::TwoIntersection => {
                let [b0, b1] = tuple::<2>(instance, "query")?;
                ShapedQuery::TwoIntersection {
                    branches: [branch(b0, "branch 0")?, branch(b1, "branch 1")?],
                }
            }
            QueryShape::ThreeIntersection => {
                let [b0, b1, b2] = tuple::<3>(instance, "query")?;
                ShapedQuery::ThreeIntersection {
                    branches: [
                        branch(b0, "branch 0")?,
                        branch(b1, "branch 1")?,
                        branch(b2, "branch 2")?,
                    ],
                }
            }
            QueryShape::IntersectionThenHop => {
                let [intersection, tail] = tuple::<2>(instance, "query")?;
                let [b0, b1] = tuple::<2>(intersection, "intersection")?;
                let [relation] = relations::<1>(tail, "projection")?;
                ShapedQuery::IntersectionThenHop {
                    branches: [branch(b0, "branch 0")?, branch(b1, "branch 1")?],
                    relation,
                }
            }
            QueryShape::HopThenIntersection => {
                let [chain, direct] = tuple::<2>(instance, "query")?;
                ShapedQuery::HopThenIntersection {
                    chain: path::<2>(chain, "chain branch")?,
                    branch: branch(direct, "direct branch")?,
                }
            }
        })
    }
}

impl fmt::Display for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An instance decoded against its shape.
///
/// Ids are raw: relation ids may still be backward (odd) relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapedQuery {
    OneHop {
        anchor: u32,
        relation: u32,
    },
    TwoHop {
        anchor: u32,
        relations: [u32; 2],
    },
    ThreeHop {
        anchor: u32,
        relations: [u32; 3],
    },
    /// Each branch is `(anchor, relation)`.
    TwoIntersection {
        branches: [(u32, u32); 2],
    },
    ThreeIntersection {
        branches: [(u32, u32); 3],
    },
    IntersectionThenHop {
        branches: [(u32, u32); 2],
        relation: u32,
    },
    HopThenIntersection {
        chain: (u32, [u32; 2]),
        branch: (u32, u32),
    },
}

impl ShapedQuery {
    pub fn shape(&self) -> QueryShape {
        match self {
            ShapedQuery::OneHop { .. } => QueryShape::OneHop,
            ShapedQuery::TwoHop { .. } => QueryShape::TwoHop,
            ShapedQuery::ThreeHop { .. } => QueryShape::ThreeHop,
            ShapedQuery::TwoIntersection { .. } => QueryShape::TwoIntersection,
            ShapedQuery::ThreeIntersection { .. } => QueryShape::ThreeIntersection,
            ShapedQuery::IntersectionThenHop { .. } => QueryShape::IntersectionThenHop,
            ShapedQuery::HopThenIntersection { .. } => QueryShape::HopThenIntersection,
        }
    }
}

// ============================================================================
// Signature construction
// ============================================================================

fn relations_sig(n: usize) -> ShapeSignature {
    Nested::tuple((0..n).map(|_| Nested::Leaf(Placeholder::Relation)))
}

/// `('e', ('r', ...))` with `n` relations.
fn path_sig(n: usize) -> ShapeSignature {
    Nested::tuple([Nested::Leaf(Placeholder::Entity), relations_sig(n)])
}

// ============================================================================
// Instance destructuring
// ============================================================================

fn tuple<'a, const N: usize>(
    node: &'a ShapeInstance,
    what: &str,
) -> Result<&'a [ShapeInstance; N], String> {
    match node {
        Nested::Tuple(items) => <&[ShapeInstance; N]>::try_from(items.as_slice()).map_err(|_| {
            format!("{what} should be a {N}-tuple, found {} elements", items.len())
        }),
        Nested::Leaf(id) => Err(format!("{what} should be a {N}-tuple, found id {id}")),
    }
}

fn leaf(node: &ShapeInstance, what: &str) -> Result<u32, String> {
    match node {
        Nested::Leaf(id) => Ok(*id),
        Nested::Tuple(_) => Err(format!("{what} should be an id, found tuple {node}")),
    }
}

fn relations<const N: usize>(node: &ShapeInstance, what: &str) -> Result<[u32; N], String> {
    let items = tuple::<N>(node, what)?;
    let mut out = [0u32; N];
    for (i, (slot, item)) in out.iter_mut().zip(items).enumerate() {
        *slot = leaf(item, &format!("{what} relation {i}"))?;
    }
    Ok(out)
}

/// `(anchor, (r0, ..., rN-1))`
fn path<const N: usize>(node: &ShapeInstance, what: &str) -> Result<(u32, [u32; N]), String> {
    let [anchor, rels] = tuple::<2>(node, what)?;
    Ok((
        leaf(anchor, &format!("{what} anchor"))?,
        relations::<N>(rels, &format!("{what} relations"))?,
    ))
}

fn branch(node: &ShapeInstance, what: &str) -> Result<(u32, u32), String> {
    let (anchor, [relation]) = path::<1>(node, what)?;
    Ok((anchor, relation))
}
