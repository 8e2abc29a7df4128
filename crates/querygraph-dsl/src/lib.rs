//! QueryGraph query-shape model
//!
//! This crate defines the vocabulary shared by every QueryGraph crate:
//!
//! - `Nested<T>`: the nested-tuple terms KGReasoning datasets are written in,
//! - `ShapeSignature` / `ShapeInstance`: placeholder patterns and concrete queries,
//! - `QueryShape`: the closed set of supported query topologies, and
//! - `ShapedQuery`: an instance decoded against its shape with arity checked.
//!
//! Nothing here touches the filesystem; decoding pickles and writing records
//! happen in the ingest and storage crates.

pub mod digest;
pub mod nested;
pub mod shape;

pub use nested::{Nested, Placeholder, ShapeInstance, ShapeSignature};
pub use shape::{QueryShape, ShapeError, ShapedQuery};
