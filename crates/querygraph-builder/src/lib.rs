//! Query record builders.
//!
//! Shape converters never know how a query is finally encoded. They talk to
//! a `QueryBuilder`, created per query by a `BuilderFactory`, which collects
//! a fixed number of triples, the diameter and the answer sets, and finally
//! `build()`s one record. The factory also knows how to encode a batch of
//! records and which file extension the batch gets.
//!
//! Two encodings ship with the crate:
//!
//! - `proto`: prost messages with labels mapped back to integer ids,
//! - `graph`: labelled triples, batched as JSON.

pub mod graph;
pub mod proto;

pub use graph::{GraphFormat, GraphQueryBuilder, LabeledQualifier, LabeledTriple, QueryGraph};
pub use proto::{ProtoFormat, ProtoQueryBuilder};

use querygraph_mapping::MappingError;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{what} index {index} out of range (capacity {capacity})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        capacity: usize,
    },
    #[error("{what} {index} was already set")]
    AlreadySet { what: &'static str, index: usize },
    #[error("{what} was already set")]
    FieldAlreadySet { what: &'static str },
    #[error("{what} {index} was never set")]
    Missing { what: &'static str, index: usize },
    #[error("diameter was never set")]
    MissingDiameter,
    #[error("label `{label}` cannot be encoded: {source}")]
    Label {
        label: String,
        #[source]
        source: MappingError,
    },
    #[error("failed to encode batch: {0}")]
    Encode(String),
}

/// Accumulates one query; consumed by `build()`.
pub trait QueryBuilder {
    type Output;

    fn set_diameter(&mut self, diameter: u32) -> Result<(), BuildError>;

    fn set_subject_predicate_entity_object(
        &mut self,
        index: usize,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> Result<(), BuildError>;

    /// Qualifier `index` attaches `(relation, value)` to triple `triple_index`.
    fn set_qualifier(
        &mut self,
        index: usize,
        triple_index: usize,
        relation: &str,
        value: &str,
    ) -> Result<(), BuildError>;

    fn set_easy_entity_targets(&mut self, targets: Vec<String>) -> Result<(), BuildError>;

    fn set_hard_entity_targets(&mut self, targets: Vec<String>) -> Result<(), BuildError>;

    fn build(self) -> Result<Self::Output, BuildError>;
}

/// Creates builders of one encoding and encodes their batches.
pub trait BuilderFactory {
    type Builder: QueryBuilder;

    fn builder(&self, num_triples: usize, num_qualifiers: usize) -> Self::Builder;

    fn encode_batch(
        &self,
        records: Vec<<Self::Builder as QueryBuilder>::Output>,
    ) -> Result<Vec<u8>, BuildError>;

    /// File extension of an encoded batch (no dot).
    fn extension(&self) -> &'static str;
}

// ============================================================================
// Shared slot bookkeeping
// ============================================================================

/// Fixed-capacity state shared by the builders in this crate.
#[derive(Debug, Clone)]
pub(crate) struct Slots<T, Q, E> {
    triples: Vec<Option<T>>,
    qualifiers: Vec<Option<Q>>,
    diameter: Option<u32>,
    easy: Option<Vec<E>>,
    hard: Option<Vec<E>>,
}

pub(crate) struct Filled<T, Q, E> {
    pub triples: Vec<T>,
    pub qualifiers: Vec<Q>,
    pub diameter: u32,
    pub easy: Option<Vec<E>>,
    pub hard: Option<Vec<E>>,
}

impl<T, Q, E> Slots<T, Q, E> {
    pub(crate) fn new(num_triples: usize, num_qualifiers: usize) -> Self {
        Self {
            triples: std::iter::repeat_with(|| None).take(num_triples).collect(),
            qualifiers: std::iter::repeat_with(|| None).take(num_qualifiers).collect(),
            diameter: None,
            easy: None,
            hard: None,
        }
    }

    pub(crate) fn check_triple(&self, index: usize) -> Result<(), BuildError> {
        check_slot(&self.triples, "triple", index)
    }

    pub(crate) fn check_qualifier(&self, index: usize) -> Result<(), BuildError> {
        check_slot(&self.qualifiers, "qualifier", index)
    }

    /// Qualifiers may only point at one of this query's triple slots.
    pub(crate) fn triple_ref(&self, triple_index: usize) -> Result<u32, BuildError> {
        let capacity = self.triples.len();
        match u32::try_from(triple_index) {
            Ok(index) if triple_index < capacity => Ok(index),
            _ => Err(BuildError::IndexOutOfRange {
                what: "qualified triple",
                index: triple_index,
                capacity,
            }),
        }
    }

    pub(crate) fn set_triple(&mut self, index: usize, triple: T) -> Result<(), BuildError> {
        self.check_triple(index)?;
        self.triples[index] = Some(triple);
        Ok(())
    }

    pub(crate) fn set_qualifier(&mut self, index: usize, qualifier: Q) -> Result<(), BuildError> {
        self.check_qualifier(index)?;
        self.qualifiers[index] = Some(qualifier);
        Ok(())
    }

    pub(crate) fn set_diameter(&mut self, diameter: u32) -> Result<(), BuildError> {
        if self.diameter.is_some() {
            return Err(BuildError::FieldAlreadySet { what: "diameter" });
        }
        self.diameter = Some(diameter);
        Ok(())
    }

    pub(crate) fn set_easy(&mut self, targets: Vec<E>) -> Result<(), BuildError> {
        set_once(&mut self.easy, targets, "easy targets")
    }

    pub(crate) fn set_hard(&mut self, targets: Vec<E>) -> Result<(), BuildError> {
        set_once(&mut self.hard, targets, "hard targets")
    }

    pub(crate) fn finish(self) -> Result<Filled<T, Q, E>, BuildError> {
        let diameter = self.diameter.ok_or(BuildError::MissingDiameter)?;
        Ok(Filled {
            triples: unwrap_all(self.triples, "triple")?,
            qualifiers: unwrap_all(self.qualifiers, "qualifier")?,
            diameter,
            easy: self.easy,
            hard: self.hard,
        })
    }
}

fn check_slot<T>(slots: &[Option<T>], what: &'static str, index: usize) -> Result<(), BuildError> {
    match slots.get(index) {
        None => Err(BuildError::IndexOutOfRange {
            what,
            index,
            capacity: slots.len(),
        }),
        Some(Some(_)) => Err(BuildError::AlreadySet { what, index }),
        Some(None) => Ok(()),
    }
}

fn set_once<E>(slot: &mut Option<Vec<E>>, value: Vec<E>, what: &'static str) -> Result<(), BuildError> {
    if slot.is_some() {
        return Err(BuildError::FieldAlreadySet { what });
    }
    *slot = Some(value);
    Ok(())
}

fn unwrap_all<T>(slots: Vec<Option<T>>, what: &'static str) -> Result<Vec<T>, BuildError> {
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or(BuildError::Missing { what, index }))
        .collect()
}
