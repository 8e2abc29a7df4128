//! Relation polarity.
//!
//! Relation ids come in pairs: `2k` is forward, `2k + 1` is its inverse.
//! Backward ids never reach the output. An edge `s -[2k+1]-> o` is written
//! as `o -[2k]-> s`.

use crate::ImportError;
use querygraph_builder::QueryBuilder;
use querygraph_mapping::RelationMapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Forward,
    Backward,
}

impl Polarity {
    pub fn of(relation: u32) -> Self {
        if RelationMapper::is_forward(relation) {
            Polarity::Forward
        } else {
            Polarity::Backward
        }
    }
}

/// An edge over a forward relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientedEdge<'a> {
    pub subject: &'a str,
    pub relation: u32,
    pub object: &'a str,
}

pub fn orient<'a>(subject: &'a str, relation: u32, object: &'a str) -> OrientedEdge<'a> {
    match Polarity::of(relation) {
        Polarity::Forward => OrientedEdge {
            subject,
            relation,
            object,
        },
        // Odd ids always have an even predecessor.
        Polarity::Backward => OrientedEdge {
            subject: object,
            relation: relation - 1,
            object: subject,
        },
    }
}

/// Orient the edge and write it as triple `index`.
pub fn set_triple<B: QueryBuilder>(
    builder: &mut B,
    relations: &RelationMapper,
    index: usize,
    subject: &str,
    relation: u32,
    object: &str,
) -> Result<(), ImportError> {
    let edge = orient(subject, relation, object);
    let predicate = relations.inverse_lookup(edge.relation)?;
    builder.set_subject_predicate_entity_object(index, edge.subject, predicate, edge.object)?;
    Ok(())
}
