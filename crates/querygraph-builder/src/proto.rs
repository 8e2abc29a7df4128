//! Protobuf query records.
//!
//! Labels are mapped back to integer ids on the way in: entities and
//! predicates through the dataset mappers, `?varK` to variable `K`, and the
//! target label to the target term. A batch is one `QueryData` message.

use crate::{BuildError, BuilderFactory, QueryBuilder, Slots};
use prost::Message;
use querygraph_mapping::{EntityMapper, RelationMapper, TARGET_ENTITY_NAME};

#[derive(Clone, PartialEq, Message)]
pub struct Term {
    #[prost(oneof = "term::Kind", tags = "1, 2, 3")]
    pub kind: Option<term::Kind>,
}

pub mod term {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(uint32, tag = "1")]
        Entity(u32),
        #[prost(uint32, tag = "2")]
        Variable(u32),
        #[prost(bool, tag = "3")]
        Target(bool),
    }
}

impl Term {
    pub fn entity(id: u32) -> Self {
        Self {
            kind: Some(term::Kind::Entity(id)),
        }
    }

    pub fn variable(index: u32) -> Self {
        Self {
            kind: Some(term::Kind::Variable(index)),
        }
    }

    pub fn target() -> Self {
        Self {
            kind: Some(term::Kind::Target(true)),
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Triple {
    #[prost(message, optional, tag = "1")]
    pub subject: Option<Term>,
    #[prost(uint32, tag = "2")]
    pub predicate: u32,
    #[prost(message, optional, tag = "3")]
    pub object: Option<Term>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Qualifier {
    #[prost(uint32, tag = "1")]
    pub relation: u32,
    #[prost(message, optional, tag = "2")]
    pub value: Option<Term>,
    #[prost(uint32, tag = "3")]
    pub triple_index: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Query {
    #[prost(message, repeated, tag = "1")]
    pub triples: Vec<Triple>,
    #[prost(message, repeated, tag = "2")]
    pub qualifiers: Vec<Qualifier>,
    #[prost(uint32, repeated, tag = "3")]
    pub easy_targets: Vec<u32>,
    #[prost(uint32, repeated, tag = "4")]
    pub hard_targets: Vec<u32>,
    #[prost(uint32, tag = "5")]
    pub diameter: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryData {
    #[prost(message, repeated, tag = "1")]
    pub queries: Vec<Query>,
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ProtoFormat<'a> {
    entities: &'a EntityMapper,
    relations: &'a RelationMapper,
}

impl<'a> ProtoFormat<'a> {
    pub fn new(entities: &'a EntityMapper, relations: &'a RelationMapper) -> Self {
        Self {
            entities,
            relations,
        }
    }
}

impl<'a> BuilderFactory for ProtoFormat<'a> {
    type Builder = ProtoQueryBuilder<'a>;

    fn builder(&self, num_triples: usize, num_qualifiers: usize) -> ProtoQueryBuilder<'a> {
        ProtoQueryBuilder {
            entities: self.entities,
            relations: self.relations,
            slots: Slots::new(num_triples, num_qualifiers),
        }
    }

    fn encode_batch(&self, records: Vec<Query>) -> Result<Vec<u8>, BuildError> {
        Ok(QueryData { queries: records }.encode_to_vec())
    }

    fn extension(&self) -> &'static str {
        "proto"
    }
}

pub struct ProtoQueryBuilder<'a> {
    entities: &'a EntityMapper,
    relations: &'a RelationMapper,
    slots: Slots<Triple, Qualifier, u32>,
}

impl ProtoQueryBuilder<'_> {
    fn term(&self, label: &str) -> Result<Term, BuildError> {
        if label == TARGET_ENTITY_NAME {
            return Ok(Term::target());
        }
        if let Some(index) = EntityMapper::parse_variable(label) {
            return Ok(Term::variable(index));
        }
        self.entity_id(label).map(Term::entity)
    }

    fn entity_id(&self, label: &str) -> Result<u32, BuildError> {
        self.entities.lookup(label).map_err(|source| BuildError::Label {
            label: label.to_string(),
            source,
        })
    }

    fn relation_id(&self, label: &str) -> Result<u32, BuildError> {
        self.relations.lookup(label).map_err(|source| BuildError::Label {
            label: label.to_string(),
            source,
        })
    }

    fn entity_ids(&self, labels: &[String]) -> Result<Vec<u32>, BuildError> {
        labels.iter().map(|l| self.entity_id(l)).collect()
    }
}

impl QueryBuilder for ProtoQueryBuilder<'_> {
    type Output = Query;

    fn set_diameter(&mut self, diameter: u32) -> Result<(), BuildError> {
        self.slots.set_diameter(diameter)
    }

    fn set_subject_predicate_entity_object(
        &mut self,
        index: usize,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> Result<(), BuildError> {
        self.slots.check_triple(index)?;
        let triple = Triple {
            subject: Some(self.term(subject)?),
            predicate: self.relation_id(predicate)?,
            object: Some(self.term(object)?),
        };
        self.slots.set_triple(index, triple)
    }

    fn set_qualifier(
        &mut self,
        index: usize,
        triple_index: usize,
        relation: &str,
        value: &str,
    ) -> Result<(), BuildError> {
        self.slots.check_qualifier(index)?;
        let qualifier = Qualifier {
            relation: self.relation_id(relation)?,
            value: Some(self.term(value)?),
            triple_index: self.slots.triple_ref(triple_index)?,
        };
        self.slots.set_qualifier(index, qualifier)
    }

    fn set_easy_entity_targets(&mut self, targets: Vec<String>) -> Result<(), BuildError> {
        let ids = self.entity_ids(&targets)?;
        self.slots.set_easy(ids)
    }

    fn set_hard_entity_targets(&mut self, targets: Vec<String>) -> Result<(), BuildError> {
        let ids = self.entity_ids(&targets)?;
        self.slots.set_hard(ids)
    }

    fn build(self) -> Result<Query, BuildError> {
        let filled = self.slots.finish()?;
        Ok(Query {
            triples: filled.triples,
            qualifiers: filled.qualifiers,
            easy_targets: filled.easy.unwrap_or_default(),
            hard_targets: filled.hard.unwrap_or_default(),
            diameter: filled.diameter,
        })
    }
}
