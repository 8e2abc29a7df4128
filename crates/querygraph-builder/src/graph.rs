//! Labelled query graphs, batched as JSON.

use crate::{BuildError, BuilderFactory, QueryBuilder, Slots};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledQualifier {
    pub triple_index: usize,
    pub relation: String,
    pub value: String,
}

/// One query with its answers, labels kept as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryGraph {
    pub triples: Vec<LabeledTriple>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<LabeledQualifier>,
    pub diameter: u32,
    #[serde(default)]
    pub easy_targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_targets: Option<Vec<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct QueryGraphBatch {
    pub queries: Vec<QueryGraph>,
}

#[derive(Debug, Clone)]
pub struct GraphQueryBuilder {
    slots: Slots<LabeledTriple, LabeledQualifier, String>,
}

impl QueryBuilder for GraphQueryBuilder {
    type Output = QueryGraph;

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
        self.slots.set_triple(
            index,
            LabeledTriple {
                subject: subject.to_string(),
                predicate: predicate.to_string(),
                object: object.to_string(),
            },
        )
    }

    fn set_qualifier(
        &mut self,
        index: usize,
        triple_index: usize,
        relation: &str,
        value: &str,
    ) -> Result<(), BuildError> {
        self.slots.triple_ref(triple_index)?;
        self.slots.set_qualifier(
            index,
            LabeledQualifier {
                triple_index,
                relation: relation.to_string(),
                value: value.to_string(),
            },
        )
    }

    fn set_easy_entity_targets(&mut self, targets: Vec<String>) -> Result<(), BuildError> {
        self.slots.set_easy(targets)
    }

    fn set_hard_entity_targets(&mut self, targets: Vec<String>) -> Result<(), BuildError> {
        self.slots.set_hard(targets)
    }

    fn build(self) -> Result<QueryGraph, BuildError> {
        let filled = self.slots.finish()?;
        Ok(QueryGraph {
            triples: filled.triples,
            qualifiers: filled.qualifiers,
            diameter: filled.diameter,
            easy_targets: filled.easy.unwrap_or_default(),
            hard_targets: filled.hard,
        })
    }
}

/// JSON batches of `QueryGraph`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphFormat;

impl BuilderFactory for GraphFormat {
    type Builder = GraphQueryBuilder;

    fn builder(&self, num_triples: usize, num_qualifiers: usize) -> GraphQueryBuilder {
        GraphQueryBuilder {
            slots: Slots::new(num_triples, num_qualifiers),
        }
    }

    fn encode_batch(&self, records: Vec<QueryGraph>) -> Result<Vec<u8>, BuildError> {
        serde_json::to_vec(&QueryGraphBatch { queries: records })
            .map_err(|e| BuildError::Encode(e.to_string()))
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
