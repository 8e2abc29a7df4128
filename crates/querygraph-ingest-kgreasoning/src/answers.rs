//! Answer attachers.
//!
//! Answers are precomputed by the dataset producer and keyed by the exact
//! query instance. Train queries have a single answer table, attached as the
//! easy targets. Validation and test queries have an easy table (answers
//! reachable in the training graph) and a hard table (answers that need
//! held-out edges); both are attached. A query missing from any table it is
//! looked up in is an error, never an empty answer set.

use crate::pickle::{read_pickle, OrderedMap, PickleTerm};
use crate::{ImportError, Split};
use querygraph_builder::QueryBuilder;
use querygraph_dsl::ShapeInstance;
use querygraph_mapping::EntityMapper;
use std::collections::HashMap;
use std::path::Path;

/// Query instance → answer entity ids.
#[derive(Debug, Clone, Default)]
pub struct AnswerTable {
    name: String,
    answers: HashMap<ShapeInstance, Vec<u32>>,
}

impl AnswerTable {
    pub fn new(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (ShapeInstance, Vec<u32>)>,
    ) -> Self {
        Self {
            name: name.into(),
            answers: entries.into_iter().collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ImportError> {
        let raw: OrderedMap<PickleTerm, Vec<PickleTerm>> = read_pickle(path)?;
        let invalid = |detail: String| ImportError::InvalidTerm {
            path: path.to_path_buf(),
            detail,
        };

        let mut answers = HashMap::with_capacity(raw.0.len());
        for (query, ids) in raw.0 {
            let query = query.to_instance().map_err(invalid)?;
            let ids = ids
                .iter()
                .map(PickleTerm::to_id)
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid)?;
            answers.insert(query, ids);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        tracing::debug!(table = %name, queries = answers.len(), "loaded answer table");
        Ok(Self { name, answers })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn get(&self, query: &ShapeInstance) -> Result<&[u32], ImportError> {
        self.answers
            .get(query)
            .map(Vec::as_slice)
            .ok_or_else(|| ImportError::MissingAnswers {
                table: self.name.clone(),
                instance: query.to_string(),
            })
    }

    fn labels(&self, query: &ShapeInstance, entities: &EntityMapper) -> Result<Vec<String>, ImportError> {
        self.get(query)?
            .iter()
            .map(|&id| {
                entities
                    .inverse_lookup(id)
                    .map(str::to_string)
                    .map_err(ImportError::from)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum AnswerAttacher {
    Train { answers: AnswerTable },
    Evaluation { easy: AnswerTable, hard: AnswerTable },
}

impl AnswerAttacher {
    /// Load the answer tables of `split` from a KGReasoning directory.
    pub fn load(source: &Path, split: Split) -> Result<Self, ImportError> {
        match split {
            Split::Train => Ok(AnswerAttacher::Train {
                answers: AnswerTable::load(&source.join("train-answers.pkl"))?,
            }),
            Split::Validation | Split::Test => {
                let prefix = split.source_name();
                Ok(AnswerAttacher::Evaluation {
                    easy: AnswerTable::load(&source.join(format!("{prefix}-easy-answers.pkl")))?,
                    hard: AnswerTable::load(&source.join(format!("{prefix}-hard-answers.pkl")))?,
                })
            }
        }
    }

    pub fn attach<B: QueryBuilder>(
        &self,
        builder: &mut B,
        query: &ShapeInstance,
        entities: &EntityMapper,
    ) -> Result<(), ImportError> {
        match self {
            AnswerAttacher::Train { answers } => {
                builder.set_easy_entity_targets(answers.labels(query, entities)?)?;
            }
            AnswerAttacher::Evaluation { easy, hard } => {
                builder.set_easy_entity_targets(easy.labels(query, entities)?)?;
                builder.set_hard_entity_targets(hard.labels(query, entities)?)?;
            }
        }
        Ok(())
    }
}
