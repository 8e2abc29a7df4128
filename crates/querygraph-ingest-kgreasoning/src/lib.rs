//! KGReasoning dataset import (boundary adapter).
//!
//! KGReasoning (BetaE / Query2Box style) datasets ship as a directory of
//! Python pickles and whitespace-separated triple files. This crate turns
//! such a directory into a QueryGraph dataset:
//!
//! 1. the id mappings (`id2ent.pkl`, `id2rel.pkl`),
//! 2. the graph splits (`train.txt`, `valid.txt`, `test.txt`), and
//! 3. the queries of each split, with their answers.
//!
//! Queries are nested tuples keyed by a placeholder signature. Each
//! supported signature maps to a `QueryShape`; its converter emits the
//! query's triples with explicit variables and the target node. Relations
//! are paired (`2k` forward, `2k + 1` backward) and only forward relations
//! reach the output: an edge over a backward relation is written reversed
//! over its forward partner.
//!
//! Answers are relayed, never computed: train queries carry one answer set
//! (stored as "easy"), validation and test queries carry easy and hard sets.

pub mod answers;
pub mod convert;
pub mod graph_splits;
pub mod import;
pub mod mapping;
pub mod pickle;
pub mod polarity;

pub use answers::{AnswerAttacher, AnswerTable};
pub use convert::ShapeConverter;
pub use import::{
    convert_queries, import_kgreasoning, ImportConfig, ImportReport, ShapeReport, SplitReport,
};
pub use pickle::{QueryCorpus, QueryGroup};

use querygraph_builder::BuildError;
use querygraph_dsl::ShapeError;
use querygraph_mapping::MappingError;
use querygraph_storage::StorageError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode pickle {path}: {source}")]
    Pickle {
        path: PathBuf,
        #[source]
        source: serde_pickle::Error,
    },
    #[error("invalid term in {path}: {detail}")]
    InvalidTerm { path: PathBuf, detail: String },
    #[error("mapping {path} has no entry for id {id}; ids must cover 0..{len}")]
    NonContiguousMapping { path: PathBuf, id: usize, len: usize },
    #[error("{path}:{line}: {detail}")]
    MalformedTriple {
        path: PathBuf,
        line: usize,
        detail: String,
    },
    #[error("the shape {signature} was not found in the {split} split; likely not yet implemented")]
    UnknownShape { split: Split, signature: String },
    #[error("answer table {table} has no entry for query {instance}")]
    MissingAnswers { table: String, instance: String },
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ImportError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ImportError {
        let path = path.into();
        move |source| ImportError::Io { path, source }
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    /// Name in the converted dataset.
    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }

    /// Name in KGReasoning file names (`valid-queries.pkl`).
    pub fn source_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "valid",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "validation" | "valid" => Ok(Split::Validation),
            "test" => Ok(Split::Test),
            other => Err(format!(
                "unknown split `{other}` (expected train, validation or test)"
            )),
        }
    }
}

/// Encoding of the written record batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    #[default]
    Proto,
    Json,
}

impl FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proto" => Ok(RecordFormat::Proto),
            "json" => Ok(RecordFormat::Json),
            other => Err(format!("unknown record format `{other}` (expected proto or json)")),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_names() {
        assert_eq!(Split::Validation.name(), "validation");
        assert_eq!(Split::Validation.source_name(), "valid");
        assert_eq!("valid".parse::<Split>(), Ok(Split::Validation));
        assert!("dev".parse::<Split>().is_err());
    }

    #[test]
    fn record_format_parses() {
        assert_eq!("json".parse::<RecordFormat>(), Ok(RecordFormat::Json));
        assert_eq!(RecordFormat::default(), RecordFormat::Proto);
    }
}
