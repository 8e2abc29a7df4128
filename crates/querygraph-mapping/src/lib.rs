//! Identifier mappings for QueryGraph datasets.
//!
//! A dataset stores entities and relation types under dense integer ids
//! `0..n`. The mapping files are plain text: line `i` holds the label of id
//! `i`. Entity and relation ids are independent namespaces.
//!
//! Relations come in pairs: `2k` is a forward relation and `2k + 1` its
//! backward counterpart. `RelationMapper` refuses mappings that break this
//! pairing so that every odd id has a forward partner.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Label of the query target node.
pub const TARGET_ENTITY_NAME: &str = "TARGET";

/// Prefix of synthetic variable labels (`?var0`, `?var1`, ...).
pub const VARIABLE_PREFIX: &str = "?var";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Entity,
    Relation,
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKind::Entity => f.write_str("entity"),
            MappingKind::Relation => f.write_str("relation"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("no {kind} label for id {id}")]
    UnknownId { kind: MappingKind, id: u32 },
    #[error("no {kind} id for label `{label}`")]
    UnknownLabel { kind: MappingKind, label: String },
    #[error("duplicate {kind} label `{label}` for ids {first} and {second}")]
    DuplicateLabel {
        kind: MappingKind,
        label: String,
        first: u32,
        second: u32,
    },
    #[error("entity label `{label}` (id {id}) collides with a reserved query label")]
    ReservedLabel { label: String, id: u32 },
    #[error("relation mapping has {count} ids; forward/backward pairs need an even count")]
    UnpairedRelations { count: usize },
    #[error("mapping has more than u32::MAX ids")]
    TooManyIds,
    #[error("failed to read mapping {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// IdMapper
// ============================================================================

/// Bidirectional dense-id ↔ label mapping.
#[derive(Debug, Clone)]
pub struct IdMapper {
    kind: MappingKind,
    labels: Vec<String>,
    ids: HashMap<String, u32>,
}

impl IdMapper {
    pub fn new(kind: MappingKind, labels: Vec<String>) -> Result<Self, MappingError> {
        if u32::try_from(labels.len()).is_err() {
            return Err(MappingError::TooManyIds);
        }
        let mut ids = HashMap::with_capacity(labels.len());
        for (id, label) in labels.iter().enumerate() {
            let id = id as u32;
            if let Some(first) = ids.insert(label.clone(), id) {
                return Err(MappingError::DuplicateLabel {
                    kind,
                    label: label.clone(),
                    first,
                    second: id,
                });
            }
        }
        Ok(Self { kind, labels, ids })
    }

    /// Read a mapping file (one label per line; a trailing newline is fine).
    pub fn from_file(kind: MappingKind, path: &Path) -> Result<Self, MappingError> {
        let text = fs::read_to_string(path).map_err(|source| MappingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let labels = if text.is_empty() {
            Vec::new()
        } else {
            text.strip_suffix('\n')
                .unwrap_or(&text)
                .split('\n')
                .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
                .collect()
        };
        let mapper = Self::new(kind, labels)?;
        tracing::debug!(kind = %kind, path = %path.display(), ids = mapper.len(), "loaded mapping");
        Ok(mapper)
    }

    pub fn kind(&self) -> MappingKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn lookup(&self, label: &str) -> Result<u32, MappingError> {
        self.ids
            .get(label)
            .copied()
            .ok_or_else(|| MappingError::UnknownLabel {
                kind: self.kind,
                label: label.to_string(),
            })
    }

    pub fn inverse_lookup(&self, id: u32) -> Result<&str, MappingError> {
        self.labels
            .get(id as usize)
            .map(String::as_str)
            .ok_or(MappingError::UnknownId { kind: self.kind, id })
    }
}

/// Write labels in mapping-file form: `\n`-separated, no trailing newline.
pub fn write_mapping_file<S: AsRef<str>>(path: &Path, labels: &[S]) -> std::io::Result<()> {
    let text = labels
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(path, text)
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone)]
pub struct EntityMapper {
    inner: IdMapper,
}

impl EntityMapper {
    pub fn new(labels: Vec<String>) -> Result<Self, MappingError> {
        Self::checked(IdMapper::new(MappingKind::Entity, labels)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, MappingError> {
        Self::checked(IdMapper::from_file(MappingKind::Entity, path)?)
    }

    fn checked(inner: IdMapper) -> Result<Self, MappingError> {
        for (id, label) in inner.labels().iter().enumerate() {
            if label == TARGET_ENTITY_NAME || Self::parse_variable(label).is_some() {
                return Err(MappingError::ReservedLabel {
                    label: label.clone(),
                    id: id as u32,
                });
            }
        }
        Ok(Self { inner })
    }

    pub fn target_entity_name() -> &'static str {
        TARGET_ENTITY_NAME
    }

    pub fn variable_name(index: u32) -> String {
        format!("{VARIABLE_PREFIX}{index}")
    }

    /// `Some(k)` for `?var{k}`.
    pub fn parse_variable(label: &str) -> Option<u32> {
        let digits = label.strip_prefix(VARIABLE_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn lookup(&self, label: &str) -> Result<u32, MappingError> {
        self.inner.lookup(label)
    }

    pub fn inverse_lookup(&self, id: u32) -> Result<&str, MappingError> {
        self.inner.inverse_lookup(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

// ============================================================================
// Relations
// ============================================================================

#[derive(Debug, Clone)]
pub struct RelationMapper {
    inner: IdMapper,
}

impl RelationMapper {
    pub fn new(labels: Vec<String>) -> Result<Self, MappingError> {
        Self::checked(IdMapper::new(MappingKind::Relation, labels)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, MappingError> {
        Self::checked(IdMapper::from_file(MappingKind::Relation, path)?)
    }

    fn checked(inner: IdMapper) -> Result<Self, MappingError> {
        if inner.len() % 2 != 0 {
            return Err(MappingError::UnpairedRelations { count: inner.len() });
        }
        Ok(Self { inner })
    }

    pub fn is_forward(id: u32) -> bool {
        id % 2 == 0
    }

    pub fn lookup(&self, label: &str) -> Result<u32, MappingError> {
        self.inner.lookup(label)
    }

    pub fn inverse_lookup(&self, id: u32) -> Result<&str, MappingError> {
        self.inner.inverse_lookup(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
