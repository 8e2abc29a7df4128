//! QueryGraph dataset storage
//!
//! A converted dataset is a directory:
//!
//! ```text
//! <root>/
//! ├── mapping/
//! │   ├── entity_mapping.txt        one label per line, line i = id i
//! │   └── relation_mapping.txt
//! ├── splits/
//! │   ├── train.nt                  <s> <p> <o> .
//! │   ├── validation.nt
//! │   └── test.nt
//! └── queries/
//!     └── <shape>/0qual/
//!         ├── <split>.<ext>         one encoded record batch
//!         └── <split>_stats.json    {"name", "count", "hash"}
//! ```
//!
//! A batch and its statistics are written as a pair. If the statistics
//! cannot be written, the partial statistics file is removed and the error
//! is returned; the batch itself stays on disk.


use querygraph_dsl::digest::fnv1a64_digest_bytes;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Folder for queries without qualifiers.
pub const ZERO_QUALIFIER_DIR: &str = "0qual";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("dataset already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write statistics {path}: {source}")]
    Stats {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
        move |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Companion record of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Split name (`train`, `validation`, `test`).
    pub name: String,
    pub count: usize,
    /// Digest of the encoded batch.
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn location(&self) -> &Path {
        &self.root
    }

    pub fn mapping_location(&self) -> PathBuf {
        self.root.join("mapping")
    }

    pub fn entity_mapping_location(&self) -> PathBuf {
        self.mapping_location().join("entity_mapping.txt")
    }

    pub fn relation_mapping_location(&self) -> PathBuf {
        self.mapping_location().join("relation_mapping.txt")
    }

    pub fn splits_location(&self) -> PathBuf {
        self.root.join("splits")
    }

    /// Graph split file, e.g. `splits/validation.nt`.
    pub fn split_triples_location(&self, split: &str) -> PathBuf {
        self.splits_location().join(format!("{split}.nt"))
    }

    pub fn query_location(&self) -> PathBuf {
        self.root.join("queries")
    }

    pub fn shape_location(&self, shape: &str) -> PathBuf {
        self.query_location().join(shape).join(ZERO_QUALIFIER_DIR)
    }

    pub fn batch_location(&self, shape: &str, split: &str, extension: &str) -> PathBuf {
        self.shape_location(shape).join(format!("{split}.{extension}"))
    }

    pub fn stats_location(&self, shape: &str, split: &str) -> PathBuf {
        self.shape_location(shape).join(format!("{split}_stats.json"))
    }

    /// Create the directory skeleton; refuses to touch an existing dataset.
    pub fn create(&self) -> Result<(), StorageError> {
        if self.root.exists() {
            return Err(StorageError::AlreadyExists(self.root.clone()));
        }
        for dir in [
            self.mapping_location(),
            self.splits_location(),
            self.query_location(),
        ] {
            fs::create_dir_all(&dir).map_err(StorageError::io(&dir))?;
        }
        tracing::debug!(root = %self.root.display(), "created dataset");
        Ok(())
    }

    /// Persist one (shape, split) batch followed by its statistics.
    pub fn write_batch(
        &self,
        shape: &str,
        split: &str,
        extension: &str,
        bytes: &[u8],
        count: usize,
    ) -> Result<BatchStats, StorageError> {
        let folder = self.shape_location(shape);
        fs::create_dir_all(&folder).map_err(StorageError::io(&folder))?;

        let batch_path = self.batch_location(shape, split, extension);
        fs::write(&batch_path, bytes).map_err(StorageError::io(&batch_path))?;

        let stats = BatchStats {
            name: split.to_string(),
            count,
            hash: fnv1a64_digest_bytes(bytes),
        };
        write_stats_with(&self.stats_location(shape, split), &stats, |p| File::create(p))?;
        Ok(stats)
    }

    pub fn read_stats(&self, shape: &str, split: &str) -> Result<BatchStats, StorageError> {
        let path = self.stats_location(shape, split);
        let text = fs::read_to_string(&path).map_err(StorageError::io(&path))?;
        serde_json::from_str(&text).map_err(|e| StorageError::Io {
            path,
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })
    }
}

/// Write `stats` as JSON through `open`; on failure remove whatever was
/// written and return the original error.
pub(crate) fn write_stats_with<W, F>(
    path: &Path,
    stats: &BatchStats,
    open: F,
) -> Result<(), StorageError>
where
    W: Write,
    F: FnOnce(&Path) -> io::Result<W>,
{
    let result = open(path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, stats).map_err(io::Error::from)?;
        writer.flush()
    });

    match result {
        Ok(()) => Ok(()),
        Err(source) => {
            tracing::error!(
                path = %path.display(),
                error = %source,
                "failed writing the stats, removing the file to avoid inconsistent state"
            );
            if path.is_file() {
                if let Err(e) = fs::remove_file(path) {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove partial stats file");
                }
            }
            Err(StorageError::Stats {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}
