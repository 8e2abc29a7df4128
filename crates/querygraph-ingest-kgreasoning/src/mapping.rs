//! `id2ent.pkl` / `id2rel.pkl` → mapping text files.

use crate::pickle::{read_pickle, OrderedMap, PickleTerm};
use crate::ImportError;
use querygraph_mapping::write_mapping_file;
use std::collections::HashMap;
use std::path::Path;

/// Read an `id → label` dict and write it as a dense mapping file.
///
/// Every id in `0..len` must be present. Returns the number of ids written.
pub fn convert_mapper(id2x: &Path, target: &Path) -> Result<usize, ImportError> {
    let raw: OrderedMap<PickleTerm, PickleTerm> = read_pickle(id2x)?;
    let invalid = |detail: String| ImportError::InvalidTerm {
        path: id2x.to_path_buf(),
        detail,
    };

    let mut labels = HashMap::with_capacity(raw.0.len());
    for (id, label) in raw.0 {
        let id = id.to_id().map_err(invalid)?;
        let label = match label {
            PickleTerm::Str(s) => s,
            other => return Err(invalid(format!("label of id {id} is not a string: {other}"))),
        };
        labels.insert(id, label);
    }

    let len = labels.len();
    let dense = (0..len)
        .map(|i| {
            u32::try_from(i)
                .ok()
                .and_then(|id| labels.remove(&id))
                .ok_or_else(|| ImportError::NonContiguousMapping {
                    path: id2x.to_path_buf(),
                    id: i,
                    len,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    write_mapping_file(target, &dense).map_err(ImportError::io(target))?;
    tracing::debug!(source = %id2x.display(), target = %target.display(), ids = len, "converted mapping");
    Ok(len)
}
