//! `train.txt` / `valid.txt` / `test.txt` → N-Triples style split files.

use crate::{ImportError, Split};
use querygraph_mapping::{EntityMapper, RelationMapper};
use querygraph_storage::Dataset;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Source file of each split, in the order they are converted.
pub const GRAPH_SPLITS: [(&str, Split); 3] = [
    ("test.txt", Split::Test),
    ("valid.txt", Split::Validation),
    ("train.txt", Split::Train),
];

/// Convert all three graph splits of `source` into `dataset`.
pub fn convert_graph_splits(
    source: &Path,
    dataset: &Dataset,
    entities: &EntityMapper,
    relations: &RelationMapper,
) -> Result<(), ImportError> {
    for (file_name, split) in GRAPH_SPLITS {
        let input = source.join(file_name);
        let output = dataset.split_triples_location(split.name());
        let count = convert_triples(&input, &output, entities, relations)?;
        tracing::debug!(split = %split, triples = count, "converted graph split");
    }
    Ok(())
}

/// Rewrite `s p o` id lines as `<s> <p> <o> .` label lines. Blank lines are
/// skipped. Returns the number of triples written.
pub fn convert_triples(
    input: &Path,
    output: &Path,
    entities: &EntityMapper,
    relations: &RelationMapper,
) -> Result<usize, ImportError> {
    let reader = BufReader::new(File::open(input).map_err(ImportError::io(input))?);
    let mut writer = BufWriter::new(File::create(output).map_err(ImportError::io(output))?);

    let mut count = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(ImportError::io(input))?;
        if line.trim().is_empty() {
            continue;
        }
        let [s, p, o] = parse_triple(input, index + 1, &line)?;
        writeln!(
            writer,
            "<{}> <{}> <{}> .",
            entities.inverse_lookup(s)?,
            relations.inverse_lookup(p)?,
            entities.inverse_lookup(o)?
        )
        .map_err(ImportError::io(output))?;
        count += 1;
    }
    writer.flush().map_err(ImportError::io(output))?;
    Ok(count)
}

fn parse_triple(path: &Path, line_no: usize, line: &str) -> Result<[u32; 3], ImportError> {
    let malformed = |detail: String| ImportError::MalformedTriple {
        path: path.to_path_buf(),
        line: line_no,
        detail,
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    let [s, p, o] = parts[..] else {
        return Err(malformed(format!(
            "expected 3 fields, found {} in `{line}`",
            parts.len()
        )));
    };
    let parse = |field: &str| {
        field
            .parse::<u32>()
            .map_err(|e| malformed(format!("`{field}` is not an id: {e}")))
    };
    Ok([parse(s)?, parse(p)?, parse(o)?])
}
