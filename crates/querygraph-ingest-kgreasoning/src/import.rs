//! Conversion driver.

use crate::answers::AnswerAttacher;
use crate::convert::ShapeConverter;
use crate::graph_splits::convert_graph_splits;
use crate::mapping::convert_mapper;
use crate::pickle::{QueryCorpus, QueryGroup};
use crate::{ImportError, RecordFormat, Split};
use querygraph_builder::{BuilderFactory, GraphFormat, ProtoFormat, QueryBuilder};
use querygraph_dsl::{QueryShape, ShapeInstance};
use querygraph_mapping::{EntityMapper, RelationMapper};
use querygraph_storage::{BatchStats, Dataset};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Skip unknown query shapes with a warning instead of failing.
    pub lenient: bool,
    /// Query splits to convert, in order.
    pub splits: Vec<Split>,
    pub format: RecordFormat,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            lenient: false,
            splits: Split::ALL.to_vec(),
            format: RecordFormat::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeReport {
    pub shape: QueryShape,
    pub stats: BatchStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub split: Split,
    pub shapes: Vec<ShapeReport>,
    /// Signatures skipped in lenient mode.
    pub skipped: Vec<String>,
}

impl SplitReport {
    pub fn num_queries(&self) -> usize {
        self.shapes.iter().map(|s| s.stats.count).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub splits: Vec<SplitReport>,
}

impl ImportReport {
    pub fn num_queries(&self) -> usize {
        self.splits.iter().map(SplitReport::num_queries).sum()
    }
}

/// Convert the KGReasoning directory `source` into a new dataset.
///
/// The dataset must not exist yet. Mappings and graph splits are always
/// converted; queries only for `config.splits`.
pub fn import_kgreasoning(
    source: &Path,
    dataset: &Dataset,
    config: &ImportConfig,
) -> Result<ImportReport, ImportError> {
    dataset.create()?;

    convert_mapper(&source.join("id2ent.pkl"), &dataset.entity_mapping_location())?;
    convert_mapper(&source.join("id2rel.pkl"), &dataset.relation_mapping_location())?;
    let entities = EntityMapper::from_file(&dataset.entity_mapping_location())?;
    let relations = RelationMapper::from_file(&dataset.relation_mapping_location())?;
    tracing::info!(
        entities = entities.len(),
        relations = relations.len(),
        "converted id mappings"
    );

    convert_graph_splits(source, dataset, &entities, &relations)?;

    let converter = ShapeConverter::new(&entities, &relations);
    let mut report = ImportReport::default();
    let mut done = Vec::with_capacity(config.splits.len());
    for &split in &config.splits {
        if done.contains(&split) {
            continue;
        }
        done.push(split);

        let attacher = AnswerAttacher::load(source, split)?;
        let corpus =
            QueryCorpus::load(&source.join(format!("{}-queries.pkl", split.source_name())))?;
        tracing::debug!(split = %split, queries = corpus.num_instances(), "loaded query corpus");

        let split_report = match config.format {
            RecordFormat::Proto => convert_queries(
                &ProtoFormat::new(&entities, &relations),
                dataset,
                &corpus,
                split,
                &attacher,
                &converter,
                config.lenient,
            )?,
            RecordFormat::Json => convert_queries(
                &GraphFormat,
                dataset,
                &corpus,
                split,
                &attacher,
                &converter,
                config.lenient,
            )?,
        };
        report.splits.push(split_report);
    }
    Ok(report)
}

/// Convert one split's corpus and write one batch per shape.
///
/// Every signature is resolved before anything is written, so a strict run
/// that meets an unknown shape leaves no batch of this split behind.
pub fn convert_queries<F: BuilderFactory>(
    factory: &F,
    dataset: &Dataset,
    corpus: &QueryCorpus,
    split: Split,
    attacher: &AnswerAttacher,
    converter: &ShapeConverter<'_>,
    lenient: bool,
) -> Result<SplitReport, ImportError> {
    let mut resolved: Vec<(QueryShape, &[ShapeInstance])> = Vec::new();
    let mut unknown = Vec::new();
    for group in &corpus.groups {
        match group {
            QueryGroup::Parsed {
                signature,
                instances,
            } => match QueryShape::from_signature(signature) {
                Some(shape) => resolved.push((shape, instances.as_slice())),
                None => unknown.push(signature.to_string()),
            },
            QueryGroup::Unsupported { signature } => unknown.push(signature.clone()),
        }
    }

    if let (false, Some(signature)) = (lenient, unknown.first()) {
        return Err(ImportError::UnknownShape {
            split,
            signature: signature.clone(),
        });
    }
    for signature in &unknown {
        tracing::warn!(
            split = %split,
            signature = %signature,
            "the shape was not found, likely not yet implemented; skipping"
        );
    }

    let mut shapes = Vec::with_capacity(resolved.len());
    for (shape, instances) in resolved {
        let mut records = Vec::with_capacity(instances.len());
        for instance in instances {
            let mut builder = converter.convert(factory, shape, instance)?;
            attacher.attach(&mut builder, instance, converter.entities())?;
            records.push(builder.build()?);
        }

        let bytes = factory.encode_batch(records)?;
        let stats = dataset.write_batch(
            shape.name(),
            split.name(),
            factory.extension(),
            &bytes,
            instances.len(),
        )?;
        tracing::info!(
            split = %split,
            shape = shape.name(),
            count = stats.count,
            hash = %stats.hash,
            "done with shape"
        );
        shapes.push(ShapeReport { shape, stats });
    }

    Ok(SplitReport {
        split,
        shapes,
        skipped: unknown,
    })
}
