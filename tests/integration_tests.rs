//! Integration tests for the complete QueryGraph import pipeline
//!
//! These tests write a small KGReasoning directory (pickles and triple
//! files) and run the importer end to end:
//! - id mappings → mapping text files
//! - graph splits → N-Triples style split files
//! - query pickles → one record batch per (shape, split), with stats
//!
//! Run with: cargo test --test integration_tests

use prost::Message;
use querygraph_builder::graph::QueryGraphBatch;
use querygraph_builder::proto::{term, QueryData, Term};
use querygraph_dsl::digest::fnv1a64_digest_bytes;
use querygraph_dsl::{Nested, QueryShape, ShapeInstance, ShapeSignature};
use querygraph_ingest_kgreasoning::{
    import_kgreasoning, ImportConfig, ImportError, RecordFormat, Split,
};
use querygraph_storage::{Dataset, StorageError};
use serde_pickle::{HashableValue, SerOptions, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

// ============================================================================
// Fixture
// ============================================================================

const NUM_ENTITIES: usize = 12;
const NUM_RELATION_PAIRS: usize = 4;

fn id(v: u32) -> ShapeInstance {
    Nested::Leaf(v)
}

fn path(anchor: u32, rels: &[u32]) -> ShapeInstance {
    Nested::tuple([id(anchor), Nested::tuple(rels.iter().copied().map(id))])
}

/// The subset of Python values the KGReasoning pickles are made of.
#[derive(Debug, Clone)]
enum Py {
    Int(i32),
    Str(&'static str),
    Tuple(Vec<Py>),
}

fn instance_value(q: &ShapeInstance) -> Py {
    match q {
        Nested::Leaf(v) => Py::Int(i32::try_from(*v).unwrap()),
        Nested::Tuple(items) => Py::Tuple(items.iter().map(instance_value).collect()),
    }
}

fn signature_value(s: &ShapeSignature) -> Py {
    match s {
        Nested::Leaf(p) => Py::Str(p.token()),
        Nested::Tuple(items) => Py::Tuple(items.iter().map(signature_value).collect()),
    }
}

fn put(out: &mut Vec<u8>, value: &Py) {
    match value {
        Py::Int(v) => {
            out.push(b'J');
            out.extend_from_slice(&v.to_le_bytes());
        }
        Py::Str(s) => {
            out.push(b'X');
            out.extend_from_slice(&u32::try_from(s.len()).unwrap().to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Py::Tuple(items) => {
            out.push(b'(');
            for item in items {
                put(out, item);
            }
            out.push(b't');
        }
    }
}

/// `collections.defaultdict(set)` in protocol 3, the way Python lays it out:
/// keys and set members are written in the order given.
fn defaultdict_of_sets(entries: &[(Py, Vec<Py>)]) -> Vec<u8> {
    let mut out = b"\x80\x03ccollections\ndefaultdict\ncbuiltins\nset\n\x85R(".to_vec();
    for (key, members) in entries {
        put(&mut out, key);
        out.extend_from_slice(b"cbuiltins\nset\n](");
        for member in members {
            put(&mut out, member);
        }
        out.extend_from_slice(b"e\x85R");
    }
    out.extend_from_slice(b"u.");
    out
}

fn write_pickle(path: &Path, value: Value) {
    fs::write(path, serde_pickle::value_to_vec(&value, SerOptions::new()).unwrap()).unwrap();
}

fn write_id2x(path: &Path, labels: &[String]) {
    let dict = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (HashableValue::I64(i as i64), Value::String(l.clone())))
        .collect();
    write_pickle(path, Value::Dict(dict));
}

type Group = (Py, Vec<ShapeInstance>);

fn group(shape: QueryShape, instances: Vec<ShapeInstance>) -> Group {
    (signature_value(&shape.signature()), instances)
}

fn write_queries(path: &Path, groups: &[Group]) {
    let entries: Vec<(Py, Vec<Py>)> = groups
        .iter()
        .map(|(sig, qs)| (sig.clone(), qs.iter().map(instance_value).collect()))
        .collect();
    fs::write(path, defaultdict_of_sets(&entries)).unwrap();
}

fn write_answers(path: &Path, groups: &[Group], answers: impl Fn(&ShapeInstance) -> Vec<u32>) {
    let entries: Vec<(Py, Vec<Py>)> = groups
        .iter()
        .flat_map(|(_, qs)| qs.iter())
        .map(|q| {
            let ids = answers(q)
                .into_iter()
                .map(|a| Py::Int(i32::try_from(a).unwrap()))
                .collect();
            (instance_value(q), ids)
        })
        .collect();
    fs::write(path, defaultdict_of_sets(&entries)).unwrap();
}

fn train_groups() -> Vec<Group> {
    vec![
        // Deliberately not in sorted order.
        group(QueryShape::OneHop, vec![path(6, &[5]), path(5, &[4])]),
        group(
            QueryShape::TwoIntersection,
            vec![Nested::tuple([path(3, &[2]), path(7, &[6])])],
        ),
    ]
}

fn valid_groups() -> Vec<Group> {
    vec![
        group(QueryShape::TwoHop, vec![path(1, &[0, 3])]),
        group(
            QueryShape::ThreeIntersection,
            vec![Nested::tuple([path(1, &[0]), path(2, &[2]), path(3, &[4])])],
        ),
    ]
}

fn test_groups() -> Vec<Group> {
    vec![
        group(
            QueryShape::HopThenIntersection,
            vec![Nested::tuple([path(1, &[2, 4]), path(3, &[7])])],
        ),
        group(QueryShape::ThreeHop, vec![path(1, &[0, 2, 4])]),
        group(
            QueryShape::IntersectionThenHop,
            vec![Nested::tuple([
                Nested::tuple([path(1, &[2]), path(3, &[5])]),
                Nested::tuple([id(6)]),
            ])],
        ),
    ]
}

/// `('e', ('r', 'r', 'r', 'r'))`: a four-hop chain no converter handles.
fn four_hop_group() -> Group {
    let sig = Py::Tuple(vec![Py::Str("e"), Py::Tuple(vec![Py::Str("r"); 4])]);
    (sig, vec![path(1, &[0, 2, 4, 6])])
}

fn write_source(dir: &Path, extra_valid: Option<Group>) {
    let entities: Vec<String> = (0..NUM_ENTITIES).map(|i| format!("/m/ent{i}")).collect();
    let relations: Vec<String> = (0..NUM_RELATION_PAIRS)
        .flat_map(|k| [format!("+/rel{k}"), format!("-/rel{k}")])
        .collect();
    write_id2x(&dir.join("id2ent.pkl"), &entities);
    write_id2x(&dir.join("id2rel.pkl"), &relations);

    fs::write(dir.join("train.txt"), "0\t0\t1\n1\t2\t2\n").unwrap();
    fs::write(dir.join("valid.txt"), "2\t4\t3\n").unwrap();
    fs::write(dir.join("test.txt"), "3\t7\t4\n").unwrap();

    let train = train_groups();
    write_queries(&dir.join("train-queries.pkl"), &train);
    write_answers(&dir.join("train-answers.pkl"), &train, |_| vec![9, 10]);

    let mut valid = valid_groups();
    valid.extend(extra_valid);
    write_queries(&dir.join("valid-queries.pkl"), &valid);
    write_answers(&dir.join("valid-easy-answers.pkl"), &valid, |_| vec![0]);
    write_answers(&dir.join("valid-hard-answers.pkl"), &valid, |_| vec![11]);

    let test = test_groups();
    write_queries(&dir.join("test-queries.pkl"), &test);
    write_answers(&dir.join("test-easy-answers.pkl"), &test, |_| vec![2, 4]);
    write_answers(&dir.join("test-hard-answers.pkl"), &test, |_| vec![8]);
}

fn json_config() -> ImportConfig {
    ImportConfig {
        format: RecordFormat::Json,
        ..ImportConfig::default()
    }
}

fn read_json_batch(dataset: &Dataset, shape: &str, split: &str) -> QueryGraphBatch {
    let bytes = fs::read(dataset.batch_location(shape, split, "json")).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn triples(batch: &QueryGraphBatch, query: usize) -> Vec<(String, String, String)> {
    batch.queries[query]
        .triples
        .iter()
        .map(|t| (t.subject.clone(), t.predicate.clone(), t.object.clone()))
        .collect()
}

fn t(s: &str, p: &str, o: &str) -> (String, String, String) {
    (s.to_string(), p.to_string(), o.to_string())
}

// ============================================================================
// Mappings and graph splits
// ============================================================================

#[test]
fn test_mappings_and_graph_splits_are_converted() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), None);
    let dataset = Dataset::new(dir.path().join("dataset"));

    import_kgreasoning(dir.path(), &dataset, &ImportConfig::default()).unwrap();

    let entities = fs::read_to_string(dataset.entity_mapping_location()).unwrap();
    assert_eq!(entities.lines().count(), NUM_ENTITIES);
    assert!(entities.starts_with("/m/ent0\n/m/ent1\n"));
    assert!(!entities.ends_with('\n'));

    let relations = fs::read_to_string(dataset.relation_mapping_location()).unwrap();
    assert_eq!(relations.lines().next(), Some("+/rel0"));
    assert_eq!(relations.lines().nth(1), Some("-/rel0"));

    assert_eq!(
        fs::read_to_string(dataset.split_triples_location("train")).unwrap(),
        "</m/ent0> <+/rel0> </m/ent1> .\n</m/ent1> <+/rel1> </m/ent2> .\n"
    );
    assert_eq!(
        fs::read_to_string(dataset.split_triples_location("validation")).unwrap(),
        "</m/ent2> <+/rel2> </m/ent3> .\n"
    );
    assert_eq!(
        fs::read_to_string(dataset.split_triples_location("test")).unwrap(),
        "</m/ent3> <-/rel3> </m/ent4> .\n"
    );
}

// ============================================================================
// Query conversion
// ============================================================================

#[test]
fn test_train_queries_polarity_and_answers() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), None);
    let dataset = Dataset::new(dir.path().join("dataset"));

    let report = import_kgreasoning(dir.path(), &dataset, &json_config()).unwrap();
    assert_eq!(report.splits.len(), 3);
    assert!(report.splits.iter().all(|s| s.skipped.is_empty()));

    let one_hop = read_json_batch(&dataset, "1hop", "train");
    assert_eq!(one_hop.queries.len(), 2);
    // (6, (5,)): backward, written reversed over relation 4.
    assert_eq!(triples(&one_hop, 0), vec![t("TARGET", "+/rel2", "/m/ent6")]);
    // (5, (4,)): forward.
    assert_eq!(triples(&one_hop, 1), vec![t("/m/ent5", "+/rel2", "TARGET")]);
    for q in &one_hop.queries {
        assert_eq!(q.diameter, 1);
        assert_eq!(q.easy_targets, vec!["/m/ent9", "/m/ent10"]);
        assert_eq!(q.hard_targets, None);
    }

    let two_i = read_json_batch(&dataset, "2i", "train");
    assert_eq!(
        triples(&two_i, 0),
        vec![
            t("/m/ent3", "+/rel1", "TARGET"),
            t("/m/ent7", "+/rel3", "TARGET"),
        ]
    );
    assert_eq!(two_i.queries[0].diameter, 1);
}

#[test]
fn test_evaluation_queries_carry_easy_and_hard_answers() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), None);
    let dataset = Dataset::new(dir.path().join("dataset"));

    import_kgreasoning(dir.path(), &dataset, &json_config()).unwrap();

    let two_hop = read_json_batch(&dataset, "2hop", "validation");
    assert_eq!(
        triples(&two_hop, 0),
        vec![
            t("/m/ent1", "+/rel0", "?var0"),
            t("TARGET", "+/rel1", "?var0"),
        ]
    );
    assert_eq!(two_hop.queries[0].diameter, 2);
    assert_eq!(two_hop.queries[0].easy_targets, vec!["/m/ent0"]);
    assert_eq!(
        two_hop.queries[0].hard_targets,
        Some(vec!["/m/ent11".to_string()])
    );

    let hop_then_i = read_json_batch(&dataset, "1hop-2i", "test");
    assert_eq!(
        triples(&hop_then_i, 0),
        vec![
            t("/m/ent1", "+/rel1", "?var0"),
            t("?var0", "+/rel2", "TARGET"),
            t("TARGET", "+/rel3", "/m/ent3"),
        ]
    );
    assert_eq!(hop_then_i.queries[0].diameter, 2);
    assert_eq!(hop_then_i.queries[0].easy_targets, vec!["/m/ent2", "/m/ent4"]);

    let three_hop = read_json_batch(&dataset, "3hop", "test");
    assert_eq!(three_hop.queries[0].diameter, 3);
    assert_eq!(three_hop.queries[0].triples.len(), 3);
}

#[test]
fn test_proto_batches_and_stats() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), None);
    let dataset = Dataset::new(dir.path().join("dataset"));

    let report = import_kgreasoning(dir.path(), &dataset, &ImportConfig::default()).unwrap();
    assert_eq!(report.num_queries(), 3 + 2 + 3);

    let bytes = fs::read(dataset.batch_location("2i-1hop", "test", "proto")).unwrap();
    let data = QueryData::decode(bytes.as_slice()).unwrap();
    assert_eq!(data.queries.len(), 1);
    let q = &data.queries[0];
    assert_eq!(q.diameter, 2);
    assert_eq!(q.easy_targets, vec![2, 4]);
    assert_eq!(q.hard_targets, vec![8]);
    let kind = |t: &Option<Term>| t.as_ref().and_then(|t| t.kind.clone());
    assert_eq!(q.triples[1].predicate, 4);
    assert_eq!(kind(&q.triples[1].subject), Some(term::Kind::Variable(0)));
    assert_eq!(kind(&q.triples[1].object), Some(term::Kind::Entity(3)));
    assert_eq!(kind(&q.triples[2].object), Some(term::Kind::Target(true)));
    assert!(data.queries[0].triples.iter().all(|t| t.predicate % 2 == 0));

    let stats = dataset.read_stats("2i-1hop", "test").unwrap();
    assert_eq!(stats.name, "test");
    assert_eq!(stats.count, 1);
    assert_eq!(stats.hash, fnv1a64_digest_bytes(&bytes));

    let test_report = report.splits.iter().find(|s| s.split == Split::Test).unwrap();
    let shapes: Vec<&str> = test_report.shapes.iter().map(|s| s.shape.name()).collect();
    assert_eq!(shapes, vec!["1hop-2i", "3hop", "2i-1hop"]);
}

#[test]
fn test_batches_follow_pickle_insertion_order() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), Some(four_hop_group()));
    let dataset = Dataset::new(dir.path().join("dataset"));
    let config = ImportConfig {
        lenient: true,
        ..json_config()
    };

    let report = import_kgreasoning(dir.path(), &dataset, &config).unwrap();
    let order: Vec<(Split, Vec<&str>)> = report
        .splits
        .iter()
        .map(|s| (s.split, s.shapes.iter().map(|r| r.shape.name()).collect()))
        .collect();
    assert_eq!(
        order,
        vec![
            (Split::Train, vec!["1hop", "2i"]),
            (Split::Validation, vec!["2hop", "3i"]),
            (Split::Test, vec!["1hop-2i", "3hop", "2i-1hop"]),
        ]
    );

    // Instances keep their order within a signature too.
    let one_hop = read_json_batch(&dataset, "1hop", "train");
    let anchors: Vec<&str> = one_hop
        .queries
        .iter()
        .map(|q| {
            let t = &q.triples[0];
            if t.subject == "TARGET" {
                t.object.as_str()
            } else {
                t.subject.as_str()
            }
        })
        .collect();
    assert_eq!(anchors, vec!["/m/ent6", "/m/ent5"]);
}

// ============================================================================
// Unknown shapes and configuration
// ============================================================================

#[test]
fn test_lenient_import_skips_unknown_shape() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), Some(four_hop_group()));
    let dataset = Dataset::new(dir.path().join("dataset"));
    let config = ImportConfig {
        lenient: true,
        ..json_config()
    };

    let report = import_kgreasoning(dir.path(), &dataset, &config).unwrap();
    let valid = report
        .splits
        .iter()
        .find(|s| s.split == Split::Validation)
        .unwrap();
    assert_eq!(valid.skipped, vec!["('e', ('r', 'r', 'r', 'r'))".to_string()]);
    assert_eq!(valid.shapes.len(), 2);
    assert!(dataset.stats_location("2hop", "validation").is_file());
    assert!(dataset.stats_location("3i", "validation").is_file());
}

#[test]
fn test_strict_import_fails_on_unknown_shape() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), Some(four_hop_group()));
    let dataset = Dataset::new(dir.path().join("dataset"));

    let err = import_kgreasoning(dir.path(), &dataset, &json_config()).unwrap_err();
    match err {
        ImportError::UnknownShape { split, signature } => {
            assert_eq!(split, Split::Validation);
            assert_eq!(signature, "('e', ('r', 'r', 'r', 'r'))");
        }
        other => panic!("unexpected error: {other}"),
    }
    // The train split came first and is complete; nothing of validation was written.
    assert!(dataset.batch_location("1hop", "train", "json").is_file());
    assert!(!dataset.batch_location("2hop", "validation", "json").exists());
    assert!(!dataset.batch_location("3i", "validation", "json").exists());
}

#[test]
fn test_split_selection() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), None);
    let dataset = Dataset::new(dir.path().join("dataset"));
    let config = ImportConfig {
        splits: vec![Split::Test],
        ..json_config()
    };

    let report = import_kgreasoning(dir.path(), &dataset, &config).unwrap();
    assert_eq!(report.splits.len(), 1);
    assert!(!dataset.shape_location("1hop").exists());
    assert!(dataset.batch_location("3hop", "test", "json").is_file());
    // Graph splits are converted regardless of the query splits.
    assert!(dataset.split_triples_location("train").is_file());
}

#[test]
fn test_existing_dataset_is_not_overwritten() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), None);
    let dataset = Dataset::new(dir.path().join("dataset"));
    fs::create_dir_all(dataset.location()).unwrap();

    let err = import_kgreasoning(dir.path(), &dataset, &ImportConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Storage(StorageError::AlreadyExists(_))
    ));
}

#[test]
fn test_import_is_deterministic() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), None);
    let first = Dataset::new(dir.path().join("first"));
    let second = Dataset::new(dir.path().join("second"));

    import_kgreasoning(dir.path(), &first, &ImportConfig::default()).unwrap();
    import_kgreasoning(dir.path(), &second, &ImportConfig::default()).unwrap();

    for shape in QueryShape::ALL {
        for split in Split::ALL {
            let a = first.batch_location(shape.name(), split.name(), "proto");
            if !a.exists() {
                continue;
            }
            let b = second.batch_location(shape.name(), split.name(), "proto");
            assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap(), "{}", a.display());
            assert_eq!(
                first.read_stats(shape.name(), split.name()).unwrap(),
                second.read_stats(shape.name(), split.name()).unwrap()
            );
        }
    }
}

#[test]
fn test_missing_answer_file_is_reported() {
    let dir = tempdir().unwrap();
    write_source(dir.path(), None);
    fs::remove_file(dir.path().join("test-hard-answers.pkl")).unwrap();
    let dataset = Dataset::new(dir.path().join("dataset"));
    let config = ImportConfig {
        splits: vec![Split::Test],
        ..ImportConfig::default()
    };

    let err = import_kgreasoning(dir.path(), &dataset, &config).unwrap_err();
    assert!(matches!(err, ImportError::Io { .. }));
    assert!(err.to_string().contains("test-hard-answers.pkl"), "{err}");
}
