//! Pickle decoding.
//!
//! KGReasoning pickles hold dicts keyed by nested tuples of ints (query
//! instances) or of `'e'`/`'r'` strings (query signatures). We decode them
//! through serde into `PickleTerm` trees and only then interpret them, so
//! that a malformed term is reported with the file it came from.
//!
//! Dicts are decoded into `OrderedMap`, which keeps the order the pairs have
//! in the pickle stream; collections keep their stream order as well.
//!
//! Query and answer files are `collections.defaultdict(set)` objects. The
//! decoder only knows a handful of globals, so the leading `defaultdict`
//! global is renamed to `copyreg._reconstructor`, which it reduces to an
//! empty dict; the `SETITEMS` that follow then fill that dict. Opcodes and
//! memo slots are left as they are.

use crate::ImportError;
use querygraph_dsl::{Nested, Placeholder, ShapeInstance, ShapeSignature};
use serde::de::{self, DeserializeOwned, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

/// Decode a pickle file into `T`.
pub fn read_pickle<T: DeserializeOwned>(path: &Path) -> Result<T, ImportError> {
    let bytes = std::fs::read(path).map_err(ImportError::io(path))?;
    let bytes = rewrite_defaultdict(&bytes);
    serde_pickle::from_slice(&bytes, serde_pickle::DeOptions::new()).map_err(|source| {
        ImportError::Pickle {
            path: path.to_path_buf(),
            source,
        }
    })
}

// ============================================================================
// defaultdict
// ============================================================================

const PROTO: u8 = 0x80;
const FRAME: u8 = 0x95;
const GLOBAL: u8 = b'c';
const SHORT_BINUNICODE: u8 = 0x8c;
const MEMOIZE: u8 = 0x94;
const STACK_GLOBAL: u8 = 0x93;

const DEFAULTDICT: (&[u8], &[u8]) = (b"collections", b"defaultdict");
const RECONSTRUCTOR: (&[u8], &[u8]) = (b"copyreg", b"_reconstructor");

/// Rename a leading `collections.defaultdict` global; other streams are
/// returned untouched.
fn rewrite_defaultdict(bytes: &[u8]) -> Cow<'_, [u8]> {
    let mut start = 0;
    if bytes.first() == Some(&PROTO) {
        start += 2;
    }
    // Frame lengths are not checked by the decoder.
    if bytes.get(start) == Some(&FRAME) {
        start += 9;
    }
    let Some(body) = bytes.get(start..) else {
        return Cow::Borrowed(bytes);
    };

    let rewritten = rewrite_global(body).or_else(|| rewrite_stack_global(body));
    match rewritten {
        Some(body) => {
            let mut out = Vec::with_capacity(start + body.len());
            out.extend_from_slice(&bytes[..start]);
            out.extend_from_slice(&body);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(bytes),
    }
}

/// Protocols 0 to 3: `c<module>\n<name>\n`.
fn rewrite_global(body: &[u8]) -> Option<Vec<u8>> {
    let rest = body.strip_prefix(&[GLOBAL])?;
    let rest = strip_line(rest, DEFAULTDICT.0)?;
    let rest = strip_line(rest, DEFAULTDICT.1)?;

    let mut out = vec![GLOBAL];
    for part in [RECONSTRUCTOR.0, RECONSTRUCTOR.1] {
        out.extend_from_slice(part);
        out.push(b'\n');
    }
    out.extend_from_slice(rest);
    Some(out)
}

/// Protocol 4 and later: two short strings, each optionally memoized, then
/// `STACK_GLOBAL`.
fn rewrite_stack_global(body: &[u8]) -> Option<Vec<u8>> {
    let rest = strip_short_str(body, DEFAULTDICT.0)?;
    let (module_memo, rest) = strip_memoize(rest);
    let rest = strip_short_str(rest, DEFAULTDICT.1)?;
    let (name_memo, rest) = strip_memoize(rest);
    let rest = rest.strip_prefix(&[STACK_GLOBAL])?;

    let mut out = Vec::with_capacity(body.len());
    for (part, memo) in [(RECONSTRUCTOR.0, module_memo), (RECONSTRUCTOR.1, name_memo)] {
        out.push(SHORT_BINUNICODE);
        out.push(u8::try_from(part.len()).ok()?);
        out.extend_from_slice(part);
        if memo {
            out.push(MEMOIZE);
        }
    }
    out.push(STACK_GLOBAL);
    out.extend_from_slice(rest);
    Some(out)
}

fn strip_line<'b>(input: &'b [u8], text: &[u8]) -> Option<&'b [u8]> {
    input.strip_prefix(text)?.strip_prefix(b"\n")
}

fn strip_short_str<'b>(input: &'b [u8], text: &[u8]) -> Option<&'b [u8]> {
    let (&op, rest) = input.split_first()?;
    let (&len, rest) = rest.split_first()?;
    if op != SHORT_BINUNICODE || usize::from(len) != text.len() {
        return None;
    }
    rest.strip_prefix(text)
}

fn strip_memoize(input: &[u8]) -> (bool, &[u8]) {
    match input.strip_prefix(&[MEMOIZE]) {
        Some(rest) => (true, rest),
        None => (false, input),
    }
}

// ============================================================================
// Terms
// ============================================================================

/// An int, a string, or a tuple/collection of terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PickleTerm {
    Int(i64),
    Str(String),
    Tuple(Vec<PickleTerm>),
}

impl PickleTerm {
    pub fn to_id(&self) -> Result<u32, String> {
        match self {
            PickleTerm::Int(v) => {
                u32::try_from(*v).map_err(|_| format!("id {v} is outside 0..=u32::MAX"))
            }
            other => Err(format!("expected an integer id, found {other}")),
        }
    }

    pub fn to_instance(&self) -> Result<ShapeInstance, String> {
        match self {
            PickleTerm::Tuple(items) => items
                .iter()
                .map(PickleTerm::to_instance)
                .collect::<Result<Vec<_>, _>>()
                .map(Nested::Tuple),
            leaf => leaf.to_id().map(Nested::Leaf),
        }
    }

    pub fn to_signature(&self) -> Result<ShapeSignature, String> {
        match self {
            PickleTerm::Tuple(items) => items
                .iter()
                .map(PickleTerm::to_signature)
                .collect::<Result<Vec<_>, _>>()
                .map(Nested::Tuple),
            PickleTerm::Str(token) => Placeholder::from_token(token)
                .map(Nested::Leaf)
                .ok_or_else(|| format!("unknown signature token '{token}'")),
            PickleTerm::Int(v) => Err(format!("expected a signature token, found {v}")),
        }
    }
}

impl fmt::Display for PickleTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickleTerm::Int(v) => write!(f, "{v}"),
            PickleTerm::Str(s) => write!(f, "'{s}'"),
            PickleTerm::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl<'de> Deserialize<'de> for PickleTerm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TermVisitor)
    }
}

struct TermVisitor;

impl<'de> Visitor<'de> for TermVisitor {
    type Value = PickleTerm;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an int, a string or a tuple")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PickleTerm, E> {
        Ok(PickleTerm::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PickleTerm, E> {
        i64::try_from(v)
            .map(PickleTerm::Int)
            .map_err(|_| E::custom(format!("integer {v} is too large")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PickleTerm, E> {
        Ok(PickleTerm::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<PickleTerm, E> {
        Ok(PickleTerm::Str(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<PickleTerm, E> {
        std::str::from_utf8(v)
            .map(|s| PickleTerm::Str(s.to_string()))
            .map_err(|_| E::invalid_value(de::Unexpected::Bytes(v), &self))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PickleTerm, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(PickleTerm::Tuple(items))
    }
}

// ============================================================================
// Order-preserving dicts
// ============================================================================

/// Dict pairs in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<K, V>(pub Vec<(K, V)>);

impl<'de, K: Deserialize<'de>, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<K, V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

struct OrderedMapVisitor<K, V>(PhantomData<(K, V)>);

impl<'de, K: Deserialize<'de>, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<K, V> {
    type Value = OrderedMap<K, V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a dict")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(pair) = map.next_entry()? {
            pairs.push(pair);
        }
        Ok(OrderedMap(pairs))
    }
}

// ============================================================================
// Query corpus
// ============================================================================

/// One signature of a query file with its instances.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryGroup {
    Parsed {
        signature: ShapeSignature,
        instances: Vec<ShapeInstance>,
    },
    /// Tokens other than `'e'` and `'r'` (negation, union). Instances are not
    /// decoded.
    Unsupported { signature: String },
}

/// The queries of one split, grouped by signature, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryCorpus {
    pub groups: Vec<QueryGroup>,
}

impl QueryCorpus {
    pub fn new(shapes: Vec<(ShapeSignature, Vec<ShapeInstance>)>) -> Self {
        Self {
            groups: shapes
                .into_iter()
                .map(|(signature, instances)| QueryGroup::Parsed {
                    signature,
                    instances,
                })
                .collect(),
        }
    }

    /// Read `<split>-queries.pkl`: signature → collection of instances.
    pub fn load(path: &Path) -> Result<Self, ImportError> {
        let raw: OrderedMap<PickleTerm, Vec<PickleTerm>> = read_pickle(path)?;
        let invalid = |detail: String| ImportError::InvalidTerm {
            path: path.to_path_buf(),
            detail,
        };

        let mut groups = Vec::with_capacity(raw.0.len());
        for (signature, instances) in raw.0 {
            let signature = match signature.to_signature() {
                Ok(signature) => signature,
                Err(detail) => {
                    tracing::debug!(path = %path.display(), signature = %signature, %detail, "unsupported signature");
                    groups.push(QueryGroup::Unsupported {
                        signature: signature.to_string(),
                    });
                    continue;
                }
            };
            let instances = instances
                .iter()
                .map(PickleTerm::to_instance)
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid)?;
            groups.push(QueryGroup::Parsed {
                signature,
                instances,
            });
        }
        Ok(Self { groups })
    }

    pub fn num_instances(&self) -> usize {
        self.groups
            .iter()
            .map(|group| match group {
                QueryGroup::Parsed { instances, .. } => instances.len(),
                QueryGroup::Unsupported { .. } => 0,
            })
            .sum()
    }
}
