//! Content digests for converted batches.
//!
//! Batch statistics carry a tag derived from the encoded batch bytes so that
//! consumers can tell whether two conversions produced the same records.
//!
//! - algorithm: **FNV-1a 64-bit**
//! - input: the encoded record batch, as written
//! - output: `"fnv1a64:<16 lowercase hex digits>"`
//!
//! This is not a security primitive; it identifies content, nothing more.

/// Prefix used in serialized digests.
pub const DIGEST_V1_PREFIX: &str = "fnv1a64:";

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001b3;

/// Compute a v1 digest (FNV-1a 64-bit) over arbitrary bytes.
pub fn fnv1a64_digest_bytes(bytes: &[u8]) -> String {
    let mut hash = FNV_OFFSET_BASIS;
    for b in bytes {
        hash ^= (*b) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    format!("{DIGEST_V1_PREFIX}{hash:016x}")
}
