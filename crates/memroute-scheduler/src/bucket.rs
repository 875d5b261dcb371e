//! Bucket addressing.
//!
//! A key maps to the bucket named by the top `bucket_width` bits of its
//! hash, so a bucket index is a prefix of the hash and buckets can be
//! addressed directly by hex prefix. Two escapes exist for
//! administrative keys:
//!
//! - `@<hex>`: the next `bucket_width / 4` characters are the bucket
//!   index in hex, no hashing involved.
//! - `?<key>`: the `?` is stripped and the rest is hashed, so ordinary
//!   keys that happen to start with `@` can still be routed by hash.

use crate::hash::HashMethod;

/// `floor(log2(bucket_count))`; zero for a single bucket.
pub fn bucket_width(bucket_count: usize) -> u32 {
    if bucket_count <= 1 {
        0
    } else {
        bucket_count.ilog2()
    }
}

/// Map `key` to a bucket index in `[0, bucket_count)`.
pub fn bucket_of(hash: HashMethod, bucket_count: usize, key: &str) -> usize {
    let width = bucket_width(bucket_count);
    let digits = (width / 4) as usize;
    let bytes = key.as_bytes();

    if bytes.len() > digits && bytes[0] == b'@' {
        return parse_hex_prefix(&bytes[1..=digits]);
    }

    let key = key.strip_prefix('?').unwrap_or(key);
    let h = hash.hash(key.as_bytes());
    if width == 0 {
        0
    } else {
        (h >> (32 - width)) as usize
    }
}

/// Group keys by bucket, keeping each key's relative order.
pub fn divide_keys_by_bucket(
    hash: HashMethod,
    bucket_count: usize,
    keys: &[String],
) -> Vec<Vec<String>> {
    let mut groups = vec![Vec::new(); bucket_count];
    for key in keys {
        groups[bucket_of(hash, bucket_count, key)].push(key.clone());
    }
    groups
}

/// Base-16, case-insensitive; characters that are not hex digits count as 0.
fn parse_hex_prefix(digits: &[u8]) -> usize {
    digits.iter().fold(0usize, |acc, &b| {
        acc * 16 + char::from(b).to_digit(16).unwrap_or(0) as usize
    })
}
