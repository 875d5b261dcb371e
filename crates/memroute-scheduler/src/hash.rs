//! Hash-method registry.
//!
//! Every scheduler hashes keys with one of these functions, chosen by
//! name when the scheduler is built. All of them map bytes to a `u32`
//! deterministically.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SchedulerError;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// A named 32-bit hash function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMethod {
    /// Plain 32-bit FNV-1a.
    Fnv1a,
    /// FNV-1a with an extra avalanche step, the cluster default.
    #[default]
    Fnv1a1,
    /// First four bytes of SHA-256, little-endian.
    Sha256,
    /// First four bytes of MD5, little-endian.
    Md5,
    /// IEEE CRC-32.
    Crc32,
}

impl HashMethod {
    pub const ALL: [HashMethod; 5] = [
        HashMethod::Fnv1a,
        HashMethod::Fnv1a1,
        HashMethod::Sha256,
        HashMethod::Md5,
        HashMethod::Crc32,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HashMethod::Fnv1a => "fnv1a",
            HashMethod::Fnv1a1 => "fnv1a1",
            HashMethod::Sha256 => "sha256",
            HashMethod::Md5 => "md5",
            HashMethod::Crc32 => "crc32",
        }
    }

    pub fn hash(self, data: &[u8]) -> u32 {
        match self {
            HashMethod::Fnv1a => fnv1a(data),
            HashMethod::Fnv1a1 => fnv1a1(data),
            HashMethod::Sha256 => digest_prefix::<Sha256>(data),
            HashMethod::Md5 => digest_prefix::<Md5>(data),
            HashMethod::Crc32 => crc32fast::hash(data),
        }
    }
}

impl FromStr for HashMethod {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashMethod::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| SchedulerError::UnknownHashMethod(s.to_string()))
    }
}

impl fmt::Display for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn fnv1a(data: &[u8]) -> u32 {
    data.iter().fold(FNV_OFFSET_BASIS, |h, &b| {
        (h ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

fn fnv1a1(data: &[u8]) -> u32 {
    let mut h = fnv1a(data);
    h = h.wrapping_add(h << 13);
    h ^= h >> 7;
    h = h.wrapping_add(h << 3);
    h ^= h >> 17;
    h = h.wrapping_add(h << 5);
    h
}

fn digest_prefix<D: Digest>(data: &[u8]) -> u32 {
    let digest = D::digest(data);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}
