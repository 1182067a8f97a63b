//! Content hashing.
//!
//! Cryptographic digests (SHA-256, SHA3-256, BLAKE2b-256, BLAKE3) and
//! xxHash64 are computed incrementally so long payloads observe the task
//! deadline between chunks. Murmur3 x64-128 and SipHash-1-3 run in one pass.

use blake2::digest::consts::U32;
use sha2::Digest;
use siphasher::sip::SipHasher13;
use std::hash::Hasher;
use std::io::Cursor;
use std::str::FromStr;
use xxhash_rust::xxh64::Xxh64;

use crate::domain::{HashOutput, OperationOutput, OperationRequest};
use crate::error::OperationError;
use crate::ports::{ExecutionContext, OperationModule};

/// Bytes hashed between deadline checks.
const CHUNK_SIZE: usize = 64 * 1024;

/// Seed for Murmur3.
const MURMUR_SEED: u32 = 0;

/// Seed for xxHash64.
const XXH_SEED: u64 = 0;

type Blake2b256 = blake2::Blake2b<U32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha3_256,
    Blake2b256,
    Blake3,
    Murmur3,
    XxHash64,
    SipHash,
}

impl FromStr for HashAlgorithm {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha3_256" | "sha3-256" | "sha3" => Ok(HashAlgorithm::Sha3_256),
            "blake2b_256" | "blake2b" | "blake2" => Ok(HashAlgorithm::Blake2b256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            "murmur3" | "murmur" => Ok(HashAlgorithm::Murmur3),
            "xxhash64" | "xxh64" | "fast" => Ok(HashAlgorithm::XxHash64),
            "siphash" | "siphash13" => Ok(HashAlgorithm::SipHash),
            other => Err(OperationError::InvalidRequest(format!(
                "unknown hash algorithm '{}'",
                other
            ))),
        }
    }
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 7] = [
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Blake2b256,
        HashAlgorithm::Blake3,
        HashAlgorithm::Murmur3,
        HashAlgorithm::XxHash64,
        HashAlgorithm::SipHash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha3_256 => "sha3_256",
            HashAlgorithm::Blake2b256 => "blake2b_256",
            HashAlgorithm::Blake3 => "blake3",
            HashAlgorithm::Murmur3 => "murmur3",
            HashAlgorithm::XxHash64 => "xxhash64",
            HashAlgorithm::SipHash => "siphash",
        }
    }

    pub fn is_cryptographic(&self) -> bool {
        matches!(
            self,
            HashAlgorithm::Sha256
                | HashAlgorithm::Sha3_256
                | HashAlgorithm::Blake2b256
                | HashAlgorithm::Blake3
        )
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256
            | HashAlgorithm::Sha3_256
            | HashAlgorithm::Blake2b256
            | HashAlgorithm::Blake3 => 32,
            HashAlgorithm::Murmur3 => 16,
            HashAlgorithm::XxHash64 | HashAlgorithm::SipHash => 8,
        }
    }

    /// Hash `data` without a deadline.
    pub fn digest(&self, data: &[u8]) -> Result<Vec<u8>, OperationError> {
        self.digest_with(data, || Ok(()))
    }

    fn digest_with<C>(&self, data: &[u8], check: C) -> Result<Vec<u8>, OperationError>
    where
        C: Fn() -> Result<(), OperationError>,
    {
        match self {
            HashAlgorithm::Sha256 => chunked::<sha2::Sha256, _>(data, check),
            HashAlgorithm::Sha3_256 => chunked::<sha3::Sha3_256, _>(data, check),
            HashAlgorithm::Blake2b256 => chunked::<Blake2b256, _>(data, check),
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                for chunk in data.chunks(CHUNK_SIZE) {
                    check()?;
                    hasher.update(chunk);
                }
                Ok(hasher.finalize().as_bytes().to_vec())
            }
            HashAlgorithm::Murmur3 => {
                let hash = murmur3::murmur3_x64_128(&mut Cursor::new(data), MURMUR_SEED)
                    .map_err(|e| OperationError::Internal(format!("murmur3: {}", e)))?;
                Ok(hash.to_be_bytes().to_vec())
            }
            HashAlgorithm::XxHash64 => {
                let mut hasher = Xxh64::new(XXH_SEED);
                for chunk in data.chunks(CHUNK_SIZE) {
                    check()?;
                    hasher.update(chunk);
                }
                Ok(hasher.digest().to_be_bytes().to_vec())
            }
            HashAlgorithm::SipHash => {
                let mut hasher = SipHasher13::new();
                hasher.write(data);
                Ok(hasher.finish().to_be_bytes().to_vec())
            }
        }
    }
}

fn chunked<D, C>(data: &[u8], check: C) -> Result<Vec<u8>, OperationError>
where
    D: Digest,
    C: Fn() -> Result<(), OperationError>,
{
    let mut hasher = D::new();
    for chunk in data.chunks(CHUNK_SIZE) {
        check()?;
        hasher.update(chunk);
    }
    Ok(hasher.finalize().to_vec())
}

/// Built-in module for [`OperationRequest::Hash`].
#[derive(Debug, Default)]
pub struct HashModule;

impl OperationModule for HashModule {
    fn name(&self) -> &str {
        "hash"
    }

    fn execute(
        &self,
        request: &OperationRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError> {
        let OperationRequest::Hash { algo, payload } = request else {
            return Err(OperationError::InvalidRequest(format!(
                "hash module cannot execute {} requests",
                request.kind()
            )));
        };
        let algorithm: HashAlgorithm = algo.parse()?;
        let digest = algorithm.digest_with(payload, || ctx.check_deadline())?;

        let mut scratch = ctx.buffers.bytes.acquire(digest.len() * 2);
        hex::encode_to_slice(&digest, &mut scratch)
            .map_err(|e| OperationError::Internal(format!("hex encoding: {}", e)))?;
        let hex = String::from_utf8(scratch.to_vec())
            .map_err(|e| OperationError::Internal(format!("hex encoding: {}", e)))?;

        Ok(OperationOutput::Hash(HashOutput {
            algorithm: algorithm.as_str().to_string(),
            hex,
            bytes_hashed: payload.len(),
        }))
    }
}
