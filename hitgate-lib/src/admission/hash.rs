//! Key fingerprinting.
//!
//! A [`HashProvider`] turns a key into a [`Fingerprint`]. The byte form of a key
//! comes from a [`KeyEncoder`]; an encoder may fail, in which case the provider
//! logs the failure and falls back to [`SENTINEL_FINGERPRINT`].

use std::borrow::Cow;
use std::fmt::Debug;
use std::marker::PhantomData;

use ahash::RandomState;
use tracing::warn;

use super::record::{Fingerprint, SENTINEL_FINGERPRINT};
use crate::error::{GateError, Result};

// Fixed seeds keep fingerprints stable across provider instances and restarts.
const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Maps a key to its fingerprint.
pub trait HashProvider<K: ?Sized>: Send + Sync {
    fn get(&self, key: &K) -> Fingerprint;
}

/// Produces the byte representation a key is hashed from.
pub trait KeyEncoder<K: ?Sized>: Send + Sync {
    fn encode<'a>(&self, key: &'a K) -> Result<Cow<'a, [u8]>>;
}

/// Hashes the raw bytes of anything that is `AsRef<[u8]>` (`str`, `String`, `Vec<u8>`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBytes;

impl<K: AsRef<[u8]> + ?Sized> KeyEncoder<K> for RawBytes {
    fn encode<'a>(&self, key: &'a K) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(key.as_ref()))
    }
}

/// Requires the key to be valid UTF-8 before hashing it.
///
/// Useful when keys arrive as raw bytes (for example straight off the wire) and
/// only textual keys should get their own counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Bytes;

impl<K: AsRef<[u8]> + ?Sized> KeyEncoder<K> for Utf8Bytes {
    fn encode<'a>(&self, key: &'a K) -> Result<Cow<'a, [u8]>> {
        let bytes = key.as_ref();
        std::str::from_utf8(bytes)
            .map(|s| Cow::Borrowed(s.as_bytes()))
            .map_err(|e| GateError::KeyEncoding(e.to_string()))
    }
}

/// [`HashProvider`] backed by `ahash` with fixed seeds.
///
/// Each call builds a fresh hasher, so no state carries over between keys.
pub struct AHashProvider<K: ?Sized, E = RawBytes> {
    state: RandomState,
    encoder: E,
    _key: PhantomData<fn(&K)>,
}

impl<K: ?Sized> AHashProvider<K, RawBytes> {
    pub fn new() -> Self {
        Self::with_encoder(RawBytes)
    }
}

impl<K: ?Sized> Default for AHashProvider<K, RawBytes> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ?Sized, E> AHashProvider<K, E> {
    pub fn with_encoder(encoder: E) -> Self {
        Self {
            state: RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]),
            encoder,
            _key: PhantomData,
        }
    }
}

impl<K, E> HashProvider<K> for AHashProvider<K, E>
where
    K: Debug + ?Sized,
    E: KeyEncoder<K>,
{
    fn get(&self, key: &K) -> Fingerprint {
        match self.encoder.encode(key) {
            Ok(bytes) => self.state.hash_one(bytes.as_ref()),
            Err(e) => {
                warn!(?key, error = %e, "failed to encode key, using sentinel fingerprint");
                SENTINEL_FINGERPRINT
            }
        }
    }
}

impl<K: ?Sized, H: HashProvider<K> + ?Sized> HashProvider<K> for std::sync::Arc<H> {
    fn get(&self, key: &K) -> Fingerprint {
        (**self).get(key)
    }
}
