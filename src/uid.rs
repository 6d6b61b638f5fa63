//! Shader UIDs
//!
//! A shader UID is a fixed-size, bit-comparable structural key derived from the
//! emulated-hardware state bits relevant to one pipeline stage, plus an embedded
//! format/generation version. Byte equality is identity: two UIDs that would
//! produce the same source text must be identical, and the same state must
//! always reproduce the same UID, across runs and across backends that share a
//! generation version.
//!
//! The generation version is also the disk-cache invalidation mechanism: when
//! the generator's output format changes, the version bump changes every key,
//! so stale records simply never match a lookup — no file-format negotiation.
//!
//! [`UidChecker`] is a debug aid that validates the "no collisions" assumption
//! empirically over the variant space a title actually exercises.

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_128;

// ─── ShaderStage ─────────────────────────────────────────────────────────────

/// Graphics pipeline stage a cache instance serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Compute,
}

impl ShaderStage {
    /// Short tag used in cache file names and failure-dump file names.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Vertex => "vs",
            Self::Pixel => "ps",
            Self::Geometry => "gs",
            Self::Compute => "cs",
        }
    }

    /// Initial capacity for generated source buffers of this stage.
    ///
    /// Pixel shaders dominate generated-source size in practice; the buffers
    /// are grow-only, so these are starting points, not limits.
    #[must_use]
    pub(crate) fn source_buffer_hint(self) -> usize {
        match self {
            Self::Vertex | Self::Compute => 32 * 1024,
            Self::Pixel => 64 * 1024,
            Self::Geometry => 16 * 1024,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::Pixel => "pixel",
            Self::Geometry => "geometry",
            Self::Compute => "compute",
        };
        f.write_str(name)
    }
}

// ─── ShaderUid ───────────────────────────────────────────────────────────────

/// Structural key uniquely identifying one shader source variant.
///
/// Implementations live in the embedding backend's code generator. The
/// contract:
///
/// - `KEY_SIZE` is fixed for a given generation and every key encodes to
///   exactly that many bytes, byte-stable across runs.
/// - Equality of the encoded bytes is equality of the UID.
/// - A format/generation version is part of the encoded bytes, so a generator
///   change invalidates old disk records purely by key mismatch.
/// - [`is_pass_through`](Self::is_pass_through) classifies trivial
///   identity-transform variants from the key alone; those variants bypass
///   compilation entirely.
pub trait ShaderUid: Clone + Eq + Hash + Send + Sync + 'static {
    /// Encoded key size in bytes.
    const KEY_SIZE: usize;

    /// Writes the key into `out`, which is exactly `KEY_SIZE` bytes.
    fn write_key(&self, out: &mut [u8]);

    /// Reconstructs a key from `bytes` (length `KEY_SIZE`).
    ///
    /// Returns `None` for byte patterns that do not decode to a valid key;
    /// such disk records are skipped during replay.
    fn read_key(bytes: &[u8]) -> Option<Self>;

    /// Whether this variant is a trivial pass-through shader that needs no
    /// compiled object at all.
    fn is_pass_through(&self) -> bool {
        false
    }
}

/// Encodes a UID into a freshly allocated key buffer.
#[must_use]
pub(crate) fn encode_key<U: ShaderUid>(uid: &U) -> Vec<u8> {
    let mut bytes = vec![0u8; U::KEY_SIZE];
    uid.write_key(&mut bytes);
    bytes
}

// ─── UidChecker ──────────────────────────────────────────────────────────────

/// Debug-build collision checker for the UID scheme.
///
/// The UID encoding is defined entirely by the embedding generator, and the
/// system has no collision-handling policy at runtime — the scheme must simply
/// be collision free over the variant space a title exercises. This checker
/// validates that empirically: feed it every (UID, generated source) pair and
/// it warns when two distinct sources map to one UID, or one source maps to
/// two UIDs (an over-wide UID, wasteful but not incorrect).
///
/// Not intended for the hot path; the original wires it up only when shader
/// debugging is enabled.
pub struct UidChecker<U> {
    uid_by_source: FxHashMap<u128, U>,
    source_by_uid: FxHashMap<U, u128>,
    collisions: usize,
}

impl<U> Default for UidChecker<U> {
    fn default() -> Self {
        Self {
            uid_by_source: FxHashMap::default(),
            source_by_uid: FxHashMap::default(),
            collisions: 0,
        }
    }
}

impl<U: ShaderUid + fmt::Debug> UidChecker<U> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one (UID, source) pair and checks it against everything seen so
    /// far. Returns `false` if a genuine collision (two sources, one UID) was
    /// detected.
    pub fn add_and_check(&mut self, uid: &U, source: &str, kind: &str) -> bool {
        let source_hash = xxh3_128(source.as_bytes());

        if let Some(known_uid) = self.uid_by_source.get(&source_hash)
            && known_uid != uid
        {
            log::warn!("{kind} shader source produced two distinct UIDs: {known_uid:?} and {uid:?}");
        }

        if let Some(&known_source) = self.source_by_uid.get(uid) {
            if known_source != source_hash {
                self.collisions += 1;
                log::warn!(
                    "{kind} shader UID collision: {uid:?} maps to two distinct sources (collision #{})",
                    self.collisions
                );
                return false;
            }
            return true;
        }

        self.uid_by_source.insert(source_hash, uid.clone());
        self.source_by_uid.insert(uid.clone(), source_hash);
        true
    }

    /// Number of genuine collisions observed.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Drops everything recorded so far.
    pub fn invalidate(&mut self) {
        self.uid_by_source.clear();
        self.source_by_uid.clear();
        self.collisions = 0;
    }
}
