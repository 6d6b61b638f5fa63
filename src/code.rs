//! Shader Source Buffers & Code Generation Seam
//!
//! [`ShaderCode`] is the grow-only text buffer every generator writes into.
//! Generated sources for a stage land in the tens of kilobytes, so buffers are
//! pre-reserved and recycled through the compiler's pool rather than
//! reallocated per request.
//!
//! [`CodeGenerator`] is the seam to the (external) state → UID → source
//! machinery. Only the UID computation runs on the caller's thread; source
//! generation is deferred into the worker pool.

use std::fmt;

use crate::uid::ShaderUid;

// ─── ShaderCode ──────────────────────────────────────────────────────────────

/// Grow-only shader source buffer.
///
/// Clearing keeps the allocation, so a recycled buffer only ever grows to the
/// high-water mark of the sources written through it.
#[derive(Debug, Default)]
pub struct ShaderCode {
    buffer: String,
}

impl ShaderCode {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: String::with_capacity(capacity),
        }
    }

    /// Appends a string fragment.
    pub fn push_str(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Ensures at least `capacity` total bytes are reserved.
    pub(crate) fn ensure_capacity(&mut self, capacity: usize) {
        if self.buffer.capacity() < capacity {
            self.buffer.reserve(capacity - self.buffer.len());
        }
    }

    /// Empties the buffer, keeping its allocation.
    pub(crate) fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl fmt::Write for ShaderCode {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buffer.push_str(s);
        Ok(())
    }
}

// ─── CodeGenerator ───────────────────────────────────────────────────────────

/// State → UID and UID → source text, implemented by the embedding backend.
///
/// The two operations are deliberately decoupled: [`uid`](Self::uid) is cheap
/// and runs on every draw, while [`generate`](Self::generate) runs only on a
/// cache miss, on a compiler worker thread. Both must be deterministic — the
/// same state always yields a bit-identical UID, and a UID always yields the
/// same source.
pub trait CodeGenerator: Send + Sync + 'static {
    /// Hardware-state snapshot the UID is derived from.
    type State: ?Sized;
    /// Structural key type for this stage.
    type Uid: ShaderUid;

    /// Computes the UID for the current state. Always executed.
    fn uid(&self, state: &Self::State) -> Self::Uid;

    /// Writes the source text for `uid` into `out`. Executed only on a cache
    /// miss, possibly off the caller's thread.
    fn generate(&self, uid: &Self::Uid, out: &mut ShaderCode);
}
