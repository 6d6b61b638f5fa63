//! Cache Entries
//!
//! A [`CacheEntry`] is created on first lookup miss and lives until the whole
//! cache is torn down — there is no eviction. Its lifecycle is driven by two
//! one-way latches:
//!
//! - [`ClaimCell`]: flips exactly once; whoever flips it owns triggering the
//!   compile. This cell — not the map lock — is the single-compile arbiter.
//! - `compiled`: monotonic false→true; gates bytecode validity. A failed
//!   compile still sets it (with empty bytecode) so no caller waits forever.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

// ─── ClaimCell ───────────────────────────────────────────────────────────────

/// One-shot claim latch.
///
/// `try_claim` succeeds for exactly one caller over the cell's lifetime, which
/// makes "exactly one thread enqueues the compile" a property of the type
/// rather than a calling convention.
#[derive(Debug, Default)]
pub struct ClaimCell {
    claimed: AtomicBool,
}

impl ClaimCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
        }
    }

    /// Attempts to claim the cell. Returns `true` for exactly one caller.
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

// ─── CacheEntry ──────────────────────────────────────────────────────────────

/// One shader variant: claim latch, compile latch, and (eventually) bytecode.
#[derive(Debug)]
pub struct CacheEntry {
    claim: ClaimCell,
    compiled: AtomicBool,
    bytecode: OnceLock<Box<[u8]>>,
    source: OnceLock<Box<str>>,
    pass_through: bool,
}

impl CacheEntry {
    pub(crate) fn new() -> Self {
        Self {
            claim: ClaimCell::new(),
            compiled: AtomicBool::new(false),
            bytecode: OnceLock::new(),
            source: OnceLock::new(),
            pass_through: false,
        }
    }

    /// The shared entry behind every pass-through UID: already claimed,
    /// already compiled, deliberately without bytecode.
    pub(crate) fn pass_through() -> Self {
        let entry = Self {
            claim: ClaimCell::new(),
            compiled: AtomicBool::new(true),
            bytecode: OnceLock::new(),
            source: OnceLock::new(),
            pass_through: true,
        };
        entry.claim.try_claim();
        entry
    }

    /// Entry hydrated from the disk cache: claimed and compiled up front, the
    /// transient loader buffer copied into an owned allocation.
    pub(crate) fn precompiled(bytecode: &[u8]) -> Self {
        let entry = Self::new();
        entry.claim.try_claim();
        entry.attach_bytecode(bytecode.into());
        entry
    }

    #[must_use]
    pub fn claim(&self) -> &ClaimCell {
        &self.claim
    }

    /// Whether compilation has concluded, successfully or not. Monotonic.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        self.pass_through
    }

    /// Compiled bytecode. `None` until compilation concludes, and `None`
    /// forever for failed or pass-through entries.
    #[must_use]
    pub fn bytecode(&self) -> Option<&[u8]> {
        if !self.is_compiled() {
            return None;
        }
        self.bytecode.get().map(|bytes| &bytes[..])
    }

    #[must_use]
    pub fn has_bytecode(&self) -> bool {
        self.bytecode().is_some_and(|bytes| !bytes.is_empty())
    }

    /// Generated source retained for debugging, when configured.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.get().map(|source| &**source)
    }

    /// Attaches bytecode and concludes compilation. Write-once; the store is
    /// ordered before the `compiled` release so readers never see a compiled
    /// entry without its bytecode.
    pub(crate) fn attach_bytecode(&self, bytecode: Box<[u8]>) {
        self.bytecode.set(bytecode).ok();
        self.compiled.store(true, Ordering::Release);
    }

    /// Concludes compilation without bytecode (compile failure).
    pub(crate) fn mark_failed(&self) {
        self.compiled.store(true, Ordering::Release);
    }

    pub(crate) fn retain_source(&self, source: &str) {
        self.source.set(source.into()).ok();
    }
}
