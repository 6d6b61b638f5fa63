//! Client Roles & Cursors
//!
//! Two independent callers run the same shader selection against one cache:
//! the authoritative caller, whose selection gates drawing, and a speculative
//! caller running ahead of it. Each owns a single-slot cursor memoizing its
//! last UID and entry, so back-to-back draws with unchanged state skip the map
//! entirely. A cursor is written only by its owning client — there is no
//! cross-thread traffic on either memo.
//!
//! Cursors carry the cache epoch they were filled under; `clear()` bumps the
//! epoch, which invalidates every outstanding cursor without reaching into
//! other threads.

use std::sync::Arc;

use crate::cache::entry::CacheEntry;

/// Which caller a [`ShaderClient`](crate::cache::ShaderClient) represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The caller whose shader selection gates drawing. Drains compile
    /// results and may block in `wait_ready`.
    Authoritative,
    /// A predictive caller running the same selection without gating
    /// anything. Never drains results, never blocks.
    Speculative,
}

/// Single-slot "last used" memo for one client role.
pub(crate) struct RoleCursor<U> {
    last_uid: Option<U>,
    last_entry: Option<Arc<CacheEntry>>,
    epoch: u64,
}

impl<U: PartialEq> RoleCursor<U> {
    pub(crate) fn new(epoch: u64) -> Self {
        Self {
            last_uid: None,
            last_entry: None,
            epoch,
        }
    }

    /// Whether `uid` matches the memo and the memo is from the current epoch.
    pub(crate) fn matches(&self, uid: &U, epoch: u64) -> bool {
        self.epoch == epoch && self.last_uid.as_ref() == Some(uid)
    }

    pub(crate) fn remember(&mut self, uid: U, entry: Option<Arc<CacheEntry>>, epoch: u64) {
        self.last_uid = Some(uid);
        self.last_entry = entry;
        self.epoch = epoch;
    }

    /// The memoed entry, if the memo is from the current epoch.
    pub(crate) fn entry_for(&self, epoch: u64) -> Option<&Arc<CacheEntry>> {
        if self.epoch == epoch {
            self.last_entry.as_ref()
        } else {
            None
        }
    }
}
