//! Shader Object Cache
//!
//! One [`ShaderCache`] per pipeline stage per backend. Callers interact
//! through per-role [`ShaderClient`] handles: the authoritative client's
//! selection gates drawing and drains compile results; the speculative client
//! runs the same selection ahead of time without gating anything.

mod cursor;
mod entry;
mod shader_cache;

pub use cursor::Role;
pub use entry::{CacheEntry, ClaimCell};
pub use shader_cache::{ShaderCache, ShaderClient, ShaderStatus, WaitMode};
