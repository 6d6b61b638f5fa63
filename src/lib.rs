//! # Kiln
//!
//! Shader object cache and asynchronous compilation pipeline for
//! hardware-accelerated GPU emulation backends.
//!
//! For each pipeline stage, a [`ShaderCache`] turns the current
//! emulated-hardware state into compiled native bytecode **exactly once per
//! distinct state**, without stalling the render thread when avoidable, and
//! persists results so repeated runs skip recompilation.
//!
//! ## Wiring
//!
//! The composition root owns one [`AsyncCompiler`] per backend (wrapping the
//! platform's compiler behind [`CompileBackend`]) and one [`ShaderCache`] per
//! stage (wrapping that stage's [`CodeGenerator`]). Caller threads each hold a
//! [`ShaderClient`]:
//!
//! ```rust,ignore
//! let compiler = Arc::new(AsyncCompiler::new(backend, &CompilerConfig::default())?);
//! let pixel_cache = ShaderCache::new(
//!     ShaderStage::Pixel,
//!     Arc::new(pixel_generator),
//!     Arc::clone(&compiler),
//!     &CacheConfig::new(BackendKind::D3D11, game_id),
//! )?;
//!
//! // Render thread, once per draw:
//! client.prepare(&hardware_state);
//! match client.wait_ready(WaitMode::Block) {
//!     ShaderStatus::Ready => bind(client.bytecode().unwrap()),
//!     ShaderStatus::PassThrough => bind_fixed_function(),
//!     ShaderStatus::Failed | ShaderStatus::Pending => skip_draw(),
//! }
//! ```
//!
//! ## Guarantees
//!
//! - At most one compile per distinct UID, arbitrated by a typed once-claim
//!   cell, regardless of how caller threads race.
//! - `compiled` is monotonic; a failed compile still concludes its entry, so
//!   no caller can wait forever on a broken variant.
//! - The disk cache is append-only and fail-soft: damage costs the tail, never
//!   the file.

pub mod cache;
pub mod code;
pub mod compiler;
pub mod config;
pub mod disk;
pub mod dump;
pub mod errors;
pub mod stats;
pub mod uid;

pub use cache::{CacheEntry, ClaimCell, Role, ShaderCache, ShaderClient, ShaderStatus, WaitMode};
pub use code::{CodeGenerator, ShaderCode};
pub use compiler::{
    AsyncCompiler, CompileBackend, CompileFailure, CompileFlags, CompileRequest, CompileStatus,
    DefineList, ShaderDefine, WorkUnit,
};
pub use config::{BackendKind, CacheConfig, CompilerConfig};
pub use disk::DiskCache;
pub use dump::DumpSink;
pub use errors::{Error, Result};
pub use stats::StatsSnapshot;
pub use uid::{ShaderStage, ShaderUid, UidChecker};
