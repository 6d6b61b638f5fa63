//! Asynchronous Shader Compiler
//!
//! A fixed worker pool behind two internally-synchronized queues. Callers
//! build [`WorkUnit`]s, submit them, and later drain finished results on their
//! own thread — result handlers are never invoked across threads, because they
//! may touch thread-affine graphics objects in the embedding backend.

mod backend;
mod engine;
mod work_unit;

pub use backend::{CompileBackend, CompileFailure, CompileFlags, CompileRequest, DefineList, ShaderDefine};
pub use engine::AsyncCompiler;
pub use work_unit::{CompileStatus, WorkUnit};

pub(crate) use engine::DrainOutcome;
