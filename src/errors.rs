//! Error Types
//!
//! The only conditions modeled as hard errors are I/O failures and a
//! construction-time misconfiguration (asking a backend for a pipeline stage it
//! has no shader profile for). Everything that can go wrong at runtime — a
//! rejected shader source, a damaged disk-cache tail — is resolved locally to
//! "this one shader variant is unavailable" and surfaced through logging, never
//! through this enum.

use thiserror::Error;

use crate::config::BackendKind;
use crate::uid::ShaderStage;

/// The main error type for the shader cache.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error (cache directory creation, disk-cache open).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured backend has no shader profile for the requested stage.
    ///
    /// This is the one condition treated as a programmer/setup error rather
    /// than a runtime event.
    #[error("backend {backend:?} has no {stage} shader profile")]
    UnsupportedProfile {
        /// Backend the cache was being constructed for.
        backend: BackendKind,
        /// Pipeline stage without a profile.
        stage: ShaderStage,
    },
}

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
