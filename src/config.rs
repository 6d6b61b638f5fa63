//! Cache & Compiler Configuration
//!
//! Explicit configuration structs owned by the backend's composition root.
//! Nothing here is read from global state; the block-versus-poll waiting
//! decision in particular is a per-call [`WaitMode`](crate::cache::WaitMode)
//! parameter, not a configuration flag.

use std::path::PathBuf;
use std::thread;

use crate::compiler::CompileFlags;
use crate::uid::ShaderStage;

// ─── BackendKind ─────────────────────────────────────────────────────────────

/// Graphics backend a cache instance serves.
///
/// Determines the shader profile strings handed to the compile backend and the
/// disk-cache namespace prefix. Backends whose compiled bytecode formats are
/// compatible share a prefix, so switching between them reuses one warm cache
/// instead of recompiling cold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    D3D9,
    D3D11,
    D3D12,
    OpenGL,
    Vulkan,
}

impl BackendKind {
    /// Disk-cache file-name prefix. D3D11 and D3D12 both consume DXBC and
    /// intentionally share a namespace.
    #[must_use]
    pub fn cache_prefix(self) -> &'static str {
        match self {
            Self::D3D9 => "IDX9",
            Self::D3D11 | Self::D3D12 => "IDX11",
            Self::OpenGL => "IOGL",
            Self::Vulkan => "IVK",
        }
    }

    /// Target profile string for `stage`, or `None` when this backend cannot
    /// run that stage at all (the construction-time configuration error).
    #[must_use]
    pub fn shader_profile(self, stage: ShaderStage) -> Option<&'static str> {
        match self {
            Self::D3D9 => match stage {
                ShaderStage::Vertex => Some("vs_3_0"),
                ShaderStage::Pixel => Some("ps_3_0"),
                ShaderStage::Geometry | ShaderStage::Compute => None,
            },
            Self::D3D11 | Self::D3D12 => match stage {
                ShaderStage::Vertex => Some("vs_5_0"),
                ShaderStage::Pixel => Some("ps_5_0"),
                ShaderStage::Geometry => Some("gs_5_0"),
                ShaderStage::Compute => Some("cs_5_0"),
            },
            Self::OpenGL => Some("glsl_430"),
            Self::Vulkan => Some("spirv_1_3"),
        }
    }
}

// ─── CacheConfig ─────────────────────────────────────────────────────────────

/// Per-cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backend this cache compiles for.
    pub backend: BackendKind,
    /// Identifier of the emulated content (game id); part of the cache file
    /// name so every title gets its own variant population.
    pub content_id: String,
    /// Directory for the persistent disk cache. `None` disables persistence.
    pub cache_dir: Option<PathBuf>,
    /// Directory for failing-shader dump files. `None` disables dumps.
    pub dump_dir: Option<PathBuf>,
    /// Keep the generated source on each entry after a successful compile.
    /// Debug aid; costs memory proportional to total generated source.
    pub retain_source: bool,
    /// Flags passed to the compile backend for every unit.
    pub flags: CompileFlags,
    /// Entry point name passed to the compile backend.
    pub entry_point: String,
}

impl CacheConfig {
    /// Configuration with the conventional defaults: no persistence, no dumps,
    /// release-style compile flags (debug-style under `debug_assertions`).
    #[must_use]
    pub fn new(backend: BackendKind, content_id: impl Into<String>) -> Self {
        let flags = if cfg!(debug_assertions) {
            CompileFlags::DEBUG | CompileFlags::SKIP_OPTIMIZATION
        } else {
            CompileFlags::SKIP_VALIDATION | CompileFlags::OPTIMIZATION_LEVEL3
        };
        Self {
            backend,
            content_id: content_id.into(),
            cache_dir: None,
            dump_dir: None,
            retain_source: false,
            flags,
            entry_point: "main".to_owned(),
        }
    }
}

// ─── CompilerConfig ──────────────────────────────────────────────────────────

/// Worker-pool configuration for the [`AsyncCompiler`](crate::compiler::AsyncCompiler).
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Number of compile worker threads.
    pub worker_threads: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        // Leave a core for the render thread; shader compiles are bursty and
        // more than a handful of workers just thrashes the driver.
        let available = thread::available_parallelism().map_or(1, |cores| cores.get());
        Self {
            worker_threads: available.saturating_sub(1).clamp(1, 8),
        }
    }
}
