//! Compile Backend Seam
//!
//! The native shader compiler is an opaque collaborator behind
//! [`CompileBackend`]: source text plus defines, entry point, target profile
//! and flags in; bytecode or a diagnostic out. Implementations wrap whatever
//! the platform provides (D3DCompile, glslang, a SPIR-V toolchain).

use smallvec::SmallVec;

bitflags::bitflags! {
    /// Flags forwarded to the compile backend.
    ///
    /// Mirrors the conventional native-compiler switches; backends ignore the
    /// ones that do not apply to them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompileFlags: u32 {
        /// Embed debug information in the bytecode.
        const DEBUG = 1 << 0;
        /// Disable all optimization passes.
        const SKIP_OPTIMIZATION = 1 << 1;
        /// Trust the generator and skip source validation.
        const SKIP_VALIDATION = 1 << 2;
        /// Highest optimization level.
        const OPTIMIZATION_LEVEL3 = 1 << 3;
    }
}

/// One preprocessor define handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDefine {
    pub name: String,
    pub value: String,
}

impl ShaderDefine {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Define lists are almost always tiny; keep them inline.
pub type DefineList = SmallVec<[ShaderDefine; 4]>;

/// Everything one compile invocation needs, borrowed from the work unit.
#[derive(Debug)]
pub struct CompileRequest<'a> {
    pub source: &'a str,
    pub entry_point: &'a str,
    pub profile: &'a str,
    pub flags: CompileFlags,
    pub defines: &'a [ShaderDefine],
}

/// Diagnostic from a rejected compile. Non-fatal by design: the owning cache
/// entry still completes (with empty bytecode) and the diagnostic ends up in a
/// dump file.
#[derive(Debug, Clone)]
pub struct CompileFailure {
    pub diagnostic: String,
}

impl CompileFailure {
    #[must_use]
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
        }
    }
}

/// The external compiler entry point.
///
/// Called from worker threads; implementations must be `Send + Sync` and
/// should report failures through `Err` rather than panicking — a panicking
/// backend takes its worker down with it.
pub trait CompileBackend: Send + Sync + 'static {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Box<[u8]>, CompileFailure>;
}
