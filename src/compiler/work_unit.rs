//! Work Units & Source-Buffer Recycling
//!
//! A [`WorkUnit`] carries one compile request through its whole lifetime:
//! built by a caller, moved into the input queue, filled in by a worker, moved
//! to the output queue, and finally consumed by its result handler on a caller
//! thread. Ownership moves with it, so a unit can never alias a recycled slot.
//!
//! What *is* recycled is the expensive part: the grow-only source buffer,
//! returned to a bounded [`SourcePool`] once the handler has run.

use parking_lot::Mutex;

use crate::code::ShaderCode;
use crate::compiler::backend::{CompileFlags, DefineList};

/// Deferred code generation, run by the worker that picks the unit up.
pub(crate) type GenerateFn = Box<dyn FnOnce(&mut ShaderCode) + Send>;

/// Result handler, run on the caller thread that drains the unit.
pub(crate) type ResultFn = Box<dyn FnOnce(&mut WorkUnit) + Send>;

/// Compile state of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    /// Not yet processed by a worker.
    Pending,
    /// Backend accepted the source; bytecode is attached.
    Succeeded,
    /// Backend rejected the source; the diagnostic is attached.
    Failed,
}

/// One pending or completed compile request.
pub struct WorkUnit {
    /// Reusable source buffer. Filled either by the submitting caller or by
    /// the deferred generation callback on the worker.
    pub source: ShaderCode,
    /// Entry point name for the compile backend.
    pub entry_point: String,
    /// Target profile string (e.g. `ps_5_0`).
    pub profile: String,
    /// Compile flags.
    pub flags: CompileFlags,
    /// Preprocessor defines.
    pub defines: DefineList,

    pub(crate) generate: Option<GenerateFn>,
    pub(crate) on_result: Option<ResultFn>,
    pub(crate) status: CompileStatus,
    pub(crate) bytecode: Option<Box<[u8]>>,
    pub(crate) error: Option<String>,
}

impl WorkUnit {
    pub(crate) fn new(source: ShaderCode) -> Self {
        Self {
            source,
            entry_point: "main".to_owned(),
            profile: String::new(),
            flags: CompileFlags::empty(),
            defines: DefineList::new(),
            generate: None,
            on_result: None,
            status: CompileStatus::Pending,
            bytecode: None,
            error: None,
        }
    }

    /// Defers source generation onto the worker that processes this unit,
    /// keeping string building off the submitting thread.
    pub fn set_generator(&mut self, generate: impl FnOnce(&mut ShaderCode) + Send + 'static) {
        self.generate = Some(Box::new(generate));
    }

    /// Installs the result handler. It runs on whichever caller thread drains
    /// this unit, never on a worker.
    pub fn set_result_handler(&mut self, handler: impl FnOnce(&mut WorkUnit) + Send + 'static) {
        self.on_result = Some(Box::new(handler));
    }

    #[must_use]
    pub fn status(&self) -> CompileStatus {
        self.status
    }

    /// Compiled bytecode, present once the status is `Succeeded`.
    #[must_use]
    pub fn bytecode(&self) -> Option<&[u8]> {
        self.bytecode.as_deref()
    }

    /// Takes ownership of the compiled bytecode.
    pub fn take_bytecode(&mut self) -> Option<Box<[u8]>> {
        self.bytecode.take()
    }

    /// Compiler diagnostic, present once the status is `Failed`.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn fail_with(&mut self, diagnostic: impl Into<String>) {
        self.status = CompileStatus::Failed;
        self.error = Some(diagnostic.into());
    }
}

// ─── SourcePool ──────────────────────────────────────────────────────────────

/// Retained buffers beyond this are dropped instead of pooled.
const POOL_CAPACITY: usize = 256;

/// Bounded pool of recycled grow-only source buffers.
pub(crate) struct SourcePool {
    buffers: Mutex<Vec<ShaderCode>>,
}

impl SourcePool {
    pub(crate) fn new() -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
        }
    }

    /// Hands out a cleared buffer with at least `capacity` bytes reserved,
    /// reusing a pooled one when available.
    pub(crate) fn acquire(&self, capacity: usize) -> ShaderCode {
        let mut code = self
            .buffers
            .lock()
            .pop()
            .unwrap_or_else(|| ShaderCode::with_capacity(capacity));
        code.ensure_capacity(capacity);
        code
    }

    /// Returns a buffer to the pool. Buffers never shrink, so a recycled one
    /// keeps the high-water-mark allocation of everything written through it.
    pub(crate) fn recycle(&self, mut code: ShaderCode) {
        code.reset();
        let mut buffers = self.buffers.lock();
        if buffers.len() < POOL_CAPACITY {
            buffers.push(code);
        }
    }
}
