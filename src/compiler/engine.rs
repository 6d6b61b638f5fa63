//! Async Compiler Engine
//!
//! Worker pool plus two queues. Callers push [`WorkUnit`]s into the input
//! channel from any thread; workers run deferred code generation, invoke the
//! compile backend, and push the finished unit to the output channel. Results
//! only ever surface when a caller explicitly drains them, so handlers always
//! run on a caller thread.
//!
//! Waiting is channel/condvar based throughout — there is no spin-yield
//! anywhere. The three drain entry points differ only in blocking behavior:
//!
//! | Call | Blocks | Runs handlers |
//! |------|--------|---------------|
//! | [`process_results`](AsyncCompiler::process_results) | no | yes |
//! | [`wait_queue_empty`](AsyncCompiler::wait_queue_empty) | until workers drain the input side | no |
//! | [`wait_for_finish`](AsyncCompiler::wait_for_finish) | until every submitted unit is handled | yes |

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::compiler::backend::{CompileBackend, CompileRequest};
use crate::compiler::work_unit::{CompileStatus, SourcePool, WorkUnit};
use crate::config::CompilerConfig;
use crate::errors::Result;

/// Tick between liveness re-checks while blocked on the output channel.
const DRAIN_TICK: Duration = Duration::from_millis(100);

/// Outcome of one blocking drain attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainOutcome {
    /// One unit was received and its handler invoked.
    Handled,
    /// Nothing finished within the timeout.
    TimedOut,
    /// All workers are gone; nothing will ever finish.
    Closed,
}

/// Count of units on the input side (submitted, not yet compiled), with a
/// condvar for the queue-empty wait.
struct QueueGauge {
    count: Mutex<usize>,
    empty: Condvar,
}

impl QueueGauge {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            empty: Condvar::new(),
        }
    }

    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.empty.notify_all();
        }
    }

    fn wait_empty(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.empty.wait(&mut count);
        }
    }

    fn current(&self) -> usize {
        *self.count.lock()
    }
}

/// Worker-pool-backed queueing engine around [`WorkUnit`]s.
///
/// One engine is shared by every stage cache of a backend. Constructed
/// explicitly by the composition root; tearing it down joins the workers and
/// runs any still-undrained result handlers on the dropping thread.
pub struct AsyncCompiler {
    input: Option<flume::Sender<WorkUnit>>,
    output: flume::Receiver<WorkUnit>,
    pool: Arc<SourcePool>,
    queued: Arc<QueueGauge>,
    unhandled: AtomicUsize,
    workers: Vec<JoinHandle<()>>,
}

impl AsyncCompiler {
    /// Spawns the worker pool.
    pub fn new(backend: Arc<dyn CompileBackend>, config: &CompilerConfig) -> Result<Self> {
        let (input_tx, input_rx) = flume::unbounded::<WorkUnit>();
        let (output_tx, output_rx) = flume::unbounded::<WorkUnit>();
        let queued = Arc::new(QueueGauge::new());

        let worker_count = config.worker_threads.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let input = input_rx.clone();
            let output = output_tx.clone();
            let backend = Arc::clone(&backend);
            let queued = Arc::clone(&queued);
            let handle = thread::Builder::new()
                .name(format!("kiln-shader-{index}"))
                .spawn(move || worker_loop(&input, &output, backend.as_ref(), &queued))?;
            workers.push(handle);
        }

        Ok(Self {
            input: Some(input_tx),
            output: output_rx,
            pool: Arc::new(SourcePool::new()),
            queued,
            unhandled: AtomicUsize::new(0),
            workers,
        })
    }

    /// Hands out a fresh unit whose source buffer comes from the recycle pool,
    /// reserved to at least `source_capacity`.
    #[must_use]
    pub fn new_unit(&self, source_capacity: usize) -> WorkUnit {
        WorkUnit::new(self.pool.acquire(source_capacity))
    }

    /// Queues a unit for compilation. Safe from any thread.
    pub fn submit(&self, unit: WorkUnit) {
        self.queued.increment();
        self.unhandled.fetch_add(1, Ordering::AcqRel);

        let rejected = match &self.input {
            Some(input) => input.send(unit).err().map(flume::SendError::into_inner),
            None => Some(unit),
        };
        if let Some(mut unit) = rejected {
            // Workers unavailable (teardown race). Fail the unit on the spot
            // so its entry still completes and nothing waits forever.
            log::error!("shader compile submitted with no live workers");
            unit.fail_with("compiler worker pool unavailable");
            self.queued.decrement();
            self.handle_unit(unit);
        }
    }

    /// Drains every finished unit without blocking, invoking result handlers
    /// on the current thread.
    pub fn process_results(&self) {
        while let Ok(unit) = self.output.try_recv() {
            self.handle_unit(unit);
        }
    }

    /// Blocks until the input side is fully drained (every submitted unit has
    /// been compiled). Does not invoke result handlers.
    pub fn wait_queue_empty(&self) {
        self.queued.wait_empty();
    }

    /// Blocks until every submitted unit has been compiled *and* its result
    /// handler invoked. Used at clear/shutdown so nothing dangles afterwards.
    pub fn wait_for_finish(&self) {
        while self.unhandled.load(Ordering::Acquire) > 0 {
            match self.drain_one_blocking(DRAIN_TICK) {
                DrainOutcome::Handled | DrainOutcome::TimedOut => {}
                DrainOutcome::Closed => break,
            }
        }
    }

    /// Units submitted but not yet compiled.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.current()
    }

    /// Units submitted but not yet result-handled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.unhandled.load(Ordering::Acquire)
    }

    /// Blocks up to `timeout` for the next finished unit and handles it.
    pub(crate) fn drain_one_blocking(&self, timeout: Duration) -> DrainOutcome {
        match self.output.recv_timeout(timeout) {
            Ok(unit) => {
                self.handle_unit(unit);
                DrainOutcome::Handled
            }
            Err(flume::RecvTimeoutError::Timeout) => DrainOutcome::TimedOut,
            Err(flume::RecvTimeoutError::Disconnected) => DrainOutcome::Closed,
        }
    }

    fn handle_unit(&self, mut unit: WorkUnit) {
        if let Some(handler) = unit.on_result.take() {
            handler(&mut unit);
        }
        self.pool.recycle(std::mem::take(&mut unit.source));
        self.unhandled.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Drop for AsyncCompiler {
    fn drop(&mut self) {
        // Close the submission side so workers run dry and exit.
        self.input.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("shader compile worker panicked");
            }
        }
        // Run any handlers that were never drained; they only touch shared
        // cache state, and leaving them would strand entries as pending.
        while let Ok(unit) = self.output.try_recv() {
            self.handle_unit(unit);
        }
    }
}

fn worker_loop(
    input: &flume::Receiver<WorkUnit>,
    output: &flume::Sender<WorkUnit>,
    backend: &dyn CompileBackend,
    queued: &QueueGauge,
) {
    while let Ok(mut unit) = input.recv() {
        if let Some(generate) = unit.generate.take() {
            generate(&mut unit.source);
        }

        let outcome = {
            let request = CompileRequest {
                source: unit.source.as_str(),
                entry_point: &unit.entry_point,
                profile: &unit.profile,
                flags: unit.flags,
                defines: &unit.defines,
            };
            backend.compile(&request)
        };
        match outcome {
            Ok(bytecode) => {
                unit.status = CompileStatus::Succeeded;
                unit.bytecode = Some(bytecode);
            }
            Err(failure) => {
                unit.status = CompileStatus::Failed;
                unit.error = Some(failure.diagnostic);
            }
        }

        // The receiver lives in the engine; a send only fails mid-teardown.
        output.send(unit).ok();
        queued.decrement();
    }
}
