//! Shared test fixtures: a deterministic generator, a counting compile
//! backend, and a pre-wired cache harness.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use kiln::{
    AsyncCompiler, BackendKind, CacheConfig, CodeGenerator, CompileBackend, CompileFailure,
    CompileRequest, CompilerConfig, ShaderCache, ShaderCode, ShaderStage, ShaderUid,
};

pub const TEST_GENERATION: u32 = 7;

// ============================================================================
// State & UID
// ============================================================================

/// Stand-in for an emulated-hardware state snapshot.
pub struct TestState {
    pub bits: u64,
    pub pass_through: bool,
}

impl TestState {
    #[must_use]
    pub fn new(bits: u64) -> Self {
        Self {
            bits,
            pass_through: false,
        }
    }

    #[must_use]
    pub fn pass_through() -> Self {
        Self {
            bits: 0,
            pass_through: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestUid {
    pub bits: u64,
    pub generation: u32,
    pub pass_through: bool,
}

impl TestUid {
    #[must_use]
    pub fn of(bits: u64) -> Self {
        Self {
            bits,
            generation: TEST_GENERATION,
            pass_through: false,
        }
    }
}

impl ShaderUid for TestUid {
    const KEY_SIZE: usize = 16;

    fn write_key(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.bits.to_le_bytes());
        out[8..12].copy_from_slice(&self.generation.to_le_bytes());
        out[12] = u8::from(self.pass_through);
        out[13..16].fill(0);
    }

    fn read_key(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::KEY_SIZE {
            return None;
        }
        Some(Self {
            bits: u64::from_le_bytes(bytes[0..8].try_into().ok()?),
            generation: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
            pass_through: bytes[12] != 0,
        })
    }

    fn is_pass_through(&self) -> bool {
        self.pass_through
    }
}

// ============================================================================
// Counting collaborators
// ============================================================================

#[derive(Default)]
pub struct TestGenerator {
    pub uid_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
}

impl CodeGenerator for TestGenerator {
    type State = TestState;
    type Uid = TestUid;

    fn uid(&self, state: &TestState) -> TestUid {
        self.uid_calls.fetch_add(1, Ordering::SeqCst);
        TestUid {
            bits: state.bits,
            generation: TEST_GENERATION,
            pass_through: state.pass_through,
        }
    }

    fn generate(&self, uid: &TestUid, out: &mut ShaderCode) {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        writeln!(out, "// variant {:#018x}", uid.bits).unwrap();
        writeln!(out, "void main() {{}}").unwrap();
    }
}

/// Compile backend that counts invocations, optionally sleeps, and optionally
/// rejects sources containing a marker string.
#[derive(Default)]
pub struct CountingBackend {
    pub compiles: AtomicUsize,
    pub latency: Duration,
    pub fail_marker: Option<String>,
}

impl CountingBackend {
    #[must_use]
    pub fn instant() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_owned()),
            ..Self::default()
        }
    }
}

impl CompileBackend for CountingBackend {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Box<[u8]>, CompileFailure> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if let Some(marker) = &self.fail_marker
            && request.source.contains(marker.as_str())
        {
            return Err(CompileFailure::new(format!("syntax error near '{marker}'")));
        }
        let mut bytecode = format!("{}:{}:", request.profile, request.entry_point).into_bytes();
        bytecode.extend_from_slice(request.source.as_bytes());
        Ok(bytecode.into_boxed_slice())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub cache: ShaderCache<TestGenerator>,
    pub compiler: Arc<AsyncCompiler>,
    pub generator: Arc<TestGenerator>,
    pub backend: Arc<CountingBackend>,
}

impl Harness {
    pub fn compiles(&self) -> usize {
        self.backend.compiles.load(Ordering::SeqCst)
    }

    pub fn generates(&self) -> usize {
        self.generator.generate_calls.load(Ordering::SeqCst)
    }
}

#[must_use]
pub fn default_config() -> CacheConfig {
    CacheConfig::new(BackendKind::D3D11, "TESTGAME")
}

#[must_use]
pub fn harness_with(backend: CountingBackend, config: &CacheConfig) -> Harness {
    let backend = Arc::new(backend);
    let compiler_backend: Arc<dyn CompileBackend> = backend.clone();
    let compiler = Arc::new(
        AsyncCompiler::new(compiler_backend, &CompilerConfig { worker_threads: 2 }).unwrap(),
    );
    let generator = Arc::new(TestGenerator::default());
    let cache = ShaderCache::new(
        ShaderStage::Pixel,
        Arc::clone(&generator),
        Arc::clone(&compiler),
        config,
    )
    .unwrap();
    Harness {
        cache,
        compiler,
        generator,
        backend,
    }
}

#[must_use]
pub fn harness(backend: CountingBackend) -> Harness {
    harness_with(backend, &default_config())
}

/// Routes `log` output through the test harness; safe to call repeatedly.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Polls `cond` every few milliseconds until it holds or `deadline` elapses.
pub fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
