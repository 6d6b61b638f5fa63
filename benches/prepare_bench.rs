//! Hot-path micro-benchmarks.
//!
//! `prepare` runs once per draw, so the memo-hit path (unchanged state) and
//! the UID-switch path (state flips between two known variants) are the two
//! costs worth watching.

use std::fmt::Write as _;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use kiln::{
    AsyncCompiler, BackendKind, CacheConfig, CodeGenerator, CompileBackend, CompileFailure,
    CompileRequest, CompilerConfig, Role, ShaderCache, ShaderCode, ShaderStage, ShaderUid,
    WaitMode,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BenchUid(u64);

impl ShaderUid for BenchUid {
    const KEY_SIZE: usize = 8;

    fn write_key(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.0.to_le_bytes());
    }

    fn read_key(bytes: &[u8]) -> Option<Self> {
        Some(Self(u64::from_le_bytes(bytes.try_into().ok()?)))
    }
}

struct BenchGenerator;

impl CodeGenerator for BenchGenerator {
    type State = u64;
    type Uid = BenchUid;

    fn uid(&self, state: &u64) -> BenchUid {
        BenchUid(*state)
    }

    fn generate(&self, uid: &BenchUid, out: &mut ShaderCode) {
        writeln!(out, "// variant {:#x}\nvoid main() {{}}", uid.0).unwrap();
    }
}

struct NullBackend;

impl CompileBackend for NullBackend {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Box<[u8]>, CompileFailure> {
        Ok(request.source.as_bytes().into())
    }
}

fn bench_prepare(c: &mut Criterion) {
    let compiler = Arc::new(
        AsyncCompiler::new(Arc::new(NullBackend), &CompilerConfig { worker_threads: 1 }).unwrap(),
    );
    let cache = ShaderCache::new(
        ShaderStage::Pixel,
        Arc::new(BenchGenerator),
        compiler,
        &CacheConfig::new(BackendKind::D3D11, "BENCH"),
    )
    .unwrap();

    let mut client = cache.client(Role::Authoritative);
    for state in [1u64, 2] {
        client.prepare(&state);
        client.wait_ready(WaitMode::Block);
    }

    c.bench_function("prepare_memo_hit", |b| {
        b.iter(|| client.prepare(&1u64));
    });

    c.bench_function("prepare_uid_switch", |b| {
        let mut state = 1u64;
        b.iter(|| {
            state = if state == 1 { 2 } else { 1 };
            client.prepare(&state);
        });
    });
}

criterion_group!(benches, bench_prepare);
criterion_main!(benches);
