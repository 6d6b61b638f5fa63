//! Shader Cache Core
//!
//! UID-keyed map of [`CacheEntry`] plus the claim protocol that guarantees at
//! most one compile per distinct UID, no matter how many callers race on it.
//!
//! The hot path is deliberately layered:
//!
//! 1. **Cursor memo** — unchanged state hits the per-role memo and returns
//!    without touching the map at all (the dominant case).
//! 2. **Pass-through short-circuit** — trivial identity variants resolve to a
//!    shared pre-compiled entry, bypassing the compiler entirely.
//! 3. **Map lookup/insert** — a short critical section; the lock is never held
//!    across code generation or compilation.
//! 4. **Claim** — outside the lock, exactly one caller wins the entry's
//!    [`ClaimCell`](crate::cache::ClaimCell) and submits the work unit.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::cache::cursor::{Role, RoleCursor};
use crate::cache::entry::CacheEntry;
use crate::code::CodeGenerator;
use crate::compiler::{AsyncCompiler, CompileFlags, CompileStatus, DefineList, DrainOutcome};
use crate::config::CacheConfig;
use crate::disk::{self, DiskCache};
use crate::dump::DumpSink;
use crate::errors::{Error, Result};
use crate::stats::{CacheStats, StatsSnapshot};
use crate::uid::{self, ShaderStage, ShaderUid};

/// Tick between re-checks while blocked in [`ShaderClient::wait_ready`].
const WAIT_TICK: Duration = Duration::from_millis(50);

/// How [`ShaderClient::wait_ready`] treats a still-compiling shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Drain results until the shader concludes. Used when the draw cannot
    /// proceed without it.
    Block,
    /// Drain once and return immediately; the caller substitutes or skips for
    /// this frame and retries on the next draw.
    Poll,
}

/// Result of [`ShaderClient::wait_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStatus {
    /// Compiled bytecode is available.
    Ready,
    /// Trivial identity variant; draw with the fixed-function path, no object
    /// to bind.
    PassThrough,
    /// The compiler rejected this variant; skip or fall back.
    Failed,
    /// Still compiling (or nothing prepared yet).
    Pending,
}

struct CacheShared<G: CodeGenerator> {
    stage: ShaderStage,
    generator: Arc<G>,
    compiler: Arc<AsyncCompiler>,
    entries: Mutex<FxHashMap<G::Uid, Arc<CacheEntry>>>,
    pass_entry: Arc<CacheEntry>,
    disk: Option<Arc<Mutex<DiskCache>>>,
    dump: Option<Arc<DumpSink>>,
    stats: Arc<CacheStats>,
    /// Bumped by `clear()`; outstanding cursors self-invalidate on mismatch.
    epoch: AtomicU64,
    profile: String,
    entry_point: String,
    flags: CompileFlags,
    defines: DefineList,
    retain_source: bool,
}

/// UID-keyed shader object cache for one pipeline stage.
///
/// Owned by the backend's composition root; hand each caller thread a
/// [`ShaderClient`] via [`client`](Self::client).
pub struct ShaderCache<G: CodeGenerator> {
    shared: Arc<CacheShared<G>>,
}

impl<G: CodeGenerator> ShaderCache<G> {
    /// Builds the cache and, when a cache directory is configured, hydrates it
    /// from the stage's disk cache file.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedProfile`] when the configured backend has no
    /// profile for `stage`; [`Error::Io`] when the cache file cannot be
    /// opened or created.
    pub fn new(
        stage: ShaderStage,
        generator: Arc<G>,
        compiler: Arc<AsyncCompiler>,
        config: &CacheConfig,
    ) -> Result<Self> {
        let profile = config
            .backend
            .shader_profile(stage)
            .ok_or(Error::UnsupportedProfile {
                backend: config.backend,
                stage,
            })?;

        let stats = Arc::new(CacheStats::new());

        let mut entries = FxHashMap::default();
        let disk = match &config.cache_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                let path = disk::cache_file_path(dir, config.backend, &config.content_id, stage);
                let mut loaded = 0usize;
                let disk_cache = DiskCache::open(&path, G::Uid::KEY_SIZE, |key, value| {
                    if let Some(loaded_uid) = G::Uid::read_key(key) {
                        entries.insert(loaded_uid, Arc::new(CacheEntry::precompiled(value)));
                        loaded += 1;
                    }
                })?;
                log::info!(
                    "{stage} shader cache: loaded {loaded} precompiled shaders from {}",
                    path.display()
                );
                stats.add_loaded_from_disk(loaded as u64);
                Some(Arc::new(Mutex::new(disk_cache)))
            }
            None => None,
        };
        stats.set_alive(entries.len() as u64);

        let dump = match &config.dump_dir {
            Some(dir) => Some(Arc::new(DumpSink::new(dir.clone(), stage)?)),
            None => None,
        };

        Ok(Self {
            shared: Arc::new(CacheShared {
                stage,
                generator,
                compiler,
                entries: Mutex::new(entries),
                pass_entry: Arc::new(CacheEntry::pass_through()),
                disk,
                dump,
                stats,
                epoch: AtomicU64::new(0),
                profile: profile.to_owned(),
                entry_point: config.entry_point.clone(),
                flags: config.flags,
                defines: DefineList::new(),
                retain_source: config.retain_source,
            }),
        })
    }

    /// Creates the caller handle for one role. Each caller thread owns its
    /// client; the cursor inside is never shared.
    #[must_use]
    pub fn client(&self, role: Role) -> ShaderClient<G> {
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        ShaderClient {
            shared: Arc::clone(&self.shared),
            role,
            cursor: RoleCursor::new(epoch),
        }
    }

    /// Inserts an already-compiled shader, claiming and concluding its entry
    /// immediately. The bytecode slice is copied into an owned buffer.
    pub fn insert_precompiled(&self, uid: &G::Uid, bytecode: &[u8]) {
        let entry = self.shared.lookup_or_insert(uid);
        entry.claim().try_claim();
        entry.attach_bytecode(bytecode.into());
        self.shared.stats.add_loaded_from_disk(1);
    }

    /// Drains the compiler fully, persists the disk cache, frees every entry,
    /// and invalidates all outstanding cursors.
    pub fn clear(&self) {
        self.shared.compiler.wait_for_finish();
        if let Some(disk) = &self.shared.disk
            && let Err(err) = disk.lock().sync()
        {
            log::warn!("{} shader disk cache flush failed: {err}", self.shared.stage);
        }
        self.shared.entries.lock().clear();
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        self.shared.stats.set_alive(0);
    }

    /// Tears the cache down at backend shutdown.
    pub fn shutdown(&self) {
        self.clear();
        let stats = self.shared.stats.snapshot();
        log::info!(
            "{} shader cache shutdown: {} compiled, {} failed, {} loaded from disk",
            self.shared.stage,
            stats.shaders_created,
            stats.compile_failures,
            stats.loaded_from_disk
        );
    }

    /// Number of live entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// Counter snapshot for diagnostics overlays and tests.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.shared.stage
    }
}

impl<G: CodeGenerator> CacheShared<G> {
    /// The only place the entry map lock is taken. Held across lookup/insert
    /// only, never across generation or compilation.
    fn lookup_or_insert(&self, target: &G::Uid) -> Arc<CacheEntry> {
        self.stats.record_map_lookup();
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(target.clone())
            .or_insert_with(|| Arc::new(CacheEntry::new()))
            .clone();
        self.stats.set_alive(entries.len() as u64);
        entry
    }

    /// Builds and submits the work unit for a freshly claimed entry.
    fn submit_compile(&self, target: G::Uid, entry: Arc<CacheEntry>) {
        let mut unit = self.compiler.new_unit(self.stage.source_buffer_hint());
        unit.entry_point = self.entry_point.clone();
        unit.profile = self.profile.clone();
        unit.flags = self.flags;
        unit.defines = self.defines.clone();

        // Source generation runs on the worker, off the caller's thread.
        let generator = Arc::clone(&self.generator);
        let generate_uid = target.clone();
        unit.set_generator(move |out| generator.generate(&generate_uid, out));

        let stats = Arc::clone(&self.stats);
        let disk = self.disk.clone();
        let dump = self.dump.clone();
        let retain_source = self.retain_source;
        let stage = self.stage;
        unit.set_result_handler(move |unit| match unit.status() {
            CompileStatus::Succeeded => {
                let bytecode = unit.take_bytecode().unwrap_or_default();
                if let Some(disk) = &disk {
                    let key = uid::encode_key(&target);
                    if let Err(err) = disk.lock().append(&key, &bytecode) {
                        log::warn!("{stage} shader disk cache append failed: {err}");
                    }
                }
                if retain_source {
                    entry.retain_source(unit.source.as_str());
                }
                entry.attach_bytecode(bytecode);
                stats.record_created();
            }
            CompileStatus::Failed => {
                let diagnostic = unit.error().unwrap_or("no diagnostic");
                match dump
                    .as_ref()
                    .map(|sink| sink.write_failure(unit.source.as_str(), diagnostic))
                {
                    Some(Ok(path)) => log::warn!(
                        "failed to compile {stage} shader, source and diagnostic dumped to {}",
                        path.display()
                    ),
                    Some(Err(err)) => log::warn!(
                        "failed to compile {stage} shader ({diagnostic}); dump also failed: {err}"
                    ),
                    None => log::warn!("failed to compile {stage} shader: {diagnostic}"),
                }
                entry.mark_failed();
                stats.record_failure();
            }
            CompileStatus::Pending => {
                debug_assert!(false, "result handler invoked on pending unit");
            }
        });

        self.compiler.submit(unit);
        self.stats.record_compile_request();
    }
}

// ─── ShaderClient ────────────────────────────────────────────────────────────

/// Per-role caller handle: the cache plus this role's cursor.
///
/// `Send` but deliberately not `Sync`/`Clone` — each caller thread owns
/// exactly one, which is what keeps the memo slots race free.
pub struct ShaderClient<G: CodeGenerator> {
    shared: Arc<CacheShared<G>>,
    role: Role,
    cursor: RoleCursor<G::Uid>,
}

impl<G: CodeGenerator> ShaderClient<G> {
    /// Resolves the shader for the current hardware state, kicking off an
    /// asynchronous compile on a cache miss. Called once per draw.
    ///
    /// Never blocks: on a miss the draw-side decision is deferred to
    /// [`wait_ready`](Self::wait_ready).
    pub fn prepare(&mut self, state: &G::State) {
        let target = self.shared.generator.uid(state);
        let epoch = self.shared.epoch.load(Ordering::Acquire);

        match self.role {
            Role::Authoritative => {
                self.shared.compiler.process_results();
                if self.cursor.matches(&target, epoch) {
                    self.shared.stats.record_memo_hit();
                    return;
                }
                if target.is_pass_through() {
                    self.shared.stats.record_pass_through();
                    let pass = Arc::clone(&self.shared.pass_entry);
                    self.cursor.remember(target, Some(pass), epoch);
                    return;
                }
            }
            Role::Speculative => {
                if self.cursor.matches(&target, epoch) {
                    return;
                }
                if target.is_pass_through() {
                    self.cursor.remember(target, None, epoch);
                    return;
                }
            }
        }

        let entry = self.shared.lookup_or_insert(&target);
        let memo_entry = match self.role {
            Role::Authoritative => Some(Arc::clone(&entry)),
            Role::Speculative => None,
        };
        self.cursor.remember(target.clone(), memo_entry, epoch);

        // Outside the map lock: exactly one caller wins the claim and pays
        // for generation + compilation.
        if entry.claim().try_claim() {
            self.shared.submit_compile(target, entry);
        }
    }

    /// Reports whether the shader selected by the last
    /// [`prepare`](Self::prepare) is usable, immediately before its bytecode
    /// is consumed.
    ///
    /// With [`WaitMode::Block`] this drains compile results until the entry
    /// concludes; with [`WaitMode::Poll`] it drains once and returns, letting
    /// the caller skip or substitute for this frame.
    ///
    /// Meaningful on the authoritative client only; a speculative client
    /// always sees [`ShaderStatus::Pending`].
    pub fn wait_ready(&mut self, mode: WaitMode) -> ShaderStatus {
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        let Some(entry) = self.cursor.entry_for(epoch).cloned() else {
            return ShaderStatus::Pending;
        };
        if entry.is_pass_through() {
            return ShaderStatus::PassThrough;
        }

        loop {
            self.shared.compiler.process_results();
            if entry.is_compiled() {
                return if entry.has_bytecode() {
                    ShaderStatus::Ready
                } else {
                    ShaderStatus::Failed
                };
            }
            match mode {
                WaitMode::Poll => return ShaderStatus::Pending,
                WaitMode::Block => {
                    if self.shared.compiler.drain_one_blocking(WAIT_TICK) == DrainOutcome::Closed {
                        // Compiler tear-down while waiting; nothing will ever
                        // conclude this entry.
                        return ShaderStatus::Pending;
                    }
                }
            }
        }
    }

    /// Bytecode of the currently selected shader, once
    /// [`wait_ready`](Self::wait_ready) reported [`ShaderStatus::Ready`].
    #[must_use]
    pub fn bytecode(&self) -> Option<&[u8]> {
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        self.cursor.entry_for(epoch).and_then(|entry| {
            let bytes = entry.bytecode()?;
            (!bytes.is_empty()).then_some(bytes)
        })
    }

    /// Entry selected by the last [`prepare`](Self::prepare), if still valid.
    #[must_use]
    pub fn current_entry(&self) -> Option<&Arc<CacheEntry>> {
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        self.cursor.entry_for(epoch)
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }
}
