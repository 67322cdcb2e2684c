//! Memoization of compiled bytecode per (source, options) key.
//!
//! The native compiler call is expensive (library loading plus a full
//! compilation), so concurrent requests for the same key must converge on a
//! single in-flight computation. Readers never block each other; no lock is
//! ever held across the compute step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::bytecode::{BytecodeCompiler, HlslBytecodeInfo};
use crate::cancel::{Cancelled, CancellationToken};
use crate::options::CompileOptions;

/// Identity of one compilation request. Compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: Arc<str>,
    pub options: CompileOptions,
    /// False models "precompilation deliberately skipped", e.g. when the
    /// thread group size attribute is missing upstream.
    pub is_compilation_enabled: bool,
}

/// Per-key state machine: `Vacant -> InFlight -> Resolved` (terminal).
enum SlotState {
    Vacant,
    InFlight,
    Resolved(HlslBytecodeInfo),
}

struct Slot {
    state: Mutex<SlotState>,
    resolved: Condvar,
}

impl Slot {
    fn new() -> Self {
        Slot {
            state: Mutex::new(SlotState::Vacant),
            resolved: Condvar::new(),
        }
    }
}

/// Resets an in-flight slot to vacant if the winner unwinds without
/// resolving it, so a panicking or cancelled compute never wedges waiters.
struct InFlightGuard<'a> {
    slot: &'a Slot,
    disarmed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.disarmed {
            *self.slot.state.lock() = SlotState::Vacant;
            self.slot.resolved.notify_all();
        }
    }
}

/// How long a waiter sleeps between checks of its own cancellation token.
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Process-lifetime memoization of [`HlslBytecodeInfo`] per [`CacheKey`].
///
/// Owned by the compilation session and passed explicitly to callers; there
/// is no global instance, so tests get a fresh, isolated cache each.
#[derive(Default)]
pub struct BytecodeCompilationCache {
    slots: RwLock<HashMap<CacheKey, Arc<Slot>>>,
}

impl BytecodeCompilationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys that currently hold a slot (resolved or in flight).
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Returns the cached result for `key`, computing it on a miss.
    ///
    /// Exactly one concurrent caller per key invokes `compute`; the others
    /// wait and receive the broadcast result. A caller whose own token fires
    /// while waiting unwinds with [`Cancelled`] without disturbing the
    /// computation. A winner whose compute is cancelled resets the slot to
    /// vacant so the entry is never poisoned for other callers.
    pub fn get_or_create<F>(
        &self,
        key: &CacheKey,
        compute: F,
        token: &CancellationToken,
    ) -> Result<HlslBytecodeInfo, Cancelled>
    where
        F: FnOnce(&CancellationToken) -> Result<HlslBytecodeInfo, Cancelled>,
    {
        token.check()?;

        if !key.is_compilation_enabled {
            return Ok(HlslBytecodeInfo::Missing);
        }

        let slot = self.slot(key);
        let mut state = slot.state.lock();
        loop {
            match &*state {
                SlotState::Resolved(info) => {
                    log::debug!("bytecode cache hit");
                    return Ok(info.clone());
                }
                SlotState::Vacant => {
                    *state = SlotState::InFlight;
                    drop(state);

                    return Self::resolve(&slot, compute, token);
                }
                SlotState::InFlight => {
                    let _ = slot.resolved.wait_for(&mut state, WAIT_SLICE);
                    if token.is_cancelled() {
                        // Take a result that landed while we were waking up,
                        // otherwise unwind; the in-flight computation belongs
                        // to another caller and keeps running.
                        if let SlotState::Resolved(info) = &*state {
                            return Ok(info.clone());
                        }
                        return Err(Cancelled);
                    }
                }
            }
        }
    }

    fn slot(&self, key: &CacheKey) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }

        Arc::clone(
            self.slots
                .write()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Slot::new())),
        )
    }

    fn resolve<F>(
        slot: &Slot,
        compute: F,
        token: &CancellationToken,
    ) -> Result<HlslBytecodeInfo, Cancelled>
    where
        F: FnOnce(&CancellationToken) -> Result<HlslBytecodeInfo, Cancelled>,
    {
        let mut guard = InFlightGuard {
            slot,
            disarmed: false,
        };
        let result = compute(token);
        guard.disarmed = true;

        match result {
            Ok(info) => {
                *slot.state.lock() = SlotState::Resolved(info.clone());
                slot.resolved.notify_all();
                log::debug!("bytecode cache miss resolved");

                Ok(info)
            }
            Err(Cancelled) => {
                *slot.state.lock() = SlotState::Vacant;
                slot.resolved.notify_all();

                Err(Cancelled)
            }
        }
    }
}

/// Bundles a cache with the compiler backend that fills it.
pub struct CompilationSession<C: BytecodeCompiler> {
    cache: BytecodeCompilationCache,
    compiler: C,
}

impl<C: BytecodeCompiler> CompilationSession<C> {
    pub fn new(compiler: C) -> Self {
        CompilationSession {
            cache: BytecodeCompilationCache::new(),
            compiler,
        }
    }

    /// Compiles `source` through the session cache.
    pub fn compile(
        &self,
        source: Arc<str>,
        options: CompileOptions,
        is_compilation_enabled: bool,
        token: &CancellationToken,
    ) -> Result<HlslBytecodeInfo, Cancelled> {
        let key = CacheKey {
            source,
            options,
            is_compilation_enabled,
        };

        self.cache.get_or_create(
            &key,
            |token| self.compiler.compile(&key.source, &key.options, token),
            token,
        )
    }

    pub fn cache(&self) -> &BytecodeCompilationCache {
        &self.cache
    }
}
