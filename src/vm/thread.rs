//! Per-thread environment handles.

use crate::embedding::EnvPtr;
use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    /// Environment of the current thread, keyed by the runtime that
    /// attached it.
    static ATTACHED: Cell<Option<(u64, EnvPtr)>> = const { Cell::new(None) };
}

/// The calling thread's attachment to the VM.
///
/// Not `Send`: an environment handle is only valid on the thread that
/// obtained it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadEnv {
    raw: EnvPtr,
    _thread_bound: PhantomData<*const ()>,
}

impl ThreadEnv {
    pub(crate) fn new(raw: EnvPtr) -> Self {
        Self {
            raw,
            _thread_bound: PhantomData,
        }
    }

    /// The raw environment handle.
    pub fn as_ptr(&self) -> EnvPtr {
        self.raw
    }
}

pub(crate) fn cached(runtime: u64) -> Option<EnvPtr> {
    ATTACHED.with(|slot| match slot.get() {
        Some((id, env)) if id == runtime => Some(env),
        _ => None,
    })
}

pub(crate) fn remember(runtime: u64, env: EnvPtr) {
    ATTACHED.with(|slot| slot.set(Some((runtime, env))));
}

pub(crate) fn forget(runtime: u64) {
    ATTACHED.with(|slot| {
        if matches!(slot.get(), Some((id, _)) if id == runtime) {
            slot.set(None);
        }
    });
}
