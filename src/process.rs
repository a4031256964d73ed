//! Process-wide entry points.
//!
//! A process hosts at most one VM, so the runtime behind these functions is a
//! lazily built global. The embedding library and configuration are loaded on
//! first use.

use crate::config::EmbedConfig;
use crate::error::{Error, Result, STATUS_FAILED};
use crate::vm::{InitRequest, JvmRuntime};
use parking_lot::Mutex;
use std::sync::Arc;

struct Process {
    runtime: JvmRuntime,
    config: EmbedConfig,
}

static PROCESS: Mutex<Option<Process>> = parking_lot::const_mutex(None);

/// The process runtime, loading the embedding library on first use.
///
/// A load failure is not cached; the next call tries again.
pub fn runtime() -> Result<JvmRuntime> {
    with_process(EmbedConfig::load, |process| process.runtime.clone())
}

/// The process runtime, building it from `config` on first use.
///
/// `config` is ignored once the runtime exists.
pub fn runtime_with(config: EmbedConfig) -> Result<JvmRuntime> {
    with_process(|| Ok(config), |process| process.runtime.clone())
}

/// The process runtime if it has been built.
pub fn try_runtime() -> Option<JvmRuntime> {
    PROCESS.lock().as_ref().map(|process| process.runtime.clone())
}

fn with_process<T>(
    load_config: impl FnOnce() -> Result<EmbedConfig>,
    f: impl FnOnce(&Process) -> T,
) -> Result<T> {
    let mut slot = PROCESS.lock();
    if let Some(process) = slot.as_ref() {
        return Ok(f(process));
    }

    let config = load_config()?;
    let iface = load_embedding(&config)?;
    let process = Process {
        runtime: JvmRuntime::new(iface),
        config,
    };
    let value = f(&process);
    *slot = Some(process);
    Ok(value)
}

#[cfg(unix)]
fn load_embedding(config: &EmbedConfig) -> Result<Arc<dyn crate::embedding::EmbeddingInterface>> {
    Ok(Arc::new(crate::embedding::create_default(config)?))
}

#[cfg(not(unix))]
fn load_embedding(_config: &EmbedConfig) -> Result<Arc<dyn crate::embedding::EmbeddingInterface>> {
    Err(Error::library("VM embedding is not supported on this platform"))
}

/// Build the request for one `init_jvm` call on top of the loaded
/// configuration.
fn request_for(config: &EmbedConfig, classpath: Option<&str>, options: &[String]) -> InitRequest {
    let mut request = InitRequest::from_config(config);
    if let Some(classpath) = classpath {
        request.classpath = Some(classpath.to_string());
    }
    request.options.extend(options.iter().cloned());
    request
}

/// Initialize the VM, or attach to the one already running.
///
/// Returns `0` when this call created the VM on the calling thread, `1` when
/// it was created on a worker thread or an existing VM was attached, `-2`
/// when VMs exist but none accepted the thread, and `-1` on any other
/// failure.
pub fn init_jvm(classpath: Option<&str>, options: &[String]) -> i32 {
    let prepared = with_process(EmbedConfig::load, |process| {
        (
            process.runtime.clone(),
            request_for(&process.config, classpath, options),
        )
    });
    let (runtime, request) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!(error = %e, "cannot load VM embedding");
            return STATUS_FAILED;
        }
    };

    match runtime.ensure_ready(&request) {
        Ok(outcome) => outcome.status_code(),
        Err(e) => {
            tracing::error!(error = %e, "VM initialization failed");
            e.status_code()
        }
    }
}

/// Destroy the VM if this process created or attached one.
///
/// After this, [`init_jvm`] fails for the rest of the process lifetime.
pub fn done_jvm() {
    match try_runtime() {
        Some(runtime) => runtime.teardown(),
        None => tracing::debug!("no VM runtime to tear down"),
    }
}

/// Fail with [`Error::NoVm`] unless a runtime exists and is ready.
pub fn require_ready() -> Result<JvmRuntime> {
    match try_runtime() {
        Some(runtime) if runtime.is_ready() => Ok(runtime),
        _ => Err(Error::NoVm),
    }
}
