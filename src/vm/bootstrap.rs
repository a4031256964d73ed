//! One-time creation of a new VM.

use crate::embedding::{EmbeddingInterface, EnvPtr, VmPtr};
use crate::error::{Error, Result};
use crate::vm::hooks::{self, HookTargets};
use crate::vm::options::OptionVector;

/// A freshly created VM and the creating thread's environment.
#[derive(Debug, Clone, Copy)]
pub struct Bootstrapped {
    /// The new VM.
    pub vm: VmPtr,
    /// Environment of the thread that created it.
    pub env: EnvPtr,
}

/// Create a new VM from `options`.
///
/// The option vector is consumed and released once the creation attempt
/// returns, whatever the outcome. If the vector registers hooks, `targets`
/// are installed before the VM can call them.
///
/// Must be called at most once per process; the coordinator guarantees it.
pub fn bootstrap(
    iface: &dyn EmbeddingInterface,
    options: OptionVector,
    targets: &HookTargets,
) -> Result<Bootstrapped> {
    iface.check_version()?;

    if options.hooks().next().is_some() {
        hooks::install(targets.clone());
    }

    tracing::debug!(
        backend = iface.name(),
        options = options.len(),
        "creating VM"
    );

    let outcome = iface.create_vm(&options);
    drop(options);
    let outcome = outcome?;

    if outcome.status != 0 {
        tracing::error!(status = outcome.status, "cannot create Java virtual machine");
        return Err(Error::Creation {
            status: outcome.status,
        });
    }

    let (vm, env) = match (outcome.vm, outcome.env) {
        (Some(vm), Some(env)) => (vm, env),
        _ => {
            tracing::error!("VM creation succeeded without a usable environment");
            return Err(Error::EnvironmentUnavailable);
        }
    };

    tracing::info!(backend = iface.name(), "created VM");
    Ok(Bootstrapped { vm, env })
}
