//! Process-wide VM initialization.
//!
//! [`JvmRuntime`] is the single source of truth for whether a usable VM
//! exists and whether the calling thread is attached to it. Every access goes
//! through one mutex-guarded state machine:
//!
//! 1. Resident VMs are looked up first. If any exist, the calling thread
//!    attaches to the first that accepts it; no VM is ever created in that
//!    case.
//! 2. Otherwise exactly one thread creates the VM, either inline or on a
//!    dedicated worker thread. Threads arriving meanwhile wait until the
//!    creation settles and then take the attach path.
//!
//! Failures are terminal: a runtime that reached `Failed` or `TornDown`
//! never touches the embedding interface again.

use crate::config::{EmbedConfig, ThreadingModel};
use crate::embedding::{EmbeddingInterface, EnvPtr, VmPtr};
use crate::error::{Error, Result, STATUS_FAILED};
use crate::vm::bootstrap::{bootstrap, Bootstrapped};
use crate::vm::hooks::HookTargets;
use crate::vm::locator;
use crate::vm::options::{HookMask, OptionBuilder, OptionVector};
use crate::vm::reflection::{self, ReflectionHandles};
use crate::vm::signal::Completion;
use crate::vm::state::{InitOutcome, InitializationState};
use crate::vm::thread::{self, ThreadEnv};
use crate::vm::{OutputSink, TerminationPolicy};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

/// Class pre-loaded on the worker thread when GUI support is requested.
pub const GUI_PRELOAD_CLASS: &str = "java/awt/Frame";

/// Name of the creation worker thread.
const WORKER_THREAD_NAME: &str = "jembed-init";

/// Environment lookup used when building startup options.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Parameters of one initialization call.
#[derive(Debug, Clone, Default)]
pub struct InitRequest {
    /// Explicit classpath; falls back to `CLASSPATH`.
    pub classpath: Option<String>,
    /// Extra startup options.
    pub options: Vec<String>,
    /// Native hooks to install.
    pub hooks: HookMask,
    /// Creation scheduling.
    pub threading: ThreadingModel,
    /// Pre-load the GUI toolkit on the worker thread.
    pub preload_gui: bool,
}

impl InitRequest {
    /// Request with the given classpath and options and default settings.
    pub fn new(classpath: Option<String>, options: Vec<String>) -> Self {
        Self {
            classpath,
            options,
            ..Default::default()
        }
    }

    /// Request derived from a configuration.
    pub fn from_config(config: &EmbedConfig) -> Self {
        Self {
            classpath: config.classpath.clone(),
            options: config.options.clone(),
            hooks: config.hooks,
            threading: config.threading,
            preload_gui: config.preload_gui,
        }
    }

    /// Select the threading model.
    pub fn threading(mut self, threading: ThreadingModel) -> Self {
        self.threading = threading;
        self
    }

    /// Select the hooks to install.
    pub fn hooks(mut self, hooks: HookMask) -> Self {
        self.hooks = hooks;
        self
    }
}

/// Handle to the process's VM state machine.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct JvmRuntime {
    shared: Arc<Shared>,
}

struct Shared {
    id: u64,
    iface: Arc<dyn EmbeddingInterface>,
    targets: HookTargets,
    env: EnvLookup,
    inner: Mutex<Inner>,
    changed: Condvar,
    reflection: OnceLock<ReflectionHandles>,
    ready: AtomicBool,
}

/// State guarded by the runtime mutex.
struct Inner {
    state: InitializationState,
    /// Once set, never replaced; cleared only by teardown.
    vm: Option<VmPtr>,
    status: Option<i32>,
    worker: Option<JoinHandle<()>>,
}

/// Builder for [`JvmRuntime`].
pub struct RuntimeBuilder {
    iface: Arc<dyn EmbeddingInterface>,
    targets: HookTargets,
    env: EnvLookup,
}

impl RuntimeBuilder {
    /// Route VM output to `sink` instead of the host's standard streams.
    pub fn output_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.targets.output = sink;
        self
    }

    /// Handle VM termination requests with `policy`.
    pub fn termination_policy(mut self, policy: Arc<dyn TerminationPolicy>) -> Self {
        self.targets.termination = policy;
        self
    }

    /// Use `env` instead of the process environment when building options.
    pub fn env_lookup(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Build the runtime.
    pub fn build(self) -> JvmRuntime {
        JvmRuntime {
            shared: Arc::new(Shared {
                id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
                iface: self.iface,
                targets: self.targets,
                env: self.env,
                inner: Mutex::new(Inner {
                    state: InitializationState::Uninitialized,
                    vm: None,
                    status: None,
                    worker: None,
                }),
                changed: Condvar::new(),
                reflection: OnceLock::new(),
                ready: AtomicBool::new(false),
            }),
        }
    }
}

impl JvmRuntime {
    /// Create a runtime over an embedding interface with default hook
    /// targets and the process environment.
    ///
    /// Creation happens at most once per runtime, not per process. Code
    /// that shares the process's VM should go through
    /// [`crate::process::runtime`] rather than building its own.
    pub fn new(iface: Arc<dyn EmbeddingInterface>) -> Self {
        Self::builder(iface).build()
    }

    /// Start configuring a runtime.
    ///
    /// See [`JvmRuntime::new`] for the scope of the exactly-once guarantee.
    pub fn builder(iface: Arc<dyn EmbeddingInterface>) -> RuntimeBuilder {
        RuntimeBuilder {
            iface,
            targets: HookTargets::default(),
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Make sure a VM exists and the calling thread is attached to it.
    pub fn ensure_ready(&self, request: &InitRequest) -> Result<InitOutcome> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();

        while inner.state == InitializationState::Initializing {
            tracing::debug!("waiting for VM creation on another thread");
            shared.changed.wait(&mut inner);
        }

        match inner.state {
            InitializationState::Failed => {
                return Err(Error::Failed {
                    status: inner.status.unwrap_or(STATUS_FAILED),
                })
            }
            InitializationState::TornDown => return Err(Error::TornDown),
            _ => {}
        }

        let mut candidates = match locator::locate(&*shared.iface) {
            Ok(vms) => vms,
            Err(e) => {
                if inner.state == InitializationState::Uninitialized {
                    shared.fail(&mut inner, &e);
                }
                return Err(e);
            }
        };
        if let Some(bound) = inner.vm {
            if let Some(pos) = candidates.iter().position(|vm| *vm == bound) {
                candidates.swap(0, pos);
            } else {
                candidates.insert(0, bound);
            }
        }

        if !candidates.is_empty() {
            tracing::debug!(
                count = candidates.len(),
                "VMs found, trying to attach the current thread"
            );
            return shared.attach_existing(&mut inner, &candidates);
        }

        shared.transition(&mut inner, InitializationState::Initializing);
        drop(inner);

        let env = Arc::clone(&shared.env);
        let options = OptionBuilder::new()
            .classpath(request.classpath.clone())
            .options(request.options.iter().cloned())
            .hooks(request.hooks)
            .build_with_env(|name| env(name));

        match request.threading {
            ThreadingModel::Inline => shared.create_inline(options),
            ThreadingModel::Worker => Shared::create_on_worker(shared, options, request.preload_gui),
        }
    }

    /// The bound VM, if any.
    pub fn current_vm(&self) -> Option<VmPtr> {
        self.shared.inner.lock().vm
    }

    /// Current state.
    pub fn state(&self) -> InitializationState {
        self.shared.inner.lock().state
    }

    /// Status recorded by the last settled creation or failure.
    pub fn status(&self) -> Option<i32> {
        self.shared.inner.lock().status
    }

    /// Whether the reflection cache has been published.
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    /// Reflection handles, once published.
    pub fn reflection(&self) -> Option<ReflectionHandles> {
        if self.is_ready() {
            self.shared.reflection.get().copied()
        } else {
            None
        }
    }

    /// The calling thread's environment, if it is attached.
    pub fn current_env(&self) -> Option<ThreadEnv> {
        if self.state() == InitializationState::TornDown {
            return None;
        }
        thread::cached(self.shared.id).map(ThreadEnv::new)
    }

    /// Attach the calling thread to the bound VM.
    ///
    /// Attaching an already attached thread returns its existing handle.
    pub fn attach_current_thread(&self) -> Result<ThreadEnv> {
        let inner = self.shared.inner.lock();
        if inner.state == InitializationState::TornDown {
            return Err(Error::TornDown);
        }
        if let Some(env) = thread::cached(self.shared.id) {
            return Ok(ThreadEnv::new(env));
        }
        let vm = inner.vm.ok_or(Error::NoVm)?;
        drop(inner);

        let env = self
            .shared
            .iface
            .attach_current_thread(vm)
            .map_err(|status| {
                tracing::warn!(status, "failed to attach current thread");
                Error::AttachExhausted { found: 1 }
            })?;
        thread::remember(self.shared.id, env);
        Ok(ThreadEnv::new(env))
    }

    /// Detach the calling thread, if attached.
    pub fn detach_current_thread(&self) {
        if thread::cached(self.shared.id).is_none() {
            return;
        }
        if let Some(vm) = self.current_vm() {
            let status = self.shared.iface.detach_current_thread(vm);
            tracing::debug!(status, "detached current thread");
        }
        thread::forget(self.shared.id);
    }

    /// Destroy the VM and clear the bound handle.
    ///
    /// Irreversible: the runtime ends in `TornDown` and later initialization
    /// calls fail with [`Error::TornDown`]. Must not be called while other
    /// threads are using the VM.
    pub fn teardown(&self) {
        let worker = self.shared.inner.lock().worker.take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::warn!("VM creation thread panicked");
            }
        }

        let mut inner = self.shared.inner.lock();
        if let Some(vm) = inner.vm.take() {
            let status = self.shared.iface.destroy_vm(vm);
            tracing::info!(status, "destroyed VM");
        }
        inner.state = InitializationState::TornDown;
        self.shared.ready.store(false, Ordering::Release);
        thread::forget(self.shared.id);
        self.shared.changed.notify_all();
    }
}

impl std::fmt::Debug for JvmRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JvmRuntime")
            .field("id", &self.shared.id)
            .field("backend", &self.shared.iface.name())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn transition(&self, inner: &mut MutexGuard<'_, Inner>, next: InitializationState) {
        debug_assert!(
            inner.state.can_transition_to(next),
            "invalid transition {} -> {}",
            inner.state,
            next
        );
        tracing::debug!(from = %inner.state, to = %next, "initialization state");
        inner.state = next;
        self.changed.notify_all();
    }

    fn fail(&self, inner: &mut MutexGuard<'_, Inner>, err: &Error) {
        tracing::error!(error = %err, "VM initialization failed");
        inner.status = Some(err.status_code());
        self.transition(inner, InitializationState::Failed);
    }

    fn publish(&self, handles: ReflectionHandles) {
        let _ = self.reflection.set(handles);
        self.ready.store(true, Ordering::Release);
    }

    fn populate_once(&self, env: EnvPtr) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        let handles = reflection::populate(&*self.iface, env)?;
        self.publish(handles);
        Ok(())
    }

    fn attach_existing(
        &self,
        inner: &mut MutexGuard<'_, Inner>,
        candidates: &[VmPtr],
    ) -> Result<InitOutcome> {
        for (index, vm) in candidates.iter().enumerate() {
            let env = match self.iface.attach_current_thread(*vm) {
                Ok(env) => env,
                Err(status) => {
                    tracing::debug!(vm = index + 1, status, "attach failed");
                    continue;
                }
            };

            tracing::debug!(vm = index + 1, "attached to existing VM");
            if inner.vm.is_none() {
                inner.vm = Some(*vm);
            }
            thread::remember(self.id, env);

            if let Err(e) = self.populate_once(env) {
                self.fail(inner, &e);
                return Err(e);
            }
            if inner.state == InitializationState::Uninitialized {
                inner.status = Some(1);
                self.transition(inner, InitializationState::Ready);
            }
            return Ok(InitOutcome::Attached { index });
        }

        let err = Error::AttachExhausted {
            found: candidates.len(),
        };
        if inner.state == InitializationState::Uninitialized {
            self.fail(inner, &err);
        } else {
            tracing::warn!(error = %err, "could not attach current thread");
        }
        Err(err)
    }

    fn create_inline(&self, options: OptionVector) -> Result<InitOutcome> {
        let _settle = SettleOnUnwind {
            shared: self,
            created: None,
        };
        let booted = match bootstrap(&*self.iface, options, &self.targets) {
            Ok(booted) => booted,
            Err(e) => {
                self.fail(&mut self.inner.lock(), &e);
                return Err(e);
            }
        };
        let populated = reflection::populate(&*self.iface, booted.env);

        let mut inner = self.inner.lock();
        inner.vm = Some(booted.vm);
        match populated {
            Ok(handles) => {
                thread::remember(self.id, booted.env);
                self.publish(handles);
                inner.status = Some(0);
                self.transition(&mut inner, InitializationState::Ready);
                Ok(InitOutcome::Created)
            }
            Err(e) => {
                self.fail(&mut inner, &e);
                Err(e)
            }
        }
    }

    fn create_on_worker(
        this: &Arc<Shared>,
        options: OptionVector,
        preload_gui: bool,
    ) -> Result<InitOutcome> {
        let created: Completion<Result<VmPtr>> = Completion::new();

        tracing::debug!("launching VM creation thread");
        let worker = {
            let shared = Arc::clone(this);
            let created = created.clone();
            std::thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn(move || shared.run_worker(options, preload_gui, created))
        };
        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                let err = Error::Io(e);
                this.fail(&mut this.inner.lock(), &err);
                return Err(err);
            }
        };
        this.inner.lock().worker = Some(worker);

        tracing::debug!("waiting for VM creation");
        let vm = created.wait().ok_or(Error::NoVm)??;

        tracing::debug!("attaching to VM created on worker thread");
        let env = this.iface.attach_current_thread(vm).map_err(|status| {
            tracing::error!(status, "cannot attach to VM created on worker thread");
            Error::AttachExhausted { found: 1 }
        })?;
        thread::remember(this.id, env);
        Ok(InitOutcome::CreatedOnWorker)
    }

    fn run_worker(
        &self,
        options: OptionVector,
        preload_gui: bool,
        created: Completion<Result<VmPtr>>,
    ) {
        let _settle = SettleOnUnwind {
            shared: self,
            created: Some(created.clone()),
        };

        let Bootstrapped { vm, env } = match bootstrap(&*self.iface, options, &self.targets) {
            Ok(booted) => booted,
            Err(e) => {
                self.fail(&mut self.inner.lock(), &e);
                created.complete(Err(e));
                return;
            }
        };

        // Publish before releasing the caller.
        self.inner.lock().vm = Some(vm);
        created.complete(Ok(vm));

        let populated = reflection::populate(&*self.iface, env);
        let ready = {
            let mut inner = self.inner.lock();
            match populated {
                Ok(handles) => {
                    self.publish(handles);
                    inner.status = Some(1);
                    self.transition(&mut inner, InitializationState::Ready);
                    true
                }
                Err(e) => {
                    self.fail(&mut inner, &e);
                    false
                }
            }
        };

        if ready && preload_gui {
            tracing::debug!(class = GUI_PRELOAD_CLASS, "pre-loading GUI toolkit");
            match self.iface.find_class(env, GUI_PRELOAD_CLASS) {
                Some(class) => self.iface.delete_local_ref(env, class),
                None => {
                    tracing::warn!(class = GUI_PRELOAD_CLASS, "GUI toolkit class not available");
                    self.iface.exception_clear(env);
                }
            }
        }

        // Destroying the VM waits for every attached non-daemon thread.
        let status = self.iface.detach_current_thread(vm);
        tracing::debug!(status, "VM creation thread done");
    }
}

/// Settles a creation attempt that unwinds before reaching `Ready` or
/// `Failed`, so neither the caller nor queued threads wait forever.
struct SettleOnUnwind<'a> {
    shared: &'a Shared,
    created: Option<Completion<Result<VmPtr>>>,
}

impl Drop for SettleOnUnwind<'_> {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state == InitializationState::Initializing {
                self.shared.fail(&mut inner, &Error::CreationAborted);
            }
        }
        // No-op when the attempt already published its result.
        if let Some(created) = &self.created {
            created.complete(Err(Error::CreationAborted));
        }
    }
}
