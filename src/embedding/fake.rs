//! Scriptable in-memory embedding interface for tests.

use super::{ClassRef, CreateOutcome, EmbeddingInterface, EnvPtr, MethodRef, NativeStatus, VmPtr};
use crate::error::{Error, Result};
use crate::vm::options::OptionVector;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::thread::ThreadId;
use std::time::Duration;

#[derive(Default)]
struct State {
    next_addr: usize,
    resident: Vec<VmPtr>,
    failing_attach: HashSet<VmPtr>,
    attached: HashMap<(ThreadId, VmPtr), EnvPtr>,
    locals: HashSet<ClassRef>,
    globals: HashSet<ClassRef>,
    missing_classes: HashSet<String>,
    missing_methods: HashSet<String>,
    class_lookups: Vec<String>,
    static_lookups: Vec<String>,
    last_options: Option<OptionVector>,
    version_status: NativeStatus,
    query_status: NativeStatus,
    create_status: NativeStatus,
    create_without_env: bool,
    create_panics: bool,
    create_delay: Duration,
    create_calls: usize,
    attach_calls: usize,
    destroy_calls: usize,
    exception_clears: usize,
}

impl State {
    fn alloc(&mut self) -> *mut c_void {
        self.next_addr += 0x10;
        (0x1000 + self.next_addr) as *mut c_void
    }

    fn vm(&mut self) -> VmPtr {
        VmPtr::from_raw(self.alloc()).unwrap()
    }

    fn env(&mut self) -> EnvPtr {
        EnvPtr::from_raw(self.alloc()).unwrap()
    }

    fn class(&mut self) -> ClassRef {
        ClassRef::from_raw(self.alloc()).unwrap()
    }

    fn method(&mut self) -> MethodRef {
        MethodRef::from_raw(self.alloc()).unwrap()
    }
}

/// In-memory stand-in for a VM library.
#[derive(Default)]
pub(crate) struct FakeEmbedding {
    state: Mutex<State>,
}

impl FakeEmbedding {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Simulate a VM created by the host before the runtime was used.
    pub(crate) fn add_resident_vm(&self) -> VmPtr {
        let mut state = self.state.lock();
        let vm = state.vm();
        state.resident.push(vm);
        vm
    }

    pub(crate) fn resident_vms(&self) -> Vec<VmPtr> {
        self.state.lock().resident.clone()
    }

    pub(crate) fn fail_attach(&self, vm: VmPtr) {
        self.state.lock().failing_attach.insert(vm);
    }

    pub(crate) fn remove_class(&self, name: &str) {
        self.state.lock().missing_classes.insert(name.to_string());
    }

    pub(crate) fn remove_method(&self, name: &str) {
        self.state.lock().missing_methods.insert(name.to_string());
    }

    pub(crate) fn set_version_status(&self, status: NativeStatus) {
        self.state.lock().version_status = status;
    }

    pub(crate) fn set_query_status(&self, status: NativeStatus) {
        self.state.lock().query_status = status;
    }

    pub(crate) fn set_create_status(&self, status: NativeStatus) {
        self.state.lock().create_status = status;
    }

    pub(crate) fn set_create_without_env(&self, without_env: bool) {
        self.state.lock().create_without_env = without_env;
    }

    pub(crate) fn set_create_panics(&self, panics: bool) {
        self.state.lock().create_panics = panics;
    }

    pub(crate) fn set_create_delay_ms(&self, millis: u64) {
        self.state.lock().create_delay = Duration::from_millis(millis);
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.state.lock().create_calls
    }

    pub(crate) fn attach_calls(&self) -> usize {
        self.state.lock().attach_calls
    }

    pub(crate) fn destroy_calls(&self) -> usize {
        self.state.lock().destroy_calls
    }

    pub(crate) fn exception_clears(&self) -> usize {
        self.state.lock().exception_clears
    }

    pub(crate) fn live_global_refs(&self) -> usize {
        self.state.lock().globals.len()
    }

    pub(crate) fn live_local_refs(&self) -> usize {
        self.state.lock().locals.len()
    }

    pub(crate) fn class_lookups(&self) -> Vec<String> {
        self.state.lock().class_lookups.clone()
    }

    pub(crate) fn static_lookups(&self) -> Vec<String> {
        self.state.lock().static_lookups.clone()
    }

    /// Threads currently attached to `vm`.
    pub(crate) fn attached_threads(&self, vm: VmPtr) -> Vec<ThreadId> {
        self.state
            .lock()
            .attached
            .keys()
            .filter(|(_, v)| *v == vm)
            .map(|(thread, _)| *thread)
            .collect()
    }

    pub(crate) fn last_options(&self) -> Option<OptionVector> {
        self.state.lock().last_options.clone()
    }

    fn lookup_method(&self, name: &str, is_static: bool) -> Option<MethodRef> {
        let mut state = self.state.lock();
        if is_static {
            state.static_lookups.push(name.to_string());
        }
        if state.missing_methods.contains(name) {
            return None;
        }
        Some(state.method())
    }
}

impl EmbeddingInterface for FakeEmbedding {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn check_version(&self) -> Result<()> {
        match self.state.lock().version_status {
            0 => Ok(()),
            status => Err(Error::UnsupportedVersion { status }),
        }
    }

    fn created_vms(&self, max: usize) -> std::result::Result<Vec<VmPtr>, NativeStatus> {
        let state = self.state.lock();
        if state.query_status != 0 {
            return Err(state.query_status);
        }
        Ok(state.resident.iter().take(max).copied().collect())
    }

    fn create_vm(&self, options: &OptionVector) -> Result<CreateOutcome> {
        let (delay, panics) = {
            let state = self.state.lock();
            (state.create_delay, state.create_panics)
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if panics {
            panic!("scripted VM creation panic");
        }

        let mut state = self.state.lock();
        state.create_calls += 1;
        state.last_options = Some(options.clone());

        if state.create_status != 0 {
            return Ok(CreateOutcome {
                status: state.create_status,
                vm: None,
                env: None,
            });
        }

        let vm = state.vm();
        state.resident.push(vm);
        let env = if state.create_without_env {
            None
        } else {
            let env = state.env();
            state
                .attached
                .insert((std::thread::current().id(), vm), env);
            Some(env)
        };

        Ok(CreateOutcome {
            status: 0,
            vm: Some(vm),
            env,
        })
    }

    fn attach_current_thread(&self, vm: VmPtr) -> std::result::Result<EnvPtr, NativeStatus> {
        let mut state = self.state.lock();
        if state.failing_attach.contains(&vm) || !state.resident.contains(&vm) {
            return Err(-1);
        }
        state.attach_calls += 1;

        let key = (std::thread::current().id(), vm);
        if let Some(env) = state.attached.get(&key) {
            return Ok(*env);
        }
        let env = state.env();
        state.attached.insert(key, env);
        Ok(env)
    }

    fn detach_current_thread(&self, vm: VmPtr) -> NativeStatus {
        let key = (std::thread::current().id(), vm);
        self.state.lock().attached.remove(&key);
        0
    }

    fn destroy_vm(&self, vm: VmPtr) -> NativeStatus {
        let mut state = self.state.lock();
        state.destroy_calls += 1;
        state.resident.retain(|v| *v != vm);
        state.attached.retain(|(_, v), _| *v != vm);
        0
    }

    fn find_class(&self, _env: EnvPtr, name: &str) -> Option<ClassRef> {
        let mut state = self.state.lock();
        state.class_lookups.push(name.to_string());
        if state.missing_classes.contains(name) {
            return None;
        }
        let local = state.class();
        state.locals.insert(local);
        Some(local)
    }

    fn new_global_ref(&self, _env: EnvPtr, class: ClassRef) -> Option<ClassRef> {
        let mut state = self.state.lock();
        if !state.locals.contains(&class) {
            return None;
        }
        let global = state.class();
        state.globals.insert(global);
        Some(global)
    }

    fn delete_local_ref(&self, _env: EnvPtr, class: ClassRef) {
        self.state.lock().locals.remove(&class);
    }

    fn delete_global_ref(&self, _env: EnvPtr, class: ClassRef) {
        self.state.lock().globals.remove(&class);
    }

    fn get_method_id(
        &self,
        _env: EnvPtr,
        _class: ClassRef,
        name: &str,
        _sig: &str,
    ) -> Option<MethodRef> {
        self.lookup_method(name, false)
    }

    fn get_static_method_id(
        &self,
        _env: EnvPtr,
        _class: ClassRef,
        name: &str,
        _sig: &str,
    ) -> Option<MethodRef> {
        self.lookup_method(name, true)
    }

    fn exception_clear(&self, _env: EnvPtr) {
        self.state.lock().exception_clears += 1;
    }
}
