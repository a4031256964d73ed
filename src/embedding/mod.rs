//! The embedding interface seam.
//!
//! This module provides the boundary between the initialization protocol and
//! the native API that creates, enumerates and attaches to VMs:
//! - [`EmbeddingInterface`]: the native operations the core relies on
//! - [`VmPtr`], [`EnvPtr`], [`ClassRef`], [`MethodRef`]: opaque native handles
//! - [`JniEmbedding`]: the implementation backed by a dynamically loaded libjvm

#[cfg(test)]
pub(crate) mod fake;
#[cfg(unix)]
mod jni;
#[cfg(unix)]
mod library;

#[cfg(unix)]
use crate::config::EmbedConfig;
use crate::error::Result;
use crate::vm::options::OptionVector;
use std::ffi::c_void;
use std::ptr::NonNull;

#[cfg(unix)]
pub use jni::JniEmbedding;

/// Raw status code returned by the native API (`0` means success).
pub type NativeStatus = i32;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonNull<c_void>);

        // Native handles are plain addresses owned by the VM; the VM decides
        // which threads may use them, not the Rust type system.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}

        impl $name {
            /// Wrap a raw pointer, returning `None` for null.
            pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
                NonNull::new(ptr).map(Self)
            }

            /// Get the raw pointer.
            pub fn as_raw(self) -> *mut c_void {
                self.0.as_ptr()
            }
        }
    };
}

native_handle!(
    /// Handle to a VM instance resident in the process.
    VmPtr
);
native_handle!(
    /// Thread-scoped environment handle.
    EnvPtr
);
native_handle!(
    /// Reference to a class object (local or global).
    ClassRef
);
native_handle!(
    /// Method identifier.
    MethodRef
);

/// Result of a VM creation request.
#[derive(Debug, Clone, Copy)]
pub struct CreateOutcome {
    /// Status returned by the creation call.
    pub status: NativeStatus,
    /// The created VM, if any.
    pub vm: Option<VmPtr>,
    /// The creating thread's environment, if any.
    pub env: Option<EnvPtr>,
}

/// Native operations needed to embed a VM.
///
/// Handles passed back into an implementation must have been produced by the
/// same implementation. Methods taking an [`EnvPtr`] must be called on the
/// thread that owns that environment.
pub trait EmbeddingInterface: Send + Sync {
    /// Implementation name (e.g., "jni").
    fn name(&self) -> &'static str;

    /// Check that the interface supports JNI 1.2 startup arguments.
    fn check_version(&self) -> Result<()>;

    /// List up to `max` VMs already created in this process.
    fn created_vms(&self, max: usize) -> std::result::Result<Vec<VmPtr>, NativeStatus>;

    /// Create a VM from the given options.
    ///
    /// Returns `Err` only when the options cannot be handed to the native
    /// API at all; native refusals are reported through [`CreateOutcome`].
    fn create_vm(&self, options: &OptionVector) -> Result<CreateOutcome>;

    /// Attach the calling thread to `vm`. Attaching twice is idempotent.
    fn attach_current_thread(&self, vm: VmPtr) -> std::result::Result<EnvPtr, NativeStatus>;

    /// Detach the calling thread from `vm`.
    fn detach_current_thread(&self, vm: VmPtr) -> NativeStatus;

    /// Destroy `vm`. Irreversible.
    fn destroy_vm(&self, vm: VmPtr) -> NativeStatus;

    /// Resolve a class by binary name (e.g., `java/lang/String`).
    fn find_class(&self, env: EnvPtr, name: &str) -> Option<ClassRef>;

    /// Promote a class reference to a global reference.
    fn new_global_ref(&self, env: EnvPtr, class: ClassRef) -> Option<ClassRef>;

    /// Release a local reference.
    fn delete_local_ref(&self, env: EnvPtr, class: ClassRef);

    /// Release a global reference.
    fn delete_global_ref(&self, env: EnvPtr, class: ClassRef);

    /// Resolve an instance method identifier.
    fn get_method_id(&self, env: EnvPtr, class: ClassRef, name: &str, sig: &str)
        -> Option<MethodRef>;

    /// Resolve a static method identifier.
    fn get_static_method_id(
        &self,
        env: EnvPtr,
        class: ClassRef,
        name: &str,
        sig: &str,
    ) -> Option<MethodRef>;

    /// Clear any pending exception on `env`.
    fn exception_clear(&self, env: EnvPtr);
}

/// Create the default embedding interface for this platform.
#[cfg(unix)]
pub fn create_default(config: &EmbedConfig) -> Result<JniEmbedding> {
    JniEmbedding::load(config.libjvm.as_deref())
}
