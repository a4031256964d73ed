//! Raw JNI invocation interface types.
//!
//! Only the slots of the function tables that jembed calls are typed; the
//! remaining entries are kept as opaque padding so the offsets line up with
//! `jni.h`. The tables are only ever read through pointers handed out by the
//! VM, never constructed on the Rust side.
//!
//! Slot numbers follow the JNI specification's function table indices.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::os::raw::{c_char, c_int, c_void};

// --- Primitive types ---
pub type jint = i32;
pub type jsize = jint;
pub type jboolean = u8;

pub type jobject = *mut c_void;
pub type jclass = jobject;
pub type jmethodID = *mut c_void;

// --- Constants ---
pub const JNI_OK: jint = 0;
pub const JNI_ERR: jint = -1;
pub const JNI_EDETACHED: jint = -2;
pub const JNI_EVERSION: jint = -3;

pub const JNI_FALSE: jboolean = 0;
pub const JNI_TRUE: jboolean = 1;

pub const JNI_VERSION_1_2: jint = 0x0001_0002;

/// Thread environment: a pointer to the native function table.
pub type JNIEnv = *const JNINativeInterface_;

/// VM handle: a pointer to the invocation function table.
pub type JavaVM = *const JNIInvokeInterface_;

/// Native function table (`struct JNINativeInterface_`), typed up to slot 228.
#[repr(C)]
pub struct JNINativeInterface_ {
    pub reserved0: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: *mut c_void,
    pub reserved3: *mut c_void,
    // 4
    pub GetVersion: unsafe extern "system" fn(env: *mut JNIEnv) -> jint,
    pub DefineClass: *mut c_void,
    // 6
    pub FindClass: unsafe extern "system" fn(env: *mut JNIEnv, name: *const c_char) -> jclass,
    _slots_7_16: [*mut c_void; 10],
    // 17
    pub ExceptionClear: unsafe extern "system" fn(env: *mut JNIEnv),
    _slots_18_20: [*mut c_void; 3],
    // 21
    pub NewGlobalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject) -> jobject,
    pub DeleteGlobalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject),
    pub DeleteLocalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject),
    _slots_24_32: [*mut c_void; 9],
    // 33
    pub GetMethodID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jmethodID,
    _slots_34_112: [*mut c_void; 79],
    // 113
    pub GetStaticMethodID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jmethodID,
    _slots_114_227: [*mut c_void; 114],
    // 228
    pub ExceptionCheck: unsafe extern "system" fn(env: *mut JNIEnv) -> jboolean,
}

/// Invocation function table (`struct JNIInvokeInterface_`).
#[repr(C)]
pub struct JNIInvokeInterface_ {
    pub reserved0: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: *mut c_void,
    pub DestroyJavaVM: unsafe extern "system" fn(vm: *mut JavaVM) -> jint,
    pub AttachCurrentThread: unsafe extern "system" fn(
        vm: *mut JavaVM,
        penv: *mut *mut c_void,
        args: *mut c_void,
    ) -> jint,
    pub DetachCurrentThread: unsafe extern "system" fn(vm: *mut JavaVM) -> jint,
    pub GetEnv:
        unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, version: jint) -> jint,
    pub AttachCurrentThreadAsDaemon: unsafe extern "system" fn(
        vm: *mut JavaVM,
        penv: *mut *mut c_void,
        args: *mut c_void,
    ) -> jint,
}

/// One VM startup option.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct JavaVMOption {
    pub optionString: *mut c_char,
    pub extraInfo: *mut c_void,
}

/// VM startup arguments.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct JavaVMInitArgs {
    pub version: jint,
    pub nOptions: jint,
    pub options: *mut JavaVMOption,
    pub ignoreUnrecognized: jboolean,
}

// --- Exported library entry points (resolved with dlsym) ---
pub type JNI_GetDefaultJavaVMInitArgsFn = unsafe extern "system" fn(args: *mut c_void) -> jint;
pub type JNI_CreateJavaVMFn = unsafe extern "system" fn(
    pvm: *mut *mut JavaVM,
    penv: *mut *mut c_void,
    args: *mut c_void,
) -> jint;
pub type JNI_GetCreatedJavaVMsFn =
    unsafe extern "system" fn(vm_buf: *mut *mut JavaVM, buf_len: jsize, n_vms: *mut jsize) -> jint;

pub const JNI_GET_DEFAULT_JAVA_VM_INIT_ARGS: &str = "JNI_GetDefaultJavaVMInitArgs";
pub const JNI_CREATE_JAVA_VM: &str = "JNI_CreateJavaVM";
pub const JNI_GET_CREATED_JAVA_VMS: &str = "JNI_GetCreatedJavaVMs";

// --- Option hooks ---

/// Opaque `va_list` as received by a C callback.
///
/// Every supported unix ABI hands a `va_list` parameter over as a single
/// pointer (array decay on x86_64 SysV, by-reference aggregate on AArch64).
pub type va_list = *mut c_void;

/// Signature of the `"vfprintf"` option hook.
pub type VfprintfHook =
    unsafe extern "C" fn(stream: *mut c_void, format: *const c_char, args: va_list) -> c_int;

/// Signature of the `"exit"` option hook.
pub type ExitHook = unsafe extern "C" fn(status: jint);
