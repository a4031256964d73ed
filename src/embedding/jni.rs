//! Embedding interface backed by a dynamically loaded libjvm.

use super::library::{libjvm_candidates, Library};
use super::{ClassRef, CreateOutcome, EmbeddingInterface, EnvPtr, MethodRef, NativeStatus, VmPtr};
use crate::config::LIBJVM_ENV;
use crate::error::{Error, Result};
use crate::vm::hooks;
use crate::vm::options::OptionVector;
use jembed_sys::{
    jsize, JNIEnv, JNI_CreateJavaVMFn, JNI_GetCreatedJavaVMsFn, JNI_GetDefaultJavaVMInitArgsFn,
    JavaVM, JavaVMInitArgs, JavaVMOption, JNI_CREATE_JAVA_VM, JNI_GET_CREATED_JAVA_VMS,
    JNI_GET_DEFAULT_JAVA_VM_INIT_ARGS, JNI_OK, JNI_TRUE, JNI_VERSION_1_2,
};
use std::ffi::{c_void, CString};
use std::path::{Path, PathBuf};
use std::ptr;

/// Environment variable naming the Java installation to load from.
pub const JAVA_HOME_ENV: &str = "JAVA_HOME";

/// JNI invocation API resolved from a libjvm shared library.
pub struct JniEmbedding {
    lib: Library,
    default_args: JNI_GetDefaultJavaVMInitArgsFn,
    create: JNI_CreateJavaVMFn,
    created: JNI_GetCreatedJavaVMsFn,
}

impl std::fmt::Debug for JniEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JniEmbedding")
            .field("library", &self.lib.path())
            .finish()
    }
}

impl JniEmbedding {
    /// Load libjvm and resolve the invocation entry points.
    ///
    /// `explicit` wins over `JEMBED_LIBJVM`, which wins over the layouts
    /// searched under `JAVA_HOME`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = resolve_library(explicit, |name| std::env::var(name).ok())?;
        Self::open(&path)
    }

    /// Load libjvm from a known path.
    pub fn open(path: &Path) -> Result<Self> {
        let lib = Library::open(path)?;

        // SAFETY: the function types mirror the exported JNI signatures.
        let (default_args, create, created) = unsafe {
            (
                lib.get::<JNI_GetDefaultJavaVMInitArgsFn>(JNI_GET_DEFAULT_JAVA_VM_INIT_ARGS)?,
                lib.get::<JNI_CreateJavaVMFn>(JNI_CREATE_JAVA_VM)?,
                lib.get::<JNI_GetCreatedJavaVMsFn>(JNI_GET_CREATED_JAVA_VMS)?,
            )
        };

        tracing::info!(path = %path.display(), "VM library ready");

        Ok(Self {
            lib,
            default_args,
            create,
            created,
        })
    }

    /// Path libjvm was loaded from.
    pub fn library_path(&self) -> &Path {
        self.lib.path()
    }
}

/// Pick the libjvm path to load.
fn resolve_library<F>(explicit: Option<&Path>, env: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env(LIBJVM_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let searched = match env(JAVA_HOME_ENV).filter(|p| !p.is_empty()) {
        Some(home) => libjvm_candidates(Path::new(&home)),
        None => Vec::new(),
    };
    match searched.iter().find(|candidate| candidate.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(Error::LibraryNotFound { searched }),
    }
}

/// Option strings kept alive for the duration of a creation call.
struct NativeOptions {
    _strings: Vec<CString>,
    options: Vec<JavaVMOption>,
}

impl NativeOptions {
    fn new(vector: &OptionVector) -> Result<Self> {
        let mut strings = Vec::with_capacity(vector.len());
        let mut options = Vec::with_capacity(vector.len());

        for option in vector {
            let string = CString::new(option.key.as_str()).map_err(|_| {
                Error::configuration(format!("VM option contains a NUL byte: {:?}", option.key))
            })?;
            let extra_info = option
                .hook
                .map(hooks::entry_point)
                .unwrap_or(ptr::null_mut());
            options.push(JavaVMOption {
                optionString: string.as_ptr() as *mut _,
                extraInfo: extra_info,
            });
            strings.push(string);
        }

        Ok(Self {
            _strings: strings,
            options,
        })
    }
}

fn vm_table(vm: VmPtr) -> *mut JavaVM {
    vm.as_raw() as *mut JavaVM
}

fn env_table(env: EnvPtr) -> *mut JNIEnv {
    env.as_raw() as *mut JNIEnv
}

impl EmbeddingInterface for JniEmbedding {
    fn name(&self) -> &'static str {
        "jni"
    }

    fn check_version(&self) -> Result<()> {
        let mut args = JavaVMInitArgs {
            version: JNI_VERSION_1_2,
            nOptions: 0,
            options: ptr::null_mut(),
            ignoreUnrecognized: JNI_TRUE,
        };
        let status = unsafe { (self.default_args)(&mut args as *mut JavaVMInitArgs as *mut c_void) };
        if status != JNI_OK {
            return Err(Error::UnsupportedVersion { status });
        }
        Ok(())
    }

    fn created_vms(&self, max: usize) -> std::result::Result<Vec<VmPtr>, NativeStatus> {
        let mut buf: Vec<*mut JavaVM> = vec![ptr::null_mut(); max];
        let mut count: jsize = 0;
        let status = unsafe { (self.created)(buf.as_mut_ptr(), max as jsize, &mut count) };
        if status != JNI_OK {
            return Err(status);
        }

        let count = (count.max(0) as usize).min(max);
        Ok(buf[..count]
            .iter()
            .filter_map(|vm| VmPtr::from_raw(*vm as *mut c_void))
            .collect())
    }

    fn create_vm(&self, options: &OptionVector) -> Result<CreateOutcome> {
        let mut native = NativeOptions::new(options)?;
        let mut args = JavaVMInitArgs {
            version: JNI_VERSION_1_2,
            nOptions: native.options.len() as i32,
            options: native.options.as_mut_ptr(),
            ignoreUnrecognized: JNI_TRUE,
        };

        let mut vm: *mut JavaVM = ptr::null_mut();
        let mut env: *mut c_void = ptr::null_mut();
        let status = unsafe {
            (self.create)(
                &mut vm,
                &mut env,
                &mut args as *mut JavaVMInitArgs as *mut c_void,
            )
        };

        if status != JNI_OK {
            return Ok(CreateOutcome {
                status,
                vm: None,
                env: None,
            });
        }
        Ok(CreateOutcome {
            status,
            vm: VmPtr::from_raw(vm as *mut c_void),
            env: EnvPtr::from_raw(env),
        })
    }

    fn attach_current_thread(&self, vm: VmPtr) -> std::result::Result<EnvPtr, NativeStatus> {
        let raw = vm_table(vm);
        let mut env: *mut c_void = ptr::null_mut();
        let status = unsafe { ((**raw).AttachCurrentThread)(raw, &mut env, ptr::null_mut()) };
        if status != JNI_OK {
            return Err(status);
        }
        EnvPtr::from_raw(env).ok_or(status)
    }

    fn detach_current_thread(&self, vm: VmPtr) -> NativeStatus {
        let raw = vm_table(vm);
        unsafe { ((**raw).DetachCurrentThread)(raw) }
    }

    fn destroy_vm(&self, vm: VmPtr) -> NativeStatus {
        let raw = vm_table(vm);
        unsafe { ((**raw).DestroyJavaVM)(raw) }
    }

    fn find_class(&self, env: EnvPtr, name: &str) -> Option<ClassRef> {
        let name = CString::new(name).ok()?;
        let raw = env_table(env);
        let class = unsafe { ((**raw).FindClass)(raw, name.as_ptr()) };
        if class.is_null() {
            // A failed lookup leaves NoClassDefFoundError pending.
            unsafe {
                if ((**raw).ExceptionCheck)(raw) == JNI_TRUE {
                    ((**raw).ExceptionClear)(raw);
                }
            }
        }
        ClassRef::from_raw(class)
    }

    fn new_global_ref(&self, env: EnvPtr, class: ClassRef) -> Option<ClassRef> {
        let raw = env_table(env);
        ClassRef::from_raw(unsafe { ((**raw).NewGlobalRef)(raw, class.as_raw()) })
    }

    fn delete_local_ref(&self, env: EnvPtr, class: ClassRef) {
        let raw = env_table(env);
        unsafe { ((**raw).DeleteLocalRef)(raw, class.as_raw()) }
    }

    fn delete_global_ref(&self, env: EnvPtr, class: ClassRef) {
        let raw = env_table(env);
        unsafe { ((**raw).DeleteGlobalRef)(raw, class.as_raw()) }
    }

    fn get_method_id(
        &self,
        env: EnvPtr,
        class: ClassRef,
        name: &str,
        sig: &str,
    ) -> Option<MethodRef> {
        let name = CString::new(name).ok()?;
        let sig = CString::new(sig).ok()?;
        let raw = env_table(env);
        let id = unsafe { ((**raw).GetMethodID)(raw, class.as_raw(), name.as_ptr(), sig.as_ptr()) };
        MethodRef::from_raw(id)
    }

    fn get_static_method_id(
        &self,
        env: EnvPtr,
        class: ClassRef,
        name: &str,
        sig: &str,
    ) -> Option<MethodRef> {
        let name = CString::new(name).ok()?;
        let sig = CString::new(sig).ok()?;
        let raw = env_table(env);
        let id = unsafe {
            ((**raw).GetStaticMethodID)(raw, class.as_raw(), name.as_ptr(), sig.as_ptr())
        };
        MethodRef::from_raw(id)
    }

    fn exception_clear(&self, env: EnvPtr) {
        let raw = env_table(env);
        unsafe { ((**raw).ExceptionClear)(raw) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::options::{HookMask, OptionBuilder};
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_library(
            Some(Path::new("/explicit/libjvm.so")),
            env_of(&[(LIBJVM_ENV, "/env/libjvm.so")]),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/explicit/libjvm.so"));
    }

    #[test]
    fn test_env_path_wins_over_java_home() {
        let path = resolve_library(
            None,
            env_of(&[(LIBJVM_ENV, "/env/libjvm.so"), (JAVA_HOME_ENV, "/opt/jdk")]),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/env/libjvm.so"));
    }

    #[test]
    fn test_java_home_layout_is_searched() {
        let home = tempfile::tempdir().unwrap();
        let server = home.path().join("lib").join("server");
        std::fs::create_dir_all(&server).unwrap();
        let lib = server.join(crate::embedding::library::LIBJVM_NAME);
        std::fs::write(&lib, b"").unwrap();

        let home_str = home.path().to_string_lossy().into_owned();
        let path = resolve_library(None, env_of(&[(JAVA_HOME_ENV, home_str.as_str())])).unwrap();
        assert_eq!(path, lib);
    }

    #[test]
    fn test_nothing_found_lists_searched_paths() {
        let home = tempfile::tempdir().unwrap();
        let home_str = home.path().to_string_lossy().into_owned();
        match resolve_library(None, env_of(&[(JAVA_HOME_ENV, home_str.as_str())])) {
            Err(Error::LibraryNotFound { searched }) => assert!(!searched.is_empty()),
            other => panic!("expected library not found, got {:?}", other),
        }

        match resolve_library(None, env_of(&[])) {
            Err(Error::LibraryNotFound { searched }) => assert!(searched.is_empty()),
            other => panic!("expected library not found, got {:?}", other),
        }
    }

    #[test]
    fn test_native_options_carry_hook_payloads() {
        let vector = OptionBuilder::new()
            .classpath(Some("/cp"))
            .hooks(HookMask::ALL)
            .build();
        let native = NativeOptions::new(&vector).unwrap();

        assert_eq!(native.options.len(), 3);
        assert!(native.options[0].extraInfo.is_null());
        assert_eq!(
            native.options[1].extraInfo,
            hooks::entry_point(crate::vm::options::NativeHook::Output)
        );
        assert_eq!(
            native.options[2].extraInfo,
            hooks::entry_point(crate::vm::options::NativeHook::Exit)
        );
    }

    #[test]
    fn test_nul_in_option_is_a_configuration_error() {
        let vector = OptionBuilder::new()
            .classpath(Some("/cp"))
            .options(["-Dbad=\0"])
            .hooks(HookMask::NONE)
            .build();
        assert!(matches!(
            NativeOptions::new(&vector),
            Err(Error::Configuration(_))
        ));
    }
}
