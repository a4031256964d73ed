//! Dynamic loading of the VM shared library.

use crate::error::{Error, Result};
use std::ffi::{c_void, CStr, CString};
use std::path::{Path, PathBuf};

/// A loaded shared library.
///
/// The handle is never closed: once a VM has been created its threads keep
/// executing code from the library until the process exits.
pub(crate) struct Library {
    handle: *mut c_void,
    path: PathBuf,
}

// dlopen handles are process-global and dlsym is thread-safe.
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

impl Library {
    /// Load a shared library with `RTLD_NOW | RTLD_GLOBAL`.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let c_path = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|_| Error::library("path contains null byte"))?;

        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL) };

        if handle.is_null() {
            return Err(Error::library(format!(
                "{}: {}",
                path.display(),
                last_dl_error()
            )));
        }

        tracing::debug!(path = %path.display(), "loaded VM library");

        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    /// Resolve a function pointer by name.
    ///
    /// # Safety
    ///
    /// `T` must be a function pointer type matching the symbol's signature.
    pub(crate) unsafe fn get<T: Copy>(&self, symbol: &str) -> Result<T> {
        debug_assert_eq!(std::mem::size_of::<T>(), std::mem::size_of::<*mut c_void>());

        let c_name = CString::new(symbol)
            .map_err(|_| Error::library(format!("invalid symbol name: {}", symbol)))?;

        // Clear any previous error
        libc::dlerror();

        let ptr = libc::dlsym(self.handle, c_name.as_ptr());
        if ptr.is_null() {
            return Err(Error::library(format!(
                "symbol {} not found in {}: {}",
                symbol,
                self.path.display(),
                last_dl_error()
            )));
        }

        Ok(std::mem::transmute_copy(&ptr))
    }

    /// Path the library was loaded from.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

fn last_dl_error() -> String {
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

/// File name of the VM library on this platform.
#[cfg(target_os = "macos")]
pub(crate) const LIBJVM_NAME: &str = "libjvm.dylib";

/// File name of the VM library on this platform.
#[cfg(not(target_os = "macos"))]
pub(crate) const LIBJVM_NAME: &str = "libjvm.so";

/// Candidate library locations under a Java home directory.
///
/// Covers the modular JDK layout (`lib/server`) and the JDK 8 layout with
/// an embedded JRE.
pub(crate) fn libjvm_candidates(java_home: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![
        java_home.join("lib").join("server").join(LIBJVM_NAME),
        java_home.join("jre").join("lib").join("server").join(LIBJVM_NAME),
    ];
    if let Some(arch) = jre_arch_dir() {
        candidates.push(java_home.join("jre").join("lib").join(arch).join("server").join(LIBJVM_NAME));
        candidates.push(java_home.join("lib").join(arch).join("server").join(LIBJVM_NAME));
    }
    candidates
}

#[cfg(target_arch = "x86_64")]
fn jre_arch_dir() -> Option<&'static str> {
    Some("amd64")
}

#[cfg(target_arch = "aarch64")]
fn jre_arch_dir() -> Option<&'static str> {
    Some("aarch64")
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn jre_arch_dir() -> Option<&'static str> {
    None
}
