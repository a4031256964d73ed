//! Error types for jembed.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using jembed's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Status reported when existing VMs were found but none could be attached.
pub const STATUS_ATTACH_EXHAUSTED: i32 = -2;

/// Status reported for every other initialization failure.
pub const STATUS_FAILED: i32 = -1;

/// Errors that can occur while embedding a VM.
#[derive(Error, Debug)]
pub enum Error {
    // Option errors
    /// Malformed classpath or startup option.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding interface does not support the requested JNI version.
    #[error("JNI 1.2 or higher is required (status {status})")]
    UnsupportedVersion {
        /// Status returned by the version query.
        status: i32,
    },

    // VM lifecycle errors
    /// The embedding interface refused to create a VM.
    #[error("cannot create Java virtual machine ({status})")]
    Creation {
        /// Non-zero status from the creation call.
        status: i32,
    },

    /// Creation reported success but yielded no environment handle.
    #[error("cannot obtain JVM environment")]
    EnvironmentUnavailable,

    /// The thread creating the VM unwound before creation settled.
    #[error("VM creation was aborted before it completed")]
    CreationAborted,

    /// Enumerating resident VMs failed.
    #[error("JNI_GetCreatedJavaVMs returned {status}")]
    Query {
        /// Non-zero status from the query.
        status: i32,
    },

    /// Resident VMs exist but the current thread could not attach to any.
    #[error("failed to attach to any existing JVM ({found} found)")]
    AttachExhausted {
        /// Number of VMs that were tried.
        found: usize,
    },

    // Reflection cache errors
    /// A required class could not be resolved.
    #[error("unable to find the basic {class} class")]
    ClassNotFound {
        /// Binary name of the class.
        class: String,
    },

    /// A required method identifier could not be resolved.
    #[error("cannot obtain {class}.{method} method ID")]
    MethodNotFound {
        /// Simple name of the declaring class.
        class: String,
        /// Method name.
        method: String,
    },

    /// A global reference could not be created for a resolved class.
    #[error("unable to create a global reference to the basic {class} class")]
    GlobalRef {
        /// Binary name of the class.
        class: String,
    },

    // Runtime state errors
    /// A previous initialization attempt failed; the failure is terminal.
    #[error("initialization previously failed with status {status}")]
    Failed {
        /// Status recorded by the failed attempt.
        status: i32,
    },

    /// The VM was destroyed; it cannot be recreated in this process.
    #[error("the VM was torn down and cannot be re-initialized in this process")]
    TornDown,

    /// No VM is bound to the runtime.
    #[error("no VM is available")]
    NoVm,

    // Native library errors
    /// The VM shared library could not be loaded.
    #[error("failed to load VM library: {0}")]
    Library(String),

    /// No VM shared library could be located.
    #[error("VM library not found (searched: {})", searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    LibraryNotFound {
        /// Candidate paths that were checked.
        searched: Vec<PathBuf>,
    },

    // Configuration file errors
    /// Failed to load a configuration file.
    #[error("failed to load config {}: {message}", path.display())]
    ConfigLoad {
        /// Path of the configuration file.
        path: PathBuf,
        /// Parser or IO message.
        message: String,
    },

    // IO errors
    /// IO error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error with a message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a class-not-found error.
    pub fn class_not_found(class: impl Into<String>) -> Self {
        Self::ClassNotFound {
            class: class.into(),
        }
    }

    /// Create a method-not-found error.
    pub fn method_not_found(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Create a library loading error with a message.
    pub fn library(msg: impl Into<String>) -> Self {
        Self::Library(msg.into())
    }

    /// Status code surfaced to the caller of the initialization entry point.
    pub fn status_code(&self) -> i32 {
        match self {
            Error::AttachExhausted { .. } => STATUS_ATTACH_EXHAUSTED,
            _ => STATUS_FAILED,
        }
    }
}
