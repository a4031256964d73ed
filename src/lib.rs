//! jembed - process-wide embedding of a Java virtual machine.
//!
//! The crate brings a VM up at most once per process, attaches any calling
//! thread to it, and caches the reflection handles the rest of a bridge needs.
//! Native output and termination requests from the VM are routed back to the
//! host through replaceable hooks.
//!
//! Most hosts only need [`process::init_jvm`] and [`process::done_jvm`].
//! Embedders that manage their own lifecycle build a [`vm::JvmRuntime`] over
//! an [`embedding::EmbeddingInterface`] directly.

pub mod config;
pub mod embedding;
pub mod error;
pub mod process;
pub mod vm;

pub use config::{EmbedConfig, ThreadingModel};
pub use error::{Error, Result};
pub use vm::{InitOutcome, InitRequest, InitializationState, JvmRuntime};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
