//! VM initialization and lifecycle management.
//!
//! This module provides the pieces that bring a VM up exactly once per
//! process and make it usable from any thread:
//! - [`JvmRuntime`]: the coordinator that serializes initialization
//! - [`InitRequest`]: what to create when no VM is resident yet
//! - [`OutputSink`] / [`TerminationPolicy`]: where intercepted VM output and
//!   exit requests go
//! - [`ReflectionHandles`]: the pinned classes and methods published once
//!   the VM is ready

pub mod bootstrap;
pub mod coordinator;
pub mod hooks;
pub mod locator;
pub mod options;
pub mod reflection;
pub mod signal;
pub mod state;
pub mod thread;

pub use coordinator::{EnvLookup, InitRequest, JvmRuntime, RuntimeBuilder};
pub use hooks::{HookTargets, OutputSink, StdioSink, StreamTarget, TerminateProcess, TerminationPolicy};
pub use options::{HookMask, NativeHook, OptionBuilder, OptionVector, VmOption};
pub use reflection::ReflectionHandles;
pub use state::{InitOutcome, InitializationState};
pub use thread::ThreadEnv;
