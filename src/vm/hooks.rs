//! Host interception of VM output and termination.
//!
//! The VM accepts two startup options whose payload replaces a native C
//! function: `vfprintf` (all formatted output) and `exit` (process
//! termination). This module defines the host-side capabilities those
//! callbacks are routed to:
//!
//! - [`OutputSink`]: receives VM output, split by standard stream
//! - [`TerminationPolicy`]: decides what happens when the VM asks to exit
//!
//! The native trampolines carry no user data, so the targets live in one
//! process-wide slot that is filled in before the VM is created.

use parking_lot::RwLock;
use std::io::Write;
use std::os::raw::c_int;
use std::sync::Arc;

/// Receiver for formatted VM output.
pub trait OutputSink: Send + Sync {
    /// Output the VM wrote to standard output.
    fn write_out(&self, text: &str);

    /// Output the VM wrote to standard error.
    fn write_err(&self, text: &str);
}

/// Writes through the host's own standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn write_out(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn write_err(&self, text: &str) {
        let _ = std::io::stderr().lock().write_all(text.as_bytes());
    }
}

/// Decides how a VM termination request is handled.
///
/// The VM cannot continue after requesting termination: if `on_exit_request`
/// returns, the process exits with the requested code anyway.
pub trait TerminationPolicy: Send + Sync {
    /// Called with the code passed to `System.exit`.
    fn on_exit_request(&self, code: i32);
}

/// Ends the host process with the requested code.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminateProcess;

impl TerminationPolicy for TerminateProcess {
    fn on_exit_request(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Standard stream a VM write was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTarget {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
    /// Any other stream; not intercepted.
    Other,
}

impl StreamTarget {
    /// Classify a stream by file descriptor.
    pub fn from_fd(fd: c_int) -> Self {
        match fd {
            1 => StreamTarget::Stdout,
            2 => StreamTarget::Stderr,
            _ => StreamTarget::Other,
        }
    }
}

/// Host capabilities the native hooks forward to.
#[derive(Clone)]
pub struct HookTargets {
    /// Destination for VM output.
    pub output: Arc<dyn OutputSink>,
    /// Handler for VM termination requests.
    pub termination: Arc<dyn TerminationPolicy>,
}

impl Default for HookTargets {
    fn default() -> Self {
        Self {
            output: Arc::new(StdioSink),
            termination: Arc::new(TerminateProcess),
        }
    }
}

impl std::fmt::Debug for HookTargets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTargets").finish_non_exhaustive()
    }
}

impl HookTargets {
    /// Route text to the channel matching `target`.
    ///
    /// Returns `false` for [`StreamTarget::Other`], which the caller must
    /// write to the original stream itself.
    pub fn route(&self, target: StreamTarget, text: &str) -> bool {
        match target {
            StreamTarget::Stdout => self.output.write_out(text),
            StreamTarget::Stderr => self.output.write_err(text),
            StreamTarget::Other => return false,
        }
        true
    }

    /// Report a termination request and hand it to the policy.
    pub fn request_exit(&self, code: i32) {
        tracing::error!(code, "VM requested System.exit");
        self.output.write_err(&format!(
            "\nJava requested System.exit({}), closing host.\n",
            code
        ));
        self.termination.on_exit_request(code);
    }
}

static INSTALLED: RwLock<Option<HookTargets>> = parking_lot::const_rwlock(None);

/// Install the process-wide hook targets.
pub fn install(targets: HookTargets) {
    *INSTALLED.write() = Some(targets);
}

/// Currently installed targets, or the defaults.
pub fn installed() -> HookTargets {
    INSTALLED.read().clone().unwrap_or_default()
}

#[cfg(unix)]
pub(crate) use native::entry_point;

#[cfg(unix)]
mod native {
    use super::{installed, StreamTarget};
    use crate::vm::options::NativeHook;
    use jembed_sys::{jint, va_list, ExitHook, VfprintfHook};
    use std::ffi::c_void;
    use std::os::raw::{c_char, c_int};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    /// Formatted messages longer than this are truncated.
    const FORMAT_BUFFER: usize = 8192;

    extern "C" {
        fn vsnprintf(buf: *mut c_char, size: libc::size_t, format: *const c_char, args: va_list)
            -> c_int;
        fn vfprintf(stream: *mut libc::FILE, format: *const c_char, args: va_list) -> c_int;
    }

    /// Function pointer passed as the option payload for `hook`.
    pub(crate) fn entry_point(hook: NativeHook) -> *mut c_void {
        match hook {
            NativeHook::Output => vfprintf_trampoline as VfprintfHook as *mut c_void,
            NativeHook::Exit => exit_trampoline as ExitHook as *mut c_void,
        }
    }

    unsafe extern "C" fn vfprintf_trampoline(
        stream: *mut c_void,
        format: *const c_char,
        args: va_list,
    ) -> c_int {
        let stream = stream as *mut libc::FILE;
        let target = StreamTarget::from_fd(libc::fileno(stream));
        if target == StreamTarget::Other {
            return vfprintf(stream, format, args);
        }

        // A va_list can only be walked once, so format into a fixed buffer.
        let mut buf = vec![0u8; FORMAT_BUFFER];
        let written = vsnprintf(buf.as_mut_ptr() as *mut c_char, buf.len(), format, args);
        if written < 0 {
            return written;
        }
        let len = (written as usize).min(FORMAT_BUFFER - 1);
        let text = String::from_utf8_lossy(&buf[..len]);

        let _ = catch_unwind(AssertUnwindSafe(|| installed().route(target, &text)));
        len as c_int
    }

    unsafe extern "C" fn exit_trampoline(status: jint) {
        let _ = catch_unwind(AssertUnwindSafe(|| installed().request_exit(status)));
        // TODO: hand control back to the host's event loop instead of exiting
        // once the host exposes a re-entry point.
        std::process::exit(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        out: Mutex<Vec<String>>,
        err: Mutex<Vec<String>>,
    }

    impl OutputSink for RecordingSink {
        fn write_out(&self, text: &str) {
            self.out.lock().push(text.to_string());
        }

        fn write_err(&self, text: &str) {
            self.err.lock().push(text.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingPolicy {
        codes: Mutex<Vec<i32>>,
    }

    impl TerminationPolicy for RecordingPolicy {
        fn on_exit_request(&self, code: i32) {
            self.codes.lock().push(code);
        }
    }

    fn targets() -> (Arc<RecordingSink>, Arc<RecordingPolicy>, HookTargets) {
        let sink = Arc::new(RecordingSink::default());
        let policy = Arc::new(RecordingPolicy::default());
        let targets = HookTargets {
            output: sink.clone(),
            termination: policy.clone(),
        };
        (sink, policy, targets)
    }

    #[test]
    fn test_stream_classification() {
        assert_eq!(StreamTarget::from_fd(1), StreamTarget::Stdout);
        assert_eq!(StreamTarget::from_fd(2), StreamTarget::Stderr);
        assert_eq!(StreamTarget::from_fd(7), StreamTarget::Other);
        assert_eq!(StreamTarget::from_fd(-1), StreamTarget::Other);
    }

    #[test]
    fn test_stderr_output_goes_to_error_channel_verbatim() {
        let (sink, _, targets) = targets();
        let msg = "Exception in thread \"main\" java.lang.Error: boom\n";

        assert!(targets.route(StreamTarget::from_fd(2), msg));

        assert_eq!(*sink.err.lock(), vec![msg.to_string()]);
        assert!(sink.out.lock().is_empty());
    }

    #[test]
    fn test_stdout_output_goes_to_output_channel() {
        let (sink, _, targets) = targets();
        assert!(targets.route(StreamTarget::Stdout, "hello"));
        assert_eq!(*sink.out.lock(), vec!["hello".to_string()]);
        assert!(sink.err.lock().is_empty());
    }

    #[test]
    fn test_other_streams_are_not_intercepted() {
        let (sink, _, targets) = targets();
        assert!(!targets.route(StreamTarget::Other, "to a file"));
        assert!(sink.out.lock().is_empty());
        assert!(sink.err.lock().is_empty());
    }

    #[test]
    fn test_exit_request_is_reported_then_handed_to_policy() {
        let (sink, policy, targets) = targets();
        targets.request_exit(3);

        assert_eq!(*policy.codes.lock(), vec![3]);
        let err = sink.err.lock();
        assert_eq!(err.len(), 1);
        assert!(err[0].contains("System.exit(3)"));
    }

    #[cfg(unix)]
    #[test]
    fn test_entry_points_are_distinct() {
        use crate::vm::options::NativeHook;
        let out = entry_point(NativeHook::Output);
        let exit = entry_point(NativeHook::Exit);
        assert!(!out.is_null());
        assert!(!exit.is_null());
        assert_ne!(out, exit);
    }
}
