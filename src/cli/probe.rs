//! Probe command implementation.
//!
//! Loads the VM library and checks it without creating a VM.

use clap::Args;
use jembed::config::EmbedConfig;

/// Check that a usable VM library can be found and loaded.
#[derive(Args, Debug)]
pub struct ProbeCmd {
    /// Path to libjvm, overriding configuration and JAVA_HOME.
    #[arg(long, value_name = "PATH")]
    pub libjvm: Option<std::path::PathBuf>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ProbeCmd {
    /// Execute the probe command.
    #[cfg(unix)]
    pub fn run(&self, config: &EmbedConfig) -> jembed::Result<()> {
        use jembed::embedding::{EmbeddingInterface, JniEmbedding};
        use jembed::vm::locator;

        let explicit = self.libjvm.as_deref().or(config.libjvm.as_deref());
        let iface = JniEmbedding::load(explicit)?;
        let version = iface.check_version();
        let resident = locator::locate(&iface).map(|vms| vms.len());

        if self.json {
            let report = serde_json::json!({
                "library": iface.library_path(),
                "version_ok": version.is_ok(),
                "resident_vms": resident.as_ref().ok(),
                "error": version
                    .as_ref()
                    .err()
                    .or(resident.as_ref().err())
                    .map(|e| e.to_string()),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?
            );
        } else {
            println!("Library: {}", iface.library_path().display());
            match &version {
                Ok(()) => println!("JNI 1.2: supported"),
                Err(e) => println!("JNI 1.2: {}", e),
            }
            match &resident {
                Ok(count) => println!("Resident VMs: {}", count),
                Err(e) => println!("Resident VMs: {}", e),
            }
        }

        version?;
        resident.map(|_| ())
    }

    /// Execute the probe command.
    #[cfg(not(unix))]
    pub fn run(&self, _config: &EmbedConfig) -> jembed::Result<()> {
        Err(jembed::Error::library(
            "VM embedding is not supported on this platform",
        ))
    }
}
