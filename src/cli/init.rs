//! Init command implementation.

use clap::Args;
use jembed::config::{EmbedConfig, ThreadingModel};
use jembed::vm::HookMask;
use jembed::InitRequest;

/// Bring up a VM (or attach to a resident one) and report the outcome.
#[derive(Args, Debug)]
pub struct InitCmd {
    /// Classpath for the VM. Defaults to the configured value, then CLASSPATH.
    #[arg(long, value_name = "PATH")]
    pub classpath: Option<String>,

    /// Extra VM option (can be used multiple times).
    #[arg(short = 'o', long = "option", value_name = "OPTION")]
    pub options: Vec<String>,

    /// Create the VM on a dedicated worker thread.
    #[arg(long)]
    pub threaded: bool,

    /// Path to libjvm, overriding configuration and JAVA_HOME.
    #[arg(long, value_name = "PATH")]
    pub libjvm: Option<std::path::PathBuf>,

    /// Do not intercept VM output and exit requests.
    #[arg(long)]
    pub no_hooks: bool,

    /// Destroy the VM before exiting.
    #[arg(long)]
    pub teardown: bool,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

impl InitCmd {
    /// Execute the init command.
    pub fn run(&self, config: &EmbedConfig) -> jembed::Result<()> {
        let mut config = config.clone();
        if let Some(path) = &self.libjvm {
            config.libjvm = Some(path.clone());
        }
        let request = self.request(&config);
        let runtime = jembed::process::runtime_with(config)?;

        let result = runtime.ensure_ready(&request);
        let status = match &result {
            Ok(outcome) => outcome.status_code(),
            Err(e) => e.status_code(),
        };

        if self.json {
            let report = serde_json::json!({
                "status": status,
                "outcome": result.as_ref().ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
                "state": runtime.state(),
                "ready": runtime.is_ready(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?
            );
        } else {
            println!("Status: {}", status);
            println!("State: {}", runtime.state());
            match &result {
                Ok(outcome) => println!("Outcome: {:?}", outcome),
                Err(e) => println!("Error: {}", e),
            }
        }

        if self.teardown {
            runtime.teardown();
        }

        result.map(|_| ())
    }

    fn request(&self, config: &EmbedConfig) -> InitRequest {
        let mut request = InitRequest::from_config(config);
        if let Some(classpath) = &self.classpath {
            request.classpath = Some(classpath.clone());
        }
        request.options.extend(self.options.iter().cloned());
        if self.threaded {
            request.threading = ThreadingModel::Worker;
        }
        if self.no_hooks {
            request.hooks = HookMask::NONE;
        }
        request
    }
}
