//! Embedding configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables.

use crate::error::{Error, Result};
use crate::vm::options::HookMask;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name for config file storage.
const APP_NAME: &str = "jembed";

/// Config file name inside the application config directory.
const CONFIG_FILE: &str = "config.toml";

/// Environment variable holding an explicit VM library path.
pub const LIBJVM_ENV: &str = "JEMBED_LIBJVM";

/// Environment variable selecting the worker-thread creation model.
pub const THREADED_ENV: &str = "JEMBED_THREADED";

/// Environment variables that opt into pre-loading the GUI toolkit on the
/// creation thread. Either one being set is enough.
pub const GUI_ENV: [&str; 2] = ["JEMBED_GUI_APP_VERSION", "JEMBED_INIT_AWT"];

/// How the one-time VM creation is scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadingModel {
    /// The calling thread creates the VM and blocks until it is ready.
    #[default]
    Inline,
    /// A dedicated worker thread creates the VM; the caller is released as
    /// soon as the VM exists.
    Worker,
}

/// Embedding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Explicit classpath. When unset, `CLASSPATH` is used at option build
    /// time.
    pub classpath: Option<String>,

    /// Extra VM options, passed in order.
    pub options: Vec<String>,

    /// Native hooks to install.
    pub hooks: HookMask,

    /// VM creation scheduling.
    pub threading: ThreadingModel,

    /// Pre-load `java/awt/Frame` on the worker thread.
    pub preload_gui: bool,

    /// Explicit path to the VM shared library.
    pub libjvm: Option<PathBuf>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            classpath: None,
            options: Vec::new(),
            hooks: HookMask::default(),
            threading: ThreadingModel::Inline,
            preload_gui: false,
            libjvm: None,
        }
    }
}

impl EmbedConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Load the default config file (if any) and apply the environment.
    pub fn load() -> Result<Self> {
        let base = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        Ok(base.with_env(|name| std::env::var(name).ok()))
    }

    /// Load a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| Error::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply environment overrides through `env`.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env(LIBJVM_ENV).filter(|p| !p.is_empty()) {
            self.libjvm = Some(PathBuf::from(path));
        }
        if let Some(value) = env(THREADED_ENV) {
            self.threading = if is_truthy(&value) {
                ThreadingModel::Worker
            } else {
                ThreadingModel::Inline
            };
        }
        if GUI_ENV.iter().any(|name| env(name).is_some()) {
            self.preload_gui = true;
        }
        self
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::configuration(e.to_string()))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EmbedConfig::default();
        assert_eq!(config.classpath, None);
        assert!(config.options.is_empty());
        assert_eq!(config.threading, ThreadingModel::Inline);
        assert!(!config.preload_gui);
        #[cfg(unix)]
        assert_eq!(config.hooks, HookMask::ALL);
    }

    #[test]
    fn test_either_gui_variable_enables_preload() {
        for name in GUI_ENV {
            let config = EmbedConfig::default().with_env(env_of(&[(name, "1")]));
            assert!(config.preload_gui, "{} should enable preload", name);
        }
        let config = EmbedConfig::default().with_env(env_of(&[]));
        assert!(!config.preload_gui);
    }

    #[test]
    fn test_threaded_env() {
        let config = EmbedConfig::default().with_env(env_of(&[(THREADED_ENV, "true")]));
        assert_eq!(config.threading, ThreadingModel::Worker);

        let mut worker = EmbedConfig::default();
        worker.threading = ThreadingModel::Worker;
        let config = worker.with_env(env_of(&[(THREADED_ENV, "0")]));
        assert_eq!(config.threading, ThreadingModel::Inline);
    }

    #[test]
    fn test_libjvm_env_overrides_file() {
        let mut base = EmbedConfig::default();
        base.libjvm = Some(PathBuf::from("/from/file/libjvm.so"));
        let config = base.with_env(env_of(&[(LIBJVM_ENV, "/from/env/libjvm.so")]));
        assert_eq!(config.libjvm, Some(PathBuf::from("/from/env/libjvm.so")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
classpath = "/a:/b"
options = ["-Xmx256m", "-Djava.awt.headless=true"]
hooks = 1
threading = "worker"
"#
        )
        .unwrap();

        let config = EmbedConfig::load_from(file.path()).unwrap();
        assert_eq!(config.classpath.as_deref(), Some("/a:/b"));
        assert_eq!(config.options, vec!["-Xmx256m", "-Djava.awt.headless=true"]);
        assert_eq!(config.hooks, HookMask::OUTPUT);
        assert_eq!(config.threading, ThreadingModel::Worker);
        assert!(!config.preload_gui);
    }

    #[test]
    fn test_load_from_invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threading = 12").unwrap();

        let err = EmbedConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_load_rejects_undefined_hook_bits() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hooks = 255").unwrap();

        match EmbedConfig::load_from(file.path()) {
            Err(Error::ConfigLoad { message, .. }) => {
                assert!(message.contains("invalid hook mask"), "got: {}", message)
            }
            other => panic!("expected config load error, got {:?}", other),
        }
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EmbedConfig::default();
        config.classpath = Some("/cp".into());
        config.options = vec!["-Xss2m".into()];
        let text = config.to_toml().unwrap();
        let parsed: EmbedConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
