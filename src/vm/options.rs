//! VM startup option assembly.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Environment variable used when no explicit classpath is given.
pub const CLASSPATH_ENV: &str = "CLASSPATH";

/// Prefix of the classpath system property option.
pub const CLASSPATH_PREFIX: &str = "-Djava.class.path=";

/// Number of option slots reserved for hook registrations.
const HOOK_SLOTS: usize = 2;

/// Set of native hooks to install at VM creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HookMask(u8);

impl HookMask {
    /// No hooks.
    pub const NONE: HookMask = HookMask(0);
    /// Redirect formatted VM output into the host's channels.
    pub const OUTPUT: HookMask = HookMask(1);
    /// Route VM termination requests through the host's policy.
    pub const EXIT: HookMask = HookMask(2);
    /// Every hook.
    pub const ALL: HookMask = HookMask(1 | 2);

    /// Check whether every hook in `other` is set.
    pub fn contains(self, other: HookMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bit value.
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for HookMask {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        if bits & !HookMask::ALL.0 != 0 {
            return Err(format!(
                "invalid hook mask {}: only bits {} are defined",
                bits,
                HookMask::ALL.0
            ));
        }
        Ok(HookMask(bits))
    }
}

impl From<HookMask> for u8 {
    fn from(mask: HookMask) -> u8 {
        mask.0
    }
}

impl BitOr for HookMask {
    type Output = HookMask;

    fn bitor(self, rhs: HookMask) -> HookMask {
        HookMask(self.0 | rhs.0)
    }
}

impl Default for HookMask {
    /// Both hooks on unix. Elsewhere the VM's stream handles cannot be told
    /// apart, so no hooks are installed.
    fn default() -> Self {
        if cfg!(unix) {
            HookMask::ALL
        } else {
            HookMask::NONE
        }
    }
}

/// A native function replaced through a startup option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeHook {
    /// `vfprintf`: formatted output.
    Output,
    /// `exit`: process termination.
    Exit,
}

impl NativeHook {
    /// Option key naming the intercepted native function.
    pub fn option_key(self) -> &'static str {
        match self {
            NativeHook::Output => "vfprintf",
            NativeHook::Exit => "exit",
        }
    }
}

/// One startup option record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmOption {
    /// Option string.
    pub key: String,
    /// Callback replacing a native function, for hook options.
    pub hook: Option<NativeHook>,
}

impl VmOption {
    fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            hook: None,
        }
    }

    fn hook(hook: NativeHook) -> Self {
        Self {
            key: hook.option_key().to_string(),
            hook: Some(hook),
        }
    }
}

/// Ordered startup options for a single creation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionVector {
    options: Vec<VmOption>,
}

impl OptionVector {
    /// Number of options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether there are no options.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Iterate over the options in order.
    pub fn iter(&self) -> std::slice::Iter<'_, VmOption> {
        self.options.iter()
    }

    /// The classpath value carried by the first option.
    pub fn classpath(&self) -> Option<&str> {
        self.options
            .first()
            .and_then(|o| o.key.strip_prefix(CLASSPATH_PREFIX))
    }

    /// Hooks registered by this vector.
    pub fn hooks(&self) -> impl Iterator<Item = NativeHook> + '_ {
        self.options.iter().filter_map(|o| o.hook)
    }
}

impl<'a> IntoIterator for &'a OptionVector {
    type Item = &'a VmOption;
    type IntoIter = std::slice::Iter<'a, VmOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.options.iter()
    }
}

/// Builder for [`OptionVector`].
///
/// Option order is always: classpath, extra options in caller order, then
/// the output hook and the exit hook if requested.
#[derive(Debug, Clone, Default)]
pub struct OptionBuilder {
    classpath: Option<String>,
    extra: Vec<String>,
    hooks: HookMask,
}

impl OptionBuilder {
    /// Create a builder with no classpath, no extra options and the
    /// platform's default hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit classpath, overriding the environment.
    pub fn classpath(mut self, classpath: Option<impl Into<String>>) -> Self {
        self.classpath = classpath.map(Into::into);
        self
    }

    /// Append extra option strings.
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra.extend(options.into_iter().map(Into::into));
        self
    }

    /// Select the hooks to install.
    pub fn hooks(mut self, hooks: HookMask) -> Self {
        self.hooks = hooks;
        self
    }

    /// Build the option vector, falling back to `CLASSPATH` from the process
    /// environment.
    pub fn build(self) -> OptionVector {
        self.build_with_env(|name| std::env::var(name).ok())
    }

    /// Build the option vector with a custom environment lookup.
    pub fn build_with_env<F>(self, env: F) -> OptionVector
    where
        F: Fn(&str) -> Option<String>,
    {
        let classpath = resolve_classpath(self.classpath, || env(CLASSPATH_ENV));

        let mut options = Vec::with_capacity(1 + self.extra.len() + HOOK_SLOTS);
        options.push(VmOption::plain(format!("{}{}", CLASSPATH_PREFIX, classpath)));
        options.extend(self.extra.into_iter().map(VmOption::plain));

        if self.hooks.contains(HookMask::OUTPUT) {
            options.push(VmOption::hook(NativeHook::Output));
        }
        if self.hooks.contains(HookMask::EXIT) {
            options.push(VmOption::hook(NativeHook::Exit));
        }

        tracing::debug!(
            classpath = %classpath,
            count = options.len(),
            hooks = self.hooks.bits(),
            "built VM options"
        );

        OptionVector { options }
    }
}

/// Resolve the effective classpath: explicit value, else the environment,
/// else the empty string.
pub fn resolve_classpath<F>(explicit: Option<String>, env: F) -> String
where
    F: FnOnce() -> Option<String>,
{
    explicit.or_else(env).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(classpath: Option<&str>) -> impl Fn(&str) -> Option<String> + '_ {
        move |name| {
            if name == CLASSPATH_ENV {
                classpath.map(str::to_string)
            } else {
                None
            }
        }
    }

    #[test]
    fn test_classpath_from_environment() {
        let opts = OptionBuilder::new()
            .hooks(HookMask::NONE)
            .build_with_env(env_with(Some("/opt/libs")));
        assert_eq!(opts.iter().next().unwrap().key, "-Djava.class.path=/opt/libs");
        assert_eq!(opts.classpath(), Some("/opt/libs"));
    }

    #[test]
    fn test_explicit_classpath_overrides_environment() {
        let opts = OptionBuilder::new()
            .classpath(Some("/a:/b"))
            .build_with_env(env_with(Some("/x")));
        assert_eq!(opts.classpath(), Some("/a:/b"));
    }

    #[test]
    fn test_missing_classpath_is_empty_not_absent() {
        let opts = OptionBuilder::new()
            .hooks(HookMask::NONE)
            .build_with_env(env_with(None));
        assert_eq!(opts.len(), 1);
        assert_eq!(opts.iter().next().unwrap().key, "-Djava.class.path=");
    }

    #[test]
    fn test_option_order_and_hooks() {
        let opts = OptionBuilder::new()
            .classpath(Some("/cp"))
            .options(["-Xmx512m", "-Dfoo=bar"])
            .hooks(HookMask::ALL)
            .build_with_env(env_with(None));

        let keys: Vec<_> = opts.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            ["-Djava.class.path=/cp", "-Xmx512m", "-Dfoo=bar", "vfprintf", "exit"]
        );
        let hooks: Vec<_> = opts.hooks().collect();
        assert_eq!(hooks, [NativeHook::Output, NativeHook::Exit]);
    }

    #[test]
    fn test_single_hook() {
        let opts = OptionBuilder::new()
            .hooks(HookMask::EXIT)
            .build_with_env(env_with(None));
        let hooks: Vec<_> = opts.hooks().collect();
        assert_eq!(hooks, [NativeHook::Exit]);
        assert!(opts.iter().all(|o| o.key != "vfprintf"));
    }

    #[test]
    fn test_hook_mask_bits() {
        assert!(HookMask::ALL.contains(HookMask::OUTPUT));
        assert!(HookMask::ALL.contains(HookMask::EXIT));
        assert!(!HookMask::OUTPUT.contains(HookMask::EXIT));
        assert_eq!(HookMask::OUTPUT | HookMask::EXIT, HookMask::ALL);
        assert!(HookMask::NONE.contains(HookMask::NONE));
    }

    #[test]
    fn test_hook_mask_rejects_undefined_bits() {
        assert_eq!(HookMask::try_from(3), Ok(HookMask::ALL));
        assert_eq!(HookMask::try_from(0), Ok(HookMask::NONE));
        assert!(HookMask::try_from(4).is_err());
        assert!(HookMask::try_from(255).is_err());

        let err = serde_json::from_str::<HookMask>("255").unwrap_err();
        assert!(err.to_string().contains("invalid hook mask 255"), "got: {}", err);
        assert_eq!(serde_json::from_str::<HookMask>("1").unwrap(), HookMask::OUTPUT);
        assert_eq!(serde_json::to_string(&HookMask::EXIT).unwrap(), "2");
    }
}
