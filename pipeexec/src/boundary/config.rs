//! Configuration for the fault boundary.

use super::capture::HookMode;
use serde::{Deserialize, Serialize};

/// Controls what the fault boundary records about contained panics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Capture the panic-site backtrace even when `RUST_BACKTRACE` is unset.
    #[serde(default = "default_capture_backtrace")]
    pub capture_backtrace: bool,
    /// Emit an error event for every converted panic.
    #[serde(default = "default_log_panics")]
    pub log_panics: bool,
    /// Also run the previously installed panic hook (which usually prints
    /// to stderr) for panics the boundary contains.
    #[serde(default)]
    pub forward_to_previous_hook: bool,
}

fn default_capture_backtrace() -> bool {
    true
}

fn default_log_panics() -> bool {
    true
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            capture_backtrace: default_capture_backtrace(),
            log_panics: default_log_panics(),
            forward_to_previous_hook: false,
        }
    }
}

impl BoundaryConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether backtraces are force-captured.
    #[must_use]
    pub fn with_capture_backtrace(mut self, capture: bool) -> Self {
        self.capture_backtrace = capture;
        self
    }

    /// Sets whether converted panics are logged.
    #[must_use]
    pub fn with_log_panics(mut self, log: bool) -> Self {
        self.log_panics = log;
        self
    }

    /// Sets whether contained panics also reach the previous panic hook.
    #[must_use]
    pub fn with_forward_to_previous_hook(mut self, forward: bool) -> Self {
        self.forward_to_previous_hook = forward;
        self
    }

    pub(crate) const fn hook_mode(&self) -> HookMode {
        HookMode {
            capture_backtrace: self.capture_backtrace,
            forward_to_previous_hook: self.forward_to_previous_hook,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoundaryConfig::default();
        assert!(config.capture_backtrace);
        assert!(config.log_panics);
        assert!(!config.forward_to_previous_hook);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: BoundaryConfig =
            serde_json::from_str(r#"{"log_panics": false}"#).unwrap();
        assert_eq!(
            config,
            BoundaryConfig::new().with_log_panics(false)
        );
    }

    #[test]
    fn test_builders() {
        let config = BoundaryConfig::new()
            .with_capture_backtrace(false)
            .with_forward_to_previous_hook(true);
        let mode = config.hook_mode();
        assert!(!mode.capture_backtrace);
        assert!(mode.forward_to_previous_hook);
    }
}
