//! Read-only process metadata cloned into each sandbox.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Snapshot of the host process taken once and cloned per sandbox.
/// Changes made by one file never reach the host or another file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub env: BTreeMap<String, String>,
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub platform: String,
    pub arch: String,
}

impl ProcessSnapshot {
    /// Capture the current process state. Non-UTF-8 variables are skipped.
    pub fn capture() -> Self {
        Self {
            env: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
            argv: std::env::args_os()
                .filter_map(|a| a.into_string().ok())
                .collect(),
            cwd: std::env::current_dir().unwrap_or_default(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Empty snapshot, for embedders that want no host leakage at all.
    pub fn empty() -> Self {
        Self {
            env: BTreeMap::new(),
            argv: Vec::new(),
            cwd: PathBuf::new(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Override a variable in this snapshot only.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl Default for ProcessSnapshot {
    fn default() -> Self {
        Self::capture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_records_platform_and_cwd() {
        let snap = ProcessSnapshot::capture();
        assert_eq!(snap.platform, std::env::consts::OS);
        assert_eq!(snap.cwd, std::env::current_dir().unwrap());
    }

    #[test]
    fn test_overrides_stay_local_to_clone() {
        let base = ProcessSnapshot::empty();
        let child = base.clone().with_var("QUIVER_SNAPSHOT_TEST", "1");
        assert_eq!(child.var("QUIVER_SNAPSHOT_TEST"), Some("1"));
        assert_eq!(base.var("QUIVER_SNAPSHOT_TEST"), None);
        assert!(std::env::var("QUIVER_SNAPSHOT_TEST").is_err());
    }
}
