//! # Config - MapHeap runtime settings
//!
//! Settings that control how a heap file is opened and closed. Every value
//! has an in-code default and can be overridden through the environment:
//!
//! ```text
//! MAPHEAP_LOCK           "try" fails fast, "wait" blocks   (default: "try")
//! MAPHEAP_SYNC_ON_CLOSE  msync every window on drop        (default: "true")
//! ```
//!
//! Missing or unparsable values fall back to the default rather than failing.

/// Environment variable selecting the [`LockMode`].
pub const ENV_LOCK: &str = "MAPHEAP_LOCK";

/// Environment variable toggling [`HeapConfig::sync_on_close`].
pub const ENV_SYNC_ON_CLOSE: &str = "MAPHEAP_SYNC_ON_CLOSE";

/// How the exclusive advisory lock on the backing file is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Fail immediately if another handle holds the lock.
    #[default]
    Try,
    /// Block until the current holder releases the lock.
    Wait,
}

impl LockMode {
    /// Parses `"try"` / `"wait"` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "try" => Some(LockMode::Try),
            "wait" => Some(LockMode::Wait),
            _ => None,
        }
    }
}

/// Options applied when a heap file is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapConfig {
    /// Lock acquisition policy.
    pub lock: LockMode,
    /// Flush all mapped windows to disk when the heap handle is dropped.
    pub sync_on_close: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            lock: LockMode::Try,
            sync_on_close: true,
        }
    }
}

impl HeapConfig {
    /// Builds a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Used by [`from_env`]
    /// and by tests that must not touch the process environment.
    ///
    /// [`from_env`]: HeapConfig::from_env
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let lock = lookup(ENV_LOCK)
            .and_then(|v| LockMode::parse(&v))
            .unwrap_or(defaults.lock);
        let sync_on_close = lookup(ENV_SYNC_ON_CLOSE)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.sync_on_close);
        Self {
            lock,
            sync_on_close,
        }
    }

    pub fn with_lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_sync_on_close(mut self, sync: bool) -> Self {
        self.sync_on_close = sync;
        self
    }
}

/// Reads a configuration value from the environment, falling back to `default`.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
