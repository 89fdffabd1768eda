// Bridge configuration

/// What the registry does when the same handler is registered twice for
/// the same event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Unbind the previous native listener and bind the handler again
    #[default]
    Replace,
    /// Keep the existing registration and hand back its subscription
    Reject,
}

/// Session-wide settings
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// Level used by the FFI layer when it installs a logger
    pub log_level: log::LevelFilter,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Replace,
            log_level: log::LevelFilter::Info,
        }
    }
}

impl BridgeConfig {
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_log_level(mut self, level: log::LevelFilter) -> Self {
        self.log_level = level;
        self
    }
}
