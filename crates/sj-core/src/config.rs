//! Engine options

/// Verdict used when a load arrives for a page or frame that has no
/// established request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingContextPolicy {
    /// Block the load
    #[default]
    Deny,
    /// Let the load through
    Allow,
}

/// Tunables for a [`PolicyStore`](crate::store::PolicyStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Quiet period after the last edit before a save is due
    pub save_debounce_ms: u64,
    pub missing_context: MissingContextPolicy,
}

/// Default debounce window, matching the preferences page.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1000;

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            missing_context: MissingContextPolicy::Deny,
        }
    }
}
