use rustc_hash::FxHashSet;
use std::sync::Mutex;
use tracing::warn;

/// Per-instance registry of warnings already emitted.
///
/// Each distinct cause is logged at most once for the lifetime of the owner.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: Mutex<FxHashSet<String>>,
}

impl WarnOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message()` under `cause` unless that cause was already logged.
    ///
    /// Returns `true` if the warning was emitted.
    pub fn warn(&self, cause: &str, message: impl FnOnce() -> String) -> bool {
        let first = match self.seen.lock() {
            Ok(mut seen) => seen.insert(cause.to_string()),
            Err(_) => false,
        };
        if first {
            warn!(cause, "{}", message());
        }
        first
    }

    pub fn has_warned(&self, cause: &str) -> bool {
        self.seen.lock().map(|seen| seen.contains(cause)).unwrap_or(false)
    }
}

impl Clone for WarnOnce {
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_cause_once() {
        let warnings = WarnOnce::new();
        assert!(warnings.warn("too-long", || "sequence too long".to_string()));
        assert!(!warnings.warn("too-long", || "sequence too long".to_string()));
        assert!(warnings.warn("legacy", || "legacy behaviour".to_string()));
        assert!(warnings.has_warned("too-long"));
        assert!(!warnings.has_warned("other"));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = WarnOnce::new();
        a.warn("x", String::new);
        let b = a.clone();
        assert!(!b.has_warned("x"));
        assert!(a.has_warned("x"));
    }
}
