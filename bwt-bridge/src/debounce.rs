//! Suppression of hardware bounce and accidental double-triggers.

use std::collections::HashMap;

/// Per-token blocked map.
///
/// Keyed by the literal raw token string, so "a" and "aa" debounce
/// independently. Entries are created lazily on first sight and never
/// removed; the valid vocabulary is finite so the map stays small.
///
/// The window length is the scheduler's business, not the filter's:
/// when a token fires, the session schedules a one-shot timer that
/// calls [`DebounceFilter::unblock`] after the configured window,
/// independent of any further traffic for that token.
#[derive(Debug, Default)]
pub struct DebounceFilter {
    blocked: HashMap<String, bool>,
}

impl DebounceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `token` may fire now. A firing token is marked
    /// blocked; the caller is responsible for scheduling the unblock.
    pub fn should_fire(&mut self, token: &str) -> bool {
        let entry = self.blocked.entry(token.to_string()).or_insert(false);
        if *entry {
            return false;
        }
        *entry = true;
        true
    }

    /// Clear the blocked flag for `token`. Invoked by the scheduled
    /// unblock timer.
    pub fn unblock(&mut self, token: &str) {
        if let Some(entry) = self.blocked.get_mut(token) {
            *entry = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sight_fires() {
        let mut filter = DebounceFilter::default();
        assert!(filter.should_fire("d"));
    }

    #[test]
    fn test_repeat_is_blocked_until_unblocked() {
        let mut filter = DebounceFilter::default();
        assert!(filter.should_fire("d"));
        assert!(!filter.should_fire("d"));
        filter.unblock("d");
        assert!(filter.should_fire("d"));
    }

    #[test]
    fn test_tokens_debounce_independently() {
        let mut filter = DebounceFilter::default();
        assert!(filter.should_fire("a"));
        assert!(filter.should_fire("aa"));
        assert!(!filter.should_fire("a"));
        assert!(!filter.should_fire("aa"));
    }

    #[test]
    fn test_unblock_of_unseen_token_is_noop() {
        let mut filter = DebounceFilter::default();
        filter.unblock("q");
        assert!(filter.should_fire("q"));
    }
}
