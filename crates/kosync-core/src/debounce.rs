//! Push debouncing
//!
//! Page turns are frequent; network writes should not be. A push is only
//! allowed once a cooldown has elapsed since the last accepted push AND the
//! reader has moved forward by a minimum number of pages.

use crate::models::LocalProgressRecord;

/// Default cooldown between pushes for one document
pub const DEFAULT_DEBOUNCE_SECONDS: i64 = 25;

/// Default minimum forward movement between pushes
pub const DEFAULT_MIN_PAGE_DELTA: i64 = 1;

/// Debounce gate configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebouncePolicy {
    /// Seconds that must pass since the last accepted push
    pub debounce_seconds: i64,
    /// Pages the reader must have advanced since the last accepted push
    pub min_page_delta: i64,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self {
            debounce_seconds: DEFAULT_DEBOUNCE_SECONDS,
            min_page_delta: DEFAULT_MIN_PAGE_DELTA,
        }
    }
}

impl DebouncePolicy {
    pub fn new(debounce_seconds: i64, min_page_delta: i64) -> Self {
        Self {
            debounce_seconds,
            min_page_delta,
        }
    }

    /// Decide whether a candidate position should be pushed now
    ///
    /// A missing record counts as a push of page 0 at time 0.
    pub fn should_push(
        &self,
        record: Option<&LocalProgressRecord>,
        now: i64,
        candidate_page: i64,
        force: bool,
    ) -> bool {
        if force {
            return true;
        }

        let (last_push, last_page) = record
            .map(|r| (r.last_push, r.page))
            .unwrap_or((0, 0));

        now.saturating_sub(last_push) >= self.debounce_seconds
            && candidate_page.saturating_sub(last_page) >= self.min_page_delta
    }
}
