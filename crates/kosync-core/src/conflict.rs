//! Conflict resolution
//!
//! Decides whose reading position wins when this device and the service
//! disagree. The remote position is adopted only when it is meaningfully
//! ahead and names a concrete page; in every other case the local position
//! is pushed. Pushing an unchanged position is harmless because the service
//! is last-write-wins.

use crate::models::{percentage, RemoteProgress};

/// Default lead (as a completion ratio) the remote needs before it is adopted
pub const DEFAULT_ADOPT_REMOTE_THRESHOLD: f64 = 0.02;

/// Ratios closer than this compare as equal (`0.40 - 0.38` is not exactly `0.02`)
const RATIO_TOLERANCE: f64 = 1e-9;

/// Local reading position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPosition {
    pub page: i64,
    pub total_pages: i64,
}

impl LocalPosition {
    pub fn new(page: i64, total_pages: i64) -> Self {
        Self { page, total_pages }
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.page, self.total_pages)
    }
}

/// Why a decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// The service has no record for this document
    NoRemote,
    /// The service is ahead by more than the threshold
    AdoptRemote,
    /// This device is ahead by more than the threshold
    LocalAhead,
    /// Positions are within the threshold (or the remote page is unusable)
    InSync,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::NoRemote => "no_remote",
            DecisionReason::AdoptRemote => "adopt_remote",
            DecisionReason::LocalAhead => "local_ahead",
            DecisionReason::InSync => "in_sync",
        }
    }
}

/// Outcome of resolving local against remote progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncDecision {
    /// Page the reader should display
    pub resolved_page: i64,
    /// Whether the local position should be pushed
    pub push: bool,
    pub reason: DecisionReason,
    /// `remote - local` completion ratio (0 when there is no remote)
    pub delta: f64,
}

/// Threshold-based resolver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictResolver {
    adopt_remote_threshold: f64,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ADOPT_REMOTE_THRESHOLD)
    }
}

impl ConflictResolver {
    pub fn new(adopt_remote_threshold: f64) -> Self {
        Self {
            adopt_remote_threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.adopt_remote_threshold
    }

    /// Resolve a local position against the remote record
    pub fn resolve(&self, local: LocalPosition, remote: Option<&RemoteProgress>) -> SyncDecision {
        let Some(remote) = remote else {
            return SyncDecision {
                resolved_page: local.page,
                push: true,
                reason: DecisionReason::NoRemote,
                delta: 0.0,
            };
        };

        let delta = remote.percentage - local.percentage();

        if delta - self.adopt_remote_threshold > RATIO_TOLERANCE {
            if let Some(remote_page) = remote.page() {
                return SyncDecision {
                    resolved_page: remote_page,
                    push: false,
                    reason: DecisionReason::AdoptRemote,
                    delta,
                };
            }
        }

        let reason = if -delta - self.adopt_remote_threshold > RATIO_TOLERANCE {
            DecisionReason::LocalAhead
        } else {
            DecisionReason::InSync
        };

        SyncDecision {
            resolved_page: local.page,
            push: true,
            reason,
            delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(progress: &str, percentage: f64) -> RemoteProgress {
        RemoteProgress {
            document: "doc".to_string(),
            progress: progress.to_string(),
            percentage,
            device_id: "OTHER".to_string(),
            device: "Other Reader".to_string(),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_no_remote_pushes_local() {
        let decision = ConflictResolver::default().resolve(LocalPosition::new(7, 200), None);

        assert_eq!(decision.resolved_page, 7);
        assert!(decision.push);
        assert_eq!(decision.reason, DecisionReason::NoRemote);
    }

    #[test]
    fn test_adopts_remote_when_far_ahead() {
        let remote = remote("40", 0.40);
        let decision =
            ConflictResolver::new(0.02).resolve(LocalPosition::new(10, 100), Some(&remote));

        assert_eq!(decision.resolved_page, 40);
        assert!(!decision.push);
        assert_eq!(decision.reason, DecisionReason::AdoptRemote);
        assert!((decision.delta - 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_delta_equal_to_threshold_pushes_local() {
        let remote = remote("40", 0.40);
        let decision =
            ConflictResolver::new(0.02).resolve(LocalPosition::new(38, 100), Some(&remote));

        assert_eq!(decision.resolved_page, 38);
        assert!(decision.push);
        assert_eq!(decision.reason, DecisionReason::InSync);
    }

    #[test]
    fn test_local_ahead_pushes_local() {
        let remote = remote("20", 0.20);
        let decision =
            ConflictResolver::new(0.02).resolve(LocalPosition::new(60, 100), Some(&remote));

        assert_eq!(decision.resolved_page, 60);
        assert!(decision.push);
        assert_eq!(decision.reason, DecisionReason::LocalAhead);
    }

    #[test]
    fn test_unusable_remote_page_is_not_adopted() {
        let remote = remote("/body/DocFragment[20]/body/p[4]/text().0", 0.90);
        let decision =
            ConflictResolver::new(0.02).resolve(LocalPosition::new(10, 100), Some(&remote));

        assert_eq!(decision.resolved_page, 10);
        assert!(decision.push);
    }

    #[test]
    fn test_zero_total_pages_treats_local_as_start() {
        let remote = remote("5", 0.05);
        let decision =
            ConflictResolver::new(0.02).resolve(LocalPosition::new(30, 0), Some(&remote));

        assert_eq!(decision.resolved_page, 5);
        assert!(!decision.push);
    }
}
