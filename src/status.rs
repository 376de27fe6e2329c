// 🚦 Status Resolver - "Is it open now?" from a noisy report log
//
// Freshness decays to an explicit UNKNOWN instead of showing stale data.
// Two windows:
// - expiry:   the latest report counts for at most this long
// - conflict: a second report that disagrees within this window marks the
//             answer uncertain, but the latest report still wins
//
// Pure function of (reports, now). Never fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ReportStatus, StatusReport};
use crate::policy::StatusPolicy;

// ============================================================================
// RESOLVED STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrentStatus {
    Open,
    Closed,
    Unknown,
}

impl CurrentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrentStatus::Open => "OPEN",
            CurrentStatus::Closed => "CLOSED",
            CurrentStatus::Unknown => "UNKNOWN",
        }
    }
}

impl From<ReportStatus> for CurrentStatus {
    fn from(status: ReportStatus) -> Self {
        match status {
            ReportStatus::Open => CurrentStatus::Open,
            ReportStatus::Closed => CurrentStatus::Closed,
        }
    }
}

/// Derived on every read, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStatus {
    pub current_status: CurrentStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_uncertain: bool,
}

impl ResolvedStatus {
    pub fn unknown() -> Self {
        ResolvedStatus {
            current_status: CurrentStatus::Unknown,
            last_updated: None,
            is_uncertain: false,
        }
    }
}

impl Default for ResolvedStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

impl StatusPolicy {
    /// Resolve the current status from reports ordered newest-first.
    ///
    /// Only the two newest reports matter. `now` is sampled once by the
    /// caller so both window checks compare against the same instant.
    pub fn resolve(&self, reports: &[StatusReport], now: DateTime<Utc>) -> ResolvedStatus {
        let Some(latest) = reports.first() else {
            return ResolvedStatus::unknown();
        };

        // Expired: do not fall back to an older report
        if now - latest.created_at > self.expiry_window {
            return ResolvedStatus::unknown();
        }

        // Pairwise only: newest vs second-newest
        let is_uncertain = reports.get(1).map_or(false, |second| {
            now - second.created_at <= self.conflict_window && second.status != latest.status
        });

        ResolvedStatus {
            current_status: latest.status.into(),
            last_updated: Some(latest.created_at),
            is_uncertain,
        }
    }
}

/// Resolve with the default 30/15 minute windows
pub fn resolve_status(reports: &[StatusReport], now: DateTime<Utc>) -> ResolvedStatus {
    StatusPolicy::default().resolve(reports, now)
}
