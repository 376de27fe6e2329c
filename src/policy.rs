// ⏱️ Policy - Freshness windows, query separators and paging limits
//
// Every threshold the core uses lives here so call sites never carry
// hard-coded literals. Windows can be overridden through Config.

use chrono::Duration;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Latest report stops counting after this many minutes
pub const DEFAULT_EXPIRY_MINUTES: i64 = 30;

/// Two newest reports disagreeing within this many minutes flag uncertainty
pub const DEFAULT_CONFLICT_MINUTES: i64 = 15;

/// Separator phrases, in priority order. Padding is part of the pattern.
pub const QUERY_SEPARATORS: [&str; 4] = [" at ", " in ", " near ", ", "];

/// How many reports the store hands to the resolver per place
pub const REPORT_HISTORY_LIMIT: usize = 3;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// STATUS POLICY
// ============================================================================

/// The two-tier freshness policy applied by the status resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    /// Hard expiry for the latest report
    pub expiry_window: Duration,

    /// Window in which a disagreeing second report marks the status uncertain
    pub conflict_window: Duration,
}

impl StatusPolicy {
    pub fn new(expiry_window: Duration, conflict_window: Duration) -> Self {
        StatusPolicy {
            expiry_window,
            conflict_window,
        }
    }

    /// Build a policy from minute counts. Counts beyond what a Duration can
    /// hold saturate to the largest window instead of panicking.
    pub fn from_minutes(expiry_minutes: i64, conflict_minutes: i64) -> Self {
        let window = |minutes: i64| Duration::try_minutes(minutes).unwrap_or(Duration::MAX);
        Self::new(window(expiry_minutes), window(conflict_minutes))
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_EXPIRY_MINUTES, DEFAULT_CONFLICT_MINUTES)
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

/// 1-based page request, clamped to sane bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Pagination {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip before this page starts
    pub fn offset(&self) -> u64 {
        (self.page as u64).saturating_sub(1) * self.limit as u64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::new(1, DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_windows() {
        let policy = StatusPolicy::default();

        assert_eq!(policy.expiry_window, Duration::minutes(30));
        assert_eq!(policy.conflict_window, Duration::minutes(15));
    }

    #[test]
    fn test_huge_minute_counts_saturate() {
        let policy = StatusPolicy::from_minutes(i64::MAX, 15);

        assert_eq!(policy.expiry_window, Duration::MAX);
        assert_eq!(policy.conflict_window, Duration::minutes(15));
    }

    #[test]
    fn test_separator_priority_order() {
        assert_eq!(QUERY_SEPARATORS, [" at ", " in ", " near ", ", "]);
    }

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::new(0, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 1);

        let p = Pagination::new(3, 1000);
        assert_eq!(p.limit, MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 2 * MAX_PAGE_SIZE as u64);
    }

    #[test]
    fn test_default_pagination() {
        let p = Pagination::default();
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 20);
        assert_eq!(p.offset(), 0);
    }
}
