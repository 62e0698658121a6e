// 📈 Reading Streaks - Consecutive-day streaks and calendar-period counts
//
// Pure date arithmetic over completion timestamps. No I/O, no failure
// modes: empty input is a valid input, never an error.
//
// Day boundaries are computed in UTC. The evaluation date ("today") is
// passed in by the caller, which keeps these functions deterministic and
// keeps the wall clock out of the core.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Derived streak statistics for one user's completion history.
///
/// Recomputed on every request from the full set of completion events;
/// never persisted. Invariant: `longest_streak >= current_streak`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakResult {
    /// Consecutive calendar days ending at today or yesterday, each with
    /// at least one completion. Zero when the streak is broken.
    pub current_streak: u32,

    /// Longest consecutive-day run anywhere in the history.
    pub longest_streak: u32,

    /// Calendar date of the most recent completion (None = no completions).
    pub last_completion_date: Option<NaiveDate>,
}

impl StreakResult {
    /// Result for an empty completion history.
    pub fn empty() -> Self {
        StreakResult {
            current_streak: 0,
            longest_streak: 0,
            last_completion_date: None,
        }
    }
}

/// Completion counts within calendar windows.
///
/// Unlike streaks, these count every completion event individually:
/// two books finished on the same day contribute two to each window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCounts {
    pub this_month: u32,
    pub this_year: u32,
    pub all_time: u32,
}

// ============================================================================
// STREAK CALCULATOR
// ============================================================================

/// Compute current and longest reading streaks from completion timestamps.
///
/// Input order does not matter and duplicates within the same calendar day
/// are permitted (they count once toward streak length). `today` is the
/// evaluation date in UTC.
///
/// A streak is "live" when the most recent completion is today or
/// yesterday: reading yesterday but not yet today still shows the streak.
pub fn compute_streaks(timestamps: &[DateTime<Utc>], today: NaiveDate) -> StreakResult {
    // Normalize to calendar dates (fresh values, input untouched),
    // dedupe, and order most recent first.
    let mut dates: Vec<NaiveDate> = timestamps.iter().map(|ts| ts.date_naive()).collect();
    dates.sort_unstable();
    dates.dedup();
    dates.reverse();

    let Some(&most_recent) = dates.first() else {
        return StreakResult::empty();
    };

    // Current streak: only live when the latest completion is today or
    // yesterday. Walk backward while the gap between adjacent days is
    // exactly one day; the first larger gap ends the streak.
    let days_since = (today - most_recent).num_days();
    let mut current_streak = 0u32;
    if (0..=1).contains(&days_since) {
        current_streak = 1;
        for pair in dates.windows(2) {
            if (pair[0] - pair[1]).num_days() == 1 {
                current_streak += 1;
            } else {
                break;
            }
        }
    }

    // Longest streak: single scan with a running consecutive-day counter.
    // Taking the max with the current streak guards the case where the
    // live streak is itself the longest run.
    let mut longest_streak = 1u32;
    let mut run = 1u32;
    for pair in dates.windows(2) {
        if (pair[0] - pair[1]).num_days() == 1 {
            run += 1;
        } else {
            run = 1;
        }
        longest_streak = longest_streak.max(run);
    }
    longest_streak = longest_streak.max(current_streak);

    StreakResult {
        current_streak,
        longest_streak,
        last_completion_date: Some(most_recent),
    }
}

// ============================================================================
// PERIOD AGGREGATOR
// ============================================================================

/// Count completions falling in the current calendar month, the current
/// calendar year, and all-time. "Current" means the injected `today`, not
/// any completion date. Every timestamp counts individually.
pub fn count_periods(timestamps: &[DateTime<Utc>], today: NaiveDate) -> PeriodCounts {
    let mut this_month = 0u32;
    let mut this_year = 0u32;

    for ts in timestamps {
        let date = ts.date_naive();
        if date.year() == today.year() {
            this_year += 1;
            if date.month() == today.month() {
                this_month += 1;
            }
        }
    }

    PeriodCounts {
        this_month,
        this_year,
        all_time: timestamps.len() as u32,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Fixed evaluation date so streak windows are deterministic.
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    /// Timestamp at noon UTC, `days_ago` days before the fixed today.
    fn days_ago(days: i64) -> DateTime<Utc> {
        (today() - Duration::days(days))
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_empty_input() {
        let result = compute_streaks(&[], today());

        assert_eq!(result.current_streak, 0);
        assert_eq!(result.longest_streak, 0);
        assert_eq!(result.last_completion_date, None);
    }

    #[test]
    fn test_single_completion_today() {
        let result = compute_streaks(&[days_ago(0)], today());

        assert_eq!(result.current_streak, 1);
        assert_eq!(result.longest_streak, 1);
        assert_eq!(result.last_completion_date, Some(today()));
    }

    #[test]
    fn test_completion_yesterday_keeps_streak_live() {
        // Read yesterday but not yet today: streak still shows as live.
        let result = compute_streaks(&[days_ago(1)], today());

        assert_eq!(result.current_streak, 1);
        assert_eq!(result.longest_streak, 1);
    }

    #[test]
    fn test_three_consecutive_days() {
        let stamps = vec![days_ago(0), days_ago(1), days_ago(2)];
        let result = compute_streaks(&stamps, today());

        assert_eq!(result.current_streak, 3);
        assert_eq!(result.longest_streak, 3);
    }

    #[test]
    fn test_gap_breaks_current_streak() {
        let stamps = vec![days_ago(0), days_ago(5)];
        let result = compute_streaks(&stamps, today());

        assert_eq!(result.current_streak, 1);
        assert_eq!(result.longest_streak, 1);
    }

    #[test]
    fn test_old_run_counts_for_longest_only() {
        // Three consecutive days, but the run ended over a week ago.
        let stamps = vec![days_ago(10), days_ago(9), days_ago(8)];
        let result = compute_streaks(&stamps, today());

        assert_eq!(result.current_streak, 0);
        assert_eq!(result.longest_streak, 3);
        assert_eq!(result.last_completion_date, Some(today() - Duration::days(8)));
    }

    #[test]
    fn test_duplicates_on_same_day_count_once() {
        // Two books finished today at different hours, one yesterday.
        let second_today = today().and_hms_opt(20, 45, 0).unwrap().and_utc();
        let stamps = vec![days_ago(0), second_today, days_ago(1)];
        let result = compute_streaks(&stamps, today());

        assert_eq!(result.current_streak, 2);
        assert_eq!(result.longest_streak, 2);

        // ...but each counts individually in the period windows.
        let counts = count_periods(&stamps, today());
        assert_eq!(counts.all_time, 3);
    }

    #[test]
    fn test_longest_is_older_than_current() {
        // Current streak of 2, older run of 4.
        let stamps = vec![
            days_ago(0),
            days_ago(1),
            days_ago(20),
            days_ago(21),
            days_ago(22),
            days_ago(23),
        ];
        let result = compute_streaks(&stamps, today());

        assert_eq!(result.current_streak, 2);
        assert_eq!(result.longest_streak, 4);
        assert!(result.longest_streak >= result.current_streak);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let sorted = vec![days_ago(0), days_ago(1), days_ago(2)];
        let shuffled = vec![days_ago(1), days_ago(2), days_ago(0)];

        assert_eq!(
            compute_streaks(&sorted, today()),
            compute_streaks(&shuffled, today())
        );
    }

    #[test]
    fn test_period_counts_single_completion() {
        // One completion today lands in all three windows at once.
        let counts = count_periods(&[days_ago(0)], today());

        assert_eq!(counts.this_month, 1);
        assert_eq!(counts.this_year, 1);
        assert_eq!(counts.all_time, 1);
    }

    #[test]
    fn test_period_counts_calendar_windows() {
        let in_january = NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc();
        let last_year = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc();
        let stamps = vec![days_ago(0), in_january, last_year];

        let counts = count_periods(&stamps, today());

        assert_eq!(counts.this_month, 1);
        assert_eq!(counts.this_year, 2);
        assert_eq!(counts.all_time, 3);
    }

    #[test]
    fn test_periods_independent_of_streak_state() {
        // A broken streak does not change period counts.
        let stamps = vec![days_ago(30), days_ago(40)];
        let result = compute_streaks(&stamps, today());
        let counts = count_periods(&stamps, today());

        assert_eq!(result.current_streak, 0);
        assert_eq!(counts.this_year, 2);
        assert_eq!(counts.all_time, 2);
    }
}
