// 🎯 Goal Pace Projector - Is the yearly goal on track?
//
// Pure date arithmetic, same shape as the streak core: the evaluation
// date is injected, nothing here reads the wall clock.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::entities::ReadingGoal;

// ============================================================================
// GOAL PROGRESS
// ============================================================================

/// Derived progress for one yearly goal. Recomputed on request,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub year: i32,
    pub target_books: u32,

    /// Books finished within the goal year so far
    pub finished: u32,

    /// Books still needed to hit the target
    pub remaining: u32,

    /// Books the pace says should be finished by today
    /// (target scaled by the elapsed fraction of the year)
    pub expected_by_today: f64,

    /// Year-end total if the current pace holds
    pub projected_total: u32,

    pub on_track: bool,
}

impl GoalProgress {
    /// Compute progress against `today`.
    ///
    /// For a past year the whole year has elapsed (on track means the
    /// target was hit); for a future year nothing has elapsed yet.
    pub fn compute(goal: &ReadingGoal, finished: u32, today: NaiveDate) -> Self {
        let elapsed = elapsed_fraction(goal.year, today);

        let expected_by_today = goal.target_books as f64 * elapsed;

        // Pace tolerance of one book: you are on track until you trail
        // the proportional pace by a full book.
        let on_track = finished as f64 >= expected_by_today.floor();

        let projected_total = if elapsed > 0.0 {
            (finished as f64 / elapsed).round() as u32
        } else {
            finished
        };

        GoalProgress {
            year: goal.year,
            target_books: goal.target_books,
            finished,
            remaining: goal.target_books.saturating_sub(finished),
            expected_by_today,
            projected_total,
            on_track,
        }
    }
}

/// Fraction of the goal year elapsed as of `today`, clamped to [0, 1].
fn elapsed_fraction(year: i32, today: NaiveDate) -> f64 {
    if today.year() > year {
        return 1.0;
    }
    if today.year() < year {
        return 0.0;
    }

    let days_in_year = NaiveDate::from_ymd_opt(year, 12, 31)
        .map(|d| d.ordinal())
        .unwrap_or(365);

    today.ordinal() as f64 / days_in_year as f64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(target: u32) -> ReadingGoal {
        ReadingGoal::new("user-1", 2025, target)
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_on_track_at_midyear() {
        // July 2 is day 183 of 365: almost exactly half the year.
        let progress = GoalProgress::compute(&goal(24), 12, date(7, 2));

        assert!(progress.on_track);
        assert_eq!(progress.remaining, 12);
        assert!((progress.expected_by_today - 12.03).abs() < 0.05);
        assert_eq!(progress.projected_total, 24);
    }

    #[test]
    fn test_behind_pace() {
        // Half the year gone, a quarter of the books read.
        let progress = GoalProgress::compute(&goal(24), 6, date(7, 2));

        assert!(!progress.on_track);
        assert_eq!(progress.projected_total, 12);
        assert_eq!(progress.remaining, 18);
    }

    #[test]
    fn test_early_year_tolerance() {
        // Mid-January, nothing finished yet: expected is under one book,
        // so the goal still counts as on track.
        let progress = GoalProgress::compute(&goal(24), 0, date(1, 15));

        assert!(progress.on_track);
        assert_eq!(progress.finished, 0);
    }

    #[test]
    fn test_target_exceeded() {
        let progress = GoalProgress::compute(&goal(10), 13, date(11, 1));

        assert!(progress.on_track);
        assert_eq!(progress.remaining, 0);
    }

    #[test]
    fn test_past_year_judged_on_final_count() {
        let past_goal = ReadingGoal::new("user-1", 2023, 20);
        let today = date(6, 15);

        let hit = GoalProgress::compute(&past_goal, 20, today);
        assert!(hit.on_track);
        assert_eq!(hit.expected_by_today, 20.0);
        assert_eq!(hit.projected_total, 20);

        let missed = GoalProgress::compute(&past_goal, 15, today);
        assert!(!missed.on_track);
    }

    #[test]
    fn test_future_year_has_no_expectation() {
        let future_goal = ReadingGoal::new("user-1", 2026, 20);
        let progress = GoalProgress::compute(&future_goal, 0, date(6, 15));

        assert!(progress.on_track);
        assert_eq!(progress.expected_by_today, 0.0);
        assert_eq!(progress.projected_total, 0);
    }
}
