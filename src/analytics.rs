//! Rollups computed over rows already loaded for one user.
//!
//! Everything here is pure: handlers fetch the rows, these functions reduce
//! them into the numbers the dashboard, chart and overview endpoints return.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

/// A day counts as achieved, and extends a streak, at or above this percentage.
pub const ACHIEVED_THRESHOLD: f64 = 70.0;

/// Today's progress at or above this earns a celebration flag on the dashboard.
pub const CELEBRATION_THRESHOLD: f64 = 90.0;

pub fn is_achieved(percentage: f64) -> bool {
    percentage >= ACHIEVED_THRESHOLD
}

/// Counts leading entries at or above the threshold in a most-recent-first
/// sequence. A missing percentage counts as 0 and ends the streak.
pub fn current_streak<I>(percentages: I) -> usize
where
    I: IntoIterator<Item = Option<f64>>,
{
    percentages
        .into_iter()
        .take_while(|p| is_achieved(p.unwrap_or(0.0)))
        .count()
}

/// Same rule as [`current_streak`], counted backwards from the end of an
/// oldest-first sequence.
pub fn trailing_streak(percentages: &[Option<f64>]) -> usize {
    current_streak(percentages.iter().rev().copied())
}

/// Arithmetic mean with missing values as 0. An empty input yields 0.
pub fn mean_completion<I>(percentages: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = percentages
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), p| (sum + p.unwrap_or(0.0), count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn count_achieved<I>(flags: I) -> usize
where
    I: IntoIterator<Item = Option<bool>>,
{
    flags.into_iter().filter(|f| f.unwrap_or(false)).count()
}

/// Rounded for display only; callers keep the unrounded value for comparisons.
pub fn display_percent(value: f64) -> i64 {
    value.round() as i64
}

pub fn completion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CategoryStat {
    pub category: String,
    pub count: usize,
    pub completed: usize,
}

/// Groups `(category, status)` pairs. Output follows the order in which each
/// category first appears; keys are kept exactly as stored.
pub fn category_rollup<'a, I>(goals: I) -> Vec<CategoryStat>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut stats: Vec<CategoryStat> = Vec::new();
    let mut positions: HashMap<&'a str, usize> = HashMap::new();

    for (category, status) in goals {
        let position = *positions.entry(category).or_insert_with(|| {
            stats.push(CategoryStat {
                category: category.to_string(),
                count: 0,
                completed: 0,
            });
            stats.len() - 1
        });
        let stat = &mut stats[position];
        stat.count += 1;
        if status == "achieved" {
            stat.completed += 1;
        }
    }

    stats
}

/// `"health"` -> `"Health"`.
pub fn display_category(category: &str) -> String {
    let mut chars = category.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunningTotal {
    pub date: NaiveDate,
    pub amount: f64,
    pub total: f64,
}

/// Cumulative sum in input order. The caller sorts by date first.
pub fn running_totals<I>(amounts: I) -> Vec<RunningTotal>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut total = 0.0;
    amounts
        .into_iter()
        .map(|(date, amount)| {
            total += amount;
            RunningTotal {
                date,
                amount,
                total,
            }
        })
        .collect()
}

pub fn total_points(monthly_completed: usize, streak: usize, total_savings: f64) -> i64 {
    monthly_completed as i64 * 100 + streak as i64 * 10 + (total_savings / 100.0).floor() as i64
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionBand {
    High,
    Medium,
    Low,
    Empty,
}

pub fn completion_band(percentage: f64) -> CompletionBand {
    if percentage >= 80.0 {
        CompletionBand::High
    } else if percentage >= 50.0 {
        CompletionBand::Medium
    } else if percentage > 0.0 {
        CompletionBand::Low
    } else {
        CompletionBand::Empty
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub weekday: String,
    pub completion_percentage: f64,
    pub band: CompletionBand,
    pub is_today: bool,
}

/// Seven days from `week_start`, filled from `(date, percentage)` entries.
pub fn week_calendar(
    week_start: NaiveDate,
    entries: &[(NaiveDate, Option<f64>)],
    today: NaiveDate,
) -> Vec<CalendarDay> {
    (0..7)
        .map(|offset| {
            let date = week_start + Duration::days(offset);
            let completion_percentage = entries
                .iter()
                .find(|(d, _)| *d == date)
                .and_then(|(_, p)| *p)
                .unwrap_or(0.0);
            CalendarDay {
                date,
                weekday: date.weekday().to_string(),
                completion_percentage,
                band: completion_band(completion_percentage),
                is_today: date == today,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn streak_counts_leading_qualifying_days() {
        assert_eq!(current_streak(some(&[])), 0);
        assert_eq!(current_streak(some(&[80.0, 75.0, 60.0, 90.0])), 2);
        assert_eq!(current_streak(some(&[90.0, 90.0, 90.0])), 3);
        assert_eq!(current_streak(some(&[70.0, 69.9])), 1);
    }

    #[test]
    fn streak_treats_missing_percentage_as_zero() {
        assert_eq!(current_streak(vec![Some(95.0), None, Some(95.0)]), 1);
    }

    #[test]
    fn streak_never_exceeds_input_length() {
        let entries = some(&[100.0; 30]);
        assert_eq!(current_streak(entries.clone()), 30);
        assert!(current_streak(entries.clone()) <= entries.len());
    }

    #[test]
    fn trailing_streak_counts_from_the_end() {
        assert_eq!(trailing_streak(&some(&[50.0, 80.0, 90.0])), 2);
        assert_eq!(trailing_streak(&some(&[80.0, 90.0, 10.0])), 0);
        assert_eq!(trailing_streak(&[]), 0);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean_completion(Vec::new()), 0.0);
        assert!(!mean_completion(Vec::new()).is_nan());
    }

    #[test]
    fn mean_lies_between_min_and_max() {
        let samples = [
            vec![10.0],
            vec![0.0, 100.0],
            vec![33.3, 66.6, 99.9, 12.5],
            vec![70.0, 70.0, 70.0],
        ];
        for sample in samples {
            let mean = mean_completion(some(&sample));
            let min = sample.iter().copied().fold(f64::INFINITY, f64::min);
            let max = sample.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(mean >= min && mean <= max, "{mean} outside [{min}, {max}]");
        }
    }

    #[test]
    fn mean_counts_missing_as_zero() {
        assert_eq!(mean_completion(vec![Some(80.0), None]), 40.0);
    }

    #[test]
    fn threshold_uses_unrounded_mean() {
        let mean = mean_completion(some(&[69.6, 69.6]));
        assert_eq!(display_percent(mean), 70);
        assert!(!is_achieved(mean));
    }

    #[test]
    fn counts_true_flags_only() {
        assert_eq!(count_achieved(vec![Some(true), Some(false), None, Some(true)]), 2);
        assert_eq!(count_achieved(Vec::new()), 0);
    }

    #[test]
    fn completion_rate_guards_empty_total() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(3, 4), 75.0);
    }

    #[test]
    fn rollup_counts_sum_to_input_length() {
        let goals = [
            ("health", "achieved"),
            ("study", "pending"),
            ("health", "not_achieved"),
            ("Health", "achieved"),
            ("study", "achieved"),
        ];
        let rollup = category_rollup(goals.iter().copied());

        let total: usize = rollup.iter().map(|s| s.count).sum();
        assert_eq!(total, goals.len());
        assert!(rollup.iter().all(|s| s.completed <= s.count));

        let names: Vec<&str> = rollup.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(names, vec!["health", "study", "Health"]);
        assert_eq!(
            rollup[0],
            CategoryStat {
                category: "health".to_string(),
                count: 2,
                completed: 1
            }
        );
    }

    #[test]
    fn rollup_order_is_stable_across_calls() {
        let goals = [("work", "pending"), ("finance", "achieved"), ("work", "achieved")];
        assert_eq!(
            category_rollup(goals.iter().copied()),
            category_rollup(goals.iter().copied())
        );
    }

    #[test]
    fn display_category_capitalizes_first_letter() {
        assert_eq!(display_category("spiritual"), "Spiritual");
        assert_eq!(display_category(""), "");
    }

    #[test]
    fn running_totals_accumulate_in_input_order() {
        let totals = running_totals(vec![(day(1), 100.0), (day(2), 50.0)]);
        let sums: Vec<f64> = totals.iter().map(|t| t.total).collect();
        assert_eq!(sums, vec![100.0, 150.0]);
        assert_eq!(totals[0].amount, 100.0);

        let again = running_totals(totals.iter().map(|t| (t.date, t.amount)));
        assert_eq!(again, totals);
    }

    #[test]
    fn running_totals_do_not_sort() {
        let totals = running_totals(vec![(day(5), 10.0), (day(1), 5.0)]);
        assert_eq!(totals[0].date, day(5));
        assert_eq!(totals[1].total, 15.0);
    }

    #[test]
    fn points_combine_goals_streak_and_savings() {
        assert_eq!(total_points(3, 4, 1_250.0), 300 + 40 + 12);
        assert_eq!(total_points(0, 0, 99.0), 0);
    }

    #[test]
    fn bands_follow_calendar_colors() {
        assert_eq!(completion_band(80.0), CompletionBand::High);
        assert_eq!(completion_band(50.0), CompletionBand::Medium);
        assert_eq!(completion_band(0.5), CompletionBand::Low);
        assert_eq!(completion_band(0.0), CompletionBand::Empty);
    }

    #[test]
    fn calendar_fills_missing_days_with_zero() {
        // 2025-01-13 is a Monday
        let calendar = week_calendar(day(13), &[(day(14), Some(85.0))], day(15));
        assert_eq!(calendar.len(), 7);
        assert_eq!(calendar[0].weekday, "Mon");
        assert_eq!(calendar[1].band, CompletionBand::High);
        assert_eq!(calendar[2].completion_percentage, 0.0);
        assert!(calendar[2].is_today);
        assert_eq!(calendar[6].date, day(19));
    }
}
