// Daily progress bookkeeping: calendar bounds, lazily created months and the
// per-day entry upsert shared by the daily and goal handlers.
use crate::analytics::is_achieved;
use crate::changes::{ChangeKind, Table};
use crate::models::{DailyEntry, GoalType, Month, NewDailyEntry, NewMonth};
use crate::schema::{daily_entries, goals, months};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

/// First and last day of the calendar month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day.with_day(1).unwrap_or(day);
    let next_month_start = if day.month() == 12 {
        NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)
    };
    let end = next_month_start
        .map(|next| next - Duration::days(1))
        .unwrap_or(day);
    (start, end)
}

/// Monday-to-Sunday week containing `day`.
pub fn week_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let week = day.week(Weekday::Mon);
    (week.first_day(), week.last_day())
}

pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// "January 2025"
pub fn month_title(day: NaiveDate) -> String {
    day.format("%B %Y").to_string()
}

pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Incremental estimate used when a goal is completed: each completion adds
/// an equal share of today's goal count. It does not re-derive the ratio from
/// stored goals, so it drifts if today's goal count changes between calls.
pub fn next_completion_percentage(previous_percentage: f64, total_today_goals: i64) -> f64 {
    let share = 100.0 / total_today_goals.max(1) as f64;
    (previous_percentage + share).min(100.0)
}

/// Goals that belong on today's list: pending, active, and either due today
/// or recurring (daily or habit).
pub async fn count_today_goals(
    conn: &mut AsyncPgConnection,
    user_uuid: Uuid,
    today: NaiveDate,
) -> QueryResult<i64> {
    goals::table
        .filter(goals::user_id.eq(user_uuid))
        .filter(goals::archived.eq(false))
        .filter(goals::status.eq("pending"))
        .filter(
            goals::deadline
                .eq(today)
                .or(goals::goal_type.eq_any(vec![
                    GoalType::Daily.as_str(),
                    GoalType::Habit.as_str(),
                ])),
        )
        .count()
        .get_result::<i64>(conn)
        .await
}

pub async fn find_daily_entry(
    conn: &mut AsyncPgConnection,
    user_uuid: Uuid,
    day: NaiveDate,
) -> QueryResult<Option<DailyEntry>> {
    daily_entries::table
        .filter(daily_entries::user_id.eq(user_uuid))
        .filter(daily_entries::date.eq(day))
        .select(DailyEntry::as_select())
        .first::<DailyEntry>(conn)
        .await
        .optional()
}

/// Looks the month up by its bounds and inserts it when absent. The flag is
/// true when this call created the month.
pub async fn find_or_create_month(
    conn: &mut AsyncPgConnection,
    user_uuid: Uuid,
    day: NaiveDate,
) -> QueryResult<(Month, bool)> {
    let (start, end) = month_bounds(day);

    let existing = months::table
        .filter(months::user_id.eq(user_uuid))
        .filter(months::start_date.ge(start))
        .filter(months::end_date.le(end))
        .order(months::created_at.asc())
        .select(Month::as_select())
        .first::<Month>(conn)
        .await
        .optional()?;

    if let Some(month) = existing {
        return Ok((month, false));
    }

    log::info!("Creating month {} for user {}", month_title(day), user_uuid);
    diesel::insert_into(months::table)
        .values(&NewMonth {
            user_id: user_uuid,
            title: month_title(day),
            start_date: start,
            end_date: end,
        })
        .returning(Month::as_returning())
        .get_result::<Month>(conn)
        .await
        .map(|month| (month, true))
}

/// Result of [`upsert_daily_entry`].
#[derive(Debug, Clone, PartialEq)]
pub struct DailyWrite {
    pub entry: DailyEntry,
    pub month_created: bool,
}

impl DailyWrite {
    /// Change events to publish once the write is committed.
    pub fn changes(&self) -> Vec<(Table, ChangeKind)> {
        let mut changes = Vec::with_capacity(2);
        if self.month_created {
            changes.push((Table::Months, ChangeKind::Insert));
        }
        changes.push((
            Table::DailyEntries,
            ChangeKind::for_upsert(self.entry.was_inserted()),
        ));
        changes
    }
}

/// Writes the entry for `day`, creating its month first and replacing the
/// stored values on conflict. `achieved` is derived from the percentage.
pub async fn upsert_daily_entry(
    conn: &mut AsyncPgConnection,
    user_uuid: Uuid,
    day: NaiveDate,
    completion_percentage: f64,
    extras: DailyExtras,
) -> QueryResult<DailyWrite> {
    let (month, month_created) = find_or_create_month(conn, user_uuid, day).await?;
    let completion_percentage = clamp_percentage(completion_percentage);

    let entry = NewDailyEntry {
        user_id: user_uuid,
        month_id: month.id,
        date: day,
        completion_percentage,
        achieved: is_achieved(completion_percentage),
        notes: extras.notes,
        reason: extras.reason,
        wakeup_5am: extras.wakeup_5am,
        work_block: extras.work_block,
        html_study: extras.html_study,
    };

    diesel::insert_into(daily_entries::table)
        .values(&entry)
        .on_conflict((daily_entries::user_id, daily_entries::date))
        .do_update()
        .set(&entry.upsert_changeset())
        .returning(DailyEntry::as_returning())
        .get_result::<DailyEntry>(conn)
        .await
        .map(|entry| DailyWrite {
            entry,
            month_created,
        })
}

#[derive(Debug, Default)]
pub struct DailyExtras {
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub wakeup_5am: Option<bool>,
    pub work_block: Option<bool>,
    pub html_study: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn completing_one_of_five_goals_adds_twenty_points() {
        let next = next_completion_percentage(60.0, 5);
        assert_eq!(next, 80.0);
        assert!(is_achieved(next));
    }

    #[test]
    fn progress_is_capped_and_guards_zero_goals() {
        assert_eq!(next_completion_percentage(90.0, 2), 100.0);
        assert_eq!(next_completion_percentage(0.0, 0), 100.0);
        assert_eq!(next_completion_percentage(10.0, -3), 100.0);
    }

    #[test]
    fn month_bounds_handle_leap_years_and_december() {
        assert_eq!(
            month_bounds(date(2024, 2, 14)),
            (date(2024, 2, 1), date(2024, 2, 29))
        );
        assert_eq!(
            month_bounds(date(2025, 12, 31)),
            (date(2025, 12, 1), date(2025, 12, 31))
        );
    }

    #[test]
    fn week_starts_on_monday() {
        // 2025-01-18 is a Saturday
        assert_eq!(
            week_bounds(date(2025, 1, 18)),
            (date(2025, 1, 13), date(2025, 1, 19))
        );
    }

    #[test]
    fn month_title_uses_full_month_name() {
        assert_eq!(month_title(date(2025, 1, 18)), "January 2025");
    }

    #[test]
    fn days_in_range_is_inclusive() {
        assert_eq!(days_in_range(date(2024, 2, 1), date(2024, 2, 29)), 29);
    }

    #[test]
    fn percentages_are_clamped() {
        assert_eq!(clamp_percentage(120.0), 100.0);
        assert_eq!(clamp_percentage(-5.0), 0.0);
        assert_eq!(clamp_percentage(f64::NAN), 0.0);
        assert_eq!(clamp_percentage(42.5), 42.5);
    }

    fn written_entry(inserted: bool) -> DailyEntry {
        let created = Utc::now();
        let updated = if inserted {
            created
        } else {
            created + Duration::minutes(1)
        };
        DailyEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            month_id: Uuid::new_v4(),
            date: date(2025, 1, 18),
            completion_percentage: 60.0,
            achieved: false,
            notes: None,
            reason: None,
            wakeup_5am: None,
            work_block: None,
            html_study: None,
            created_at: created,
            updated_at: updated,
        }
    }

    #[test]
    fn first_write_of_a_month_announces_the_month() {
        let write = DailyWrite {
            entry: written_entry(true),
            month_created: true,
        };
        assert_eq!(
            write.changes(),
            vec![
                (Table::Months, ChangeKind::Insert),
                (Table::DailyEntries, ChangeKind::Insert),
            ]
        );
    }

    #[test]
    fn rewriting_a_day_is_an_update_only() {
        let write = DailyWrite {
            entry: written_entry(false),
            month_created: false,
        };
        assert_eq!(
            write.changes(),
            vec![(Table::DailyEntries, ChangeKind::Update)]
        );
    }
}
