use crate::analytics::{
    category_rollup, completion_rate, count_achieved, current_streak, display_category,
    display_percent, mean_completion, running_totals, total_points, trailing_streak,
    week_calendar, CELEBRATION_THRESHOLD,
};
use crate::auth_utils::AuthenticatedUser;
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::handlers::saving_handlers::{load_amounts_since, trend_window};
use crate::models::{
    ChartData, DailyProgressPoint, DashboardStats, GoalStatus, MonthlyGoals, MonthlyStats,
    PeriodOverview, QuickSummary, SummaryStats, TrendQuery, WeeklyStats,
};
use crate::progress::{days_in_range, month_bounds, week_bounds};
use crate::schema::{daily_entries, design_portfolio, goals, health_metrics, html_curriculum};
use crate::schema::{reflections, savings};
use actix_web::{get, web, HttpResponse};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

// Streak lookback for the dashboard
const STREAK_WINDOW_DAYS: i64 = 30;

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

fn count_status(statuses: &[String], wanted: GoalStatus) -> usize {
    statuses.iter().filter(|s| s.as_str() == wanted.as_str()).count()
}

async fn savings_between(
    conn: &mut AsyncPgConnection,
    user_uuid: Uuid,
    range: Option<(NaiveDate, NaiveDate)>,
) -> QueryResult<f64> {
    let mut query = savings::table
        .filter(savings::user_id.eq(user_uuid))
        .select(sum(savings::amount))
        .into_boxed();
    if let Some((from, to)) = range {
        query = query
            .filter(savings::date.ge(from))
            .filter(savings::date.le(to));
    }
    let total: Option<f64> = query.first(conn).await?;
    Ok(total.unwrap_or(0.0))
}

async fn count_designs(conn: &mut AsyncPgConnection, user_uuid: Uuid) -> QueryResult<i64> {
    design_portfolio::table
        .filter(design_portfolio::user_id.eq(user_uuid))
        .count()
        .get_result(conn)
        .await
}

async fn count_completed_study(conn: &mut AsyncPgConnection, user_uuid: Uuid) -> QueryResult<i64> {
    html_curriculum::table
        .filter(html_curriculum::user_id.eq(user_uuid))
        .filter(html_curriculum::completed.eq(true))
        .count()
        .get_result(conn)
        .await
}

/// `(date, completion_percentage, achieved)` for an inclusive range, oldest first.
async fn load_period(
    conn: &mut AsyncPgConnection,
    user_uuid: Uuid,
    (from, to): (NaiveDate, NaiveDate),
) -> QueryResult<Vec<(NaiveDate, f64, bool)>> {
    daily_entries::table
        .filter(daily_entries::user_id.eq(user_uuid))
        .filter(daily_entries::date.ge(from))
        .filter(daily_entries::date.le(to))
        .order(daily_entries::date.asc())
        .select((
            daily_entries::date,
            daily_entries::completion_percentage,
            daily_entries::achieved,
        ))
        .load(conn)
        .await
}

pub(crate) fn dashboard_stats(
    today_progress: f64,
    recent_desc: &[f64],
    monthly_statuses: &[String],
    total_savings: f64,
    total_designs: i64,
    completed_study_topics: i64,
) -> DashboardStats {
    let streak = current_streak(recent_desc.iter().copied().map(Some));
    let completed = count_status(monthly_statuses, GoalStatus::Achieved);
    let total = monthly_statuses.len();

    DashboardStats {
        today_progress,
        today_progress_display: display_percent(today_progress),
        current_streak: streak,
        monthly_goals: MonthlyGoals {
            completed,
            total,
            completion_rate: display_percent(completion_rate(completed, total)),
        },
        total_points: total_points(completed, streak, total_savings),
        total_savings,
        total_designs,
        completed_study_topics,
        celebrate: today_progress >= CELEBRATION_THRESHOLD,
    }
}

pub(crate) fn chart_data(
    amounts: Vec<(NaiveDate, f64)>,
    goal_rows: &[(String, String)],
    progress: Vec<(NaiveDate, f64)>,
) -> ChartData {
    let savings_sum: f64 = amounts.iter().map(|(_, a)| a).sum();
    let savings_trend = running_totals(amounts);

    let mut goals_by_category =
        category_rollup(goal_rows.iter().map(|(c, s)| (c.as_str(), s.as_str())));
    for stat in goals_by_category.iter_mut() {
        stat.category = display_category(&stat.category);
    }

    let avg_completion = mean_completion(progress.iter().map(|(_, p)| Some(*p)));
    let total_goals = goals_by_category.iter().map(|s| s.count).sum();
    let completed_goals = goals_by_category.iter().map(|s| s.completed).sum();

    ChartData {
        savings_trend,
        goals_by_category,
        daily_progress: progress
            .into_iter()
            .map(|(date, completion_percentage)| DailyProgressPoint {
                date,
                completion_percentage,
            })
            .collect(),
        summary: QuickSummary {
            savings: savings_sum,
            avg_completion,
            avg_completion_display: display_percent(avg_completion),
            total_goals,
            completed_goals,
        },
    }
}

pub(crate) fn weekly_stats(
    week_start: NaiveDate,
    entries: &[(NaiveDate, f64, bool)],
    today: NaiveDate,
) -> WeeklyStats {
    let percentages: Vec<Option<f64>> = entries.iter().map(|(_, p, _)| Some(*p)).collect();
    let by_day: Vec<(NaiveDate, Option<f64>)> =
        entries.iter().map(|(d, p, _)| (*d, Some(*p))).collect();
    let avg_completion = mean_completion(percentages.iter().copied());

    WeeklyStats {
        total_days: 7,
        completed_days: count_achieved(entries.iter().map(|(_, _, a)| Some(*a))),
        avg_completion,
        avg_completion_display: display_percent(avg_completion),
        streak: trailing_streak(&percentages),
        calendar: week_calendar(week_start, &by_day, today),
    }
}

pub(crate) fn monthly_stats(
    (month_start, month_end): (NaiveDate, NaiveDate),
    entries: &[(NaiveDate, f64, bool)],
    goals_completed: i64,
    total_savings: f64,
) -> MonthlyStats {
    let total_days = days_in_range(month_start, month_end);
    let completed_days = count_achieved(entries.iter().map(|(_, _, a)| Some(*a)));
    let avg_completion = mean_completion(entries.iter().map(|(_, p, _)| Some(*p)));

    MonthlyStats {
        total_days,
        completed_days,
        avg_completion,
        avg_completion_display: display_percent(avg_completion),
        day_completion_rate: display_percent(completion_rate(
            completed_days,
            total_days.max(0) as usize,
        )),
        goals_completed,
        total_savings,
    }
}

// === GET /analytics/summary ===
#[get("/summary")]
pub async fn get_summary_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    log::info!("User {} fetching analytics summary", user_uuid);
    let mut conn = pool.get().await?;

    let statuses = goals::table
        .filter(goals::user_id.eq(user_uuid))
        .select(goals::status)
        .load::<String>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let savings_total = savings_between(&mut conn, user_uuid, None).await?;
    let designs = count_designs(&mut conn, user_uuid).await?;
    let reflection_count = reflections::table
        .filter(reflections::user_id.eq(user_uuid))
        .count()
        .get_result::<i64>(&mut conn)
        .await
        .map_err(ServiceError::from)?;
    let study_done = count_completed_study(&mut conn, user_uuid).await?;
    let health_entries = health_metrics::table
        .filter(health_metrics::user_id.eq(user_uuid))
        .count()
        .get_result::<i64>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(SummaryStats {
        goals_achieved: count_status(&statuses, GoalStatus::Achieved),
        goals_pending: count_status(&statuses, GoalStatus::Pending),
        savings_total,
        designs,
        reflections: reflection_count,
        study_done,
        health_entries,
    }))
}

// === GET /analytics/dashboard ===
#[get("/dashboard")]
pub async fn get_dashboard_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let today = Utc::now().date_naive();
    log::info!("User {} fetching dashboard for {}", user_uuid, today);
    let mut conn = pool.get().await?;

    let today_progress = daily_entries::table
        .filter(daily_entries::user_id.eq(user_uuid))
        .filter(daily_entries::date.eq(today))
        .select(daily_entries::completion_percentage)
        .first::<f64>(&mut conn)
        .await
        .optional()
        .map_err(ServiceError::from)?
        .unwrap_or(0.0);

    let recent_desc = daily_entries::table
        .filter(daily_entries::user_id.eq(user_uuid))
        .filter(daily_entries::date.ge(today - Duration::days(STREAK_WINDOW_DAYS)))
        .order(daily_entries::date.desc())
        .limit(STREAK_WINDOW_DAYS)
        .select(daily_entries::completion_percentage)
        .load::<f64>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let (month_start, _) = month_bounds(today);
    let monthly_statuses = goals::table
        .filter(goals::user_id.eq(user_uuid))
        .filter(goals::archived.eq(false))
        .filter(goals::created_at.ge(start_of_day(month_start)))
        .select(goals::status)
        .load::<String>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let total_savings = savings_between(&mut conn, user_uuid, None).await?;
    let total_designs = count_designs(&mut conn, user_uuid).await?;
    let completed_study_topics = count_completed_study(&mut conn, user_uuid).await?;

    let stats = dashboard_stats(
        today_progress,
        &recent_desc,
        &monthly_statuses,
        total_savings,
        total_designs,
        completed_study_topics,
    );
    log::debug!("Dashboard for user {}: {:?}", user_uuid, stats);
    Ok(HttpResponse::Ok().json(stats))
}

// === GET /analytics/charts ===
#[get("/charts")]
pub async fn get_charts_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
    query: web::Query<TrendQuery>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let window = trend_window(query.days)?;
    let since = Utc::now().date_naive() - Duration::days(window);
    log::info!("User {} fetching charts since {}", user_uuid, since);
    let mut conn = pool.get().await?;

    let amounts = load_amounts_since(&mut conn, user_uuid, since).await?;

    let goal_rows = goals::table
        .filter(goals::user_id.eq(user_uuid))
        .filter(goals::archived.eq(false))
        .order(goals::created_at.asc())
        .select((goals::category, goals::status))
        .load::<(String, String)>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let progress = daily_entries::table
        .filter(daily_entries::user_id.eq(user_uuid))
        .filter(daily_entries::date.ge(since))
        .order(daily_entries::date.asc())
        .select((daily_entries::date, daily_entries::completion_percentage))
        .load::<(NaiveDate, f64)>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(chart_data(amounts, &goal_rows, progress)))
}

// === GET /analytics/overview ===
#[get("/overview")]
pub async fn get_overview_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let today = Utc::now().date_naive();
    log::info!("User {} fetching week/month overview", user_uuid);
    let mut conn = pool.get().await?;

    let week = week_bounds(today);
    let week_entries = load_period(&mut conn, user_uuid, week).await?;

    let month = month_bounds(today);
    let month_entries = load_period(&mut conn, user_uuid, month).await?;

    let goals_completed = goals::table
        .filter(goals::user_id.eq(user_uuid))
        .filter(goals::status.eq(GoalStatus::Achieved.as_str()))
        .filter(goals::updated_at.ge(start_of_day(month.0)))
        .filter(goals::updated_at.lt(start_of_day(month.1 + Duration::days(1))))
        .count()
        .get_result::<i64>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let month_savings = savings_between(&mut conn, user_uuid, Some(month)).await?;

    Ok(HttpResponse::Ok().json(PeriodOverview {
        week: weekly_stats(week.0, &week_entries, today),
        month: monthly_stats(month, &month_entries, goals_completed, month_savings),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::CompletionBand;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn statuses(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dashboard_points_combine_goals_streak_and_savings() {
        let stats = dashboard_stats(
            92.0,
            &[95.0, 80.0, 40.0, 100.0],
            &statuses(&["achieved", "pending", "achieved", "not_achieved"]),
            1250.0,
            3,
            4,
        );
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.monthly_goals.completed, 2);
        assert_eq!(stats.monthly_goals.total, 4);
        assert_eq!(stats.monthly_goals.completion_rate, 50);
        assert_eq!(stats.total_points, 2 * 100 + 2 * 10 + 12);
        assert!(stats.celebrate);
    }

    #[test]
    fn empty_dashboard_is_all_zero() {
        let stats = dashboard_stats(0.0, &[], &[], 0.0, 0, 0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.total_points, 0);
        assert_eq!(stats.monthly_goals.completion_rate, 0);
        assert!(!stats.celebrate);
    }

    #[test]
    fn chart_summary_rolls_up_categories_and_savings() {
        let goal_rows = vec![
            ("health".to_string(), "achieved".to_string()),
            ("career".to_string(), "pending".to_string()),
            ("health".to_string(), "pending".to_string()),
        ];
        let data = chart_data(
            vec![(day(10), 100.0), (day(11), 50.0)],
            &goal_rows,
            vec![(day(10), 60.0), (day(11), 81.0)],
        );

        assert_eq!(data.savings_trend.last().map(|p| p.total), Some(150.0));
        assert_eq!(data.goals_by_category[0].category, "Health");
        assert_eq!(data.goals_by_category[0].count, 2);
        assert_eq!(data.goals_by_category[1].category, "Career");
        assert_eq!(data.summary.savings, 150.0);
        assert_eq!(data.summary.avg_completion_display, 71);
        assert_eq!(data.summary.total_goals, 3);
        assert_eq!(data.summary.completed_goals, 1);
        assert_eq!(data.daily_progress.len(), 2);
    }

    #[test]
    fn week_overview_counts_flags_and_trailing_streak() {
        // 2025-01-13 is a Monday
        let entries = vec![
            (day(13), 50.0, false),
            (day(14), 80.0, true),
            (day(15), 90.0, true),
        ];
        let week = weekly_stats(day(13), &entries, day(15));

        assert_eq!(week.total_days, 7);
        assert_eq!(week.completed_days, 2);
        assert_eq!(week.streak, 2);
        assert_eq!(week.calendar.len(), 7);
        assert_eq!(week.calendar[0].band, CompletionBand::Medium);
        assert_eq!(week.calendar[2].band, CompletionBand::High);
        assert!(week.calendar[2].is_today);
        assert_eq!(week.calendar[6].band, CompletionBand::Empty);
    }

    #[test]
    fn month_overview_uses_calendar_length() {
        let bounds = (day(1), day(31));
        let entries = vec![(day(2), 100.0, true), (day(3), 0.0, false)];
        let month = monthly_stats(bounds, &entries, 5, 300.0);

        assert_eq!(month.total_days, 31);
        assert_eq!(month.completed_days, 1);
        assert_eq!(month.avg_completion, 50.0);
        assert_eq!(month.day_completion_rate, 3);
        assert_eq!(month.goals_completed, 5);
        assert_eq!(month.total_savings, 300.0);
    }

    #[test]
    fn start_of_day_is_midnight_utc() {
        assert_eq!(start_of_day(day(1)).to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
