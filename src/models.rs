use crate::analytics::{CalendarDay, CategoryStat, RunningTotal};
use crate::schema::{
    daily_entries, design_portfolio, goals, health_metrics, html_curriculum, months, profiles,
    reflections, savings,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// --- Deserialization helpers for optional / nullable fields ---

// Absent -> None, JSON null -> Some(None), value -> Some(Some(value))
fn deserialize_opt_opt_string<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn deserialize_opt_opt_naivedate<'de, D>(
    deserializer: D,
) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NaiveDate>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText<T> {
    Number(T),
    Text(String),
}

// Form fields arrive as a number, null, or "" when left empty. Empty means NULL, never 0.
fn deserialize_blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match Option::<NumberOrText<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(value)) => Ok(Some(value)),
        Some(NumberOrText::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

// Blank strings are stored as NULL, like the form inputs they come from.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// --- Enumerated text columns ---

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(GoalType {
    Habit => "habit",
    Daily => "daily",
    Weekly => "weekly",
    Project => "project",
});

text_enum!(GoalPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

text_enum!(GoalStatus {
    Pending => "pending",
    Achieved => "achieved",
    NotAchieved => "not_achieved",
});

text_enum!(ReflectionType {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

pub const DEFAULT_CATEGORY: &str = "personal";

// --- Goal Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = goals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub month_id: Option<Uuid>,
    pub title: String,
    #[serde(rename = "type")]
    pub goal_type: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub deadline: Option<NaiveDate>,
    pub archived: bool,
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = goals)]
pub struct NewGoal {
    pub user_id: Uuid,
    pub title: String,
    pub goal_type: String,
    pub category: String,
    pub priority: String,
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = goals)]
pub struct UpdateGoalChangeset {
    pub title: Option<String>,
    pub goal_type: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub deadline: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = goals)]
pub struct GoalStatusChangeset {
    pub status: String,
    pub reason: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

// --- Month Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = months)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Month {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = months)]
pub struct NewMonth {
    pub user_id: Uuid,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

// --- DailyEntry Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = daily_entries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DailyEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub month_id: Uuid,
    pub date: NaiveDate,
    pub completion_percentage: f64,
    pub achieved: bool,
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub wakeup_5am: Option<bool>,
    pub work_block: Option<bool>,
    pub html_study: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyEntry {
    /// True when the last upsert inserted the row. Both timestamps default to
    /// the same `now()` on insert; the conflict branch sets `updated_at`.
    pub fn was_inserted(&self) -> bool {
        self.created_at == self.updated_at
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = daily_entries)]
pub struct NewDailyEntry {
    pub user_id: Uuid,
    pub month_id: Uuid,
    pub date: NaiveDate,
    pub completion_percentage: f64,
    pub achieved: bool,
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub wakeup_5am: Option<bool>,
    pub work_block: Option<bool>,
    pub html_study: Option<bool>,
}

// Applied on (user_id, date) conflict. None fields keep their stored value.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = daily_entries)]
pub struct DailyEntryUpsertChangeset {
    pub month_id: Uuid,
    pub completion_percentage: f64,
    pub achieved: bool,
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub wakeup_5am: Option<bool>,
    pub work_block: Option<bool>,
    pub html_study: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

impl NewDailyEntry {
    pub fn upsert_changeset(&self) -> DailyEntryUpsertChangeset {
        DailyEntryUpsertChangeset {
            month_id: self.month_id,
            completion_percentage: self.completion_percentage,
            achieved: self.achieved,
            notes: self.notes.clone(),
            reason: self.reason.clone(),
            wakeup_5am: self.wakeup_5am,
            work_block: self.work_block,
            html_study: self.html_study,
            updated_at: Utc::now(),
        }
    }
}

// --- Saving Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = savings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Saving {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub amount: f64,
    pub note: Option<String>,
    pub time_recorded: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = savings)]
pub struct NewSaving {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub amount: f64,
    pub note: Option<String>,
    pub time_recorded: Option<NaiveTime>,
}

// --- HealthMetric Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = health_metrics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct HealthMetric {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub weight: Option<f64>,
    pub calories: Option<i32>,
    pub water_ml: Option<i32>,
    pub meals: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HealthMetric {
    pub fn was_inserted(&self) -> bool {
        self.created_at == self.updated_at
    }
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = health_metrics)]
pub struct NewHealthMetric {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub weight: Option<f64>,
    pub calories: Option<i32>,
    pub water_ml: Option<i32>,
    pub meals: Option<i32>,
}

// A second submission for the same date only overwrites the fields it carries.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = health_metrics)]
pub struct HealthMetricMergeChangeset {
    pub weight: Option<f64>,
    pub calories: Option<i32>,
    pub water_ml: Option<i32>,
    pub meals: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

// --- StudyTopic Model (html_curriculum) ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = html_curriculum)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StudyTopic {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic: String,
    pub notes: Option<String>,
    pub completed: bool,
    pub completed_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = html_curriculum)]
pub struct NewStudyTopic {
    pub user_id: Uuid,
    pub topic: String,
    pub notes: Option<String>,
}

#[derive(AsChangeset, Debug, PartialEq)]
#[diesel(table_name = html_curriculum)]
pub struct StudyCompletionChangeset {
    pub completed: bool,
    // Always written: Some(None) clears the date when a topic is reopened
    pub completed_date: Option<Option<NaiveDate>>,
    pub updated_at: DateTime<Utc>,
}

impl StudyCompletionChangeset {
    pub fn toggle(completed: bool, today: NaiveDate) -> Self {
        StudyCompletionChangeset {
            completed,
            completed_date: Some(completed.then_some(today)),
            updated_at: Utc::now(),
        }
    }
}

// --- DesignPortfolioItem Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = design_portfolio)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PortfolioItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub tool: Option<String>,
    pub date: NaiveDate,
    pub external_link: Option<String>,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = design_portfolio)]
pub struct NewPortfolioItem {
    pub user_id: Uuid,
    pub title: String,
    pub tool: Option<String>,
    pub date: NaiveDate,
    pub external_link: Option<String>,
    pub file_url: Option<String>,
}

// --- Reflection Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = reflections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Reflection {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub reflection_type: String,
    pub date: NaiveDate,
    pub content: Option<String>,
    pub wins: Option<String>,
    pub challenges: Option<String>,
    pub prayer_verse: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = reflections)]
pub struct NewReflection {
    pub user_id: Uuid,
    pub reflection_type: String,
    pub date: NaiveDate,
    pub content: Option<String>,
    pub wins: Option<String>,
    pub challenges: Option<String>,
    pub prayer_verse: Option<String>,
}

// --- Profile Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = profiles)]
pub struct ProfileChangeset {
    pub display_name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Default, PartialEq)]
pub struct ProfileResponse {
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        ProfileResponse {
            display_name: profile.display_name,
            phone: profile.phone,
        }
    }
}

// --- PAYLOAD DTOs ---

#[derive(Deserialize, Debug)]
pub struct CreateGoalPayload {
    pub title: String,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub category: Option<String>,
    pub priority: Option<GoalPriority>,
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateGoalPayload {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub goal_type: Option<GoalType>,
    pub category: Option<String>,
    pub priority: Option<GoalPriority>,
    #[serde(deserialize_with = "deserialize_opt_opt_naivedate", default)]
    pub deadline: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "deserialize_opt_opt_string", default)]
    pub notes: Option<Option<String>>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateGoalStatusPayload {
    pub status: GoalStatus,
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpsertDailyEntryPayload {
    pub date: Option<NaiveDate>,
    pub completion_percentage: f64,
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub wakeup_5am: Option<bool>,
    pub work_block: Option<bool>,
    pub html_study: Option<bool>,
}

#[derive(Deserialize, Debug)]
pub struct CreateSavingPayload {
    pub date: Option<NaiveDate>,
    pub amount: f64,
    pub note: Option<String>,
    pub time_recorded: Option<NaiveTime>,
}

#[derive(Deserialize, Debug)]
pub struct CreateHealthMetricPayload {
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_blank_as_none")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_blank_as_none")]
    pub calories: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_blank_as_none")]
    pub water_ml: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_blank_as_none")]
    pub meals: Option<i32>,
}

#[derive(Deserialize, Debug)]
pub struct CreateStudyTopicPayload {
    pub topic: String,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ToggleStudyTopicPayload {
    pub completed: bool,
}

#[derive(Deserialize, Debug)]
pub struct UpdateStudyNotesPayload {
    pub notes: String,
}

#[derive(Deserialize, Debug)]
pub struct CreatePortfolioItemPayload {
    pub title: String,
    pub tool: Option<String>,
    pub date: Option<NaiveDate>,
    pub external_link: Option<String>,
    pub file_url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CreateReflectionPayload {
    #[serde(rename = "type")]
    pub reflection_type: ReflectionType,
    pub date: Option<NaiveDate>,
    pub content: Option<String>,
    pub wins: Option<String>,
    pub challenges: Option<String>,
    pub prayer_verse: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UpsertProfilePayload {
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

// --- Query DTOs ---

#[derive(Deserialize, Debug)]
pub struct DateRangeQuery {
    pub start_date: Option<NaiveDate>, // YYYY-MM-DD, inclusive
    pub end_date: Option<NaiveDate>,   // YYYY-MM-DD, inclusive
}

#[derive(Deserialize, Debug)]
pub struct TrendQuery {
    pub days: Option<i64>,
}

// --- Analytics Models ---

#[derive(Serialize, Debug, PartialEq)]
pub struct GoalProgress {
    pub achieved: usize,
    pub total: usize,
    pub percent: i64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct SummaryStats {
    pub goals_achieved: usize,
    pub goals_pending: usize,
    pub savings_total: f64,
    pub designs: i64,
    pub reflections: i64,
    pub study_done: i64,
    pub health_entries: i64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct MonthlyGoals {
    pub completed: usize,
    pub total: usize,
    pub completion_rate: i64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct DashboardStats {
    pub today_progress: f64,
    pub today_progress_display: i64,
    pub current_streak: usize,
    pub monthly_goals: MonthlyGoals,
    pub total_points: i64,
    pub total_savings: f64,
    pub total_designs: i64,
    pub completed_study_topics: i64,
    pub celebrate: bool,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct DailyProgressPoint {
    pub date: NaiveDate,
    pub completion_percentage: f64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct QuickSummary {
    pub savings: f64,
    pub avg_completion: f64,
    pub avg_completion_display: i64,
    pub total_goals: usize,
    pub completed_goals: usize,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct ChartData {
    pub savings_trend: Vec<RunningTotal>,
    pub goals_by_category: Vec<CategoryStat>,
    pub daily_progress: Vec<DailyProgressPoint>,
    pub summary: QuickSummary,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct SavingsTrend {
    pub points: Vec<RunningTotal>,
    pub total: f64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct WeeklyStats {
    pub total_days: usize,
    pub completed_days: usize,
    pub avg_completion: f64,
    pub avg_completion_display: i64,
    pub streak: usize,
    pub calendar: Vec<CalendarDay>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct MonthlyStats {
    pub total_days: i64,
    pub completed_days: usize,
    pub avg_completion: f64,
    pub avg_completion_display: i64,
    pub day_completion_rate: i64,
    pub goals_completed: i64,
    pub total_savings: f64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct PeriodOverview {
    pub week: WeeklyStats,
    pub month: MonthlyStats,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct GoalStatusResponse {
    pub goal: Goal,
    pub daily_entry: Option<DailyEntry>,
}
