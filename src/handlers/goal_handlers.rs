use crate::analytics::{completion_rate, display_percent};
use crate::auth_utils::AuthenticatedUser;
use crate::changes::{ChangeFeed, ChangeKind, Table};
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{
    non_blank, CreateGoalPayload, Goal, GoalPriority, GoalProgress, GoalStatus,
    GoalStatusChangeset, GoalStatusResponse, GoalType, NewGoal, UpdateGoalChangeset,
    UpdateGoalPayload, UpdateGoalStatusPayload, DEFAULT_CATEGORY,
};
use crate::progress::{self, DailyExtras};
use crate::schema::goals::{self, dsl::*};
use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
pub struct GoalQueryParams {
    pub status: Option<String>,
    pub search: Option<String>,
    pub include_archived: Option<bool>,
}

fn validate_title(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::BadRequest(
            "Please enter a goal title".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// `all` or absent means no filter; anything else must be a known status.
fn parse_status_filter(raw: Option<&str>) -> Result<Option<&'static str>, ServiceError> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(other) => [
            GoalStatus::Pending,
            GoalStatus::Achieved,
            GoalStatus::NotAchieved,
        ]
        .into_iter()
        .map(|s| s.as_str())
        .find(|s| *s == other)
        .map(Some)
        .ok_or_else(|| ServiceError::BadRequest(format!("Unknown goal status: {}", other))),
    }
}

/// A not-achieved goal must say why. Returns the reason to store.
fn validate_status_change(
    payload: &UpdateGoalStatusPayload,
) -> Result<Option<Option<String>>, ServiceError> {
    match payload.status {
        GoalStatus::NotAchieved => match non_blank(payload.reason.clone()) {
            Some(why) => Ok(Some(Some(why.trim().to_string()))),
            None => Err(ServiceError::BadRequest(
                "A reason is required when a goal is not achieved".to_string(),
            )),
        },
        GoalStatus::Achieved => Ok(None),
        GoalStatus::Pending => Ok(Some(None)),
    }
}

/// Only a move into `achieved` from another status adds to today's progress,
/// so repeating the same request does not count twice.
fn bumps_daily_progress(previous_status: &str, new_status: GoalStatus) -> bool {
    new_status == GoalStatus::Achieved && previous_status != GoalStatus::Achieved.as_str()
}

fn search_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// === POST /goals ===
#[post("")]
pub async fn create_goal_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    payload: web::Json<CreateGoalPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let payload = payload.into_inner();
    log::info!("User {} creating goal: {:?}", user_uuid, payload);

    let new_goal = NewGoal {
        user_id: user_uuid,
        title: validate_title(&payload.title)?,
        goal_type: payload.goal_type.as_str().to_string(),
        category: non_blank(payload.category)
            .map(|c| c.trim().to_string())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        priority: payload
            .priority
            .unwrap_or(GoalPriority::Medium)
            .as_str()
            .to_string(),
        deadline: payload.deadline,
        notes: non_blank(payload.notes),
    };

    let mut conn = pool.get().await?;

    let goal = diesel::insert_into(goals::table)
        .values(&new_goal)
        .returning(Goal::as_returning())
        .get_result::<Goal>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    feed.publish(user_uuid, Table::Goals, ChangeKind::Insert);
    Ok(HttpResponse::Created().json(goal))
}

// === GET /goals ===
#[get("")]
pub async fn list_goals_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
    query: web::Query<GoalQueryParams>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let status_filter = parse_status_filter(query.status.as_deref())?;
    log::info!("User {} listing goals with options: {:?}", user_uuid, query.0);

    let mut conn = pool.get().await?;

    let mut query_builder = goals
        .filter(user_id.eq(user_uuid))
        .select(Goal::as_select())
        .into_boxed();

    if !query.include_archived.unwrap_or(false) {
        query_builder = query_builder.filter(archived.eq(false));
    }
    if let Some(wanted) = status_filter {
        query_builder = query_builder.filter(status.eq(wanted));
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = search_pattern(term);
        query_builder =
            query_builder.filter(title.ilike(pattern.clone()).or(category.ilike(pattern)));
    }

    let goal_list = query_builder
        .order(created_at.desc())
        .load::<Goal>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(goal_list))
}

// === GET /goals/today ===
#[get("/today")]
pub async fn list_today_goals_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let today = Utc::now().date_naive();

    let mut conn = pool.get().await?;

    let today_goals = goals
        .filter(user_id.eq(user_uuid))
        .filter(archived.eq(false))
        .filter(status.eq(GoalStatus::Pending.as_str()))
        .filter(deadline.eq(today).or(goal_type.eq_any(vec![
            GoalType::Daily.as_str(),
            GoalType::Habit.as_str(),
        ])))
        .order(created_at.desc())
        .select(Goal::as_select())
        .load::<Goal>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(today_goals))
}

// === GET /goals/progress ===
#[get("/progress")]
pub async fn goal_progress_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let mut conn = pool.get().await?;

    let statuses = goals
        .filter(user_id.eq(user_uuid))
        .filter(archived.eq(false))
        .select(status)
        .load::<String>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let achieved_count = statuses
        .iter()
        .filter(|s| s.as_str() == GoalStatus::Achieved.as_str())
        .count();

    Ok(HttpResponse::Ok().json(GoalProgress {
        achieved: achieved_count,
        total: statuses.len(),
        percent: display_percent(completion_rate(achieved_count, statuses.len())),
    }))
}

// === POST /goals/archive ===
#[post("/archive")]
pub async fn archive_goals_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    log::info!("User {} archiving all active goals", user_uuid);

    let mut conn = pool.get().await?;

    let archived_count = diesel::update(
        goals
            .filter(user_id.eq(user_uuid))
            .filter(archived.eq(false)),
    )
    .set((archived.eq(true), updated_at.eq(Utc::now())))
    .execute(&mut conn)
    .await
    .map_err(ServiceError::from)?;

    if archived_count > 0 {
        feed.publish(user_uuid, Table::Goals, ChangeKind::Update);
    }
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "All goals have been archived and cleared",
        "count": archived_count
    })))
}

// === POST /goals/restore ===
#[post("/restore")]
pub async fn restore_goals_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    log::info!("User {} restoring archived goals", user_uuid);

    let mut conn = pool.get().await?;

    let restored_count = diesel::update(
        goals
            .filter(user_id.eq(user_uuid))
            .filter(archived.eq(true)),
    )
    .set((
        archived.eq(false),
        status.eq(GoalStatus::Pending.as_str()),
        updated_at.eq(Utc::now()),
    ))
    .execute(&mut conn)
    .await
    .map_err(ServiceError::from)?;

    if restored_count > 0 {
        feed.publish(user_uuid, Table::Goals, ChangeKind::Update);
    }
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "All archived goals have been restored to active status",
        "count": restored_count
    })))
}

// === DELETE /goals/completed ===
#[delete("/completed")]
pub async fn delete_completed_goals_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    log::info!("User {} deleting all completed goals", user_uuid);

    let mut conn = pool.get().await?;

    let deleted_count = diesel::delete(
        goals
            .filter(user_id.eq(user_uuid))
            .filter(status.eq(GoalStatus::Achieved.as_str())),
    )
    .execute(&mut conn)
    .await
    .map_err(ServiceError::from)?;

    if deleted_count > 0 {
        feed.publish(user_uuid, Table::Goals, ChangeKind::Delete);
    }
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "All completed goals have been permanently deleted",
        "count": deleted_count
    })))
}

// === GET /goals/{goal_id_path} ===
#[get("/{goal_id_path}")]
pub async fn get_goal_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
    goal_id_path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let goal_to_find_id = goal_id_path.into_inner();

    let mut conn = pool.get().await?;

    let goal = goals
        .filter(user_id.eq(user_uuid))
        .filter(id.eq(goal_to_find_id))
        .select(Goal::as_select())
        .first::<Goal>(&mut conn)
        .await
        .map_err(|e| ServiceError::not_found_or(e, format!("Goal with id {}", goal_to_find_id)))?;

    Ok(HttpResponse::Ok().json(goal))
}

// === PUT /goals/{goal_id_path} ===
#[put("/{goal_id_path}")]
pub async fn update_goal_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    goal_id_path: web::Path<Uuid>,
    payload: web::Json<UpdateGoalPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let goal_to_update_id = goal_id_path.into_inner();
    let payload = payload.into_inner();
    log::info!(
        "User {} updating goal {} with payload: {:?}",
        user_uuid,
        goal_to_update_id,
        payload
    );

    let goal_changes = UpdateGoalChangeset {
        title: payload.title.as_deref().map(validate_title).transpose()?,
        goal_type: payload.goal_type.map(|t| t.as_str().to_string()),
        category: non_blank(payload.category).map(|c| c.trim().to_string()),
        priority: payload.priority.map(|p| p.as_str().to_string()),
        deadline: payload.deadline,
        notes: payload.notes.map(non_blank),
        updated_at: Some(Utc::now()),
    };

    let mut conn = pool.get().await?;

    let updated_goal = diesel::update(
        goals
            .filter(id.eq(goal_to_update_id))
            .filter(user_id.eq(user_uuid)),
    )
    .set(&goal_changes)
    .returning(Goal::as_returning())
    .get_result::<Goal>(&mut conn)
    .await
    .map_err(|e| ServiceError::not_found_or(e, format!("Goal with id {}", goal_to_update_id)))?;

    feed.publish(user_uuid, Table::Goals, ChangeKind::Update);
    Ok(HttpResponse::Ok().json(updated_goal))
}

// === PUT /goals/{goal_id_path}/status ===
// Achieving a goal also bumps today's daily entry (see progress::next_completion_percentage).
#[put("/{goal_id_path}/status")]
pub async fn update_goal_status_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    goal_id_path: web::Path<Uuid>,
    payload: web::Json<UpdateGoalStatusPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let goal_to_update_id = goal_id_path.into_inner();
    let payload = payload.into_inner();

    // Rejected before any query is issued
    let reason_change = validate_status_change(&payload)?;
    log::info!(
        "User {} setting goal {} to {}",
        user_uuid,
        goal_to_update_id,
        payload.status
    );

    let today = Utc::now().date_naive();
    let new_status = payload.status;
    let mut conn = pool.get().await?;

    let (updated_goal, daily_write) = conn
        .transaction::<_, ServiceError, _>(|conn| {
            async move {
                // Counted before the update so the goal being completed is included
                let total_today_goals = if new_status == GoalStatus::Achieved {
                    progress::count_today_goals(conn, user_uuid, today).await?
                } else {
                    0
                };

                let previous_status = goals
                    .filter(id.eq(goal_to_update_id))
                    .filter(user_id.eq(user_uuid))
                    .select(status)
                    .first::<String>(conn)
                    .await
                    .map_err(|e| {
                        ServiceError::not_found_or(e, format!("Goal with id {}", goal_to_update_id))
                    })?;

                let updated_goal = diesel::update(
                    goals
                        .filter(id.eq(goal_to_update_id))
                        .filter(user_id.eq(user_uuid)),
                )
                .set(&GoalStatusChangeset {
                    status: new_status.as_str().to_string(),
                    reason: reason_change,
                    updated_at: Utc::now(),
                })
                .returning(Goal::as_returning())
                .get_result::<Goal>(conn)
                .await?;

                if !bumps_daily_progress(&previous_status, new_status) {
                    return Ok((updated_goal, None));
                }

                let previous_percentage = progress::find_daily_entry(conn, user_uuid, today)
                    .await?
                    .map(|entry| entry.completion_percentage)
                    .unwrap_or(0.0);
                let next_percentage =
                    progress::next_completion_percentage(previous_percentage, total_today_goals);
                log::info!(
                    "User {} progress for {}: {} -> {} ({} goals today)",
                    user_uuid,
                    today,
                    previous_percentage,
                    next_percentage,
                    total_today_goals
                );

                let write = progress::upsert_daily_entry(
                    conn,
                    user_uuid,
                    today,
                    next_percentage,
                    DailyExtras::default(),
                )
                .await?;

                Ok((updated_goal, Some(write)))
            }
            .scope_boxed()
        })
        .await?;

    feed.publish(user_uuid, Table::Goals, ChangeKind::Update);
    if let Some(write) = &daily_write {
        feed.publish_all(user_uuid, &write.changes());
    }

    Ok(HttpResponse::Ok().json(GoalStatusResponse {
        goal: updated_goal,
        daily_entry: daily_write.map(|write| write.entry),
    }))
}

// === DELETE /goals/{goal_id_path} ===
#[delete("/{goal_id_path}")]
pub async fn delete_goal_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    goal_id_path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let goal_to_delete_id = goal_id_path.into_inner();
    log::info!("User {} deleting goal {}", user_uuid, goal_to_delete_id);

    let mut conn = pool.get().await?;

    let num_deleted = diesel::delete(
        goals
            .filter(user_id.eq(user_uuid))
            .filter(id.eq(goal_to_delete_id)),
    )
    .execute(&mut conn)
    .await
    .map_err(ServiceError::from)?;

    if num_deleted == 0 {
        return Err(ServiceError::NotFound(format!(
            "Goal with id {} not found or not owned by user",
            goal_to_delete_id
        )));
    }

    feed.publish(user_uuid, Table::Goals, ChangeKind::Delete);
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": format!("Goal with id {} deleted successfully", goal_to_delete_id)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    fn status_payload(new_status: GoalStatus, why: Option<&str>) -> UpdateGoalStatusPayload {
        UpdateGoalStatusPayload {
            status: new_status,
            reason: why.map(str::to_string),
        }
    }

    #[test]
    fn not_achieved_without_reason_is_rejected() {
        for why in [None, Some(""), Some("   ")] {
            let err = validate_status_change(&status_payload(GoalStatus::NotAchieved, why))
                .unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn not_achieved_with_reason_stores_it() {
        let change =
            validate_status_change(&status_payload(GoalStatus::NotAchieved, Some(" was ill ")))
                .unwrap();
        assert_eq!(change, Some(Some("was ill".to_string())));
    }

    #[test]
    fn achieved_leaves_reason_untouched_and_pending_clears_it() {
        assert_eq!(
            validate_status_change(&status_payload(GoalStatus::Achieved, None)).unwrap(),
            None
        );
        assert_eq!(
            validate_status_change(&status_payload(GoalStatus::Pending, Some("old"))).unwrap(),
            Some(None)
        );
    }

    #[test]
    fn blank_titles_are_rejected() {
        assert!(validate_title("  ").is_err());
        assert_eq!(validate_title(" Drink 2L water ").unwrap(), "Drink 2L water");
    }

    #[test]
    fn status_filter_accepts_all_and_known_statuses() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(parse_status_filter(Some("all")).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("not_achieved")).unwrap(),
            Some("not_achieved")
        );
        assert!(parse_status_filter(Some("done")).is_err());
    }

    #[test]
    fn search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern("html"), "%html%");
        assert_eq!(search_pattern("100%_done"), "%100\\%\\_done%");
    }

    #[test]
    fn only_a_move_into_achieved_bumps_progress() {
        assert!(bumps_daily_progress("pending", GoalStatus::Achieved));
        assert!(bumps_daily_progress("not_achieved", GoalStatus::Achieved));
        assert!(!bumps_daily_progress("achieved", GoalStatus::Achieved));
        assert!(!bumps_daily_progress("achieved", GoalStatus::Pending));
        assert!(!bumps_daily_progress("pending", GoalStatus::NotAchieved));
    }
}
