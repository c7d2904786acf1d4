use crate::auth_utils::AuthenticatedUser;
use crate::changes::ChangeFeed;
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{non_blank, DailyEntry, DateRangeQuery, Month, UpsertDailyEntryPayload};
use crate::progress::{self, DailyExtras};
use crate::schema::{daily_entries, months};
use actix_web::{get, put, web, HttpResponse};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};

pub(crate) fn validate_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), ServiceError> {
    match (start, end) {
        (Some(s), Some(e)) if s > e => Err(ServiceError::BadRequest(
            "start_date cannot be after end_date".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_percentage(value: f64) -> Result<f64, ServiceError> {
    if !value.is_finite() {
        return Err(ServiceError::BadRequest(
            "completion_percentage must be a number".to_string(),
        ));
    }
    Ok(progress::clamp_percentage(value))
}

// === GET /daily ===
#[get("")]
pub async fn list_daily_entries_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
    query: web::Query<DateRangeQuery>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    validate_range(query.start_date, query.end_date)?;
    log::info!("User {} listing daily entries: {:?}", user_uuid, query.0);

    let mut conn = pool.get().await?;

    let mut query_builder = daily_entries::table
        .filter(daily_entries::user_id.eq(user_uuid))
        .select(DailyEntry::as_select())
        .into_boxed();

    if let Some(from) = query.start_date {
        query_builder = query_builder.filter(daily_entries::date.ge(from));
    }
    if let Some(to) = query.end_date {
        query_builder = query_builder.filter(daily_entries::date.le(to));
    }

    let entries = query_builder
        .order(daily_entries::date.asc())
        .load::<DailyEntry>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(entries))
}

// === GET /daily/today ===
#[get("/today")]
pub async fn get_today_entry_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let mut conn = pool.get().await?;

    // No entry yet simply means 0% so far
    let entry = progress::find_daily_entry(&mut conn, user_uuid, Utc::now().date_naive())
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(entry))
}

// === PUT /daily ===
#[put("")]
pub async fn upsert_daily_entry_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    payload: web::Json<UpsertDailyEntryPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let payload = payload.into_inner();
    let percentage = validate_percentage(payload.completion_percentage)?;
    let day = payload.date.unwrap_or_else(|| Utc::now().date_naive());
    log::info!(
        "User {} recording {}% for {}",
        user_uuid,
        percentage,
        day
    );

    let extras = DailyExtras {
        notes: non_blank(payload.notes),
        reason: non_blank(payload.reason),
        wakeup_5am: payload.wakeup_5am,
        work_block: payload.work_block,
        html_study: payload.html_study,
    };

    let mut conn = pool.get().await?;

    let write = conn
        .transaction::<_, ServiceError, _>(|conn| {
            async move {
                Ok(progress::upsert_daily_entry(conn, user_uuid, day, percentage, extras).await?)
            }
            .scope_boxed()
        })
        .await?;

    feed.publish_all(user_uuid, &write.changes());
    if write.entry.was_inserted() {
        Ok(HttpResponse::Created().json(write.entry))
    } else {
        Ok(HttpResponse::Ok().json(write.entry))
    }
}

// === GET /months ===
#[get("")]
pub async fn list_months_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let mut conn = pool.get().await?;

    let month_list = months::table
        .filter(months::user_id.eq(user_uuid))
        .order(months::start_date.desc())
        .select(Month::as_select())
        .load::<Month>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(month_list))
}
