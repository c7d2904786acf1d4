use crate::analytics::running_totals;
use crate::auth_utils::AuthenticatedUser;
use crate::changes::{ChangeFeed, ChangeKind, Table};
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{non_blank, CreateSavingPayload, NewSaving, Saving, SavingsTrend, TrendQuery};
use crate::schema::savings::{self, dsl::*};
use actix_web::{get, post, web, HttpResponse};
use chrono::{Duration, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

pub const DEFAULT_TREND_DAYS: i64 = 7;
const MAX_TREND_DAYS: i64 = 366;

fn validate_amount(value: f64) -> Result<f64, ServiceError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ServiceError::BadRequest(
            "amount must be a non-negative number".to_string(),
        ));
    }
    Ok(value)
}

pub(crate) fn trend_window(days: Option<i64>) -> Result<i64, ServiceError> {
    match days.unwrap_or(DEFAULT_TREND_DAYS) {
        d if (1..=MAX_TREND_DAYS).contains(&d) => Ok(d),
        d => Err(ServiceError::BadRequest(format!(
            "days must be between 1 and {}, got {}",
            MAX_TREND_DAYS, d
        ))),
    }
}

/// `(date, amount)` pairs since `since`, oldest first.
pub(crate) async fn load_amounts_since(
    conn: &mut AsyncPgConnection,
    user_uuid: Uuid,
    since: NaiveDate,
) -> QueryResult<Vec<(NaiveDate, f64)>> {
    savings
        .filter(user_id.eq(user_uuid))
        .filter(date.ge(since))
        .order((date.asc(), created_at.asc()))
        .select((date, amount))
        .load::<(NaiveDate, f64)>(conn)
        .await
}

// === POST /savings ===
#[post("")]
pub async fn create_saving_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    payload: web::Json<CreateSavingPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let payload = payload.into_inner();
    log::info!("User {} recording saving: {:?}", user_uuid, payload);

    let now = Utc::now();
    let new_saving = NewSaving {
        user_id: user_uuid,
        date: payload.date.unwrap_or_else(|| now.date_naive()),
        amount: validate_amount(payload.amount)?,
        note: non_blank(payload.note),
        time_recorded: Some(payload.time_recorded.unwrap_or_else(|| now.time())),
    };

    let mut conn = pool.get().await?;

    let created = diesel::insert_into(savings::table)
        .values(&new_saving)
        .returning(Saving::as_returning())
        .get_result::<Saving>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    feed.publish(user_uuid, Table::Savings, ChangeKind::Insert);
    Ok(HttpResponse::Created().json(created))
}

// === GET /savings ===
#[get("")]
pub async fn list_savings_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let mut conn = pool.get().await?;

    let rows = savings
        .filter(user_id.eq(user_uuid))
        .order((date.desc(), created_at.desc()))
        .select(Saving::as_select())
        .load::<Saving>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}

// === GET /savings/trend ===
#[get("/trend")]
pub async fn savings_trend_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
    query: web::Query<TrendQuery>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let window = trend_window(query.days)?;
    let since = Utc::now().date_naive() - Duration::days(window);

    let mut conn = pool.get().await?;
    let amounts = load_amounts_since(&mut conn, user_uuid, since)
        .await
        .map_err(ServiceError::from)?;

    let points = running_totals(amounts);
    let total = points.last().map_or(0.0, |p| p.total);

    Ok(HttpResponse::Ok().json(SavingsTrend { points, total }))
}
