use crate::auth_utils::AuthenticatedUser;
use crate::changes::{ChangeFeed, ChangeKind, Table};
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{non_blank, CreateReflectionPayload, NewReflection, Reflection, ReflectionType};
use crate::schema::reflections::{self, dsl::*};
use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct ReflectionQuery {
    #[serde(rename = "type")]
    pub kind: Option<ReflectionType>,
}

// === POST /reflections ===
#[post("")]
pub async fn create_reflection_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    payload: web::Json<CreateReflectionPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let payload = payload.into_inner();
    log::info!(
        "User {} adding {} reflection",
        user_uuid,
        payload.reflection_type
    );

    let new_reflection = NewReflection {
        user_id: user_uuid,
        reflection_type: payload.reflection_type.as_str().to_string(),
        date: payload.date.unwrap_or_else(|| Utc::now().date_naive()),
        content: non_blank(payload.content),
        wins: non_blank(payload.wins),
        challenges: non_blank(payload.challenges),
        prayer_verse: non_blank(payload.prayer_verse),
    };

    let mut conn = pool.get().await?;

    let created = diesel::insert_into(reflections::table)
        .values(&new_reflection)
        .returning(Reflection::as_returning())
        .get_result::<Reflection>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    feed.publish(user_uuid, Table::Reflections, ChangeKind::Insert);
    Ok(HttpResponse::Created().json(created))
}

// === GET /reflections ===
#[get("")]
pub async fn list_reflections_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
    query: web::Query<ReflectionQuery>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let mut conn = pool.get().await?;

    let mut query_builder = reflections
        .filter(user_id.eq(user_uuid))
        .select(Reflection::as_select())
        .into_boxed();

    if let Some(kind) = query.kind {
        query_builder = query_builder.filter(reflection_type.eq(kind.as_str()));
    }

    let rows = query_builder
        .order((date.desc(), created_at.desc()))
        .load::<Reflection>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}
