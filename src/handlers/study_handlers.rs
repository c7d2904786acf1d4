use crate::auth_utils::AuthenticatedUser;
use crate::changes::{ChangeFeed, ChangeKind, Table};
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{
    non_blank, CreateStudyTopicPayload, NewStudyTopic, StudyCompletionChangeset, StudyTopic,
    ToggleStudyTopicPayload, UpdateStudyNotesPayload,
};
use crate::schema::html_curriculum::{self, dsl::*};
use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::json;
use uuid::Uuid;

// === POST /study ===
#[post("")]
pub async fn create_study_topic_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    payload: web::Json<CreateStudyTopicPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let payload = payload.into_inner();

    let Some(topic_name) = non_blank(Some(payload.topic)) else {
        return Err(ServiceError::BadRequest("topic cannot be empty".to_string()));
    };

    let mut conn = pool.get().await?;

    let created = diesel::insert_into(html_curriculum::table)
        .values(&NewStudyTopic {
            user_id: user_uuid,
            topic: topic_name.trim().to_string(),
            notes: non_blank(payload.notes),
        })
        .returning(StudyTopic::as_returning())
        .get_result::<StudyTopic>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    feed.publish(user_uuid, Table::HtmlCurriculum, ChangeKind::Insert);
    Ok(HttpResponse::Created().json(created))
}

// === GET /study ===
#[get("")]
pub async fn list_study_topics_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let mut conn = pool.get().await?;

    let topics = html_curriculum
        .filter(user_id.eq(user_uuid))
        .order(created_at.asc())
        .select(StudyTopic::as_select())
        .load::<StudyTopic>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(topics))
}

// === PUT /study/{topic_id_path}/completed ===
#[put("/{topic_id_path}/completed")]
pub async fn toggle_study_topic_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    topic_id_path: web::Path<Uuid>,
    payload: web::Json<ToggleStudyTopicPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let topic_id = topic_id_path.into_inner();
    log::info!(
        "User {} marking topic {} completed={}",
        user_uuid,
        topic_id,
        payload.completed
    );

    let changes = StudyCompletionChangeset::toggle(payload.completed, Utc::now().date_naive());
    let mut conn = pool.get().await?;

    let updated = diesel::update(
        html_curriculum
            .filter(id.eq(topic_id))
            .filter(user_id.eq(user_uuid)),
    )
    .set(&changes)
    .returning(StudyTopic::as_returning())
    .get_result::<StudyTopic>(&mut conn)
    .await
    .map_err(|e| ServiceError::not_found_or(e, format!("Study topic with id {}", topic_id)))?;

    feed.publish(user_uuid, Table::HtmlCurriculum, ChangeKind::Update);
    Ok(HttpResponse::Ok().json(updated))
}

// === PUT /study/{topic_id_path}/notes ===
#[put("/{topic_id_path}/notes")]
pub async fn update_study_notes_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    topic_id_path: web::Path<Uuid>,
    payload: web::Json<UpdateStudyNotesPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let topic_id = topic_id_path.into_inner();
    let new_notes = non_blank(Some(payload.into_inner().notes));

    let mut conn = pool.get().await?;

    let updated = diesel::update(
        html_curriculum
            .filter(id.eq(topic_id))
            .filter(user_id.eq(user_uuid)),
    )
    .set((notes.eq(new_notes), updated_at.eq(Utc::now())))
    .returning(StudyTopic::as_returning())
    .get_result::<StudyTopic>(&mut conn)
    .await
    .map_err(|e| ServiceError::not_found_or(e, format!("Study topic with id {}", topic_id)))?;

    feed.publish(user_uuid, Table::HtmlCurriculum, ChangeKind::Update);
    Ok(HttpResponse::Ok().json(updated))
}

// === DELETE /study/{topic_id_path} ===
#[delete("/{topic_id_path}")]
pub async fn delete_study_topic_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    topic_id_path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let topic_id = topic_id_path.into_inner();
    let mut conn = pool.get().await?;

    let num_deleted = diesel::delete(
        html_curriculum
            .filter(id.eq(topic_id))
            .filter(user_id.eq(user_uuid)),
    )
    .execute(&mut conn)
    .await
    .map_err(ServiceError::from)?;

    if num_deleted == 0 {
        return Err(ServiceError::NotFound(format!(
            "Study topic with id {} not found or not owned by user",
            topic_id
        )));
    }

    feed.publish(user_uuid, Table::HtmlCurriculum, ChangeKind::Delete);
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": format!("Study topic with id {} deleted successfully", topic_id)
    })))
}
