use crate::auth_utils::AuthenticatedUser;
use crate::changes::{ChangeFeed, ChangeKind, Table};
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{
    non_blank, NewProfile, Profile, ProfileChangeset, ProfileResponse, UpsertProfilePayload,
};
use crate::schema::profiles::{self, dsl::*};
use actix_web::{get, put, web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

// === GET /profile ===
#[get("")]
pub async fn get_profile_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let mut conn = pool.get().await?;

    // A user without a profile row yet gets empty fields, not a 404
    let profile = profiles
        .filter(user_id.eq(user_uuid))
        .select(Profile::as_select())
        .first::<Profile>(&mut conn)
        .await
        .optional()
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(profile.map(ProfileResponse::from).unwrap_or_default()))
}

// === PUT /profile ===
#[put("")]
pub async fn upsert_profile_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    payload: web::Json<UpsertProfilePayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let payload = payload.into_inner();
    log::info!("User {} updating profile", user_uuid);

    let new_profile = NewProfile {
        user_id: user_uuid,
        display_name: non_blank(payload.display_name),
        phone: non_blank(payload.phone),
    };
    let changes = ProfileChangeset {
        display_name: Some(new_profile.display_name.clone()),
        phone: Some(new_profile.phone.clone()),
        updated_at: Utc::now(),
    };

    let mut conn = pool.get().await?;

    let saved = diesel::insert_into(profiles::table)
        .values(&new_profile)
        .on_conflict(user_id)
        .do_update()
        .set(&changes)
        .returning(Profile::as_returning())
        .get_result::<Profile>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    feed.publish(user_uuid, Table::Profiles, ChangeKind::Update);
    Ok(HttpResponse::Ok().json(ProfileResponse::from(saved)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_profile_serializes_as_empty_fields() {
        let body = serde_json::to_value(ProfileResponse::default()).unwrap();
        assert_eq!(body, serde_json::json!({ "display_name": null, "phone": null }));
    }

    #[test]
    fn blank_fields_are_stored_as_null() {
        let payload: UpsertProfilePayload =
            serde_json::from_str(r#"{"display_name":"Ama","phone":"  "}"#).unwrap();
        assert_eq!(non_blank(payload.display_name), Some("Ama".to_string()));
        assert_eq!(non_blank(payload.phone), None);
    }
}
