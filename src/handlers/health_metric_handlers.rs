use crate::auth_utils::AuthenticatedUser;
use crate::changes::{ChangeFeed, ChangeKind, Table};
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{
    CreateHealthMetricPayload, HealthMetric, HealthMetricMergeChangeset, NewHealthMetric,
};
use crate::schema::health_metrics::{self, dsl::*};
use actix_web::{get, post, web, HttpResponse};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

fn validate_metrics(payload: &CreateHealthMetricPayload) -> Result<(), ServiceError> {
    if let Some(w) = payload.weight {
        if !w.is_finite() || w < 0.0 {
            return Err(ServiceError::BadRequest(
                "weight must be a non-negative number".to_string(),
            ));
        }
    }
    let counts = [
        ("calories", payload.calories),
        ("water_ml", payload.water_ml),
        ("meals", payload.meals),
    ];
    for (field, value) in counts {
        if value.is_some_and(|v| v < 0) {
            return Err(ServiceError::BadRequest(format!(
                "{} cannot be negative",
                field
            )));
        }
    }
    Ok(())
}

fn new_metric(
    user_uuid: Uuid,
    day: NaiveDate,
    payload: &CreateHealthMetricPayload,
) -> NewHealthMetric {
    NewHealthMetric {
        user_id: user_uuid,
        date: day,
        weight: payload.weight,
        calories: payload.calories,
        water_ml: payload.water_ml,
        meals: payload.meals,
    }
}

// === POST /health-metrics ===
// One row per date: a second submission for the same day fills in or
// overwrites only the fields it carries, and answers 200 instead of 201.
#[post("")]
pub async fn record_health_metric_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    payload: web::Json<CreateHealthMetricPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let payload = payload.into_inner();
    validate_metrics(&payload)?;
    log::info!("User {} recording health metrics: {:?}", user_uuid, payload);

    let day = payload.date.unwrap_or_else(|| Utc::now().date_naive());
    let metric = new_metric(user_uuid, day, &payload);
    let merge = HealthMetricMergeChangeset {
        weight: payload.weight,
        calories: payload.calories,
        water_ml: payload.water_ml,
        meals: payload.meals,
        updated_at: Utc::now(),
    };

    let mut conn = pool.get().await?;

    let saved = diesel::insert_into(health_metrics::table)
        .values(&metric)
        .on_conflict((user_id, date))
        .do_update()
        .set(&merge)
        .returning(HealthMetric::as_returning())
        .get_result::<HealthMetric>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let inserted = saved.was_inserted();
    feed.publish(
        user_uuid,
        Table::HealthMetrics,
        ChangeKind::for_upsert(inserted),
    );
    if inserted {
        Ok(HttpResponse::Created().json(saved))
    } else {
        Ok(HttpResponse::Ok().json(saved))
    }
}

// === GET /health-metrics ===
#[get("")]
pub async fn list_health_metrics_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let mut conn = pool.get().await?;

    let rows = health_metrics
        .filter(user_id.eq(user_uuid))
        .order(date.desc())
        .select(HealthMetric::as_select())
        .load::<HealthMetric>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> CreateHealthMetricPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn form_values_map_to_one_row_verbatim() {
        let user_uuid = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2025, 1, 18).unwrap();
        let form = payload(
            r#"{"date":"2025-01-18","weight":70.5,"calories":2000,"water_ml":2000,"meals":3}"#,
        );
        assert!(validate_metrics(&form).is_ok());
        assert_eq!(
            new_metric(user_uuid, day, &form),
            NewHealthMetric {
                user_id: user_uuid,
                date: day,
                weight: Some(70.5),
                calories: Some(2000),
                water_ml: Some(2000),
                meals: Some(3),
            }
        );
    }

    #[test]
    fn omitted_fields_stay_null() {
        let form = payload(r#"{"weight":70.5,"calories":""}"#);
        let metric = new_metric(Uuid::new_v4(), Utc::now().date_naive(), &form);
        assert_eq!(metric.calories, None);
        assert_eq!(metric.water_ml, None);
        assert_eq!(metric.meals, None);
    }

    #[test]
    fn negative_values_are_rejected() {
        assert!(validate_metrics(&payload(r#"{"meals":-1}"#)).is_err());
        assert!(validate_metrics(&payload(r#"{"weight":-70}"#)).is_err());
    }

    #[test]
    fn second_submission_for_a_day_is_an_update() {
        let stamp = Utc::now();
        let mut row = HealthMetric {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 1, 18).unwrap(),
            weight: Some(70.5),
            calories: None,
            water_ml: None,
            meals: None,
            created_at: stamp,
            updated_at: stamp,
        };
        assert_eq!(ChangeKind::for_upsert(row.was_inserted()), ChangeKind::Insert);

        row.updated_at = stamp + chrono::Duration::hours(2);
        assert_eq!(ChangeKind::for_upsert(row.was_inserted()), ChangeKind::Update);
    }
}
