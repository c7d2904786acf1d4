use crate::auth_utils::AuthenticatedUser;
use crate::changes::{event_stream, parse_tables, ChangeFeed, ChangeFilter};
use crate::error_handler::ServiceError;
use actix_web::http::header;
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct ChangesQuery {
    pub tables: Option<String>, // comma separated, e.g. "goals,daily_entries"
}

// === GET /changes ===
// Server-sent events scoped to the caller. Each frame only says what changed;
// clients refetch the affected collection.
#[get("")]
pub async fn subscribe_changes_handler(
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    query: web::Query<ChangesQuery>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let tables = parse_tables(query.tables.as_deref()).map_err(ServiceError::BadRequest)?;
    log::info!(
        "User {} subscribing to changes (tables: {:?})",
        user_uuid,
        tables
    );

    let filter = ChangeFilter {
        user_id: user_uuid,
        tables,
    };

    let receiver = feed.subscribe();
    log::debug!("{} change subscribers connected", feed.subscriber_count());

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(event_stream(receiver, filter)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_utils::USER_ID_HEADER;
    use crate::changes::{ChangeKind, Table};
    use actix_web::{test, App};
    use uuid::Uuid;

    #[actix_web::test]
    async fn unknown_table_is_a_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ChangeFeed::new(8)))
                .service(web::scope("/changes").service(subscribe_changes_handler)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/changes?tables=goals,users")
            .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn missing_user_header_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ChangeFeed::new(8)))
                .service(web::scope("/changes").service(subscribe_changes_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/changes").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn subscription_opens_an_event_stream() {
        let feed = web::Data::new(ChangeFeed::new(8));
        let app = test::init_service(
            App::new()
                .app_data(feed.clone())
                .service(web::scope("/changes").service(subscribe_changes_handler)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/changes?tables=goals")
            .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        assert_eq!(feed.subscriber_count(), 1);
        feed.publish(Uuid::new_v4(), Table::Goals, ChangeKind::Insert);
    }
}
