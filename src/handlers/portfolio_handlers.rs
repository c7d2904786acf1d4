use crate::auth_utils::AuthenticatedUser;
use crate::changes::{ChangeFeed, ChangeKind, Table};
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{non_blank, CreatePortfolioItemPayload, NewPortfolioItem, PortfolioItem};
use crate::schema::design_portfolio::{self, dsl::*};
use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

// === POST /portfolio ===
#[post("")]
pub async fn create_portfolio_item_handler(
    pool: web::Data<DbPool>,
    feed: web::Data<ChangeFeed>,
    authenticated_user: AuthenticatedUser,
    payload: web::Json<CreatePortfolioItemPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let payload = payload.into_inner();
    log::info!("User {} adding design: {:?}", user_uuid, payload);

    let Some(item_title) = non_blank(Some(payload.title)) else {
        return Err(ServiceError::BadRequest("title cannot be empty".to_string()));
    };

    let new_item = NewPortfolioItem {
        user_id: user_uuid,
        title: item_title.trim().to_string(),
        tool: non_blank(payload.tool),
        date: payload.date.unwrap_or_else(|| Utc::now().date_naive()),
        external_link: non_blank(payload.external_link),
        file_url: non_blank(payload.file_url),
    };

    let mut conn = pool.get().await?;

    let created = diesel::insert_into(design_portfolio::table)
        .values(&new_item)
        .returning(PortfolioItem::as_returning())
        .get_result::<PortfolioItem>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    feed.publish(user_uuid, Table::DesignPortfolio, ChangeKind::Insert);
    Ok(HttpResponse::Created().json(created))
}

// === GET /portfolio ===
#[get("")]
pub async fn list_portfolio_handler(
    pool: web::Data<DbPool>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let user_uuid = authenticated_user.id;
    let mut conn = pool.get().await?;

    let items = design_portfolio
        .filter(user_id.eq(user_uuid))
        .order((date.desc(), created_at.desc()))
        .select(PortfolioItem::as_select())
        .load::<PortfolioItem>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(items))
}
