mod analytics;
mod auth_utils;
mod changes;
mod config;
mod db;
mod error_handler;
mod handlers;
mod models;
mod progress;
pub mod schema;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpResponse, HttpServer};
use changes::ChangeFeed;
use config::AppConfig;
use db::DbPool;
use std::io;

// Liveness probe: reports whether a pooled connection can be checked out
async fn health_check_handler(
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, error_handler::ServiceError> {
    match pool.get().await {
        Ok(_conn) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "message": "Backend is running and DB pool accessible"
        }))),
        Err(e) => {
            log::error!("Failed to get connection from pool: {:?}", e);
            Err(error_handler::ServiceError::InternalServerError(
                "Failed to check DB pool".to_string(),
            ))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    if cfg!(debug_assertions) {
        match dotenvy::dotenv() {
            Ok(path) => log::info!(".env file loaded from path: {}", path.display()),
            Err(e) => log::warn!(
                "Could not load .env file: {}, using environment variables.",
                e
            ),
        }
    }

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let pool = db::create_pool(&config.database_url, config.db_pool_size)
        .await
        .map_err(|e| {
            log::error!("Failed to create database connection pool: {}", e);
            io::Error::new(io::ErrorKind::Other, e.to_string())
        })?;

    let feed = web::Data::new(ChangeFeed::new(config.change_feed_capacity));

    log::info!("🚀 Ghost Goal Backend Service starting...");
    log::info!(
        "Server will start at http://{}:{}",
        config.host,
        config.port
    );

    let bind_addr = (config.host.clone(), config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_url_prod)
            .allowed_origin(&config.frontend_url_dev)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::HeaderName::from_static("x-user-id"),
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(pool.clone()))
            .app_data(feed.clone())
            .service(web::resource("/health").route(web::get().to(health_check_handler)))
            .service(
                // Literal routes go before the /{id} ones
                web::scope("/goals")
                    .service(handlers::goal_handlers::create_goal_handler)
                    .service(handlers::goal_handlers::list_goals_handler)
                    .service(handlers::goal_handlers::list_today_goals_handler)
                    .service(handlers::goal_handlers::goal_progress_handler)
                    .service(handlers::goal_handlers::archive_goals_handler)
                    .service(handlers::goal_handlers::restore_goals_handler)
                    .service(handlers::goal_handlers::delete_completed_goals_handler)
                    .service(handlers::goal_handlers::get_goal_handler)
                    .service(handlers::goal_handlers::update_goal_handler)
                    .service(handlers::goal_handlers::update_goal_status_handler)
                    .service(handlers::goal_handlers::delete_goal_handler),
            )
            .service(
                web::scope("/daily")
                    .service(handlers::daily_handlers::list_daily_entries_handler)
                    .service(handlers::daily_handlers::get_today_entry_handler)
                    .service(handlers::daily_handlers::upsert_daily_entry_handler),
            )
            .service(
                web::scope("/months").service(handlers::daily_handlers::list_months_handler),
            )
            .service(
                web::scope("/savings")
                    .service(handlers::saving_handlers::create_saving_handler)
                    .service(handlers::saving_handlers::list_savings_handler)
                    .service(handlers::saving_handlers::savings_trend_handler),
            )
            .service(
                web::scope("/health-metrics")
                    .service(handlers::health_metric_handlers::record_health_metric_handler)
                    .service(handlers::health_metric_handlers::list_health_metrics_handler),
            )
            .service(
                web::scope("/study")
                    .service(handlers::study_handlers::create_study_topic_handler)
                    .service(handlers::study_handlers::list_study_topics_handler)
                    .service(handlers::study_handlers::toggle_study_topic_handler)
                    .service(handlers::study_handlers::update_study_notes_handler)
                    .service(handlers::study_handlers::delete_study_topic_handler),
            )
            .service(
                web::scope("/portfolio")
                    .service(handlers::portfolio_handlers::create_portfolio_item_handler)
                    .service(handlers::portfolio_handlers::list_portfolio_handler),
            )
            .service(
                web::scope("/reflections")
                    .service(handlers::reflection_handlers::create_reflection_handler)
                    .service(handlers::reflection_handlers::list_reflections_handler),
            )
            .service(
                web::scope("/profile")
                    .service(handlers::profile_handlers::get_profile_handler)
                    .service(handlers::profile_handlers::upsert_profile_handler),
            )
            .service(
                web::scope("/analytics")
                    .service(handlers::analytics_handlers::get_summary_handler)
                    .service(handlers::analytics_handlers::get_dashboard_handler)
                    .service(handlers::analytics_handlers::get_charts_handler)
                    .service(handlers::analytics_handlers::get_overview_handler),
            )
            .service(
                web::scope("/changes")
                    .service(handlers::change_handlers::subscribe_changes_handler),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
