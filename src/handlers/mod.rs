pub mod analytics_handlers;
pub mod change_handlers;
pub mod daily_handlers;
pub mod goal_handlers;
pub mod health_metric_handlers;
pub mod portfolio_handlers;
pub mod profile_handlers;
pub mod reflection_handlers;
pub mod saving_handlers;
pub mod study_handlers;
