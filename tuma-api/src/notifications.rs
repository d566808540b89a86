use axum::{extract::State, routing::get, Extension, Json, Router};
use tuma_core::repository::NotificationRepository as _;
use tuma_core::{Actor, Notification};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_notifications))
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(state.notifications.list_for_user(actor.user_id).await?))
}
