//! Profile lookup handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use crate::profiles;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, app_error, ok_json, require_identity};

/// Everyone except the caller (friend discovery).
pub async fn list_users_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match profiles::list_other_users(&st.store, &me.uid) {
        Ok(users) => ok_json(users),
        Err(e) => app_error(e),
    }
}

pub async fn get_user_handler(
    State(state): State<SharedState>,
    Path(uid): Path<String>,
) -> Response {
    let st = state.lock().await;
    match profiles::get_profile(&st.store, &uid) {
        Ok(Some(profile)) => ok_json(profile),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => app_error(e),
    }
}
