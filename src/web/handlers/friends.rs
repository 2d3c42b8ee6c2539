//! Friendship handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use crate::friends;
use crate::web::state::SharedState;
use crate::web::utils::{app_error, ok_json, require_identity};

#[derive(Deserialize)]
pub struct AddFriendRequest {
    friend_uid: String,
}

pub async fn list_friends_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match friends::list_friends(&st.store, &me.uid) {
        Ok(list) => ok_json(list),
        Err(e) => app_error(e),
    }
}

pub async fn add_friend_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<AddFriendRequest>,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match friends::add_friend(&st.store, &me.uid, req.friend_uid.trim()) {
        Ok(added) => ok_json(serde_json::json!({ "added": added })),
        Err(e) => app_error(e),
    }
}

pub async fn remove_friend_handler(
    State(state): State<SharedState>,
    Path(friend_uid): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match friends::remove_friend(&st.store, &me.uid, &friend_uid) {
        Ok(()) => ok_json(serde_json::json!({ "removed": true })),
        Err(e) => app_error(e),
    }
}
