//! Notification handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;

use crate::notifications;
use crate::web::state::SharedState;
use crate::web::utils::{app_error, ok_json, require_identity};

pub async fn list_notifications_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match notifications::list_notifications(&st.store, &me.uid) {
        Ok(list) => {
            let unseen = list.iter().filter(|n| !n.seen).count();
            ok_json(serde_json::json!({ "unseen": unseen, "notifications": list }))
        }
        Err(e) => app_error(e),
    }
}

pub async fn mark_seen_handler(
    State(state): State<SharedState>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match notifications::mark_seen(&st.store, &me.uid, &post_id) {
        Ok(()) => ok_json(serde_json::json!({ "seen": true })),
        Err(e) => app_error(e),
    }
}

pub async fn mark_all_seen_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match notifications::mark_all_seen(&st.store, &me.uid) {
        Ok(marked) => ok_json(serde_json::json!({ "marked": marked })),
        Err(e) => app_error(e),
    }
}
