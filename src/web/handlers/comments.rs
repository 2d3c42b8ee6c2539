//! Comment and reply handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use crate::comments;
use crate::web::state::SharedState;
use crate::web::utils::{app_error, now_millis, ok_json, optional_identity, require_identity};

#[derive(Deserialize)]
pub struct TextRequest {
    text: String,
}

pub async fn list_comments_handler(
    State(state): State<SharedState>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let viewer = optional_identity(&st, &headers);
    match comments::list_comments(&st.store, &post_id, viewer.as_ref().map(|i| i.uid.as_str())) {
        Ok(list) => ok_json(list),
        Err(e) => app_error(e),
    }
}

pub async fn add_comment_handler(
    State(state): State<SharedState>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<TextRequest>,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match comments::add_comment(&st.store, &post_id, &me, &req.text, now_millis()) {
        Ok(comment) => ok_json(comment),
        Err(e) => app_error(e),
    }
}

pub async fn edit_comment_handler(
    State(state): State<SharedState>,
    Path((post_id, comment_id)): Path<(String, String)>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<TextRequest>,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match comments::edit_comment(&st.store, &post_id, &comment_id, &me.uid, &req.text) {
        Ok(()) => ok_json(serde_json::json!({ "updated": true })),
        Err(e) => app_error(e),
    }
}

pub async fn delete_comment_handler(
    State(state): State<SharedState>,
    Path((post_id, comment_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match comments::delete_comment(&st.store, &post_id, &comment_id, &me.uid) {
        Ok(count) => ok_json(serde_json::json!({ "deleted": true, "comments": count })),
        Err(e) => app_error(e),
    }
}

pub async fn like_comment_handler(
    State(state): State<SharedState>,
    Path((post_id, comment_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match comments::toggle_comment_like(&st.store, &post_id, &comment_id, &me.uid) {
        Ok(outcome) => ok_json(outcome),
        Err(e) => app_error(e),
    }
}

pub async fn add_reply_handler(
    State(state): State<SharedState>,
    Path((post_id, comment_id)): Path<(String, String)>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<TextRequest>,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match comments::add_reply(&st.store, &post_id, &comment_id, &me, &req.text, now_millis()) {
        Ok(reply) => ok_json(reply),
        Err(e) => app_error(e),
    }
}

pub async fn edit_reply_handler(
    State(state): State<SharedState>,
    Path((post_id, comment_id, reply_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<TextRequest>,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match comments::edit_reply(&st.store, &post_id, &comment_id, &reply_id, &me.uid, &req.text) {
        Ok(()) => ok_json(serde_json::json!({ "updated": true })),
        Err(e) => app_error(e),
    }
}

pub async fn delete_reply_handler(
    State(state): State<SharedState>,
    Path((post_id, comment_id, reply_id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match comments::delete_reply(&st.store, &post_id, &comment_id, &reply_id, &me.uid) {
        Ok(()) => ok_json(serde_json::json!({ "deleted": true })),
        Err(e) => app_error(e),
    }
}

pub async fn like_reply_handler(
    State(state): State<SharedState>,
    Path((post_id, comment_id, reply_id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match comments::toggle_reply_like(&st.store, &post_id, &comment_id, &reply_id, &me.uid) {
        Ok(outcome) => ok_json(outcome),
        Err(e) => app_error(e),
    }
}
