//! Feed, post and engagement handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use crate::engagement;
use crate::feed;
use crate::model::Action;
use crate::web::state::SharedState;
use crate::web::utils::{app_error, now_millis, ok_json, optional_identity, require_identity};

#[derive(Deserialize)]
pub struct CreatePostRequest {
    url: String,
}

pub async fn list_posts_handler(State(state): State<SharedState>) -> Response {
    let st = state.lock().await;
    match feed::list_posts(&st.store) {
        Ok(posts) => ok_json(posts),
        Err(e) => app_error(e),
    }
}

pub async fn list_videos_handler(State(state): State<SharedState>) -> Response {
    let st = state.lock().await;
    match feed::list_video_posts(&st.store) {
        Ok(posts) => ok_json(posts),
        Err(e) => app_error(e),
    }
}

pub async fn create_post_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<CreatePostRequest>,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match feed::create_post(&st.store, &me, &req.url, now_millis()) {
        Ok(post) => ok_json(post),
        Err(e) => app_error(e),
    }
}

/// One post.  A signed-in caller registers a view and gets back which
/// actions they have taken.
pub async fn get_post_handler(
    State(state): State<SharedState>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let viewer = optional_identity(&st, &headers);
    if let Some(ref me) = viewer {
        if let Err(e) = engagement::record_view(&st.store, &post_id, &me.uid, now_millis()) {
            return app_error(e);
        }
    }
    let post = match feed::get_post(&st.store, &post_id) {
        Ok(p) => p,
        Err(e) => return app_error(e),
    };
    let mine = match viewer {
        Some(me) => match engagement::user_actions(&st.store, &post_id, &me.uid) {
            Ok(a) => Some(a),
            Err(e) => return app_error(e),
        },
        None => None,
    };
    ok_json(serde_json::json!({ "post": post, "my_actions": mine }))
}

pub async fn act_handler(
    State(state): State<SharedState>,
    Path((post_id, action)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let action: Action = match action.parse() {
        Ok(a) => a,
        Err(e) => return app_error(e),
    };
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match engagement::act(&st.store, &post_id, action, &me.uid, now_millis()) {
        Ok(outcome) => ok_json(outcome),
        Err(e) => app_error(e),
    }
}

pub async fn stats_handler(
    State(state): State<SharedState>,
    Path(post_id): Path<String>,
) -> Response {
    let st = state.lock().await;
    match engagement::stats(&st.store, &post_id) {
        Ok(stats) => ok_json(stats),
        Err(e) => app_error(e),
    }
}

pub async fn reconcile_stats_handler(
    State(state): State<SharedState>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    if let Err(resp) = require_identity(&st, &headers) {
        return resp;
    }
    match engagement::reconcile_stats(&st.store, &post_id) {
        Ok(stats) => ok_json(stats),
        Err(e) => app_error(e),
    }
}
