//! Direct message handlers.  Threads are addressed by the partner's uid;
//! the thread key is derived from the caller and the partner.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use crate::chat;
use crate::web::state::SharedState;
use crate::web::utils::{app_error, now_millis, ok_json, require_identity};

#[derive(Deserialize)]
pub struct SendMessageRequest {
    text: String,
    reply_to: Option<String>,
}

pub async fn list_conversations_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match chat::list_conversations(&st.store, &me.uid) {
        Ok(list) => ok_json(list),
        Err(e) => app_error(e),
    }
}

pub async fn unread_count_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match chat::unread_count(&st.store, &me.uid) {
        Ok(count) => ok_json(serde_json::json!({ "unread": count })),
        Err(e) => app_error(e),
    }
}

pub async fn get_thread_handler(
    State(state): State<SharedState>,
    Path(partner): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    let result = chat::thread_key(&me.uid, &partner)
        .and_then(|key| chat::list_thread(&st.store, &key, &me.uid).map(|m| (key, m)));
    match result {
        Ok((key, messages)) => ok_json(serde_json::json!({
            "thread_key": key,
            "messages": messages,
        })),
        Err(e) => app_error(e),
    }
}

pub async fn send_message_handler(
    State(state): State<SharedState>,
    Path(partner): Path<String>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<SendMessageRequest>,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match chat::send_message(
        &st.store,
        &me,
        &partner,
        &req.text,
        req.reply_to.as_deref(),
        now_millis(),
    ) {
        Ok(message) => ok_json(message),
        Err(e) => app_error(e),
    }
}

pub async fn mark_read_handler(
    State(state): State<SharedState>,
    Path(partner): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    let result = chat::thread_key(&me.uid, &partner)
        .and_then(|key| chat::mark_thread_read(&st.store, &key, &me.uid));
    match result {
        Ok(marked) => ok_json(serde_json::json!({ "marked": marked })),
        Err(e) => app_error(e),
    }
}

pub async fn mailbox_handler(
    State(state): State<SharedState>,
    Path(partner): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    let result = chat::thread_key(&me.uid, &partner)
        .and_then(|key| chat::list_mailbox(&st.store, &me.uid, &key));
    match result {
        Ok(entries) => {
            let body: Vec<serde_json::Value> = entries
                .into_iter()
                .map(|(id, m)| {
                    serde_json::json!({
                        "id": id,
                        "sender": m.sender,
                        "text": m.text,
                        "timestamp": m.timestamp,
                        "read": m.read,
                    })
                })
                .collect();
            ok_json(body)
        }
        Err(e) => app_error(e),
    }
}
