//! WebSocket change stream.
//!
//! Each connection watches one subtree (`?path=`, default the root) and
//! receives `{"type": "change", "path": ...}` for every committed write that
//! touches it.  Clients re-read the affected snapshot over REST.

use std::sync::atomic::Ordering;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::paths;
use crate::store::{Change, Watch};
use crate::web::config::MAX_WS_CONNECTIONS;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, app_error};

#[derive(Deserialize)]
pub struct WatchQuery {
    path: Option<String>,
}

/// Credentials never leave the server, not even as change paths.
fn is_private(change: &Change) -> bool {
    change.path == paths::CREDENTIALS
        || change
            .path
            .strip_prefix(paths::CREDENTIALS)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Query(params): Query<WatchQuery>,
) -> Response {
    // Check connection limit and subscribe before upgrading
    let (watch, ws_count) = {
        let st = state.lock().await;
        let watch = match st.store.watch(params.path.as_deref().unwrap_or("")) {
            Ok(w) => w,
            Err(e) => return app_error(e.into()),
        };
        (watch, st.ws_connection_count.clone())
    };

    let current = ws_count.load(Ordering::Relaxed);
    if current >= MAX_WS_CONNECTIONS {
        return api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!(
                "too many WebSocket connections (max {})",
                MAX_WS_CONNECTIONS
            ),
        );
    }

    ws.on_upgrade(move |socket| ws_connection(socket, watch, state))
        .into_response()
}

async fn ws_connection(mut socket: WebSocket, mut watch: Watch, state: SharedState) {
    let ws_count = {
        let st = state.lock().await;
        let count = st.ws_connection_count.clone();
        count.fetch_add(1, Ordering::Relaxed);
        count
    };

    loop {
        tokio::select! {
            change = watch.changed() => {
                let Some(change) = change else { break };
                if is_private(&change) {
                    continue;
                }
                let event = serde_json::json!({ "type": "change", "path": change.path });
                if socket.send(WsMessage::Text(event.to_string())).await.is_err() {
                    break; // client disconnected
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = socket.send(WsMessage::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    ws_count.fetch_sub(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_writes_are_private() {
        assert!(is_private(&Change { path: "credentials/abc".into() }));
        assert!(is_private(&Change { path: "credentials".into() }));
        assert!(!is_private(&Change { path: "credentialsx/abc".into() }));
        assert!(!is_private(&Change { path: "users/abc".into() }));
    }
}
