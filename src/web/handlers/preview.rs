//! Link preview endpoint.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;

use crate::preview;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, ok_json};

#[derive(Deserialize)]
pub struct PreviewQuery {
    url: Option<String>,
}

/// Fetch failures answer `200` with `{"error": ...}`; a missing `url`
/// is the only `400`.
pub async fn preview_handler(
    State(state): State<SharedState>,
    Query(params): Query<PreviewQuery>,
) -> Response {
    let url = match params.url.map(|u| u.trim().to_string()) {
        Some(u) if !u.is_empty() => u,
        _ => return api_error(StatusCode::BAD_REQUEST, "Missing url parameter"),
    };

    // Short lock: serve from cache when possible
    {
        let st = state.lock().await;
        if let Some(cached) = st.previews.get(&url) {
            return ok_json(cached.clone());
        }
    }

    // Blocking fetch, no lock held
    let fetch_url = url.clone();
    let fetched = tokio::task::spawn_blocking(move || preview::fetch_preview(&fetch_url))
        .await
        .unwrap_or_else(|e| Err(format!("preview task failed: {e}")));

    match fetched {
        Ok(p) => {
            state.lock().await.previews.insert(url, p.clone());
            ok_json(p)
        }
        Err(message) => {
            crate::tlog!("preview: {} ({})", message, url);
            ok_json(serde_json::json!({ "error": message }))
        }
    }
}
