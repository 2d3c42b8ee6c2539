//! Leaderboard handlers.

use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::leaderboard::{self, DEFAULT_LIMIT};
use crate::web::state::SharedState;
use crate::web::utils::{app_error, ok_json};

const MAX_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

pub async fn top_selling_handler(
    State(state): State<SharedState>,
    Query(params): Query<LimitQuery>,
) -> Response {
    let st = state.lock().await;
    match leaderboard::top_selling(&st.store, params.limit()) {
        Ok(posts) => ok_json(posts),
        Err(e) => app_error(e),
    }
}

pub async fn most_engaged_handler(
    State(state): State<SharedState>,
    Query(params): Query<LimitQuery>,
) -> Response {
    let st = state.lock().await;
    match leaderboard::most_engaged(&st.store, params.limit()) {
        Ok(posts) => ok_json(posts),
        Err(e) => app_error(e),
    }
}

/// Recompute the featured seller; `null` when nobody has posted.
pub async fn featured_seller_handler(State(state): State<SharedState>) -> Response {
    let st = state.lock().await;
    match leaderboard::featured_seller(&st.store) {
        Ok(seller) => ok_json(seller),
        Err(e) => app_error(e),
    }
}
