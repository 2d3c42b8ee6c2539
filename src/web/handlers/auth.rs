//! Sign-up, sign-in and session handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;

use crate::auth;
use crate::model::Identity;
use crate::profiles;
use crate::web::state::{AppState, SharedState};
use crate::web::utils::{api_error, app_error, bearer_token, ok_json, require_identity};

#[derive(Deserialize)]
pub struct SignUpRequest {
    email: String,
    password: String,
    display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    email: String,
    password: String,
}

/// Mirror the profile and open a session.
fn establish(st: &mut AppState, identity: Identity) -> Response {
    let profile = match profiles::sync_profile(&st.store, &identity) {
        Ok(p) => p,
        Err(e) => return app_error(e),
    };
    st.sessions.refresh(&identity);
    let token = st.sessions.open(identity);
    crate::tlog!("auth: session opened for {}", crate::logging::user_id(&profile.uid));
    ok_json(serde_json::json!({ "token": token, "user": profile }))
}

pub async fn sign_up_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<SignUpRequest>,
) -> Response {
    let mut st = state.lock().await;
    match auth::sign_up(
        &st.store,
        &req.email,
        &req.password,
        req.display_name.as_deref(),
    ) {
        Ok(identity) => establish(&mut st, identity),
        Err(e) => app_error(e),
    }
}

pub async fn sign_in_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<SignInRequest>,
) -> Response {
    let mut st = state.lock().await;
    match auth::sign_in(&st.store, &req.email, &req.password) {
        Ok(identity) => establish(&mut st, identity),
        Err(e) => app_error(e),
    }
}

/// Accept an identity from the OAuth front end.
pub async fn oauth_handler(
    State(state): State<SharedState>,
    axum::Json(identity): axum::Json<Identity>,
) -> Response {
    let identity = match auth::accept_oauth(identity) {
        Ok(i) => i,
        Err(e) => return app_error(e),
    };
    let mut st = state.lock().await;
    establish(&mut st, identity)
}

pub async fn sign_out_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return api_error(StatusCode::UNAUTHORIZED, "sign in required");
    };
    let mut st = state.lock().await;
    if !st.sessions.close(token) {
        return api_error(StatusCode::UNAUTHORIZED, "unknown session");
    }
    ok_json(serde_json::json!({ "signed_out": true }))
}

pub async fn me_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let me = match require_identity(&st, &headers) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match profiles::profile_or_placeholder(&st.store, &me.uid) {
        Ok(profile) => ok_json(profile),
        Err(e) => app_error(e),
    }
}
