//! Profile mirroring and lookup.

use serde_json::json;

use crate::error::AppResult;
use crate::model::{children, Identity, UserProfile};
use crate::paths;
use crate::store::TreeStore;

pub const UNKNOWN_USER: &str = "Unknown User";

/// Mirror the signed-in identity into `users/{uid}`.  Runs on every sign-in
/// and overwrites whatever was there.
pub fn sync_profile(store: &TreeStore, identity: &Identity) -> AppResult<UserProfile> {
    let profile = UserProfile {
        uid: identity.uid.clone(),
        display_name: identity.author_name().unwrap_or("Unknown").to_string(),
        photo_url: identity.photo_url.clone().unwrap_or_default(),
        email: identity.email.clone().unwrap_or_default(),
    };
    store.set(
        &paths::user(&identity.uid),
        json!({
            "uid": profile.uid,
            "displayName": profile.display_name,
            "photoURL": profile.photo_url,
            "email": profile.email,
        }),
    )?;
    crate::tlog!(
        "profiles: synced {} ({})",
        crate::logging::user_id(&profile.uid),
        profile.display_name
    );
    Ok(profile)
}

pub fn get_profile(store: &TreeStore, uid: &str) -> AppResult<Option<UserProfile>> {
    let node = store.get(&paths::user(paths::segment(uid)?))?;
    Ok(node.and_then(|v| serde_json::from_value::<UserProfile>(v).ok()).map(|mut p| {
        if p.uid.is_empty() {
            p.uid = uid.to_string();
        }
        p
    }))
}

/// Profile for display, with a placeholder for users that never synced.
pub fn profile_or_placeholder(store: &TreeStore, uid: &str) -> AppResult<UserProfile> {
    Ok(match get_profile(store, uid)? {
        Some(mut p) => {
            p.display_name = p.shown_name(UNKNOWN_USER);
            p
        }
        None => UserProfile {
            uid: uid.to_string(),
            display_name: UNKNOWN_USER.to_string(),
            ..UserProfile::default()
        },
    })
}

pub fn list_users(store: &TreeStore) -> AppResult<Vec<UserProfile>> {
    let users: Vec<(String, UserProfile)> = children(store.get(paths::USERS)?);
    Ok(users
        .into_iter()
        .map(|(uid, mut p)| {
            if p.uid.is_empty() {
                p.uid = uid;
            }
            p
        })
        .collect())
}

/// Every user except `uid` (friend discovery).
pub fn list_other_users(store: &TreeStore, uid: &str) -> AppResult<Vec<UserProfile>> {
    Ok(list_users(store)?
        .into_iter()
        .filter(|p| p.uid != uid)
        .map(|mut p| {
            p.display_name = p.shown_name("Unknown");
            p
        })
        .collect())
}
