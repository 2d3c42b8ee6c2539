//! Symmetric friendships stored as `friends/{uid}/{friendUid}: true`.

use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::model::UserProfile;
use crate::paths;
use crate::profiles;
use crate::store::{is_present, TreeStore};

fn edge_entries(uid: &str, friend_uid: &str, value: Value) -> Map<String, Value> {
    let mut entries = Map::new();
    entries.insert(format!("{uid}/{friend_uid}"), value.clone());
    entries.insert(format!("{friend_uid}/{uid}"), value);
    entries
}

/// Befriend `friend_uid`; both directions land in one update.  Returns
/// `false` when the two were already friends.
pub fn add_friend(store: &TreeStore, uid: &str, friend_uid: &str) -> AppResult<bool> {
    paths::segment(uid)?;
    paths::segment(friend_uid)?;
    if uid == friend_uid {
        return Err(AppError::Invalid("cannot befriend yourself".to_string()));
    }
    let added = store.atomic(|txn| {
        if !txn.exists(&paths::user(friend_uid))? {
            return Err(AppError::NotFound(format!("user {friend_uid}")));
        }
        let forward = format!("{}/{friend_uid}", paths::friends(uid));
        let backward = format!("{}/{uid}", paths::friends(friend_uid));
        if is_present(txn.get(&forward)?.as_ref()) && is_present(txn.get(&backward)?.as_ref()) {
            return Ok(false);
        }
        txn.update(paths::FRIENDS, edge_entries(uid, friend_uid, Value::Bool(true)))?;
        Ok(true)
    })?;
    if added {
        crate::tlog!(
            "friends: {} <-> {}",
            crate::logging::user_id(uid),
            crate::logging::user_id(friend_uid)
        );
    }
    Ok(added)
}

pub fn remove_friend(store: &TreeStore, uid: &str, friend_uid: &str) -> AppResult<()> {
    paths::segment(uid)?;
    paths::segment(friend_uid)?;
    store.update(paths::FRIENDS, edge_entries(uid, friend_uid, Value::Null))?;
    Ok(())
}

pub fn are_friends(store: &TreeStore, uid: &str, other: &str) -> AppResult<bool> {
    paths::segment(uid)?;
    paths::segment(other)?;
    Ok(is_present(
        store
            .get(&format!("{}/{other}", paths::friends(uid)))?
            .as_ref(),
    ))
}

/// Profiles of `uid`'s friends.  Friends whose profile has neither a name nor
/// an e-mail are left out.
pub fn list_friends(store: &TreeStore, uid: &str) -> AppResult<Vec<UserProfile>> {
    let mut out = Vec::new();
    let Some(Value::Object(edges)) = store.get(&paths::friends(uid))? else {
        return Ok(out);
    };
    for (friend_uid, marker) in edges {
        if !is_present(Some(&marker)) {
            continue;
        }
        if let Some(profile) = profiles::get_profile(store, &friend_uid)? {
            if !profile.shown_name("").is_empty() {
                out.push(profile);
            }
        }
    }
    out.sort_by(|a, b| a.shown_name("").to_lowercase().cmp(&b.shown_name("").to_lowercase()));
    Ok(out)
}
