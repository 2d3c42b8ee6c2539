//! Per-post notification flags.
//!
//! A new post carries `notifications/{uid}: {seen: false}` for every user
//! other than its author.  Engagement by someone else re-flags the owner.
//! Opening the notification list flips flags to seen.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{AppError, AppResult};
use crate::model::{children, PostRecord};
use crate::paths;
use crate::store::{TreeStore, Txn};

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub post_id: String,
    pub url: String,
    pub owner: String,
    pub created_at: u64,
    pub seen: bool,
}

/// Build the unseen-flag map for a new post: every known user except the
/// author.
pub fn fan_out(txn: &Txn<'_>, author_uid: &str) -> AppResult<Map<String, Value>> {
    let mut flags = Map::new();
    for uid in txn.child_keys(paths::USERS)? {
        if uid != author_uid {
            flags.insert(uid, json!({ "seen": false }));
        }
    }
    Ok(flags)
}

/// Mark `post_id` unseen for its owner unless the owner is the actor.
pub fn flag_owner(txn: &mut Txn<'_>, post_id: &str, actor_uid: &str) -> AppResult<bool> {
    let owner = txn
        .get(&format!("{}/ownerUid", paths::post(post_id)))?
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    if owner.is_empty() || owner == actor_uid {
        return Ok(false);
    }
    txn.set(
        &format!("{}/seen", paths::post_notification(post_id, &owner)),
        json!(false),
    )?;
    Ok(true)
}

/// Posts carrying a flag for `uid`, newest first.
pub fn list_notifications(store: &TreeStore, uid: &str) -> AppResult<Vec<Notification>> {
    let posts: Vec<(String, PostRecord)> = children(store.get(paths::POSTS)?);
    let mut out: Vec<Notification> = posts
        .into_iter()
        .filter_map(|(post_id, post)| {
            post.notifications.get(uid).map(|flag| Notification {
                post_id,
                url: post.url.clone(),
                owner: post.owner.clone(),
                created_at: post.created_at,
                seen: flag.seen,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.post_id.cmp(&a.post_id))
    });
    Ok(out)
}

pub fn unseen_count(store: &TreeStore, uid: &str) -> AppResult<u64> {
    Ok(list_notifications(store, uid)?
        .iter()
        .filter(|n| !n.seen)
        .count() as u64)
}

pub fn mark_seen(store: &TreeStore, uid: &str, post_id: &str) -> AppResult<()> {
    let path = paths::post_notification(paths::segment(post_id)?, paths::segment(uid)?);
    store.atomic(|txn| {
        if !txn.exists(&path)? {
            return Err(AppError::NotFound(format!("notification for post {post_id}")));
        }
        txn.set(&format!("{path}/seen"), json!(true))?;
        Ok(())
    })
}

/// Flip every unseen flag for `uid` in one multi-path update.  Returns how
/// many were flipped.
pub fn mark_all_seen(store: &TreeStore, uid: &str) -> AppResult<u64> {
    let unseen: Vec<String> = list_notifications(store, uid)?
        .into_iter()
        .filter(|n| !n.seen)
        .map(|n| n.post_id)
        .collect();
    if unseen.is_empty() {
        return Ok(0);
    }
    let mut entries = Map::new();
    for post_id in &unseen {
        entries.insert(format!("{post_id}/notifications/{uid}/seen"), json!(true));
    }
    store.update(paths::POSTS, entries)?;
    crate::tlog!(
        "notifications: {} marked {} seen",
        crate::logging::user_id(uid),
        unseen.len()
    );
    Ok(unseen.len() as u64)
}
