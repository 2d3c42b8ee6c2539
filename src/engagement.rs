//! Per-post engagement counters.
//!
//! Each action keeps a membership set under the post (`likers`, `viewers`,
//! ...) and a scalar mirror under `stats`.  The set write and the counter
//! overwrite happen in one store transaction, so the counter always equals
//! the set's cardinality.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::model::{Action, ActionMode, Stats};
use crate::notifications;
use crate::paths;
use crate::store::{is_present, TreeStore, Txn};

#[derive(Debug, Clone, Serialize)]
pub struct EngagementOutcome {
    pub post_id: String,
    pub action: Action,
    /// Whether `uid` is in the set after the call.
    pub active: bool,
    /// Whether this call changed the set.
    pub changed: bool,
    pub count: u64,
}

/// Which actions a user has taken on one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserActions {
    pub liked: bool,
    pub viewed: bool,
    pub shared: bool,
    pub saved: bool,
    pub purchased: bool,
}

fn set_path(post_id: &str, action: Action) -> String {
    format!("{}/{}", paths::post(post_id), action.set_key())
}

fn member_path(post_id: &str, action: Action, uid: &str) -> String {
    format!("{}/{uid}", set_path(post_id, action))
}

fn stat_path(post_id: &str, action: Action) -> String {
    format!("{}/{}", paths::post_stats(post_id), action.stat_key())
}

/// Cardinality of a membership set, counting only present markers.
fn membership_count(txn: &Txn<'_>, path: &str) -> AppResult<u64> {
    Ok(match txn.get(path)? {
        Some(Value::Object(map)) => map.values().filter(|v| is_present(Some(v))).count() as u64,
        _ => 0,
    })
}

/// Apply `action` by `uid` to a post.
///
/// Toggle actions flip membership; monotonic actions record the first time
/// only.  The owner's notification flag is reset when someone else's action
/// changes the set.
pub fn act(
    store: &TreeStore,
    post_id: &str,
    action: Action,
    uid: &str,
    now: u64,
) -> AppResult<EngagementOutcome> {
    if uid.is_empty() {
        return Err(AppError::Unauthorized("sign in to react".to_string()));
    }
    paths::segment(post_id)?;
    paths::segment(uid)?;
    let outcome = store.atomic(|txn| {
        if !txn.exists(&paths::post(post_id))? {
            return Err(AppError::NotFound(format!("post {post_id}")));
        }
        let member = member_path(post_id, action, uid);
        let was_member = is_present(txn.get(&member)?.as_ref());

        let (active, changed) = match (action.mode(), was_member) {
            (ActionMode::Toggle, true) => {
                txn.remove(&member)?;
                (false, true)
            }
            (ActionMode::Toggle, false) => {
                txn.set(&member, json!(true))?;
                (true, true)
            }
            (ActionMode::Monotonic, true) => (true, false),
            (ActionMode::Monotonic, false) => {
                txn.set(&member, json!(now))?;
                (true, true)
            }
        };

        let count = membership_count(txn, &set_path(post_id, action))?;
        txn.set(&stat_path(post_id, action), json!(count))?;
        if changed {
            notifications::flag_owner(txn, post_id, uid)?;
        }
        Ok(EngagementOutcome {
            post_id: post_id.to_string(),
            action,
            active,
            changed,
            count,
        })
    })?;

    if outcome.changed {
        crate::tlog!(
            "engagement: {} {} {} on {} (now {})",
            crate::logging::user_id(uid),
            if outcome.active { "+" } else { "-" },
            action.stat_key(),
            crate::logging::item_id(post_id),
            outcome.count
        );
    }
    Ok(outcome)
}

/// The automatic view registered when a signed-in user opens a post.
pub fn record_view(store: &TreeStore, post_id: &str, uid: &str, now: u64) -> AppResult<u64> {
    Ok(act(store, post_id, Action::Views, uid, now)?.count)
}

pub fn user_actions(store: &TreeStore, post_id: &str, uid: &str) -> AppResult<UserActions> {
    paths::segment(post_id)?;
    let post = store
        .get(&paths::post(post_id))?
        .ok_or_else(|| AppError::NotFound(format!("post {post_id}")))?;
    let has = |action: Action| is_present(post.pointer(&format!("/{}/{uid}", action.set_key())));
    Ok(UserActions {
        liked: has(Action::Likes),
        viewed: has(Action::Views),
        shared: has(Action::Shares),
        saved: has(Action::Saves),
        purchased: has(Action::Purchases),
    })
}

pub fn stats(store: &TreeStore, post_id: &str) -> AppResult<Stats> {
    paths::segment(post_id)?;
    if !store.exists(&paths::post(post_id))? {
        return Err(AppError::NotFound(format!("post {post_id}")));
    }
    Ok(store
        .get(&paths::post_stats(post_id))?
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

/// Rewrite every counter of a post from its membership sets (and comment
/// count).  Repairs posts written by clients that skipped the recount.
pub fn reconcile_stats(store: &TreeStore, post_id: &str) -> AppResult<Stats> {
    paths::segment(post_id)?;
    store.atomic(|txn| {
        if !txn.exists(&paths::post(post_id))? {
            return Err(AppError::NotFound(format!("post {post_id}")));
        }
        let mut stats = Stats {
            comments: txn.child_count(&paths::comments(post_id))?,
            ..Stats::default()
        };
        for action in Action::ALL {
            let count = membership_count(txn, &set_path(post_id, action))?;
            match action {
                Action::Likes => stats.likes = count,
                Action::Views => stats.views = count,
                Action::Shares => stats.shares = count,
                Action::Saves => stats.saves = count,
                Action::Purchases => stats.purchases = count,
            }
        }
        txn.set(&paths::post_stats(post_id), serde_json::to_value(stats)?)?;
        Ok(stats)
    })
}
