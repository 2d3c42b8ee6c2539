//! Fixtures shared by unit tests.

use crate::model::Identity;
use crate::profiles::sync_profile;
use crate::store::TreeStore;

pub fn store() -> TreeStore {
    TreeStore::open_in_memory().expect("in-memory store")
}

pub fn identity(uid: &str, name: Option<&str>, email: Option<&str>) -> Identity {
    Identity {
        uid: uid.to_string(),
        display_name: name.map(str::to_string),
        photo_url: None,
        email: email.map(str::to_string),
    }
}

/// A store with synced profiles for each uid (display name = uid).
pub fn store_with_users(uids: &[&str]) -> TreeStore {
    let store = store();
    for uid in uids {
        sync_profile(&store, &identity(uid, Some(uid), None)).expect("sync profile");
    }
    store
}
