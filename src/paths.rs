//! Tree locations for every entity.  Keeping them in one place keeps the
//! stored layout consistent between writers and readers.

use crate::error::{AppError, AppResult};
use crate::store;

pub const USERS: &str = "users";
pub const POSTS: &str = "messages";
pub const INBOX: &str = "inbox";
pub const USER_INBOX: &str = "user_inbox";
pub const FRIENDS: &str = "friends";
pub const CREDENTIALS: &str = "credentials";
pub const FEATURED_SELLER: &str = "featuredSeller";

/// Accept an externally supplied id only if it is a single tree key.
///
/// Ids arrive percent-decoded from URLs and request bodies, so `a/comments`
/// would otherwise address a different subtree than the caller named.
pub fn segment(id: &str) -> AppResult<&str> {
    store::validate_key(id).map_err(|_| AppError::Invalid(format!("invalid identifier: {id:?}")))?;
    Ok(id)
}

pub fn user(uid: &str) -> String {
    format!("{USERS}/{uid}")
}

pub fn post(post_id: &str) -> String {
    format!("{POSTS}/{post_id}")
}

pub fn post_stats(post_id: &str) -> String {
    format!("{POSTS}/{post_id}/stats")
}

pub fn post_notification(post_id: &str, uid: &str) -> String {
    format!("{POSTS}/{post_id}/notifications/{uid}")
}

pub fn comments(post_id: &str) -> String {
    format!("{POSTS}/{post_id}/comments")
}

pub fn comment(post_id: &str, comment_id: &str) -> String {
    format!("{POSTS}/{post_id}/comments/{comment_id}")
}

pub fn replies(post_id: &str, comment_id: &str) -> String {
    format!("{POSTS}/{post_id}/comments/{comment_id}/replies")
}

pub fn reply(post_id: &str, comment_id: &str, reply_id: &str) -> String {
    format!("{POSTS}/{post_id}/comments/{comment_id}/replies/{reply_id}")
}

pub fn thread(thread_key: &str) -> String {
    format!("{INBOX}/{thread_key}")
}

pub fn mailbox(uid: &str, thread_key: &str) -> String {
    format!("{USER_INBOX}/{uid}/{thread_key}")
}

pub fn friends(uid: &str) -> String {
    format!("{FRIENDS}/{uid}")
}

pub fn credentials(email_key: &str) -> String {
    format!("{CREDENTIALS}/{email_key}")
}
