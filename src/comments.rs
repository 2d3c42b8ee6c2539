//! Comments and one level of replies under a post.
//!
//! Only the author may edit or delete an entry.  `stats/comments` counts
//! top-level comments and is recounted inside the write that changes them.

use serde::Serialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::model::{children, Comment, CommentRecord, Identity, Reply, ReplyRecord};
use crate::notifications;
use crate::paths;
use crate::store::{is_present, TreeStore, Txn};

pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes: u64,
}

fn clean_text(text: &str) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Invalid("text cannot be empty".to_string()));
    }
    Ok(text.to_string())
}

fn new_entry(author: &Identity, text: String, now: u64) -> ReplyRecord {
    ReplyRecord {
        text,
        user_id: author.uid.clone(),
        user_name: author.author_name().unwrap_or(ANONYMOUS).to_string(),
        user_photo_url: author.photo_url.clone().unwrap_or_default(),
        created_at: now,
        likes: 0,
        likers: Default::default(),
    }
}

fn comment_path(post_id: &str, comment_id: &str) -> AppResult<String> {
    Ok(paths::comment(paths::segment(post_id)?, paths::segment(comment_id)?))
}

fn reply_path(post_id: &str, comment_id: &str, reply_id: &str) -> AppResult<String> {
    Ok(paths::reply(
        paths::segment(post_id)?,
        paths::segment(comment_id)?,
        paths::segment(reply_id)?,
    ))
}

fn require(txn: &Txn<'_>, path: &str, what: &str) -> AppResult<()> {
    if txn.exists(path)? {
        Ok(())
    } else {
        Err(AppError::NotFound(what.to_string()))
    }
}

/// Fail with `Forbidden` unless `uid` wrote the entry at `path`.
fn require_author(txn: &Txn<'_>, path: &str, uid: &str, what: &str) -> AppResult<()> {
    require(txn, path, what)?;
    let author = txn.get(&format!("{path}/userId"))?;
    if author.as_ref().and_then(|v| v.as_str()) != Some(uid) {
        return Err(AppError::Forbidden(format!("only the author can change this {what}")));
    }
    Ok(())
}

fn recount_comments(txn: &mut Txn<'_>, post_id: &str) -> AppResult<u64> {
    let count = txn.child_count(&paths::comments(post_id))?;
    txn.set(&format!("{}/comments", paths::post_stats(post_id)), json!(count))?;
    Ok(count)
}

fn to_reply(id: String, record: ReplyRecord, viewer: Option<&str>) -> Reply {
    let liked_by_me = viewer.is_some_and(|uid| is_present(record.likers.get(uid)));
    Reply {
        id,
        text: record.text,
        user_id: record.user_id,
        user_name: non_blank(record.user_name),
        user_photo_url: record.user_photo_url,
        created_at: record.created_at,
        likes: record.likes,
        liked_by_me,
    }
}

fn with_replies(body: Reply, replies: Vec<Reply>) -> Comment {
    Comment {
        id: body.id,
        text: body.text,
        user_id: body.user_id,
        user_name: body.user_name,
        user_photo_url: body.user_photo_url,
        created_at: body.created_at,
        likes: body.likes,
        liked_by_me: body.liked_by_me,
        replies,
    }
}

fn non_blank(name: String) -> String {
    if name.trim().is_empty() {
        ANONYMOUS.to_string()
    } else {
        name
    }
}

pub fn add_comment(
    store: &TreeStore,
    post_id: &str,
    author: &Identity,
    text: &str,
    now: u64,
) -> AppResult<Comment> {
    paths::segment(post_id)?;
    let text = clean_text(text)?;
    let record = new_entry(author, text, now);
    let id = store.atomic(|txn| {
        require(txn, &paths::post(post_id), "post")?;
        let id = txn.push(&paths::comments(post_id), serde_json::to_value(&record)?)?;
        recount_comments(txn, post_id)?;
        notifications::flag_owner(txn, post_id, &author.uid)?;
        Ok::<_, AppError>(id)
    })?;
    crate::tlog!(
        "comments: {} commented on {}",
        crate::logging::user_id(&author.uid),
        crate::logging::item_id(post_id)
    );
    Ok(with_replies(
        to_reply(id, record, Some(author.uid.as_str())),
        Vec::new(),
    ))
}

pub fn edit_comment(
    store: &TreeStore,
    post_id: &str,
    comment_id: &str,
    uid: &str,
    text: &str,
) -> AppResult<()> {
    let text = clean_text(text)?;
    let path = comment_path(post_id, comment_id)?;
    store.atomic(|txn| {
        require_author(txn, &path, uid, "comment")?;
        txn.set(&format!("{path}/text"), json!(text))?;
        Ok(())
    })
}

/// Delete a comment with its replies; returns the new comment count.
pub fn delete_comment(
    store: &TreeStore,
    post_id: &str,
    comment_id: &str,
    uid: &str,
) -> AppResult<u64> {
    let path = comment_path(post_id, comment_id)?;
    let count = store.atomic(|txn| {
        require_author(txn, &path, uid, "comment")?;
        txn.remove(&path)?;
        recount_comments(txn, post_id)
    })?;
    crate::tlog!(
        "comments: {} deleted {} on {}",
        crate::logging::user_id(uid),
        crate::logging::item_id(comment_id),
        crate::logging::item_id(post_id)
    );
    Ok(count)
}

fn toggle_like_at(store: &TreeStore, path: &str, uid: &str, what: &str) -> AppResult<LikeOutcome> {
    paths::segment(uid)?;
    store.atomic(|txn| {
        require(txn, path, what)?;
        let member = format!("{path}/likers/{uid}");
        let liked = !is_present(txn.get(&member)?.as_ref());
        if liked {
            txn.set(&member, json!(true))?;
        } else {
            txn.remove(&member)?;
        }
        let likes = txn.child_count(&format!("{path}/likers"))?;
        txn.set(&format!("{path}/likes"), json!(likes))?;
        Ok(LikeOutcome { liked, likes })
    })
}

pub fn toggle_comment_like(
    store: &TreeStore,
    post_id: &str,
    comment_id: &str,
    uid: &str,
) -> AppResult<LikeOutcome> {
    toggle_like_at(store, &comment_path(post_id, comment_id)?, uid, "comment")
}

pub fn add_reply(
    store: &TreeStore,
    post_id: &str,
    comment_id: &str,
    author: &Identity,
    text: &str,
    now: u64,
) -> AppResult<Reply> {
    let comment = comment_path(post_id, comment_id)?;
    let text = clean_text(text)?;
    let record = new_entry(author, text, now);
    let id = store.atomic(|txn| {
        require(txn, &comment, "comment")?;
        let id = txn.push(
            &paths::replies(post_id, comment_id),
            serde_json::to_value(&record)?,
        )?;
        Ok::<_, AppError>(id)
    })?;
    Ok(to_reply(id, record, Some(author.uid.as_str())))
}

pub fn edit_reply(
    store: &TreeStore,
    post_id: &str,
    comment_id: &str,
    reply_id: &str,
    uid: &str,
    text: &str,
) -> AppResult<()> {
    let text = clean_text(text)?;
    let path = reply_path(post_id, comment_id, reply_id)?;
    store.atomic(|txn| {
        require_author(txn, &path, uid, "reply")?;
        txn.set(&format!("{path}/text"), json!(text))?;
        Ok(())
    })
}

pub fn delete_reply(
    store: &TreeStore,
    post_id: &str,
    comment_id: &str,
    reply_id: &str,
    uid: &str,
) -> AppResult<()> {
    let path = reply_path(post_id, comment_id, reply_id)?;
    store.atomic(|txn| {
        require_author(txn, &path, uid, "reply")?;
        txn.remove(&path)?;
        Ok(())
    })
}

pub fn toggle_reply_like(
    store: &TreeStore,
    post_id: &str,
    comment_id: &str,
    reply_id: &str,
    uid: &str,
) -> AppResult<LikeOutcome> {
    toggle_like_at(store, &reply_path(post_id, comment_id, reply_id)?, uid, "reply")
}

/// Comments oldest first, each with its replies oldest first.  Ties on
/// `createdAt` fall back to the push key, which is itself time-ordered.
pub fn list_comments(
    store: &TreeStore,
    post_id: &str,
    viewer: Option<&str>,
) -> AppResult<Vec<Comment>> {
    let records: Vec<(String, CommentRecord)> =
        children(store.get(&paths::comments(paths::segment(post_id)?))?);
    let mut comments: Vec<Comment> = records
        .into_iter()
        .map(|(id, record)| {
            let mut replies: Vec<Reply> = record
                .replies
                .into_iter()
                .map(|(rid, r)| to_reply(rid, r, viewer))
                .collect();
            replies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            with_replies(to_reply(id, record.body, viewer), replies)
        })
        .collect();
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(comments)
}
