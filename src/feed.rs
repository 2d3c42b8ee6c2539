//! Posted links: creation, the feed, and video detection.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::model::{children, Identity, Post, PostRecord, Stats};
use crate::notifications;
use crate::paths;
use crate::store::TreeStore;

/// Create a post and fan out unseen flags to every other user, in one write.
pub fn create_post(store: &TreeStore, author: &Identity, url: &str, now: u64) -> AppResult<Post> {
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::Invalid("url cannot be empty".to_string()));
    }

    let record = PostRecord {
        url: url.to_string(),
        owner: author.author_name().unwrap_or("You").to_string(),
        owner_uid: author.uid.clone(),
        owner_photo_url: author.photo_url.clone().unwrap_or_default(),
        created_at: now,
        stats: Stats::default(),
        notifications: Default::default(),
    };

    let post_id = store.atomic(|txn| {
        let flags = notifications::fan_out(txn, &author.uid)?;
        let mut node = serde_json::to_value(&record)?;
        if let Value::Object(ref mut map) = node {
            if !flags.is_empty() {
                map.insert("notifications".to_string(), Value::Object(flags));
            }
        }
        let key = txn.push(paths::POSTS, node)?;
        Ok::<_, AppError>(key)
    })?;

    crate::tlog!(
        "feed: {} posted {} ({})",
        crate::logging::user_id(&author.uid),
        crate::logging::item_id(&post_id),
        url
    );
    Ok(Post::from_record(&post_id, record))
}

pub fn get_post(store: &TreeStore, post_id: &str) -> AppResult<Post> {
    let node = store
        .get(&paths::post(paths::segment(post_id)?))?
        .ok_or_else(|| AppError::NotFound(format!("post {post_id}")))?;
    let record: PostRecord = serde_json::from_value(node)?;
    Ok(Post::from_record(post_id, record))
}

/// All posts, newest first.
pub fn list_posts(store: &TreeStore) -> AppResult<Vec<Post>> {
    let records: Vec<(String, PostRecord)> = children(store.get(paths::POSTS)?);
    let mut posts: Vec<Post> = records
        .into_iter()
        .map(|(id, record)| Post::from_record(&id, record))
        .collect();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    Ok(posts)
}

/// Posts whose link is a video, newest first.
pub fn list_video_posts(store: &TreeStore) -> AppResult<Vec<Post>> {
    Ok(list_posts(store)?.into_iter().filter(|p| p.is_video).collect())
}

// ---------------------------------------------------------------------------
// Video detection
// ---------------------------------------------------------------------------

static DIRECT_VIDEO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mp4|webm|ogg)$").expect("valid direct video pattern")
});

static YOUTUBE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(embed|v)/([^/?]+)").expect("valid youtube path pattern"));

static YOUTUBE_LOOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .expect("valid youtube pattern")
});

/// Extract the YouTube video id from a watch, short, embed or legacy link.
pub fn youtube_id(link: &str) -> Option<String> {
    if let Ok(parsed) = url::Url::parse(link) {
        let host = parsed.host_str().unwrap_or_default();
        if host == "youtu.be" {
            let id = parsed.path().trim_start_matches('/');
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
        if host.contains("youtube.com") || host.contains("youtube-nocookie.com") {
            if parsed.path() == "/watch" {
                if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
                    return Some(v.into_owned());
                }
            }
            if let Some(caps) = YOUTUBE_PATH.captures(parsed.path()) {
                return Some(caps[2].to_string());
            }
        }
    }
    YOUTUBE_LOOSE
        .captures(link)
        .map(|caps| caps[1].to_string())
}

pub fn is_direct_video(link: &str) -> bool {
    DIRECT_VIDEO.is_match(link)
}

pub fn is_video_link(link: &str) -> bool {
    is_direct_video(link) || youtube_id(link).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{identity, store_with_users};
    use serde_json::json;

    #[test]
    fn create_post_trims_and_zeroes_stats() {
        let store = store_with_users(&["alice"]);
        let alice = identity("alice", Some("Alice"), Some("a@x.test"));
        let post = create_post(&store, &alice, "  https://a.test/page  ", 42).unwrap();
        assert_eq!(post.url, "https://a.test/page");
        assert_eq!(post.owner, "Alice");
        assert_eq!(post.created_at, 42);

        let stats = store.get(&paths::post_stats(&post.id)).unwrap().unwrap();
        assert_eq!(
            stats,
            json!({"likes": 0, "views": 0, "shares": 0, "saves": 0, "comments": 0, "purchases": 0})
        );
        assert_eq!(get_post(&store, &post.id).unwrap().owner_uid, "alice");
    }

    #[test]
    fn owner_name_falls_back_to_email_then_you() {
        let store = store_with_users(&["a"]);
        let p = create_post(&store, &identity("a", None, Some("a@x.test")), "x", 1).unwrap();
        assert_eq!(p.owner, "a@x.test");
        let p = create_post(&store, &identity("a", None, None), "y", 2).unwrap();
        assert_eq!(p.owner, "You");
    }

    #[test]
    fn empty_url_is_rejected() {
        let store = store_with_users(&["a"]);
        let err = create_post(&store, &identity("a", Some("A"), None), "   ", 1).unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }

    #[test]
    fn feed_is_newest_first() {
        let store = store_with_users(&["a"]);
        let a = identity("a", Some("A"), None);
        create_post(&store, &a, "https://old.test", 10).unwrap();
        create_post(&store, &a, "https://new.test", 30).unwrap();
        create_post(&store, &a, "https://mid.test", 20).unwrap();
        let urls: Vec<String> = list_posts(&store).unwrap().into_iter().map(|p| p.url).collect();
        assert_eq!(urls, vec!["https://new.test", "https://mid.test", "https://old.test"]);
    }

    #[test]
    fn missing_post_is_not_found() {
        let store = store_with_users(&[]);
        assert!(matches!(get_post(&store, "nope"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn youtube_links_are_recognised() {
        assert_eq!(youtube_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=1").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_id("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_id("https://youtube.com/v/dQw4w9WgXcQ?x=1").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(youtube_id("https://example.com/watch?v=abc"), None);
    }

    #[test]
    fn direct_video_extensions() {
        assert!(is_direct_video("https://cdn.test/clip.MP4"));
        assert!(is_direct_video("https://cdn.test/clip.webm"));
        assert!(!is_direct_video("https://cdn.test/clip.mp4?x=1"));
        assert!(!is_video_link("https://news.test/story"));
    }

    #[test]
    fn video_reel_filters_feed() {
        let store = store_with_users(&["a"]);
        let a = identity("a", Some("A"), None);
        create_post(&store, &a, "https://news.test/story", 1).unwrap();
        create_post(&store, &a, "https://youtu.be/dQw4w9WgXcQ", 2).unwrap();
        let reel = list_video_posts(&store).unwrap();
        assert_eq!(reel.len(), 1);
        assert!(reel[0].is_video);
    }
}
