//! Aggregates over post stats: best sellers, the featured seller, and the
//! most engaged posts.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use crate::error::AppResult;
use crate::feed;
use crate::model::{Post, Stats};
use crate::paths;
use crate::profiles;
use crate::store::TreeStore;

pub const DEFAULT_LIMIT: usize = 5;

/// Avatar used when the featured seller never set a photo.
const AVATAR_FALLBACK: &str = "https://api.dicebear.com/7.x/thumbs/svg?seed=";

#[derive(Debug, Clone, Serialize)]
pub struct FeaturedSeller {
    pub uid: String,
    pub display_name: String,
    pub photo_url: String,
    pub totals: Stats,
    pub score: u64,
}

/// Posts with at least one purchase, most purchased first.
pub fn top_selling(store: &TreeStore, limit: usize) -> AppResult<Vec<Post>> {
    let mut posts: Vec<Post> = feed::list_posts(store)?
        .into_iter()
        .filter(|p| !p.url.is_empty() && p.stats.purchases > 0)
        .collect();
    // Stable sort keeps newest-first among equal sales.
    posts.sort_by(|a, b| b.stats.purchases.cmp(&a.stats.purchases));
    posts.truncate(limit);
    Ok(posts)
}

/// Posts ranked by total engagement.
pub fn most_engaged(store: &TreeStore, limit: usize) -> AppResult<Vec<Post>> {
    let mut posts = feed::list_posts(store)?;
    posts.sort_by(|a, b| b.stats.engagement().cmp(&a.stats.engagement()));
    posts.truncate(limit);
    Ok(posts)
}

/// Sum stats per owner, pick the highest score, record it at
/// `featuredSeller` and return it.  `None` when nobody has posted.
pub fn featured_seller(store: &TreeStore) -> AppResult<Option<FeaturedSeller>> {
    let mut totals: BTreeMap<String, Stats> = BTreeMap::new();
    for post in feed::list_posts(store)? {
        if post.owner_uid.is_empty() {
            continue;
        }
        totals.entry(post.owner_uid).or_default().accumulate(&post.stats);
    }

    // Ties go to the smallest uid so the choice is deterministic.
    let Some((uid, stats)) = totals
        .into_iter()
        .max_by(|(ua, a), (ub, b)| a.engagement().cmp(&b.engagement()).then_with(|| ub.cmp(ua)))
    else {
        return Ok(None);
    };

    store.set(paths::FEATURED_SELLER, json!(uid))?;
    let profile = profiles::get_profile(store, &uid)?.unwrap_or_default();
    let photo_url = if profile.photo_url.is_empty() {
        format!("{AVATAR_FALLBACK}{uid}")
    } else {
        profile.photo_url.clone()
    };
    crate::tlog!(
        "leaderboard: featured seller {} (score {})",
        crate::logging::user_id(&uid),
        stats.engagement()
    );
    Ok(Some(FeaturedSeller {
        display_name: profile.shown_name(&uid),
        photo_url,
        score: stats.engagement(),
        totals: stats,
        uid,
    }))
}

/// The last recorded featured seller uid.
pub fn current_featured_seller(store: &TreeStore) -> AppResult<Option<String>> {
    Ok(store
        .get(paths::FEATURED_SELLER)?
        .and_then(|v| v.as_str().map(str::to_string)))
}
