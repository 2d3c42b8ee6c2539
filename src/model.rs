//! Stored record shapes and the API types built from them.
//!
//! Record types (`*Record`) mirror what lives in the tree and use the
//! camelCase keys the browser client reads directly.  Everything tolerates
//! missing fields, since any client can write a partial node.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Identity asserted by the sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    /// Name shown on authored content: display name, else e-mail.
    pub fn author_name(&self) -> Option<&str> {
        non_empty(self.display_name.as_deref()).or_else(|| non_empty(self.email.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub uid: String,
    #[serde(default, rename = "displayName")]
    pub display_name: String,
    #[serde(default, rename = "photoURL")]
    pub photo_url: String,
    #[serde(default)]
    pub email: String,
}

impl UserProfile {
    /// Name to show for this user, falling back to the e-mail.
    pub fn shown_name(&self, fallback: &str) -> String {
        non_empty(Some(&self.display_name))
            .or_else(|| non_empty(Some(&self.email)))
            .unwrap_or(fallback)
            .to_string()
    }
}

pub(crate) fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Posts and engagement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub saves: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub purchases: u64,
}

impl Stats {
    /// Score used by the featured-seller ranking (views excluded).
    pub fn engagement(&self) -> u64 {
        [self.comments, self.purchases, self.shares, self.saves]
            .into_iter()
            .fold(self.likes, u64::saturating_add)
    }

    /// Add `other` field by field, saturating at `u64::MAX`.
    pub fn accumulate(&mut self, other: &Stats) {
        self.likes = self.likes.saturating_add(other.likes);
        self.comments = self.comments.saturating_add(other.comments);
        self.purchases = self.purchases.saturating_add(other.purchases);
        self.shares = self.shares.saturating_add(other.shares);
        self.saves = self.saves.saturating_add(other.saves);
        self.views = self.views.saturating_add(other.views);
    }
}

/// How repeated invocations of an action behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMode {
    /// Second invocation removes the membership entry.
    Toggle,
    /// Membership is written once and kept.
    Monotonic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Likes,
    Views,
    Shares,
    Saves,
    Purchases,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Likes,
        Action::Views,
        Action::Shares,
        Action::Saves,
        Action::Purchases,
    ];

    pub fn mode(self) -> ActionMode {
        match self {
            Action::Likes | Action::Saves | Action::Purchases => ActionMode::Toggle,
            Action::Views | Action::Shares => ActionMode::Monotonic,
        }
    }

    /// Key of the counter under `stats`.
    pub fn stat_key(self) -> &'static str {
        match self {
            Action::Likes => "likes",
            Action::Views => "views",
            Action::Shares => "shares",
            Action::Saves => "saves",
            Action::Purchases => "purchases",
        }
    }

    /// Key of the per-post membership set.
    pub fn set_key(self) -> &'static str {
        match self {
            Action::Likes => "likers",
            Action::Views => "viewers",
            Action::Shares => "sharers",
            Action::Saves => "savers",
            Action::Purchases => "buyers",
        }
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" | "likes" => Ok(Action::Likes),
            "view" | "views" => Ok(Action::Views),
            "share" | "shares" => Ok(Action::Shares),
            "save" | "saves" => Ok(Action::Saves),
            "purchase" | "purchases" => Ok(Action::Purchases),
            other => Err(AppError::Invalid(format!("unknown action '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFlag {
    #[serde(default)]
    pub seen: bool,
}

/// A post as stored at `messages/{postId}`.  Membership sets and comments
/// are read through their own modules and ignored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostRecord {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, rename = "ownerUid")]
    pub owner_uid: String,
    #[serde(default, rename = "ownerPhotoURL")]
    pub owner_photo_url: String,
    #[serde(default, rename = "createdAt")]
    pub created_at: u64,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notifications: BTreeMap<String, NotificationFlag>,
}

/// A post as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: String,
    pub url: String,
    pub owner: String,
    pub owner_uid: String,
    pub owner_photo_url: String,
    pub created_at: u64,
    pub stats: Stats,
    pub is_video: bool,
}

impl Post {
    pub fn from_record(id: &str, record: PostRecord) -> Self {
        Self {
            id: id.to_string(),
            is_video: crate::feed::is_video_link(&record.url),
            url: record.url,
            owner: record.owner,
            owner_uid: record.owner_uid,
            owner_photo_url: record.owner_photo_url,
            created_at: record.created_at,
            stats: record.stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "userId")]
    pub user_id: String,
    #[serde(default, rename = "userName")]
    pub user_name: String,
    #[serde(default, rename = "userPhotoURL")]
    pub user_photo_url: String,
    #[serde(default, rename = "createdAt")]
    pub created_at: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub likers: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(flatten)]
    pub body: ReplyRecord,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replies: BTreeMap<String, ReplyRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub user_photo_url: String,
    pub created_at: u64,
    pub likes: u64,
    pub liked_by_me: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub user_photo_url: String,
    pub created_at: u64,
    pub likes: u64,
    pub liked_by_me: bool,
    pub replies: Vec<Reply>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, rename = "readBy", skip_serializing_if = "BTreeMap::is_empty")]
    pub read_by: BTreeMap<String, bool>,
}

impl ChatMessageRecord {
    pub fn is_unread_for(&self, uid: &str) -> bool {
        self.sender != uid && !self.read_by.get(uid).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    pub timestamp: u64,
    pub read_by: Vec<String>,
}

/// Per-user mailbox copy at `user_inbox/{uid}/{threadKey}/{messageId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailboxRecord {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub thread_key: String,
    pub partner: UserProfile,
    pub last_message: ChatMessage,
    pub unread_count: u64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Deserialize every child of an object node, skipping malformed entries.
pub fn children<T: serde::de::DeserializeOwned>(node: Option<Value>) -> Vec<(String, T)> {
    match node {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(key, value)| serde_json::from_value(value).ok().map(|v| (key, v)))
            .collect(),
        _ => Vec::new(),
    }
}
