//! Route handler modules for the looknlink-web REST API.

pub mod auth;
pub mod chat;
pub mod comments;
pub mod friends;
pub mod health;
pub mod leaderboard;
pub mod notifications;
pub mod posts;
pub mod preview;
pub mod profiles;
pub mod websocket;
