pub mod auth;
pub mod chat;
pub mod comments;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod friends;
pub mod ids;
pub mod leaderboard;
pub mod logging;
pub mod model;
pub mod notifications;
pub mod paths;
pub mod preview;
pub mod profiles;
pub mod store;
pub mod web;

#[cfg(test)]
pub(crate) mod testutil;
