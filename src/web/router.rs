//! Axum router construction.

use axum::routing::{get, post, put};
use axum::Router;

use crate::web::handlers;
use crate::web::state::SharedState;

/// Build the complete Axum router with all API routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health::health_handler))
        // Auth API
        .route("/api/auth/signup", post(handlers::auth::sign_up_handler))
        .route("/api/auth/signin", post(handlers::auth::sign_in_handler))
        .route("/api/auth/oauth", post(handlers::auth::oauth_handler))
        .route("/api/auth/signout", post(handlers::auth::sign_out_handler))
        .route("/api/me", get(handlers::auth::me_handler))
        // Profiles API
        .route("/api/users", get(handlers::profiles::list_users_handler))
        .route("/api/users/:uid", get(handlers::profiles::get_user_handler))
        // Feed API
        .route(
            "/api/posts",
            get(handlers::posts::list_posts_handler).post(handlers::posts::create_post_handler),
        )
        .route("/api/videos", get(handlers::posts::list_videos_handler))
        .route("/api/posts/:post_id", get(handlers::posts::get_post_handler))
        .route(
            "/api/posts/:post_id/stats",
            get(handlers::posts::stats_handler),
        )
        .route(
            "/api/posts/:post_id/stats/reconcile",
            post(handlers::posts::reconcile_stats_handler),
        )
        .route(
            "/api/posts/:post_id/actions/:action",
            post(handlers::posts::act_handler),
        )
        // Comments API
        .route(
            "/api/posts/:post_id/comments",
            get(handlers::comments::list_comments_handler)
                .post(handlers::comments::add_comment_handler),
        )
        .route(
            "/api/posts/:post_id/comments/:comment_id",
            put(handlers::comments::edit_comment_handler)
                .delete(handlers::comments::delete_comment_handler),
        )
        .route(
            "/api/posts/:post_id/comments/:comment_id/like",
            post(handlers::comments::like_comment_handler),
        )
        .route(
            "/api/posts/:post_id/comments/:comment_id/replies",
            post(handlers::comments::add_reply_handler),
        )
        .route(
            "/api/posts/:post_id/comments/:comment_id/replies/:reply_id",
            put(handlers::comments::edit_reply_handler)
                .delete(handlers::comments::delete_reply_handler),
        )
        .route(
            "/api/posts/:post_id/comments/:comment_id/replies/:reply_id/like",
            post(handlers::comments::like_reply_handler),
        )
        // Chat API
        .route(
            "/api/conversations",
            get(handlers::chat::list_conversations_handler),
        )
        .route("/api/chat/unread", get(handlers::chat::unread_count_handler))
        .route(
            "/api/chat/:partner",
            get(handlers::chat::get_thread_handler).post(handlers::chat::send_message_handler),
        )
        .route(
            "/api/chat/:partner/read",
            post(handlers::chat::mark_read_handler),
        )
        .route(
            "/api/chat/:partner/mailbox",
            get(handlers::chat::mailbox_handler),
        )
        // Friends API
        .route(
            "/api/friends",
            get(handlers::friends::list_friends_handler)
                .post(handlers::friends::add_friend_handler),
        )
        .route(
            "/api/friends/:friend_uid",
            axum::routing::delete(handlers::friends::remove_friend_handler),
        )
        // Notifications API
        .route(
            "/api/notifications",
            get(handlers::notifications::list_notifications_handler),
        )
        .route(
            "/api/notifications/seen",
            post(handlers::notifications::mark_all_seen_handler),
        )
        .route(
            "/api/notifications/:post_id/seen",
            post(handlers::notifications::mark_seen_handler),
        )
        // Leaderboards
        .route(
            "/api/leaderboard/top-selling",
            get(handlers::leaderboard::top_selling_handler),
        )
        .route(
            "/api/leaderboard/most-engaged",
            get(handlers::leaderboard::most_engaged_handler),
        )
        .route(
            "/api/leaderboard/featured-seller",
            get(handlers::leaderboard::featured_seller_handler),
        )
        // Link previews
        .route("/api/preview", get(handlers::preview::preview_handler))
        // WebSocket
        .route("/api/ws", get(handlers::websocket::ws_handler))
        .with_state(state)
}
