use std::time::Duration;

use axum::Router;
use futures_util::StreamExt as _;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use looknlink::store::TreeStore;
use looknlink::web::router::build_router;
use looknlink::web::state::AppState;

async fn start_server() -> (String, oneshot::Sender<()>) {
    let store = TreeStore::open_in_memory().expect("in-memory store");
    let app: Router = build_router(AppState::new(store, 16).shared());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind server");
    let addr = listener.local_addr().expect("server addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });

    (format!("http://{}", addr), shutdown_tx)
}

/// Issue a request and return status plus JSON body, including error bodies.
fn call(method: &str, url: &str, token: Option<&str>, body: Option<Value>) -> (u16, Value) {
    let mut req = ureq::request(method, url);
    if let Some(t) = token {
        req = req.set("Authorization", &format!("Bearer {t}"));
    }
    let result = match body {
        Some(b) => req
            .set("Content-Type", "application/json")
            .send_string(&b.to_string()),
        None => req.call(),
    };
    let resp = match result {
        Ok(r) => r,
        Err(ureq::Error::Status(_, r)) => r,
        Err(e) => panic!("request failed: {e}"),
    };
    let status = resp.status();
    let text = resp.into_string().expect("response body");
    let value = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, value)
}

type ChangeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn open_watch(base: &str, path: Option<&str>) -> ChangeStream {
    let ws_base = base.replacen("http://", "ws://", 1);
    let url = match path {
        Some(p) => format!("{ws_base}/api/ws?path={p}"),
        None => format!("{ws_base}/api/ws"),
    };
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("ws connect");
    stream
}

/// Path of the next change frame, or `None` when nothing arrives in `wait`.
async fn next_change(ws: &mut ChangeStream, wait: Duration) -> Option<String> {
    loop {
        let msg = tokio::time::timeout(wait, ws.next()).await.ok()??;
        if let Ok(WsMessage::Text(text)) = msg {
            let event: Value = serde_json::from_str(&text).expect("change event");
            assert_eq!(event["type"], "change");
            return event["path"].as_str().map(str::to_string);
        }
    }
}

/// Sign up and return `(token, uid)`.
fn sign_up(base: &str, email: &str, name: &str) -> (String, String) {
    let (status, body) = call(
        "POST",
        &format!("{base}/api/auth/signup"),
        None,
        Some(json!({ "email": email, "password": "secret123", "display_name": name })),
    );
    assert_eq!(status, 200, "signup failed: {body}");
    (
        body["token"].as_str().expect("token").to_string(),
        body["user"]["uid"].as_str().expect("uid").to_string(),
    )
}

#[tokio::test]
async fn post_like_toggle_and_notifications() {
    let (base, shutdown) = start_server().await;

    tokio::task::spawn_blocking(move || {
        let (bob_token, _) = sign_up(&base, "bob@example.com", "Bob");
        let (alice_token, _) = sign_up(&base, "alice@example.com", "Alice");

        let (status, post) = call(
            "POST",
            &format!("{base}/api/posts"),
            Some(&alice_token),
            Some(json!({ "url": "https://youtu.be/dQw4w9WgXcQ" })),
        );
        assert_eq!(status, 200);
        assert_eq!(post["owner"], "Alice");
        assert_eq!(post["is_video"], true);
        let post_id = post["id"].as_str().expect("post id").to_string();

        // Bob was registered before the post, so he is notified; Alice is not.
        let (_, bob_notes) = call("GET", &format!("{base}/api/notifications"), Some(&bob_token), None);
        assert_eq!(bob_notes["unseen"], 1);
        let (_, alice_notes) =
            call("GET", &format!("{base}/api/notifications"), Some(&alice_token), None);
        assert_eq!(alice_notes["unseen"], 0);

        let like_url = format!("{base}/api/posts/{post_id}/actions/like");
        let (_, first) = call("POST", &like_url, Some(&bob_token), None);
        assert_eq!(first["active"], true);
        assert_eq!(first["count"], 1);
        let (_, second) = call("POST", &like_url, Some(&bob_token), None);
        assert_eq!(second["active"], false);
        assert_eq!(second["count"], 0);

        // Bob's likes re-flagged the owner.
        let (_, alice_notes) =
            call("GET", &format!("{base}/api/notifications"), Some(&alice_token), None);
        assert_eq!(alice_notes["unseen"], 1);

        let (status, marked) = call(
            "POST",
            &format!("{base}/api/notifications/seen"),
            Some(&bob_token),
            None,
        );
        assert_eq!(status, 200);
        assert_eq!(marked["marked"], 1);

        // Opening the post registers one view per user.
        let post_url = format!("{base}/api/posts/{post_id}");
        call("GET", &post_url, Some(&bob_token), None);
        let (_, opened) = call("GET", &post_url, Some(&bob_token), None);
        assert_eq!(opened["post"]["stats"]["views"], 1);
        assert_eq!(opened["my_actions"]["viewed"], true);
        assert_eq!(opened["my_actions"]["liked"], false);

        let (_, videos) = call("GET", &format!("{base}/api/videos"), None, None);
        assert_eq!(videos.as_array().map(Vec::len), Some(1));
    })
    .await
    .expect("client task");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn chat_mark_read_clears_badge() {
    let (base, shutdown) = start_server().await;

    tokio::task::spawn_blocking(move || {
        let (alice_token, alice_uid) = sign_up(&base, "alice@example.com", "Alice");
        let (bob_token, bob_uid) = sign_up(&base, "bob@example.com", "Bob");

        for text in ["hello", "are you there?"] {
            let (status, _) = call(
                "POST",
                &format!("{base}/api/chat/{bob_uid}"),
                Some(&alice_token),
                Some(json!({ "text": text })),
            );
            assert_eq!(status, 200);
        }

        let (_, unread) = call("GET", &format!("{base}/api/chat/unread"), Some(&bob_token), None);
        assert_eq!(unread["unread"], 2);

        let (_, convos) = call("GET", &format!("{base}/api/conversations"), Some(&bob_token), None);
        assert_eq!(convos[0]["partner"]["displayName"], "Alice");
        assert_eq!(convos[0]["unread_count"], 2);

        let (_, read) = call(
            "POST",
            &format!("{base}/api/chat/{alice_uid}/read"),
            Some(&bob_token),
            None,
        );
        assert_eq!(read["marked"], 2);

        let (_, unread) = call("GET", &format!("{base}/api/chat/unread"), Some(&bob_token), None);
        assert_eq!(unread["unread"], 0);

        let (_, thread) = call(
            "GET",
            &format!("{base}/api/chat/{bob_uid}"),
            Some(&alice_token),
            None,
        );
        let mut pair = [alice_uid.clone(), bob_uid.clone()];
        pair.sort();
        assert_eq!(thread["thread_key"], format!("{}_{}", pair[0], pair[1]));
        assert_eq!(thread["messages"][0]["text"], "hello");
        assert_eq!(thread["messages"][1]["read_by"], json!([bob_uid]));

        let (_, mailbox) = call(
            "GET",
            &format!("{base}/api/chat/{alice_uid}/mailbox"),
            Some(&bob_token),
            None,
        );
        assert!(mailbox
            .as_array()
            .expect("mailbox")
            .iter()
            .all(|m| m["read"] == true));
    })
    .await
    .expect("client task");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn comments_friends_and_errors() {
    let (base, shutdown) = start_server().await;

    tokio::task::spawn_blocking(move || {
        let (alice_token, alice_uid) = sign_up(&base, "alice@example.com", "Alice");
        let (bob_token, bob_uid) = sign_up(&base, "bob@example.com", "Bob");

        let (status, _) = call("GET", &format!("{base}/api/notifications"), None, None);
        assert_eq!(status, 401);
        let (status, body) = call("GET", &format!("{base}/api/preview"), None, None);
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Missing url parameter");

        let (_, post) = call(
            "POST",
            &format!("{base}/api/posts"),
            Some(&alice_token),
            Some(json!({ "url": "https://news.test/story" })),
        );
        let post_id = post["id"].as_str().expect("post id").to_string();

        let (status, _) = call(
            "POST",
            &format!("{base}/api/posts/{post_id}/actions/comments"),
            Some(&bob_token),
            None,
        );
        assert_eq!(status, 400);

        let comments_url = format!("{base}/api/posts/{post_id}/comments");
        let (_, c) = call(
            "POST",
            &comments_url,
            Some(&bob_token),
            Some(json!({ "text": "first" })),
        );
        let comment_id = c["id"].as_str().expect("comment id").to_string();
        call(
            "POST",
            &format!("{comments_url}/{comment_id}/replies"),
            Some(&alice_token),
            Some(json!({ "text": "thanks" })),
        );

        let (status, _) = call(
            "DELETE",
            &format!("{comments_url}/{comment_id}"),
            Some(&alice_token),
            None,
        );
        assert_eq!(status, 403);

        let (_, list) = call("GET", &comments_url, None, None);
        assert_eq!(list[0]["text"], "first");
        assert_eq!(list[0]["replies"][0]["user_name"], "Alice");

        let (_, stats) = call("GET", &format!("{base}/api/posts/{post_id}/stats"), None, None);
        assert_eq!(stats["comments"], 1);

        let (status, added) = call(
            "POST",
            &format!("{base}/api/friends"),
            Some(&alice_token),
            Some(json!({ "friend_uid": bob_uid })),
        );
        assert_eq!(status, 200);
        assert_eq!(added["added"], true);
        let (_, bobs) = call("GET", &format!("{base}/api/friends"), Some(&bob_token), None);
        assert_eq!(bobs[0]["uid"], alice_uid);

        let (status, _) = call(
            "POST",
            &format!("{base}/api/friends"),
            Some(&alice_token),
            Some(json!({ "friend_uid": alice_uid })),
        );
        assert_eq!(status, 400);

        let (status, _) = call(
            "POST",
            &format!("{base}/api/auth/signin"),
            None,
            Some(json!({ "email": "alice@example.com", "password": "wrong-pass" })),
        );
        assert_eq!(status, 401);

        let (_, health) = call("GET", &format!("{base}/api/health"), None, None);
        assert_eq!(health["status"], "ok");
        assert_eq!(health["users"], 2);
        assert_eq!(health["posts"], 1);
    })
    .await
    .expect("client task");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn path_ids_spanning_several_keys_are_rejected() {
    let (base, shutdown) = start_server().await;

    tokio::task::spawn_blocking(move || {
        let (alice_token, _) = sign_up(&base, "alice@example.com", "Alice");
        let (bob_token, _) = sign_up(&base, "bob@example.com", "Bob");
        let (_, post) = call(
            "POST",
            &format!("{base}/api/posts"),
            Some(&alice_token),
            Some(json!({ "url": "https://news.test/story" })),
        );
        let post_id = post["id"].as_str().expect("post id").to_string();
        let comments_url = format!("{base}/api/posts/{post_id}/comments");
        call("POST", &comments_url, Some(&bob_token), Some(json!({ "text": "hi" })));

        let (status, body) = call(
            "POST",
            &format!("{base}/api/posts/{post_id}%2Fcomments/actions/like"),
            Some(&bob_token),
            None,
        );
        assert_eq!(status, 400, "{body}");
        assert!(body["error"].is_string());

        let (status, _) = call(
            "DELETE",
            &format!("{base}/api/friends/someone%2Fx"),
            Some(&bob_token),
            None,
        );
        assert_eq!(status, 400);

        let (_, list) = call("GET", &comments_url, None, None);
        assert_eq!(list.as_array().map(Vec::len), Some(1));
        let (_, stats) = call(
            "POST",
            &format!("{base}/api/posts/{post_id}/stats/reconcile"),
            Some(&bob_token),
            None,
        );
        assert_eq!(stats["comments"], 1);
        assert_eq!(stats["likes"], 0);
    })
    .await
    .expect("client task");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn websocket_streams_watched_changes_but_not_credentials() {
    let (base, shutdown) = start_server().await;
    let mut posts_ws = open_watch(&base, Some("messages")).await;
    let mut root_ws = open_watch(&base, None).await;

    let client_base = base.clone();
    let (uid, post_id) = tokio::task::spawn_blocking(move || {
        let (token, uid) = sign_up(&client_base, "alice@example.com", "Alice");
        let (_, post) = call(
            "POST",
            &format!("{client_base}/api/posts"),
            Some(&token),
            Some(json!({ "url": "https://a.test" })),
        );
        (uid, post["id"].as_str().expect("post id").to_string())
    })
    .await
    .expect("client task");

    // The messages watch skips the sign-up writes and sees only the post.
    assert_eq!(
        next_change(&mut posts_ws, Duration::from_secs(5)).await,
        Some(format!("messages/{post_id}"))
    );

    let mut seen = Vec::new();
    while let Some(path) = next_change(&mut root_ws, Duration::from_millis(500)).await {
        seen.push(path);
    }
    assert!(seen.contains(&format!("users/{uid}")), "{seen:?}");
    assert!(seen.contains(&format!("messages/{post_id}")), "{seen:?}");
    assert!(seen.iter().all(|p| !p.starts_with("credentials")), "{seen:?}");

    drop(posts_ws);
    drop(root_ws);
    let _ = shutdown.send(());
}
