//! Direct messages between two users.
//!
//! A thread lives at `inbox/{a_b}` where `a_b` is the sorted pair of uids.
//! Every message is also copied into each participant's mailbox under
//! `user_inbox/{uid}/{a_b}` with a per-user `read` flag.  Unread state for the
//! badge comes from the thread's `readBy` sets.

use serde_json::{json, Map, Value};

use crate::error::{AppError, AppResult};
use crate::model::{
    children, ChatMessage, ChatMessageRecord, ConversationSummary, Identity, MailboxRecord,
};
use crate::paths;
use crate::profiles;
use crate::store::TreeStore;

/// Thread key for a pair of users; identical for either argument order.
pub fn thread_key(a: &str, b: &str) -> AppResult<String> {
    for uid in [a, b] {
        paths::segment(uid)?;
        if uid.contains('_') {
            return Err(AppError::Invalid(format!(
                "'{uid}' cannot take part in a thread"
            )));
        }
    }
    if a <= b {
        Ok(format!("{a}_{b}"))
    } else {
        Ok(format!("{b}_{a}"))
    }
}

pub fn thread_participants(key: &str) -> AppResult<(String, String)> {
    match key.split_once('_') {
        Some((a, b)) if !b.contains('_') => {
            Ok((paths::segment(a)?.to_string(), paths::segment(b)?.to_string()))
        }
        _ => Err(AppError::Invalid(format!("malformed thread key '{key}'"))),
    }
}

/// The other participant of `key`, or `Forbidden` if `uid` is not in it.
fn partner_in(key: &str, uid: &str) -> AppResult<String> {
    let (a, b) = thread_participants(key)?;
    if a == uid {
        Ok(b)
    } else if b == uid {
        Ok(a)
    } else {
        Err(AppError::Forbidden(format!("not a participant of {key}")))
    }
}

fn to_message(id: String, record: ChatMessageRecord) -> ChatMessage {
    ChatMessage {
        id,
        read_by: record
            .read_by
            .into_iter()
            .filter(|(_, read)| *read)
            .map(|(uid, _)| uid)
            .collect(),
        sender: record.sender,
        text: record.text,
        timestamp: record.timestamp,
    }
}

fn thread_records(store: &TreeStore, key: &str) -> AppResult<Vec<(String, ChatMessageRecord)>> {
    let mut records: Vec<(String, ChatMessageRecord)> = children(store.get(&paths::thread(key))?);
    records.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp).then_with(|| a.0.cmp(&b.0)));
    Ok(records)
}

/// Send `text` from `sender` to `recipient`.  With `reply_to` the text is
/// prefixed with the quoted message author's name.  The thread entry and
/// both mailbox copies are written in one multi-path update.
pub fn send_message(
    store: &TreeStore,
    sender: &Identity,
    recipient: &str,
    text: &str,
    reply_to: Option<&str>,
    now: u64,
) -> AppResult<ChatMessage> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Invalid("message cannot be empty".to_string()));
    }
    if sender.uid == recipient {
        return Err(AppError::Invalid("cannot message yourself".to_string()));
    }
    let key = thread_key(&sender.uid, recipient)?;
    if !store.exists(&paths::user(recipient))? {
        return Err(AppError::NotFound(format!("user {recipient}")));
    }

    let text = match reply_to {
        Some(quoted_id) => {
            paths::segment(quoted_id)?;
            let quoted: ChatMessageRecord = store
                .get(&format!("{}/{quoted_id}", paths::thread(&key)))?
                .map(serde_json::from_value)
                .transpose()?
                .ok_or_else(|| AppError::NotFound(format!("message {quoted_id}")))?;
            let name = profiles::get_profile(store, &quoted.sender)?
                .map(|p| p.display_name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "User".to_string());
            format!("@{name}: {text}")
        }
        None => text.to_string(),
    };

    let record = ChatMessageRecord {
        sender: sender.uid.clone(),
        text,
        timestamp: now,
        read_by: Default::default(),
    };
    let id = store.atomic(|txn| {
        let id = txn.next_push_id();
        let copy = |read: bool| {
            json!({
                "sender": record.sender,
                "text": record.text,
                "timestamp": record.timestamp,
                "read": read,
            })
        };
        let mut entries = Map::new();
        entries.insert(
            format!("{}/{id}", paths::thread(&key)),
            serde_json::to_value(&record)?,
        );
        entries.insert(
            format!("{}/{id}", paths::mailbox(&sender.uid, &key)),
            copy(true),
        );
        entries.insert(format!("{}/{id}", paths::mailbox(recipient, &key)), copy(false));
        txn.update("", entries)?;
        Ok::<_, AppError>(id)
    })?;

    crate::tlog!(
        "chat: {} -> {} ({})",
        crate::logging::user_id(&sender.uid),
        crate::logging::user_id(recipient),
        crate::logging::item_id(&id)
    );
    Ok(to_message(id, record))
}

/// Messages of a thread, oldest first.  `viewer` must be a participant.
pub fn list_thread(store: &TreeStore, key: &str, viewer: &str) -> AppResult<Vec<ChatMessage>> {
    partner_in(key, viewer)?;
    Ok(thread_records(store, key)?
        .into_iter()
        .map(|(id, r)| to_message(id, r))
        .collect())
}

/// Mark every message from the other party as read by `uid`, in one
/// multi-path update that also flips the mailbox flags.  Returns how many
/// messages changed.
pub fn mark_thread_read(store: &TreeStore, key: &str, uid: &str) -> AppResult<u64> {
    partner_in(key, uid)?;
    let unread: Vec<String> = thread_records(store, key)?
        .into_iter()
        .filter(|(_, r)| r.is_unread_for(uid))
        .map(|(id, _)| id)
        .collect();
    if unread.is_empty() {
        return Ok(0);
    }

    let thread = paths::thread(key);
    let mailbox = paths::mailbox(uid, key);
    let mut entries = Map::new();
    for id in &unread {
        entries.insert(format!("{thread}/{id}/readBy/{uid}"), Value::Bool(true));
        entries.insert(format!("{mailbox}/{id}/read"), Value::Bool(true));
    }
    store.update("", entries)?;
    crate::tlog!(
        "chat: {} read {} in {}",
        crate::logging::user_id(uid),
        unread.len(),
        key
    );
    Ok(unread.len() as u64)
}

/// Keys of every thread `uid` takes part in.
fn threads_of(store: &TreeStore, uid: &str) -> AppResult<Vec<String>> {
    Ok(store
        .child_keys(paths::INBOX)?
        .into_iter()
        .filter(|key| partner_in(key, uid).is_ok())
        .collect())
}

/// Messages not sent by `uid` and lacking `readBy/{uid}`, across all threads.
pub fn unread_count(store: &TreeStore, uid: &str) -> AppResult<u64> {
    let mut total = 0;
    for key in threads_of(store, uid)? {
        total += thread_records(store, &key)?
            .iter()
            .filter(|(_, r)| r.is_unread_for(uid))
            .count() as u64;
    }
    Ok(total)
}

/// One entry per thread, most recent activity first.
pub fn list_conversations(store: &TreeStore, uid: &str) -> AppResult<Vec<ConversationSummary>> {
    let mut out = Vec::new();
    for key in threads_of(store, uid)? {
        let records = thread_records(store, &key)?;
        let unread_count = records.iter().filter(|(_, r)| r.is_unread_for(uid)).count() as u64;
        let Some((id, last)) = records.into_iter().last() else {
            continue;
        };
        let partner = partner_in(&key, uid)?;
        out.push(ConversationSummary {
            partner: profiles::profile_or_placeholder(store, &partner)?,
            thread_key: key,
            last_message: to_message(id, last),
            unread_count,
        });
    }
    out.sort_by(|a, b| {
        b.last_message
            .timestamp
            .cmp(&a.last_message.timestamp)
            .then_with(|| b.thread_key.cmp(&a.thread_key))
    });
    Ok(out)
}

/// `uid`'s own mailbox copy of a thread, oldest first.
pub fn list_mailbox(
    store: &TreeStore,
    uid: &str,
    key: &str,
) -> AppResult<Vec<(String, MailboxRecord)>> {
    partner_in(key, uid)?;
    let mut records: Vec<(String, MailboxRecord)> = children(store.get(&paths::mailbox(uid, key))?);
    records.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp).then_with(|| a.0.cmp(&b.0)));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{identity, store_with_users};

    #[test]
    fn thread_key_ignores_argument_order() {
        assert_eq!(thread_key("bob", "alice").unwrap(), "alice_bob");
        assert_eq!(thread_key("alice", "bob").unwrap(), "alice_bob");
        assert!(thread_key("a_b", "c").is_err());
        assert_eq!(
            thread_participants("alice_bob").unwrap(),
            ("alice".to_string(), "bob".to_string())
        );
        assert!(thread_participants("alice").is_err());
    }

    #[test]
    fn send_writes_thread_and_both_mailboxes() {
        let store = store_with_users(&["alice", "bob"]);
        let alice = identity("alice", Some("Alice"), None);
        let msg = send_message(&store, &alice, "bob", " hi ", None, 5).unwrap();
        assert_eq!(msg.text, "hi");

        let mine = list_mailbox(&store, "alice", "alice_bob").unwrap();
        let theirs = list_mailbox(&store, "bob", "alice_bob").unwrap();
        assert_eq!(mine.len(), 1);
        assert!(mine[0].1.read);
        assert!(!theirs[0].1.read);
        assert_eq!(theirs[0].0, msg.id);
    }

    #[test]
    fn marking_read_clears_the_badge() {
        let store = store_with_users(&["alice", "bob"]);
        let alice = identity("alice", Some("Alice"), None);
        let bob = identity("bob", Some("Bob"), None);
        send_message(&store, &alice, "bob", "one", None, 1).unwrap();
        send_message(&store, &alice, "bob", "two", None, 2).unwrap();
        send_message(&store, &bob, "alice", "back", None, 3).unwrap();

        assert_eq!(unread_count(&store, "bob").unwrap(), 2);
        assert_eq!(unread_count(&store, "alice").unwrap(), 1);
        assert_eq!(mark_thread_read(&store, "alice_bob", "bob").unwrap(), 2);
        assert_eq!(unread_count(&store, "bob").unwrap(), 0);
        assert_eq!(mark_thread_read(&store, "alice_bob", "bob").unwrap(), 0);
        assert_eq!(unread_count(&store, "alice").unwrap(), 1);

        let thread = list_thread(&store, "alice_bob", "bob").unwrap();
        assert!(thread[..2].iter().all(|m| m.read_by == vec!["bob".to_string()]));
        assert!(list_mailbox(&store, "bob", "alice_bob")
            .unwrap()
            .iter()
            .all(|(_, m)| m.read));
    }

    #[test]
    fn reply_prefixes_quoted_author() {
        let store = store_with_users(&["alice", "bob"]);
        let alice = identity("alice", Some("Alice"), None);
        let bob = identity("bob", Some("Bob"), None);
        let first = send_message(&store, &alice, "bob", "lunch?", None, 1).unwrap();
        let reply = send_message(&store, &bob, "alice", "sure", Some(&first.id), 2).unwrap();
        assert_eq!(reply.text, "@alice: sure");
    }

    #[test]
    fn reply_prefix_skips_email_for_nameless_authors() {
        let store = store_with_users(&["bob"]);
        let anon = identity("anon", None, Some("anon@x.test"));
        crate::profiles::sync_profile(&store, &anon).unwrap();
        let first = send_message(&store, &anon, "bob", "hey", None, 1).unwrap();
        let bob = identity("bob", None, None);
        let reply = send_message(&store, &bob, "anon", "yo", Some(&first.id), 2).unwrap();
        assert_eq!(reply.text, "@User: yo");
    }

    #[test]
    fn multi_key_ids_are_rejected() {
        let store = store_with_users(&["alice", "bob"]);
        let alice = identity("alice", Some("Alice"), None);
        let first = send_message(&store, &alice, "bob", "hi", None, 1).unwrap();
        assert!(matches!(thread_key("alice", "bob/x"), Err(AppError::Invalid(_))));
        assert!(matches!(
            send_message(&store, &alice, "bob/x", "hi", None, 2),
            Err(AppError::Invalid(_))
        ));
        let nested = format!("{}/readBy", first.id);
        assert!(matches!(
            send_message(&store, &identity("bob", None, None), "alice", "re", Some(&nested), 3),
            Err(AppError::Invalid(_))
        ));
        assert!(matches!(thread_participants("a/b_c"), Err(AppError::Invalid(_))));
        assert_eq!(list_thread(&store, "alice_bob", "alice").unwrap().len(), 1);
    }

    #[test]
    fn rejects_self_and_empty_messages() {
        let store = store_with_users(&["alice", "bob"]);
        let alice = identity("alice", Some("Alice"), None);
        assert!(send_message(&store, &alice, "alice", "hi", None, 1).is_err());
        assert!(send_message(&store, &alice, "bob", "  ", None, 1).is_err());
        assert!(matches!(
            send_message(&store, &alice, "nobody", "hi", None, 1),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn outsiders_cannot_read_a_thread() {
        let store = store_with_users(&["alice", "bob", "carol"]);
        send_message(&store, &identity("alice", None, None), "bob", "hi", None, 1).unwrap();
        assert!(matches!(
            list_thread(&store, "alice_bob", "carol"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn conversations_are_newest_first_with_partner_profiles() {
        let store = store_with_users(&["alice", "bob", "carol"]);
        let alice = identity("alice", Some("Alice"), None);
        send_message(&store, &alice, "bob", "old", None, 1).unwrap();
        send_message(&store, &identity("carol", None, None), "alice", "new", None, 2).unwrap();

        let convos = list_conversations(&store, "alice").unwrap();
        assert_eq!(convos.len(), 2);
        assert_eq!(convos[0].thread_key, "alice_carol");
        assert_eq!(convos[0].partner.display_name, "carol");
        assert_eq!(convos[0].unread_count, 1);
        assert_eq!(convos[1].last_message.text, "old");
        assert_eq!(convos[1].unread_count, 0);
    }
}
