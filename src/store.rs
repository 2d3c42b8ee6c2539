//! Hierarchical JSON tree store on SQLite.
//!
//! The store addresses data by `/`-separated paths (`messages/{postId}/stats`)
//! the way a real-time tree database does.  Only leaves are persisted: every
//! scalar lives in one `nodes` row keyed by its full path, and subtrees are
//! reassembled on read with a single range scan.  Objects that flatten to no
//! leaves do not exist, so writing `null` or `{}` removes a path.
//!
//! All writes run inside SQLite transactions.  [`TreeStore::atomic`] exposes
//! the transaction to callers so a read-modify-write spanning several paths
//! (membership set plus its counter, say) commits or rolls back as a unit.
//! Every committed write is announced on a broadcast channel; [`Watch`]
//! filters those announcements down to one subtree.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::ids::PushIdGenerator;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    Io(std::io::Error),
    InvalidPath(String),
    InvalidValue(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StoreError::Serde(e) => write!(f, "serialization error: {e}"),
            StoreError::Io(e) => write!(f, "io error: {e}"),
            StoreError::InvalidPath(p) => write!(f, "invalid path: {p}"),
            StoreError::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

const FORBIDDEN_KEY_CHARS: &[char] = &['.', '#', '$', '[', ']', '/'];

/// Check a single path segment (an object key).
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty()
        || key.contains(FORBIDDEN_KEY_CHARS)
        || key.chars().any(|c| c.is_control())
    {
        return Err(StoreError::InvalidPath(key.to_string()));
    }
    Ok(())
}

/// Normalise a path: strip outer slashes, reject empty inner segments and
/// forbidden characters.  The root is the empty string.
pub fn normalize(path: &str) -> Result<String, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    for segment in trimmed.split('/') {
        validate_key(segment).map_err(|_| StoreError::InvalidPath(path.to_string()))?;
    }
    Ok(trimmed.to_string())
}

/// Join a base path and a relative path.
pub fn join(base: &str, rel: &str) -> String {
    match (base.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rel}"),
    }
}

/// Upper bound for a range scan of `prefix/…`: `'0'` sorts directly after `'/'`.
fn subtree_bounds(path: &str) -> (String, String) {
    (format!("{path}/"), format!("{path}0"))
}

// ---------------------------------------------------------------------------
// Change notifications
// ---------------------------------------------------------------------------

pub const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// A committed write at `path`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Change {
    pub path: String,
}

impl Change {
    /// Whether this change affects the subtree rooted at `prefix`: the
    /// written path is the prefix, lies beneath it, or contains it.
    pub fn touches(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() || self.path.is_empty() {
            return true;
        }
        is_within(&self.path, prefix) || is_within(prefix, &self.path)
    }
}

fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == b'/')
}

/// A subscription to changes beneath one path.
pub struct Watch {
    rx: broadcast::Receiver<Change>,
    prefix: String,
}

impl Watch {
    /// Wait for the next change touching the watched subtree.  When the
    /// receiver lagged, a change for the prefix itself is returned so the
    /// caller re-reads its snapshot.  `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<Change> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.touches(&self.prefix) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    return Some(Change {
                        path: self.prefix.clone(),
                    })
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Store handle
// ---------------------------------------------------------------------------

pub struct TreeStore {
    conn: Connection,
    changes: broadcast::Sender<Change>,
    push_ids: Mutex<PushIdGenerator>,
}

impl TreeStore {
    /// Open or create a store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nodes (
                path    TEXT PRIMARY KEY,
                value   TEXT NOT NULL
            );",
        )?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn,
            changes,
            push_ids: Mutex::new(PushIdGenerator::new()),
        })
    }

    /// Subscribe to changes touching `path`.
    pub fn watch(&self, path: &str) -> Result<Watch, StoreError> {
        Ok(Watch {
            rx: self.changes.subscribe(),
            prefix: normalize(path)?,
        })
    }

    /// Run `f` inside one SQLite transaction.  Reads observe earlier writes
    /// made through the same [`Txn`]; an `Err` from `f` rolls everything
    /// back and nothing is announced.
    pub fn atomic<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut Txn<'_>) -> Result<T, E>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(StoreError::from)?;
        let mut txn = Txn {
            conn: &tx,
            push_ids: &self.push_ids,
            changed: BTreeSet::new(),
        };
        let out = f(&mut txn)?;
        let changed = std::mem::take(&mut txn.changed);
        drop(txn);
        tx.commit().map_err(StoreError::from)?;
        for path in changed {
            // No receivers is fine.
            let _ = self.changes.send(Change { path });
        }
        Ok(out)
    }

    pub fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        read_subtree(&self.conn, &normalize(path)?)
    }

    pub fn exists(&self, path: &str) -> Result<bool, StoreError> {
        exists_in(&self.conn, &normalize(path)?)
    }

    pub fn child_keys(&self, path: &str) -> Result<Vec<String>, StoreError> {
        child_keys_in(&self.conn, &normalize(path)?)
    }

    /// Number of immediate children: the cardinality of a membership set.
    pub fn child_count(&self, path: &str) -> Result<u64, StoreError> {
        Ok(self.child_keys(path)?.len() as u64)
    }

    pub fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.atomic(|txn| txn.set(path, value))
    }

    pub fn update(&self, path: &str, entries: Map<String, Value>) -> Result<(), StoreError> {
        self.atomic(|txn| txn.update(path, entries))
    }

    pub fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.atomic(|txn| txn.remove(path))
    }

    /// Store `value` under a new push key beneath `path`; returns the key.
    pub fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        self.atomic(|txn| txn.push(path, value))
    }

    /// Atomic read-modify-write of one path.  `f` sees the current value and
    /// returns the replacement, or `None` to abort without writing.  Returns
    /// the committed value (`None` when aborted).
    pub fn transaction<F>(&self, path: &str, f: F) -> Result<Option<Value>, StoreError>
    where
        F: FnOnce(Option<Value>) -> Option<Value>,
    {
        self.atomic(|txn| {
            let current = txn.get(path)?;
            match f(current) {
                Some(next) => {
                    txn.set(path, next.clone())?;
                    Ok(Some(next))
                }
                None => Ok(None),
            }
        })
    }

    /// Number of stored leaves (used by the health endpoint).
    pub fn leaf_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// ---------------------------------------------------------------------------
// Transaction handle
// ---------------------------------------------------------------------------

/// Reads and writes inside a [`TreeStore::atomic`] block.
pub struct Txn<'a> {
    conn: &'a Connection,
    push_ids: &'a Mutex<PushIdGenerator>,
    changed: BTreeSet<String>,
}

impl Txn<'_> {
    pub fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        read_subtree(self.conn, &normalize(path)?)
    }

    pub fn exists(&self, path: &str) -> Result<bool, StoreError> {
        exists_in(self.conn, &normalize(path)?)
    }

    pub fn child_keys(&self, path: &str) -> Result<Vec<String>, StoreError> {
        child_keys_in(self.conn, &normalize(path)?)
    }

    pub fn child_count(&self, path: &str) -> Result<u64, StoreError> {
        Ok(self.child_keys(path)?.len() as u64)
    }

    pub fn set(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
        let path = normalize(path)?;
        if path.is_empty() && !(value.is_object() || value.is_null()) {
            return Err(StoreError::InvalidValue(
                "the root can only hold an object".to_string(),
            ));
        }
        let mut leaves = Vec::new();
        flatten(&path, &value, &mut leaves)?;

        delete_subtree(self.conn, &path)?;
        // A scalar stored at an ancestor is replaced by the new subtree.
        if !leaves.is_empty() {
            let mut ancestor = path.as_str();
            while let Some(idx) = ancestor.rfind('/') {
                ancestor = &ancestor[..idx];
                self.conn
                    .execute("DELETE FROM nodes WHERE path = ?1", params![ancestor])?;
            }
        }
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO nodes (path, value) VALUES (?1, ?2)")?;
        for (leaf_path, leaf) in &leaves {
            stmt.execute(params![leaf_path, leaf])?;
        }
        self.changed.insert(path);
        Ok(())
    }

    /// Apply several relative writes beneath `path` as one unit.
    pub fn update(&mut self, path: &str, entries: Map<String, Value>) -> Result<(), StoreError> {
        let base = normalize(path)?;
        for (rel, value) in entries {
            let rel = normalize(&rel)?;
            if rel.is_empty() {
                return Err(StoreError::InvalidPath(format!("{base}/")));
            }
            self.set(&join(&base, &rel), value)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Result<(), StoreError> {
        self.set(path, Value::Null)
    }

    pub fn push(&mut self, path: &str, value: Value) -> Result<String, StoreError> {
        let key = self.next_push_id();
        self.set(&join(&normalize(path)?, &key), value)?;
        Ok(key)
    }

    /// Reserve a push key without writing (for multi-path updates that need
    /// the key up front).
    pub fn next_push_id(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        match self.push_ids.lock() {
            Ok(mut gen) => gen.next_id(now),
            Err(poisoned) => poisoned.into_inner().next_id(now),
        }
    }
}

// ---------------------------------------------------------------------------
// Leaf encoding
// ---------------------------------------------------------------------------

fn flatten(path: &str, value: &Value, out: &mut Vec<(String, String)>) -> Result<(), StoreError> {
    match value {
        Value::Null => Ok(()),
        Value::Object(map) => {
            for (key, child) in map {
                validate_key(key)?;
                flatten(&join(path, key), child, out)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten(&join(path, &i.to_string()), child, out)?;
            }
            Ok(())
        }
        scalar => {
            out.push((path.to_string(), serde_json::to_string(scalar)?));
            Ok(())
        }
    }
}

fn read_subtree(conn: &Connection, path: &str) -> Result<Option<Value>, StoreError> {
    let rows = subtree_rows(conn, path)?;
    if rows.is_empty() {
        return Ok(None);
    }
    let mut root = Map::new();
    for (leaf_path, raw) in rows {
        let leaf: Value = serde_json::from_str(&raw)?;
        let rel = relative(&leaf_path, path);
        if rel.is_empty() {
            return Ok(Some(leaf));
        }
        insert_leaf(&mut root, rel, leaf);
    }
    Ok(Some(Value::Object(root)))
}

fn relative<'p>(leaf_path: &'p str, base: &str) -> &'p str {
    if base.is_empty() {
        leaf_path
    } else if leaf_path.len() == base.len() {
        ""
    } else {
        &leaf_path[base.len() + 1..]
    }
}

fn insert_leaf(root: &mut Map<String, Value>, rel: &str, leaf: Value) {
    let mut node = root;
    let mut segments = rel.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            node.insert(segment.to_string(), leaf);
            return;
        }
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        node = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
}

fn subtree_rows(conn: &Connection, path: &str) -> Result<Vec<(String, String)>, StoreError> {
    let mut result = Vec::new();
    if path.is_empty() {
        let mut stmt = conn.prepare_cached("SELECT path, value FROM nodes ORDER BY path")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        for row in rows {
            result.push(row?);
        }
        return Ok(result);
    }
    let (lo, hi) = subtree_bounds(path);
    let mut stmt = conn.prepare_cached(
        "SELECT path, value FROM nodes
         WHERE path = ?1 OR (path >= ?2 AND path < ?3)
         ORDER BY path",
    )?;
    let rows = stmt.query_map(params![path, lo, hi], |row| Ok((row.get(0)?, row.get(1)?)))?;
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

fn exists_in(conn: &Connection, path: &str) -> Result<bool, StoreError> {
    if path.is_empty() {
        let any: Option<i64> = conn
            .query_row("SELECT 1 FROM nodes LIMIT 1", [], |row| row.get(0))
            .optional()?;
        return Ok(any.is_some());
    }
    let (lo, hi) = subtree_bounds(path);
    let any: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM nodes WHERE path = ?1 OR (path >= ?2 AND path < ?3) LIMIT 1",
            params![path, lo, hi],
            |row| row.get(0),
        )
        .optional()?;
    Ok(any.is_some())
}

fn child_keys_in(conn: &Connection, path: &str) -> Result<Vec<String>, StoreError> {
    let mut keys = BTreeSet::new();
    for (leaf_path, _) in subtree_rows(conn, path)? {
        let rel = relative(&leaf_path, path);
        if let Some(first) = rel.split('/').next().filter(|s| !s.is_empty()) {
            keys.insert(first.to_string());
        }
    }
    Ok(keys.into_iter().collect())
}

fn delete_subtree(conn: &Connection, path: &str) -> Result<(), StoreError> {
    if path.is_empty() {
        conn.execute("DELETE FROM nodes", [])?;
        return Ok(());
    }
    let (lo, hi) = subtree_bounds(path);
    conn.execute(
        "DELETE FROM nodes WHERE path = ?1 OR (path >= ?2 AND path < ?3)",
        params![path, lo, hi],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// Read a non-negative integer, treating absent or malformed values as 0.
pub fn as_count(value: Option<&Value>) -> u64 {
    value
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
        .unwrap_or(0)
}

/// Whether a membership-set entry marks presence (`true` or a timestamp).
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
