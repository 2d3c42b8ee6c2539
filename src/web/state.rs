//! Shared application state.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::Sessions;
use crate::preview::PreviewCache;
use crate::store::TreeStore;

pub struct AppState {
    pub store: TreeStore,
    pub sessions: Sessions,
    pub previews: PreviewCache,
    pub ws_connection_count: Arc<AtomicUsize>,
}

pub type SharedState = Arc<Mutex<AppState>>;

impl AppState {
    pub fn new(store: TreeStore, preview_cache: usize) -> Self {
        Self {
            store,
            sessions: Sessions::new(),
            previews: PreviewCache::new(preview_cache),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }
}
