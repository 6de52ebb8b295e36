//! Pages known to the worker and whether it controls them.
//!
//! Pages are registered when they issue a fetch and removed when the host
//! reports them closed. The registry is bounded: past [`MAX_CLIENTS`] pages
//! the one seen least recently is forgotten.

use std::collections::HashMap;
use tokio::sync::RwLock;

/// Default bound on tracked pages.
pub const MAX_CLIENTS: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Page {
    controlled: bool,
    last_seen: u64,
}

#[derive(Debug, Default)]
struct Pages {
    by_id: HashMap<String, Page>,
    tick: u64,
}

/// Registry of open pages, keyed by client id.
#[derive(Debug)]
pub struct Clients {
    pages: RwLock<Pages>,
    capacity: usize,
}

impl Default for Clients {
    fn default() -> Self {
        Self::new()
    }
}

impl Clients {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CLIENTS)
    }

    /// A registry that tracks at most `capacity` pages (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self { pages: RwLock::new(Pages::default()), capacity: capacity.max(1) }
    }

    /// Record a page. A page already known keeps its current control state.
    pub async fn register(&self, id: &str, controlled: bool) {
        let mut pages = self.pages.write().await;
        pages.tick += 1;
        let now = pages.tick;

        if let Some(page) = pages.by_id.get_mut(id) {
            page.last_seen = now;
            return;
        }
        pages.by_id.insert(id.to_string(), Page { controlled, last_seen: now });

        if pages.by_id.len() <= self.capacity {
            return;
        }
        let stale = pages
            .by_id
            .iter()
            .min_by_key(|(_, page)| page.last_seen)
            .map(|(id, _)| id.clone());
        if let Some(stale) = stale {
            pages.by_id.remove(&stale);
            tracing::debug!(client = %stale, capacity = self.capacity, "forgot least recently seen page");
        }
    }

    /// Forget a closed page. Returns false if it wasn't known.
    pub async fn remove(&self, id: &str) -> bool {
        self.pages.write().await.by_id.remove(id).is_some()
    }

    /// Take control of every known page. Returns how many pages are now controlled.
    pub async fn claim(&self) -> usize {
        let mut pages = self.pages.write().await;
        pages.by_id.values_mut().for_each(|page| page.controlled = true);
        pages.by_id.len()
    }

    pub async fn is_controlled(&self, id: &str) -> bool {
        self.pages
            .read()
            .await
            .by_id
            .get(id)
            .is_some_and(|page| page.controlled)
    }

    pub async fn controlled_count(&self) -> usize {
        self.pages.read().await.by_id.values().filter(|page| page.controlled).count()
    }

    pub async fn len(&self) -> usize {
        self.pages.read().await.by_id.len()
    }
}
