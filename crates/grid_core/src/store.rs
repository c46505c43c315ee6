use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use shared::domain::ComponentId;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{ComponentSnapshot, ComponentStore, StoreTopic};

struct StoredComponent {
    generation: u64,
    snapshot: ComponentSnapshot,
}

struct StoreState {
    components: HashMap<ComponentId, StoredComponent>,
    /// Last generation issued when each removed component was dropped.
    removed: HashMap<ComponentId, u64>,
    issued: u64,
    is_desktop: bool,
    refresh_token: u64,
}

/// In-process store. Every mutation is followed by a topic notification.
pub struct MemoryStore {
    inner: RwLock<StoreState>,
    topics: broadcast::Sender<StoreTopic>,
}

impl MemoryStore {
    pub fn new(is_desktop: bool) -> Self {
        let (topics, _) = broadcast::channel(256);
        Self {
            inner: RwLock::new(StoreState {
                components: HashMap::new(),
                removed: HashMap::new(),
                issued: 0,
                is_desktop,
                refresh_token: 0,
            }),
            topics,
        }
    }

    /// Stores a component slice unless a newer generation was already
    /// committed for it, or the component was removed after `generation` was
    /// issued. Returns whether the slice was accepted.
    pub fn commit(&self, id: &ComponentId, generation: u64, snapshot: ComponentSnapshot) -> bool {
        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(&removed_at) = inner.removed.get(id) {
                if generation <= removed_at {
                    debug!(
                        component = %id,
                        generation,
                        removed_at,
                        "dropping commit for removed component"
                    );
                    return false;
                }
                inner.removed.remove(id);
            }
            if let Some(existing) = inner.components.get(id) {
                if existing.generation > generation {
                    debug!(
                        component = %id,
                        generation,
                        newest = existing.generation,
                        "dropping stale component commit"
                    );
                    return false;
                }
            }
            inner.components.insert(
                id.clone(),
                StoredComponent {
                    generation,
                    snapshot,
                },
            );
        }
        let _ = self.topics.send(StoreTopic::Component(id.clone()));
        true
    }

    pub fn set_layout(&self, is_desktop: bool) {
        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            inner.is_desktop = is_desktop;
        }
        let _ = self.topics.send(StoreTopic::Layout);
    }

    /// Asks every mounted grid to refetch.
    pub fn bump_refresh_token(&self) -> u64 {
        let token = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            inner.refresh_token += 1;
            inner.refresh_token
        };
        let _ = self.topics.send(StoreTopic::Util);
        token
    }
}

impl ComponentStore for MemoryStore {
    fn component(&self, id: &ComponentId) -> Option<ComponentSnapshot> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .components
            .get(id)
            .map(|stored| stored.snapshot.clone())
    }

    fn is_desktop(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_desktop
    }

    fn refresh_token(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh_token
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreTopic> {
        self.topics.subscribe()
    }

    fn next_generation(&self) -> u64 {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.issued += 1;
        inner.issued
    }

    fn remove_component(&self, id: &ComponentId) {
        let removed = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let issued = inner.issued;
            inner.removed.insert(id.clone(), issued);
            inner.components.remove(id).is_some()
        };
        if removed {
            let _ = self.topics.send(StoreTopic::Component(id.clone()));
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
