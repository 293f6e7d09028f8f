use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes mutations per entity.
///
/// Keys are `recipe:{id}`, `collection:{id}` or `post:{id}`. Idle entries
/// are pruned whenever a new lock is taken.
#[derive(Default)]
pub struct EntityLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held for the duration of one mutation.
pub struct EntityGuard {
    _guard: OwnedMutexGuard<()>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_recipe(&self, recipe_id: &str) -> EntityGuard {
        self.lock(format!("recipe:{}", recipe_id)).await
    }

    pub async fn lock_collection(&self, collection_id: &str) -> EntityGuard {
        self.lock(format!("collection:{}", collection_id)).await
    }

    pub async fn lock_post(&self, post_id: &str) -> EntityGuard {
        self.lock(format!("post:{}", post_id)).await
    }

    async fn lock(&self, key: String) -> EntityGuard {
        let entry = {
            let mut locks = self.locks.lock().await;
            // Only the map holds a reference to an idle lock
            locks.retain(|k, lock| *k == key || Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };

        EntityGuard {
            _guard: entry.lock_owned().await,
        }
    }

    /// Number of entities with a live or pending lock.
    pub async fn tracked(&self) -> usize {
        let locks = self.locks.lock().await;
        locks.values().filter(|l| Arc::strong_count(l) > 1).count()
    }
}
