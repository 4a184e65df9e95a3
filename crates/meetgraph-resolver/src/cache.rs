//! Single-flight TTL cache for the entity catalog (spec §4.3): resolving a
//! batch of query terms against hundreds of entities means re-loading the
//! whole catalog on nearly every call, so it's cached for
//! `entity_cache_ttl_s` (default 300s, spec §6) behind one lock, mirroring
//! `entity_resolver.py`'s `RLock`-guarded `_get_cached_entities` — a
//! refresh in flight is shared rather than duplicated by concurrent
//! callers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use meetgraph_core::Entity;
use tokio::sync::Mutex;

pub struct EntityCache {
    ttl: Duration,
    inner: Mutex<Option<(Instant, Arc<Vec<Entity>>)>>,
}

impl EntityCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, inner: Mutex::new(None) }
    }

    /// Return the cached catalog if still fresh, otherwise call `load` once
    /// and cache its result. Holding the lock across `load` is deliberate:
    /// it is what makes concurrent refreshes single-flight.
    pub async fn get_or_load<F, E>(&self, load: F) -> Result<Arc<Vec<Entity>>, E>
    where
        F: FnOnce() -> Result<Vec<Entity>, E>,
    {
        let mut guard = self.inner.lock().await;
        if let Some((fetched_at, entities)) = guard.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(entities));
            }
        }
        let fresh = Arc::new(load()?);
        *guard = Some((Instant::now(), Arc::clone(&fresh)));
        Ok(fresh)
    }

    pub async fn invalidate(&self) {
        *self.inner.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_core::EntityType;

    fn entity(name: &str) -> Entity {
        Entity::new(EntityType::Project, name)
    }

    #[tokio::test]
    async fn caches_between_calls() {
        let cache = EntityCache::new(Duration::from_secs(60));
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let load = || -> Result<Vec<Entity>, String> {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![entity("API Migration")])
        };
        cache.get_or_load(load).await.unwrap();
        cache.get_or_load(load).await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_reload() {
        let cache = EntityCache::new(Duration::from_millis(5));
        cache.get_or_load(|| Ok::<_, String>(vec![entity("A")])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let reloaded = cache.get_or_load(|| Ok::<_, String>(vec![entity("B")])).await.unwrap();
        assert_eq!(reloaded[0].name, "B");
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = EntityCache::new(Duration::from_secs(60));
        cache.get_or_load(|| Ok::<_, String>(vec![entity("A")])).await.unwrap();
        cache.invalidate().await;
        let reloaded = cache.get_or_load(|| Ok::<_, String>(vec![entity("B")])).await.unwrap();
        assert_eq!(reloaded[0].name, "B");
    }
}
