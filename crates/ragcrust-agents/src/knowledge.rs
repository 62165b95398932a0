use std::sync::Arc;

use dashmap::DashMap;
use ragcrust_common::{Error, Result, SessionKey};
use ragcrust_db::{IndexMapStore, KnowledgeBaseHandle};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::providers::VectorIndex;

/// Process-wide session key → retrieval index mapping.
///
/// Reused handles are liveness-probed against the provider before being
/// returned; a handle that fails the probe is dropped and replaced. Calls for
/// the same session key are serialized so a session never ends up with two
/// indexes.
pub struct KnowledgeBaseCache {
    store: Arc<dyn IndexMapStore>,
    name_prefix: String,
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl KnowledgeBaseCache {
    pub fn new(store: Arc<dyn IndexMapStore>, name_prefix: impl Into<String>) -> Self {
        Self {
            store,
            name_prefix: name_prefix.into(),
            locks: DashMap::new(),
        }
    }

    fn session_lock(&self, session_key: &SessionKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return the live index for `session_key`, creating one if none is
    /// cached or the cached one is gone. Creation failures are fatal.
    pub async fn get_or_create<P>(
        &self,
        provider: &P,
        session_key: &SessionKey,
    ) -> Result<KnowledgeBaseHandle>
    where
        P: VectorIndex + ?Sized,
    {
        let lock = self.session_lock(session_key);
        let _guard = lock.lock().await;

        if let Some(handle) = self.store.get(session_key)? {
            match provider.retrieve_vector_store(&handle.id).await {
                Ok(_) => {
                    debug!(session = %session_key, index = %handle.id, "reusing knowledge base");
                    return Ok(handle);
                }
                Err(e) => {
                    warn!(
                        session = %session_key,
                        index = %handle.id,
                        "cached knowledge base failed liveness probe, recreating: {e}"
                    );
                    self.store.remove(session_key)?;
                }
            }
        }

        let name = format!("{}{}", self.name_prefix, session_key);
        let created = provider.create_vector_store(&name).await.map_err(|e| {
            Error::Provider(format!("failed to create knowledge base for session: {e}"))
        })?;

        let handle = KnowledgeBaseHandle::new(created.id, session_key.clone());
        self.store.put(handle.clone())?;
        info!(session = %session_key, index = %handle.id, "created knowledge base");
        Ok(handle)
    }

    /// Best-effort provider-side delete, then drop the cache entry. Returns
    /// whether an entry existed.
    pub async fn invalidate<P>(&self, provider: &P, session_key: &SessionKey) -> Result<bool>
    where
        P: VectorIndex + ?Sized,
    {
        let lock = self.session_lock(session_key);
        let existed = {
            let _guard = lock.lock().await;
            self.remove_handle(provider, session_key).await
        };
        drop(lock);
        // Only the map's own reference left means no caller is queued on it.
        self.locks.remove_if(session_key, |_, held| Arc::strong_count(held) == 1);
        existed
    }

    async fn remove_handle<P>(&self, provider: &P, session_key: &SessionKey) -> Result<bool>
    where
        P: VectorIndex + ?Sized,
    {
        let Some(handle) = self.store.get(session_key)? else {
            return Ok(false);
        };

        if let Err(e) = provider.delete_vector_store(&handle.id).await {
            warn!(
                session = %session_key,
                index = %handle.id,
                "failed to delete knowledge base at provider: {e}"
            );
        }
        self.store.remove(session_key)?;
        info!(session = %session_key, index = %handle.id, "knowledge base invalidated");
        Ok(true)
    }

    /// Cached handle without probing the provider.
    pub fn current(&self, session_key: &SessionKey) -> Result<Option<KnowledgeBaseHandle>> {
        self.store.get(session_key)
    }

    pub fn handles(&self) -> Result<Vec<KnowledgeBaseHandle>> {
        self.store.list()
    }
}
