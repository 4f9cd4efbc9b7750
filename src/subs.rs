use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::Subscription;

/// Registry of push subscriptions, unique by endpoint.
///
/// Backing storage is in-memory; constructing the store with a file path makes
/// it durable as a single JSON document that is rewritten wholesale after
/// every mutation. All reads hand out snapshots, so callers may keep iterating
/// a snapshot while delivery failures remove entries underneath them.
#[derive(Clone)]
pub struct SubscriptionStore {
    inner: Arc<Mutex<Vec<Subscription>>>,
    path: Option<PathBuf>,
}

impl SubscriptionStore {
    /// Volatile store; subscriptions are lost on restart.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            path: None,
        }
    }

    /// File-backed store. Loads any existing document; a missing file starts
    /// the store empty.
    pub async fn with_file(path: PathBuf) -> Result<Self> {
        let subs = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<Subscription>>(&bytes)
                .with_context(|| format!("corrupt subscription file: {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", path.display()))
            }
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(subs)),
            path: Some(path),
        })
    }

    /// Idempotent upsert keyed by endpoint. Adding an endpoint that is already
    /// present leaves the store unchanged.
    pub async fn add(&self, sub: Subscription) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if guard.iter().any(|s| s.endpoint == sub.endpoint) {
            debug!(endpoint = %sub.endpoint, "subscription already present");
            return Ok(());
        }
        guard.push(sub);
        self.persist(&guard).await
    }

    /// Idempotent removal by endpoint; removing an absent endpoint is a no-op.
    pub async fn remove(&self, endpoint: &str) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let before = guard.len();
        guard.retain(|s| s.endpoint != endpoint);
        if guard.len() == before {
            return Ok(());
        }
        self.persist(&guard).await
    }

    /// Snapshot of the current subscriptions, in insertion order.
    pub async fn snapshot(&self) -> Vec<Subscription> {
        self.inner.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    async fn persist(&self, subs: &[Subscription]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(subs)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }
}
