//! Registry of face composites that can be reused across jobs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use contracts::ArtifactRef;
use tokio::sync::Notify;
use tracing::debug;

use crate::assets::AssetCatalog;

type Pair = (String, String);

/// A preparation accepted for a pair; queued until `start` is called
#[derive(Debug, Default)]
struct Pending {
    running: AtomicBool,
    done: Notify,
}

/// Composited videos keyed by (source video, target face)
#[derive(Debug, Default)]
pub struct PreparedComposites {
    ready: RwLock<HashMap<Pair, ArtifactRef>>,
    pending: RwLock<HashMap<Pair, Arc<Pending>>>,
}

fn key(video: &str, face: &str) -> Pair {
    (video.to_string(), face.to_string())
}

impl PreparedComposites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, video: &str, face: &str, composed: ArtifactRef) {
        debug!(video, face, composed = %composed, "composite registered");
        self.ready
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(video, face), composed);
    }

    pub fn get(&self, video: &str, face: &str) -> Option<ArtifactRef> {
        self.ready
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(video, face))
            .cloned()
    }

    /// Registered composite whose file still exists; stale entries are dropped
    pub async fn lookup_existing(
        &self,
        catalog: &AssetCatalog,
        video: &str,
        face: &str,
    ) -> Option<ArtifactRef> {
        let composed = self.get(video, face)?;
        if catalog.output_exists(&composed).await {
            return Some(composed);
        }
        debug!(video, face, composed = %composed, "composite file gone, forgetting it");
        self.ready
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key(video, face));
        None
    }

    /// Mark a pair as being composed. Returns false if it already was.
    pub fn begin(&self, video: &str, face: &str) -> bool {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);
        if pending.contains_key(&key(video, face)) {
            return false;
        }
        pending.insert(key(video, face), Arc::default());
        true
    }

    /// The pair's preparation left the queue and is composing now
    pub fn start(&self, video: &str, face: &str) {
        if let Some(entry) = self.pending_entry(video, face) {
            entry.running.store(true, Ordering::Release);
        }
    }

    /// Clear the pending mark and wake everyone waiting on it
    pub fn finish(&self, video: &str, face: &str) {
        let entry = self
            .pending
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key(video, face));
        if let Some(entry) = entry {
            entry.done.notify_waiters();
        }
    }

    /// Wait until a running composition of the pair finishes.
    /// Returns false without waiting if none is running; a queued
    /// preparation may be stuck behind the caller.
    pub async fn wait_pending(&self, video: &str, face: &str) -> bool {
        let Some(entry) = self
            .pending_entry(video, face)
            .filter(|entry| entry.running.load(Ordering::Acquire))
        else {
            return false;
        };
        let done = entry.done.notified();
        tokio::pin!(done);
        done.as_mut().enable();
        // finish may have run between the lookup and enable
        if self
            .pending_entry(video, face)
            .is_some_and(|current| Arc::ptr_eq(&current, &entry))
        {
            done.await;
        }
        true
    }

    fn pending_entry(&self, video: &str, face: &str) -> Option<Arc<Pending>> {
        self.pending
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(video, face))
            .cloned()
    }
}
