use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use wpa_core::Candidate;
use wpa_storage::{CatalogStore, StoreError};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("candidate has no image url")]
    MissingIdentity,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Single entry point for persisting candidates.
#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn CatalogStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// `Ok(true)` when the candidate was inserted, `Ok(false)` when its identity
    /// already exists.
    pub async fn save_if_new(&self, candidate: &Candidate) -> Result<bool, GateError> {
        if !candidate.has_identity() {
            return Err(GateError::MissingIdentity);
        }
        let inserted = self.store.insert_if_absent(candidate).await?;
        if !inserted {
            debug!(image_url = %candidate.image_url, "duplicate candidate");
        }
        Ok(inserted)
    }
}

/// Recomputes the denormalized `wallpaper_count` of every category.
#[derive(Clone)]
pub struct CountReconciler {
    store: Arc<dyn CatalogStore>,
}

impl CountReconciler {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self) -> Result<u64, StoreError> {
        let updated = self.store.recompute_category_counts().await?;
        info!(categories = updated, "category counts reconciled");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use wpa_storage::MemoryCatalogStore;

    use super::*;

    fn candidate(url: &str, category: &str) -> Candidate {
        Candidate::new(url, category, "Test", "t").unwrap()
    }

    #[tokio::test]
    async fn gate_accepts_once_then_reports_duplicate() {
        let store = Arc::new(MemoryCatalogStore::new());
        let gate = DedupGate::new(store.clone());
        let c = candidate("https://img/1.jpg", "nature");

        let first = gate.save_if_new(&c).await.unwrap();
        let second = gate.save_if_new(&c).await.unwrap();
        assert_eq!((first, second), (true, false));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn gate_rejects_blank_identity_and_surfaces_store_errors() {
        let store = Arc::new(MemoryCatalogStore::new());
        let gate = DedupGate::new(store.clone());

        let mut blank = candidate("https://img/1.jpg", "nature");
        blank.image_url = "   ".to_string();
        assert!(matches!(gate.save_if_new(&blank).await, Err(GateError::MissingIdentity)));

        store.set_unavailable(true);
        let c = candidate("https://img/2.jpg", "nature");
        assert!(matches!(gate.save_if_new(&c).await, Err(GateError::Store(_))));
    }

    #[tokio::test]
    async fn concurrent_saves_of_one_identity_accept_exactly_once() {
        let store = Arc::new(MemoryCatalogStore::new());
        let gate = DedupGate::new(store.clone());
        let c = candidate("https://img/race.jpg", "space");

        let handles = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let c = c.clone();
                tokio::spawn(async move { gate.save_if_new(&c).await.unwrap() })
            })
            .collect::<Vec<_>>();
        let mut accepted = 0;
        for h in handles {
            if h.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn reconciler_counts_per_category_and_is_idempotent() {
        let store = Arc::new(MemoryCatalogStore::new());
        let gate = DedupGate::new(store.clone());
        for i in 0..3 {
            gate.save_if_new(&candidate(&format!("n{i}"), "nature")).await.unwrap();
        }
        for i in 0..2 {
            gate.save_if_new(&candidate(&format!("s{i}"), "space")).await.unwrap();
        }
        store.set_category_count("cars", 0).await;

        let reconciler = CountReconciler::new(store.clone());
        let updated = reconciler.reconcile().await.unwrap();
        assert_eq!(updated, 8);
        reconciler.reconcile().await.unwrap();

        let counts = store
            .categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.slug, c.wallpaper_count))
            .collect::<std::collections::HashMap<_, _>>();
        assert_eq!(counts["nature"], 3);
        assert_eq!(counts["space"], 2);
        assert_eq!(counts["cars"], 0);
        assert_eq!(counts["gaming"], 0);
    }

    #[tokio::test]
    async fn reconciler_propagates_store_failure() {
        let store = Arc::new(MemoryCatalogStore::new());
        store.set_unavailable(true);
        assert!(CountReconciler::new(store).reconcile().await.is_err());
    }
}
