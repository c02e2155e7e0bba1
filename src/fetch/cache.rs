use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OnceCell};

use crate::config::ExternalReferenceConfig;
use crate::types::{ExternalReference, ExternalReferenceKind, MystXrefs, RemoteDocument};

use super::Fetch;

type Slot<T> = Arc<OnceCell<Option<Arc<T>>>>;

/// Url-keyed memo table with at most one fetch in flight per url.
///
/// The first caller for a url performs the fetch; concurrent callers await
/// the same cell. Failures are memoized as `None`.
struct MemoTable<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T: DeserializeOwned> MemoTable<T> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn get_or_fetch(&self, url: &str, fetcher: &dyn Fetch) -> Option<Arc<T>> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(url.to_string()).or_default().clone()
        };
        slot.get_or_init(|| async {
            tracing::debug!(url, "fetching remote data");
            let value = match fetcher.fetch_json(url).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(url, error = %e, "remote fetch failed");
                    return None;
                }
            };
            match serde_json::from_value::<T>(value) {
                Ok(decoded) => Some(Arc::new(decoded)),
                Err(e) => {
                    tracing::warn!(url, error = %e, "remote data has an unexpected shape");
                    None
                }
            }
        })
        .await
        .clone()
    }

    async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}

/// Session-wide cache of remote reference indices and remote documents.
///
/// Shared by every concurrent resolution task of one compilation; entries
/// are never evicted.
pub struct ExternalReferenceCache {
    fetcher: Arc<dyn Fetch>,
    documents: MemoTable<RemoteDocument>,
    indices: MemoTable<MystXrefs>,
}

impl ExternalReferenceCache {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            documents: MemoTable::new(),
            indices: MemoTable::new(),
        }
    }

    /// Fetches the remote document at `url`, or `None` if it could not be
    /// fetched or decoded.
    pub async fn fetch(&self, url: &str) -> Option<Arc<RemoteDocument>> {
        self.documents.get_or_fetch(url, self.fetcher.as_ref()).await
    }

    /// Fetches the reference index of one external project.
    ///
    /// Non-MyST projects have no index; a failed fetch yields a record
    /// without one.
    pub async fn fetch_references(&self, reference: &ExternalReferenceConfig) -> ExternalReference {
        let mut record = reference.unloaded();
        if reference.kind != ExternalReferenceKind::Myst {
            return record;
        }
        let index_url = reference.index_url();
        match self.indices.get_or_fetch(&index_url, self.fetcher.as_ref()).await {
            Some(index) => record.value = Some(index.as_ref().clone()),
            None => tracing::warn!(
                key = %reference.key,
                url = %index_url,
                "could not load external references"
            ),
        }
        record
    }

    /// Loads every configured external project concurrently.
    pub async fn load_references(
        &self,
        references: &[ExternalReferenceConfig],
    ) -> Vec<ExternalReference> {
        futures::future::join_all(references.iter().map(|r| self.fetch_references(r))).await
    }

    /// Number of distinct document urls requested so far.
    pub async fn document_count(&self) -> usize {
        self.documents.len().await
    }
}
