//! Generic entity store: an in-memory cache mirroring one persisted
//! collection, with a create/update/load contract and change subscription.
//!
//! Every mutation writes to the [`RecordStorage`] first and only then
//! updates the cache, so readers never observe a record that failed to
//! persist. Mutations on one store are serialized; reads never block.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::Instrument;

use crate::error::{StorageError, StoreError};
use crate::ids::{Clock, IdGenerator};
use crate::record::{Record, Validate};
use crate::storage::RecordStorage;

/// Read state of an [`EntityStore`], as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState<R> {
    /// Cached records, in collection order followed by records added since
    /// the last load.
    pub records: Vec<R>,
    /// `true` while a [`load`](EntityStore::load) is in flight.
    pub loading: bool,
    /// Message describing the most recent failed operation, cleared by the
    /// next successful one.
    pub error: Option<String>,
}

// Manual `Default` so `R` itself need not be `Default`.
impl<R> Default for StoreState<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Clears `loading` when a load ends, including when its future is dropped
/// mid-read.
struct LoadingGuard<'a, R> {
    state: &'a watch::Sender<StoreState<R>>,
}

impl<'a, R> LoadingGuard<'a, R> {
    fn start(state: &'a watch::Sender<StoreState<R>>) -> Self {
        state.send_modify(|s| s.loading = true);
        Self { state }
    }
}

impl<R> Drop for LoadingGuard<'_, R> {
    fn drop(&mut self) {
        self.state
            .send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }
}

/// In-memory cache and mutation API bound to one collection.
///
/// The store exclusively owns its cache. Callers read through
/// [`records`](EntityStore::records), [`get`](EntityStore::get) or a
/// [`subscribe`](EntityStore::subscribe) receiver and change records only
/// through [`add`](EntityStore::add) and [`update`](EntityStore::update).
pub struct EntityStore<R: Record> {
    storage: Arc<dyn RecordStorage>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<StoreState<R>>,
    writes: Mutex<()>,
}

impl<R: Record> std::fmt::Debug for EntityStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EntityStore")
            .field("collection", &R::COLLECTION)
            .field("records", &state.records.len())
            .field("loading", &state.loading)
            .field("error", &state.error)
            .finish()
    }
}

impl<R: Record> EntityStore<R> {
    /// Create an empty store over `R::COLLECTION`.
    ///
    /// The cache starts empty; call [`load`](EntityStore::load) to populate
    /// it from storage.
    pub fn new(
        storage: Arc<dyn RecordStorage>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            storage,
            ids,
            clock,
            state,
            writes: Mutex::new(()),
        }
    }

    /// The collection this store mirrors.
    pub fn collection(&self) -> &'static str {
        R::COLLECTION
    }

    /// The storage backend this store writes through.
    pub(crate) fn storage(&self) -> &Arc<dyn RecordStorage> {
        &self.storage
    }

    /// Replace the cache with the full current collection.
    ///
    /// Records that do not decode as `R` are skipped with a warning.
    ///
    /// # Errors
    ///
    /// [`StoreError::Storage`] if the collection cannot be read. The cache
    /// keeps its previous contents and the error message is recorded.
    pub async fn load(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!("load", collection = R::COLLECTION);
        let result: Result<(), StoreError> = async {
            let _guard = self.writes.lock().await;
            let _loading = LoadingGuard::start(&self.state);

            let values = self.storage.get_all(R::COLLECTION).await?;

            let records: Vec<R> = values
                .into_iter()
                .filter_map(|value| match serde_json::from_value::<R>(value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping undecodable record");
                        None
                    }
                })
                .collect();

            tracing::debug!(count = records.len(), "collection loaded");
            self.state.send_modify(|s| {
                s.records = records;
                s.loading = false;
                s.error = None;
            });
            Ok(())
        }
        .instrument(span)
        .await;

        self.settle(result, &format!("Failed to load {}", R::PLURAL))
    }

    /// Create a record from `draft`, persist it, then append it to the cache.
    ///
    /// A new id is generated and the creation time stamped before the
    /// record is built.
    ///
    /// # Returns
    ///
    /// The created record.
    ///
    /// # Errors
    ///
    /// * [`StoreError::Validation`] -- a draft field is invalid.
    /// * [`StoreError::Storage`] -- the write failed. The cache is unchanged.
    pub async fn add(&self, draft: R::Draft) -> Result<R, StoreError> {
        let span = tracing::info_span!("add", collection = R::COLLECTION);
        let result: Result<R, StoreError> = async {
            draft.validate()?;
            let _guard = self.writes.lock().await;

            let id = self.ids.next_id();
            let record = R::from_draft(id, draft, self.clock.now_millis());
            let value = serde_json::to_value(&record).map_err(StorageError::from)?;
            self.storage.add(R::COLLECTION, record.id(), value).await?;

            self.state.send_modify(|s| {
                s.records.push(record.clone());
                s.error = None;
            });
            tracing::info!(id = record.id(), "record added");
            Ok(record)
        }
        .instrument(span)
        .await;

        self.settle(result, &format!("Failed to add {}", R::NOUN))
    }

    /// Merge `patch` over the cached record `id`, persist the result, then
    /// replace the cached entry in place.
    ///
    /// # Returns
    ///
    /// The merged record.
    ///
    /// # Errors
    ///
    /// * [`StoreError::NotFound`] -- no cached record has this id. Nothing
    ///   is written.
    /// * [`StoreError::Validation`] -- a patch field is invalid.
    /// * [`StoreError::Storage`] -- the write failed. The cache is unchanged.
    pub async fn update(&self, id: &str, patch: R::Patch) -> Result<R, StoreError> {
        self.update_with_message(id, patch, &format!("Failed to update {}", R::NOUN))
            .await
    }

    /// [`update`](EntityStore::update) recording `failure` as the error
    /// message when it fails.
    pub(crate) async fn update_with_message(
        &self,
        id: &str,
        patch: R::Patch,
        failure: &str,
    ) -> Result<R, StoreError> {
        let span = tracing::info_span!("update", collection = R::COLLECTION, id = %id);
        let result: Result<R, StoreError> = async {
            let _guard = self.writes.lock().await;
            let current = self.get(id).ok_or_else(|| StoreError::NotFound {
                collection: R::COLLECTION,
                id: id.to_owned(),
            })?;
            patch.validate()?;

            let merged = current.apply_patch(patch);
            debug_assert_eq!(merged.id(), id, "patches must not change the id");
            let value = serde_json::to_value(&merged).map_err(StorageError::from)?;
            self.storage.put(R::COLLECTION, id, value).await?;

            self.state.send_modify(|s| {
                if let Some(slot) = s.records.iter_mut().find(|r| r.id() == id) {
                    *slot = merged.clone();
                }
                s.error = None;
            });
            tracing::info!("record updated");
            Ok(merged)
        }
        .instrument(span)
        .await;

        self.settle(result, failure)
    }

    /// Record a failure message (or pass success through unchanged).
    fn settle<T>(&self, result: Result<T, StoreError>, failure: &str) -> Result<T, StoreError> {
        if let Err(ref e) = result {
            tracing::error!(collection = R::COLLECTION, error = %e, "{failure}");
            self.state.send_modify(|s| s.error = Some(failure.to_owned()));
        }
        result
    }

    /// A clone of every cached record, in order.
    pub fn records(&self) -> Vec<R> {
        self.state.borrow().records.clone()
    }

    /// Run `f` over the cached records without cloning them.
    pub fn with_records<T>(&self, f: impl FnOnce(&[R]) -> T) -> T {
        f(&self.state.borrow().records)
    }

    /// A clone of the cached record with this id.
    pub fn get(&self, id: &str) -> Option<R> {
        self.state
            .borrow()
            .records
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.state.borrow().records.len()
    }

    /// Returns `true` if the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` while a load is in flight.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// The message recorded by the most recent failed operation.
    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Clear the recorded error message (e.g. once it has been shown).
    pub fn dismiss_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    /// A clone of the full read state.
    pub fn snapshot(&self) -> StoreState<R> {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    ///
    /// The receiver sees the current state immediately and is notified
    /// after every load, mutation or recorded error.
    pub fn subscribe(&self) -> watch::Receiver<StoreState<R>> {
        self.state.subscribe()
    }

    /// Drop the cache and any recorded error. Storage is untouched.
    pub(crate) fn reset(&self) {
        self.state.send_replace(StoreState::default());
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use serde::{Deserialize, Serialize};

    use crate::error::ValidationError;
    use crate::record::{Record, Validate, non_empty_if_set, require_non_empty};

    /// A minimal inventory record used to exercise the generic store.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Item {
        pub id: String,
        pub title: String,
        pub qty: u32,
        pub created_at: u64,
    }

    #[derive(Debug, Clone, Default)]
    pub(crate) struct ItemDraft {
        pub title: String,
        pub qty: u32,
    }

    #[derive(Debug, Clone, Default)]
    pub(crate) struct ItemPatch {
        pub title: Option<String>,
        pub qty: Option<u32>,
    }

    impl Validate for ItemDraft {
        fn validate(&self) -> Result<(), ValidationError> {
            require_non_empty("title", &self.title)
        }
    }

    impl Validate for ItemPatch {
        fn validate(&self) -> Result<(), ValidationError> {
            non_empty_if_set("title", self.title.as_ref())
        }
    }

    impl Record for Item {
        const COLLECTION: &'static str = "items";
        const NOUN: &'static str = "item";
        const PLURAL: &'static str = "items";

        type Draft = ItemDraft;
        type Patch = ItemPatch;

        fn id(&self) -> &str {
            &self.id
        }

        fn from_draft(id: String, draft: ItemDraft, now_millis: u64) -> Self {
            Self {
                id,
                title: draft.title,
                qty: draft.qty,
                created_at: now_millis,
            }
        }

        fn apply_patch(mut self, patch: ItemPatch) -> Self {
            if let Some(title) = patch.title {
                self.title = title;
            }
            if let Some(qty) = patch.qty {
                self.qty = qty;
            }
            self
        }
    }

    pub(crate) fn draft(title: &str, qty: u32) -> ItemDraft {
        ItemDraft {
            title: title.into(),
            qty,
        }
    }
}
