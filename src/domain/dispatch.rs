//! Dispatch records -- staff and a vehicle assigned to a patient incident,
//! tracked through `pending -> en-route -> on-scene -> completed`.
//!
//! The status lifecycle is advisory: any status may be written over any
//! other.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StoreError, ValidationError};
use crate::record::{Record, Validate, check_coordinates, non_empty_if_set, require_non_empty};
use crate::store::{EntityStore, StoreState};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchStatus {
    #[default]
    Pending,
    EnRoute,
    OnScene,
    Completed,
}

/// Incident location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatch {
    pub id: String,
    pub staff_id: String,
    pub vehicle_id: String,
    pub patient_id: String,
    pub location: IncidentLocation,
    pub status: DispatchStatus,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Draft / patch
// ---------------------------------------------------------------------------

/// Input for creating a dispatch. `status` defaults to `pending`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchDraft {
    pub staff_id: String,
    pub vehicle_id: String,
    pub patient_id: String,
    pub location: IncidentLocation,
    pub status: Option<DispatchStatus>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchPatch {
    pub staff_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub patient_id: Option<String>,
    pub location: Option<IncidentLocation>,
    pub status: Option<DispatchStatus>,
}

impl Validate for DispatchDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("staffId", &self.staff_id)?;
        require_non_empty("vehicleId", &self.vehicle_id)?;
        check_coordinates(self.location.lat, self.location.lng)
    }
}

impl Validate for DispatchPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty_if_set("staffId", self.staff_id.as_ref())?;
        non_empty_if_set("vehicleId", self.vehicle_id.as_ref())?;
        if let Some(location) = &self.location {
            check_coordinates(location.lat, location.lng)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Record impl
// ---------------------------------------------------------------------------

impl Record for Dispatch {
    const COLLECTION: &'static str = "dispatches";
    const NOUN: &'static str = "dispatch";
    const PLURAL: &'static str = "dispatches";

    type Draft = DispatchDraft;
    type Patch = DispatchPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_draft(id: String, draft: DispatchDraft, now_millis: u64) -> Self {
        Self {
            id,
            staff_id: draft.staff_id,
            vehicle_id: draft.vehicle_id,
            patient_id: draft.patient_id,
            location: draft.location,
            status: draft.status.unwrap_or_default(),
            timestamp: now_millis,
        }
    }

    fn apply_patch(mut self, patch: DispatchPatch) -> Self {
        if let Some(v) = patch.staff_id {
            self.staff_id = v;
        }
        if let Some(v) = patch.vehicle_id {
            self.vehicle_id = v;
        }
        if let Some(v) = patch.patient_id {
            self.patient_id = v;
        }
        if let Some(v) = patch.location {
            self.location = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Collection holding the board's persisted pointer records.
pub const BOARD_COLLECTION: &str = "board";

/// Key of the active-dispatch pointer.
const ACTIVE_KEY: &str = "active";

/// Persisted shape of the active-dispatch pointer.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivePointer {
    id: String,
    dispatch_id: Option<String>,
}

/// The dispatch store plus the dispatch most recently created (the
/// "active" one shown on the board).
///
/// The active dispatch is persisted as a pointer record in
/// [`BOARD_COLLECTION`] and restored by [`load`](DispatchBoard::load).
///
/// # Panics
///
/// Methods panic if the active-id lock is poisoned, which is treated as an
/// invariant violation.
#[derive(Debug)]
pub struct DispatchBoard {
    store: EntityStore<Dispatch>,
    active_id: RwLock<Option<String>>,
}

impl DispatchBoard {
    pub fn new(store: EntityStore<Dispatch>) -> Self {
        Self {
            store,
            active_id: RwLock::new(None),
        }
    }

    /// The underlying entity store.
    pub fn store(&self) -> &EntityStore<Dispatch> {
        &self.store
    }

    /// Reload every dispatch and the active-dispatch pointer from storage.
    ///
    /// # Errors
    ///
    /// [`StoreError::Storage`] if either collection cannot be read.
    pub async fn load(&self) -> Result<(), StoreError> {
        self.store.load().await?;

        let pointers = self.store.storage().get_all(BOARD_COLLECTION).await?;
        let active = pointers
            .into_iter()
            .filter_map(|value| serde_json::from_value::<ActivePointer>(value).ok())
            .find(|p| p.id == ACTIVE_KEY)
            .and_then(|p| p.dispatch_id);
        tracing::debug!(active = ?active, "active dispatch restored");
        *self.active_id.write().expect("active dispatch lock poisoned") = active;
        Ok(())
    }

    /// Create a dispatch and make it the active one.
    ///
    /// The dispatch is persisted first. If the active pointer then fails to
    /// persist, the dispatch is still active for this session and a warning
    /// is logged; only the pointer is lost on reopen.
    pub async fn create(&self, draft: DispatchDraft) -> Result<Dispatch, StoreError> {
        let dispatch = self.store.add(draft).await?;
        *self.active_id.write().expect("active dispatch lock poisoned") =
            Some(dispatch.id.clone());
        if let Err(e) = self.persist_active(Some(&dispatch.id)).await {
            tracing::warn!(id = %dispatch.id, error = %e, "failed to persist active dispatch");
        }
        tracing::info!(id = %dispatch.id, "dispatch is now active");
        Ok(dispatch)
    }

    async fn persist_active(&self, dispatch_id: Option<&str>) -> Result<(), StorageError> {
        let pointer = ActivePointer {
            id: ACTIVE_KEY.to_owned(),
            dispatch_id: dispatch_id.map(str::to_owned),
        };
        let value = serde_json::to_value(&pointer)?;
        self.store
            .storage()
            .put(BOARD_COLLECTION, ACTIVE_KEY, value)
            .await
    }

    /// Merge `patch` over dispatch `id`.
    pub async fn update(&self, id: &str, patch: DispatchPatch) -> Result<Dispatch, StoreError> {
        self.store.update(id, patch).await
    }

    /// Move dispatch `id` to `status`.
    pub async fn update_status(
        &self,
        id: &str,
        status: DispatchStatus,
    ) -> Result<Dispatch, StoreError> {
        self.store
            .update_with_message(
                id,
                DispatchPatch {
                    status: Some(status),
                    ..Default::default()
                },
                "Failed to update dispatch status",
            )
            .await
    }

    /// The current state of the most recently created dispatch, if any.
    pub fn active_dispatch(&self) -> Option<Dispatch> {
        let id = self
            .active_id
            .read()
            .expect("active dispatch lock poisoned")
            .clone()?;
        self.store.get(&id)
    }

    /// Every dispatch that is not yet completed, in board order.
    pub fn active(&self) -> Vec<Dispatch> {
        self.store.with_records(|dispatches| {
            dispatches
                .iter()
                .filter(|d| d.status != DispatchStatus::Completed)
                .cloned()
                .collect()
        })
    }

    pub fn records(&self) -> Vec<Dispatch> {
        self.store.records()
    }

    pub fn get(&self, id: &str) -> Option<Dispatch> {
        self.store.get(id)
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<StoreState<Dispatch>> {
        self.store.subscribe()
    }

    /// Forget the cache and the active dispatch. The persisted pointer is
    /// kept.
    pub(crate) fn reset(&self) {
        self.store.reset();
        *self.active_id.write().expect("active dispatch lock poisoned") = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
