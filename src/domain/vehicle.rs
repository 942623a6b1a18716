//! Vehicle roster records -- ambulances, response and support vehicles.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, ValidationError};
use crate::record::{Record, Validate, check_coordinates, non_empty_if_set, require_non_empty};
use crate::store::EntityStore;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Operational status of a vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleStatus {
    #[default]
    Available,
    Dispatched,
    Maintenance,
}

/// Last known position of a vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A vehicle on the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    /// Generated at creation; never reassigned.
    pub id: String,
    /// Classification, e.g. "ambulance", "response", "support".
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub registration_no: String,
    pub call_sign: String,
    pub make: String,
    pub model: String,
    pub year: String,
    pub status: VehicleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

// ---------------------------------------------------------------------------
// Draft / patch
// ---------------------------------------------------------------------------

/// Input for adding a vehicle. New vehicles have no known location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleDraft {
    pub vehicle_type: String,
    pub registration_no: String,
    pub call_sign: String,
    pub make: String,
    pub model: String,
    pub year: String,
    pub status: VehicleStatus,
}

/// Partial update of a vehicle. `None` leaves a field unchanged;
/// `location: Some(None)` clears the last known location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehiclePatch {
    pub vehicle_type: Option<String>,
    pub registration_no: Option<String>,
    pub call_sign: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub status: Option<VehicleStatus>,
    pub location: Option<Option<GeoPoint>>,
}

impl Validate for VehicleDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("type", &self.vehicle_type)?;
        require_non_empty("registrationNo", &self.registration_no)?;
        require_non_empty("callSign", &self.call_sign)?;
        require_non_empty("make", &self.make)?;
        require_non_empty("model", &self.model)?;
        require_non_empty("year", &self.year)
    }
}

impl Validate for VehiclePatch {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty_if_set("type", self.vehicle_type.as_ref())?;
        non_empty_if_set("registrationNo", self.registration_no.as_ref())?;
        non_empty_if_set("callSign", self.call_sign.as_ref())?;
        non_empty_if_set("make", self.make.as_ref())?;
        non_empty_if_set("model", self.model.as_ref())?;
        non_empty_if_set("year", self.year.as_ref())?;
        if let Some(Some(point)) = self.location {
            check_coordinates(point.lat, point.lng)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Record impl
// ---------------------------------------------------------------------------

impl Record for Vehicle {
    const COLLECTION: &'static str = "vehicles";
    const NOUN: &'static str = "vehicle";
    const PLURAL: &'static str = "vehicles";

    type Draft = VehicleDraft;
    type Patch = VehiclePatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_draft(id: String, draft: VehicleDraft, _now_millis: u64) -> Self {
        Self {
            id,
            vehicle_type: draft.vehicle_type,
            registration_no: draft.registration_no,
            call_sign: draft.call_sign,
            make: draft.make,
            model: draft.model,
            year: draft.year,
            status: draft.status,
            location: None,
        }
    }

    fn apply_patch(mut self, patch: VehiclePatch) -> Self {
        if let Some(v) = patch.vehicle_type {
            self.vehicle_type = v;
        }
        if let Some(v) = patch.registration_no {
            self.registration_no = v;
        }
        if let Some(v) = patch.call_sign {
            self.call_sign = v;
        }
        if let Some(v) = patch.make {
            self.make = v;
        }
        if let Some(v) = patch.model {
            self.model = v;
        }
        if let Some(v) = patch.year {
            self.year = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.location {
            self.location = v;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Store operations
// ---------------------------------------------------------------------------

impl EntityStore<Vehicle> {
    /// Record a vehicle's last known position.
    ///
    /// # Errors
    ///
    /// * [`StoreError::NotFound`] -- unknown vehicle id.
    /// * [`StoreError::Validation`] -- coordinates out of range.
    /// * [`StoreError::Storage`] -- the write failed.
    pub async fn update_location(
        &self,
        id: &str,
        lat: f64,
        lng: f64,
    ) -> Result<Vehicle, StoreError> {
        let patch = VehiclePatch {
            location: Some(Some(GeoPoint { lat, lng })),
            ..Default::default()
        };
        self.update_with_message(id, patch, "Failed to update vehicle location")
            .await
    }

    /// Set a vehicle's status. Any status may follow any other.
    pub async fn set_status(
        &self,
        id: &str,
        status: VehicleStatus,
    ) -> Result<Vehicle, StoreError> {
        self.update(
            id,
            VehiclePatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// Vehicles currently in `status`.
    pub fn with_status(&self, status: VehicleStatus) -> Vec<Vehicle> {
        self.with_records(|vehicles| {
            vehicles
                .iter()
                .filter(|v| v.status == status)
                .cloned()
                .collect()
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
