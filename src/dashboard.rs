//! Dashboard read model derived from the entity stores.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{
    Dispatch, DispatchStatus, GeoPoint, PatientReport, Staff, StaffStatus, Vehicle, VehicleStatus,
};

/// A vehicle marker for the map view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleMarker {
    pub vehicle_id: String,
    pub call_sign: String,
    pub status: VehicleStatus,
    pub position: GeoPoint,
}

/// Headline numbers and map markers for the dispatch dashboard.
///
/// Recomputed from scratch on every call; it holds no state of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Dispatches that are not completed.
    pub active_dispatches: usize,
    pub available_staff: usize,
    pub available_vehicles: usize,
    /// Completed dispatches with no patient report filed against them.
    pub pending_reports: usize,
    /// Vehicles with a known location.
    pub markers: Vec<VehicleMarker>,
}

impl Dashboard {
    /// Derive the dashboard from the current records.
    pub fn compute(
        staff: &[Staff],
        vehicles: &[Vehicle],
        reports: &[PatientReport],
        dispatches: &[Dispatch],
    ) -> Self {
        let reported: HashSet<&str> = reports.iter().map(|r| r.dispatch_id.as_str()).collect();

        let markers = vehicles
            .iter()
            .filter_map(|v| {
                v.location.map(|position| VehicleMarker {
                    vehicle_id: v.id.clone(),
                    call_sign: v.call_sign.clone(),
                    status: v.status,
                    position,
                })
            })
            .collect();

        Self {
            active_dispatches: dispatches
                .iter()
                .filter(|d| d.status != DispatchStatus::Completed)
                .count(),
            available_staff: staff
                .iter()
                .filter(|s| s.status == StaffStatus::Available)
                .count(),
            available_vehicles: vehicles
                .iter()
                .filter(|v| v.status == VehicleStatus::Available)
                .count(),
            pending_reports: dispatches
                .iter()
                .filter(|d| d.status == DispatchStatus::Completed)
                .filter(|d| !reported.contains(d.id.as_str()))
                .count(),
            markers,
        }
    }
}
