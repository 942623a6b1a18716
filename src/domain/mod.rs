//! Dispatch console records.
//!
//! Each module defines one record type (state, draft, patch, validation)
//! and any store operations specific to it.

pub mod dispatch;
pub mod report;
pub mod staff;
pub mod vehicle;

pub use dispatch::{
    BOARD_COLLECTION, Dispatch, DispatchBoard, DispatchDraft, DispatchPatch, DispatchStatus,
    IncidentLocation,
};
pub use report::{
    ClinicalInfo, Handover, PatientMedicalAid, PatientReport, PatientReportDraft,
    PatientReportPatch, PaymentInfo, Vitals,
};
pub use staff::{NextOfKin, Staff, StaffDraft, StaffMedicalAid, StaffPatch, StaffStatus};
pub use vehicle::{GeoPoint, Vehicle, VehicleDraft, VehiclePatch, VehicleStatus};
