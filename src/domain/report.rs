//! Patient report records -- the clinical record authored after a dispatch.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::{Record, Validate, non_empty_if_set, require_non_empty};
use crate::store::EntityStore;

/// Who pays for the call-out and how.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub responsible: String,
    pub method: String,
}

/// The patient's medical aid details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientMedicalAid {
    pub name: String,
    pub plan: String,
    pub number: String,
}

/// Vital signs as captured on scene. Free text, as written by the crew.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub bp: String,
    pub pulse: String,
    pub temp: String,
    pub spo2: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalInfo {
    pub symptoms: Vec<String>,
    pub vitals: Vitals,
    pub treatment: Vec<String>,
}

/// Hand-over of the patient to a receiving facility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Handover {
    pub facility: String,
    pub staff: String,
    pub time: String,
}

/// A patient report. Linked to a patient, a dispatch and the authoring crew
/// member by id only; the links are not checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientReport {
    pub id: String,
    pub patient_id: String,
    pub dispatch_id: String,
    pub staff_id: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub payment_info: PaymentInfo,
    pub care_level: String,
    pub medical_aid: PatientMedicalAid,
    pub clinical_info: ClinicalInfo,
    pub disposition: String,
    pub handover: Handover,
}

/// Input for authoring a report. The timestamp is stamped on add.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientReportDraft {
    pub patient_id: String,
    pub dispatch_id: String,
    pub staff_id: String,
    pub payment_info: PaymentInfo,
    pub care_level: String,
    pub medical_aid: PatientMedicalAid,
    pub clinical_info: ClinicalInfo,
    pub disposition: String,
    pub handover: Handover,
}

/// Partial update of a report. The creation timestamp cannot be patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientReportPatch {
    pub patient_id: Option<String>,
    pub dispatch_id: Option<String>,
    pub staff_id: Option<String>,
    pub payment_info: Option<PaymentInfo>,
    pub care_level: Option<String>,
    pub medical_aid: Option<PatientMedicalAid>,
    pub clinical_info: Option<ClinicalInfo>,
    pub disposition: Option<String>,
    pub handover: Option<Handover>,
}

impl Validate for PatientReportDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("patientId", &self.patient_id)?;
        require_non_empty("careLevel", &self.care_level)
    }
}

impl Validate for PatientReportPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty_if_set("patientId", self.patient_id.as_ref())?;
        non_empty_if_set("careLevel", self.care_level.as_ref())
    }
}

impl Record for PatientReport {
    const COLLECTION: &'static str = "reports";
    const NOUN: &'static str = "report";
    const PLURAL: &'static str = "reports";

    type Draft = PatientReportDraft;
    type Patch = PatientReportPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_draft(id: String, draft: PatientReportDraft, now_millis: u64) -> Self {
        Self {
            id,
            patient_id: draft.patient_id,
            dispatch_id: draft.dispatch_id,
            staff_id: draft.staff_id,
            timestamp: now_millis,
            payment_info: draft.payment_info,
            care_level: draft.care_level,
            medical_aid: draft.medical_aid,
            clinical_info: draft.clinical_info,
            disposition: draft.disposition,
            handover: draft.handover,
        }
    }

    fn apply_patch(mut self, patch: PatientReportPatch) -> Self {
        if let Some(v) = patch.patient_id {
            self.patient_id = v;
        }
        if let Some(v) = patch.dispatch_id {
            self.dispatch_id = v;
        }
        if let Some(v) = patch.staff_id {
            self.staff_id = v;
        }
        if let Some(v) = patch.payment_info {
            self.payment_info = v;
        }
        if let Some(v) = patch.care_level {
            self.care_level = v;
        }
        if let Some(v) = patch.medical_aid {
            self.medical_aid = v;
        }
        if let Some(v) = patch.clinical_info {
            self.clinical_info = v;
        }
        if let Some(v) = patch.disposition {
            self.disposition = v;
        }
        if let Some(v) = patch.handover {
            self.handover = v;
        }
        self
    }
}

impl EntityStore<PatientReport> {
    /// Reports filed against `dispatch_id`.
    pub fn for_dispatch(&self, dispatch_id: &str) -> Vec<PatientReport> {
        self.with_records(|reports| {
            reports
                .iter()
                .filter(|r| r.dispatch_id == dispatch_id)
                .cloned()
                .collect()
        })
    }
}
