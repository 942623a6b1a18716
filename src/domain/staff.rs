//! Staff roster records -- crew members, their qualifications and duty status.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, ValidationError};
use crate::record::{Record, Validate, check_email, non_empty_if_set, require_non_empty};
use crate::store::EntityStore;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Duty status of a crew member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaffStatus {
    #[default]
    Available,
    Dispatched,
    OffDuty,
}

/// Emergency contact for a crew member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextOfKin {
    pub name: String,
    pub email: String,
    pub contact: String,
    pub relationship: String,
}

/// A crew member's medical aid membership.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMedicalAid {
    pub name: String,
    pub plan: String,
    pub number: String,
    pub dependent_code: String,
}

/// A crew member on the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    /// Generated at creation; never reassigned.
    pub id: String,
    pub name: String,
    pub surname: String,
    /// Clinical qualification (e.g. "ALS Paramedic").
    pub qualification: String,
    /// Health Professions Council registration number.
    pub hpcsa_number: String,
    pub driving_license: String,
    /// Professional driving permit expiry date (ISO 8601 date string).
    pub pdp_expiry: String,
    pub email: String,
    pub contact: String,
    pub status: StaffStatus,
    pub next_of_kin: NextOfKin,
    pub medical_aid: StaffMedicalAid,
    pub permissions: Vec<String>,
}

impl Staff {
    /// "Name Surname".
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Draft / patch
// ---------------------------------------------------------------------------

/// Input for adding a crew member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaffDraft {
    pub name: String,
    pub surname: String,
    pub qualification: String,
    pub hpcsa_number: String,
    pub driving_license: String,
    pub pdp_expiry: String,
    pub email: String,
    pub contact: String,
    pub status: StaffStatus,
    pub next_of_kin: NextOfKin,
    pub medical_aid: StaffMedicalAid,
    pub permissions: Vec<String>,
}

/// Partial update of a crew member. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaffPatch {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub qualification: Option<String>,
    pub hpcsa_number: Option<String>,
    pub driving_license: Option<String>,
    pub pdp_expiry: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub status: Option<StaffStatus>,
    pub next_of_kin: Option<NextOfKin>,
    pub medical_aid: Option<StaffMedicalAid>,
    pub permissions: Option<Vec<String>>,
}

impl Validate for StaffDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)?;
        require_non_empty("surname", &self.surname)?;
        require_non_empty("hpcsaNumber", &self.hpcsa_number)?;
        require_non_empty("email", &self.email)?;
        check_email("email", &self.email)?;
        require_non_empty("contact", &self.contact)?;
        check_next_of_kin(&self.next_of_kin)
    }
}

impl Validate for StaffPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty_if_set("name", self.name.as_ref())?;
        non_empty_if_set("surname", self.surname.as_ref())?;
        non_empty_if_set("hpcsaNumber", self.hpcsa_number.as_ref())?;
        if let Some(email) = &self.email {
            require_non_empty("email", email)?;
            check_email("email", email)?;
        }
        non_empty_if_set("contact", self.contact.as_ref())?;
        if let Some(kin) = &self.next_of_kin {
            check_next_of_kin(kin)?;
        }
        Ok(())
    }
}

/// Next of kin needs a name and a relationship; their email is optional.
fn check_next_of_kin(kin: &NextOfKin) -> Result<(), ValidationError> {
    require_non_empty("nextOfKin.name", &kin.name)?;
    require_non_empty("nextOfKin.relationship", &kin.relationship)?;
    check_email("nextOfKin.email", &kin.email)
}

// ---------------------------------------------------------------------------
// Record impl
// ---------------------------------------------------------------------------

impl Record for Staff {
    const COLLECTION: &'static str = "staff";
    const NOUN: &'static str = "staff member";
    const PLURAL: &'static str = "staff";

    type Draft = StaffDraft;
    type Patch = StaffPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_draft(id: String, draft: StaffDraft, _now_millis: u64) -> Self {
        Self {
            id,
            name: draft.name,
            surname: draft.surname,
            qualification: draft.qualification,
            hpcsa_number: draft.hpcsa_number,
            driving_license: draft.driving_license,
            pdp_expiry: draft.pdp_expiry,
            email: draft.email,
            contact: draft.contact,
            status: draft.status,
            next_of_kin: draft.next_of_kin,
            medical_aid: draft.medical_aid,
            permissions: draft.permissions,
        }
    }

    fn apply_patch(mut self, patch: StaffPatch) -> Self {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.surname {
            self.surname = v;
        }
        if let Some(v) = patch.qualification {
            self.qualification = v;
        }
        if let Some(v) = patch.hpcsa_number {
            self.hpcsa_number = v;
        }
        if let Some(v) = patch.driving_license {
            self.driving_license = v;
        }
        if let Some(v) = patch.pdp_expiry {
            self.pdp_expiry = v;
        }
        if let Some(v) = patch.email {
            self.email = v;
        }
        if let Some(v) = patch.contact {
            self.contact = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.next_of_kin {
            self.next_of_kin = v;
        }
        if let Some(v) = patch.medical_aid {
            self.medical_aid = v;
        }
        if let Some(v) = patch.permissions {
            self.permissions = v;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Store operations
// ---------------------------------------------------------------------------

impl EntityStore<Staff> {
    /// Set a crew member's duty status. Any status may follow any other.
    pub async fn set_status(&self, id: &str, status: StaffStatus) -> Result<Staff, StoreError> {
        self.update(
            id,
            StaffPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// Crew members currently in `status`.
    pub fn with_status(&self, status: StaffStatus) -> Vec<Staff> {
        self.with_records(|staff| {
            staff
                .iter()
                .filter(|s| s.status == status)
                .cloned()
                .collect()
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> StaffDraft {
        StaffDraft {
            name: "Jane".into(),
            surname: "Doe".into(),
            qualification: "ALS Paramedic".into(),
            hpcsa_number: "PA0123456".into(),
            email: "jane@example.org".into(),
            contact: "082 555 0100".into(),
            next_of_kin: NextOfKin {
                name: "John Doe".into(),
                relationship: "spouse".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(StaffStatus::OffDuty).unwrap(),
            "off-duty"
        );
        let parsed: StaffStatus = serde_json::from_value("dispatched".into()).unwrap();
        assert_eq!(parsed, StaffStatus::Dispatched);
    }

    #[test]
    fn record_serializes_camel_case() {
        let staff = Staff::from_draft("s1".into(), jane(), 0);
        let value = serde_json::to_value(&staff).unwrap();
        assert_eq!(value["hpcsaNumber"], "PA0123456");
        assert_eq!(value["nextOfKin"]["relationship"], "spouse");
        assert_eq!(value["nextOfKin"]["email"], "");
        assert_eq!(value["medicalAid"]["dependentCode"], "");
        assert_eq!(value["status"], "available");
    }

    #[test]
    fn draft_requires_form_fields() {
        assert!(jane().validate().is_ok());

        let blank: [(&str, fn(&mut StaffDraft)); 7] = [
            ("name", |d| d.name.clear()),
            ("surname", |d| d.surname.clear()),
            ("hpcsaNumber", |d| d.hpcsa_number.clear()),
            ("email", |d| d.email.clear()),
            ("contact", |d| d.contact.clear()),
            ("nextOfKin.name", |d| d.next_of_kin.name.clear()),
            ("nextOfKin.relationship", |d| d.next_of_kin.relationship.clear()),
        ];
        for (field, clear) in blank {
            let mut draft = jane();
            clear(&mut draft);
            assert_eq!(draft.validate().unwrap_err().field, field);
        }
    }

    #[test]
    fn draft_with_only_names_and_registration_is_rejected() {
        let draft = StaffDraft {
            name: "Jane".into(),
            surname: "Doe".into(),
            hpcsa_number: "PA0123456".into(),
            ..Default::default()
        };
        assert!(draft.validate().is_err());
    }

    #[test]
    fn next_of_kin_email_is_optional() {
        let draft = jane();
        assert!(draft.next_of_kin.email.is_empty());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn draft_rejects_malformed_email() {
        let err = StaffDraft {
            email: "not-an-email".into(),
            ..jane()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "email");
    }

    #[test]
    fn patch_replaces_next_of_kin_wholesale() {
        let staff = Staff::from_draft(
            "s1".into(),
            StaffDraft {
                next_of_kin: NextOfKin {
                    name: "John".into(),
                    email: "john@example.org".into(),
                    contact: "555-0100".into(),
                    relationship: "spouse".into(),
                },
                ..jane()
            },
            0,
        );

        let patched = staff.apply_patch(StaffPatch {
            next_of_kin: Some(NextOfKin {
                name: "Mary".into(),
                ..Default::default()
            }),
            ..Default::default()
        });

        // Shallow merge: the nested struct is replaced, not merged.
        assert_eq!(patched.next_of_kin.name, "Mary");
        assert_eq!(patched.next_of_kin.contact, "");
        assert_eq!(patched.name, "Jane");
    }

    #[test]
    fn patch_rejects_blank_contact_and_partial_next_of_kin() {
        let err = StaffPatch {
            contact: Some(String::new()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "contact");

        let err = StaffPatch {
            next_of_kin: Some(NextOfKin {
                name: "Mary".into(),
                ..Default::default()
            }),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "nextOfKin.relationship");

        let err = StaffPatch {
            email: Some(String::new()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "email");
    }

    #[test]
    fn patch_rejects_blank_name() {
        let err = StaffPatch {
            name: Some(" ".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn full_name_joins_parts() {
        let staff = Staff::from_draft("s1".into(), jane(), 0);
        assert_eq!(staff.full_name(), "Jane Doe");
    }
}
