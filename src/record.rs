//! Record trait, typed draft/patch contracts and shared field checks.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::ValidationError;

/// Field-by-field validation for drafts and patches.
pub trait Validate {
    /// Return the first invalid field, if any.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// A persisted entity kept in one collection of the record store.
///
/// The implementing type is the full record as stored. Records are created
/// from a [`Draft`](Record::Draft) and changed through a
/// [`Patch`](Record::Patch); nothing else mutates them.
///
/// # Contract
///
/// - [`id`](Record::id) returns the key assigned at creation. It must never
///   change, so no patch may carry an id.
/// - [`apply_patch`](Record::apply_patch) is a shallow merge: each present
///   patch field replaces the corresponding top-level field wholesale
///   (nested structs are not merged), absent fields are left as-is.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name in the record store (e.g. `"staff"`).
    const COLLECTION: &'static str;

    /// Singular noun used in user-facing messages (e.g. `"staff member"`).
    const NOUN: &'static str;

    /// Plural noun used in user-facing messages (e.g. `"staff"`).
    const PLURAL: &'static str;

    /// Create-time input: every user-supplied field.
    type Draft: Validate + Send + 'static;

    /// Partial update: every field optional.
    type Patch: Validate + Send + 'static;

    /// The record's unique identifier.
    fn id(&self) -> &str;

    /// Build the full record from a draft, a freshly generated id and the
    /// creation time in milliseconds since the Unix epoch.
    fn from_draft(id: String, draft: Self::Draft, now_millis: u64) -> Self;

    /// Merge present patch fields over `self`.
    fn apply_patch(self, patch: Self::Patch) -> Self;
}

/// Reject an empty or whitespace-only string.
pub(crate) fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

/// [`require_non_empty`] for a patch field that may be absent.
pub(crate) fn non_empty_if_set(
    field: &'static str,
    value: Option<&String>,
) -> Result<(), ValidationError> {
    value.map_or(Ok(()), |v| require_non_empty(field, v))
}

/// An email is optional, but when given it must look like one.
pub(crate) fn check_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ValidationError::new(field, "must be an email address")),
    }
}

/// Latitude in [-90, 90], longitude in [-180, 180], both finite.
pub(crate) fn check_coordinates(lat: f64, lng: f64) -> Result<(), ValidationError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::new("lat", "must be between -90 and 90"));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(ValidationError::new("lng", "must be between -180 and 180"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_rejects_whitespace() {
        assert!(require_non_empty("name", "Jane").is_ok());
        let err = require_non_empty("name", "   ").unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn non_empty_if_set_skips_absent() {
        assert!(non_empty_if_set("name", None).is_ok());
        assert!(non_empty_if_set("name", Some(&String::new())).is_err());
    }

    #[test]
    fn email_checks() {
        assert!(check_email("email", "").is_ok());
        assert!(check_email("email", "jane@example.org").is_ok());
        assert!(check_email("email", "jane").is_err());
        assert!(check_email("email", "@example.org").is_err());
    }

    #[test]
    fn coordinate_bounds() {
        assert!(check_coordinates(-26.2041, 28.0473).is_ok());
        assert!(check_coordinates(90.5, 0.0).is_err());
        assert_eq!(
            check_coordinates(0.0, -181.0).unwrap_err().field,
            "lng"
        );
        assert!(check_coordinates(f64::NAN, 0.0).is_err());
    }
}
