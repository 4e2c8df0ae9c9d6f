//! # Core Domain Entities
//!
//! The patient record as stored and returned, and the unassigned payload a
//! caller submits to create one.

use crate::errors::ValidationError;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the ingestion worker. Never reused.
pub type PatientId = u64;

/// Lowest and highest accepted ABO blood group codes (O, A, B, AB).
pub const BLOOD_TYPE_RANGE: std::ops::RangeInclusive<u8> = 1..=4;

/// Accepted Rh factor markers.
pub const RH_FACTORS: [&str; 2] = ["+", "-"];

/// Column order of a staged batch and of the `patients` table.
pub const PATIENT_COLUMNS: [&str; 6] = [
    "id",
    "name",
    "last_name",
    "date_of_birth",
    "blood_type",
    "rh_factor",
];

/// A patient that has been assigned a durable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Identity assigned exactly once by the ingestion worker.
    pub id: PatientId,
    /// Given name.
    pub name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth, `YYYY-MM-DD` or RFC 3339.
    pub date_of_birth: String,
    /// ABO group code.
    pub blood_type: u8,
    /// `+` or `-`.
    pub rh_factor: String,
}

/// Payload of a create command; everything but the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatient {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub blood_type: u8,
    #[serde(default)]
    pub rh_factor: String,
}

impl NewPatient {
    /// Check that every required field is present and well-formed.
    ///
    /// Missing fields deserialize to their empty defaults and are rejected
    /// here, so a single error path covers "missing" and "malformed".
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ValidationError::MissingField("last_name"));
        }
        if self.date_of_birth.trim().is_empty() {
            return Err(ValidationError::MissingField("date_of_birth"));
        }
        if !is_valid_date(self.date_of_birth.trim()) {
            return Err(ValidationError::InvalidDate(self.date_of_birth.clone()));
        }
        if !BLOOD_TYPE_RANGE.contains(&self.blood_type) {
            return Err(ValidationError::InvalidBloodType(self.blood_type));
        }
        if !RH_FACTORS.contains(&self.rh_factor.as_str()) {
            return Err(ValidationError::InvalidRhFactor(self.rh_factor.clone()));
        }
        Ok(())
    }

    /// Attach an assigned id, producing the durable record.
    pub fn into_record(self, id: PatientId) -> PatientRecord {
        PatientRecord {
            id,
            name: self.name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            date_of_birth: self.date_of_birth.trim().to_string(),
            blood_type: self.blood_type,
            rh_factor: self.rh_factor,
        }
    }
}

fn is_valid_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
}

/// Parse a requested patient id as sent on the wire or in a URL path.
///
/// Rejects non-numeric text and anything `<= 0`.
pub fn parse_patient_id(raw: &str) -> Result<PatientId, ValidationError> {
    let id: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidId(raw.to_string()))?;
    check_patient_id(id)
}

/// Reject ids `<= 0`.
pub fn check_patient_id(id: i64) -> Result<PatientId, ValidationError> {
    if id <= 0 {
        return Err(ValidationError::InvalidId(id.to_string()));
    }
    Ok(id as PatientId)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> NewPatient {
        NewPatient {
            name: "Ann".into(),
            last_name: "Li".into(),
            date_of_birth: "1990-01-01".into(),
            blood_type: 2,
            rh_factor: "+".into(),
        }
    }

    #[test]
    fn test_valid_patient_passes() {
        assert!(ann().validate().is_ok());
    }

    #[test]
    fn test_rfc3339_date_accepted() {
        let mut p = ann();
        p.date_of_birth = "1990-01-01T00:00:00Z".into();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_missing_name_rejected() {
        let mut p = ann();
        p.name = "   ".into();
        assert_eq!(p.validate(), Err(ValidationError::MissingField("name")));
    }

    #[test]
    fn test_bad_date_rejected() {
        let mut p = ann();
        p.date_of_birth = "01/01/1990".into();
        assert!(matches!(p.validate(), Err(ValidationError::InvalidDate(_))));
    }

    #[test]
    fn test_blood_type_out_of_range_rejected() {
        let mut p = ann();
        p.blood_type = 0;
        assert_eq!(p.validate(), Err(ValidationError::InvalidBloodType(0)));
        p.blood_type = 5;
        assert_eq!(p.validate(), Err(ValidationError::InvalidBloodType(5)));
    }

    #[test]
    fn test_rh_factor_rejected() {
        let mut p = ann();
        p.rh_factor = "positive".into();
        assert!(matches!(p.validate(), Err(ValidationError::InvalidRhFactor(_))));
    }

    #[test]
    fn test_missing_json_fields_fail_validation() {
        let p: NewPatient = serde_json::from_str(r#"{"name":"Ann"}"#).unwrap();
        assert_eq!(p.validate(), Err(ValidationError::MissingField("last_name")));
    }

    #[test]
    fn test_into_record_keeps_fields() {
        let record = ann().into_record(7);
        assert_eq!(record.id, 7);
        assert_eq!(record.name, "Ann");
        assert_eq!(record.rh_factor, "+");
    }

    #[test]
    fn test_parse_patient_id() {
        assert_eq!(parse_patient_id("42"), Ok(42));
        assert!(parse_patient_id("0").is_err());
        assert!(parse_patient_id("-3").is_err());
        assert!(parse_patient_id("abc").is_err());
    }
}
