use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

id_newtype!(HospitalId);
uuid_newtype!(RequestId);
uuid_newtype!(SubmissionKey);

/// Reference to the user who owns a request. Opaque to this system; issued by
/// the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized {kind} '{value}'")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    pub const ALL: [BloodType; 8] = [
        BloodType::APositive,
        BloodType::ANegative,
        BloodType::BPositive,
        BloodType::BNegative,
        BloodType::AbPositive,
        BloodType::AbNegative,
        BloodType::OPositive,
        BloodType::ONegative,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BloodType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        BloodType::ALL
            .into_iter()
            .find(|blood_type| blood_type.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseLabelError {
                kind: "blood type",
                value: s.to_string(),
            })
    }
}

/// How soon the blood is needed. Labels outside the known set read back as
/// `Unrecognized` so legacy rows never break a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Critical,
    Urgent,
    Routine,
    #[serde(other)]
    Unrecognized,
}

impl Urgency {
    pub fn label(self) -> &'static str {
        match self {
            Urgency::Critical => "critical",
            Urgency::Urgent => "urgent",
            Urgency::Routine => "routine",
            Urgency::Unrecognized => "unrecognized",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Urgency::Critical,
            "urgent" => Urgency::Urgent,
            "routine" => Urgency::Routine,
            _ => Urgency::Unrecognized,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Urgency {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Urgency::from_label(s) {
            Urgency::Unrecognized => Err(ParseLabelError {
                kind: "urgency",
                value: s.to_string(),
            }),
            urgency => Ok(urgency),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Unrecognized,
}

impl RequestStatus {
    pub fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Unrecognized => "unrecognized",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "pending" => RequestStatus::Pending,
            "approved" => RequestStatus::Approved,
            "rejected" => RequestStatus::Rejected,
            _ => RequestStatus::Unrecognized,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Limited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: HospitalId,
    pub name: String,
    pub location: String,
    pub distance: String,
    pub phone: String,
    pub availability: Availability,
    pub blood_bank: bool,
}

/// In-progress form state. Every field may still be blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    #[serde(default)]
    pub patient_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<BloodType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units_needed: Option<u32>,
    #[serde(default)]
    pub contact_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_notes: Option<String>,
}

pub const MAX_PATIENT_AGE: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    PatientName,
    Age,
    BloodType,
    Urgency,
    UnitsNeeded,
    ContactNumber,
}

impl DraftField {
    pub fn label(self) -> &'static str {
        match self {
            DraftField::PatientName => "patient name",
            DraftField::Age => "age",
            DraftField::BloodType => "blood type",
            DraftField::Urgency => "urgency",
            DraftField::UnitsNeeded => "units needed",
            DraftField::ContactNumber => "contact number",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("missing required fields: {}", join_labels(.0))]
    MissingFields(Vec<DraftField>),
    #[error("invalid {}: {reason}", .field.label())]
    InvalidField { field: DraftField, reason: String },
}

fn join_labels(fields: &[DraftField]) -> String {
    fields
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RequestDraft {
    pub fn is_blank(&self) -> bool {
        *self == RequestDraft::default()
    }

    /// Mandatory fields that are absent or blank, in form order.
    pub fn missing_fields(&self) -> Vec<DraftField> {
        let mut missing = Vec::new();
        if self.patient_name.trim().is_empty() {
            missing.push(DraftField::PatientName);
        }
        if self.blood_type.is_none() {
            missing.push(DraftField::BloodType);
        }
        if matches!(self.urgency, None | Some(Urgency::Unrecognized)) {
            missing.push(DraftField::Urgency);
        }
        if self.contact_number.trim().is_empty() {
            missing.push(DraftField::ContactNumber);
        }
        missing
    }

    pub fn validate(&self) -> Result<RequestDetails, DraftError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(DraftError::MissingFields(missing));
        }
        if self.units_needed == Some(0) {
            return Err(DraftError::InvalidField {
                field: DraftField::UnitsNeeded,
                reason: "must be at least 1".into(),
            });
        }
        if self.age.is_some_and(|age| age > MAX_PATIENT_AGE) {
            return Err(DraftError::InvalidField {
                field: DraftField::Age,
                reason: format!("must be at most {MAX_PATIENT_AGE}"),
            });
        }
        let (Some(blood_type), Some(urgency)) = (self.blood_type, self.urgency) else {
            return Err(DraftError::MissingFields(vec![DraftField::BloodType]));
        };

        Ok(RequestDetails {
            patient_name: self.patient_name.trim().to_string(),
            age: self.age,
            blood_type,
            urgency,
            units_needed: self.units_needed,
            contact_number: self.contact_number.trim().to_string(),
            address: non_blank(self.address.as_deref()),
            medical_notes: non_blank(self.medical_notes.as_deref()),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// A draft that passed validation. Only this shape is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetails {
    pub patient_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub blood_type: BloodType,
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units_needed: Option<u32>,
    pub contact_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_notes: Option<String>,
}

impl From<RequestDetails> for RequestDraft {
    fn from(details: RequestDetails) -> Self {
        Self {
            patient_name: details.patient_name,
            age: details.age,
            blood_type: Some(details.blood_type),
            urgency: Some(details.urgency),
            units_needed: details.units_needed,
            contact_number: details.contact_number,
            address: details.address,
            medical_notes: details.medical_notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodRequest {
    pub id: RequestId,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub details: RequestDetails,
    pub status: RequestStatus,
    /// `None` when the stored value is absent or not a list of hospitals.
    #[serde(
        default,
        deserialize_with = "lenient_hospitals",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_hospitals: Option<Vec<Hospital>>,
    pub created_at: DateTime<Utc>,
}

impl BloodRequest {
    pub fn hospital_count(&self) -> usize {
        self.selected_hospitals.as_ref().map_or(0, Vec::len)
    }
}

fn lenient_hospitals<'de, D>(deserializer: D) -> Result<Option<Vec<Hospital>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(hospitals_from_value(raw))
}

/// Reads a hospital list out of an untrusted JSON value. Anything that is not
/// an array of hospital snapshots yields `None`.
pub fn hospitals_from_value(raw: serde_json::Value) -> Option<Vec<Hospital>> {
    match raw {
        serde_json::Value::Array(_) => serde_json::from_value(raw).ok(),
        _ => None,
    }
}
