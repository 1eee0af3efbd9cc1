//! Fence Record Implementation

use crate::error::ValidationError;
use crate::transition::TransitionType;
use crate::validator::Validator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Radius applied when the caller does not pick one
pub const DEFAULT_RADIUS_METERS: f32 = 100.0;

/// Persisted expiration value meaning "never expires"
const NEVER_EXPIRE_MS: i64 = -1;

/// Geographic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}, {:.2}", self.latitude, self.longitude)
    }
}

/// How long a fence stays active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Expiration {
    #[default]
    Never,
    After(Duration),
}

impl Expiration {
    /// Millisecond encoding used in storage (`-1` for never)
    pub fn as_millis(self) -> Result<i64, ValidationError> {
        match self {
            Expiration::Never => Ok(NEVER_EXPIRE_MS),
            Expiration::After(duration) => i64::try_from(duration.as_millis()).map_err(|_| {
                ValidationError::InvalidExpiration(format!("{:?} exceeds i64 milliseconds", duration))
            }),
        }
    }

    /// Decode the storage encoding
    pub fn from_millis(ms: i64) -> Result<Self, ValidationError> {
        match ms {
            NEVER_EXPIRE_MS => Ok(Expiration::Never),
            ms if ms >= 0 => Ok(Expiration::After(Duration::from_millis(ms as u64))),
            ms => Err(ValidationError::InvalidExpiration(format!("{}ms", ms))),
        }
    }
}

/// One marked geofence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FenceRecord {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f32,
    pub expiration: Expiration,
    pub transition_type: TransitionType,
    pub message_id: String,
}

impl FenceRecord {
    /// Create a validated record
    pub fn new(
        id: impl Into<String>,
        location: Location,
        radius_meters: f32,
        expiration: Expiration,
        transition_type: TransitionType,
        message_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let record = Self {
            id: id.into(),
            latitude: location.latitude,
            longitude: location.longitude,
            radius_meters,
            expiration,
            transition_type,
            message_id: message_id.into(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Start a builder with default radius, expiration, and transitions
    pub fn builder(id: impl Into<String>, location: Location) -> FenceRecordBuilder {
        FenceRecordBuilder::new(id, location)
    }

    /// Check the record with the default validator
    pub fn validate(&self) -> Result<(), ValidationError> {
        Validator::default().validate_record(self)
    }

    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}

impl fmt::Display for FenceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ ({}) r={}m",
            self.id,
            self.location(),
            self.radius_meters
        )
    }
}

/// Builder for [`FenceRecord`]
#[derive(Debug, Clone)]
pub struct FenceRecordBuilder {
    id: String,
    location: Location,
    radius_meters: f32,
    expiration: Expiration,
    transition_type: TransitionType,
    message_id: String,
}

impl FenceRecordBuilder {
    pub fn new(id: impl Into<String>, location: Location) -> Self {
        Self {
            id: id.into(),
            location,
            radius_meters: DEFAULT_RADIUS_METERS,
            expiration: Expiration::Never,
            transition_type: TransitionType::ENTER,
            message_id: String::new(),
        }
    }

    pub fn radius_meters(mut self, radius_meters: f32) -> Self {
        self.radius_meters = radius_meters;
        self
    }

    pub fn expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn transition_type(mut self, transition_type: TransitionType) -> Self {
        self.transition_type = transition_type;
        self
    }

    pub fn message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn build(self) -> Result<FenceRecord, ValidationError> {
        FenceRecord::new(
            self.id,
            self.location,
            self.radius_meters,
            self.expiration,
            self.transition_type,
            self.message_id,
        )
    }
}
