//! Fence Record Validator

use crate::error::ValidationError;
use crate::record::FenceRecord;
use serde::{Deserialize, Serialize};

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Latitude valid range (degrees)
    pub latitude_range: (f64, f64),
    /// Longitude valid range (degrees)
    pub longitude_range: (f64, f64),
    /// Largest accepted radius (meters)
    pub max_radius_meters: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            latitude_range: (-90.0, 90.0),
            longitude_range: (-180.0, 180.0),
            max_radius_meters: 100_000.0,
        }
    }
}

/// Validator for fence records
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a single value against a range
    pub fn validate_range(
        &self,
        field: &'static str,
        value: f64,
        range: (f64, f64),
    ) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NotFinite { field });
        }
        if value < range.0 || value > range.1 {
            Err(ValidationError::OutOfRange {
                field,
                value,
                min: range.0,
                max: range.1,
            })
        } else {
            Ok(())
        }
    }

    /// Validate latitude
    pub fn validate_latitude(&self, latitude: f64) -> Result<(), ValidationError> {
        self.validate_range("latitude", latitude, self.config.latitude_range)
    }

    /// Validate longitude
    pub fn validate_longitude(&self, longitude: f64) -> Result<(), ValidationError> {
        self.validate_range("longitude", longitude, self.config.longitude_range)
    }

    /// Validate radius: finite, positive, and under the configured ceiling
    pub fn validate_radius(&self, radius_meters: f32) -> Result<(), ValidationError> {
        if !radius_meters.is_finite() {
            return Err(ValidationError::NotFinite { field: "radius" });
        }
        if radius_meters <= 0.0 {
            return Err(ValidationError::NonPositiveRadius(radius_meters));
        }
        self.validate_range(
            "radius",
            f64::from(radius_meters),
            (0.0, f64::from(self.config.max_radius_meters)),
        )
    }

    /// Validate a whole record
    pub fn validate_record(&self, record: &FenceRecord) -> Result<(), ValidationError> {
        if record.id.is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        self.validate_latitude(record.latitude)?;
        self.validate_longitude(record.longitude)?;
        self.validate_radius(record.radius_meters)?;

        if !record.transition_type.is_valid() {
            return Err(ValidationError::InvalidTransition(
                record.transition_type.bits(),
            ));
        }

        record.expiration.as_millis()?;

        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
