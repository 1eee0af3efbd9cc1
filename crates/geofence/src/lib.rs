//! Geofence Model
//!
//! Plain data types for a marked geofence:
//! - Fence records (center, radius, expiration, transitions, message)
//! - Transition-type bit flags
//! - Expiration encoding
//! - Input validation

mod error;
mod record;
mod transition;
mod validator;

pub use error::ValidationError;
pub use record::{Expiration, FenceRecord, FenceRecordBuilder, Location, DEFAULT_RADIUS_METERS};
pub use transition::TransitionType;
pub use validator::{ValidationConfig, Validator};
