//! Scavenger Application
//!
//! Marks the current location as a geofence, keeps the list of marked fences
//! in durable storage, and removes fences when they are selected.

mod error;
mod logging;
mod settings;
mod state;

pub use error::AppError;
pub use logging::init_logging;
pub use settings::{DatabaseSettings, FenceSettings, LoggingSettings, Settings};
pub use state::AppState;
