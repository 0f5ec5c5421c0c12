// Library interface for the VitalRS analytics engine
// This allows integration tests to access the core functionality

pub mod aggregate;
pub mod analytics;
pub mod config;
pub mod cusum;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod stats;

// Re-export commonly used types for convenience
pub use models::*;
pub use analytics::{AnalyticsEngine, AnalyticsSettings};
pub use cusum::{BaselineParams, CusumPoint, Detection, ShiftDirection, ShiftEvent, WindowProfile};
pub use events::{analyze_event_impact, ImpactSummary, SEARCH_WINDOWS};
pub use normalize::{filter_snapshot, normalize_snapshot, RawSnapshot};
pub use error::{Result, VitalRsError};
pub use logging::{LogConfig, LogFormat, LogLevel};
