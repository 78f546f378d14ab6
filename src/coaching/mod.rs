//! Coaching context sources
//!
//! User preferences, tank parameters and maintenance state are rendered into
//! the system prompt of each coaching turn, together with a per-parameter
//! trend analysis of recent water tests.

pub mod models;
pub mod prompt;
pub mod trends;

pub use models::{
    ExperienceLevel, MaintenanceState, MaintenanceTask, ParameterKind, ParameterReading,
    TankSnapshot, TemperatureUnit, UserPreferences, WaterType,
};
pub use prompt::{SystemPromptBuilder, DEFAULT_INSTRUCTIONS};
pub use trends::{analyze_trends, ideal_range, ParameterTrend, RangeStatus, TrendDirection};
