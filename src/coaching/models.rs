//! User, tank and maintenance state consumed when building coaching prompts

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// Per-user coaching preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub experience_level: ExperienceLevel,
    pub temperature_unit: TemperatureUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_style: Option<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            display_name: None,
            experience_level: ExperienceLevel::Beginner,
            temperature_unit: TemperatureUnit::Celsius,
            response_style: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterType {
    Freshwater,
    Saltwater,
}

/// Tracked water parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Temperature,
    Ph,
    Ammonia,
    Nitrite,
    Nitrate,
    Phosphate,
    Kh,
}

impl ParameterKind {
    pub fn label(&self) -> &'static str {
        match self {
            ParameterKind::Temperature => "Temperature",
            ParameterKind::Ph => "pH",
            ParameterKind::Ammonia => "Ammonia",
            ParameterKind::Nitrite => "Nitrite",
            ParameterKind::Nitrate => "Nitrate",
            ParameterKind::Phosphate => "Phosphate",
            ParameterKind::Kh => "KH",
        }
    }

    /// Unit suffix; temperature readings are stored in Celsius
    pub fn unit(&self) -> &'static str {
        match self {
            ParameterKind::Temperature => "°C",
            ParameterKind::Ph => "",
            ParameterKind::Kh => "dKH",
            _ => "ppm",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One water test result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterReading {
    pub kind: ParameterKind,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

impl ParameterReading {
    pub fn new(kind: ParameterKind, value: f64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            value,
            recorded_at,
        }
    }
}

/// Point-in-time view of a tank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankSnapshot {
    pub name: String,
    pub water_type: WaterType,
    pub volume_liters: f64,
    #[serde(default)]
    pub readings: Vec<ParameterReading>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub name: String,
    pub due_at: DateTime<Utc>,
}

/// Maintenance schedule for a tank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_water_change: Option<DateTime<Utc>>,
    pub water_change_interval_days: u32,
    #[serde(default)]
    pub pending_tasks: Vec<MaintenanceTask>,
}

impl MaintenanceState {
    /// Tasks whose due date has passed, oldest first
    pub fn overdue_tasks(&self, now: DateTime<Utc>) -> Vec<&MaintenanceTask> {
        let mut overdue: Vec<_> = self.pending_tasks.iter().filter(|t| t.due_at < now).collect();
        overdue.sort_by_key(|t| t.due_at);
        overdue
    }

    pub fn days_since_water_change(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_water_change.map(|at| (now - at).num_days())
    }

    /// A tank with no recorded water change is always due
    pub fn water_change_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_water_change {
            Some(at) => now - at >= Duration::days(i64::from(self.water_change_interval_days)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_overdue_tasks_sorted() {
        let state = MaintenanceState {
            last_water_change: Some(at(1)),
            water_change_interval_days: 7,
            pending_tasks: vec![
                MaintenanceTask { name: "Clean filter".into(), due_at: at(5) },
                MaintenanceTask { name: "Trim plants".into(), due_at: at(20) },
                MaintenanceTask { name: "Test KH".into(), due_at: at(3) },
            ],
        };
        let overdue = state.overdue_tasks(at(10));
        let names: Vec<_> = overdue.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Test KH", "Clean filter"]);
    }

    #[test]
    fn test_water_change_due() {
        let state = MaintenanceState {
            last_water_change: Some(at(1)),
            water_change_interval_days: 7,
            pending_tasks: vec![],
        };
        assert!(!state.water_change_due(at(7)));
        assert!(state.water_change_due(at(8)));
        assert_eq!(state.days_since_water_change(at(8)), Some(7));

        let never = MaintenanceState {
            last_water_change: None,
            ..state
        };
        assert!(never.water_change_due(at(1)));
    }
}
