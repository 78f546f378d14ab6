//! System prompt assembly from coaching context sources

use super::models::{
    ExperienceLevel, MaintenanceState, ParameterKind, TankSnapshot, TemperatureUnit,
    UserPreferences, WaterType,
};
use super::trends::{analyze_trends, ParameterTrend, RangeStatus, TrendDirection};
use crate::context::token_budget::TokenBudgetManager;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use tracing::debug;

pub const DEFAULT_INSTRUCTIONS: &str = "You are an aquarium care coach. Give practical, \
safe advice about fish, invertebrates, plants and water chemistry. When water parameters \
are out of range, explain the risk and the next step. Do not invent test results.";

/// Builds the system prompt for a coaching turn.
///
/// Sections are rendered in a fixed order (instructions, preferences, tank,
/// maintenance) and the result is cut to the system prompt budget.
pub struct SystemPromptBuilder<'a> {
    instructions: &'a str,
    preferences: Option<&'a UserPreferences>,
    tank: Option<&'a TankSnapshot>,
    maintenance: Option<&'a MaintenanceState>,
}

impl<'a> SystemPromptBuilder<'a> {
    pub fn new(instructions: &'a str) -> Self {
        Self {
            instructions,
            preferences: None,
            tank: None,
            maintenance: None,
        }
    }

    pub fn with_preferences(mut self, preferences: &'a UserPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_tank(mut self, tank: &'a TankSnapshot) -> Self {
        self.tank = Some(tank);
        self
    }

    pub fn with_maintenance(mut self, maintenance: &'a MaintenanceState) -> Self {
        self.maintenance = Some(maintenance);
        self
    }

    pub fn build(&self, budget: &TokenBudgetManager, now: DateTime<Utc>) -> String {
        let mut prompt = self.instructions.trim().to_string();
        let unit = self
            .preferences
            .map(|p| p.temperature_unit)
            .unwrap_or(TemperatureUnit::Celsius);

        if let Some(preferences) = self.preferences {
            prompt.push_str("\n\n## User\n");
            render_preferences(&mut prompt, preferences);
        }

        if let Some(tank) = self.tank {
            prompt.push_str("\n\n## Tank\n");
            render_tank(&mut prompt, tank, unit);
        }

        if let Some(maintenance) = self.maintenance {
            prompt.push_str("\n\n## Maintenance\n");
            render_maintenance(&mut prompt, maintenance, now);
        }

        let bounded = budget.truncate_system_prompt(&prompt);
        if bounded.len() < prompt.len() {
            debug!(
                "System prompt truncated from {} to {} bytes",
                prompt.len(),
                bounded.len()
            );
        }
        bounded
    }
}

fn render_preferences(out: &mut String, preferences: &UserPreferences) {
    if let Some(ref name) = preferences.display_name {
        let _ = writeln!(out, "- Name: {}", name);
    }
    let level = match preferences.experience_level {
        ExperienceLevel::Beginner => "beginner; explain terms and avoid jargon",
        ExperienceLevel::Intermediate => "intermediate",
        ExperienceLevel::Advanced => "advanced; be concise and technical",
    };
    let _ = writeln!(out, "- Experience: {}", level);
    if let Some(ref style) = preferences.response_style {
        let _ = writeln!(out, "- Preferred style: {}", style);
    }
}

fn render_tank(out: &mut String, tank: &TankSnapshot, unit: TemperatureUnit) {
    let water = match tank.water_type {
        WaterType::Freshwater => "freshwater",
        WaterType::Saltwater => "saltwater",
    };
    let _ = writeln!(out, "- {} ({}, {:.0} L)", tank.name, water, tank.volume_liters);

    let trends = analyze_trends(tank.water_type, &tank.readings);
    if trends.is_empty() {
        out.push_str("- No water tests recorded\n");
        return;
    }
    for trend in &trends {
        let _ = writeln!(out, "- {}", describe_trend(trend, unit));
    }
}

fn describe_trend(trend: &ParameterTrend, unit: TemperatureUnit) -> String {
    let (value, suffix) = match (trend.kind, unit) {
        (ParameterKind::Temperature, TemperatureUnit::Fahrenheit) => {
            (trend.latest * 9.0 / 5.0 + 32.0, "°F")
        }
        _ => (trend.latest, trend.kind.unit()),
    };
    let direction = match trend.direction {
        TrendDirection::Rising => "rising",
        TrendDirection::Falling => "falling",
        TrendDirection::Stable => "stable",
        TrendDirection::InsufficientData => "single reading",
    };
    let status = match trend.status {
        RangeStatus::Low => ", below ideal range",
        RangeStatus::Ideal => "",
        RangeStatus::High => ", above ideal range",
    };
    let spacer = if suffix.is_empty() || suffix.starts_with('°') { "" } else { " " };
    format!(
        "{}: {:.2}{}{} ({}{})",
        trend.kind, value, spacer, suffix, direction, status
    )
}

fn render_maintenance(out: &mut String, maintenance: &MaintenanceState, now: DateTime<Utc>) {
    match maintenance.days_since_water_change(now) {
        Some(days) => {
            let _ = writeln!(
                out,
                "- Last water change: {} days ago (every {} days)",
                days, maintenance.water_change_interval_days
            );
        }
        None => out.push_str("- No water change recorded\n"),
    }
    if maintenance.water_change_due(now) {
        out.push_str("- Water change is due\n");
    }
    for task in maintenance.overdue_tasks(now) {
        let _ = writeln!(
            out,
            "- Overdue: {} (since {})",
            task.name,
            task.due_at.format("%Y-%m-%d")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::models::{MaintenanceTask, ParameterReading};
    use crate::context::token_estimator::estimate_tokens;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, 8, 0, 0).unwrap()
    }

    fn tank() -> TankSnapshot {
        TankSnapshot {
            name: "Living room reef".to_string(),
            water_type: WaterType::Saltwater,
            volume_liters: 200.0,
            readings: vec![
                ParameterReading::new(ParameterKind::Temperature, 25.0, at(1)),
                ParameterReading::new(ParameterKind::Nitrate, 10.0, at(1)),
                ParameterReading::new(ParameterKind::Nitrate, 30.0, at(8)),
            ],
        }
    }

    #[test]
    fn test_prompt_sections() {
        let prefs = UserPreferences {
            display_name: Some("Sam".to_string()),
            temperature_unit: TemperatureUnit::Fahrenheit,
            ..Default::default()
        };
        let tank = tank();
        let maintenance = MaintenanceState {
            last_water_change: Some(at(1)),
            water_change_interval_days: 7,
            pending_tasks: vec![MaintenanceTask {
                name: "Clean skimmer".to_string(),
                due_at: at(5),
            }],
        };

        let prompt = SystemPromptBuilder::new(DEFAULT_INSTRUCTIONS)
            .with_preferences(&prefs)
            .with_tank(&tank)
            .with_maintenance(&maintenance)
            .build(&TokenBudgetManager::default(), at(10));

        assert!(prompt.starts_with("You are an aquarium care coach."));
        assert!(prompt.contains("- Name: Sam"));
        assert!(prompt.contains("Living room reef (saltwater, 200 L)"));
        assert!(prompt.contains("Temperature: 77.00°F (single reading)"));
        assert!(prompt.contains("Nitrate: 30.00 ppm (rising, above ideal range)"));
        assert!(prompt.contains("Last water change: 9 days ago"));
        assert!(prompt.contains("Water change is due"));
        assert!(prompt.contains("Overdue: Clean skimmer (since 2026-06-05)"));
    }

    #[test]
    fn test_prompt_without_sources() {
        let prompt = SystemPromptBuilder::new("Be helpful.")
            .build(&TokenBudgetManager::default(), at(1));
        assert_eq!(prompt, "Be helpful.");
    }

    #[test]
    fn test_prompt_is_bounded() {
        let long = "x".repeat(40_000);
        let prompt = SystemPromptBuilder::new(&long)
            .build(&TokenBudgetManager::default(), at(1));
        assert_eq!(estimate_tokens(&prompt), 4_000);
    }
}
