//! Planner configuration from environment.

use flyzone_core::EngineOptions;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_ZONES_PATH: &str = "Fly_Zones_BY.geojson";
pub const DEFAULT_ELEVATION_URL: &str = "https://api.open-meteo.com/v1/elevation";

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub zones_path: PathBuf,
    pub elevation_url: String,
    pub elevation_timeout_s: u64,
    pub include_hidden_in_intersection_check: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            zones_path: PathBuf::from(DEFAULT_ZONES_PATH),
            elevation_url: DEFAULT_ELEVATION_URL.to_string(),
            elevation_timeout_s: 5,
            include_hidden_in_intersection_check: true,
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            zones_path: env::var("FLYZONE_ZONES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.zones_path),
            elevation_url: env::var("FLYZONE_ELEVATION_URL").unwrap_or(defaults.elevation_url),
            elevation_timeout_s: env::var("FLYZONE_ELEVATION_TIMEOUT_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.elevation_timeout_s),
            include_hidden_in_intersection_check: env::var("FLYZONE_INCLUDE_HIDDEN")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.include_hidden_in_intersection_check),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            include_hidden_in_intersection_check: self.include_hidden_in_intersection_check,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn defaults_check_hidden_zones() {
        let config = PlannerConfig::default();
        assert!(config.engine_options().include_hidden_in_intersection_check);
        assert_eq!(config.elevation_url, DEFAULT_ELEVATION_URL);
    }
}
