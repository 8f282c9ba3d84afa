//! flyzone planner - joins the core geometry with terrain elevation lookups.

pub mod config;
pub mod elevation;
pub mod session;

pub use config::PlannerConfig;
pub use elevation::{
    approximate_elevation, ElevationCache, ElevationError, ElevationProvider, OpenMeteoProvider,
};
pub use session::{ElevationReading, PlanReport, PlanningSession};
