//! flyzone CLI - command line front end for airspace checks.
//!
//! The binary turns shape arguments into the same operator events a map UI
//! would send, so every check goes through the shape builder.

pub mod coords;
pub mod events;

pub use coords::parse_point;
pub use events::{shape_events, ShapeRequest};
