pub mod geometry;
pub mod intersect;
pub mod shape_builder;
pub mod spatial;
pub mod zones;

pub use geometry::{BoundingBox, DrawnShape, ExtentProblem, Point, Ring, ShapeKind, ZoneGeometry};
pub use intersect::{intersect, HitReason, IntersectionResult, SkippedZone, ZoneHit};
pub use shape_builder::{
    ActiveMode, BuilderId, BuilderOutput, BuilderState, OperatorEvent, Preview, ShapeBuilder,
    ShapeError,
};
pub use spatial::haversine_distance;
pub use zones::{
    category_of, style, EngineOptions, LoadError, Zone, ZoneCategory, ZoneId, ZoneIndex, ZoneStyle,
};
