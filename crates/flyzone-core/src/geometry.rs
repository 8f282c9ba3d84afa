//! Canonical geometry values shared by the zone index, the intersection
//! engine and the shape builder.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::spatial;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a point from operator input, rejecting non-finite or out-of-range values.
    pub fn checked(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }

    /// Great-circle distance to another point in meters.
    pub fn distance_m(&self, other: Point) -> f64 {
        spatial::haversine_distance(*self, other)
    }

    fn bits(&self) -> (u64, u64) {
        (self.lat.to_bits(), self.lon.to_bits())
    }
}

/// Axis-aligned bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for point in points {
            if !point.lat.is_finite() || !point.lon.is_finite() {
                continue;
            }
            let b = bounds.get_or_insert(Self {
                min_lat: point.lat,
                min_lon: point.lon,
                max_lat: point.lat,
                max_lon: point.lon,
            });
            b.min_lat = b.min_lat.min(point.lat);
            b.min_lon = b.min_lon.min(point.lon);
            b.max_lat = b.max_lat.max(point.lat);
            b.max_lon = b.max_lon.max(point.lon);
        }
        bounds
    }

    /// Inclusive overlap test with a small slack so touching boxes overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        const SLACK_DEG: f64 = 1e-9;
        self.min_lat <= other.max_lat + SLACK_DEG
            && other.min_lat <= self.max_lat + SLACK_DEG
            && self.min_lon <= other.max_lon + SLACK_DEG
            && other.min_lon <= self.max_lon + SLACK_DEG
    }
}

/// A closed ring. Storage may or may not repeat the first point at the end.
pub type Ring = Vec<Point>;

/// Polygon or multi-polygon geometry of a zone: polygons of rings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneGeometry {
    pub polygons: Vec<Vec<Ring>>,
}

impl ZoneGeometry {
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.rings().next().is_none()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.rings().flatten())
    }
}

/// Why a ring cannot take part in intersection tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingDefect {
    NonFinite,
    TooFewDistinct(usize),
}

impl std::fmt::Display for RingDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RingDefect::NonFinite => write!(f, "ring has non-finite coordinates"),
            RingDefect::TooFewDistinct(n) => {
                write!(f, "ring has {n} distinct points, at least 3 required")
            }
        }
    }
}

/// Return the ring without its explicit closing point, or the defect that makes it unusable.
pub fn open_ring(ring: &[Point]) -> Result<&[Point], RingDefect> {
    if ring.iter().any(|p| !p.lat.is_finite() || !p.lon.is_finite()) {
        return Err(RingDefect::NonFinite);
    }
    let open = match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    };
    let distinct: HashSet<(u64, u64)> = open.iter().map(Point::bits).collect();
    if distinct.len() < 3 {
        return Err(RingDefect::TooFewDistinct(distinct.len()));
    }
    Ok(open)
}

/// The three shapes an operator can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Disc,
    Route,
    Polygon,
}

impl ShapeKind {
    /// Points required before the shape can be finalized.
    pub fn min_points(self) -> usize {
        match self {
            ShapeKind::Disc => 2,
            ShapeKind::Route => 2,
            ShapeKind::Polygon => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Disc => "disc",
            ShapeKind::Route => "route",
            ShapeKind::Polygon => "polygon",
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a shape cannot be evaluated in a single local frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentProblem {
    /// A disc reaching a pole wraps all the way round in longitude.
    ReachesPole,
    /// A disc or edge that crosses the ±180° meridian.
    CrossesAntimeridian,
}

impl std::fmt::Display for ExtentProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtentProblem::ReachesPole => f.write_str("reaches a pole"),
            ExtentProblem::CrossesAntimeridian => f.write_str("crosses the antimeridian"),
        }
    }
}

/// Check an ordered list of vertices; `closed` also checks the last-to-first edge.
pub fn path_extent_problem(points: &[Point], closed: bool) -> Option<ExtentProblem> {
    let open_edges = points
        .windows(2)
        .any(|pair| spatial::crosses_antimeridian(pair[0], pair[1]));
    let closing_edge = closed
        && points.len() > 2
        && match (points.first(), points.last()) {
            (Some(first), Some(last)) => spatial::crosses_antimeridian(*last, *first),
            _ => false,
        };
    (open_edges || closing_edge).then_some(ExtentProblem::CrossesAntimeridian)
}

/// A finished operator shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawnShape {
    Disc { center: Point, radius_m: f64 },
    Route { points: Vec<Point> },
    /// Implicitly closed; the first point is not repeated.
    Polygon { points: Vec<Point> },
}

impl DrawnShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            DrawnShape::Disc { .. } => ShapeKind::Disc,
            DrawnShape::Route { .. } => ShapeKind::Route,
            DrawnShape::Polygon { .. } => ShapeKind::Polygon,
        }
    }

    /// Anchor used for the local projection.
    pub fn anchor(&self) -> Option<Point> {
        match self {
            DrawnShape::Disc { center, .. } => Some(*center),
            DrawnShape::Route { points } | DrawnShape::Polygon { points } => points.first().copied(),
        }
    }

    /// Shapes whose degree-space outline does not follow the sphere are refused.
    pub fn extent_problem(&self) -> Option<ExtentProblem> {
        match self {
            DrawnShape::Disc { center, radius_m } => {
                match spatial::cap_lon_half_width(*center, *radius_m) {
                    None => Some(ExtentProblem::ReachesPole),
                    Some(half_width) if center.lon.abs() + half_width > 180.0 => {
                        Some(ExtentProblem::CrossesAntimeridian)
                    }
                    Some(_) => None,
                }
            }
            DrawnShape::Route { points } => path_extent_problem(points, false),
            DrawnShape::Polygon { points } => path_extent_problem(points, true),
        }
    }

    /// Points that get an elevation reading in a report.
    pub fn elevation_points(&self) -> Vec<Point> {
        match self {
            DrawnShape::Disc { center, .. } => vec![*center],
            DrawnShape::Route { points } | DrawnShape::Polygon { points } => points.clone(),
        }
    }
}
