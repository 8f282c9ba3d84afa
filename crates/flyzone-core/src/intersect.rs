//! Intersection of operator-drawn shapes with zone geometry.
//!
//! All tests run in a [`LocalFrame`] anchored at the shape. Containment uses
//! even-odd ray casting per ring with inclusive boundaries: a point lying on a
//! ring edge counts as inside.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::geometry::{open_ring, BoundingBox, DrawnShape, Point};
use crate::spatial::{self, LocalFrame, Xy};
use crate::zones::{Zone, ZoneCategory, ZoneId};

/// Number of azimuthal samples approximating a disc boundary.
pub const DISC_BOUNDARY_STEPS: usize = 64;

/// Why a zone was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HitReason {
    /// Disc center lies inside the zone
    CenterInside,
    /// Sampled disc boundary crosses a zone edge
    BoundaryCrosses,
    /// A zone vertex lies inside the drawn disc or polygon
    ZoneInside,
    /// Shape vertex `index` lies inside the zone
    VertexInside { index: usize },
    /// Segment `index -> index + 1` (or the closing edge) crosses a zone edge
    SegmentCrosses { index: usize },
    /// Overall tag on every polygon hit
    PolygonIntersects,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneHit {
    pub zone_id: ZoneId,
    pub name: String,
    pub category: ZoneCategory,
    pub reasons: BTreeSet<HitReason>,
}

/// A zone left out of the check because its geometry is unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedZone {
    pub zone_id: ZoneId,
    pub name: String,
    pub problem: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntersectionResult {
    hits: BTreeMap<ZoneId, ZoneHit>,
    skipped: Vec<SkippedZone>,
}

impl IntersectionResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn contains(&self, id: ZoneId) -> bool {
        self.hits.contains_key(&id)
    }

    pub fn get(&self, id: ZoneId) -> Option<&ZoneHit> {
        self.hits.get(&id)
    }

    pub fn hits(&self) -> impl Iterator<Item = &ZoneHit> {
        self.hits.values()
    }

    pub fn zone_ids(&self) -> BTreeSet<ZoneId> {
        self.hits.keys().copied().collect()
    }

    pub fn skipped(&self) -> &[SkippedZone] {
        &self.skipped
    }
}

/// Shape geometry projected once per call.
enum Prepared {
    Disc { center: Xy, boundary: Vec<Xy> },
    Route { vertices: Vec<Xy> },
    Polygon { vertices: Vec<Xy> },
}

/// Test `shape` against every zone and collect the hits.
///
/// Zones with a degenerate ring are skipped and listed in
/// [`IntersectionResult::skipped`]. Shapes with an
/// [`extent_problem`](DrawnShape::extent_problem) are refused by the builder
/// and are not evaluated here.
pub fn intersect<'a>(
    shape: &DrawnShape,
    zones: impl IntoIterator<Item = &'a Zone>,
) -> IntersectionResult {
    let mut result = IntersectionResult::default();
    if let Some(problem) = shape.extent_problem() {
        tracing::warn!("Not checking {} that {}", shape.kind(), problem);
        return result;
    }
    let Some(anchor) = shape.anchor() else {
        return result;
    };
    let frame = LocalFrame::new(anchor);
    let (prepared, shape_bbox) = prepare(shape, &frame);

    for zone in zones {
        let rings = match zone_rings(zone, &frame) {
            Ok(rings) => rings,
            Err(problem) => {
                tracing::warn!("Skipping zone '{}' ({}): {}", zone.name, zone.id, problem);
                result.skipped.push(SkippedZone {
                    zone_id: zone.id,
                    name: zone.name.clone(),
                    problem,
                });
                continue;
            }
        };

        let overlaps = match (zone.bounding_box(), shape_bbox) {
            (Some(zone_bbox), Some(shape_bbox)) => zone_bbox.overlaps(&shape_bbox),
            _ => false,
        };
        if !overlaps {
            continue;
        }

        let reasons = match &prepared {
            Prepared::Disc { center, boundary } => disc_reasons(*center, boundary, &rings),
            Prepared::Route { vertices } => route_reasons(vertices, &rings),
            Prepared::Polygon { vertices } => polygon_reasons(vertices, &rings),
        };
        if reasons.is_empty() {
            continue;
        }

        result.hits.insert(
            zone.id,
            ZoneHit {
                zone_id: zone.id,
                name: zone.name.clone(),
                category: zone.category,
                reasons,
            },
        );
    }

    result
}

fn prepare(shape: &DrawnShape, frame: &LocalFrame) -> (Prepared, Option<BoundingBox>) {
    match shape {
        DrawnShape::Disc { center, radius_m } => {
            let mut samples = spatial::circle_samples(*center, *radius_m, DISC_BOUNDARY_STEPS);
            let boundary = frame.project_all(&samples);
            samples.push(*center);
            let bbox = BoundingBox::from_points(&samples);
            (
                Prepared::Disc {
                    center: frame.project(*center),
                    boundary,
                },
                bbox,
            )
        }
        DrawnShape::Route { points } => (
            Prepared::Route {
                vertices: frame.project_all(points),
            },
            BoundingBox::from_points(points),
        ),
        DrawnShape::Polygon { points } => (
            Prepared::Polygon {
                vertices: frame.project_all(points),
            },
            BoundingBox::from_points(points),
        ),
    }
}

fn zone_rings(zone: &Zone, frame: &LocalFrame) -> Result<Vec<Vec<Xy>>, String> {
    let mut projected = Vec::new();
    for ring in zone.geometry.rings() {
        let open: &[Point] = open_ring(ring).map_err(|defect| defect.to_string())?;
        projected.push(frame.project_all(open));
    }
    if projected.is_empty() {
        return Err("zone has no rings".to_string());
    }
    Ok(projected)
}

fn inside_any(point: Xy, rings: &[Vec<Xy>]) -> bool {
    rings.iter().any(|ring| spatial::point_in_ring(point, ring))
}

fn any_zone_vertex_inside(rings: &[Vec<Xy>], outline: &[Xy]) -> bool {
    rings
        .iter()
        .flatten()
        .any(|vertex| spatial::point_in_ring(*vertex, outline))
}

fn disc_reasons(center: Xy, boundary: &[Xy], rings: &[Vec<Xy>]) -> BTreeSet<HitReason> {
    let mut reasons = BTreeSet::new();
    if inside_any(center, rings) {
        reasons.insert(HitReason::CenterInside);
    }
    if rings
        .iter()
        .any(|ring| spatial::path_crosses_ring(boundary, true, ring))
    {
        reasons.insert(HitReason::BoundaryCrosses);
    }
    if any_zone_vertex_inside(rings, boundary) {
        reasons.insert(HitReason::ZoneInside);
    }
    reasons
}

fn vertex_and_segment_reasons(
    vertices: &[Xy],
    closed: bool,
    rings: &[Vec<Xy>],
    reasons: &mut BTreeSet<HitReason>,
) {
    for (index, vertex) in vertices.iter().enumerate() {
        if inside_any(*vertex, rings) {
            reasons.insert(HitReason::VertexInside { index });
        }
    }
    for (index, a, b) in spatial::path_edges(vertices, closed) {
        let crosses = rings.iter().any(|ring| {
            spatial::ring_edges(ring).any(|(c, d)| spatial::segments_intersect_2d(a, b, c, d))
        });
        if crosses {
            reasons.insert(HitReason::SegmentCrosses { index });
        }
    }
}

fn route_reasons(vertices: &[Xy], rings: &[Vec<Xy>]) -> BTreeSet<HitReason> {
    let mut reasons = BTreeSet::new();
    vertex_and_segment_reasons(vertices, false, rings, &mut reasons);
    reasons
}

fn polygon_reasons(vertices: &[Xy], rings: &[Vec<Xy>]) -> BTreeSet<HitReason> {
    let mut reasons = BTreeSet::new();
    vertex_and_segment_reasons(vertices, true, rings, &mut reasons);
    if any_zone_vertex_inside(rings, vertices) {
        reasons.insert(HitReason::ZoneInside);
    }
    if !reasons.is_empty() {
        reasons.insert(HitReason::PolygonIntersects);
    }
    reasons
}
