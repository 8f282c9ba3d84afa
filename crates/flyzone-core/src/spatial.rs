//! Spatial math for zone intersection and distance calculations.
//!
//! Geodesic helpers work on the sphere; the planar predicates work on a local
//! tangent plane built by [`LocalFrame`].

use crate::geometry::Point;

/// Mean Earth radius used by the spherical formulas.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Tolerance for planar predicates, in meters of the local frame.
pub const PLANAR_EPS_M: f64 = 1e-6;

/// A projected coordinate: (east, north) in meters.
pub type Xy = (f64, f64);

/// Calculate distance between two points in meters using the Haversine formula.
pub fn haversine_distance(a: Point, b: Point) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lon - a.lon).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Convert a north/south offset in meters to degrees latitude.
pub fn meters_to_lat(meters: f64, ref_lat_deg: f64) -> f64 {
    meters / meters_per_deg_lat(ref_lat_deg).max(1e-9)
}

/// Offset a position by distance and bearing along a great circle.
///
/// # Arguments
/// * `origin` - Starting position
/// * `distance_m` - Distance in meters
/// * `bearing_rad` - Bearing in radians (0 = north, π/2 = east)
pub fn offset_by_bearing(origin: Point, distance_m: f64, bearing_rad: f64) -> Point {
    if distance_m.abs() <= f64::EPSILON {
        return origin;
    }

    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    Point::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Sample `steps` points on the circle of `radius_m` around `center`,
/// starting due north and walking clockwise.
pub fn circle_samples(center: Point, radius_m: f64, steps: usize) -> Vec<Point> {
    let steps = steps.max(3);
    (0..steps)
        .map(|i| {
            let bearing = (i as f64 / steps as f64) * std::f64::consts::TAU;
            offset_by_bearing(center, radius_m, bearing)
        })
        .collect()
}

/// Longitude half-width in degrees of the spherical cap of `radius_m` around
/// `center`, or `None` when the cap reaches a pole.
pub fn cap_lon_half_width(center: Point, radius_m: f64) -> Option<f64> {
    let angular = radius_m / EARTH_RADIUS_M;
    let pole_margin = (90.0 - center.lat.abs()).to_radians();
    if angular >= pole_margin {
        return None;
    }
    let ratio = angular.sin() / center.lat.to_radians().cos();
    Some(ratio.clamp(-1.0, 1.0).asin().to_degrees())
}

/// True when the short way from `a` to `b` crosses the ±180° meridian, which
/// the degree-space edge between them does not follow.
pub fn crosses_antimeridian(a: Point, b: Point) -> bool {
    (b.lon - a.lon).abs() > 180.0
}

/// Equirectangular tangent plane anchored at a reference point.
///
/// The mapping is affine in (lat, lon), so straight lines in degree space stay
/// straight and crossing tests give the same answers as in degree space.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    origin: Point,
    m_per_deg_lat: f64,
    m_per_deg_lon: f64,
}

impl LocalFrame {
    pub fn new(origin: Point) -> Self {
        Self {
            origin,
            m_per_deg_lat: meters_per_deg_lat(origin.lat),
            m_per_deg_lon: meters_per_deg_lon(origin.lat),
        }
    }

    pub fn project(&self, point: Point) -> Xy {
        (
            (point.lon - self.origin.lon) * self.m_per_deg_lon,
            (point.lat - self.origin.lat) * self.m_per_deg_lat,
        )
    }

    pub fn project_all(&self, points: &[Point]) -> Vec<Xy> {
        points.iter().map(|p| self.project(*p)).collect()
    }
}

fn orient(p: Xy, q: Xy, r: Xy) -> f64 {
    (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
}

fn within(a: f64, b: f64, value: f64) -> bool {
    let min = a.min(b) - PLANAR_EPS_M;
    let max = a.max(b) + PLANAR_EPS_M;
    value >= min && value <= max
}

fn in_segment_box(p: Xy, q: Xy, r: Xy) -> bool {
    within(p.0, q.0, r.0) && within(p.1, q.1, r.1)
}

/// Segment intersection test including touches and collinear overlaps.
pub fn segments_intersect_2d(a1: Xy, a2: Xy, b1: Xy, b2: Xy) -> bool {
    let o1 = orient(a1, a2, b1);
    let o2 = orient(a1, a2, b2);
    let o3 = orient(b1, b2, a1);
    let o4 = orient(b1, b2, a2);

    if o1.abs() <= PLANAR_EPS_M && in_segment_box(a1, a2, b1) {
        return true;
    }
    if o2.abs() <= PLANAR_EPS_M && in_segment_box(a1, a2, b2) {
        return true;
    }
    if o3.abs() <= PLANAR_EPS_M && in_segment_box(b1, b2, a1) {
        return true;
    }
    if o4.abs() <= PLANAR_EPS_M && in_segment_box(b1, b2, a2) {
        return true;
    }

    let a_crosses = (o1 > PLANAR_EPS_M && o2 < -PLANAR_EPS_M) || (o1 < -PLANAR_EPS_M && o2 > PLANAR_EPS_M);
    let b_crosses = (o3 > PLANAR_EPS_M && o4 < -PLANAR_EPS_M) || (o3 < -PLANAR_EPS_M && o4 > PLANAR_EPS_M);
    a_crosses && b_crosses
}

/// Distance from a point to a segment in the plane.
pub fn distance_to_segment_2d(p: Xy, a: Xy, b: Xy) -> f64 {
    let sx = b.0 - a.0;
    let sy = b.1 - a.1;
    let px = p.0 - a.0;
    let py = p.1 - a.1;
    let seg_len_sq = sx * sx + sy * sy;
    if seg_len_sq <= f64::EPSILON {
        return (px * px + py * py).sqrt();
    }
    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);
    let dx = px - t * sx;
    let dy = py - t * sy;
    (dx * dx + dy * dy).sqrt()
}

/// Edges of a ring, closing the last vertex back to the first.
pub fn ring_edges(ring: &[Xy]) -> impl Iterator<Item = (Xy, Xy)> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
}

/// Even-odd point-in-ring test. Points on an edge count as inside.
pub fn point_in_ring(p: Xy, ring: &[Xy]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    if ring_edges(ring).any(|(a, b)| distance_to_segment_2d(p, a, b) <= PLANAR_EPS_M) {
        return true;
    }

    let mut inside = false;
    for (a, b) in ring_edges(ring) {
        if (a.1 > p.1) != (b.1 > p.1) {
            let x_cross = a.0 + (p.1 - a.1) * (b.0 - a.0) / (b.1 - a.1);
            if p.0 < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// True if any edge of `path` (open polyline, or closed when `closed`) touches any edge of `ring`.
pub fn path_crosses_ring(path: &[Xy], closed: bool, ring: &[Xy]) -> bool {
    path_edges(path, closed).any(|(_, a, b)| ring_edges(ring).any(|(c, d)| segments_intersect_2d(a, b, c, d)))
}

/// Indexed edges of a polyline; a closed path also yields the last-to-first edge.
pub fn path_edges(path: &[Xy], closed: bool) -> impl Iterator<Item = (usize, Xy, Xy)> + '_ {
    let n = path.len();
    let count = match (closed, n) {
        (_, 0 | 1) => 0,
        (true, 2) => 1,
        (true, _) => n,
        (false, _) => n - 1,
    };
    (0..count).map(move |i| (i, path[i], path[(i + 1) % n]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_click_east_of_minsk_measures_just_under_a_kilometre() {
        let center = Point::new(53.9, 27.5667);
        let edge = Point::new(53.9, 27.5667 + 0.0152);
        let dist = haversine_distance(center, edge);
        assert!((dist - 995.8).abs() < 1.0, "got {dist} m");
        assert_eq!(haversine_distance(edge, center), dist);
    }

    #[test]
    fn repeated_click_measures_zero() {
        let p = Point::new(53.9, 27.5667);
        assert!(haversine_distance(p, p) < 0.001);
    }

    #[test]
    fn cap_width_grows_with_radius_until_the_pole() {
        let equator = cap_lon_half_width(Point::new(0.0, 0.0), 100_000.0).unwrap();
        assert!((equator - 0.8993).abs() < 1e-3);

        let minsk = Point::new(53.9, 27.5667);
        let wide = cap_lon_half_width(minsk, 3_000_000.0).unwrap();
        assert!((wide - 50.35).abs() < 0.01);
        assert_eq!(cap_lon_half_width(minsk, 4_100_000.0), None);
        assert_eq!(cap_lon_half_width(Point::new(-53.9, 27.5667), 4_100_000.0), None);
    }

    #[test]
    fn antimeridian_crossing_uses_short_way_round() {
        assert!(crosses_antimeridian(Point::new(10.0, 179.5), Point::new(10.0, -179.5)));
        assert!(!crosses_antimeridian(Point::new(10.0, -90.0), Point::new(10.0, 89.0)));
        assert!(!crosses_antimeridian(Point::new(53.9, 27.5), Point::new(53.95, 27.6)));
    }

    #[test]
    fn circle_samples_sit_on_the_radius() {
        let center = Point::new(53.9, 27.5667);
        let samples = circle_samples(center, 1000.0, 64);
        assert_eq!(samples.len(), 64);
        for sample in samples {
            let d = haversine_distance(center, sample);
            assert!((d - 1000.0).abs() < 0.5, "sample at {d} m");
        }
    }

    #[test]
    fn crossing_segments_are_detected() {
        assert!(segments_intersect_2d((0.0, 0.0), (10.0, 10.0), (0.0, 10.0), (10.0, 0.0)));
        assert!(!segments_intersect_2d((0.0, 0.0), (10.0, 0.0), (0.0, 1.0), (10.0, 1.0)));
    }

    #[test]
    fn touching_segments_count_as_intersecting() {
        assert!(segments_intersect_2d((0.0, 0.0), (10.0, 0.0), (5.0, 0.0), (5.0, 5.0)));
    }

    #[test]
    fn point_in_ring_is_inclusive_on_edges_and_vertices() {
        let square = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        assert!(point_in_ring((5.0, 5.0), &square));
        assert!(point_in_ring((10.0, 5.0), &square));
        assert!(point_in_ring((0.0, 0.0), &square));
        assert!(!point_in_ring((10.5, 5.0), &square));
    }

    #[test]
    fn point_in_ring_ignores_winding() {
        let cw = [(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)];
        let ccw = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        assert_eq!(point_in_ring((3.0, 4.0), &cw), point_in_ring((3.0, 4.0), &ccw));
    }

    #[test]
    fn path_edges_close_polygons() {
        let tri = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
        assert_eq!(path_edges(&tri, false).count(), 2);
        let closed: Vec<_> = path_edges(&tri, true).collect();
        assert_eq!(closed.len(), 3);
        assert_eq!(closed[2], (2, (0.0, 1.0), (0.0, 0.0)));
    }

    #[test]
    fn local_frame_preserves_meters_scale() {
        let frame = LocalFrame::new(Point::new(53.9, 27.5));
        let north = Point::new(53.9 + meters_to_lat(100.0, 53.9), 27.5);
        let (x, y) = frame.project(north);
        assert!(x.abs() < 1e-9);
        assert!((y - 100.0).abs() < 1e-6);
    }
}
