//! End-to-end planning scenarios: operator events in, report out.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use flyzone_core::{
    BuilderOutput, EngineOptions, HitReason, OperatorEvent, Point, ShapeError, ShapeKind,
    ZoneCategory, ZoneId, ZoneIndex,
};
use flyzone_planner::{ElevationCache, ElevationError, ElevationProvider, PlanningSession};

const FIXED_ELEVATION_M: f64 = 222.0;

struct FixedProvider {
    calls: AtomicUsize,
}

impl ElevationProvider for FixedProvider {
    async fn fetch(&self, _lat: f64, _lon: f64) -> Result<f64, ElevationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FIXED_ELEVATION_M)
    }
}

fn zones() -> ZoneIndex {
    let collection = serde_json::json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "UMP Minsk centre" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [27.56, 53.895], [27.57, 53.895], [27.57, 53.905], [27.56, 53.905], [27.56, 53.895]
                    ]]
                }
            },
            {
                "type": "Feature",
                "properties": { "Name": "UMR Borisov" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [28.4, 54.2], [28.6, 54.2], [28.6, 54.3], [28.4, 54.3], [28.4, 54.2]
                    ]]
                }
            }
        ]
    });
    ZoneIndex::from_geojson_str(&collection.to_string()).expect("valid zones")
}

fn session() -> PlanningSession<FixedProvider> {
    let provider = FixedProvider {
        calls: AtomicUsize::new(0),
    };
    PlanningSession::new(zones(), ElevationCache::new(provider), EngineOptions::default())
}

fn place(lat: f64, lon: f64) -> OperatorEvent {
    OperatorEvent::PointPlaced(Point::new(lat, lon))
}

#[tokio::test(start_paused = true)]
async fn disc_over_minsk_reports_centre_zone() {
    let mut session = session();
    let mut builder = session.new_builder();

    session
        .apply(&mut builder, OperatorEvent::Start(ShapeKind::Disc))
        .unwrap();
    session.apply(&mut builder, place(53.9, 27.5667)).unwrap();
    let output = session
        .apply(&mut builder, place(53.9, 27.5667 + 0.0152))
        .unwrap();
    assert!(matches!(output, BuilderOutput::Finalized(_)));

    let report = session.complete(&mut builder).await.unwrap();
    let hit = report
        .intersections
        .get(ZoneId(0))
        .expect("centre zone reported");
    assert!(
        hit.reasons.contains(&HitReason::CenterInside)
            || hit.reasons.contains(&HitReason::BoundaryCrosses)
    );
    assert!(!report.intersections.contains(ZoneId(1)));
    assert_eq!(report.radius_label.as_deref(), Some("1000 m"));
    assert_eq!(report.elevations.len(), 1);
    assert_eq!(report.elevations[0].elevation_m, FIXED_ELEVATION_M);
    assert!(builder.is_idle());
    assert!(!session.mode().is_active());
}

#[tokio::test(start_paused = true)]
async fn triangle_inside_zone_reports_every_vertex() {
    let mut session = session();
    let mut builder = session.new_builder();

    for event in [
        OperatorEvent::Start(ShapeKind::Polygon),
        place(53.899, 27.564),
        place(53.901, 27.564),
        place(53.9, 27.567),
        OperatorEvent::Finish,
    ] {
        session.apply(&mut builder, event).unwrap();
    }

    let report = session.complete(&mut builder).await.unwrap();
    let hit = report.intersections.get(ZoneId(0)).expect("zone reported");
    assert_eq!(
        hit.reasons,
        BTreeSet::from([
            HitReason::VertexInside { index: 0 },
            HitReason::VertexInside { index: 1 },
            HitReason::VertexInside { index: 2 },
            HitReason::PolygonIntersects,
        ])
    );
    assert_eq!(report.intersections.len(), 1);

    // All three lookups are joined before the report is returned.
    assert_eq!(report.elevations.len(), 3);
    assert_eq!(report.elevations[0].elevation_m, FIXED_ELEVATION_M);
    assert!(report.elevations.iter().all(|e| e.elevation_m.is_finite()));
    assert_eq!(session.elevation().provider().calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn route_crossing_zone_reports_segment_only() {
    let mut session = session();
    let mut builder = session.new_builder();

    for event in [
        OperatorEvent::Start(ShapeKind::Route),
        place(53.9, 27.55),
        place(53.9, 27.58),
        OperatorEvent::Finish,
    ] {
        session.apply(&mut builder, event).unwrap();
    }

    let report = session.complete(&mut builder).await.unwrap();
    let hit = report.intersections.get(ZoneId(0)).expect("zone reported");
    assert!(hit.reasons.contains(&HitReason::SegmentCrosses { index: 0 }));
    assert!(!hit
        .reasons
        .iter()
        .any(|reason| matches!(reason, HitReason::VertexInside { .. })));
}

#[tokio::test(start_paused = true)]
async fn hidden_categories_are_skipped_when_configured() {
    let mut session = session();
    session.set_category_visible(ZoneCategory::Prohibited, false);
    session.set_options(EngineOptions {
        include_hidden_in_intersection_check: false,
    });

    let mut builder = session.new_builder();
    for event in [
        OperatorEvent::Start(ShapeKind::Route),
        place(53.9, 27.55),
        place(53.9, 27.58),
        OperatorEvent::Finish,
    ] {
        session.apply(&mut builder, event).unwrap();
    }
    let report = session.complete(&mut builder).await.unwrap();
    assert!(report.intersections.is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_builder_waits_for_the_first_report() {
    let mut session = session();
    let mut first = session.new_builder();
    let mut second = session.new_builder();

    session
        .apply(&mut first, OperatorEvent::Start(ShapeKind::Route))
        .unwrap();
    assert_eq!(
        session.apply(&mut second, OperatorEvent::Start(ShapeKind::Disc)),
        Err(ShapeError::ModeAlreadyActive)
    );
    assert!(session.complete(&mut first).await.is_err());

    session.apply(&mut first, OperatorEvent::Cancel).unwrap();
    session
        .apply(&mut second, OperatorEvent::Start(ShapeKind::Disc))
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn report_serializes_reason_tags() {
    let mut session = session();
    let mut builder = session.new_builder();
    for event in [
        OperatorEvent::Start(ShapeKind::Route),
        place(53.9, 27.55),
        place(53.9, 27.58),
        OperatorEvent::Finish,
    ] {
        session.apply(&mut builder, event).unwrap();
    }
    let report = session.complete(&mut builder).await.unwrap();
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["shape"]["kind"], "route");
    let reasons = &value["intersections"]["hits"]["0"]["reasons"];
    assert_eq!(reasons[0]["reason"], "segment_crosses");
    assert_eq!(reasons[0]["index"], 0);
}
