//! Planning session: owns the zone snapshot, the exclusive drawing mode and
//! the elevation cache, and turns finalized shapes into reports.

use chrono::{DateTime, Utc};
use flyzone_core::shape_builder::distance_label;
use flyzone_core::{
    intersect, ActiveMode, BuilderOutput, DrawnShape, EngineOptions, IntersectionResult,
    OperatorEvent, Point, ShapeBuilder, ShapeError, ZoneCategory, ZoneIndex,
};
use futures::future::join_all;
use serde::Serialize;

use crate::elevation::{ElevationCache, ElevationProvider};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElevationReading {
    pub point: Point,
    pub elevation_m: f64,
}

/// Everything the presentation layer shows for a finalized shape.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub shape: DrawnShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_label: Option<String>,
    pub intersections: IntersectionResult,
    pub elevations: Vec<ElevationReading>,
    pub generated_at: DateTime<Utc>,
}

pub struct PlanningSession<P> {
    zones: ZoneIndex,
    options: EngineOptions,
    elevation: ElevationCache<P>,
    mode: ActiveMode,
}

impl<P: ElevationProvider> PlanningSession<P> {
    pub fn new(zones: ZoneIndex, elevation: ElevationCache<P>, options: EngineOptions) -> Self {
        Self {
            zones,
            options,
            elevation,
            mode: ActiveMode::new(),
        }
    }

    pub fn zones(&self) -> &ZoneIndex {
        &self.zones
    }

    pub fn elevation(&self) -> &ElevationCache<P> {
        &self.elevation
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn set_options(&mut self, options: EngineOptions) {
        self.options = options;
    }

    pub fn set_category_visible(&mut self, category: ZoneCategory, visible: bool) {
        self.zones.set_visible(category, visible);
    }

    pub fn mode(&self) -> &ActiveMode {
        &self.mode
    }

    pub fn new_builder(&mut self) -> ShapeBuilder {
        self.mode.builder()
    }

    /// Feed an operator event to a builder under this session's exclusive mode.
    pub fn apply(
        &mut self,
        builder: &mut ShapeBuilder,
        event: OperatorEvent,
    ) -> Result<BuilderOutput, ShapeError> {
        builder.apply(&mut self.mode, event)
    }

    /// Intersection check against the zones selected by the current options.
    pub fn check(&self, shape: &DrawnShape) -> IntersectionResult {
        intersect(shape, self.zones.candidate_zones(self.options))
    }

    /// Build a report for a shape. Waits for every elevation lookup.
    pub async fn build_report(&self, shape: &DrawnShape) -> PlanReport {
        let intersections = self.check(shape);
        let points = shape.elevation_points();
        let heights = join_all(
            points
                .iter()
                .map(|point| self.elevation.lookup(point.lat, point.lon)),
        )
        .await;

        let elevations = points
            .into_iter()
            .zip(heights)
            .map(|(point, elevation_m)| ElevationReading { point, elevation_m })
            .collect();

        let radius_label = match shape {
            DrawnShape::Disc { radius_m, .. } => Some(distance_label(*radius_m)),
            _ => None,
        };

        for hit in intersections.hits() {
            tracing::debug!(
                "Zone '{}' ({}) flagged: {:?}",
                hit.name,
                hit.category,
                hit.reasons
            );
        }
        tracing::info!(
            "Report for {}: {} zones intersected, {} skipped",
            shape.kind(),
            intersections.len(),
            intersections.skipped().len()
        );

        PlanReport {
            shape: shape.clone(),
            radius_label,
            intersections,
            elevations,
            generated_at: Utc::now(),
        }
    }

    /// Report on the builder's finalized shape, then return the builder to idle.
    ///
    /// The exclusive mode stays held until the report is complete.
    pub async fn complete(&mut self, builder: &mut ShapeBuilder) -> Result<PlanReport, ShapeError> {
        let shape = builder.require_finalized()?.clone();
        let report = self.build_report(&shape).await;
        builder.complete(&mut self.mode)?;
        Ok(report)
    }
}
