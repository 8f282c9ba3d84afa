use flyzone_core::{OperatorEvent, Point, ShapeKind};

/// A shape described on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeRequest {
    /// Disc from a center and a point on its edge.
    Disc { center: Point, edge: Point },
    Route { points: Vec<Point> },
    Polygon { points: Vec<Point> },
}

/// Operator events that draw the requested shape from scratch.
pub fn shape_events(request: &ShapeRequest) -> Vec<OperatorEvent> {
    match request {
        ShapeRequest::Disc { center, edge } => vec![
            OperatorEvent::Start(ShapeKind::Disc),
            OperatorEvent::PointPlaced(*center),
            OperatorEvent::PointerMoved(*edge),
            OperatorEvent::PointPlaced(*edge),
        ],
        ShapeRequest::Route { points } => path_events(ShapeKind::Route, points),
        ShapeRequest::Polygon { points } => path_events(ShapeKind::Polygon, points),
    }
}

fn path_events(kind: ShapeKind, points: &[Point]) -> Vec<OperatorEvent> {
    std::iter::once(OperatorEvent::Start(kind))
        .chain(points.iter().copied().map(OperatorEvent::PointPlaced))
        .chain(std::iter::once(OperatorEvent::Finish))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flyzone_core::{ActiveMode, BuilderOutput, DrawnShape};

    fn run(request: &ShapeRequest) -> Option<DrawnShape> {
        let mut mode = ActiveMode::new();
        let mut builder = mode.builder();
        let mut shape = None;
        for event in shape_events(request) {
            if let BuilderOutput::Finalized(done) = builder.apply(&mut mode, event).ok()? {
                shape = Some(done);
            }
        }
        shape
    }

    #[test]
    fn disc_events_finalize_with_snapped_radius() {
        let shape = run(&ShapeRequest::Disc {
            center: Point::new(53.9, 27.5667),
            edge: Point::new(53.9, 27.58),
        });
        assert!(matches!(shape, Some(DrawnShape::Disc { radius_m, .. }) if radius_m == 900.0));
    }

    #[test]
    fn route_events_end_with_finish() {
        let points = vec![Point::new(53.9, 27.5), Point::new(53.91, 27.52)];
        let events = shape_events(&ShapeRequest::Route {
            points: points.clone(),
        });
        assert_eq!(events.first(), Some(&OperatorEvent::Start(ShapeKind::Route)));
        assert_eq!(events.last(), Some(&OperatorEvent::Finish));
        assert_eq!(
            run(&ShapeRequest::Route { points: points.clone() }),
            Some(DrawnShape::Route { points })
        );
    }

    #[test]
    fn short_polygon_never_finalizes() {
        let shape = run(&ShapeRequest::Polygon {
            points: vec![Point::new(53.9, 27.5), Point::new(53.91, 27.52)],
        });
        assert!(shape.is_none());
    }
}
