//! Interactive construction of operator shapes.
//!
//! A [`ShapeBuilder`] walks `Idle -> Placing -> Editing -> Finalized -> Idle`.
//! Only one builder per [`ActiveMode`] may be away from `Idle` at a time; the
//! mode stays held while a shape is finalized so the caller can finish its
//! report before another construction starts.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::geometry::{DrawnShape, ExtentProblem, Point, ShapeKind};
use crate::spatial;

/// Press-and-hold time needed before a placed point can be dragged.
pub const DRAG_HOLD_THRESHOLD: Duration = Duration::from_millis(500);

/// Disc radii snap up to a multiple of this step.
pub const RADIUS_STEP_M: f64 = 50.0;

/// Round a measured distance up to the next radius step (at least one step).
pub fn snap_radius(distance_m: f64) -> f64 {
    ((distance_m / RADIUS_STEP_M).ceil() * RADIUS_STEP_M).max(RADIUS_STEP_M)
}

/// Label shown next to the pointer while a disc radius is being chosen.
pub fn distance_label(distance_m: f64) -> String {
    format!("{} m", distance_m.round() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BuilderId(u64);

/// Session-wide exclusive mode flag. Also hands out builder ids.
#[derive(Debug, Default)]
pub struct ActiveMode {
    holder: Option<BuilderId>,
    next_id: u64,
}

impl ActiveMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder bound to this mode.
    pub fn builder(&mut self) -> ShapeBuilder {
        self.next_id += 1;
        ShapeBuilder::with_id(BuilderId(self.next_id))
    }

    pub fn is_active(&self) -> bool {
        self.holder.is_some()
    }

    pub fn holder(&self) -> Option<BuilderId> {
        self.holder
    }

    fn acquire(&mut self, id: BuilderId) -> Result<(), ShapeError> {
        if self.holder.is_some() {
            return Err(ShapeError::ModeAlreadyActive);
        }
        self.holder = Some(id);
        Ok(())
    }

    fn release(&mut self, id: BuilderId) {
        if self.holder == Some(id) {
            self.holder = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("another drawing mode is already active")]
    ModeAlreadyActive,
    #[error("{action} is not valid while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("{kind} needs at least {required} points, has {actual}")]
    TooFewPoints {
        kind: ShapeKind,
        required: usize,
        actual: usize,
    },
    #[error("coordinates ({lat}, {lon}) are not a valid position")]
    InvalidPoint { lat: String, lon: String },
    #[error("no placed point at index {0}")]
    NoSuchPoint(usize),
    #[error("point must be held for {required_ms} ms before dragging, was held {held_ms} ms")]
    HoldTooShort { held_ms: u128, required_ms: u128 },
    #[error("another point is already being dragged")]
    DragAlreadyActive,
    #[error("no point is being dragged")]
    NoDragActive,
    #[error("finish the current drag first")]
    DragInProgress,
    #[error("{kind} {problem}")]
    OutOfExtent {
        kind: ShapeKind,
        problem: ExtentProblem,
    },
}

/// Live drawing state for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Preview {
    /// Disc radius being chosen: line from center to pointer plus a label.
    Radius {
        center: Point,
        pointer: Point,
        distance_m: f64,
        label: String,
    },
    /// Route or polygon outline, possibly including the pointer as a trailing vertex.
    Outline { vertices: Vec<Point>, closed: bool },
}

/// Operator input consumed by the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorEvent {
    Start(ShapeKind),
    PointPlaced(Point),
    PointerMoved(Point),
    DragStart { index: usize, held: Duration },
    DragMove(Point),
    DragEnd,
    Finish,
    Undo,
    Cancel,
}

/// What an event produced.
#[derive(Debug, Clone, PartialEq)]
pub enum BuilderOutput {
    Nothing,
    Preview(Preview),
    /// All live drawing state must be removed.
    Cleared,
    Finalized(DrawnShape),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuilderState {
    Idle,
    Placing(ShapeKind),
    Editing {
        kind: ShapeKind,
        points: Vec<Point>,
        pointer: Option<Point>,
        dragging: Option<usize>,
    },
    Finalized(DrawnShape),
}

impl BuilderState {
    fn label(&self) -> &'static str {
        match self {
            BuilderState::Idle => "idle",
            BuilderState::Placing(_) => "placing",
            BuilderState::Editing { .. } => "editing",
            BuilderState::Finalized(_) => "finalized",
        }
    }
}

#[derive(Debug)]
pub struct ShapeBuilder {
    id: BuilderId,
    state: BuilderState,
}

impl ShapeBuilder {
    fn with_id(id: BuilderId) -> Self {
        Self {
            id,
            state: BuilderState::Idle,
        }
    }

    pub fn id(&self) -> BuilderId {
        self.id
    }

    pub fn state(&self) -> &BuilderState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, BuilderState::Idle)
    }

    /// Committed points of the shape under construction.
    pub fn points(&self) -> &[Point] {
        match &self.state {
            BuilderState::Editing { points, .. } => points,
            _ => &[],
        }
    }

    pub fn finalized(&self) -> Option<&DrawnShape> {
        match &self.state {
            BuilderState::Finalized(shape) => Some(shape),
            _ => None,
        }
    }

    /// The finalized shape, or an error naming the current state.
    pub fn require_finalized(&self) -> Result<&DrawnShape, ShapeError> {
        self.finalized().ok_or_else(|| self.invalid("reporting"))
    }

    fn invalid(&self, action: &'static str) -> ShapeError {
        ShapeError::InvalidTransition {
            state: self.state.label(),
            action,
        }
    }

    /// Dispatch one operator event.
    pub fn apply(
        &mut self,
        mode: &mut ActiveMode,
        event: OperatorEvent,
    ) -> Result<BuilderOutput, ShapeError> {
        match event {
            OperatorEvent::Start(kind) => self.start(mode, kind).map(|_| BuilderOutput::Nothing),
            OperatorEvent::PointPlaced(point) => self.place_point(point),
            OperatorEvent::PointerMoved(point) => {
                Ok(self.pointer_moved(point).map_or(BuilderOutput::Nothing, BuilderOutput::Preview))
            }
            OperatorEvent::DragStart { index, held } => {
                self.drag_start(index, held).map(|_| BuilderOutput::Nothing)
            }
            OperatorEvent::DragMove(point) => self.drag_move(point).map(BuilderOutput::Preview),
            OperatorEvent::DragEnd => self.drag_end().map(|_| self.output_preview()),
            OperatorEvent::Finish => self.finish().map(BuilderOutput::Finalized),
            OperatorEvent::Undo => self.undo_last().map(|_| self.output_preview()),
            OperatorEvent::Cancel => self.cancel(mode).map(|_| BuilderOutput::Cleared),
        }
    }

    fn output_preview(&self) -> BuilderOutput {
        self.preview().map_or(BuilderOutput::Cleared, BuilderOutput::Preview)
    }

    pub fn start(&mut self, mode: &mut ActiveMode, kind: ShapeKind) -> Result<(), ShapeError> {
        if !self.is_idle() {
            return Err(ShapeError::ModeAlreadyActive);
        }
        mode.acquire(self.id)?;
        tracing::debug!("Builder {:?} placing {}", self.id, kind);
        self.state = BuilderState::Placing(kind);
        Ok(())
    }

    /// Handle a click. For discs the second click finalizes the shape.
    pub fn place_point(&mut self, point: Point) -> Result<BuilderOutput, ShapeError> {
        let point = validate(point)?;
        match &mut self.state {
            BuilderState::Placing(kind) => {
                let kind = *kind;
                self.state = BuilderState::Editing {
                    kind,
                    points: vec![point],
                    pointer: None,
                    dragging: None,
                };
                Ok(self.output_preview())
            }
            BuilderState::Editing {
                kind,
                points,
                pointer,
                dragging,
            } => {
                if dragging.is_some() {
                    return Err(ShapeError::DragInProgress);
                }
                if *kind == ShapeKind::Disc {
                    let center = points[0];
                    let radius_m = snap_radius(center.distance_m(point));
                    let shape = DrawnShape::Disc { center, radius_m };
                    if let Some(problem) = shape.extent_problem() {
                        return Err(ShapeError::OutOfExtent {
                            kind: ShapeKind::Disc,
                            problem,
                        });
                    }
                    tracing::debug!("Disc radius snapped to {} m", radius_m);
                    self.state = BuilderState::Finalized(shape.clone());
                    return Ok(BuilderOutput::Finalized(shape));
                }
                if points
                    .last()
                    .is_some_and(|last| spatial::crosses_antimeridian(*last, point))
                {
                    return Err(ShapeError::OutOfExtent {
                        kind: *kind,
                        problem: ExtentProblem::CrossesAntimeridian,
                    });
                }
                points.push(point);
                *pointer = None;
                Ok(self.output_preview())
            }
            _ => Err(self.invalid("placing a point")),
        }
    }

    /// Update the live preview for a pointer position without touching committed points.
    pub fn pointer_moved(&mut self, point: Point) -> Option<Preview> {
        let point = validate(point).ok()?;
        match &mut self.state {
            BuilderState::Editing {
                pointer, dragging, ..
            } if dragging.is_none() => {
                *pointer = Some(point);
            }
            _ => return None,
        }
        self.preview()
    }

    pub fn preview(&self) -> Option<Preview> {
        let BuilderState::Editing {
            kind,
            points,
            pointer,
            dragging,
        } = &self.state
        else {
            return None;
        };

        match (kind, pointer) {
            (ShapeKind::Disc, Some(pointer)) if dragging.is_none() => {
                let center = points[0];
                let distance_m = center.distance_m(*pointer);
                Some(Preview::Radius {
                    center,
                    pointer: *pointer,
                    distance_m,
                    label: distance_label(distance_m),
                })
            }
            (ShapeKind::Disc, _) => Some(Preview::Outline {
                vertices: points.clone(),
                closed: false,
            }),
            (kind, pointer) => {
                let mut vertices = points.clone();
                if dragging.is_none() {
                    vertices.extend(pointer.iter().copied());
                }
                Some(Preview::Outline {
                    closed: *kind == ShapeKind::Polygon && vertices.len() >= 3,
                    vertices,
                })
            }
        }
    }

    /// Finalize a route or polygon.
    pub fn finish(&mut self) -> Result<DrawnShape, ShapeError> {
        let (kind, count) = match &self.state {
            BuilderState::Placing(kind) => (*kind, 0),
            BuilderState::Editing {
                kind, points, dragging, ..
            } => {
                if dragging.is_some() {
                    return Err(ShapeError::DragInProgress);
                }
                (*kind, points.len())
            }
            _ => return Err(self.invalid("finish")),
        };
        if kind == ShapeKind::Disc {
            return Err(self.invalid("finish on a disc"));
        }
        if count < kind.min_points() {
            return Err(ShapeError::TooFewPoints {
                kind,
                required: kind.min_points(),
                actual: count,
            });
        }

        let points = self.points().to_vec();
        let shape = match kind {
            ShapeKind::Route => DrawnShape::Route { points },
            _ => DrawnShape::Polygon { points },
        };
        if let Some(problem) = shape.extent_problem() {
            return Err(ShapeError::OutOfExtent { kind, problem });
        }
        self.state = BuilderState::Finalized(shape.clone());
        Ok(shape)
    }

    /// Drop the most recently placed point.
    pub fn undo_last(&mut self) -> Result<(), ShapeError> {
        let BuilderState::Editing {
            kind,
            points,
            dragging,
            ..
        } = &mut self.state
        else {
            return Err(self.invalid("undo"));
        };
        if dragging.is_some() {
            return Err(ShapeError::DragInProgress);
        }
        let kind = *kind;
        points.pop();
        if points.is_empty() {
            self.state = BuilderState::Placing(kind);
        }
        Ok(())
    }

    /// Begin dragging a placed point after a long press.
    pub fn drag_start(&mut self, index: usize, held: Duration) -> Result<(), ShapeError> {
        let BuilderState::Editing {
            points, dragging, ..
        } = &mut self.state
        else {
            return Err(self.invalid("dragging a point"));
        };
        if dragging.is_some() {
            return Err(ShapeError::DragAlreadyActive);
        }
        if index >= points.len() {
            return Err(ShapeError::NoSuchPoint(index));
        }
        if held < DRAG_HOLD_THRESHOLD {
            return Err(ShapeError::HoldTooShort {
                held_ms: held.as_millis(),
                required_ms: DRAG_HOLD_THRESHOLD.as_millis(),
            });
        }
        *dragging = Some(index);
        Ok(())
    }

    pub fn drag_move(&mut self, point: Point) -> Result<Preview, ShapeError> {
        let point = validate(point)?;
        let BuilderState::Editing {
            kind,
            points,
            dragging,
            ..
        } = &mut self.state
        else {
            return Err(ShapeError::NoDragActive);
        };
        let index = dragging.ok_or(ShapeError::NoDragActive)?;
        let neighbours = [index.checked_sub(1), Some(index + 1)];
        if neighbours
            .into_iter()
            .flatten()
            .filter_map(|i| points.get(i).copied())
            .any(|neighbour| spatial::crosses_antimeridian(neighbour, point))
        {
            return Err(ShapeError::OutOfExtent {
                kind: *kind,
                problem: ExtentProblem::CrossesAntimeridian,
            });
        }
        points[index] = point;
        self.preview().ok_or(ShapeError::NoDragActive)
    }

    pub fn drag_end(&mut self) -> Result<(), ShapeError> {
        match &mut self.state {
            BuilderState::Editing { dragging, .. } if dragging.is_some() => {
                *dragging = None;
                Ok(())
            }
            _ => Err(ShapeError::NoDragActive),
        }
    }

    /// Abandon the construction, clearing every partial point and preview.
    pub fn cancel(&mut self, mode: &mut ActiveMode) -> Result<(), ShapeError> {
        match self.state {
            BuilderState::Placing(_) | BuilderState::Editing { .. } => {
                tracing::debug!("Builder {:?} cancelled", self.id);
                self.state = BuilderState::Idle;
                mode.release(self.id);
                Ok(())
            }
            _ => Err(self.invalid("cancel")),
        }
    }

    /// Hand over the finalized shape and return to idle, releasing the mode.
    pub fn complete(&mut self, mode: &mut ActiveMode) -> Result<DrawnShape, ShapeError> {
        match std::mem::replace(&mut self.state, BuilderState::Idle) {
            BuilderState::Finalized(shape) => {
                mode.release(self.id);
                Ok(shape)
            }
            other => {
                self.state = other;
                Err(self.invalid("complete"))
            }
        }
    }
}

fn validate(point: Point) -> Result<Point, ShapeError> {
    Point::checked(point.lat, point.lon).ok_or_else(|| ShapeError::InvalidPoint {
        lat: point.lat.to_string(),
        lon: point.lon.to_string(),
    })
}
