use crate::core::{Rgba8, Vec2};

/// Stable identifier of a committed or in-progress stroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct StrokeId(pub u32);

/// One freehand ink stroke: an ordered polyline in document coordinates with
/// a color and a brush width.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Vec2>,
    pub color: Rgba8,
    pub width: f64,
}

/// Default pen: black ink, 15px wide.
pub const DEFAULT_STROKE_COLOR: Rgba8 = Rgba8::BLACK;
pub const DEFAULT_STROKE_WIDTH: f64 = 15.0;

#[derive(Clone, Debug)]
enum HistoryEntry {
    /// A single committed stroke; undo removes it, redo restores it.
    Draw(Stroke),
    /// A clear of the whole layer; undo restores the removed strokes.
    Clear(Vec<Stroke>),
}

/// Ordered sequence of committed strokes plus at most one in-progress stroke,
/// with whole-stroke undo/redo.
///
/// History follows the two-stack discipline: undo moves the top entry to the
/// future stack, redo moves it back, and committing a new stroke clears the
/// future stack. Operations on an empty stack are no-ops; no stroke operation
/// can fail.
#[derive(Debug, Default)]
pub struct StrokeLayer {
    strokes: Vec<Stroke>,
    active: Option<Stroke>,
    history: Vec<HistoryEntry>,
    future: Vec<HistoryEntry>,
    next_id: u32,
}

impl StrokeLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed strokes in creation order.
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// The stroke currently being drawn, if any.
    pub fn active(&self) -> Option<&Stroke> {
        self.active.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.active.is_none()
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Start a new stroke at `start`. An unfinished previous stroke is
    /// committed first so no ink is lost.
    pub fn begin_stroke(&mut self, start: Vec2, color: Rgba8, width: f64) -> StrokeId {
        if self.active.is_some() {
            self.end_stroke();
        }
        let id = StrokeId(self.next_id);
        self.next_id += 1;
        self.active = Some(Stroke {
            id,
            points: vec![start],
            color,
            width,
        });
        id
    }

    /// Append a point to the in-progress stroke. No-op when none is active.
    pub fn extend_stroke(&mut self, point: Vec2) {
        if let Some(active) = self.active.as_mut() {
            active.points.push(point);
        }
    }

    /// Commit the in-progress stroke to the ordered sequence. A single-point
    /// stroke commits as a dot. Clears the redo stack.
    pub fn end_stroke(&mut self) {
        let Some(stroke) = self.active.take() else {
            return;
        };
        self.history.push(HistoryEntry::Draw(stroke.clone()));
        self.strokes.push(stroke);
        self.future.clear();
    }

    /// Undo the most recent committed operation (stroke or clear).
    pub fn undo(&mut self) {
        match self.history.pop() {
            Some(HistoryEntry::Draw(stroke)) => {
                self.strokes.pop();
                self.future.push(HistoryEntry::Draw(stroke));
            }
            Some(HistoryEntry::Clear(removed)) => {
                self.strokes = removed.clone();
                self.future.push(HistoryEntry::Clear(removed));
            }
            None => {}
        }
    }

    /// Re-apply the most recently undone operation.
    pub fn redo(&mut self) {
        match self.future.pop() {
            Some(HistoryEntry::Draw(stroke)) => {
                self.strokes.push(stroke.clone());
                self.history.push(HistoryEntry::Draw(stroke));
            }
            Some(HistoryEntry::Clear(removed)) => {
                self.strokes.clear();
                self.history.push(HistoryEntry::Clear(removed));
            }
            None => {}
        }
    }

    /// Remove all strokes as a single undoable operation. Discards any
    /// in-progress stroke. No-op on an already-empty layer.
    pub fn clear(&mut self) {
        self.active = None;
        if self.strokes.is_empty() {
            return;
        }
        let removed = std::mem::take(&mut self.strokes);
        self.history.push(HistoryEntry::Clear(removed));
        self.future.clear();
    }
}
