use tracing::debug;

use crate::core::{Rgba8, Vec2};

/// Stable identifier of a text box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TextBoxId(pub u32);

/// A repositionable styled text label.
///
/// `position` is the live offset while a drag gesture is in flight;
/// `last_committed_position` is only written back when the gesture ends. The
/// two fields are kept separate so repeated partial drags cannot drift.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextBox {
    pub id: TextBoxId,
    pub text: String,
    pub position: Vec2,
    pub last_committed_position: Vec2,
    pub color: Rgba8,
    pub bold: bool,
    /// False until the user confirms the box; unconfirmed boxes are excluded
    /// from compositing and discarded on cancel.
    pub is_added: bool,
}

/// Ordered collection of text boxes with at most one in composing focus.
///
/// The layer has no session awareness: sequencing rules (resolve an
/// uncommitted box before composing another) are enforced by `EditSession`.
#[derive(Debug, Default)]
pub struct TextLayer {
    boxes: Vec<TextBox>,
    composing: Option<TextBoxId>,
    next_id: u32,
}

impl TextLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All boxes in creation order, confirmed or not.
    pub fn boxes(&self) -> &[TextBox] {
        &self.boxes
    }

    pub fn get(&self, id: TextBoxId) -> Option<&TextBox> {
        self.boxes.iter().find(|b| b.id == id)
    }

    /// The box currently in composing focus, if any.
    pub fn composing(&self) -> Option<TextBoxId> {
        self.composing
    }

    /// Boxes that take part in compositing.
    pub fn committed(&self) -> impl Iterator<Item = &TextBox> {
        self.boxes.iter().filter(|b| b.is_added)
    }

    /// Append a new unconfirmed box and give it composing focus.
    pub fn create_box(&mut self) -> TextBoxId {
        let id = TextBoxId(self.next_id);
        self.next_id += 1;
        self.boxes.push(TextBox {
            id,
            text: String::new(),
            position: Vec2::ZERO,
            last_committed_position: Vec2::ZERO,
            color: Rgba8::WHITE,
            bold: false,
            is_added: false,
        });
        self.composing = Some(id);
        id
    }

    /// Mark `id` as confirmed; it now takes part in compositing. Drops
    /// composing focus if `id` held it.
    pub fn confirm_box(&mut self, id: TextBoxId) {
        let Some(b) = self.boxes.iter_mut().find(|b| b.id == id) else {
            debug!(?id, "confirm_box on unknown id ignored");
            return;
        };
        b.is_added = true;
        if self.composing == Some(id) {
            self.composing = None;
        }
    }

    /// Give composing focus to an existing box (in-place re-edit of a
    /// confirmed box). Returns false for unknown ids.
    pub fn begin_composing(&mut self, id: TextBoxId) -> bool {
        if self.get(id).is_none() {
            debug!(?id, "begin_composing on unknown id ignored");
            return false;
        }
        self.composing = Some(id);
        true
    }

    /// Drop composing focus, removing the focused box when it was never
    /// confirmed. Confirmed boxes are left untouched.
    pub fn cancel_composing(&mut self) {
        let Some(id) = self.composing.take() else {
            return;
        };
        if let Some(idx) = self.boxes.iter().position(|b| b.id == id)
            && !self.boxes[idx].is_added
        {
            self.boxes.remove(idx);
        }
    }

    /// Remove every box that was never confirmed, regardless of focus.
    pub fn discard_uncommitted(&mut self) {
        self.composing = None;
        self.boxes.retain(|b| b.is_added);
    }

    /// Move the live position by an incremental drag `delta`. Between
    /// gestures the live position equals the committed one, so deltas
    /// accumulate from `last_committed_position`.
    pub fn drag_by(&mut self, id: TextBoxId, delta: Vec2) {
        if let Some(b) = self.boxes.iter_mut().find(|b| b.id == id) {
            b.position += delta;
        }
    }

    /// End a drag gesture, writing the live position back.
    pub fn end_drag(&mut self, id: TextBoxId) {
        if let Some(b) = self.boxes.iter_mut().find(|b| b.id == id) {
            b.last_committed_position = b.position;
        }
    }

    pub fn set_text(&mut self, id: TextBoxId, text: impl Into<String>) {
        if let Some(b) = self.boxes.iter_mut().find(|b| b.id == id) {
            b.text = text.into();
        }
    }

    pub fn set_bold(&mut self, id: TextBoxId, bold: bool) {
        if let Some(b) = self.boxes.iter_mut().find(|b| b.id == id) {
            b.bold = bold;
        }
    }

    pub fn set_color(&mut self, id: TextBoxId, color: Rgba8) {
        if let Some(b) = self.boxes.iter_mut().find(|b| b.id == id) {
            b.color = color;
        }
    }
}
