//! Single-document editing session: one base image, one active filter, one
//! stroke layer, one text layer, and the mode state machine.
//!
//! The session is the single writer of its layers. UI frameworks observe it
//! through [`EditSession::subscribe`] rather than binding to shared mutable
//! state.

use tracing::debug;

use crate::{
    compositor::Compositor,
    core::{Extent, Rgba8, Vec2},
    error::InklayResult,
    filter::{self, FilterSpec},
    raster::RasterBuffer,
    stroke::StrokeLayer,
    text::{TextBoxId, TextLayer},
    upload::{SaveSink, UploadMeta, UploadRequest},
};

/// JPEG quality used for the upload payload.
const UPLOAD_JPEG_QUALITY: u8 = 50;

/// Sub-state of text editing: either no box is focused or exactly one box is
/// mid-composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextFocus {
    Idle,
    Composing(TextBoxId),
}

/// The session's interaction mode. Drawing and text editing are mutually
/// exclusive; Saving is transient and returns to Viewing on success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Viewing,
    FilterPreview,
    Drawing,
    TextEditing(TextFocus),
    Saving,
}

/// State-change notifications delivered synchronously to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    ModeChanged { from: Mode, to: Mode },
    /// The filtered preview buffer was replaced.
    PreviewUpdated,
    Saved { width: u32, height: u32 },
    SaveFailed { message: String },
    /// Non-fatal notification (e.g. an asynchronous upload failure).
    Notice { message: String },
}

/// Token for an offloaded filter recompute. Finishing a ticket that has been
/// superseded by a newer one is rejected (last-write-wins).
#[derive(Debug)]
pub struct FilterTicket {
    epoch: u64,
    pub spec: FilterSpec,
}

type Observer = Box<dyn FnMut(&SessionEvent)>;

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("base", &self.base)
            .field("viewport", &self.viewport)
            .field("filter", &self.filter)
            .field("preview", &self.preview)
            .field("strokes", &self.strokes)
            .field("text", &self.text)
            .field("mode", &self.mode)
            .field("filter_epoch", &self.filter_epoch)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// One in-memory editing document scoped to a single base image.
pub struct EditSession {
    base: RasterBuffer,
    viewport: Extent,
    filter: FilterSpec,
    preview: RasterBuffer,
    strokes: StrokeLayer,
    text: TextLayer,
    mode: Mode,
    filter_epoch: u64,
    observers: Vec<Observer>,
}

impl EditSession {
    /// Start a session over a decoded base image. `viewport` is the editing
    /// surface size the document coordinates are expressed in; a zero-area
    /// viewport falls back to the base image size.
    pub fn new(base: RasterBuffer, viewport: Extent) -> Self {
        let viewport = if viewport.is_empty() {
            base.extent()
        } else {
            viewport
        };
        let filter = FilterSpec::default();
        let preview = filter::apply(&base, filter);
        Self {
            base,
            viewport,
            filter,
            preview,
            strokes: StrokeLayer::new(),
            text: TextLayer::new(),
            mode: Mode::Viewing,
            filter_epoch: 0,
            observers: Vec::new(),
        }
    }

    /// Decode `bytes` and start a session. A decode failure propagates so the
    /// caller can fall back to a placeholder buffer.
    pub fn from_bytes(bytes: &[u8], viewport: Extent) -> InklayResult<Self> {
        Ok(Self::new(RasterBuffer::decode(bytes)?, viewport))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn filter(&self) -> FilterSpec {
        self.filter
    }

    /// The current filtered preview of the base image. Annotation layers are
    /// rendered on top of this by the editing surface.
    pub fn preview(&self) -> &RasterBuffer {
        &self.preview
    }

    pub fn base(&self) -> &RasterBuffer {
        &self.base
    }

    pub fn viewport(&self) -> Extent {
        self.viewport
    }

    pub fn strokes(&self) -> &StrokeLayer {
        &self.strokes
    }

    pub fn text(&self) -> &TextLayer {
        &self.text
    }

    /// Register an observer for session events.
    pub fn subscribe(&mut self, observer: impl FnMut(&SessionEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: SessionEvent) {
        let mut observers = std::mem::take(&mut self.observers);
        for obs in &mut observers {
            obs(&event);
        }
        self.observers = observers;
    }

    fn set_mode(&mut self, to: Mode) {
        if self.mode == to {
            return;
        }
        let from = self.mode;
        self.mode = to;
        self.emit(SessionEvent::ModeChanged { from, to });
    }

    // --- filtering -------------------------------------------------------

    /// Replace the active filter and recompute the preview synchronously.
    /// Legal from any non-Saving mode; from Viewing or FilterPreview it
    /// enters FilterPreview, while annotating it leaves the mode unchanged
    /// (the intensity slider stays live).
    pub fn set_filter(&mut self, spec: FilterSpec) {
        if self.mode == Mode::Saving {
            debug!("set_filter ignored while saving");
            return;
        }
        self.filter = spec;
        self.filter_epoch += 1;
        self.preview = filter::apply(&self.base, spec);
        if matches!(self.mode, Mode::Viewing | Mode::FilterPreview) {
            self.set_mode(Mode::FilterPreview);
        }
        self.emit(SessionEvent::PreviewUpdated);
    }

    /// Begin an offloaded filter recompute. The caller computes
    /// `filter::apply(session.base(), ticket.spec)` on a worker and hands the
    /// result to [`EditSession::finish_filter_update`].
    pub fn begin_filter_update(&mut self, spec: FilterSpec) -> FilterTicket {
        self.filter = spec;
        self.filter_epoch += 1;
        if matches!(self.mode, Mode::Viewing | Mode::FilterPreview) {
            self.set_mode(Mode::FilterPreview);
        }
        FilterTicket {
            epoch: self.filter_epoch,
            spec,
        }
    }

    /// Install the result of an offloaded recompute. Returns false (and
    /// discards the buffer) when a newer update superseded this ticket.
    pub fn finish_filter_update(&mut self, ticket: FilterTicket, preview: RasterBuffer) -> bool {
        if ticket.epoch != self.filter_epoch {
            debug!(
                stale = ticket.epoch,
                current = self.filter_epoch,
                "stale filter update discarded"
            );
            return false;
        }
        self.preview = preview;
        self.emit(SessionEvent::PreviewUpdated);
        true
    }

    // --- drawing ---------------------------------------------------------

    /// Enter drawing mode. An uncommitted composing text box is discarded
    /// first; drawing and text composition are mutually exclusive.
    pub fn begin_draw(&mut self) {
        if self.mode == Mode::Saving {
            debug!("begin_draw ignored while saving");
            return;
        }
        self.text.cancel_composing();
        self.set_mode(Mode::Drawing);
    }

    /// Leave drawing mode. Committed strokes are kept.
    pub fn end_draw(&mut self) {
        if self.mode != Mode::Drawing {
            return;
        }
        self.set_mode(Mode::Viewing);
    }

    pub fn begin_stroke(&mut self, start: Vec2, color: Rgba8, width: f64) {
        if self.mode != Mode::Drawing {
            debug!("begin_stroke ignored outside drawing mode");
            return;
        }
        self.strokes.begin_stroke(start, color, width);
    }

    pub fn extend_stroke(&mut self, point: Vec2) {
        if self.mode != Mode::Drawing {
            return;
        }
        self.strokes.extend_stroke(point);
    }

    pub fn end_stroke(&mut self) {
        if self.mode != Mode::Drawing {
            return;
        }
        self.strokes.end_stroke();
    }

    pub fn undo_stroke(&mut self) {
        if self.mode != Mode::Drawing {
            return;
        }
        self.strokes.undo();
    }

    pub fn redo_stroke(&mut self) {
        if self.mode != Mode::Drawing {
            return;
        }
        self.strokes.redo();
    }

    pub fn clear_strokes(&mut self) {
        if self.mode != Mode::Drawing {
            return;
        }
        self.strokes.clear();
    }

    // --- text ------------------------------------------------------------

    /// Create a new text box and enter composition on it. Any uncommitted
    /// composing box is resolved (discarded) first; drawing mode is exited.
    pub fn begin_text_compose(&mut self) -> Option<TextBoxId> {
        if self.mode == Mode::Saving {
            debug!("begin_text_compose ignored while saving");
            return None;
        }
        self.text.cancel_composing();
        let id = self.text.create_box();
        self.set_mode(Mode::TextEditing(TextFocus::Composing(id)));
        Some(id)
    }

    /// Confirm the composing box; it now takes part in compositing.
    pub fn confirm_text(&mut self) {
        let Mode::TextEditing(TextFocus::Composing(id)) = self.mode else {
            return;
        };
        self.text.confirm_box(id);
        self.set_mode(Mode::TextEditing(TextFocus::Idle));
    }

    /// Cancel composition, discarding the box if it was never confirmed.
    pub fn cancel_text(&mut self) {
        if !matches!(self.mode, Mode::TextEditing(TextFocus::Composing(_))) {
            return;
        }
        self.text.cancel_composing();
        self.set_mode(Mode::TextEditing(TextFocus::Idle));
    }

    /// Re-enter composition on an already-confirmed box for in-place edits.
    /// Returns false for unknown ids or while saving.
    pub fn long_press_box(&mut self, id: TextBoxId) -> bool {
        if self.mode == Mode::Saving {
            return false;
        }
        if self.text.get(id).is_none() {
            debug!(?id, "long_press_box on unknown id ignored");
            return false;
        }
        // Resolve any other composing box before switching focus.
        if self.text.composing() != Some(id) {
            self.text.cancel_composing();
        }
        self.text.begin_composing(id);
        self.set_mode(Mode::TextEditing(TextFocus::Composing(id)));
        true
    }

    pub fn drag_box_by(&mut self, id: TextBoxId, delta: Vec2) {
        self.text.drag_by(id, delta);
    }

    pub fn end_box_drag(&mut self, id: TextBoxId) {
        self.text.end_drag(id);
    }

    pub fn set_box_text(&mut self, id: TextBoxId, text: impl Into<String>) {
        self.text.set_text(id, text);
    }

    pub fn set_box_bold(&mut self, id: TextBoxId, bold: bool) {
        self.text.set_bold(id, bold);
    }

    pub fn set_box_color(&mut self, id: TextBoxId, color: Rgba8) {
        self.text.set_color(id, color);
    }

    // --- saving ----------------------------------------------------------

    /// Flatten the document at `target`, hand PNG bytes to the local sink and
    /// a JPEG upload request to the collaborator, then return to Viewing.
    ///
    /// On failure the session returns to its pre-saving mode with every edit
    /// intact, emits [`SessionEvent::SaveFailed`], and propagates the error.
    /// A local-sink failure is a non-fatal notice; the upload still runs.
    pub fn save(
        &mut self,
        compositor: &mut Compositor,
        target: Extent,
        sink: &mut dyn SaveSink,
        meta: &UploadMeta,
    ) -> InklayResult<RasterBuffer> {
        let prior = self.mode;
        self.set_mode(Mode::Saving);

        let flattened = compositor
            .flatten(
                &self.base,
                self.filter,
                self.strokes.strokes(),
                self.text.boxes(),
                self.viewport,
                target,
            )
            .and_then(|out| {
                let png = out.encode_png()?;
                let jpeg = out.encode_jpeg(UPLOAD_JPEG_QUALITY)?;
                Ok((out, png, jpeg))
            });

        let (out, png, jpeg) = match flattened {
            Ok(parts) => parts,
            Err(err) => {
                self.set_mode(prior);
                self.emit(SessionEvent::SaveFailed {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        if let Err(err) = sink.save_local(&png) {
            self.emit(SessionEvent::Notice {
                message: format!("local save failed: {err}"),
            });
        }
        sink.upload(UploadRequest {
            image_bytes: jpeg,
            app_id: meta.app_id.clone(),
            original_url: meta.original_url.clone(),
            file_name: meta.file_name.clone(),
        });

        self.emit(SessionEvent::Saved {
            width: out.width(),
            height: out.height(),
        });
        self.set_mode(Mode::Viewing);
        Ok(out)
    }

    /// Report an asynchronous transport failure. Non-fatal: a completed local
    /// save is never rolled back.
    pub fn notify_transport_error(&mut self, message: impl Into<String>) {
        self.emit(SessionEvent::Notice {
            message: message.into(),
        });
    }

    /// Tear the session down to Viewing: uncommitted text boxes are
    /// discarded, the drawing surface is cleared, and undo history is
    /// intentionally not preserved.
    pub fn cancel_editing(&mut self) {
        self.text.discard_uncommitted();
        self.strokes = StrokeLayer::new();
        self.set_mode(Mode::Viewing);
    }
}
