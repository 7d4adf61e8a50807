use std::cell::RefCell;
use std::rc::Rc;

use inklay::{
    Compositor, EditSession, Extent, FilterKind, FilterSpec, InklayResult, Mode, RasterBuffer,
    Rgba8, SaveSink, SessionEvent, UploadMeta, UploadRequest, Vec2,
};

#[derive(Default)]
struct MemorySink {
    local_saves: Vec<Vec<u8>>,
    uploads: Vec<UploadRequest>,
    fail_local: bool,
}

impl SaveSink for MemorySink {
    fn save_local(&mut self, png: &[u8]) -> InklayResult<()> {
        if self.fail_local {
            return Err(inklay::InklayError::transport("disk full"));
        }
        self.local_saves.push(png.to_vec());
        Ok(())
    }

    fn upload(&mut self, request: UploadRequest) {
        self.uploads.push(request);
    }
}

fn session() -> EditSession {
    EditSession::new(
        RasterBuffer::solid(48, 32, Rgba8::new(180, 90, 45, 255)),
        Extent::new(48, 32),
    )
}

fn meta() -> UploadMeta {
    UploadMeta {
        app_id: "someone@example.com".to_string(),
        original_url: "https://example.com/src.jpg".to_string(),
        file_name: "someone_image_1".to_string(),
    }
}

fn draw_one_stroke(s: &mut EditSession) {
    s.begin_draw();
    s.begin_stroke(Vec2::new(4.0, 4.0), Rgba8::BLACK, 5.0);
    s.extend_stroke(Vec2::new(30.0, 20.0));
    s.end_stroke();
    s.end_draw();
}

#[test]
fn undo_after_n_strokes_then_n_redos_roundtrips() {
    let mut s = session();
    s.begin_draw();
    for i in 0..4 {
        s.begin_stroke(Vec2::new(i as f64, 0.0), Rgba8::BLACK, 3.0);
        s.extend_stroke(Vec2::new(i as f64, 10.0));
        s.end_stroke();
    }
    let before: Vec<_> = s.strokes().strokes().iter().map(|st| st.id).collect();

    for _ in 0..4 {
        s.undo_stroke();
    }
    assert!(s.strokes().strokes().is_empty());
    for _ in 0..4 {
        s.redo_stroke();
    }
    let after: Vec<_> = s.strokes().strokes().iter().map(|st| st.id).collect();
    assert_eq!(after, before);
}

#[test]
fn drag_gesture_commits_accumulated_delta() {
    let mut s = session();
    let id = s.begin_text_compose().unwrap();
    s.set_box_text(id, "hi");
    s.confirm_text();

    s.drag_box_by(id, Vec2::new(10.0, 10.0));
    s.drag_box_by(id, Vec2::new(-4.0, 6.0));
    s.end_box_drag(id);

    let b = s.text().get(id).unwrap();
    assert_eq!(b.last_committed_position, Vec2::new(6.0, 16.0));
}

#[test]
fn save_success_feeds_both_sinks_and_returns_to_viewing() {
    let mut s = session();
    draw_one_stroke(&mut s);

    let events: Rc<RefCell<Vec<SessionEvent>>> = Rc::default();
    let tap = events.clone();
    s.subscribe(move |e| tap.borrow_mut().push(e.clone()));

    let mut compositor = Compositor::new();
    let mut sink = MemorySink::default();
    let out = s
        .save(&mut compositor, Extent::new(48, 32), &mut sink, &meta())
        .unwrap();

    assert_eq!(s.mode(), Mode::Viewing);
    assert_eq!(out.extent(), Extent::new(48, 32));

    // Local sink received decodable PNG of the flattened output.
    assert_eq!(sink.local_saves.len(), 1);
    let png = RasterBuffer::decode(&sink.local_saves[0]).unwrap();
    assert_eq!(png.pixels(), out.pixels());

    // Upload collaborator received a decodable JPEG with the metadata.
    assert_eq!(sink.uploads.len(), 1);
    let up = &sink.uploads[0];
    assert_eq!(up.app_id, "someone@example.com");
    let jpeg = RasterBuffer::decode(&up.image_bytes).unwrap();
    assert_eq!(jpeg.extent(), out.extent());

    assert!(events.borrow().iter().any(|e| matches!(
        e,
        SessionEvent::Saved {
            width: 48,
            height: 32
        }
    )));
}

#[test]
fn failed_save_restores_mode_and_keeps_edits() {
    let mut s = session();
    draw_one_stroke(&mut s);
    s.begin_draw();

    let events: Rc<RefCell<Vec<SessionEvent>>> = Rc::default();
    let tap = events.clone();
    s.subscribe(move |e| tap.borrow_mut().push(e.clone()));

    let mut compositor = Compositor::new();
    let mut sink = MemorySink::default();
    let err = s
        .save(&mut compositor, Extent::new(0, 0), &mut sink, &meta())
        .unwrap_err();

    assert!(matches!(err, inklay::InklayError::Composition(_)));
    assert_eq!(s.mode(), Mode::Drawing);
    assert_eq!(s.strokes().strokes().len(), 1);
    assert!(sink.local_saves.is_empty());
    assert!(sink.uploads.is_empty());
    assert!(
        events
            .borrow()
            .iter()
            .any(|e| matches!(e, SessionEvent::SaveFailed { .. }))
    );
}

#[test]
fn local_sink_failure_is_a_notice_and_upload_still_runs() {
    let mut s = session();
    let events: Rc<RefCell<Vec<SessionEvent>>> = Rc::default();
    let tap = events.clone();
    s.subscribe(move |e| tap.borrow_mut().push(e.clone()));

    let mut compositor = Compositor::new();
    let mut sink = MemorySink {
        fail_local: true,
        ..MemorySink::default()
    };
    s.save(&mut compositor, Extent::new(48, 32), &mut sink, &meta())
        .unwrap();

    assert_eq!(sink.uploads.len(), 1);
    assert_eq!(s.mode(), Mode::Viewing);
    assert!(
        events
            .borrow()
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice { .. }))
    );
}

#[test]
fn preview_tracks_filter_and_save_matches_preview_when_unannotated() {
    let mut s = session();
    let spec = FilterSpec::new(FilterKind::Crystallize, 0.8);
    s.set_filter(spec);

    let mut compositor = Compositor::new();
    let mut sink = MemorySink::default();
    let out = s
        .save(&mut compositor, s.viewport(), &mut sink, &meta())
        .unwrap();

    // With no annotations, the flattened output is exactly the preview.
    assert_eq!(out.pixels(), s.preview().pixels());
}

#[test]
fn transport_errors_surface_as_notices() {
    let mut s = session();
    let events: Rc<RefCell<Vec<SessionEvent>>> = Rc::default();
    let tap = events.clone();
    s.subscribe(move |e| tap.borrow_mut().push(e.clone()));

    s.notify_transport_error("upload target unreachable");
    assert_eq!(
        events.borrow().last(),
        Some(&SessionEvent::Notice {
            message: "upload target unreachable".to_string()
        })
    );
}

#[test]
fn decode_failure_allows_placeholder_fallback() {
    let err = EditSession::from_bytes(b"junk", Extent::new(10, 10)).unwrap_err();
    assert!(matches!(err, inklay::InklayError::Decode(_)));

    // Caller-side fallback path: a placeholder buffer still opens a session.
    let s = EditSession::new(
        RasterBuffer::solid(10, 10, Rgba8::new(0, 0, 255, 255)),
        Extent::new(10, 10),
    );
    assert_eq!(s.mode(), Mode::Viewing);
}
