use inklay::{
    Compositor, Extent, FilterKind, FilterSpec, RasterBuffer, Rgba8, Stroke, StrokeId, Vec2,
    plan_overlay,
};

fn gradient_base(w: u32, h: u32) -> RasterBuffer {
    let mut pixels = vec![0u8; (w * h * 4) as usize];
    for y in 0..h {
        for x in 0..w {
            let i = ((y * w + x) * 4) as usize;
            pixels[i] = (x * 255 / w.max(1)) as u8;
            pixels[i + 1] = (y * 255 / h.max(1)) as u8;
            pixels[i + 2] = 128;
            pixels[i + 3] = 255;
        }
    }
    RasterBuffer::from_pixels(w, h, pixels).unwrap()
}

fn ink_stroke() -> Stroke {
    Stroke {
        id: StrokeId(0),
        points: vec![Vec2::new(8.0, 8.0), Vec2::new(40.0, 24.0), Vec2::new(56.0, 56.0)],
        color: Rgba8::new(255, 0, 0, 255),
        width: 6.0,
    }
}

#[test]
fn empty_layers_flatten_equals_filter_apply_exactly() {
    let base = gradient_base(64, 48);
    let spec = FilterSpec::new(FilterKind::SepiaTone, 0.0);
    let mut compositor = Compositor::new();

    let flattened = compositor
        .flatten(&base, spec, &[], &[], Extent::new(64, 48), Extent::new(64, 48))
        .unwrap();

    let filtered = inklay::filter::apply(&base, spec);
    assert_eq!(flattened.pixels(), filtered.pixels());
}

#[test]
fn flatten_is_deterministic_with_annotations() {
    let base = gradient_base(64, 64);
    let spec = FilterSpec::new(FilterKind::Vignette, 0.4);
    let strokes = vec![ink_stroke()];
    let viewport = Extent::new(64, 64);

    let mut compositor = Compositor::new();
    let a = compositor
        .flatten(&base, spec, &strokes, &[], viewport, viewport)
        .unwrap();
    let b = compositor
        .flatten(&base, spec, &strokes, &[], viewport, viewport)
        .unwrap();
    assert_eq!(a.pixels(), b.pixels());
}

#[test]
fn strokes_change_pixels_over_filter_only_output() {
    let base = gradient_base(64, 64);
    let spec = FilterSpec::new(FilterKind::SepiaTone, 0.0);
    let viewport = Extent::new(64, 64);

    let mut compositor = Compositor::new();
    let with_ink = compositor
        .flatten(&base, spec, &[ink_stroke()], &[], viewport, viewport)
        .unwrap();
    let without = compositor
        .flatten(&base, spec, &[], &[], viewport, viewport)
        .unwrap();

    assert_eq!(with_ink.extent(), without.extent());
    assert_ne!(with_ink.pixels(), without.pixels());

    // A pixel on the stroke spine carries the ink color.
    let on_stroke = with_ink.pixel(8, 8);
    assert!(on_stroke.r > 200 && on_stroke.g < 80 && on_stroke.b < 80);
    // A far-away corner is untouched by the overlay.
    assert_eq!(with_ink.pixel(63, 0), without.pixel(63, 0));
}

#[test]
fn gaussian_blur_keeps_dimensions_and_flat_regions() {
    let color = Rgba8::new(90, 140, 200, 255);
    let base = RasterBuffer::solid(400, 300, color);
    let spec = FilterSpec::new(FilterKind::GaussianBlur, 0.5);
    let mut compositor = Compositor::new();

    let out = compositor
        .flatten(&base, spec, &[], &[], Extent::new(400, 300), Extent::new(400, 300))
        .unwrap();

    assert_eq!(out.extent(), Extent::new(400, 300));
    let center = out.pixel(200, 150);
    for (got, want) in [
        (center.r, color.r),
        (center.g, color.g),
        (center.b, color.b),
    ] {
        assert!(
            (i16::from(got) - i16::from(want)).abs() <= 1,
            "flat region drifted: got {got}, want {want}"
        );
    }
}

#[test]
fn degenerate_target_fails_with_composition_error() {
    let base = gradient_base(32, 32);
    let mut compositor = Compositor::new();
    let err = compositor
        .flatten(
            &base,
            FilterSpec::default(),
            &[],
            &[],
            Extent::new(32, 32),
            Extent::new(0, 0),
        )
        .unwrap_err();
    assert!(matches!(err, inklay::InklayError::Composition(_)));
}

#[test]
fn overlay_plan_excludes_unconfirmed_text_boxes() {
    use inklay::{TextBox, TextBoxId};

    let boxes: Vec<TextBox> = (0..4)
        .map(|i| TextBox {
            id: TextBoxId(i),
            text: format!("box {i}"),
            position: Vec2::new(i as f64, i as f64),
            last_committed_position: Vec2::new(i as f64, i as f64),
            color: Rgba8::WHITE,
            bold: false,
            is_added: i != 3,
        })
        .collect();

    let plan = plan_overlay(&[], &boxes, Extent::new(100, 100), Extent::new(100, 100)).unwrap();
    assert_eq!(plan.texts.len(), 3);
}

#[test]
fn flatten_resamples_to_larger_target() {
    let base = gradient_base(32, 32);
    let spec = FilterSpec::new(FilterKind::SepiaTone, 0.0);
    let mut compositor = Compositor::new();
    let out = compositor
        .flatten(&base, spec, &[], &[], Extent::new(32, 32), Extent::new(128, 128))
        .unwrap();
    assert_eq!(out.extent(), Extent::new(128, 128));
}
