//! Deterministic flattening of a session's layers into one raster output.
//!
//! Layering order is fixed, back to front: filtered base, committed ink
//! strokes in creation order, committed text boxes in creation order. The
//! overlay plan is a pure function so layer selection and coordinate
//! remapping are testable without rasterizing anything.

use kurbo::{BezPath, Cap, Join, Stroke as StrokeStyle, StrokeOpts};

use crate::{
    blend,
    core::{Extent, Rgba8, Vec2},
    error::{InklayError, InklayResult},
    filter::{self, FilterSpec},
    raster::{RasterBuffer, premultiply_rgba8_in_place, unpremultiply_rgba8_in_place},
    stroke::Stroke,
    text::TextBox,
};

/// Text size in viewport pixels at which boxes are laid out in the editor.
/// Flattening scales it with the target so exports match what was shown.
pub const BASE_TEXT_SIZE: f64 = 30.0;

const STROKE_EXPANSION_TOLERANCE: f64 = 0.1;

/// A stroke remapped into target coordinates, ready to rasterize.
#[derive(Clone, Debug)]
pub struct PlannedStroke {
    /// Polyline path in target pixels.
    pub path: BezPath,
    /// Brush width in target pixels.
    pub width: f64,
    pub color: Rgba8,
}

/// A committed text box remapped into target coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedText {
    pub text: String,
    /// Top-left origin in target pixels, from the box's committed position.
    pub origin: Vec2,
    /// Font size in target pixels.
    pub size: f32,
    pub bold: bool,
    pub color: Rgba8,
}

/// Everything the overlay pass will draw, in draw order.
#[derive(Clone, Debug)]
pub struct OverlayPlan {
    pub target: Extent,
    pub strokes: Vec<PlannedStroke>,
    pub texts: Vec<PlannedText>,
}

impl OverlayPlan {
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.texts.is_empty()
    }
}

/// Build the overlay plan: committed strokes and confirmed text boxes, with
/// coordinates remapped from the editing viewport to `target`.
///
/// Boxes with `is_added == false` are excluded even if the editor is
/// currently showing them live. Fails with a composition error when `target`
/// has zero area.
pub fn plan_overlay(
    strokes: &[Stroke],
    boxes: &[TextBox],
    viewport: Extent,
    target: Extent,
) -> InklayResult<OverlayPlan> {
    if target.is_empty() {
        return Err(InklayError::composition(
            "flatten target must have non-zero area",
        ));
    }
    if viewport.is_empty() {
        return Err(InklayError::composition(
            "editing viewport must have non-zero area",
        ));
    }

    let sx = target.width as f64 / viewport.width as f64;
    let sy = target.height as f64 / viewport.height as f64;
    let stroke_scale = (sx + sy) / 2.0;

    let mut planned_strokes = Vec::new();
    for stroke in strokes {
        let Some(first) = stroke.points.first() else {
            continue;
        };
        let mut path = BezPath::new();
        path.move_to((first.x * sx, first.y * sy));
        if stroke.points.len() == 1 {
            // Degenerate single-point stroke: a zero-length segment rendered
            // as a dot by the round caps.
            path.line_to((first.x * sx + 0.01, first.y * sy));
        } else {
            for p in &stroke.points[1..] {
                path.line_to((p.x * sx, p.y * sy));
            }
        }
        planned_strokes.push(PlannedStroke {
            path,
            width: stroke.width * stroke_scale,
            color: stroke.color,
        });
    }

    let texts = boxes
        .iter()
        .filter(|b| b.is_added)
        .map(|b| PlannedText {
            text: b.text.clone(),
            origin: Vec2::new(
                b.last_committed_position.x * sx,
                b.last_committed_position.y * sy,
            ),
            size: (BASE_TEXT_SIZE * sy) as f32,
            bold: b.bold,
            color: b.color,
        })
        .collect();

    Ok(OverlayPlan {
        target,
        strokes: planned_strokes,
        texts,
    })
}

/// RGBA8 brush carried through Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct TextBrush {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

/// Parley contexts for shaping and laying out label text.
struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
}

impl TextLayoutEngine {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    fn layout_plain(
        &mut self,
        text: &str,
        font_bytes: &[u8],
        size_px: f32,
        brush: TextBrush,
        bold: bool,
    ) -> InklayResult<parley::Layout<TextBrush>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(InklayError::composition("text size must be finite and > 0"));
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            InklayError::composition("no font families registered from font bytes")
        })?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| InklayError::composition("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));
        if bold {
            builder.push_default(parley::style::StyleProperty::FontWeight(
                parley::style::FontWeight::BOLD,
            ));
        }

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

/// Flattens base + filter + strokes + text into one output buffer.
///
/// Holds the label font and the text layout contexts; one instance can
/// flatten any number of sessions.
pub struct Compositor {
    font_bytes: Option<Vec<u8>>,
    font_data: Option<vello_cpu::peniko::FontData>,
    text_engine: TextLayoutEngine,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    /// A compositor without a label font. Flattening documents that contain
    /// committed text requires a font; see [`Compositor::with_font`].
    pub fn new() -> Self {
        Self {
            font_bytes: None,
            font_data: None,
            text_engine: TextLayoutEngine::new(),
        }
    }

    pub fn with_font(mut self, font_bytes: Vec<u8>) -> Self {
        self.set_font(font_bytes);
        self
    }

    pub fn set_font(&mut self, font_bytes: Vec<u8>) {
        self.font_data = Some(vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.clone()),
            0,
        ));
        self.font_bytes = Some(font_bytes);
    }

    pub fn has_font(&self) -> bool {
        self.font_data.is_some()
    }

    /// Deterministically flatten all layers at `target` size.
    ///
    /// When both annotation layers are empty the result is byte-identical to
    /// `filter::apply` on the resampled base.
    #[tracing::instrument(skip_all, fields(w = target.width, h = target.height))]
    pub fn flatten(
        &mut self,
        base: &RasterBuffer,
        spec: FilterSpec,
        strokes: &[Stroke],
        boxes: &[TextBox],
        viewport: Extent,
        target: Extent,
    ) -> InklayResult<RasterBuffer> {
        let plan = plan_overlay(strokes, boxes, viewport, target)?;

        let scaled = if base.is_empty() {
            RasterBuffer::solid(target.width, target.height, Rgba8::TRANSPARENT)
        } else {
            base.resized(target)?
        };
        let filtered = filter::apply(&scaled, spec);
        if plan.is_empty() {
            return Ok(filtered);
        }

        let overlay = self.render_overlay(&plan)?;
        let mut dst = filtered.into_pixels();
        premultiply_rgba8_in_place(&mut dst);
        blend::over_in_place(&mut dst, &overlay)?;
        unpremultiply_rgba8_in_place(&mut dst);
        RasterBuffer::from_pixels(target.width, target.height, dst)
    }

    /// Rasterize the overlay plan onto a transparent surface, returning
    /// premultiplied RGBA8 bytes of exactly `plan.target` size.
    fn render_overlay(&mut self, plan: &OverlayPlan) -> InklayResult<Vec<u8>> {
        let w: u16 = plan
            .target
            .width
            .try_into()
            .map_err(|_| InklayError::composition("flatten target width exceeds u16"))?;
        let h: u16 = plan
            .target
            .height
            .try_into()
            .map_err(|_| InklayError::composition("flatten target height exceeds u16"))?;

        let mut ctx = vello_cpu::RenderContext::new(w, h);
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        for stroke in &plan.strokes {
            let style = StrokeStyle::new(stroke.width)
                .with_caps(Cap::Round)
                .with_join(Join::Round);
            let outline = kurbo::stroke(
                stroke.path.elements().iter().copied(),
                &style,
                &StrokeOpts::default(),
                STROKE_EXPANSION_TOLERANCE,
            );
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                stroke.color.r,
                stroke.color.g,
                stroke.color.b,
                stroke.color.a,
            ));
            ctx.fill_path(&bezpath_to_cpu(&outline));
        }

        for text in &plan.texts {
            if text.text.is_empty() {
                continue;
            }
            let (Some(font_bytes), Some(font_data)) = (&self.font_bytes, &self.font_data) else {
                return Err(InklayError::composition(
                    "document contains committed text but no label font is configured",
                ));
            };
            let brush = TextBrush {
                r: text.color.r,
                g: text.color.g,
                b: text.color.b,
                a: text.color.a,
            };
            let layout =
                self.text_engine
                    .layout_plain(&text.text, font_bytes, text.size, brush, text.bold)?;

            ctx.set_transform(vello_cpu::kurbo::Affine::translate((
                text.origin.x,
                text.origin.y,
            )));
            for line in layout.lines() {
                for item in line.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };
                    let brush = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                        brush.r, brush.g, brush.b, brush.a,
                    ));
                    let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(font_data)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        Ok(pixmap.data_as_u8_slice().to_vec())
    }
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
