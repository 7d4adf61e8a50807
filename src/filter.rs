use crate::{filter_cpu, raster::RasterBuffer};

/// The closed set of non-destructive filters.
///
/// The set is fixed, so filters are a tagged variant with a uniform
/// parameter-mapping table rather than dynamically-dispatched objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FilterKind {
    Crystallize,
    Edges,
    GaussianBlur,
    Pixellate,
    SepiaTone,
    UnsharpMask,
    Vignette,
}

impl FilterKind {
    /// Human-readable name, as shown in a filter picker.
    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Crystallize => "Crystallize",
            FilterKind::Edges => "Edges",
            FilterKind::GaussianBlur => "Gaussian Blur",
            FilterKind::Pixellate => "Pixellate",
            FilterKind::SepiaTone => "Sepia Tone",
            FilterKind::UnsharpMask => "Unsharp Mask",
            FilterKind::Vignette => "Vignette",
        }
    }

    pub fn all() -> [FilterKind; 7] {
        [
            FilterKind::Crystallize,
            FilterKind::Edges,
            FilterKind::GaussianBlur,
            FilterKind::Pixellate,
            FilterKind::SepiaTone,
            FilterKind::UnsharpMask,
            FilterKind::Vignette,
        ]
    }
}

/// The single parameter a filter kind consumes, derived from the slider
/// intensity. Kinds that do not key on a given parameter never receive it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterParam {
    /// Passed through directly, in [0, 1].
    Intensity(f64),
    /// `intensity * 200`, in pixels.
    Radius(f64),
    /// `intensity * 10`, in pixels.
    Scale(f64),
}

/// A filter kind plus its slider intensity. Stateless value type; the filter
/// is re-applied from scratch on every intensity change.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub intensity: f64,
}

impl FilterSpec {
    /// Build a spec, clamping intensity into [0, 1].
    pub fn new(kind: FilterKind, intensity: f64) -> Self {
        let intensity = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { kind, intensity }
    }

    /// The derived parameter for this spec's kind.
    pub fn param(self) -> FilterParam {
        match self.kind {
            FilterKind::SepiaTone | FilterKind::Vignette => FilterParam::Intensity(self.intensity),
            FilterKind::GaussianBlur | FilterKind::UnsharpMask => {
                FilterParam::Radius(self.intensity * 200.0)
            }
            FilterKind::Crystallize | FilterKind::Pixellate | FilterKind::Edges => {
                FilterParam::Scale(self.intensity * 10.0)
            }
        }
    }
}

impl Default for FilterSpec {
    /// Sepia tone at half intensity, the editor's starting filter.
    fn default() -> Self {
        Self::new(FilterKind::SepiaTone, 0.5)
    }
}

/// Apply `spec` to `base`, producing a new buffer.
///
/// Pure and deterministic: identical inputs yield byte-identical output. A
/// zero-sized base is returned unchanged rather than erroring.
#[tracing::instrument(skip(base), fields(w = base.width(), h = base.height()))]
pub fn apply(base: &RasterBuffer, spec: FilterSpec) -> RasterBuffer {
    if base.is_empty() {
        return base.clone();
    }

    let (w, h) = (base.width(), base.height());
    let src = base.pixels();
    let out = match (spec.kind, spec.param()) {
        (FilterKind::SepiaTone, FilterParam::Intensity(i)) => filter_cpu::sepia(src, i),
        (FilterKind::Vignette, FilterParam::Intensity(i)) => filter_cpu::vignette(src, w, h, i),
        (FilterKind::GaussianBlur, FilterParam::Radius(r)) => {
            filter_cpu::gaussian_blur(src, w, h, r)
        }
        (FilterKind::UnsharpMask, FilterParam::Radius(r)) => filter_cpu::unsharp(src, w, h, r),
        (FilterKind::Pixellate, FilterParam::Scale(s)) => filter_cpu::pixellate(src, w, h, s),
        (FilterKind::Crystallize, FilterParam::Scale(s)) => filter_cpu::crystallize(src, w, h, s),
        (FilterKind::Edges, FilterParam::Scale(s)) => filter_cpu::edges(src, w, h, s),
        // param() is total over kinds; no other pairing can occur.
        (kind, param) => unreachable!("filter {kind:?} paired with {param:?}"),
    };

    // Kernels are size-preserving; recover as a no-op rather than surfacing
    // a filter failure.
    RasterBuffer::from_pixels(w, h, out).unwrap_or_else(|_| base.clone())
}
