//! Inklay is the editing core of an image-annotation editor.
//!
//! A session loads one base image, applies a non-destructive filter from a
//! closed set, overlays freehand ink strokes and repositionable text labels,
//! then flattens every layer into one raster output:
//!
//! - Decode bytes into a [`RasterBuffer`] and open an [`EditSession`]
//! - Drive the mode state machine (viewing, filter preview, drawing, text
//!   editing) through session operations
//! - Flatten with a [`Compositor`]; outputs are pixel-equivalent to the live
//!   preview and deterministic
//!
//! Network fetch and upload transport stay outside the crate; the session
//! hands final bytes to a [`SaveSink`].
#![forbid(unsafe_code)]

mod blend;
mod filter_cpu;

pub mod catalog;
pub mod compositor;
pub mod core;
pub mod error;
pub mod filter;
pub mod raster;
pub mod session;
pub mod stroke;
pub mod text;
pub mod upload;

pub use crate::core::{Extent, Rgba8, Vec2};
pub use crate::error::{InklayError, InklayResult};

pub use crate::catalog::ImageRecord;
pub use crate::compositor::{Compositor, OverlayPlan, plan_overlay};
pub use crate::filter::{FilterKind, FilterParam, FilterSpec};
pub use crate::raster::RasterBuffer;
pub use crate::session::{EditSession, FilterTicket, Mode, SessionEvent, TextFocus};
pub use crate::stroke::{Stroke, StrokeId, StrokeLayer};
pub use crate::text::{TextBox, TextBoxId, TextLayer};
pub use crate::upload::{SaveSink, UploadMeta, UploadRequest, multipart_body};
