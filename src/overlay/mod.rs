//! Everything that puts translated blocks back onto the picture: the
//! hoverable HTML overlay and the burned-in PNG export.

mod export;
mod fit;
mod font;
mod geom;
mod page;
mod regions;
mod source;
mod surface;

pub use export::{
    ExportReport, ExportStyle, ExportedImage, compose, export_filename, export_png,
};
pub use fit::{FitLayout, FitParams, FittedLine, apply as apply_layout, compute as fit_text, wrap_words};
pub use font::{EstimatedMeasure, FontMetrics, ResolvedFont, TextMeasure, resolve_font};
pub use geom::{BoundingBox, DisplayGeometry, PixelRect};
pub use page::{PLACEHOLDER_TEXT, render_overlay_page};
pub use regions::{
    OverlayEvent, OverlayParams, OverlayRegion, OverlayState, PopoverAnchor, PopoverPlacement,
    build_regions, popover_placement,
};
pub use source::{SourceImage, load_source};
pub use surface::{Surface, SvgSurface, rasterize_png};
