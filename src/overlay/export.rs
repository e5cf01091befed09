use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use super::fit::{self, FitParams};
use super::font::{EstimatedMeasure, ResolvedFont, TextMeasure};
use super::geom::PixelRect;
use super::source::SourceImage;
use super::surface::{Surface, SvgSurface, rasterize_png};
use crate::settings::Settings;
use crate::translations::TranslatedBlock;

const FALLBACK_STEM: &str = "image";

#[derive(Debug, Clone)]
pub struct ExportStyle {
    pub fill_color: String,
    pub text_color: String,
    pub fit: FitParams,
    pub degenerate_cutoff_px: f32,
    pub file_suffix: String,
}

impl Default for ExportStyle {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ExportStyle {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fill_color: settings.fill_color.clone(),
            text_color: settings.text_color.clone(),
            fit: settings.fit_params(),
            degenerate_cutoff_px: settings.degenerate_cutoff_px,
            file_suffix: settings.file_suffix.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub drawn: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ExportedImage {
    pub file_name: String,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub report: ExportReport,
}

/// `photo.jpg` becomes `photo_translated.png`.
pub fn export_filename(original_name: Option<&str>, suffix: &str) -> String {
    let stem = original_name
        .and_then(|name| Path::new(name).file_stem())
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or(FALLBACK_STEM);
    format!("{}{}.png", stem, suffix)
}

/// Paints every block onto a `width` x `height` canvas: an opaque rectangle
/// over the original text, then the translation fitted inside it. Boxes
/// that end up thinner than the cutoff after clipping are skipped.
pub fn compose<S, M>(
    surface: &mut S,
    width: u32,
    height: u32,
    blocks: &[TranslatedBlock],
    measure: &M,
    style: &ExportStyle,
) -> ExportReport
where
    S: Surface + ?Sized,
    M: TextMeasure + ?Sized,
{
    let mut report = ExportReport::default();
    for (index, block) in blocks.iter().enumerate() {
        if !block.bounding_box.is_within_image() {
            warn!(index, bbox = ?block.bounding_box, "bounding box leaves the image; clipping");
        }
        let rect: PixelRect = block
            .bounding_box
            .to_pixels(width as f32, height as f32)
            .clip_to(width as f32, height as f32);
        if rect.is_degenerate(style.degenerate_cutoff_px) {
            debug!(
                "skipping block with degenerate box {:.2}x{:.2}",
                rect.width, rect.height
            );
            report.skipped += 1;
            continue;
        }
        surface.fill_rect(rect, &style.fill_color);
        let layout = fit::compute(&block.translated_text, rect, measure, &style.fit);
        fit::apply(&layout, surface, &style.text_color);
        report.drawn += 1;
    }
    report
}

/// Renders the translated picture at the source's native resolution.
pub fn export_png(
    source: &SourceImage,
    blocks: &[TranslatedBlock],
    font: Option<&ResolvedFont>,
    style: &ExportStyle,
    original_name: Option<&str>,
) -> Result<ExportedImage> {
    let family = font
        .map(|font| font.family.clone())
        .unwrap_or_else(|| "sans-serif".to_string());
    let mut surface = SvgSurface::new(source.width, source.height, family)
        .with_line_height_factor(style.fit.line_height_factor);
    if let Some(font) = font {
        surface = surface.with_ascent_ratio(font.metrics.ascent_ratio());
    }
    surface.draw_image(&source.data_uri(), source.width, source.height);

    let report = match font {
        Some(font) => compose(
            &mut surface,
            source.width,
            source.height,
            blocks,
            &font.metrics,
            style,
        ),
        None => compose(
            &mut surface,
            source.width,
            source.height,
            blocks,
            &EstimatedMeasure,
            style,
        ),
    };

    let svg = surface.finish();
    let png = rasterize_png(&svg, font.map(|font| font.metrics.data()))?;
    let file_name = export_filename(original_name, &style.file_suffix);
    info!(
        file = %file_name,
        drawn = report.drawn,
        skipped = report.skipped,
        "export rendered"
    );
    Ok(ExportedImage {
        file_name,
        png,
        width: source.width,
        height: source.height,
        report,
    })
}
