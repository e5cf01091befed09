use anyhow::{Context, Result};
use serde::Serialize;
use tera::{Context as TeraContext, Tera};

use super::regions::{OverlayParams, build_regions};
use super::source::SourceImage;
use crate::translations::TranslationResult;

const OVERLAY_TEMPLATE: &str = include_str!("templates/overlay.html.tera");
pub const PLACEHOLDER_TEXT: &str = "No image to display";

#[derive(Serialize)]
struct PageImage {
    data_uri: String,
    width: u32,
    height: u32,
}

/// Renders the interactive overlay view as a standalone HTML document.
/// Without a source picture only the placeholder and the formatted
/// translation are shown.
pub fn render_overlay_page(
    source: Option<&SourceImage>,
    result: &TranslationResult,
    params: &OverlayParams,
    title: &str,
) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("title", title);
    context.insert("placeholder", PLACEHOLDER_TEXT);
    context.insert("formatted", &result.formatted_translation);

    match source {
        Some(source) => {
            context.insert(
                "image",
                &PageImage {
                    data_uri: source.data_uri(),
                    width: source.width,
                    height: source.height,
                },
            );
            context.insert(
                "regions",
                &build_regions(&result.translation_blocks, params),
            );
        }
        None => {
            context.insert("image", &Option::<PageImage>::None);
            context.insert("regions", &Vec::<()>::new());
        }
    }

    Tera::one_off(OVERLAY_TEMPLATE, &context, true)
        .with_context(|| "failed to render overlay page")
}
