use anyhow::{Context, Result, anyhow};
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::geom::PixelRect;

/// Imperative drawing target for fitted text.
pub trait Surface {
    fn fill_rect(&mut self, rect: PixelRect, color: &str);
    fn push_clip(&mut self, rect: PixelRect);
    fn pop_clip(&mut self);
    /// Draws one line whose line box starts at `top`.
    fn fill_text(&mut self, text: &str, x: f32, top: f32, font_size: f32, color: &str);
}

/// Off-screen canvas backed by an SVG document, rasterized with resvg.
pub struct SvgSurface {
    width: u32,
    height: u32,
    font_family: String,
    ascent_ratio: f32,
    line_height_factor: f32,
    body: String,
    clip_count: usize,
    open_groups: usize,
}

impl SvgSurface {
    pub fn new(width: u32, height: u32, font_family: impl Into<String>) -> Self {
        Self {
            width,
            height,
            font_family: font_family.into(),
            ascent_ratio: 0.8,
            line_height_factor: 1.2,
            body: String::new(),
            clip_count: 0,
            open_groups: 0,
        }
    }

    pub fn with_ascent_ratio(mut self, ratio: f32) -> Self {
        self.ascent_ratio = ratio;
        self
    }

    pub fn with_line_height_factor(mut self, factor: f32) -> Self {
        self.line_height_factor = factor;
        self
    }

    /// Draws a raster image unscaled at the origin.
    pub fn draw_image(&mut self, data_uri: &str, width: u32, height: u32) {
        self.body.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
            uri = data_uri,
            w = width,
            h = height
        ));
    }

    pub fn finish(mut self) -> String {
        while self.open_groups > 0 {
            self.pop_clip();
        }
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">{body}</svg>"#,
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

impl Surface for SvgSurface {
    fn fill_rect(&mut self, rect: PixelRect, color: &str) {
        self.body.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"#,
            x = rect.x,
            y = rect.y,
            w = rect.width,
            h = rect.height,
            fill = escape_xml(color)
        ));
    }

    fn push_clip(&mut self, rect: PixelRect) {
        let id = format!("clip-{}", self.clip_count);
        self.clip_count += 1;
        self.body.push_str(&format!(
            r#"<clipPath id="{id}"><rect x="{x}" y="{y}" width="{w}" height="{h}"/></clipPath><g clip-path="url(#{id})">"#,
            id = id,
            x = rect.x,
            y = rect.y,
            w = rect.width,
            h = rect.height
        ));
        self.open_groups += 1;
    }

    fn pop_clip(&mut self) {
        if self.open_groups > 0 {
            self.body.push_str("</g>");
            self.open_groups -= 1;
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, top: f32, font_size: f32, color: &str) {
        let line_height = font_size * self.line_height_factor;
        let baseline = top + (line_height - font_size) / 2.0 + font_size * self.ascent_ratio;
        self.body.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" fill="{color}" xml:space="preserve">{text}</text>"#,
            x = x,
            y = baseline,
            size = font_size,
            family = escape_xml(&self.font_family),
            color = escape_xml(color),
            text = escape_xml(text)
        ));
    }
}

/// Rasterizes an SVG document to PNG bytes.
pub fn rasterize_png(svg: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow!("failed to allocate {}x{} canvas", size.width(), size.height()))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .with_context(|| "failed to encode PNG")?;
    Ok(bytes)
}

pub(crate) fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_groups_are_balanced() {
        let mut surface = SvgSurface::new(100, 50, "sans-serif");
        surface.fill_rect(PixelRect::new(1.0, 2.0, 30.0, 10.0), "#fff");
        surface.push_clip(PixelRect::new(1.0, 2.0, 30.0, 10.0));
        surface.fill_text("a < b", 3.0, 2.0, 8.0, "#000");
        let svg = surface.finish();
        assert_eq!(svg.matches("<g ").count(), svg.matches("</g>").count());
        assert!(svg.contains("clip-path=\"url(#clip-0)\""));
        assert!(svg.contains("a &lt; b"));
    }

    #[test]
    fn rasterizes_plain_rect() {
        let mut surface = SvgSurface::new(4, 3, "sans-serif");
        surface.fill_rect(PixelRect::new(0.0, 0.0, 4.0, 3.0), "#ff0000");
        let png = rasterize_png(&surface.finish(), None).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(1, 1).0, [255, 0, 0, 255]);
    }
}
