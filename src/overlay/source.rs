use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{GenericImageView, ImageFormat};
use std::fs;
use std::io::Cursor;
use std::process::Command;
use tempfile::tempdir;
use tracing::{debug, warn};

use crate::data::{DataAttachment, PNG_MIME};

const PDF_RENDER_DPI: &str = "150";

/// The picture blocks are laid over, decoded at its native resolution and
/// re-encoded as PNG.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl SourceImage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded =
            image::load_from_memory(bytes).with_context(|| "failed to decode source image")?;
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("source image has no pixels"));
        }
        let mut png = Vec::new();
        decoded
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .with_context(|| "failed to encode source image")?;
        Ok(Self { png, width, height })
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", PNG_MIME, BASE64.encode(&self.png))
    }
}

/// Returns the displayable picture for an upload. PDFs are shown as their
/// first page, which needs `mutool` or `pdftoppm`; without either the
/// result is `None` and the page falls back to its placeholder.
pub fn load_source(data: &DataAttachment) -> Result<Option<SourceImage>> {
    if data.is_pdf() {
        return match render_first_page(&data.bytes) {
            Ok(png) => SourceImage::from_bytes(&png).map(Some),
            Err(err) => {
                warn!("pdf preview unavailable: {:#}", err);
                Ok(None)
            }
        };
    }
    SourceImage::from_bytes(&data.bytes).map(Some)
}

fn render_first_page(pdf_bytes: &[u8]) -> Result<Vec<u8>> {
    let dir = tempdir().with_context(|| "failed to create temp dir for pdf")?;
    let input_path = dir.path().join("input.pdf");
    let output_path = dir.path().join("page.png");
    fs::write(&input_path, pdf_bytes).with_context(|| "failed to write temp pdf")?;

    if command_exists("mutool") {
        debug!("rendering pdf first page with mutool");
        let output = Command::new("mutool")
            .arg("draw")
            .arg("-r")
            .arg(PDF_RENDER_DPI)
            .arg("-o")
            .arg(&output_path)
            .arg(&input_path)
            .arg("1")
            .output()
            .with_context(|| "failed to run mutool")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("mutool failed: {}", stderr.trim()));
        }
    } else if command_exists("pdftoppm") {
        debug!("rendering pdf first page with pdftoppm");
        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(PDF_RENDER_DPI)
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg("1")
            .arg("-singlefile")
            .arg(&input_path)
            .arg(dir.path().join("page"))
            .output()
            .with_context(|| "failed to run pdftoppm")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("pdftoppm failed: {}", stderr.trim()));
        }
    } else {
        return Err(anyhow!(
            "pdf rendering requires mutool or pdftoppm (install mupdf or poppler)"
        ));
    }

    fs::read(&output_path).with_context(|| "failed to read rendered pdf page")
}

fn command_exists(cmd: &str) -> bool {
    match Command::new(cmd).arg("-h").output() {
        Ok(_) => true,
        Err(err) => err.kind() != std::io::ErrorKind::NotFound,
    }
}

#[cfg(test)]
pub(crate) fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
