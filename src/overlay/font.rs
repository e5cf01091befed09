use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Width of a run of text at a given font size, in pixels.
pub trait TextMeasure {
    fn measure(&self, text: &str, font_size: f32) -> f32;
}

/// Per-character width estimate used when no font file is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMeasure;

impl TextMeasure for EstimatedMeasure {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        estimate_text_width_units(text) * font_size
    }
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    family: Option<String>,
    face_index: u32,
    // Horizontal advances in font units, filled as characters are first seen.
    advances: Arc<RwLock<HashMap<char, u16>>>,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .field("face_index", &self.face_index)
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Ascender height as a fraction of the font size.
    pub fn ascent_ratio(&self) -> f32 {
        (self.ascender.max(0) as f32 / self.units_per_em.max(1) as f32).clamp(0.5, 1.2)
    }
}

impl TextMeasure for FontMetrics {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        let advance = match self.cached_advance(text) {
            Some(advance) => advance,
            None => match self.load_advances(text) {
                Some(advance) => advance,
                None => return EstimatedMeasure.measure(text, font_size),
            },
        };
        let units = self.units_per_em.max(1) as f32;
        advance as f32 * (font_size / units)
    }
}

impl FontMetrics {
    fn cached_advance(&self, text: &str) -> Option<u32> {
        let cache = self.advances.read().ok()?;
        let mut advance = 0u32;
        for ch in text.chars() {
            let glyph_advance = match ch {
                '\n' => continue,
                ' ' => self.space_advance,
                _ => *cache.get(&ch)?,
            };
            advance = advance.saturating_add(glyph_advance as u32);
        }
        Some(advance)
    }

    /// Parses the face once for the whole run and remembers every advance.
    fn load_advances(&self, text: &str) -> Option<u32> {
        let face = Face::parse(&self.data, self.face_index).ok()?;
        let mut cache = self.advances.write().ok();
        let mut advance = 0u32;
        for ch in text.chars() {
            let glyph_advance = match ch {
                '\n' => continue,
                ' ' => self.space_advance,
                _ => {
                    let glyph_advance = face
                        .glyph_index(ch)
                        .and_then(|glyph| face.glyph_hor_advance(glyph))
                        .unwrap_or(self.space_advance);
                    if let Some(cache) = cache.as_mut() {
                        cache.insert(ch, glyph_advance);
                    }
                    glyph_advance
                }
            };
            advance = advance.saturating_add(glyph_advance as u32);
        }
        Some(advance)
    }
}

pub struct ResolvedFont {
    pub metrics: FontMetrics,
    pub family: String,
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// Picks the font used to burn text into exports: an explicit file, then a
/// named system family, then the system sans-serif.
pub fn resolve_font(font_path: Option<&Path>, font_family: Option<&str>) -> Result<ResolvedFont> {
    if let Some(path) = font_path {
        let metrics = load_font_metrics(path)?;
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .or_else(|| font_family.map(|name| name.to_string()))
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(ResolvedFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        return load_font_metrics_from_family(&db, family);
    }
    load_font_metrics_from_family(&db, "sans-serif")
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xAC00..=0xD7AF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units_for_width).sum()
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: Arc::new(data.to_vec()),
                units_per_em,
                space_advance,
                ascender: face.ascender(),
                family: family.clone(),
                face_index: index,
                advances: Arc::default(),
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family)
                && found.eq_ignore_ascii_case(preferred)
            {
                return Ok(metrics);
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<ResolvedFont> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = load_font_metrics_from_data(&data, Some(family))?;
    let resolved_family = metrics
        .family()
        .map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());
    Ok(ResolvedFont {
        metrics,
        family: resolved_family,
    })
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scales_with_font_size() {
        let measure = EstimatedMeasure;
        let small = measure.measure("Hello world", 10.0);
        let large = measure.measure("Hello world", 20.0);
        assert!((large - small * 2.0).abs() < 1e-4);
        assert_eq!(measure.measure("", 12.0), 0.0);
    }

    #[test]
    fn cjk_is_wider_than_latin() {
        let measure = EstimatedMeasure;
        assert!(measure.measure("日本", 10.0) > measure.measure("ab", 10.0));
    }

    #[test]
    fn face_advances_are_cached_after_first_measure() {
        // Needs any system sans-serif; hosts without fonts skip.
        let Ok(font) = resolve_font(None, None) else {
            return;
        };
        let metrics = font.metrics;
        assert!(metrics.cached_advance("Exit").is_none());
        let first = metrics.measure("Exit this way", 20.0);
        assert!(first > 0.0);
        assert!(metrics.cached_advance("Exit this way").is_some());
        assert_eq!(metrics.advances.read().unwrap().len(), 9);
        let shared = metrics.clone();
        assert_eq!(shared.measure("Exit this way", 20.0), first);
        assert_eq!(shared.measure("Exit this way", 10.0), first / 2.0);
    }

    #[test]
    fn rejects_garbage_font_data() {
        assert!(load_font_metrics_from_data(b"not a font", None).is_err());
    }
}
