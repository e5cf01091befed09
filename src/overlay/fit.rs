//! Fits translated text into a pixel box.
//!
//! [`compute`] is pure: it picks the largest font size, from half the box
//! height down to the floor, whose greedy word wrap fits vertically, and
//! centers every line. When nothing fits it returns the floor size with a
//! clip rectangle set. [`apply`] replays a layout onto a [`Surface`].

use tracing::warn;

use super::font::TextMeasure;
use super::geom::PixelRect;
use super::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    pub min_font_size: f32,
    pub horizontal_padding: f32,
    pub line_height_factor: f32,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            min_font_size: 8.0,
            horizontal_padding: 4.0,
            line_height_factor: 1.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FittedLine {
    pub text: String,
    /// Left edge of the line.
    pub x: f32,
    /// Top edge of the line box.
    pub y: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitLayout {
    pub font_size: f32,
    pub line_height: f32,
    pub lines: Vec<FittedLine>,
    /// Set when no size fit and drawing must be clipped to the box.
    pub clip: Option<PixelRect>,
}

impl FitLayout {
    pub fn fits(&self) -> bool {
        self.clip.is_none()
    }

    pub fn text_height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }
}

/// Greedy word wrap against `max_width`. Words are never split; a word wider
/// than `max_width` gets a line of its own.
pub fn wrap_words<M: TextMeasure + ?Sized>(
    text: &str,
    max_width: f32,
    font_size: f32,
    measure: &M,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if current.is_empty() || measure.measure(&candidate, font_size) < max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn compute<M: TextMeasure + ?Sized>(
    text: &str,
    rect: PixelRect,
    measure: &M,
    params: &FitParams,
) -> FitLayout {
    let max_width = rect.width - params.horizontal_padding;
    let floor = params.min_font_size;

    let mut font_size = (rect.height / 2.0).floor();
    while font_size >= floor {
        let lines = wrap_words(text, max_width, font_size, measure);
        let line_height = font_size * params.line_height_factor;
        if lines.len() as f32 * line_height <= rect.height {
            return position(lines, font_size, line_height, rect, measure, None);
        }
        font_size -= 1.0;
    }

    warn!(
        "text does not fit {:.1}x{:.1} box; clipping at {}px",
        rect.width, rect.height, floor
    );
    let lines = wrap_words(text, max_width, floor, measure);
    position(
        lines,
        floor,
        floor * params.line_height_factor,
        rect,
        measure,
        Some(rect),
    )
}

fn position<M: TextMeasure + ?Sized>(
    lines: Vec<String>,
    font_size: f32,
    line_height: f32,
    rect: PixelRect,
    measure: &M,
    clip: Option<PixelRect>,
) -> FitLayout {
    let text_height = lines.len() as f32 * line_height;
    let start_y = rect.y + (rect.height - text_height) / 2.0;
    let lines = lines
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let width = measure.measure(&text, font_size);
            FittedLine {
                x: rect.x + (rect.width - width) / 2.0,
                y: start_y + index as f32 * line_height,
                width,
                text,
            }
        })
        .collect();
    FitLayout {
        font_size,
        line_height,
        lines,
        clip,
    }
}

pub fn apply<S: Surface + ?Sized>(layout: &FitLayout, surface: &mut S, color: &str) {
    if layout.lines.is_empty() {
        return;
    }
    if let Some(clip) = layout.clip {
        surface.push_clip(clip);
    }
    for line in &layout.lines {
        surface.fill_text(&line.text, line.x, line.y, layout.font_size, color);
    }
    if layout.clip.is_some() {
        surface.pop_clip();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::font::EstimatedMeasure;

    /// Every character is exactly half the font size wide.
    struct Monospace;

    impl TextMeasure for Monospace {
        fn measure(&self, text: &str, font_size: f32) -> f32 {
            text.chars().count() as f32 * font_size * 0.5
        }
    }

    #[derive(Debug, PartialEq)]
    enum Op {
        Clip(PixelRect),
        Unclip,
        Text(String, f32, f32, f32),
    }

    #[derive(Default)]
    struct Recorder {
        ops: Vec<Op>,
    }

    impl Surface for Recorder {
        fn fill_rect(&mut self, _rect: PixelRect, _color: &str) {}

        fn push_clip(&mut self, rect: PixelRect) {
            self.ops.push(Op::Clip(rect));
        }

        fn pop_clip(&mut self) {
            self.ops.push(Op::Unclip);
        }

        fn fill_text(&mut self, text: &str, x: f32, top: f32, font_size: f32, _color: &str) {
            self.ops.push(Op::Text(text.to_string(), x, top, font_size));
        }
    }

    #[test]
    fn greedy_wrap_fills_lines_in_order() {
        // 10px per char at size 20, max width 100 -> at most 9 chars per line.
        let lines = wrap_words("the quick brown fox jumps", 100.0, 20.0, &Monospace);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn long_word_keeps_its_own_line_unsplit() {
        let lines = wrap_words("a supercalifragilistic b", 50.0, 20.0, &Monospace);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
        for line in &lines {
            assert!(!line.contains(' ') || Monospace.measure(line, 20.0) < 50.0);
        }
    }

    #[test]
    fn empty_text_draws_nothing() {
        let rect = PixelRect::new(0.0, 0.0, 100.0, 40.0);
        let layout = compute("   ", rect, &Monospace, &FitParams::default());
        assert!(layout.lines.is_empty());
        let mut recorder = Recorder::default();
        apply(&layout, &mut recorder, "#000");
        assert!(recorder.ops.is_empty());
    }

    #[test]
    fn picks_largest_fitting_size_and_centers() {
        // Box 200x40: candidates start at 20. "hello" at 20 is 50 wide, one
        // line of height 24 <= 40.
        let rect = PixelRect::new(10.0, 20.0, 200.0, 40.0);
        let layout = compute("hello", rect, &Monospace, &FitParams::default());
        assert!(layout.fits());
        assert_eq!(layout.font_size, 20.0);
        assert_eq!(layout.lines.len(), 1);
        let line = &layout.lines[0];
        assert!((line.width - 50.0).abs() < 1e-4);
        assert!((line.x - (10.0 + (200.0 - 50.0) / 2.0)).abs() < 1e-4);
        assert!((line.y - (20.0 + (40.0 - 24.0) / 2.0)).abs() < 1e-4);
    }

    #[test]
    fn shrinks_until_wrapped_text_fits() {
        let rect = PixelRect::new(0.0, 0.0, 60.0, 40.0);
        let layout = compute("one two three four", rect, &Monospace, &FitParams::default());
        assert!(layout.fits());
        assert!(layout.font_size < 20.0);
        assert!(layout.text_height() <= rect.height);
        for pair in layout.lines.windows(2) {
            assert!((pair[1].y - pair[0].y - layout.line_height).abs() < 1e-4);
        }
    }

    #[test]
    fn falls_back_to_floor_with_clip() {
        let rect = PixelRect::new(5.0, 5.0, 30.0, 12.0);
        let text = "far too much text for such a tiny box";
        let layout = compute(text, rect, &Monospace, &FitParams::default());
        assert!(!layout.fits());
        assert_eq!(layout.font_size, 8.0);
        assert_eq!(layout.clip, Some(rect));

        let mut recorder = Recorder::default();
        apply(&layout, &mut recorder, "#000");
        assert_eq!(recorder.ops.first(), Some(&Op::Clip(rect)));
        assert_eq!(recorder.ops.last(), Some(&Op::Unclip));
        assert_eq!(recorder.ops.len(), layout.lines.len() + 2);
    }

    #[test]
    fn layout_is_a_pure_function_of_inputs() {
        let rect = PixelRect::new(12.0, 7.0, 143.0, 61.0);
        let params = FitParams::default();
        let text = "Bienvenue au marché de la ville";
        let first = compute(text, rect, &EstimatedMeasure, &params);
        for _ in 0..5 {
            assert_eq!(compute(text, rect, &EstimatedMeasure, &params), first);
        }
    }

    #[test]
    fn font_size_never_grows_as_height_shrinks() {
        let params = FitParams::default();
        let text = "Ouvert tous les jours de neuf heures a dix-huit heures";
        let mut previous = f32::INFINITY;
        let mut height = 200.0;
        while height >= 2.0 {
            let rect = PixelRect::new(0.0, 0.0, 150.0, height);
            let layout = compute(text, rect, &EstimatedMeasure, &params);
            assert!(
                layout.font_size <= previous,
                "height {} gave {} after {}",
                height,
                layout.font_size,
                previous
            );
            previous = layout.font_size;
            height -= 3.0;
        }
    }

    #[test]
    fn honours_configured_floor_and_padding() {
        let params = FitParams {
            min_font_size: 12.0,
            horizontal_padding: 0.0,
            line_height_factor: 1.0,
        };
        let rect = PixelRect::new(0.0, 0.0, 40.0, 10.0);
        let layout = compute("word", rect, &Monospace, &params);
        assert_eq!(layout.font_size, 12.0);
        assert!(!layout.fits());
    }
}
