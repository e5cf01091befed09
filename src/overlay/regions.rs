use serde::Serialize;
use tracing::warn;

use super::geom::{BoundingBox, DisplayGeometry};
use crate::translations::TranslatedBlock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayParams {
    /// Blocks whose bottom edge lies below this percentage get their
    /// popover above instead of below.
    pub popover_flip_threshold: f32,
    pub popover_offset_px: f32,
}

impl Default for OverlayParams {
    fn default() -> Self {
        Self {
            popover_flip_threshold: 70.0,
            popover_offset_px: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PopoverAnchor {
    Below,
    Above,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopoverPlacement {
    pub anchor: PopoverAnchor,
    pub top_percent: f32,
    pub left_percent: f32,
    pub offset_px: f32,
}

impl PopoverPlacement {
    pub fn css(&self) -> String {
        let transform = match self.anchor {
            PopoverAnchor::Below => format!("translateY({}px)", self.offset_px),
            PopoverAnchor::Above => format!("translateY(calc(-100% - {}px))", self.offset_px),
        };
        format!(
            "top: {}%; left: {}%; transform: {};",
            self.top_percent, self.left_percent, transform
        )
    }
}

pub fn popover_placement(bbox: &BoundingBox, params: &OverlayParams) -> PopoverPlacement {
    let bbox = bbox.clamped();
    if bbox.bottom() > params.popover_flip_threshold {
        PopoverPlacement {
            anchor: PopoverAnchor::Above,
            top_percent: bbox.y,
            left_percent: bbox.x,
            offset_px: params.popover_offset_px,
        }
    } else {
        PopoverPlacement {
            anchor: PopoverAnchor::Below,
            top_percent: bbox.bottom(),
            left_percent: bbox.x,
            offset_px: params.popover_offset_px,
        }
    }
}

/// One hoverable block, positioned in percent of the displayed image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayRegion {
    pub index: usize,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub original_text: String,
    pub translated_text: String,
    pub popover: PopoverPlacement,
    pub style: String,
    pub popover_style: String,
}

pub fn build_regions(blocks: &[TranslatedBlock], params: &OverlayParams) -> Vec<OverlayRegion> {
    blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            if !block.bounding_box.is_within_image() {
                warn!(index, bbox = ?block.bounding_box, "bounding box leaves the image; clamping");
            }
            let bbox = block.bounding_box.clamped();
            let popover = popover_placement(&block.bounding_box, params);
            OverlayRegion {
                index,
                left: bbox.x,
                top: bbox.y,
                width: bbox.width,
                height: bbox.height,
                original_text: block.original_text.clone(),
                translated_text: block.translated_text.clone(),
                style: format!(
                    "left: {}%; top: {}%; width: {}%; height: {}%;",
                    bbox.x, bbox.y, bbox.width, bbox.height
                ),
                popover_style: popover.css(),
                popover,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayEvent {
    ImageLoaded {
        natural_width: f32,
        natural_height: f32,
        container_width: f32,
        container_height: f32,
    },
    Resized {
        container_width: f32,
        container_height: f32,
    },
    PointerEnter(usize),
    PointerLeave(usize),
    Cleared,
}

/// Interactive state of the overlay view: which block is hovered and where
/// the image currently sits in its container.
///
/// This is the reference model for the script in `templates/overlay.html.tera`,
/// which runs the same events in the browser: load and resize recompute the
/// contained image box, and leaving a block only hides its own popover.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayState {
    natural_size: Option<(f32, f32)>,
    geometry: Option<DisplayGeometry>,
    hovered: Option<usize>,
}

impl OverlayState {
    pub fn apply(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::ImageLoaded {
                natural_width,
                natural_height,
                container_width,
                container_height,
            } => {
                self.natural_size = Some((natural_width, natural_height));
                self.geometry = DisplayGeometry::contain(
                    container_width,
                    container_height,
                    natural_width,
                    natural_height,
                );
            }
            OverlayEvent::Resized {
                container_width,
                container_height,
            } => {
                if let Some((natural_width, natural_height)) = self.natural_size {
                    self.geometry = DisplayGeometry::contain(
                        container_width,
                        container_height,
                        natural_width,
                        natural_height,
                    );
                }
            }
            OverlayEvent::PointerEnter(index) => self.hovered = Some(index),
            OverlayEvent::PointerLeave(index) => {
                if self.hovered == Some(index) {
                    self.hovered = None;
                }
            }
            OverlayEvent::Cleared => *self = OverlayState::default(),
        }
    }

    pub fn has_image(&self) -> bool {
        self.natural_size.is_some()
    }

    pub fn geometry(&self) -> Option<DisplayGeometry> {
        self.geometry
    }

    pub fn visible_popover(&self) -> Option<usize> {
        self.hovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::count_warnings;

    fn block(y: f32, height: f32) -> TranslatedBlock {
        TranslatedBlock {
            original_text: "Bonjour".to_string(),
            translated_text: "Hello".to_string(),
            bounding_box: BoundingBox::new(10.0, y, 30.0, height),
        }
    }

    #[test]
    fn popover_flips_above_near_the_bottom() {
        let params = OverlayParams::default();
        let low = popover_placement(&BoundingBox::new(5.0, 75.0, 20.0, 10.0), &params);
        assert_eq!(low.anchor, PopoverAnchor::Above);
        assert_eq!(low.top_percent, 75.0);

        let high = popover_placement(&BoundingBox::new(5.0, 30.0, 20.0, 10.0), &params);
        assert_eq!(high.anchor, PopoverAnchor::Below);
        assert_eq!(high.top_percent, 40.0);
    }

    #[test]
    fn flip_threshold_is_exclusive_and_configurable() {
        let bbox = BoundingBox::new(0.0, 60.0, 10.0, 10.0);
        let default = popover_placement(&bbox, &OverlayParams::default());
        assert_eq!(default.anchor, PopoverAnchor::Below);

        let params = OverlayParams {
            popover_flip_threshold: 50.0,
            popover_offset_px: 4.0,
        };
        let custom = popover_placement(&bbox, &params);
        assert_eq!(custom.anchor, PopoverAnchor::Above);
        assert_eq!(custom.css(), "top: 60%; left: 0%; transform: translateY(calc(-100% - 4px));");
    }

    #[test]
    fn regions_mirror_percentages_and_clip() {
        let mut blocks = vec![block(10.0, 10.0), block(95.0, 20.0)];
        blocks[1].bounding_box.x = -10.0;
        let regions = build_regions(&blocks, &OverlayParams::default());
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].style, "left: 10%; top: 10%; width: 30%; height: 10%;");
        assert_eq!(regions[0].popover.anchor, PopoverAnchor::Below);
        assert_eq!(regions[1].left, 0.0);
        assert_eq!(regions[1].width, 20.0);
        assert_eq!(regions[1].height, 5.0);
        assert_eq!(regions[1].popover.anchor, PopoverAnchor::Above);
    }

    #[test]
    fn out_of_range_boxes_are_reported() {
        let mut blocks = vec![block(10.0, 10.0), block(95.0, 20.0)];
        let (regions, warnings) =
            count_warnings(|| build_regions(&blocks, &OverlayParams::default()));
        assert_eq!(regions.len(), 2);
        assert_eq!(warnings, 1);

        blocks.remove(1);
        let (_, warnings) = count_warnings(|| build_regions(&blocks, &OverlayParams::default()));
        assert_eq!(warnings, 0);
    }

    #[test]
    fn one_popover_at_a_time() {
        let mut state = OverlayState::default();
        state.apply(OverlayEvent::PointerEnter(0));
        state.apply(OverlayEvent::PointerEnter(2));
        assert_eq!(state.visible_popover(), Some(2));
        state.apply(OverlayEvent::PointerLeave(0));
        assert_eq!(state.visible_popover(), Some(2));
        state.apply(OverlayEvent::PointerLeave(2));
        assert_eq!(state.visible_popover(), None);
    }

    #[test]
    fn geometry_follows_load_and_resize() {
        let mut state = OverlayState::default();
        state.apply(OverlayEvent::Resized {
            container_width: 800.0,
            container_height: 600.0,
        });
        assert!(!state.has_image());
        assert!(state.geometry().is_none());

        state.apply(OverlayEvent::ImageLoaded {
            natural_width: 1000.0,
            natural_height: 500.0,
            container_width: 800.0,
            container_height: 600.0,
        });
        let geometry = state.geometry().unwrap();
        assert_eq!(geometry.width, 800.0);
        assert_eq!(geometry.height, 400.0);
        assert_eq!(geometry.top, 100.0);

        state.apply(OverlayEvent::Resized {
            container_width: 400.0,
            container_height: 600.0,
        });
        assert_eq!(state.geometry().unwrap().width, 400.0);

        state.apply(OverlayEvent::PointerEnter(1));
        state.apply(OverlayEvent::Cleared);
        assert_eq!(state, OverlayState::default());
    }
}
