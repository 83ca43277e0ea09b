use std::rc::Rc;

use image::RgbaImage;

use crate::grid::{TileGrid, TileIndex, TileRegion};
use crate::palette::{tint, Palette, UNLABELED};
use crate::source::SourceImage;

/// Per-tile labels plus the tinted image they produce.
///
/// The annotated image is only ever touched one tile at a time, except by
/// [`AnnotationStore::clear`] which resets it to the source wholesale.
pub struct AnnotationStore {
    source: Rc<SourceImage>,
    grid: TileGrid,
    palette: Palette,
    labels: Vec<u8>,
    current_color: u8,
    annotated: RgbaImage,
    labeled_count: usize,
    revision: u64,
}

impl AnnotationStore {
    pub fn new(source: Rc<SourceImage>, grid: TileGrid, palette: Palette) -> Self {
        let annotated = source.rgba().clone();
        let labels = vec![UNLABELED; grid.len()];
        Self {
            source,
            grid,
            palette,
            labels,
            current_color: UNLABELED,
            annotated,
            labeled_count: 0,
            revision: 0,
        }
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn annotated(&self) -> &RgbaImage {
        &self.annotated
    }

    /// Bumped whenever the annotated image changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn current_color(&self) -> u8 {
        self.current_color
    }

    /// Picks the label applied by the next click. Out-of-range values are
    /// ignored and reported as `false`.
    pub fn select_color(&mut self, color: u8) -> bool {
        if !self.palette.contains(color) {
            log::warn!(
                "Ignoring palette index {} (palette has {} colors)",
                color,
                self.palette.num_colors()
            );
            return false;
        }
        self.current_color = color;
        log::debug!("Selected color {}", color);
        true
    }

    pub fn label(&self, index: TileIndex) -> u8 {
        self.labels.get(index.0).copied().unwrap_or(UNLABELED)
    }

    /// Labelled tiles in row-major order.
    pub fn labeled(&self) -> impl Iterator<Item = (TileIndex, u8)> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label != UNLABELED)
            .map(|(i, &label)| (TileIndex(i), label))
    }

    /// Assigns the current colour to `index` and re-tints that tile. Returns
    /// whether anything changed.
    pub fn label_tile(&mut self, index: TileIndex) -> bool {
        debug_assert!(
            self.grid.contains(index),
            "tile {index:?} outside {}-tile grid",
            self.grid.len()
        );
        let color = self.current_color;
        let Some(slot) = self.labels.get_mut(index.0) else {
            log::error!("Refusing to label out-of-range tile {:?}", index);
            return false;
        };
        let previous = *slot;
        if previous == color {
            return false;
        }
        *slot = color;
        match (previous, color) {
            (UNLABELED, _) => self.labeled_count += 1,
            (_, UNLABELED) => self.labeled_count -= 1,
            _ => {}
        }
        let region = self.grid.region(index);
        self.paint_region(region, color);
        self.revision = self.revision.wrapping_add(1);
        log::debug!("Tile {} labeled {}", index.0, color);
        true
    }

    /// Drops every label and restores the annotated image to the source.
    pub fn clear(&mut self) {
        self.labels.fill(UNLABELED);
        self.labeled_count = 0;
        self.annotated.clone_from(self.source.rgba());
        self.revision = self.revision.wrapping_add(1);
        log::info!("Cleared all {} tiles", self.total());
    }

    /// Number of tiles carrying a label.
    pub fn count(&self) -> usize {
        self.labeled_count
    }

    pub fn total(&self) -> usize {
        self.labels.len()
    }

    pub fn has_annotations(&self) -> bool {
        self.labeled_count > 0
    }

    fn paint_region(&mut self, region: TileRegion, color: u8) {
        let tint_color = self.palette.color(color);
        let source = self.source.rgba();
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                let original = *source.get_pixel(x, y);
                let pixel = match tint_color {
                    Some(rgb) => tint(original, rgb),
                    None => original,
                };
                self.annotated.put_pixel(x, y, pixel);
            }
        }
    }
}
