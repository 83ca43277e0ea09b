//! Builds the pixels that actually reach the screen.
//!
//! The renderer keeps no copy of the annotated image. Each frame crops the
//! visible rectangle straight out of the store, swaps the hovered tile's
//! overlap back to source pixels, and scales the result. Frames are cached
//! against revision counters, so unrelated events cost nothing.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::annotation::AnnotationStore;
use crate::grid::{TileIndex, TileRegion};
use crate::viewport::Viewport;

/// A rendered view of the visible part of the image.
pub struct Frame {
    pub image: RgbaImage,
    /// Canvas position of the frame's top-left pixel.
    pub origin: (f64, f64),
    /// Exact on-screen extent; `image` is this rounded to whole pixels.
    pub size: (f64, f64),
    /// Increments each time a frame is actually recomputed.
    pub generation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FrameKey {
    viewport: u64,
    annotations: u64,
    hover: Option<TileIndex>,
}

#[derive(Default)]
pub struct PreviewRenderer {
    hover: Option<TileIndex>,
    // Tile that keeps its tint while hovered, until the pointer moves on.
    tint_held: Option<TileIndex>,
    frame: Option<Frame>,
    frame_key: Option<FrameKey>,
    generation: u64,
}

impl PreviewRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> Option<TileIndex> {
        self.hover
    }

    /// Records the tile under the pointer. Returns `false` when the pointer
    /// is still over the same tile.
    pub fn hover(&mut self, tile: Option<TileIndex>) -> bool {
        if self.hover == tile {
            return false;
        }
        self.hover = tile;
        self.tint_held = None;
        log::trace!("Hover {:?}", tile);
        true
    }

    pub fn leave(&mut self) -> bool {
        self.hover(None)
    }

    /// Treats `tile` as hovered but shows its label tint until the pointer
    /// reaches a different tile.
    pub fn hold_tint(&mut self, tile: TileIndex) {
        self.hover = Some(tile);
        self.tint_held = Some(tile);
    }

    /// The tile drawn with source pixels, if any. Hover only un-tints once at
    /// least one tile is labelled.
    fn effective_hover(&self, store: &AnnotationStore) -> Option<TileIndex> {
        self.hover
            .filter(|&tile| Some(tile) != self.tint_held)
            .filter(|_| store.has_annotations())
    }

    /// Crops the annotated image to the visible rectangle and scales it to
    /// the current zoom. Returns the cached frame when nothing relevant has
    /// changed since the last call, and `None` when no part of the image is
    /// on the canvas.
    pub fn render(&mut self, viewport: &Viewport, store: &AnnotationStore) -> Option<&Frame> {
        let key = FrameKey {
            viewport: viewport.revision(),
            annotations: store.revision(),
            hover: self.effective_hover(store),
        };
        if self.frame_key == Some(key) {
            return self.frame.as_ref();
        }
        self.frame_key = Some(key);
        self.frame = None;

        let visible = viewport.visible_image_rect()?;
        let (width, height) = viewport.image_size();
        let [x0, y0, x1, y1] = visible.pixel_bounds(width, height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let mut crop = imageops::crop_imm(store.annotated(), x0, y0, x1 - x0, y1 - y0).to_image();
        if let Some(tile) = key.hover {
            untint_overlap(&mut crop, store, store.grid().region(tile), (x0, y0));
        }

        let scale = viewport.scale();
        let size = ((x1 - x0) as f64 * scale, (y1 - y0) as f64 * scale);
        let out_w = size.0.round().max(1.0) as u32;
        let out_h = size.1.round().max(1.0) as u32;
        let filter = if scale >= 1.0 {
            FilterType::Nearest
        } else {
            FilterType::Triangle
        };
        let image = if (out_w, out_h) == crop.dimensions() {
            crop
        } else {
            imageops::resize(&crop, out_w, out_h, filter)
        };

        self.generation += 1;
        log::trace!(
            "Frame {}: crop [{}, {}, {}, {}] -> {}x{}",
            self.generation,
            x0,
            y0,
            x1,
            y1,
            out_w,
            out_h
        );
        self.frame = Some(Frame {
            image,
            origin: viewport.image_to_screen(x0 as f64, y0 as f64),
            size,
            generation: self.generation,
        });
        self.frame.as_ref()
    }
}

/// Copies source pixels into `crop` wherever `region` overlaps it. `crop`
/// starts at `origin` in image coordinates.
fn untint_overlap(
    crop: &mut RgbaImage,
    store: &AnnotationStore,
    region: TileRegion,
    origin: (u32, u32),
) {
    let (ox, oy) = origin;
    let x_start = region.x.max(ox);
    let y_start = region.y.max(oy);
    let x_end = (region.x + region.width).min(ox + crop.width());
    let y_end = (region.y + region.height).min(oy + crop.height());
    let source = store.source().rgba();
    for y in y_start..y_end {
        for x in x_start..x_end {
            crop.put_pixel(x - ox, y - oy, *source.get_pixel(x, y));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use image::{DynamicImage, Rgba};

    use super::*;
    use crate::grid::TileGrid;
    use crate::palette::Palette;
    use crate::source::SourceImage;
    use crate::viewport::{ZoomDirection, DEFAULT_MIN_SPAN, DEFAULT_ZOOM_STEP};

    fn setup() -> (Viewport, AnnotationStore) {
        let img = RgbaImage::from_fn(256, 256, |x, y| Rgba([x as u8, y as u8, 180, 255]));
        let source = Rc::new(SourceImage::from_image("t", DynamicImage::ImageRgba8(img)));
        let store = AnnotationStore::new(source, TileGrid::new(256, 256, 128), Palette::default());
        let mut viewport = Viewport::new(256, 256, DEFAULT_ZOOM_STEP, DEFAULT_MIN_SPAN);
        viewport.set_canvas_size(400.0, 300.0);
        (viewport, store)
    }

    #[test]
    fn hover_is_debounced_per_tile() {
        let mut renderer = PreviewRenderer::new();
        assert!(renderer.hover(Some(TileIndex(1))));
        assert!(!renderer.hover(Some(TileIndex(1))));
        assert!(renderer.leave());
        assert!(!renderer.leave());
    }

    #[test]
    fn hovered_tile_shows_source_pixels() {
        let (viewport, mut store) = setup();
        store.select_color(3);
        store.label_tile(TileIndex(0));
        store.label_tile(TileIndex(1));

        let mut renderer = PreviewRenderer::new();
        renderer.hover(Some(TileIndex(1)));
        let shown = renderer.render(&viewport, &store).unwrap().image.clone();
        assert_eq!(shown.get_pixel(200, 10), store.source().rgba().get_pixel(200, 10));
        assert_eq!(shown.get_pixel(10, 10), store.annotated().get_pixel(10, 10));

        // Moving to the other tile restores the first one.
        renderer.hover(Some(TileIndex(0)));
        let shown = renderer.render(&viewport, &store).unwrap().image.clone();
        assert_eq!(shown.get_pixel(200, 10), store.annotated().get_pixel(200, 10));
        assert_eq!(shown.get_pixel(10, 10), store.source().rgba().get_pixel(10, 10));
    }

    #[test]
    fn hover_untints_only_the_visible_part_of_a_tile() {
        let (mut viewport, mut store) = setup();
        store.select_color(1);
        store.label_tile(TileIndex(0));
        store.label_tile(TileIndex(1));
        viewport.pan(-100.0, 0.0);

        let mut renderer = PreviewRenderer::new();
        renderer.hover(Some(TileIndex(0)));
        let frame = renderer.render(&viewport, &store).unwrap();
        // Frame column 0 is image column 100, inside tile 0.
        assert_eq!(frame.image.get_pixel(0, 5), store.source().rgba().get_pixel(100, 5));
        // Frame column 28 is image column 128, the start of tile 1.
        assert_eq!(frame.image.get_pixel(28, 5), store.annotated().get_pixel(128, 5));
    }

    #[test]
    fn held_tint_survives_until_pointer_moves_on() {
        let (viewport, mut store) = setup();
        store.select_color(2);
        store.label_tile(TileIndex(0));

        let mut renderer = PreviewRenderer::new();
        renderer.hover(Some(TileIndex(0)));
        renderer.hold_tint(TileIndex(0));
        assert!(!renderer.hover(Some(TileIndex(0))));
        let shown = *renderer.render(&viewport, &store).unwrap().image.get_pixel(5, 5);
        assert_eq!(&shown, store.annotated().get_pixel(5, 5));

        renderer.hover(Some(TileIndex(1)));
        renderer.hover(Some(TileIndex(0)));
        let shown = *renderer.render(&viewport, &store).unwrap().image.get_pixel(5, 5);
        assert_eq!(&shown, store.source().rgba().get_pixel(5, 5));
    }

    #[test]
    fn hover_then_leave_is_non_destructive() {
        let (viewport, mut store) = setup();
        store.select_color(2);
        store.label_tile(TileIndex(3));
        let annotated = store.annotated().clone();

        let mut renderer = PreviewRenderer::new();
        let before = renderer.render(&viewport, &store).unwrap().image.clone();
        renderer.hover(Some(TileIndex(3)));
        let hovered = renderer.render(&viewport, &store).unwrap().image.clone();
        assert_ne!(hovered, before);
        renderer.leave();
        let after = renderer.render(&viewport, &store).unwrap().image.clone();

        assert_eq!(after, before);
        assert_eq!(store.annotated(), &annotated);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn hover_without_annotations_changes_nothing() {
        let (viewport, store) = setup();
        let mut renderer = PreviewRenderer::new();
        let generation = renderer.render(&viewport, &store).unwrap().generation;
        renderer.hover(Some(TileIndex(2)));
        let frame = renderer.render(&viewport, &store).unwrap();
        assert_eq!(frame.generation, generation);
        assert_eq!(&frame.image, store.source().rgba());
    }

    #[test]
    fn render_is_cached_until_something_changes() {
        let (mut viewport, mut store) = setup();
        let mut renderer = PreviewRenderer::new();
        let first = renderer.render(&viewport, &store).unwrap().generation;
        let again = renderer.render(&viewport, &store).unwrap().generation;
        assert_eq!(first, again);

        store.select_color(1);
        store.label_tile(TileIndex(0));
        let after_label = renderer.render(&viewport, &store).unwrap().generation;
        assert!(after_label > again);

        viewport.zoom(50.0, 50.0, ZoomDirection::In);
        let after_zoom = renderer.render(&viewport, &store).unwrap().generation;
        assert!(after_zoom > after_label);
    }

    #[test]
    fn frame_covers_visible_crop_at_scale() {
        let (mut viewport, store) = setup();
        viewport.pan(-100.0, -28.0);
        let mut renderer = PreviewRenderer::new();
        let frame = renderer.render(&viewport, &store).unwrap();
        assert_eq!(frame.image.dimensions(), (156, 228));
        assert_eq!(frame.origin, (0.0, 0.0));
        assert_eq!(frame.image.get_pixel(0, 0), store.source().rgba().get_pixel(100, 28));
    }

    #[test]
    fn frame_scales_with_zoom() {
        let (mut viewport, store) = setup();
        viewport.fit_to(64.0, 64.0);
        let mut renderer = PreviewRenderer::new();
        let frame = renderer.render(&viewport, &store).unwrap();
        assert_eq!(frame.image.dimensions(), (64, 64));
        assert_eq!(frame.size, (64.0, 64.0));
    }

    #[test]
    fn nothing_rendered_when_image_is_off_canvas() {
        let (mut viewport, store) = setup();
        viewport.pan(1000.0, 0.0);
        let mut renderer = PreviewRenderer::new();
        assert!(renderer.render(&viewport, &store).is_none());
    }
}
