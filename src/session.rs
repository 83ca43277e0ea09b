//! Event-level entry point for the UI.
//!
//! A [`Session`] owns one loaded image and everything derived from it. The UI
//! forwards raw pointer, wheel and button events here (in canvas-relative
//! coordinates) and draws whatever [`Session::render`] hands back.

use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

use image::ImageFormat;

use crate::annotation::AnnotationStore;
use crate::config::Settings;
use crate::error::{ExportError, LoadError};
use crate::export::{AbortReason, DirectorySink, ExportState, Exporter, TileSink};
use crate::grid::{TileGrid, TileIndex};
use crate::palette::Palette;
use crate::preview::{Frame, PreviewRenderer};
use crate::source::SourceImage;
use crate::viewport::{ImageRect, Viewport, ZoomDirection};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the user, drained by the UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

pub struct Session {
    settings: Settings,
    viewport: Viewport,
    store: AnnotationStore,
    renderer: PreviewRenderer,
    exporter: Exporter,
    notices: VecDeque<Notice>,
}

impl Session {
    pub fn open(path: &Path, settings: Settings) -> Result<Self, LoadError> {
        let source = SourceImage::open(path)?;
        Ok(Self::new(source, settings))
    }

    pub fn new(source: SourceImage, settings: Settings) -> Self {
        let (width, height) = (source.width(), source.height());
        let grid = TileGrid::new(width, height, settings.tile_size);
        if grid.is_empty() {
            log::warn!(
                "{}x{} image is smaller than one {}px tile",
                width,
                height,
                settings.tile_size
            );
        }
        let store = AnnotationStore::new(
            Rc::new(source),
            grid,
            Palette::gradient(settings.num_colors),
        );
        let mut viewport = Viewport::new(width, height, settings.zoom_step, settings.min_span);
        viewport.fit_to(settings.fit_size[0], settings.fit_size[1]);
        Self {
            settings,
            viewport,
            store,
            renderer: PreviewRenderer::new(),
            exporter: Exporter::new(),
            notices: VecDeque::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn grid(&self) -> &TileGrid {
        self.store.grid()
    }

    pub fn export_state(&self) -> &ExportState {
        self.exporter.state()
    }

    pub fn hovered(&self) -> Option<TileIndex> {
        self.renderer.hovered()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push_back(Notice::new(level, message));
    }

    // ── Viewport events ────────────────────────────────────────────────────

    pub fn resize_canvas(&mut self, width: f64, height: f64) {
        self.viewport.set_canvas_size(width, height);
    }

    pub fn fit(&mut self) {
        let [w, h] = self.settings.fit_size;
        self.viewport.fit_to(w, h);
    }

    pub fn drag(&mut self, dx: f64, dy: f64) {
        self.viewport.pan(dx, dy);
    }

    pub fn wheel(&mut self, sx: f64, sy: f64, direction: ZoomDirection) -> bool {
        self.viewport.zoom(sx, sy, direction)
    }

    /// Tile under a canvas point, if the point is on a visible part of the
    /// grid.
    pub fn tile_at(&self, sx: f64, sy: f64) -> Option<TileIndex> {
        let (ix, iy) = self.viewport.pick(sx, sy)?;
        self.store.grid().hit_test(ix, iy)
    }

    /// Screen rectangle covered by `tile` at the current zoom.
    pub fn tile_screen_rect(&self, tile: TileIndex) -> ImageRect {
        let region = self.store.grid().region(tile);
        let (x0, y0) = self.viewport.image_to_screen(region.x as f64, region.y as f64);
        let footprint = self.store.grid().screen_footprint(self.viewport.scale());
        ImageRect {
            min_x: x0,
            min_y: y0,
            max_x: x0 + footprint,
            max_y: y0 + footprint,
        }
    }

    // ── Pointer events ─────────────────────────────────────────────────────

    /// Returns whether the hovered tile changed.
    pub fn pointer_moved(&mut self, sx: f64, sy: f64) -> bool {
        let tile = self.tile_at(sx, sy);
        self.renderer.hover(tile)
    }

    pub fn pointer_left(&mut self) -> bool {
        self.renderer.leave()
    }

    /// Paints the tile under the pointer with the current label. Clicks off
    /// the grid, or while an export is running, do nothing. The clicked tile
    /// shows its new tint until the pointer moves to another tile.
    pub fn click(&mut self, sx: f64, sy: f64) -> Option<TileIndex> {
        if self.exporter.is_busy() {
            return None;
        }
        let tile = self.tile_at(sx, sy)?;
        self.store.label_tile(tile);
        self.renderer.hold_tint(tile);
        Some(tile)
    }

    pub fn select_color(&mut self, color: u8) -> bool {
        self.store.select_color(color)
    }

    pub fn clear(&mut self) {
        if self.exporter.is_busy() {
            log::warn!("Ignoring clear during export");
            return;
        }
        self.store.clear();
    }

    pub fn render(&mut self) -> Option<&Frame> {
        self.renderer.render(&self.viewport, &self.store)
    }

    // ── Export ─────────────────────────────────────────────────────────────

    /// Sink writing into the configured output directory and format.
    pub fn directory_sink(&self) -> DirectorySink {
        let format = self.settings.image_format().unwrap_or(ImageFormat::Png);
        DirectorySink::new(self.settings.output_dir.clone(), format)
    }

    pub fn request_export(&mut self) -> ExportState {
        let state = self.exporter.request(&self.store).clone();
        if state == ExportState::Aborted(AbortReason::NoAnnotations) {
            self.notify(NoticeLevel::Warning, "No colored tiles to save.");
            self.exporter.acknowledge();
        }
        state
    }

    pub fn confirm_export(&mut self, accepted: bool) -> ExportState {
        let state = self.exporter.confirm(accepted, &self.store).clone();
        if state == ExportState::Aborted(AbortReason::Declined) {
            self.exporter.acknowledge();
        }
        state
    }

    /// Writes one tile. On completion or failure a notice is queued and the
    /// exporter returns to idle.
    pub fn export_step(&mut self, sink: &mut dyn TileSink) -> Result<ExportState, ExportError> {
        match self.exporter.step(&self.store, sink) {
            Ok(state) => {
                let state = state.clone();
                if let ExportState::Done { written } = state {
                    self.notify(
                        NoticeLevel::Info,
                        format!("Tiles successfully generated ({written} written)."),
                    );
                    self.exporter.acknowledge();
                }
                Ok(state)
            }
            Err(err) => {
                if !matches!(err, ExportError::NotWriting) {
                    self.notify(NoticeLevel::Error, format!("Export failed: {err}"));
                    self.exporter.acknowledge();
                }
                Err(err)
            }
        }
    }

    /// Runs every remaining step, reporting `(written, total)` as it goes.
    pub fn export_all(
        &mut self,
        sink: &mut dyn TileSink,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<usize, ExportError> {
        loop {
            match self.export_step(sink)? {
                ExportState::Writing { written, total } => progress(written, total),
                ExportState::Done { written } => {
                    progress(written, written);
                    return Ok(written);
                }
                _ => return Err(ExportError::NotWriting),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, Rgba, RgbaImage};
    use proptest::prelude::*;

    use super::*;

    fn session(w: u32, h: u32) -> Session {
        let img = RgbaImage::from_fn(w, h, |x, y| Rgba([(x % 251) as u8, (y % 241) as u8, 90, 255]));
        let source = SourceImage::from_image("scan", DynamicImage::ImageRgba8(img));
        let mut session = Session::new(source, Settings::default());
        session.resize_canvas(512.0, 512.0);
        session
    }

    #[test]
    fn click_labels_tile_under_pointer() {
        let mut s = session(256, 256);
        s.select_color(2);
        assert_eq!(s.click(200.0, 20.0), Some(TileIndex(1)));
        assert_eq!(s.store().label(TileIndex(1)), 2);
    }

    #[test]
    fn clicks_off_the_grid_are_ignored() {
        let mut s = session(300, 256);
        s.select_color(1);
        // Right of the image.
        assert_eq!(s.click(400.0, 20.0), None);
        // On the image but in the strip past the last full tile.
        assert_eq!(s.click(280.0, 20.0), None);
        assert_eq!(s.store().count(), 0);
    }

    #[test]
    fn clicks_follow_zoom_and_pan() {
        let mut s = session(512, 512);
        s.select_color(1);
        assert!(s.wheel(130.0, 130.0, ZoomDirection::In));
        s.drag(-40.0, -40.0);
        let target = s.tile_screen_rect(TileIndex(5));
        let cx = (target.min_x + target.max_x) / 2.0;
        let cy = (target.min_y + target.max_y) / 2.0;
        assert_eq!(s.click(cx, cy), Some(TileIndex(5)));
    }

    #[test]
    fn hover_tracks_pointer() {
        let mut s = session(256, 256);
        assert!(s.pointer_moved(10.0, 10.0));
        assert!(!s.pointer_moved(20.0, 30.0));
        assert_eq!(s.hovered(), Some(TileIndex(0)));
        assert!(s.pointer_moved(10.0, 200.0));
        assert_eq!(s.hovered(), Some(TileIndex(2)));
        assert!(s.pointer_left());
        assert_eq!(s.hovered(), None);
    }

    #[test]
    fn clear_after_labels() {
        let mut s = session(256, 256);
        s.select_color(4);
        s.click(10.0, 10.0);
        s.click(200.0, 200.0);
        s.clear();
        assert_eq!(s.store().count(), 0);
        assert_eq!(s.store().annotated(), s.store().source().rgba());
    }

    #[test]
    fn empty_export_leaves_a_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(256, 256);
        let mut sink = DirectorySink::new(dir.path().join("out"), ImageFormat::Png);
        assert_eq!(
            s.request_export(),
            ExportState::Aborted(AbortReason::NoAnnotations)
        );
        assert!(s.export_step(&mut sink).is_err());
        assert_eq!(s.export_state(), &ExportState::Idle);
        let notice = s.take_notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(s.take_notice().is_none());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn interaction_is_blocked_while_confirming() {
        let mut s = session(256, 256);
        s.select_color(1);
        s.click(10.0, 10.0);
        assert!(matches!(s.request_export(), ExportState::Confirming { .. }));
        assert_eq!(s.click(200.0, 200.0), None);
        s.clear();
        assert_eq!(s.store().count(), 1);
        assert_eq!(s.confirm_export(false), ExportState::Aborted(AbortReason::Declined));
        assert_eq!(s.export_state(), &ExportState::Idle);
        assert_eq!(s.click(200.0, 200.0), Some(TileIndex(3)));
    }

    #[test]
    fn export_scenario_writes_two_source_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Curated_Images");
        let mut s = session(256, 256);
        s.select_color(1);
        s.click(10.0, 10.0);
        s.select_color(2);
        s.click(200.0, 200.0);

        assert!(matches!(
            s.request_export(),
            ExportState::Confirming {
                labeled: 2,
                total: 4
            }
        ));
        s.confirm_export(true);
        let mut sink = DirectorySink::new(&root, ImageFormat::Png);
        let mut seen = Vec::new();
        let written = s.export_all(&mut sink, |done, total| seen.push((done, total))).unwrap();
        assert_eq!(written, 2);
        assert_eq!(seen.last(), Some(&(2, 2)));
        assert_eq!(s.export_state(), &ExportState::Idle);
        assert_eq!(s.take_notice().unwrap().level, NoticeLevel::Info);

        let tile0 = image::open(root.join("0").join("scan_tile0.png")).unwrap().to_rgba8();
        let tile3 = image::open(root.join("1").join("scan_tile3.png")).unwrap().to_rgba8();
        let source = s.store().source().rgba();
        assert_eq!(tile0.dimensions(), (128, 128));
        assert_eq!(tile3.dimensions(), (128, 128));
        for (x, y, px) in tile0.enumerate_pixels() {
            assert_eq!(px, source.get_pixel(x, y));
        }
        for (x, y, px) in tile3.enumerate_pixels() {
            assert_eq!(px, source.get_pixel(x + 128, y + 128));
        }
        let count = |bucket: &str| std::fs::read_dir(root.join(bucket)).unwrap().count();
        assert_eq!((count("0"), count("1")), (1, 1));
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 2);
    }

    #[test]
    fn failed_export_surfaces_error_notice() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the output root should be.
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, b"").unwrap();
        let mut s = session(256, 256);
        s.select_color(1);
        for (x, y) in [(10.0, 10.0), (200.0, 10.0), (10.0, 200.0), (200.0, 200.0)] {
            s.click(x, y);
        }
        assert!(matches!(s.request_export(), ExportState::Writing { .. }));
        let mut sink = DirectorySink::new(&blocker, ImageFormat::Png);
        let err = s.export_all(&mut sink, |_, _| {}).unwrap_err();
        assert!(matches!(err, ExportError::CreateDir { .. }));
        assert_eq!(s.take_notice().unwrap().level, NoticeLevel::Error);
        assert_eq!(s.export_state(), &ExportState::Idle);
    }

    #[test]
    fn render_reflects_labels() {
        let mut s = session(256, 256);
        let first = s.render().unwrap().generation;
        s.select_color(1);
        s.click(10.0, 10.0);
        let frame = s.render().unwrap();
        let (generation, shown) = (frame.generation, *frame.image.get_pixel(5, 5));
        assert!(generation > first);
        assert_ne!(&shown, s.store().source().rgba().get_pixel(5, 5));
    }

    #[test]
    fn clicked_tile_shows_its_tint_under_the_pointer() {
        let mut s = session(256, 256);
        s.pointer_moved(10.0, 10.0);
        s.select_color(1);
        s.click(10.0, 10.0);
        s.pointer_moved(12.0, 14.0);
        let shown = *s.render().unwrap().image.get_pixel(5, 5);
        assert_eq!(&shown, s.store().annotated().get_pixel(5, 5));
        assert_ne!(&shown, s.store().source().rgba().get_pixel(5, 5));

        // Leaving the tile and coming back shows the source again.
        s.pointer_moved(200.0, 10.0);
        s.pointer_moved(10.0, 10.0);
        let shown = *s.render().unwrap().image.get_pixel(5, 5);
        assert_eq!(&shown, s.store().source().rgba().get_pixel(5, 5));
    }

    #[test]
    fn relabel_under_pointer_shows_new_tint() {
        let mut s = session(256, 256);
        s.select_color(1);
        s.click(10.0, 10.0);
        s.pointer_moved(200.0, 10.0);
        s.pointer_moved(10.0, 10.0);
        s.select_color(5);
        s.click(10.0, 10.0);
        let shown = *s.render().unwrap().image.get_pixel(5, 5);
        assert_eq!(&shown, s.store().annotated().get_pixel(5, 5));
    }

    proptest! {
        #[test]
        fn grid_survives_zoom_and_pan(
            steps in prop::collection::vec(
                (any::<bool>(), 0.0f64..512.0, 0.0f64..512.0, -80.0f64..80.0, -80.0f64..80.0),
                0..60,
            ),
        ) {
            let mut s = session(1000, 700);
            let before = s.grid().clone();
            let regions: Vec<_> = before.iter().map(|tile| before.region(tile)).collect();
            for (zoom_in, sx, sy, dx, dy) in steps {
                let dir = if zoom_in { ZoomDirection::In } else { ZoomDirection::Out };
                s.wheel(sx, sy, dir);
                s.drag(dx, dy);
            }
            prop_assert_eq!(s.grid(), &before);
            let after: Vec<_> = s.grid().iter().map(|tile| s.grid().region(tile)).collect();
            prop_assert_eq!(after, regions);
        }
    }
}
