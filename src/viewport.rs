//! Zoom and pan state mapping image pixels onto the canvas.
//!
//! The transform is a uniform scale plus an offset:
//!
//! ```text
//! screen = (image - offset) * scale
//! image  = screen / scale + offset
//! ```
//!
//! `offset` is the image-space point sitting under the canvas's top-left
//! corner. Screen coordinates are canvas-relative, so the UI layer subtracts
//! the canvas origin before calling in.

pub const DEFAULT_ZOOM_STEP: f64 = 1.1;
pub const DEFAULT_MIN_SPAN: f64 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Axis-aligned rectangle in image-pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ImageRect {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Whole pixels touched by the rectangle, as `[x0, y0, x1, y1)`.
    pub fn pixel_bounds(&self, image_width: u32, image_height: u32) -> [u32; 4] {
        let clamp = |v: f64, hi: u32| v.clamp(0.0, hi as f64) as u32;
        [
            clamp(self.min_x.floor(), image_width),
            clamp(self.min_y.floor(), image_height),
            clamp(self.max_x.ceil(), image_width),
            clamp(self.max_y.ceil(), image_height),
        ]
    }
}

#[derive(Clone, Debug)]
pub struct Viewport {
    image_size: (u32, u32),
    canvas_size: (f64, f64),
    scale: f64,
    offset: (f64, f64),
    zoom_step: f64,
    min_span: f64,
    revision: u64,
}

impl Viewport {
    pub fn new(image_width: u32, image_height: u32, zoom_step: f64, min_span: f64) -> Self {
        debug_assert!(zoom_step > 1.0, "zoom step must be > 1");
        Self {
            image_size: (image_width, image_height),
            canvas_size: (0.0, 0.0),
            scale: 1.0,
            offset: (0.0, 0.0),
            zoom_step,
            min_span,
            revision: 0,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    pub fn canvas_size(&self) -> (f64, f64) {
        self.canvas_size
    }

    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    /// Bumped on every change that invalidates the rendered frame.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn invalidate(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn set_canvas_size(&mut self, width: f64, height: f64) {
        if self.canvas_size != (width, height) {
            self.canvas_size = (width, height);
            self.invalidate();
        }
    }

    /// Shrinks the image into a `fit_width` x `fit_height` box anchored at the
    /// canvas origin. Images that already fit are shown at 1:1. The short side
    /// never ends up below the minimum span.
    pub fn fit_to(&mut self, fit_width: f64, fit_height: f64) {
        let (w, h) = (self.image_size.0 as f64, self.image_size.1 as f64);
        let fit = if w > fit_width || h > fit_height {
            1.0 / (w / fit_width).max(h / fit_height)
        } else {
            1.0
        };
        let floor = self.min_span / w.min(h).max(1.0);
        self.scale = fit.max(floor);
        self.offset = (0.0, 0.0);
        self.invalidate();
        log::debug!("Fit {}x{} at scale {:.4}", w, h, self.scale);
    }

    pub fn screen_to_image(&self, sx: f64, sy: f64) -> (f64, f64) {
        (
            sx / self.scale + self.offset.0,
            sy / self.scale + self.offset.1,
        )
    }

    pub fn image_to_screen(&self, ix: f64, iy: f64) -> (f64, f64) {
        (
            (ix - self.offset.0) * self.scale,
            (iy - self.offset.1) * self.scale,
        )
    }

    /// Where the full image lands on the canvas, in screen coordinates.
    pub fn image_screen_rect(&self) -> ImageRect {
        let (x0, y0) = self.image_to_screen(0.0, 0.0);
        let (x1, y1) = self.image_to_screen(self.image_size.0 as f64, self.image_size.1 as f64);
        ImageRect {
            min_x: x0,
            min_y: y0,
            max_x: x1,
            max_y: y1,
        }
    }

    /// Part of the image currently inside the canvas, in image pixels, or
    /// `None` when the two don't overlap.
    pub fn visible_image_rect(&self) -> Option<ImageRect> {
        let (cx0, cy0) = self.screen_to_image(0.0, 0.0);
        let (cx1, cy1) = self.screen_to_image(self.canvas_size.0, self.canvas_size.1);
        let rect = ImageRect {
            min_x: cx0.max(0.0),
            min_y: cy0.max(0.0),
            max_x: cx1.min(self.image_size.0 as f64),
            max_y: cy1.min(self.image_size.1 as f64),
        };
        (rect.width() > 0.0 && rect.height() > 0.0).then_some(rect)
    }

    /// Maps a canvas point to the image, dropping points that are off the
    /// canvas or off the image.
    pub fn pick(&self, sx: f64, sy: f64) -> Option<(f64, f64)> {
        let (ix, iy) = self.screen_to_image(sx, sy);
        self.visible_image_rect()
            .filter(|visible| visible.contains(ix, iy))
            .map(|_| (ix, iy))
    }

    /// Drags the image by a screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        self.offset.0 -= dx / self.scale;
        self.offset.1 -= dy / self.scale;
        self.invalidate();
        log::trace!("Pan to ({:.1}, {:.1})", self.offset.0, self.offset.1);
    }

    /// Steps the zoom keeping the image point under `(sx, sy)` fixed on
    /// screen. Returns `false` when the step is refused: the cursor is not over
    /// the image, zooming out would shrink the short image side below the
    /// minimum span, or zooming in would make one image pixel larger than the
    /// canvas.
    pub fn zoom(&mut self, sx: f64, sy: f64, direction: ZoomDirection) -> bool {
        let (ix, iy) = self.screen_to_image(sx, sy);
        let (w, h) = self.image_size;
        if !(ix > 0.0 && iy > 0.0 && ix < w as f64 && iy < h as f64) {
            return false;
        }

        let new_scale = match direction {
            ZoomDirection::Out => {
                let next = self.scale / self.zoom_step;
                if (w.min(h) as f64) * next < self.min_span {
                    log::debug!("Zoom out refused at scale {:.4}", self.scale);
                    return false;
                }
                next
            }
            ZoomDirection::In => {
                let next = self.scale * self.zoom_step;
                if next > self.canvas_size.0.min(self.canvas_size.1) {
                    log::debug!("Zoom in refused at scale {:.4}", self.scale);
                    return false;
                }
                next
            }
        };

        self.offset = (ix - sx / new_scale, iy - sy / new_scale);
        self.scale = new_scale;
        self.invalidate();
        log::debug!("Zoom {:?}: {:.4}x", direction, self.scale);
        true
    }
}
