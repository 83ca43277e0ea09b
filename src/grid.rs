//! Logical tile grid laid over the source image.
//!
//! The grid is defined in source pixels and never changes after load. Screen
//! geometry is always derived from the viewport scale on demand.

pub const DEFAULT_TILE_SIZE: u32 = 128;

/// Linear tile index, `iy * tiles_x + ix`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex(pub usize);

/// Source-resolution pixel rectangle covered by one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileGrid {
    tile_size: u32,
    tiles_x: u32,
    tiles_y: u32,
}

impl TileGrid {
    /// Partial tiles at the right and bottom edges are dropped.
    pub fn new(image_width: u32, image_height: u32, tile_size: u32) -> Self {
        assert!(tile_size > 0, "tile size must be positive");
        Self {
            tile_size,
            tiles_x: image_width / tile_size,
            tiles_y: image_height / tile_size,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    pub fn len(&self) -> usize {
        self.tiles_x as usize * self.tiles_y as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: TileIndex) -> bool {
        index.0 < self.len()
    }

    pub fn index(&self, ix: u32, iy: u32) -> Option<TileIndex> {
        (ix < self.tiles_x && iy < self.tiles_y)
            .then(|| TileIndex(iy as usize * self.tiles_x as usize + ix as usize))
    }

    pub fn coords(&self, index: TileIndex) -> (u32, u32) {
        debug_assert!(self.contains(index), "tile {index:?} outside grid");
        let tiles_x = self.tiles_x.max(1) as usize;
        ((index.0 % tiles_x) as u32, (index.0 / tiles_x) as u32)
    }

    /// Tile under an image-space point, or `None` when the point falls outside
    /// the grid (including the uncovered strip past the last full tile).
    pub fn hit_test(&self, image_x: f64, image_y: f64) -> Option<TileIndex> {
        if !(image_x >= 0.0 && image_y >= 0.0) {
            return None;
        }
        let size = self.tile_size as f64;
        let ix = (image_x / size).floor();
        let iy = (image_y / size).floor();
        if ix >= self.tiles_x as f64 || iy >= self.tiles_y as f64 {
            return None;
        }
        self.index(ix as u32, iy as u32)
    }

    pub fn region(&self, index: TileIndex) -> TileRegion {
        let (ix, iy) = self.coords(index);
        TileRegion {
            x: ix * self.tile_size,
            y: iy * self.tile_size,
            width: self.tile_size,
            height: self.tile_size,
        }
    }

    /// Edge length of one tile on screen at `scale`.
    pub fn screen_footprint(&self, scale: f64) -> f64 {
        self.tile_size as f64 * scale
    }

    /// Row-major walk over every tile.
    pub fn iter(&self) -> impl Iterator<Item = TileIndex> {
        (0..self.len()).map(TileIndex)
    }
}
