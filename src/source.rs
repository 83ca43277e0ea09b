use std::path::Path;

use image::{DynamicImage, RgbaImage};

use crate::error::LoadError;
use crate::grid::TileRegion;

/// The image being annotated. Loaded once and never mutated.
///
/// `original` keeps the decoded pixels exactly as they came off disk and is
/// what gets exported; `rgba` is the 8-bit RGBA view used for tinting and
/// display.
pub struct SourceImage {
    stem: String,
    original: DynamicImage,
    rgba: RgbaImage,
}

impl SourceImage {
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let original = image::open(path).map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let stem = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        log::info!(
            "Loaded {} ({}x{}, {:?})",
            path.display(),
            original.width(),
            original.height(),
            original.color()
        );
        Ok(Self::from_image(stem, original))
    }

    pub fn from_image(stem: impl Into<String>, original: DynamicImage) -> Self {
        let rgba = original.to_rgba8();
        Self {
            stem: stem.into(),
            original,
            rgba,
        }
    }

    /// File stem used to name exported tiles.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn width(&self) -> u32 {
        self.original.width()
    }

    pub fn height(&self) -> u32 {
        self.original.height()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.rgba
    }

    /// Crops `region` out of the undecorated original at full resolution.
    pub fn crop_original(&self, region: TileRegion) -> DynamicImage {
        self.original
            .crop_imm(region.x, region.y, region.width, region.height)
    }
}
