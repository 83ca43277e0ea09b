//! Tunable settings, optionally loaded from a JSON file and overridden from
//! the command line.

use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::cli::CliArgs;
use crate::error::ConfigError;
use crate::export::DEFAULT_OUTPUT_DIR;
use crate::grid::DEFAULT_TILE_SIZE;
use crate::palette::DEFAULT_NUM_COLORS;
use crate::viewport::{DEFAULT_MIN_SPAN, DEFAULT_ZOOM_STEP};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tile edge in source pixels.
    pub tile_size: u32,
    /// Number of labels in the palette, not counting "unlabeled".
    pub num_colors: u8,
    /// Multiplicative factor applied per wheel notch.
    pub zoom_step: f64,
    /// Smallest on-screen size of the image's short side, in pixels.
    pub min_span: f64,
    /// Box a large image is shrunk into when first shown.
    pub fit_size: [f64; 2],
    pub output_dir: PathBuf,
    /// Extension of the export format, e.g. "png" or "tif".
    pub export_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            num_colors: DEFAULT_NUM_COLORS,
            zoom_step: DEFAULT_ZOOM_STEP,
            min_span: DEFAULT_MIN_SPAN,
            fit_size: [1024.0, 568.0],
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            export_format: "png".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the settings file if one was given, then flags.
    pub fn resolve(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut settings = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply(args);
        settings.validate()?;
        if log::log_enabled!(log::Level::Debug) {
            match serde_json::to_string(&settings) {
                Ok(json) => log::debug!("Resolved settings: {json}"),
                Err(err) => log::warn!("Could not serialize settings: {err}"),
            }
        }
        Ok(settings)
    }

    fn apply(&mut self, args: &CliArgs) {
        if let Some(v) = args.tile_size {
            self.tile_size = v;
        }
        if let Some(v) = args.colors {
            self.num_colors = v;
        }
        if let Some(v) = args.zoom_step {
            self.zoom_step = v;
        }
        if let Some(v) = args.min_span {
            self.min_span = v;
        }
        if let Some(v) = &args.output_dir {
            self.output_dir = v.clone();
        }
        if let Some(v) = &args.format {
            self.export_format = v.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::Invalid("tile_size must be at least 1".into()));
        }
        if self.num_colors == 0 {
            return Err(ConfigError::Invalid("num_colors must be between 1 and 255".into()));
        }
        if !(self.zoom_step > 1.0) {
            return Err(ConfigError::Invalid(format!(
                "zoom_step must be greater than 1, got {}",
                self.zoom_step
            )));
        }
        if !(self.min_span > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_span must be positive, got {}",
                self.min_span
            )));
        }
        if !(self.fit_size[0] > 0.0 && self.fit_size[1] > 0.0) {
            return Err(ConfigError::Invalid("fit_size must be positive".into()));
        }
        self.image_format().map(|_| ())
    }

    pub fn image_format(&self) -> Result<ImageFormat, ConfigError> {
        let format = ImageFormat::from_extension(&self.export_format).ok_or_else(|| {
            ConfigError::Invalid(format!("unknown export format {:?}", self.export_format))
        })?;
        if !format.writing_enabled() {
            return Err(ConfigError::Invalid(format!(
                "export format {:?} cannot be written",
                self.export_format
            )));
        }
        Ok(format)
    }
}
