use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Interactive tile labelling for large images.
///
/// Double-click a tile to paint it with the selected label, drag to pan and
/// scroll to zoom. Export writes every labelled tile, at source resolution,
/// into one sub-directory per label.
#[derive(Parser, Debug)]
#[command(name = "tile-curate", version)]
pub struct CliArgs {
    /// Image to annotate. A file dialog opens when omitted.
    pub image: Option<PathBuf>,

    /// JSON settings file; flags given here override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tile edge in source pixels (default 128).
    #[arg(long, value_name = "PX")]
    pub tile_size: Option<u32>,

    /// Number of labels in the palette (default 10).
    #[arg(long, value_name = "N")]
    pub colors: Option<u8>,

    /// Zoom factor per wheel step (default 1.1).
    #[arg(long, value_name = "FACTOR")]
    pub zoom_step: Option<f64>,

    /// Smallest on-screen size of the image's short side (default 30).
    #[arg(long, value_name = "PX")]
    pub min_span: Option<f64>,

    /// Root directory for exported tiles (default Curated_Images).
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Export image format by extension: png, tif, bmp, ... (default png).
    #[arg(short, long, value_name = "EXT")]
    pub format: Option<String>,

    /// Log verbosity; RUST_LOG takes precedence.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}
