//! Tile annotation engine: overlay a fixed grid on a large image, paint tiles
//! with categorical labels through a zoomable, pannable view, and export each
//! labelled tile into a per-label directory.

pub mod annotation;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod grid;
pub mod palette;
pub mod preview;
pub mod session;
pub mod source;
pub mod viewport;

pub use annotation::AnnotationStore;
pub use config::Settings;
pub use error::{ConfigError, ExportError, LoadError};
pub use export::{AbortReason, DirectorySink, ExportState, Exporter, TileSink};
pub use grid::{TileGrid, TileIndex, TileRegion};
pub use palette::Palette;
pub use preview::{Frame, PreviewRenderer};
pub use session::{Notice, NoticeLevel, Session};
pub use source::SourceImage;
pub use viewport::{ImageRect, Viewport, ZoomDirection};
