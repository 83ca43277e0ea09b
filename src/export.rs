//! One-shot export of labelled tiles into per-label bucket directories.
//!
//! The flow is an explicit state machine:
//!
//! ```text
//! Idle ──request──▶ Confirming ──confirm(yes)──▶ Writing ──step…──▶ Done
//!   │                   └──confirm(no)──▶ Aborted(Declined)    └─error─▶ Aborted(Failed)
//!   └──request, nothing labelled──▶ Aborted(NoAnnotations)
//! ```
//!
//! Writes go through a [`TileSink`] so the transitions can be driven without a
//! filesystem.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use image::{ColorType, DynamicImage, ImageFormat};

use crate::annotation::AnnotationStore;
use crate::error::ExportError;
use crate::grid::TileIndex;
use crate::palette::Palette;

pub const DEFAULT_OUTPUT_DIR: &str = "Curated_Images";

/// Destination for exported tiles.
pub trait TileSink {
    /// File extension appended to tile names, without the dot.
    fn extension(&self) -> &str;

    /// Makes sure the directory for `bucket` exists.
    fn ensure_bucket(&mut self, bucket: &str) -> Result<(), ExportError>;

    fn write_tile(
        &mut self,
        bucket: &str,
        file_name: &str,
        tile: &DynamicImage,
    ) -> Result<(), ExportError>;
}

/// Writes tiles under `root/<bucket>/`. Nothing is created on disk until the
/// first bucket is needed.
pub struct DirectorySink {
    root: PathBuf,
    format: ImageFormat,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>, format: ImageFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TileSink for DirectorySink {
    fn extension(&self) -> &str {
        self.format.extensions_str().first().copied().unwrap_or("png")
    }

    fn ensure_bucket(&mut self, bucket: &str) -> Result<(), ExportError> {
        let dir = self.root.join(bucket);
        std::fs::create_dir_all(&dir).map_err(|source| ExportError::CreateDir { path: dir, source })
    }

    fn write_tile(
        &mut self,
        bucket: &str,
        file_name: &str,
        tile: &DynamicImage,
    ) -> Result<(), ExportError> {
        let path = self.root.join(bucket).join(file_name);
        encodable(tile, self.format)
            .save_with_format(&path, self.format)
            .map_err(|source| ExportError::WriteTile { path, source })
    }
}

/// JPEG stores neither alpha nor 16-bit samples; such tiles are reduced to
/// 8-bit RGB before encoding. Every other format gets the tile untouched.
fn encodable(tile: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    match (format, tile.color()) {
        (ImageFormat::Jpeg, ColorType::L8 | ColorType::Rgb8) => Cow::Borrowed(tile),
        (ImageFormat::Jpeg, color) => {
            log::debug!("Converting {:?} tile to Rgb8 for JPEG", color);
            Cow::Owned(DynamicImage::ImageRgb8(tile.to_rgb8()))
        }
        _ => Cow::Borrowed(tile),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// Nothing was labelled.
    NoAnnotations,
    /// The user turned down a partial export.
    Declined,
    /// A directory or file could not be written.
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    /// Only some tiles are labelled; waiting for the user to go ahead.
    Confirming { labeled: usize, total: usize },
    Writing { written: usize, total: usize },
    Done { written: usize },
    Aborted(AbortReason),
}

pub struct Exporter {
    state: ExportState,
    queue: Vec<(TileIndex, u8)>,
    cursor: usize,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    pub fn new() -> Self {
        Self {
            state: ExportState::Idle,
            queue: Vec::new(),
            cursor: 0,
        }
    }

    pub fn state(&self) -> &ExportState {
        &self.state
    }

    /// True while an export is waiting for confirmation or writing.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            ExportState::Confirming { .. } | ExportState::Writing { .. }
        )
    }

    /// Starts an export. Finished or aborted runs count as idle.
    pub fn request(&mut self, store: &AnnotationStore) -> &ExportState {
        if self.is_busy() {
            log::warn!("Export already in progress ({:?})", self.state);
            return &self.state;
        }
        let labeled = store.count();
        let total = store.total();
        self.state = if labeled == 0 {
            log::warn!("Export requested with no labeled tiles");
            ExportState::Aborted(AbortReason::NoAnnotations)
        } else if labeled < total {
            log::info!("Only {labeled} of {total} tiles labeled, asking for confirmation");
            ExportState::Confirming { labeled, total }
        } else {
            self.start_writing(store)
        };
        &self.state
    }

    /// Answers the partial-export prompt. Ignored outside `Confirming`.
    pub fn confirm(&mut self, accepted: bool, store: &AnnotationStore) -> &ExportState {
        if !matches!(self.state, ExportState::Confirming { .. }) {
            log::debug!("Ignoring confirmation in state {:?}", self.state);
            return &self.state;
        }
        self.state = if accepted {
            self.start_writing(store)
        } else {
            log::info!("Partial export declined");
            ExportState::Aborted(AbortReason::Declined)
        };
        &self.state
    }

    fn start_writing(&mut self, store: &AnnotationStore) -> ExportState {
        self.queue = store.labeled().collect();
        self.cursor = 0;
        log::info!("Exporting {} tiles", self.queue.len());
        ExportState::Writing {
            written: 0,
            total: self.queue.len(),
        }
    }

    /// Writes the next queued tile. The first failure aborts the run; tiles
    /// already written are left in place.
    pub fn step(
        &mut self,
        store: &AnnotationStore,
        sink: &mut dyn TileSink,
    ) -> Result<&ExportState, ExportError> {
        let ExportState::Writing { total, .. } = self.state else {
            return Err(ExportError::NotWriting);
        };
        if let Some(&(tile, label)) = self.queue.get(self.cursor) {
            if let Err(err) = write_one(store, sink, tile, label) {
                log::error!("Export failed after {} of {} tiles: {}", self.cursor, total, err);
                self.queue.clear();
                self.state = ExportState::Aborted(AbortReason::Failed);
                return Err(err);
            }
            self.cursor += 1;
        }

        let written = self.cursor;
        self.state = if written >= total {
            self.queue.clear();
            log::info!("Exported {written} tiles");
            ExportState::Done { written }
        } else {
            ExportState::Writing { written, total }
        };
        Ok(&self.state)
    }

    /// Drives [`Exporter::step`] to completion, reporting `(written, total)`
    /// after every tile.
    pub fn run(
        &mut self,
        store: &AnnotationStore,
        sink: &mut dyn TileSink,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<usize, ExportError> {
        loop {
            match *self.step(store, sink)? {
                ExportState::Writing { written, total } => progress(written, total),
                ExportState::Done { written } => {
                    progress(written, written);
                    return Ok(written);
                }
                _ => return Err(ExportError::NotWriting),
            }
        }
    }

    /// Returns a finished or aborted exporter to `Idle`.
    pub fn acknowledge(&mut self) {
        if !self.is_busy() {
            self.state = ExportState::Idle;
        }
    }
}

fn write_one(
    store: &AnnotationStore,
    sink: &mut dyn TileSink,
    tile: TileIndex,
    label: u8,
) -> Result<(), ExportError> {
    let Some(bucket) = Palette::bucket_name(label) else {
        return Ok(());
    };
    sink.ensure_bucket(&bucket)?;
    let region = store.grid().region(tile);
    let pixels = store.source().crop_original(region);
    let file_name = format!("{}_tile{}.{}", store.source().stem(), tile.0, sink.extension());
    sink.write_tile(&bucket, &file_name, &pixels)?;
    log::debug!("Wrote {}/{}", bucket, file_name);
    Ok(())
}
