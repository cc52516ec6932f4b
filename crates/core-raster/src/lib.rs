//! Raster I/O adapter layer.
//!
//! This crate is the boundary between the pipeline core (see `core-pipeline`,
//! `core-strip`, `core-stencil`) and the raster I/O library, which the
//! governing specification treats as an external collaborator: something the
//! core calls through a narrow row-level interface and otherwise has no
//! opinion about. `RasterReader` / `RasterWriter` are that interface;
//! `GeoTiffReader` / `GeoTiffWriter` are one concrete implementation of it
//! backed by the `tiff` crate, and `MemoryRaster` is an in-process test
//! double used by the pipeline's own test suite so it doesn't have to round
//! trip through a file for every case.

mod geotiff;
mod memory;

use std::fmt;

pub use geotiff::{GeoTiffReader, GeoTiffWriter};
pub use memory::{MemoryRaster, MemoryRasterBuilder, SharedMemoryRaster};

/// One raster row of one band: `width` single-precision samples.
///
/// Rows are value-owned by whatever currently holds them (a strip buffer
/// entry, a local in a reader/filter/writer task); there is no shared
/// ownership or borrowing across task boundaries.
#[derive(Clone, Debug, PartialEq)]
pub struct Row(Vec<f32>);

impl Row {
    /// A row of `width` zeroed samples, used both as the reader's scratch
    /// allocation and as the stand-in for a row that failed to read (spec
    /// §7: row-read failures still produce a row so `size(R_b)` keeps
    /// pace with `H`).
    pub fn zeroed(width: usize) -> Self {
        Self(vec![0.0; width])
    }

    pub fn from_vec(samples: Vec<f32>) -> Self {
        Self(samples)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

impl std::ops::Index<usize> for Row {
    type Output = f32;
    fn index(&self, idx: usize) -> &f32 {
        &self.0[idx]
    }
}

impl std::ops::IndexMut<usize> for Row {
    fn index_mut(&mut self, idx: usize) -> &mut f32 {
        &mut self.0[idx]
    }
}

/// Band index, 1-based to match the spec's `b ∈ {1,2,3}` and the raster
/// convention most GIS tooling uses.
pub type Band = u8;

/// Error kinds the raster I/O boundary can surface. Fatal kinds (`InputOpen`,
/// `OutputCreate`) abort the process before any pipeline task is spawned;
/// the per-row/per-band kinds are logged and swallowed by their task so the
/// pipeline keeps making progress (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("failed to open input raster at {path}: {source}")]
    InputOpen {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to create output raster at {path}: {source}")]
    OutputCreate {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to get band {band}")]
    BandFetch { band: Band },
    #[error("failed to read band {band} row {row}: {source}")]
    RowRead {
        band: Band,
        row: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to write band {band} row {row}: {source}")]
    RowWrite {
        band: Band,
        row: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl RasterError {
    /// Whether this error should abort the process before any task is
    /// spawned, per spec §7 ("fatal" vs "logged and swallowed").
    pub fn is_fatal(&self) -> bool {
        matches!(self, RasterError::InputOpen { .. } | RasterError::OutputCreate { .. })
    }
}

/// Dimensions of an opened or created raster: width × height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Read-side of the raster I/O collaborator: band-indexed, row-addressable.
///
/// Implementations are not expected to be internally thread-safe; the
/// pipeline orchestrator serializes all calls through a single mutex per
/// spec §5 ("I/O mutex"), which is why every method here takes `&mut self`.
pub trait RasterReader: Send {
    fn dimensions(&self) -> Dimensions;
    fn band_count(&self) -> usize;

    /// Reads band `band` (1-based), row `y`, into `out`. `out.len()` must
    /// equal `dimensions().width`. On failure the row is left as-is (the
    /// caller already zeroed it) and the error is returned for the caller to
    /// log, per spec §7's row-read-failure kind.
    fn read_band_row(&mut self, band: Band, y: u32, out: &mut Row) -> Result<(), RasterError>;
}

/// Write-side of the raster I/O collaborator.
pub trait RasterWriter: Send {
    fn dimensions(&self) -> Dimensions;

    fn write_band_row(&mut self, band: Band, y: u32, row: &Row) -> Result<(), RasterError>;

    /// Flushes and closes the underlying dataset. Consumes `self` so it
    /// cannot be written to again afterward.
    fn finish(self: Box<Self>) -> Result<(), RasterError>;
}
