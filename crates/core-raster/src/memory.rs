//! An in-process `RasterReader`/`RasterWriter` backed by plain `Vec<f32>`
//! storage. Used by the pipeline's own tests and benchmarks so they can
//! exercise the full reader/filter/writer contract without paying for a
//! GeoTIFF round trip through the filesystem on every case.

use crate::{Band, Dimensions, RasterError, RasterReader, RasterWriter, Row};

/// Three-band raster held entirely in memory, addressed `[band][y][x]`.
#[derive(Clone, Debug)]
pub struct MemoryRaster {
    width: u32,
    height: u32,
    bands: Vec<Vec<Vec<f32>>>,
}

impl MemoryRaster {
    pub fn new(width: u32, height: u32, band_count: usize) -> Self {
        let bands = vec![vec![vec![0.0; width as usize]; height as usize]; band_count];
        Self {
            width,
            height,
            bands,
        }
    }

    pub fn band_row(&self, band: Band, y: u32) -> &[f32] {
        &self.bands[band as usize - 1][y as usize]
    }

    pub fn set_band_row(&mut self, band: Band, y: u32, samples: &[f32]) {
        self.bands[band as usize - 1][y as usize].copy_from_slice(samples);
    }

    /// Fills every sample of every band with `value`.
    pub fn fill(&mut self, value: f32) {
        for band in &mut self.bands {
            for row in band {
                row.iter_mut().for_each(|v| *v = value);
            }
        }
    }
}

impl RasterReader for MemoryRaster {
    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn read_band_row(&mut self, band: Band, y: u32, out: &mut Row) -> Result<(), RasterError> {
        let band_idx = band as usize;
        if band_idx == 0 || band_idx > self.bands.len() {
            return Err(RasterError::BandFetch { band });
        }
        out.as_mut_slice()
            .copy_from_slice(&self.bands[band_idx - 1][y as usize]);
        Ok(())
    }
}

impl RasterWriter for MemoryRaster {
    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    fn write_band_row(&mut self, band: Band, y: u32, row: &Row) -> Result<(), RasterError> {
        let band_idx = band as usize;
        if band_idx == 0 || band_idx > self.bands.len() {
            return Err(RasterError::BandFetch { band });
        }
        self.bands[band_idx - 1][y as usize].copy_from_slice(row.as_slice());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), RasterError> {
        Ok(())
    }
}

/// A `RasterWriter` that writes into a `MemoryRaster` shared by `Arc<Mutex<_>>`
/// rather than owning it outright, so a test can keep a handle to inspect
/// the written rows after handing the writer to something that consumes it
/// by value (such as `core_pipeline::run_pipeline`).
#[derive(Clone)]
pub struct SharedMemoryRaster(std::sync::Arc<std::sync::Mutex<MemoryRaster>>);

impl SharedMemoryRaster {
    pub fn new(raster: MemoryRaster) -> Self {
        Self(std::sync::Arc::new(std::sync::Mutex::new(raster)))
    }

    pub fn snapshot(&self) -> MemoryRaster {
        self.0.lock().expect("shared memory raster mutex poisoned").clone()
    }
}

impl RasterWriter for SharedMemoryRaster {
    fn dimensions(&self) -> Dimensions {
        self.0.lock().expect("shared memory raster mutex poisoned").dimensions()
    }

    fn write_band_row(&mut self, band: Band, y: u32, row: &Row) -> Result<(), RasterError> {
        self.0
            .lock()
            .expect("shared memory raster mutex poisoned")
            .write_band_row(band, y, row)
    }

    fn finish(self: Box<Self>) -> Result<(), RasterError> {
        Ok(())
    }
}

/// Small builder for constructing test fixtures without exposing the raw
/// `Vec<Vec<Vec<f32>>>` layout to callers.
pub struct MemoryRasterBuilder {
    raster: MemoryRaster,
}

impl MemoryRasterBuilder {
    pub fn new(width: u32, height: u32, band_count: usize) -> Self {
        Self {
            raster: MemoryRaster::new(width, height, band_count),
        }
    }

    pub fn constant(mut self, value: f32) -> Self {
        self.raster.fill(value);
        self
    }

    pub fn band_row(mut self, band: Band, y: u32, samples: &[f32]) -> Self {
        self.raster.set_band_row(band, y, samples);
        self
    }

    pub fn build(self) -> MemoryRaster {
        self.raster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_after_write_roundtrips() {
        let mut raster = MemoryRaster::new(4, 2, 3);
        let row = Row::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        RasterWriter::write_band_row(&mut raster, 2, 1, &row).unwrap();
        let mut out = Row::zeroed(4);
        raster.read_band_row(2, 1, &mut out).unwrap();
        assert_eq!(out, row);
    }

    #[test]
    fn out_of_range_band_is_band_fetch_error() {
        let mut raster = MemoryRaster::new(2, 2, 3);
        let mut out = Row::zeroed(2);
        let err = raster.read_band_row(4, 0, &mut out).unwrap_err();
        assert!(matches!(err, RasterError::BandFetch { band: 4 }));
    }
}
