//! GeoTIFF-backed implementation of `RasterReader`/`RasterWriter`.
//!
//! The spec places the raster I/O library itself out of scope and only
//! specifies the row-level interface the pipeline core consumes (spec §1,
//! §6). This module is one concrete instance of that interface, built on
//! the `tiff` crate rather than a full GDAL binding, since the corpus this
//! workspace draws from has no geospatial I/O dependency to inherit and
//! `tiff` is the minimal real crate that gives row-addressable, multi-sample
//! raster I/O with the sample-format conversion the spec assumes.
//!
//! `tiff`'s encoder and decoder both operate on whole-image buffers rather
//! than a streaming per-row API, so both sides of this adapter hold the
//! full raster in memory between individual row calls. That is an
//! implementation detail of the out-of-scope collaborator, not a property
//! the pipeline core depends on.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::ColorType;

use crate::{Band, Dimensions, RasterError, RasterReader, RasterWriter, Row};

pub struct GeoTiffReader {
    width: u32,
    height: u32,
    samples_per_pixel: usize,
    // Interleaved 8-bit samples, row-major: `pixels[(y * width + x) * spp + band]`.
    pixels: Vec<u8>,
}

impl GeoTiffReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let open_err = |source: anyhow::Error| RasterError::InputOpen {
            path: path.display().to_string(),
            source,
        };

        let file = File::open(path).map_err(|e| open_err(e.into()))?;
        let mut decoder = Decoder::new(file).map_err(|e| open_err(e.into()))?;
        let (width, height) = decoder.dimensions().map_err(|e| open_err(e.into()))?;
        tracing::debug!(target: "raster.geotiff", path = %path.display(), width, height, "opened input raster");
        let color_type = decoder.colortype().map_err(|e| open_err(e.into()))?;
        let samples_per_pixel = match color_type {
            ColorType::Gray(_) => 1,
            ColorType::RGB(_) => 3,
            ColorType::RGBA(_) | ColorType::CMYK(_) => 4,
            other => return Err(open_err(anyhow::anyhow!("unsupported color type {other:?}"))),
        };

        let image = decoder.read_image().map_err(|e| open_err(e.into()))?;
        let pixels = match image {
            DecodingResult::U8(bytes) => bytes,
            other => {
                return Err(open_err(anyhow::anyhow!(
                    "unsupported sample format {other:?}, expected 8-bit"
                )))
            }
        };

        Ok(Self {
            width,
            height,
            samples_per_pixel,
            pixels,
        })
    }
}

impl RasterReader for GeoTiffReader {
    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    fn band_count(&self) -> usize {
        self.samples_per_pixel
    }

    fn read_band_row(&mut self, band: Band, y: u32, out: &mut Row) -> Result<(), RasterError> {
        let band_idx = band as usize;
        if band_idx == 0 || band_idx > self.samples_per_pixel {
            return Err(RasterError::BandFetch { band });
        }
        let spp = self.samples_per_pixel;
        let row_start = y as usize * self.width as usize * spp;
        let slice = self.pixels.get(row_start..row_start + self.width as usize * spp).ok_or_else(
            || RasterError::RowRead {
                band,
                row: y,
                source: anyhow::anyhow!("row {y} out of range for {}x{}", self.width, self.height),
            },
        )?;
        let out = out.as_mut_slice();
        for x in 0..self.width as usize {
            out[x] = slice[x * spp + (band_idx - 1)] as f32;
        }
        Ok(())
    }
}

pub struct GeoTiffWriter {
    path: std::path::PathBuf,
    width: u32,
    height: u32,
    samples_per_pixel: usize,
    pixels: Vec<u8>,
}

impl GeoTiffWriter {
    pub fn create(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        band_count: usize,
    ) -> Result<Self, RasterError> {
        let path = path.as_ref().to_path_buf();
        if band_count == 0 {
            return Err(RasterError::OutputCreate {
                path: path.display().to_string(),
                source: anyhow::anyhow!("band_count must be >= 1"),
            });
        }
        let pixels = vec![0u8; width as usize * height as usize * band_count];
        Ok(Self {
            path,
            width,
            height,
            samples_per_pixel: band_count,
            pixels,
        })
    }
}

impl RasterWriter for GeoTiffWriter {
    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    fn write_band_row(&mut self, band: Band, y: u32, row: &Row) -> Result<(), RasterError> {
        let band_idx = band as usize;
        if band_idx == 0 || band_idx > self.samples_per_pixel {
            return Err(RasterError::BandFetch { band });
        }
        if row.len() != self.width as usize {
            return Err(RasterError::RowWrite {
                band,
                row: y,
                source: anyhow::anyhow!(
                    "row width {} does not match raster width {}",
                    row.len(),
                    self.width
                ),
            });
        }
        let spp = self.samples_per_pixel;
        let row_start = y as usize * self.width as usize * spp;
        for (x, &sample) in row.as_slice().iter().enumerate() {
            // Float -> u8 conversion with saturation, delegated here rather
            // than in the stencil kernel per spec §4.3.
            self.pixels[row_start + x * spp + (band_idx - 1)] = sample.round().clamp(0.0, 255.0) as u8;
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), RasterError> {
        let create_err = |source: anyhow::Error| RasterError::OutputCreate {
            path: self.path.display().to_string(),
            source,
        };
        let file = File::create(&self.path).map_err(|e| create_err(e.into()))?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| create_err(e.into()))?;
        match self.samples_per_pixel {
            1 => encoder
                .write_image::<colortype::Gray8>(self.width, self.height, &self.pixels)
                .map_err(|e| create_err(e.into()))?,
            3 => encoder
                .write_image::<colortype::RGB8>(self.width, self.height, &self.pixels)
                .map_err(|e| create_err(e.into()))?,
            4 => encoder
                .write_image::<colortype::RGBA8>(self.width, self.height, &self.pixels)
                .map_err(|e| create_err(e.into()))?,
            n => return Err(create_err(anyhow::anyhow!("unsupported band count {n}"))),
        };
        tracing::debug!(target: "raster.geotiff", path = %self.path.display(), "wrote output raster");
        Ok(())
    }
}
