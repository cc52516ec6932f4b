//! The three-stage pipeline orchestrator (spec §4.4–§4.7) and its nine
//! concurrent tasks: one reader, one filter, one writer per band.
//!
//! Synchronization between the three tasks of a band is entirely through
//! the pair of `StripBuffer`s `core-strip` provides; there is no explicit
//! barrier. The only cross-band coordination is the two dataset-wide I/O
//! mutexes (spec §5), modeled here as `std::sync::Mutex` guarding the
//! `RasterReader`/`RasterWriter` trait objects, with every call into them
//! run inside `tokio::task::spawn_blocking` since the raster I/O library is
//! assumed synchronous (this mirrors how the rest of this codebase wraps
//! blocking terminal calls for its async input task).

use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use core_raster::{Band, GeoTiffReader, GeoTiffWriter, RasterError, RasterReader, RasterWriter, Row};
use core_stencil::{apply_row, Kernel};
use core_strip::StripBuffer;

const BAND_COUNT: usize = 3;

/// Per-band high-water marks, surfaced purely for tuning (spec §8,
/// invariant 4).
#[derive(Debug, Clone, Copy)]
pub struct BandReport {
    pub band: Band,
    pub read_buffer_max_size: usize,
    pub write_buffer_max_size: usize,
}

/// Summary returned once the pipeline has joined all nine tasks and closed
/// both datasets.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub elapsed: Duration,
    pub bands: Vec<BandReport>,
}

/// Opens `input_path`, creates `output_path` as a three-band 8-bit GeoTIFF
/// of the same dimensions, and runs the pipeline. Input-open and
/// output-create failures are fatal and returned before any task is
/// spawned (spec §5, §7).
pub async fn run_pipeline_from_paths(
    input_path: &Path,
    output_path: &Path,
    kernel: Kernel,
) -> anyhow::Result<PipelineReport> {
    let reader = GeoTiffReader::open(input_path)?;
    let dims = reader.dimensions();
    let writer = GeoTiffWriter::create(output_path, dims.width, dims.height, BAND_COUNT)?;
    run_pipeline(Box::new(reader), Box::new(writer), kernel).await
}

/// Runs the pipeline against an already-open reader/writer pair. Exposed
/// directly (rather than only through `run_pipeline_from_paths`) so tests
/// and benchmarks can drive it against `core_raster::MemoryRaster` without
/// touching the filesystem.
pub async fn run_pipeline(
    reader: Box<dyn RasterReader>,
    writer: Box<dyn RasterWriter>,
    kernel: Kernel,
) -> anyhow::Result<PipelineReport> {
    let start = Instant::now();
    let dims = reader.dimensions();
    let available_bands = reader.band_count();
    let width = dims.width;
    let height = dims.height;

    let input = Arc::new(StdMutex::new(reader));
    let output = Arc::new(StdMutex::new(Some(writer)));

    let read_buffers: Vec<Arc<StripBuffer>> = (0..BAND_COUNT).map(|_| Arc::new(StripBuffer::new())).collect();
    let write_buffers: Vec<Arc<StripBuffer>> = (0..BAND_COUNT).map(|_| Arc::new(StripBuffer::new())).collect();

    let mut tasks = Vec::with_capacity(BAND_COUNT * 3);
    for idx in 0..BAND_COUNT {
        let band = (idx + 1) as Band;
        let r_buf = Arc::clone(&read_buffers[idx]);
        let w_buf = Arc::clone(&write_buffers[idx]);

        tasks.push(tokio::spawn(reader_task(
            Arc::clone(&input),
            Arc::clone(&r_buf),
            band,
            width,
            height,
            available_bands,
        )));
        tasks.push(tokio::spawn(filter_task(
            Arc::clone(&r_buf),
            Arc::clone(&w_buf),
            band,
            width,
            height,
            kernel,
        )));
        tasks.push(tokio::spawn(writer_task(
            Arc::clone(&output),
            w_buf,
            band,
            height,
        )));
    }

    for task in tasks {
        task.await.context("pipeline task panicked")?;
    }

    let bands = (0..BAND_COUNT)
        .map(|idx| BandReport {
            band: (idx + 1) as Band,
            read_buffer_max_size: read_buffers[idx].max_size(),
            write_buffer_max_size: write_buffers[idx].max_size(),
        })
        .collect();

    let writer = output
        .lock()
        .expect("output mutex poisoned")
        .take()
        .expect("writer consumed more than once");
    writer.finish()?;

    Ok(PipelineReport {
        elapsed: start.elapsed(),
        bands,
    })
}

/// Reader(b) (spec §4.4): fills `R_b` with every row of band `b`, reading
/// through the shared input mutex. If the dataset has fewer than `band`
/// bands the whole band is a "failed to get band" diagnostic (spec §6)
/// rather than a per-row failure; `R_b` is still filled with zeroed rows so
/// the filter and writer downstream make progress against an "uninitialized
/// output for the missing band" (spec §6).
async fn reader_task(
    input: Arc<StdMutex<Box<dyn RasterReader>>>,
    r_buf: Arc<StripBuffer>,
    band: Band,
    width: u32,
    height: u32,
    available_bands: usize,
) {
    if band as usize > available_bands {
        tracing::warn!(
            target: "pipeline.reader",
            band,
            available_bands,
            "failed to get band"
        );
        for y in 0..height {
            r_buf.add(y, Row::zeroed(width as usize)).await;
        }
        tracing::info!(target: "pipeline.reader", band, rows = height, "reader_complete_missing_band");
        return;
    }

    for y in 0..height {
        let input = Arc::clone(&input);
        let read: std::thread::Result<(Row, Result<(), RasterError>)> =
            tokio::task::spawn_blocking(move || {
                let mut row = Row::zeroed(width as usize);
                let mut guard = input.lock().expect("input mutex poisoned");
                let result = guard.read_band_row(band, y, &mut row);
                (row, result)
            })
            .await
            .map_err(|join_err| {
                // spawn_blocking only fails if the closure panicked; surface
                // it as a zeroed row rather than taking the task down, per
                // the "logged and swallowed" policy spec §7 applies to
                // every per-row error kind.
                tracing::error!(target: "pipeline.reader", band, row = y, %join_err, "reader_panicked");
                join_err
            });

        let row = match read {
            Ok((row, Ok(()))) => row,
            Ok((row, Err(err))) => {
                tracing::warn!(target: "pipeline.reader", band, row = y, %err, "row_read_failed");
                row
            }
            Err(_) => Row::zeroed(width as usize),
        };
        r_buf.add(y, row).await;
    }

    tracing::info!(target: "pipeline.reader", band, rows = height, "reader_complete");
}

/// Filter(b) (spec §4.5): for each row, waits on the three clamped source
/// rows, applies the stencil, appends the result to `W_b`, and reclaims
/// any of the three source rows whose access count has reached 3.
async fn filter_task(
    r_buf: Arc<StripBuffer>,
    w_buf: Arc<StripBuffer>,
    band: Band,
    width: u32,
    height: u32,
    kernel: Kernel,
) {
    for y in 0..height {
        let yc = y;
        let yp = y.saturating_sub(1);
        let yn = (y + 1).min(height - 1);

        let curr = r_buf.get_wait(yc).await;
        let prev = r_buf.get_wait(yp).await;
        let next = r_buf.get_wait(yn).await;

        let mut out = Row::zeroed(width as usize);
        apply_row(&prev, &curr, &next, &kernel, &mut out);
        w_buf.add(yc, out).await;

        for &idx in &[yc, yp, yn] {
            if let Some(access) = r_buf.access(idx).await {
                if access >= 3 {
                    r_buf.remove(idx).await;
                }
            }
        }
    }

    tracing::info!(target: "pipeline.filter", band, rows = height, "filter_complete");
}

/// Writer(b) (spec §4.6): drains `W_b` in row order, writing each row
/// through the shared output mutex and removing it immediately after.
async fn writer_task(
    output: Arc<StdMutex<Option<Box<dyn RasterWriter>>>>,
    w_buf: Arc<StripBuffer>,
    band: Band,
    height: u32,
) {
    for y in 0..height {
        let row = w_buf.get_wait(y).await;
        let output = Arc::clone(&output);
        let write = tokio::task::spawn_blocking(move || {
            let mut guard = output.lock().expect("output mutex poisoned");
            let writer = guard.as_mut().expect("writer consumed before pipeline joined");
            writer.write_band_row(band, y, &row)
        })
        .await;

        match write {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(target: "pipeline.writer", band, row = y, %err, "row_write_failed");
            }
            Err(join_err) => {
                tracing::error!(target: "pipeline.writer", band, row = y, %join_err, "writer_panicked");
            }
        }
        w_buf.remove(y).await;
    }

    tracing::info!(target: "pipeline.writer", band, rows = height, "writer_complete");
}
