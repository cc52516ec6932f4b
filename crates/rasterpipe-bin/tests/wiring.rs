//! Exercises the `core-config` -> `core-pipeline` wiring `main` performs,
//! without needing to spawn the binary itself: argument parsing, kernel
//! override loading, and running the pipeline with the loaded kernel.

use clap::Parser;
use core_config::Args;
use core_raster::{GeoTiffReader, GeoTiffWriter, RasterReader, RasterWriter, Row};

#[tokio::test]
async fn kernel_override_flows_through_to_pipeline_output() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.tif");
    let output_path = dir.path().join("out.tif");
    let kernel_path = dir.path().join("identity.toml");

    let writer = GeoTiffWriter::create(&input_path, 2, 2, 3).unwrap();
    let mut writer: Box<dyn RasterWriter> = Box::new(writer);
    for band in 1..=3u8 {
        for y in 0..2u32 {
            writer
                .write_band_row(band, y, &Row::from_vec(vec![5.0 * band as f32, 9.0]))
                .unwrap();
        }
    }
    writer.finish().unwrap();

    std::fs::write(
        &kernel_path,
        "[kernel]\nweights = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]\n",
    )
    .unwrap();

    let args = Args::parse_from([
        "rasterpipe",
        input_path.to_str().unwrap(),
        output_path.to_str().unwrap(),
        "--kernel",
        kernel_path.to_str().unwrap(),
    ]);

    let kernel = core_config::load_kernel(args.kernel.as_deref()).unwrap();
    core_pipeline::run_pipeline_from_paths(&args.input_path, &args.output_path, kernel)
        .await
        .unwrap();

    let mut reader = GeoTiffReader::open(&output_path).unwrap();
    let mut row = Row::zeroed(2);
    for band in 1..=3u8 {
        reader.read_band_row(band, 0, &mut row).unwrap();
        assert_eq!(row.as_slice(), &[5.0 * band as f32, 9.0]);
    }
}

#[test]
fn missing_positional_arguments_is_a_parse_error() {
    assert!(Args::try_parse_from(["rasterpipe"]).is_err());
    assert!(Args::try_parse_from(["rasterpipe", "only_one_path"]).is_err());
}
