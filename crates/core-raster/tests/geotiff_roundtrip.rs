use core_raster::{GeoTiffReader, GeoTiffWriter, RasterReader, RasterWriter, Row};

#[test]
fn writing_then_reading_back_preserves_constant_bands() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("constant.tif");

    let writer = GeoTiffWriter::create(&path, 3, 3, 3).unwrap();
    let mut writer: Box<dyn RasterWriter> = Box::new(writer);
    for band in 1..=3u8 {
        for y in 0..3u32 {
            writer
                .write_band_row(band, y, &Row::from_vec(vec![10.0, 10.0, 10.0]))
                .unwrap();
        }
    }
    writer.finish().unwrap();

    let mut reader = GeoTiffReader::open(&path).unwrap();
    assert_eq!(reader.dimensions().width, 3);
    assert_eq!(reader.dimensions().height, 3);
    assert_eq!(reader.band_count(), 3);

    let mut out = Row::zeroed(3);
    for band in 1..=3u8 {
        for y in 0..3u32 {
            reader.read_band_row(band, y, &mut out).unwrap();
            assert_eq!(out.as_slice(), &[10.0, 10.0, 10.0]);
        }
    }
}

#[test]
fn saturating_conversion_clamps_negative_and_overflowing_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saturate.tif");

    let writer = GeoTiffWriter::create(&path, 3, 1, 1).unwrap();
    let mut writer: Box<dyn RasterWriter> = Box::new(writer);
    writer
        .write_band_row(1, 0, &Row::from_vec(vec![-255.0, 2040.0, 255.0]))
        .unwrap();
    writer.finish().unwrap();

    let mut reader = GeoTiffReader::open(&path).unwrap();
    let mut out = Row::zeroed(3);
    reader.read_band_row(1, 0, &mut out).unwrap();
    assert_eq!(out.as_slice(), &[0.0, 255.0, 255.0]);
}
