// tests/test_encode_write.rs — Encoding schemes, rescaling and raster output.

use num_complex::Complex64;

use holodepth::config::ExecutionMode;
use holodepth::encode::{EncodingScheme, Encoder};
use holodepth::image::Image;
use holodepth::synth::HologramField;
use holodepth::writer::{normalize, pack, BmpSink, ImageSink, MemorySink, ResultWriter};
use holodepth::HoloError;

fn field(w: usize, h: usize) -> HologramField {
    Image::from_fn(w, h, |x, y| Complex64::new(x as f64 - 1.0, y as f64 * 0.5))
}

// ===== Encoder =====

#[test]
fn split_keeps_panel_width_for_every_sub_panel_count() {
    let f = field(12, 3);
    for n in 1..=4 {
        let enc = Encoder::new(EncodingScheme::Split, n).unwrap();
        let out = enc.encode(&f).unwrap();
        assert_eq!(out.dimensions(), (12, 3), "n = {n}");
        // First sub-panel is the real part of the field binned by n.
        let m = 12 / n;
        for y in 0..3 {
            for j in 0..m {
                let mean_x = (n * j) as f64 + (n as f64 - 1.0) / 2.0;
                assert!((out.get(j, y) - (mean_x - 1.0)).abs() < 1e-12, "n = {n} ({j},{y})");
            }
        }
    }
}

#[test]
fn single_projection_schemes_keep_panel_size() {
    let f = field(4, 2);
    for scheme in [
        EncodingScheme::Amplitude,
        EncodingScheme::Phase,
        EncodingScheme::Real,
        EncodingScheme::Imaginary,
    ] {
        let out = Encoder::new(scheme, 3).unwrap().encode(&f).unwrap();
        assert_eq!(out.dimensions(), (4, 2), "{scheme:?}");
    }
    let amp = Encoder::new(EncodingScheme::Amplitude, 1).unwrap().encode(&f).unwrap();
    assert!((amp.get(3, 1) - Complex64::new(2.0, 0.5).norm()).abs() < 1e-12);
}

#[test]
fn zero_sub_panels_is_rejected() {
    assert!(matches!(
        Encoder::new(EncodingScheme::Split, 0),
        Err(HoloError::Configuration(_))
    ));
}

// ===== Rescale =====

#[test]
fn rescale_hits_both_endpoints() {
    let real = Image::from_fn(7, 3, |x, y| (x as f64 - 3.0) * (y as f64 + 1.0));
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let n = normalize(&real, mode);
        assert_eq!(*n.as_slice().iter().min().unwrap(), 0);
        assert_eq!(*n.as_slice().iter().max().unwrap(), 255);
    }
}

#[test]
fn rescale_truncates() {
    // 1/4·255 = 63.75 → 63, 2/4·255 = 127.5 → 127
    let real = Image::from_vec(4, 1, vec![0.0, 1.0, 2.0, 4.0]);
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        assert_eq!(normalize(&real, mode).as_slice(), &[0, 63, 127, 255]);
    }
}

#[test]
fn constant_field_rescales_to_zero() {
    let real = Image::from_vec(4, 4, vec![-1.25; 16]);
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        assert!(normalize(&real, mode).as_slice().iter().all(|&v| v == 0));
    }
}

// ===== Packing and sinks =====

#[test]
fn raster_is_width_over_n() {
    let samples = Image::from_vec(8, 2, (0..16).collect::<Vec<u8>>());
    let r = pack(samples, 4).unwrap();
    assert_eq!((r.width, r.height, r.channels), (2, 2, 4));
    assert_eq!(r.sample(1, 1, 0), 12);
    assert!(pack(Image::from_vec(7, 1, vec![0u8; 7]), 2).is_err());
}

#[test]
fn writer_emits_raster_narrowed_by_sub_panel_count() {
    for n in 1..=4 {
        let enc = Encoder::new(EncodingScheme::Split, n).unwrap();
        let real = enc.encode(&field(12, 2)).unwrap();
        let mut writer = ResultWriter::new(MemorySink::default(), n, ExecutionMode::Parallel);
        writer.write("Hologram_0", &real).unwrap();
        let (name, raster) = &writer.sink().written[0];
        assert_eq!(name, "Hologram_0");
        assert_eq!((raster.width, raster.height, raster.channels), (12 / n, 2, n));
        assert_eq!(raster.data.len(), 12 * 2);
    }
}

#[test]
fn bmp_sink_creates_folder_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested").join("result");
    let mut sink = BmpSink::new(&out);
    let raster = pack(Image::from_vec(6, 2, (0..12).map(|v| v * 20).collect()), 3).unwrap();
    sink.write("Hologram_4", &raster).unwrap();

    let path = out.join("Hologram_4.bmp");
    assert_eq!(sink.path_for("Hologram_4"), path);
    let decoded = image::open(&path).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (2, 2));
    assert_eq!(decoded.get_pixel(1, 0).0, [60, 80, 100]);
}
