// tests/test_quantize.rs — Depth levels, bucket maps and the field-lens map.

use holodepth::config::{ExecutionMode, OpticalConfig};
use holodepth::image::Image;
use holodepth::quantize::{DepthLevelTable, DepthQuantizer, DepthRemap};
use holodepth::viewing_window::ViewingWindowTransformer;
use holodepth::HoloError;

fn config(w: usize, h: usize, levels: usize) -> OpticalConfig {
    OpticalConfig {
        resolution: [w, h],
        near_depth: 0.1,
        far_depth: 0.5,
        num_depth_levels: levels,
        ..OpticalConfig::default()
    }
}

fn noise(w: usize, h: usize) -> Image<u8> {
    let mut seed = 99991u32;
    Image::from_fn(w, h, |_, _| {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        (seed >> 24) as u8
    })
}

// ===== Level table =====

#[test]
fn levels_are_non_decreasing_and_exactly_n() {
    for n in [2usize, 5, 64, 255, 256, 1000] {
        let t = DepthLevelTable::new(0.1, 0.5, n);
        assert_eq!(t.len(), n, "N = {n}");
        assert!(t.levels().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(t.levels()[0], 0.1);
        assert_eq!(*t.levels().last().unwrap(), 0.5);
        assert!((t.step() - 0.4 / (n - 1) as f64).abs() < 1e-15);
    }
}

#[test]
fn degenerate_level_count() {
    let t = DepthLevelTable::from_config(&config(4, 4, 1));
    assert_eq!(t.levels(), &[0.5 - 0.1]);
    assert!((t.step() - 0.3).abs() < 1e-15);

    let q = DepthQuantizer::new(&config(4, 4, 0));
    assert_eq!(q.bucket_count(), 1);
    let out = q.quantize(&noise(4, 4), ExecutionMode::Sequential).unwrap();
    assert!(out.index.as_slice().iter().all(|&i| i == 0));
}

#[test]
fn equal_near_and_far_gives_flat_table() {
    let t = DepthLevelTable::new(0.3, 0.3, 4);
    assert!(t.levels().iter().all(|&z| z == 0.3));
}

// ===== Index map =====

#[test]
fn index_map_stays_in_range() {
    for n in [2usize, 3, 17, 256] {
        let q = DepthQuantizer::new(&config(32, 16, n));
        let out = q.quantize(&noise(32, 16), ExecutionMode::Parallel).unwrap();
        assert!(out.index.as_slice().iter().all(|&i| (i as usize) < n));
    }
}

#[test]
fn endpoints_map_to_first_and_last_level() {
    let q = DepthQuantizer::new(&config(2, 1, 8));
    let depth = Image::from_vec(2, 1, vec![0u8, 255]);
    let out = q.quantize(&depth, ExecutionMode::Sequential).unwrap();
    assert_eq!(out.index.as_slice(), &[0, 7]);
}

#[test]
fn parallel_map_equals_sequential() {
    for remap in [None, Some(DepthRemap::NearestLevel), Some(DepthRemap::Gamma { exponent: 2.2 })] {
        let mut cfg = config(64, 48, 37);
        cfg.change_depth_quantization = remap.is_some();
        if let Some(r) = remap {
            cfg.depth_remap = r;
        }
        let q = DepthQuantizer::new(&cfg);
        let depth = noise(64, 48);
        let a = q.quantize(&depth, ExecutionMode::Sequential).unwrap();
        let b = q.quantize(&depth, ExecutionMode::Parallel).unwrap();
        assert_eq!(a.index, b.index, "remap {remap:?}");
        assert_eq!(a.table, b.table);
    }
}

#[test]
fn nearest_level_remap_tracks_physical_depth() {
    let mut cfg = config(256, 1, 5);
    cfg.change_depth_quantization = true;
    cfg.depth_remap = DepthRemap::NearestLevel;
    let q = DepthQuantizer::new(&cfg);
    let depth = Image::from_fn(256, 1, |x, _| x as u8);
    let out = q.quantize(&depth, ExecutionMode::Sequential).unwrap();
    let levels = out.table.levels();
    for (raw, &idx) in out.index.as_slice().iter().enumerate() {
        let d = 0.1 + raw as f64 / 255.0 * 0.4;
        let chosen = (levels[idx as usize] - d).abs();
        let best = levels.iter().map(|l| (l - d).abs()).fold(f64::INFINITY, f64::min);
        assert!(chosen <= best + 1e-12, "raw {raw}: picked level {idx}");
    }
}

#[test]
fn mismatched_depth_map_is_rejected() {
    let q = DepthQuantizer::new(&config(8, 8, 4));
    let err = q.quantize(&noise(8, 7), ExecutionMode::Parallel).unwrap_err();
    assert!(matches!(err, HoloError::Configuration(_)));
}

// ===== Viewing window =====

#[test]
fn viewing_window_preserves_length_and_order_of_entries() {
    let table = DepthLevelTable::new(0.3, 0.9, 7);
    let out = ViewingWindowTransformer::new(0.2).transform(&table).unwrap();
    assert_eq!(out.len(), table.len());
    for (i, (&z, &t)) in table.levels().iter().zip(out.levels()).enumerate() {
        let expected = -0.2 * z / (z - 0.2);
        assert!((t - expected).abs() < 1e-12, "level {i}");
    }
}

#[test]
fn viewing_window_singularity_is_reported() {
    let table = DepthLevelTable::new(0.2, 0.6, 3);
    let err = ViewingWindowTransformer::new(0.2).transform(&table).unwrap_err();
    assert!(matches!(err, HoloError::NumericalEdgeCase { index: 0, .. }));
    assert!(!err.is_recoverable());
}
