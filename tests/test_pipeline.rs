// tests/test_pipeline.rs — End-to-end frame processing.

use rand::rngs::StdRng;
use rand::SeedableRng;

use num_complex::Complex64;

use holodepth::config::{ExecutionMode, RunConfig, SimulationConfig};
use holodepth::convert::u8_to_normalized;
use holodepth::image::Image;
use holodepth::pipeline::HologramPipeline;
use holodepth::propagation::Propagator;
use holodepth::quantize::DepthQuantizer;
use holodepth::source::{FrameInputs, MemorySource};
use holodepth::synth::{
    collect_layers, Accumulator, HologramField, ParallelAccumulator, SequentialAccumulator,
    WavefrontSynthesizer,
};
use holodepth::writer::MemorySink;
use holodepth::HoloError;

/// 4×4 panel, two layers: left half at z = 0, right half at z = 10 m.
fn two_layer_config(mode: ExecutionMode) -> RunConfig {
    let mut cfg = RunConfig::default();
    cfg.optical.wavelength = 532e-9;
    cfg.optical.pixel_pitch = [8e-6, 8e-6];
    cfg.optical.resolution = [4, 4];
    cfg.optical.num_depth_levels = 2;
    cfg.optical.near_depth = 0.0;
    cfg.optical.far_depth = 10.0;
    cfg.optical.transform_viewing_window = false;
    cfg.optical.random_phase = false;
    cfg.optical.tilt = [0.0, 0.0];
    cfg.optical.sub_panels = 2;
    cfg.run.mode = mode;
    cfg
}

fn two_layer_inputs() -> FrameInputs {
    FrameInputs {
        amplitude: Image::from_fn(4, 4, |_, _| 200u8),
        depth: Image::from_fn(4, 4, |x, _| if x < 2 { 0u8 } else { 255 }),
    }
}

fn memory_pipeline(
    cfg: &RunConfig,
    frames: Vec<Option<FrameInputs>>,
) -> HologramPipeline<MemorySource, MemorySink> {
    let synth = WavefrontSynthesizer::for_mode(&cfg.optical, cfg.run.mode).unwrap();
    HologramPipeline::new(cfg, synth, MemorySource { frames }, MemorySink::default()).unwrap()
}

#[test]
fn two_layer_scene_has_no_dark_cells() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let cfg = two_layer_config(mode);
        let mut pipeline = memory_pipeline(&cfg, vec![]);
        let inputs = two_layer_inputs();
        let (field, stats) = pipeline
            .synthesize_frame(0, &inputs, &mut StdRng::seed_from_u64(0))
            .unwrap();

        assert_eq!(stats.layers, 2);
        assert_eq!(stats.sources, 16);
        assert_eq!(stats.distances, vec![0.0, 10.0]);

        // Left half in bucket 0, right half in bucket 1.
        let q = DepthQuantizer::new(&cfg.optical).quantize(&inputs.depth, mode).unwrap();
        for (x, y, b) in q.index.pixels() {
            assert_eq!(b, if x < 2 { 0 } else { 1 }, "{mode:?}: bucket at ({x},{y})");
        }

        // Same field whichever layer is accumulated first.
        let strategy: Box<dyn Accumulator> = match mode {
            ExecutionMode::Sequential => Box::new(SequentialAccumulator),
            _ => Box::new(ParallelAccumulator),
        };
        let unit = Image::from_fn(4, 4, |_, _| Complex64::new(1.0, 0.0));
        let amplitude = u8_to_normalized(&inputs.amplitude);
        let mut layers = collect_layers(&amplitude, &q.index, q.table.levels(), &unit).unwrap();
        let p = Propagator::new(&cfg.optical);
        let mut forward: HologramField = Image::new(4, 4);
        strategy.accumulate(&p, &layers, &mut forward).unwrap();
        layers.reverse();
        let mut reversed: HologramField = Image::new(4, 4);
        strategy.accumulate(&p, &layers, &mut reversed).unwrap();
        for ((f, r), c) in forward.as_slice().iter().zip(reversed.as_slice()).zip(field.as_slice()) {
            assert!((f - r).norm() <= 1e-6, "{mode:?}: layer order changed the field");
            assert!((f - c).norm() <= 1e-9, "{mode:?}: pipeline field differs");
        }

        // 16 sources of amplitude 200/255 bound every cell by 12.55; the two
        // layers' partial sums never cancel below ~4.1.
        let bound = 16.0 * 200.0 / 255.0;
        for (x, y, c) in field.pixels() {
            let m = c.norm();
            assert!(m > 1.0, "{mode:?}: cell ({x},{y}) nearly dark: {m}");
            assert!(m <= bound + 1e-9, "{mode:?}: cell ({x},{y}) exceeds bound: {m}");
        }
        pipeline.recycle(field);
    }
}

#[test]
fn run_writes_one_raster_per_frame_and_skips_missing() {
    let mut cfg = two_layer_config(ExecutionMode::Parallel);
    cfg.sequence.static_image = false;
    cfg.sequence.frame_count = 3;
    cfg.sequence.start_frame = 10;
    let frames = vec![Some(two_layer_inputs()), None, Some(two_layer_inputs())];
    let mut pipeline = memory_pipeline(&cfg, frames);

    let summary = pipeline.run(&mut StdRng::seed_from_u64(3)).unwrap();
    assert_eq!(summary.skipped, vec![11]);
    assert_eq!(summary.processed.len(), 2);

    let written = &pipeline.writer().sink().written;
    let names: Vec<&str> = written.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Hologram_10", "Hologram_12"]);
    for (_, raster) in written {
        // Split encoding with 2 sub-panels → 2×4, two channels.
        assert_eq!((raster.width, raster.height, raster.channels), (2, 4, 2));
        assert!(raster.data.contains(&0) && raster.data.contains(&255));
    }
}

#[test]
fn simulation_previews_follow_each_hologram() {
    let mut cfg = two_layer_config(ExecutionMode::Sequential);
    cfg.sequence.simulation = Some(SimulationConfig {
        focus_distances: vec![0.0, 10.0],
        prefix: "sim".to_string(),
    });
    let mut pipeline = memory_pipeline(&cfg, vec![Some(two_layer_inputs())]);
    pipeline.run(&mut StdRng::seed_from_u64(9)).unwrap();

    let written = &pipeline.writer().sink().written;
    let names: Vec<&str> = written.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Hologram_0", "sim_Hologram_0_FOCUS_0", "sim_Hologram_0_FOCUS_10000"]);
    assert_eq!(written[1].1.channels, 1);
}

#[test]
fn level_on_lens_focal_plane_aborts_the_run() {
    let mut cfg = two_layer_config(ExecutionMode::Sequential);
    cfg.optical.transform_viewing_window = true;
    cfg.optical.field_lens = 10.0;
    let mut pipeline = memory_pipeline(&cfg, vec![Some(two_layer_inputs())]);

    let err = pipeline.run(&mut StdRng::seed_from_u64(0)).unwrap_err();
    assert!(matches!(err, HoloError::NumericalEdgeCase { index: 1, .. }));
    assert!(pipeline.writer().sink().written.is_empty());
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let mut cfg = two_layer_config(ExecutionMode::Sequential);
    cfg.optical.encoding = holodepth::encode::EncodingScheme::Real;
    cfg.optical.resolution = [5, 4];
    cfg.optical.sub_panels = 2;
    let synth = WavefrontSynthesizer::for_mode(&cfg.optical, ExecutionMode::Sequential).unwrap();
    let err = HologramPipeline::new(&cfg, synth, MemorySource::default(), MemorySink::default())
        .err()
        .unwrap();
    assert!(matches!(err, HoloError::Configuration(_)));
}

#[test]
fn folder_run_reads_bmp_inputs_and_writes_bmp_results() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let frame = src.join("007");
    std::fs::create_dir_all(&frame).unwrap();

    // Inputs at 8×8 are resampled down to the 4×4 panel.
    let amp: Vec<u8> = (0..64).map(|i| 60 + (i % 8) as u8 * 20).collect();
    let depth: Vec<u8> = (0..64).map(|i| if i % 8 < 4 { 0 } else { 255 }).collect();
    image::save_buffer(frame.join("RGB_0.bmp"), &amp, 8, 8, image::ColorType::L8).unwrap();
    image::save_buffer(frame.join("Depth_0.bmp"), &depth, 8, 8, image::ColorType::L8).unwrap();

    let out = dir.path().join("out");
    let toml = format!(
        r#"
        [optical]
        resolution = [4, 4]
        near_depth = 0.0
        far_depth = 10.0
        num_depth_levels = 2
        sub_panels = 4
        transform_viewing_window = false
        random_phase = false

        [sequence]
        static_image = false
        frame_count = 2
        start_frame = 7
        frame_digits = 3
        source_folder = "{}"
        result_folder = "{}"

        [run]
        mode = "sequential"
        seed = 1
        "#,
        src.display().to_string().replace('\\', "/"),
        out.display().to_string().replace('\\', "/"),
    );
    let cfg = RunConfig::from_toml_str(&toml).unwrap();
    let mut pipeline = HologramPipeline::from_config(&cfg).unwrap();
    let summary = pipeline.run(&mut StdRng::seed_from_u64(1)).unwrap();

    // Frame 008 has no folder and is skipped.
    assert_eq!(summary.skipped, vec![8]);
    let written = image::open(out.join("Hologram_7.bmp")).unwrap().to_rgb8();
    // Four sub-panels → a 1×4 raster.
    assert_eq!(written.dimensions(), (1, 4));
    assert!(!out.join("Hologram_8.bmp").exists());
}

#[test]
fn default_split_raster_is_panel_width_over_sub_panels() {
    let mut cfg = two_layer_config(ExecutionMode::Parallel);
    cfg.optical.resolution = [6, 2];
    cfg.optical.sub_panels = 3;
    let inputs = FrameInputs {
        amplitude: Image::from_fn(6, 2, |x, _| 40 + 30 * x as u8),
        depth: Image::from_fn(6, 2, |x, y| (x * 40 + y * 20) as u8),
    };
    let mut pipeline = memory_pipeline(&cfg, vec![Some(inputs)]);
    pipeline.run(&mut StdRng::seed_from_u64(2)).unwrap();

    let (_, raster) = &pipeline.writer().sink().written[0];
    assert_eq!((raster.width, raster.height), (2, 2));
    assert_eq!(raster.channels, 3);
    assert_eq!(raster.data.len(), 6 * 2);
}
