// pipeline.rs — Frame-by-frame hologram generation.
//
// Ties every stage together into the loop the CLI drives:
//
//   for each frame:
//     1. Load amplitude + depth inputs           (FrameSource)
//          missing/unreadable → warn, skip frame
//     2. Quantize depth into N levels            (DepthQuantizer)
//     3. Optionally apply the field-lens map     (ViewingWindowTransformer)
//     4. Accumulate all layers into the field    (WavefrontSynthesizer)
//     5. Encode complex → real                   (Encoder)
//     6. Normalize, pack, write                  (ResultWriter)
//     7. Optional refocused previews             (reconstruct)
//     8. Hand the field buffer back for reuse
//
// Frames run strictly one after another and every stage finishes before the
// next begins. Only a Resource error is survivable; anything else (bad
// configuration, a level on the lens focal plane, an allocation failure, a
// write failure) aborts the run.
//
// NEW RUST CONCEPTS:
// - Generic parameters with trait bounds (`Src: FrameSource, S: ImageSink`)
//   instead of trait objects: the input and output collaborators are fixed
//   for a run, so static dispatch costs nothing and the concrete sink stays
//   reachable through `writer().sink()` afterwards.
// - `R: Rng + ?Sized` lets callers pass either a concrete generator or a
//   `&mut dyn RngCore`.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, info_span, warn};

use crate::config::{ExecutionMode, RunConfig, SequenceConfig};
use crate::convert::u8_to_normalized;
use crate::encode::Encoder;
use crate::error::Result;
use crate::quantize::DepthQuantizer;
use crate::reconstruct::focus_intensity;
use crate::source::{FolderSource, FrameInputs, FrameSource};
use crate::synth::{HologramField, WavefrontSynthesizer};
use crate::viewing_window::{TransformedDepthLevelTable, ViewingWindowTransformer};
use crate::writer::{BmpSink, ImageSink, ResultWriter};

/// Statistics of one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    /// Frame number as used in file names.
    pub frame: usize,
    /// Depth buckets that held at least one lit pixel.
    pub layers: usize,
    /// Lit pixels (point sources) across all layers.
    pub sources: usize,
    /// Propagation distances after the optional lens transform.
    pub distances: Vec<f64>,
    pub synthesis_time: Duration,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub processed: Vec<FrameStats>,
    /// Frame numbers whose inputs were unavailable.
    pub skipped: Vec<usize>,
}

/// The per-run orchestrator.
pub struct HologramPipeline<Src: FrameSource, S: ImageSink> {
    sequence: SequenceConfig,
    mode: ExecutionMode,
    quantizer: DepthQuantizer,
    /// `None` when the viewing-window transform is off.
    transformer: Option<ViewingWindowTransformer>,
    synthesizer: WavefrontSynthesizer,
    encoder: Encoder,
    writer: ResultWriter<S>,
    source: Src,
}

impl HologramPipeline<FolderSource, BmpSink> {
    /// Pipeline reading BMP frames from disk and writing BMP results.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let optical = &config.optical;
        let synthesizer = WavefrontSynthesizer::for_mode(optical, config.run.mode)?;
        let source = FolderSource::new(&config.sequence, optical.width(), optical.height());
        let sink = BmpSink::new(&config.sequence.result_folder);
        Self::new(config, synthesizer, source, sink)
    }
}

impl<Src: FrameSource, S: ImageSink> HologramPipeline<Src, S> {
    pub fn new(
        config: &RunConfig,
        synthesizer: WavefrontSynthesizer,
        source: Src,
        sink: S,
    ) -> Result<Self> {
        config.validate()?;
        let optical = &config.optical;
        let mode = config.run.mode;
        Ok(HologramPipeline {
            sequence: config.sequence.clone(),
            mode,
            quantizer: DepthQuantizer::new(optical),
            transformer: optical
                .transform_viewing_window
                .then(|| ViewingWindowTransformer::new(optical.field_lens)),
            synthesizer,
            encoder: Encoder::new(optical.encoding, optical.sub_panels)?,
            writer: ResultWriter::new(sink, optical.sub_panels, mode),
            source,
        })
    }

    pub fn writer(&self) -> &ResultWriter<S> {
        &self.writer
    }

    pub fn synthesizer(&self) -> &WavefrontSynthesizer {
        &self.synthesizer
    }

    /// Frame number used in output names for the `index`-th frame of the run.
    pub fn frame_number(&self, index: usize) -> usize {
        self.sequence.start_frame + index
    }

    /// Run every configured frame.
    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<RunSummary> {
        let frames = self.sequence.frames();
        info!(
            frames,
            mode = ?self.mode,
            strategy = self.synthesizer.strategy(),
            "starting hologram run"
        );

        let mut summary = RunSummary::default();
        for index in 0..frames {
            let number = self.frame_number(index);
            let _span = info_span!("frame", number).entered();

            let inputs = match self.source.load(index) {
                Ok(inputs) => inputs,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "skipping frame");
                    summary.skipped.push(number);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let stats = self.process_frame(number, &inputs, rng)?;
            info!(
                layers = stats.layers,
                sources = stats.sources,
                elapsed_ms = stats.synthesis_time.as_secs_f64() * 1e3,
                "frame written"
            );
            summary.processed.push(stats);
        }

        info!(
            processed = summary.processed.len(),
            skipped = summary.skipped.len(),
            "run finished"
        );
        Ok(summary)
    }

    /// Quantize, transform and synthesize one frame without writing it.
    /// Pass the field to [`HologramPipeline::recycle`] when done.
    pub fn synthesize_frame<R: Rng + ?Sized>(
        &mut self,
        number: usize,
        inputs: &FrameInputs,
        rng: &mut R,
    ) -> Result<(HologramField, FrameStats)> {
        let quantized = self.quantizer.quantize(&inputs.depth, self.mode)?;
        let distances = match &self.transformer {
            Some(t) => t.transform(&quantized.table)?,
            None => TransformedDepthLevelTable::untransformed(&quantized.table),
        };
        debug!(levels = distances.len(), step = quantized.table.step(), "depth levels ready");

        let amplitude = u8_to_normalized(&inputs.amplitude);
        let started = Instant::now();
        let field = self.synthesizer.synthesize(&amplitude, &quantized.index, distances.levels(), rng)?;
        let synthesis_time = started.elapsed();

        let mut occupied = vec![false; distances.len()];
        let mut sources = 0;
        for (x, y, a) in inputs.amplitude.pixels() {
            if a > 0 {
                sources += 1;
                if let Some(slot) = occupied.get_mut(quantized.index.get(x, y) as usize) {
                    *slot = true;
                }
            }
        }

        let stats = FrameStats {
            frame: number,
            layers: occupied.iter().filter(|&&o| o).count(),
            sources,
            distances: distances.levels().to_vec(),
            synthesis_time,
        };
        Ok((field, stats))
    }

    pub fn recycle(&mut self, field: HologramField) {
        self.synthesizer.recycle(field);
    }

    /// Synthesize, encode and write one frame (plus any refocused previews).
    pub fn process_frame<R: Rng + ?Sized>(
        &mut self,
        number: usize,
        inputs: &FrameInputs,
        rng: &mut R,
    ) -> Result<FrameStats> {
        let (field, stats) = self.synthesize_frame(number, inputs, rng)?;

        let encoded = self.encoder.encode(&field)?;
        let name = format!("{}{}", self.sequence.result_prefix, number);
        self.writer.write(&name, &encoded)?;

        if let Some(sim) = &self.sequence.simulation {
            for &distance in &sim.focus_distances {
                let intensity = focus_intensity(&field, self.synthesizer.propagator(), distance)?;
                let sim_name = simulation_name(&sim.prefix, &name, distance);
                debug!(distance, name = %sim_name, "writing reconstruction");
                self.writer.write_gray(&sim_name, &intensity)?;
            }
        }

        self.synthesizer.recycle(field);
        Ok(stats)
    }
}

/// `<prefix>_<hologram name>_FOCUS_<distance in mm, rounded>`.
pub fn simulation_name(prefix: &str, hologram: &str, distance: f64) -> String {
    format!("{prefix}_{hologram}_FOCUS_{}", (distance * 1000.0).round() as i64)
}
