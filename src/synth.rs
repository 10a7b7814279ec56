// synth.rs — Wavefront synthesis: depth layers → complex hologram field.
//
// PIPELINE PER FRAME
// ──────────────────
//   amplitude (W×H, [0,1]) ─┐
//   depth index map  ───────┼─ collect_layers ─▶ Vec<DepthLayer> ─▶ Accumulator ─▶ field
//   level distances  ───────┤
//   source phasors   ───────┘
//
// A layer holds the non-zero-amplitude pixels of one depth bucket. Each of
// them radiates to every panel cell through the `Propagator` kernel; the
// field is the sum of all contributions. Empty buckets are dropped.
//
// STRATEGIES
// ──────────
// The summation is pluggable (`Accumulator`). All strategies compute the same
// per-(cell, source) term; they differ only in how the cells are scheduled:
//
//   SequentialAccumulator — one stream, layer → source → row → column.
//   ParallelAccumulator   — rayon; each task owns one output row and
//                           gathers every source into it. No two tasks
//                           touch the same cell, so no atomics or locks.
//   GpuAccumulator        — compute shader, one invocation per cell
//                           (see gpu/wavefront.rs).
//
// Per cell, the CPU strategies add contributions in the same layer → source
// order, so they agree to the last bit, not only within tolerance.
//
// BUFFER REUSE
// ────────────
// The synthesizer allocates the field once. `synthesize` moves it out to the
// caller (encoder, reconstruction) and `recycle` hands it back so the next
// frame reuses the allocation.

use num_complex::Complex64;
use rand::Rng;
use rayon::prelude::*;

use crate::config::{ExecutionMode, OpticalConfig};
use crate::error::{HoloError, Result};
use crate::image::Image;
use crate::propagation::{source_phasors, Propagator};
use crate::quantize::DepthIndexMap;

/// Complex wavefront on the hologram plane, W×H.
pub type HologramField = Image<Complex64>;

/// A scene point radiating from pixel (x, y) of its layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSource {
    pub x: usize,
    pub y: usize,
    /// Amplitude times source phasor.
    pub amplitude: Complex64,
}

/// All sources of one depth bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthLayer {
    pub bucket: usize,
    /// Signed propagation distance of this layer.
    pub distance: f64,
    pub sources: Vec<PointSource>,
}

/// Strategy that adds the contributions of a set of layers into a field.
pub trait Accumulator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Add every layer's contribution to `field`. `field` must match the
    /// propagator's resolution; existing contents are kept.
    fn accumulate(
        &self,
        propagator: &Propagator,
        layers: &[DepthLayer],
        field: &mut HologramField,
    ) -> Result<()>;
}

/// Check that `field` and every source lie on the propagator's panel.
pub(crate) fn check_panel(
    propagator: &Propagator,
    layers: &[DepthLayer],
    field: &HologramField,
) -> Result<()> {
    let (w, h) = propagator.resolution();
    if field.dimensions() != (w, h) {
        return Err(HoloError::config(format!(
            "hologram field is {}×{}, panel is {w}×{h}",
            field.width(),
            field.height()
        )));
    }
    for layer in layers {
        if !layer.distance.is_finite() {
            return Err(HoloError::config(format!(
                "layer {} has non-finite distance {}",
                layer.bucket, layer.distance
            )));
        }
        if let Some(s) = layer.sources.iter().find(|s| s.x >= w || s.y >= h) {
            return Err(HoloError::config(format!(
                "source ({}, {}) of layer {} lies outside the {w}×{h} panel",
                s.x, s.y, layer.bucket
            )));
        }
    }
    Ok(())
}

/// A source with its on-axis phase folded into the amplitude.
#[derive(Debug, Clone, Copy)]
struct Prepared {
    u: f64,
    v: f64,
    z: f64,
    weight: Complex64,
}

fn prepare<'a>(propagator: &Propagator, layer: &'a DepthLayer) -> impl Iterator<Item = Prepared> + 'a {
    let base = propagator.base_phase(layer.distance).rem_euclid(std::f64::consts::TAU);
    let rotate = Complex64::from_polar(1.0, base);
    layer.sources.iter().map(move |s| Prepared {
        u: s.x as f64,
        v: s.y as f64,
        z: layer.distance,
        weight: s.amplitude * rotate,
    })
}

/// Contribution of `src` to cell (x, y), tilt excluded.
#[inline]
fn term(propagator: &Propagator, src: &Prepared, x: f64, y: f64) -> Complex64 {
    let (px, py) = propagator.pitch();
    let dx = (x - src.u) * px;
    let dy = (y - src.v) * py;
    let excess = propagator.excess_phase(dx * dx + dy * dy, src.z);
    src.weight * Complex64::from_polar(1.0, excess)
}

// ---------------------------------------------------------------------------
// CPU strategies
// ---------------------------------------------------------------------------

/// Single-stream reference strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialAccumulator;

impl Accumulator for SequentialAccumulator {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn accumulate(
        &self,
        propagator: &Propagator,
        layers: &[DepthLayer],
        field: &mut HologramField,
    ) -> Result<()> {
        check_panel(propagator, layers, field)?;
        let tilt = propagator.has_tilt().then(|| propagator.tilt_phasors()).transpose()?;
        let (w, h) = field.dimensions();

        for layer in layers {
            for src in prepare(propagator, layer) {
                for y in 0..h {
                    let row = field.row_mut(y);
                    for (x, cell) in row.iter_mut().enumerate() {
                        let mut c = term(propagator, &src, x as f64, y as f64);
                        if let Some(t) = &tilt {
                            c *= t.as_slice()[y * w + x];
                        }
                        *cell += c;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Row-parallel strategy on the rayon global pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelAccumulator;

impl Accumulator for ParallelAccumulator {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn accumulate(
        &self,
        propagator: &Propagator,
        layers: &[DepthLayer],
        field: &mut HologramField,
    ) -> Result<()> {
        check_panel(propagator, layers, field)?;
        let w = field.width();
        if w == 0 {
            return Ok(());
        }
        let tilt = propagator.has_tilt().then(|| propagator.tilt_phasors()).transpose()?;
        let sources: Vec<Prepared> = layers.iter().flat_map(|l| prepare(propagator, l)).collect();

        field
            .as_mut_slice()
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                for src in &sources {
                    for (x, cell) in row.iter_mut().enumerate() {
                        let mut c = term(propagator, src, x as f64, y as f64);
                        if let Some(t) = &tilt {
                            c *= t.as_slice()[y * w + x];
                        }
                        *cell += c;
                    }
                }
            });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Layer collection
// ---------------------------------------------------------------------------

/// Group the non-zero pixels of `amplitude` into layers by depth bucket.
///
/// `distances[b]` is the propagation distance of bucket `b`. Layers come back
/// in ascending bucket order; empty buckets are omitted.
pub fn collect_layers(
    amplitude: &Image<f64>,
    index: &DepthIndexMap,
    distances: &[f64],
    phasors: &Image<Complex64>,
) -> Result<Vec<DepthLayer>> {
    let dims = amplitude.dimensions();
    if index.dimensions() != dims || phasors.dimensions() != dims {
        return Err(HoloError::config(format!(
            "amplitude {}×{}, depth index {}×{} and phase screen {}×{} must match",
            dims.0,
            dims.1,
            index.width(),
            index.height(),
            phasors.width(),
            phasors.height()
        )));
    }

    let mut buckets: Vec<Vec<PointSource>> = vec![Vec::new(); distances.len()];
    for (x, y, a) in amplitude.pixels() {
        if a == 0.0 {
            continue;
        }
        let b = index.get(x, y) as usize;
        let slot = buckets.get_mut(b).ok_or_else(|| {
            HoloError::config(format!(
                "pixel ({x}, {y}) has depth bucket {b}, only {} levels exist",
                distances.len()
            ))
        })?;
        slot.push(PointSource { x, y, amplitude: phasors.get(x, y) * a });
    }

    Ok(buckets
        .into_iter()
        .zip(distances)
        .enumerate()
        .filter(|(_, (sources, _))| !sources.is_empty())
        .map(|(bucket, (sources, &distance))| DepthLayer { bucket, distance, sources })
        .collect())
}

// ---------------------------------------------------------------------------
// WavefrontSynthesizer
// ---------------------------------------------------------------------------

/// Builds the hologram field of each frame with a fixed strategy.
pub struct WavefrontSynthesizer {
    propagator: Propagator,
    accumulator: Box<dyn Accumulator>,
    random_phase: bool,
    buffer: Option<HologramField>,
}

impl WavefrontSynthesizer {
    pub fn new(config: &OpticalConfig, accumulator: Box<dyn Accumulator>) -> Self {
        WavefrontSynthesizer {
            propagator: Propagator::new(config),
            accumulator,
            random_phase: config.random_phase,
            buffer: None,
        }
    }

    /// Synthesizer with the strategy for `mode`. GPU mode initialises a
    /// device and fails if none is usable.
    pub fn for_mode(config: &OpticalConfig, mode: ExecutionMode) -> Result<Self> {
        let accumulator: Box<dyn Accumulator> = match mode {
            ExecutionMode::Sequential => Box::new(SequentialAccumulator),
            ExecutionMode::Parallel => Box::new(ParallelAccumulator),
            ExecutionMode::Gpu => Box::new(crate::gpu::wavefront::GpuAccumulator::new()?),
        };
        Ok(Self::new(config, accumulator))
    }

    pub fn propagator(&self) -> &Propagator {
        &self.propagator
    }

    pub fn strategy(&self) -> &'static str {
        self.accumulator.name()
    }

    /// Synthesize one frame. Random phases (if enabled) are drawn from `rng`
    /// for every panel pixel in row-major order.
    pub fn synthesize<R: Rng + ?Sized>(
        &mut self,
        amplitude: &Image<f64>,
        index: &DepthIndexMap,
        distances: &[f64],
        rng: &mut R,
    ) -> Result<HologramField> {
        let (w, h) = self.propagator.resolution();
        if amplitude.dimensions() != (w, h) {
            return Err(HoloError::config(format!(
                "amplitude image is {}×{}, panel is {w}×{h}",
                amplitude.width(),
                amplitude.height()
            )));
        }
        let phasors = source_phasors(w, h, self.random_phase, rng)?;
        let layers = collect_layers(amplitude, index, distances, &phasors)?;
        self.accumulate_layers(&layers)
    }

    /// Accumulate prepared layers into a zeroed field and return it.
    pub fn accumulate_layers(&mut self, layers: &[DepthLayer]) -> Result<HologramField> {
        let mut field = self.take_buffer()?;
        self.accumulator.accumulate(&self.propagator, layers, &mut field)?;
        Ok(field)
    }

    /// Return a field from a previous frame for reuse.
    pub fn recycle(&mut self, field: HologramField) {
        if field.dimensions() == self.propagator.resolution() {
            self.buffer = Some(field);
        }
    }

    fn take_buffer(&mut self) -> Result<HologramField> {
        match self.buffer.take() {
            Some(mut field) => {
                field.fill(Complex64::new(0.0, 0.0));
                Ok(field)
            }
            None => {
                let (w, h) = self.propagator.resolution();
                Image::try_new(w, h, "hologram field")
            }
        }
    }
}
