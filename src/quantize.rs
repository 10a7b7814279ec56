// quantize.rs — Depth quantization.
//
// Turns the continuous [near, far] range into N discrete depth levels and
// assigns every panel pixel to one of them:
//
//   raw depth (u8) ──bucket()──▶ index in [0, N) ──levels[index]──▶ distance
//
// LEVEL TABLE
// ───────────
// N > 1 : levels[i] = near + (far − near) · i/(N − 1), exactly N entries.
//         Generating by index (not by repeated `+= step` against `<= far`)
//         means the count cannot drift to N + 1. The last entry is `far`
//         itself, not `near + (far − near)`, which can be off by an ulp.
// N ≤ 1 : a single level `far − near`. The auxiliary `step` is
//         (far + near)/2 in this case; it is carried alongside the table and
//         is not itself a physical depth.
//
// BUCKET ASSIGNMENT
// ─────────────────
// Linear (default):  floor(raw · N / 255), clamped to N − 1. Integer math,
//                    so raw 0 → 0 and raw 255 → N − 1 exactly.
// Remapped:          see `DepthRemap`.
//
// The bucket of a pixel depends only on its own raw value, so the parallel
// map (rayon over rows) is the same pure function as the sequential loop and
// produces an identical index map.

use rayon::prelude::*;
use serde::Deserialize;

use crate::config::{ExecutionMode, OpticalConfig};
use crate::error::{HoloError, Result};
use crate::image::Image;

/// Per-pixel depth bucket ids, each in `[0, N)`.
pub type DepthIndexMap = Image<u32>;

/// Nonlinear bucket assignment used when `change_depth_quantization` is on.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DepthRemap {
    /// Convert the raw sample to a physical depth
    /// `near + raw/255 · (far − near)` and place it in the level whose
    /// half-step window `[level − step/2, level + step/2)` contains it
    /// (the last window is closed).
    NearestLevel,
    /// `floor((raw/255)^exponent · N)`, clamped. Exponents below 1 spend
    /// more buckets on the near range.
    Gamma { exponent: f64 },
}

impl Default for DepthRemap {
    fn default() -> Self {
        DepthRemap::NearestLevel
    }
}

/// Ordered physical distances of the depth layers.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthLevelTable {
    levels: Vec<f64>,
    /// Level spacing for N > 1, `(far + near)/2` for N ≤ 1.
    step: f64,
}

impl DepthLevelTable {
    /// Build the table for `[near, far]` with `num_levels` levels.
    pub fn new(near: f64, far: f64, num_levels: usize) -> Self {
        if num_levels > 1 {
            let span = far - near;
            let last = (num_levels - 1) as f64;
            let levels = (0..num_levels)
                .map(|i| if i + 1 == num_levels { far } else { near + span * (i as f64 / last) })
                .collect();
            DepthLevelTable { levels, step: span / last }
        } else {
            DepthLevelTable {
                levels: vec![far - near],
                step: (far + near) / 2.0,
            }
        }
    }

    pub fn from_config(config: &OpticalConfig) -> Self {
        Self::new(config.near_depth, config.far_depth, config.num_depth_levels)
    }

    #[inline]
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    #[inline]
    pub fn step(&self) -> f64 {
        self.step
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Output of the quantization stage for one frame.
#[derive(Debug, Clone)]
pub struct Quantized {
    pub table: DepthLevelTable,
    pub index: DepthIndexMap,
}

/// Derives depth levels and the per-pixel bucket map from a depth frame.
#[derive(Debug, Clone)]
pub struct DepthQuantizer {
    near: f64,
    far: f64,
    num_levels: usize,
    remap: Option<DepthRemap>,
    resolution: (usize, usize),
}

impl DepthQuantizer {
    pub fn new(config: &OpticalConfig) -> Self {
        DepthQuantizer {
            near: config.near_depth,
            far: config.far_depth,
            num_levels: config.num_depth_levels,
            remap: config
                .change_depth_quantization
                .then_some(config.depth_remap),
            resolution: (config.width(), config.height()),
        }
    }

    /// Number of buckets actually produced (N ≤ 1 collapses to one).
    pub fn bucket_count(&self) -> usize {
        self.num_levels.max(1)
    }

    /// Quantize one depth frame already resampled to the panel resolution.
    pub fn quantize(&self, depth: &Image<u8>, mode: ExecutionMode) -> Result<Quantized> {
        if depth.dimensions() != self.resolution {
            return Err(HoloError::config(format!(
                "depth map is {}×{}, panel is {}×{}",
                depth.width(),
                depth.height(),
                self.resolution.0,
                self.resolution.1
            )));
        }

        let table = DepthLevelTable::new(self.near, self.far, self.num_levels);
        let mut index: DepthIndexMap = Image::try_new(depth.width(), depth.height(), "depth index map")?;

        let assign = |raw: u8| self.bucket(raw, &table);
        match mode {
            ExecutionMode::Sequential => {
                for (dst, &raw) in index.as_mut_slice().iter_mut().zip(depth.as_slice()) {
                    *dst = assign(raw);
                }
            }
            ExecutionMode::Parallel | ExecutionMode::Gpu => {
                index
                    .as_mut_slice()
                    .par_iter_mut()
                    .zip(depth.as_slice().par_iter())
                    .for_each(|(dst, &raw)| *dst = assign(raw));
            }
        }

        Ok(Quantized { table, index })
    }

    /// Bucket of a single raw depth sample.
    pub fn bucket(&self, raw: u8, table: &DepthLevelTable) -> u32 {
        let n = self.bucket_count();
        if n == 1 {
            return 0;
        }
        let idx = match self.remap {
            None => raw as usize * n / 255,
            Some(DepthRemap::Gamma { exponent }) => {
                ((raw as f64 / 255.0).powf(exponent) * n as f64).floor() as usize
            }
            Some(DepthRemap::NearestLevel) => {
                let depth = self.near + raw as f64 / 255.0 * (self.far - self.near);
                nearest_level(depth, table)
            }
        };
        idx.min(n - 1) as u32
    }
}

/// Index of the level whose half-step window contains `depth`.
fn nearest_level(depth: f64, table: &DepthLevelTable) -> usize {
    let half = table.step() / 2.0;
    let last = table.len() - 1;
    let hit = table.levels().iter().position(|&level| {
        let (lo, hi) = (level - half, level + half);
        if depth < lo {
            return false;
        }
        depth < hi || (depth == hi && level == table.levels()[last])
    });
    hit.unwrap_or_else(|| {
        // Only reachable through rounding at the window seams.
        table
            .levels()
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - depth).abs().total_cmp(&(b.1 - depth).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    })
}
