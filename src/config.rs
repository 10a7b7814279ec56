// config.rs — Run configuration.
//
// One immutable `RunConfig` per run, loaded from a TOML document:
//
//   [optical]   — the physical setup: wavelength, panel, depth range, lens,
//                 tilt, phase/quantization flags, encoding
//   [sequence]  — which frames to read and where results go
//   [run]       — execution strategy and RNG seed
//
// Every field has a default, so a file only needs to name what differs.
// `validate()` turns nonsense (zero pitch, far < near, an unwritable
// sub-panel count, ...) into a Configuration error before any frame runs.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::encode::EncodingScheme;
use crate::error::{HoloError, Result};
use crate::quantize::DepthRemap;

/// Which accumulation strategy the synthesizer uses for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Single stream, fixed nested visiting order.
    Sequential,
    /// Rayon worker pool; each worker owns whole output rows.
    #[default]
    Parallel,
    /// wgpu compute shader, one invocation per output cell.
    Gpu,
}

impl ExecutionMode {
    pub fn is_parallel(self) -> bool {
        !matches!(self, ExecutionMode::Sequential)
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = HoloError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "cpu" => Ok(ExecutionMode::Sequential),
            "parallel" => Ok(ExecutionMode::Parallel),
            "gpu" => Ok(ExecutionMode::Gpu),
            other => Err(HoloError::config(format!("unknown execution mode '{other}'"))),
        }
    }
}

/// Optical and numerical parameters of the hologram. Fixed for a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpticalConfig {
    /// Wavelength of the reference light, metres.
    pub wavelength: f64,
    /// Panel pixel pitch (x, y), metres.
    pub pixel_pitch: [f64; 2],
    /// Panel resolution (width, height), pixels.
    pub resolution: [usize; 2],
    /// Distance of the nearest depth level from the hologram plane.
    pub near_depth: f64,
    /// Distance of the farthest depth level.
    pub far_depth: f64,
    /// Number of quantized depth levels. Values ≤ 1 collapse to one level.
    pub num_depth_levels: usize,
    /// Field-lens focal distance used by the viewing-window transform.
    pub field_lens: f64,
    /// Apply the viewing-window (field-lens) transform to the depth levels.
    pub transform_viewing_window: bool,
    /// Reference-wave tilt as (sin θx, sin θy).
    pub tilt: [f64; 2],
    /// Multiply every source point by an independent random phasor.
    pub random_phase: bool,
    /// Use `depth_remap` instead of linear bucket scaling.
    pub change_depth_quantization: bool,
    /// Remap function applied when `change_depth_quantization` is set.
    pub depth_remap: DepthRemap,
    /// Complex → real encoding.
    pub encoding: EncodingScheme,
    /// Side-by-side sub-panels of the split encoding, and real samples per
    /// output pixel (1 = L8, 2 = La8, 3 = Rgb8, 4 = Rgba8). Must divide the
    /// panel width.
    pub sub_panels: usize,
}

impl Default for OpticalConfig {
    /// A 1920×1080, 8 µm panel lit at 532 nm with 256 levels between
    /// 0.4 and 0.6 m behind a 0.2 m field lens.
    fn default() -> Self {
        OpticalConfig {
            wavelength: 532e-9,
            pixel_pitch: [8e-6, 8e-6],
            resolution: [1920, 1080],
            near_depth: 0.4,
            far_depth: 0.6,
            num_depth_levels: 256,
            field_lens: 0.2,
            transform_viewing_window: true,
            tilt: [0.0, 0.0],
            random_phase: true,
            change_depth_quantization: false,
            depth_remap: DepthRemap::default(),
            encoding: EncodingScheme::default(),
            sub_panels: 3,
        }
    }
}

impl OpticalConfig {
    #[inline]
    pub fn width(&self) -> usize {
        self.resolution[0]
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.resolution[1]
    }

    /// Wavenumber k = 2π / λ.
    pub fn wavenumber(&self) -> f64 {
        std::f64::consts::TAU / self.wavelength
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if !positive(self.wavelength) {
            return Err(HoloError::config(format!("wavelength must be > 0 (got {})", self.wavelength)));
        }
        if !positive(self.pixel_pitch[0]) || !positive(self.pixel_pitch[1]) {
            return Err(HoloError::config(format!(
                "pixel pitch must be > 0 (got {:?})",
                self.pixel_pitch
            )));
        }
        if self.width() == 0 || self.height() == 0 {
            return Err(HoloError::config(format!(
                "panel resolution must be non-zero (got {:?})",
                self.resolution
            )));
        }
        if !self.near_depth.is_finite() || !self.far_depth.is_finite() {
            return Err(HoloError::config("depth bounds must be finite"));
        }
        if self.far_depth < self.near_depth {
            return Err(HoloError::config(format!(
                "far depth {} is nearer than near depth {}",
                self.far_depth, self.near_depth
            )));
        }
        if !self.field_lens.is_finite() {
            return Err(HoloError::config("field-lens distance must be finite"));
        }
        if self.tilt.iter().any(|s| !s.is_finite() || s.abs() > 1.0) {
            return Err(HoloError::config(format!(
                "tilt entries are sines and must lie in [-1, 1] (got {:?})",
                self.tilt
            )));
        }
        if let DepthRemap::Gamma { exponent } = self.depth_remap {
            if !positive(exponent) {
                return Err(HoloError::config(format!(
                    "gamma remap exponent must be > 0 (got {exponent})"
                )));
            }
        }
        if !(1..=4).contains(&self.sub_panels) {
            return Err(HoloError::config(format!(
                "sub-panel count must be 1..=4 (got {})",
                self.sub_panels
            )));
        }
        if self.width() % self.sub_panels != 0 {
            return Err(HoloError::config(format!(
                "a {}-wide panel cannot be written as {} sub-panels",
                self.width(),
                self.sub_panels
            )));
        }
        Ok(())
    }
}

/// Reconstruction output written next to each hologram.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Focus distances (metres) at which to reconstruct the hologram.
    pub focus_distances: Vec<f64>,
    /// File-name prefix for reconstruction images.
    pub prefix: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            focus_distances: Vec::new(),
            prefix: "simulation".to_string(),
        }
    }
}

/// Frame enumeration and file naming.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SequenceConfig {
    /// A single frame read straight from `source_folder`.
    pub static_image: bool,
    /// Number of frames in sequence mode.
    pub frame_count: usize,
    /// Number of the first frame folder.
    pub start_frame: usize,
    /// Zero-padding width of frame folder names (0 = no padding).
    pub frame_digits: usize,
    pub source_folder: PathBuf,
    /// Amplitude images are the first `<image_prefix>*.bmp` in a frame folder.
    pub image_prefix: String,
    /// Depth maps are the first `<depth_prefix>*.bmp` in a frame folder.
    pub depth_prefix: String,
    pub result_folder: PathBuf,
    pub result_prefix: String,
    pub simulation: Option<SimulationConfig>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        SequenceConfig {
            static_image: true,
            frame_count: 1,
            start_frame: 0,
            frame_digits: 0,
            source_folder: PathBuf::from("source"),
            image_prefix: "RGB".to_string(),
            depth_prefix: "Depth".to_string(),
            result_folder: PathBuf::from("result"),
            result_prefix: "Hologram_".to_string(),
            simulation: None,
        }
    }
}

impl SequenceConfig {
    /// Frames to process: 1 in static mode, `frame_count` otherwise.
    pub fn frames(&self) -> usize {
        if self.static_image {
            1
        } else {
            self.frame_count
        }
    }
}

/// Execution settings.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    /// Seed for the random-phase generator. `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub optical: OpticalConfig,
    pub sequence: SequenceConfig,
    pub run: ExecutionConfig,
}

impl RunConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RunConfig =
            toml::from_str(text).map_err(|e| HoloError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| HoloError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.optical.validate()?;
        if let Some(sim) = &self.sequence.simulation {
            if sim.focus_distances.iter().any(|d| !d.is_finite()) {
                return Err(HoloError::config("simulation focus distances must be finite"));
            }
        }
        Ok(())
    }
}
