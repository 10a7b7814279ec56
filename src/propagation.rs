// propagation.rs — Diffraction kernel and source phase.
//
// Every output cell (x, y) and every source point (u, v) sit on the same
// pixel-pitch grid. For a source layer at signed distance z:
//
//   dx = (x − u)·px     dy = (y − v)·py     ρ² = dx² + dy²
//   r  = √(ρ² + z²)
//
//   path  = sgn(z)·k·r
//         = sgn(z)·k·|z|  +  sgn(z)·k·ρ²/(r + |z|)
//           └── base ──┘     └──── excess ─────┘
//
//   tilt  = k·(X·sinθx + Y·sinθy),  X, Y = physical cell position
//           measured from the panel centre (Y grows upward)
//
//   contribution = amplitude · exp(i·(path + tilt))
//
// Splitting the path into base + excess keeps precision: k·|z| is ~10⁶ rad
// for visible light at decimetre range, while the excess across a panel is
// small. It also makes z = 0 well defined (ρ = 0 gives zero excess rather
// than 0/0). sgn(0) is taken as +1, so a negative z (virtual image behind
// the lens) flips the sense of the phase.
//
// No 1/r falloff is applied; the layer amplitudes carry all weighting.

use std::f64::consts::TAU;

use num_complex::Complex64;
use rand::Rng;

use crate::config::OpticalConfig;
use crate::error::Result;
use crate::image::Image;

/// Per-run kernel constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Propagator {
    wavenumber: f64,
    pitch_x: f64,
    pitch_y: f64,
    sin_tilt_x: f64,
    sin_tilt_y: f64,
    width: usize,
    height: usize,
}

impl Propagator {
    pub fn new(config: &OpticalConfig) -> Self {
        Propagator {
            wavenumber: config.wavenumber(),
            pitch_x: config.pixel_pitch[0],
            pitch_y: config.pixel_pitch[1],
            sin_tilt_x: config.tilt[0],
            sin_tilt_y: config.tilt[1],
            width: config.width(),
            height: config.height(),
        }
    }

    #[inline]
    pub fn wavenumber(&self) -> f64 {
        self.wavenumber
    }

    #[inline]
    pub fn pitch(&self) -> (f64, f64) {
        (self.pitch_x, self.pitch_y)
    }

    /// Panel resolution `(width, height)` the kernel was built for.
    #[inline]
    pub fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Same kernel with the reference-wave tilt removed.
    pub fn without_tilt(&self) -> Self {
        Propagator { sin_tilt_x: 0.0, sin_tilt_y: 0.0, ..*self }
    }

    pub fn has_tilt(&self) -> bool {
        self.sin_tilt_x != 0.0 || self.sin_tilt_y != 0.0
    }

    /// `sgn(z)·k·|z|`: the on-axis path phase of a layer.
    #[inline]
    pub fn base_phase(&self, z: f64) -> f64 {
        sign(z) * self.wavenumber * z.abs()
    }

    /// `sgn(z)·k·ρ²/(r + |z|)`: the off-axis excess for a squared lateral
    /// distance `rho2` (m²).
    #[inline]
    pub fn excess_phase(&self, rho2: f64, z: f64) -> f64 {
        if rho2 == 0.0 {
            return 0.0;
        }
        let az = z.abs();
        let r = (rho2 + z * z).sqrt();
        sign(z) * self.wavenumber * rho2 / (r + az)
    }

    /// Full path phase between cell (x, y) and source (u, v) at distance z.
    #[inline]
    pub fn path_phase(&self, x: usize, y: usize, u: usize, v: usize, z: f64) -> f64 {
        let dx = (x as f64 - u as f64) * self.pitch_x;
        let dy = (y as f64 - v as f64) * self.pitch_y;
        self.base_phase(z) + self.excess_phase(dx * dx + dy * dy, z)
    }

    /// Tilt phase of the reference wave at cell (x, y).
    #[inline]
    pub fn tilt_phase(&self, x: usize, y: usize) -> f64 {
        let cx = (self.width as f64 - 1.0) / 2.0;
        let cy = (self.height as f64 - 1.0) / 2.0;
        let px = (x as f64 - cx) * self.pitch_x;
        let py = (cy - y as f64) * self.pitch_y;
        self.wavenumber * (px * self.sin_tilt_x + py * self.sin_tilt_y)
    }

    /// Complex contribution of one source at one output cell.
    #[inline]
    pub fn contribution(
        &self,
        amplitude: Complex64,
        x: usize,
        y: usize,
        u: usize,
        v: usize,
        z: f64,
    ) -> Complex64 {
        let phase = self.path_phase(x, y, u, v, z) + self.tilt_phase(x, y);
        amplitude * Complex64::from_polar(1.0, phase)
    }

    /// `exp(i·tilt)` for every cell, row-major. Used by strategies that
    /// evaluate the path term elsewhere and apply the tilt afterwards.
    pub fn tilt_phasors(&self) -> Result<Image<Complex64>> {
        let mut out = Image::try_new(self.width, self.height, "tilt phasors")?;
        for y in 0..self.height {
            for (x, t) in out.row_mut(y).iter_mut().enumerate() {
                *t = Complex64::from_polar(1.0, self.tilt_phase(x, y));
            }
        }
        Ok(out)
    }
}

#[inline]
fn sign(z: f64) -> f64 {
    if z < 0.0 {
        -1.0
    } else {
        1.0
    }
}

// ---------------------------------------------------------------------------
// Source phase
// ---------------------------------------------------------------------------

/// Per-pixel source phasors for one frame.
///
/// With random phase on, θ ~ U[0, 2π) is drawn for every panel pixel in
/// row-major order, so the draw sequence (and therefore the result) does not
/// depend on which pixels end up in which layer or on the accumulation
/// strategy. With it off every phasor is 1.
pub fn source_phasors<R: Rng + ?Sized>(
    width: usize,
    height: usize,
    random_phase: bool,
    rng: &mut R,
) -> Result<Image<Complex64>> {
    let mut out = Image::try_new(width, height, "source phasors")?;
    if !random_phase {
        out.fill(Complex64::new(1.0, 0.0));
        return Ok(out);
    }
    for p in out.as_mut_slice() {
        let theta: f64 = rng.gen_range(0.0..TAU);
        *p = Complex64::from_polar(1.0, theta);
    }
    Ok(out)
}
