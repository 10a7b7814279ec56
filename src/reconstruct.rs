// reconstruct.rs — Numerical reconstruction of a hologram.
//
// Back-propagates the field to a focus distance d with the conjugate of the
// synthesis kernel and returns the intensity:
//
//   U(x, y) = Σ_(u,v) H(u, v) · e^(−i·tilt(u, v)) · e^(−i·path(x, y, u, v, d))
//   I(x, y) = |U(x, y)|²
//
// The reference tilt is removed first so the image forms on-axis. Points of
// the scene whose layer distance equals d come back in focus; the rest blur.
// This is a direct O((W·H)²) sum, meant for previewing small panels and for
// tests, not for production-size reconstructions.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::encode::RealField;
use crate::error::{HoloError, Result};
use crate::image::Image;
use crate::propagation::Propagator;
use crate::synth::HologramField;

/// Intensity of `field` refocused at `distance`.
pub fn focus_intensity(
    field: &HologramField,
    propagator: &Propagator,
    distance: f64,
) -> Result<RealField> {
    let (w, h) = propagator.resolution();
    if field.dimensions() != (w, h) {
        return Err(HoloError::config(format!(
            "hologram field is {}×{}, panel is {w}×{h}",
            field.width(),
            field.height()
        )));
    }
    if !distance.is_finite() {
        return Err(HoloError::config(format!("focus distance {distance} is not finite")));
    }

    let untilted: Vec<(f64, f64, Complex64)> = field
        .pixels()
        .filter(|(_, _, c)| c.norm_sqr() > 0.0)
        .map(|(u, v, c)| {
            (u as f64, v as f64, c * Complex64::from_polar(1.0, -propagator.tilt_phase(u, v)))
        })
        .collect();

    let (px, py) = propagator.pitch();
    let mut out: RealField = Image::try_new(w, h, "reconstruction")?;
    if w == 0 {
        return Ok(out);
    }
    // The on-axis term e^(−i·k·d) is common to every cell and drops out of
    // the intensity.
    out.as_mut_slice().par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, cell) in row.iter_mut().enumerate() {
            let mut sum = Complex64::new(0.0, 0.0);
            for &(u, v, c) in &untilted {
                let dx = (x as f64 - u) * px;
                let dy = (y as f64 - v) * py;
                let excess = propagator.excess_phase(dx * dx + dy * dy, distance);
                sum += c * Complex64::from_polar(1.0, -excess);
            }
            *cell = sum.norm_sqr();
        }
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpticalConfig;
    use crate::synth::{Accumulator, DepthLayer, PointSource, SequentialAccumulator};

    fn point_hologram(tilt: [f64; 2]) -> (Propagator, HologramField) {
        let cfg = OpticalConfig { resolution: [9, 9], tilt, ..OpticalConfig::default() };
        let p = Propagator::new(&cfg);
        let layer = DepthLayer {
            bucket: 0,
            distance: 1e-3,
            sources: vec![PointSource { x: 3, y: 5, amplitude: Complex64::new(1.0, 0.0) }],
        };
        let mut field: HologramField = Image::new(9, 9);
        SequentialAccumulator.accumulate(&p, &[layer], &mut field).unwrap();
        (p, field)
    }

    fn argmax(img: &RealField) -> (usize, usize) {
        img.pixels()
            .max_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(x, y, _)| (x, y))
            .unwrap()
    }

    #[test]
    fn point_refocuses_at_its_depth() {
        let (p, field) = point_hologram([0.0, 0.0]);
        let img = focus_intensity(&field, &p, 1e-3).unwrap();
        assert_eq!(argmax(&img), (3, 5));
        // All 81 cells add in phase at the source position.
        assert!((img.get(3, 5) - 81.0 * 81.0).abs() < 1e-6);
    }

    #[test]
    fn tilt_is_removed_before_refocus() {
        let (p, field) = point_hologram([0.05, 0.02]);
        let img = focus_intensity(&field, &p, 1e-3).unwrap();
        assert_eq!(argmax(&img), (3, 5));
    }

    #[test]
    fn rejects_mismatched_field() {
        let (p, _) = point_hologram([0.0, 0.0]);
        let small: HologramField = Image::new(3, 3);
        assert!(focus_intensity(&small, &p, 1e-3).is_err());
    }
}
