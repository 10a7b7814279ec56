// encode.rs — Complex field → real pattern.
//
// Every scheme produces a RealField the size of the panel, W×H.
//
// Single-projection schemes map each cell to one real number:
//
//   Amplitude  |c|        Phase  arg(c) ∈ (−π, π]
//   Real       Re(c)      Imaginary  Im(c)
//
// `Split` lays n sub-panels side by side, n = sub-panel count, each
// m = W/n columns wide:
//
//   ┌──────────┬──────────┬──────────┐
//   │  Real    │   Imag   │   |c|    │   (n = 3)
//   └──────────┴──────────┴──────────┘
//    0        m          2m         3m = W
//
// Sub-panel s holds projection[s mod 4] (Real, Imaginary, Amplitude, Phase)
// of the field binned horizontally by n: column j of a sub-panel shows the
// mean of cells n·j .. n·j + n − 1 of the same row. The writer then turns
// every n consecutive samples into the n channels of one pixel, so the
// written raster is (W/n)×H.

use num_complex::Complex64;
use serde::Deserialize;

use crate::error::{HoloError, Result};
use crate::image::Image;
use crate::synth::HologramField;

/// Real-valued pattern produced by the encoder.
pub type RealField = Image<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingScheme {
    #[default]
    Split,
    Amplitude,
    Phase,
    Real,
    Imaginary,
}

impl EncodingScheme {
    /// Numeric scheme id: 0 Split, 1 Amplitude, 2 Phase, 3 Real, 4 Imaginary.
    pub fn id(self) -> u8 {
        match self {
            EncodingScheme::Split => 0,
            EncodingScheme::Amplitude => 1,
            EncodingScheme::Phase => 2,
            EncodingScheme::Real => 3,
            EncodingScheme::Imaginary => 4,
        }
    }

    /// The single projection of a one-projection scheme; `None` for `Split`.
    pub fn projection(self) -> Option<Projection> {
        match self {
            EncodingScheme::Split => None,
            EncodingScheme::Amplitude => Some(Projection::Amplitude),
            EncodingScheme::Phase => Some(Projection::Phase),
            EncodingScheme::Real => Some(Projection::Real),
            EncodingScheme::Imaginary => Some(Projection::Imaginary),
        }
    }
}

impl TryFrom<u8> for EncodingScheme {
    type Error = HoloError;

    fn try_from(id: u8) -> Result<Self> {
        Ok(match id {
            0 => EncodingScheme::Split,
            1 => EncodingScheme::Amplitude,
            2 => EncodingScheme::Phase,
            3 => EncodingScheme::Real,
            4 => EncodingScheme::Imaginary,
            other => return Err(HoloError::config(format!("unknown encoding scheme id {other}"))),
        })
    }
}

/// One real view of a complex sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Real,
    Imaginary,
    Amplitude,
    Phase,
}

impl Projection {
    #[inline]
    pub fn apply(self, c: Complex64) -> f64 {
        match self {
            Projection::Real => c.re,
            Projection::Imaginary => c.im,
            Projection::Amplitude => c.norm(),
            Projection::Phase => c.arg(),
        }
    }
}

/// Sub-panel order of the `Split` scheme; panel s uses entry `s % 4`.
pub const SPLIT_ORDER: [Projection; 4] =
    [Projection::Real, Projection::Imaginary, Projection::Amplitude, Projection::Phase];

/// Stateless complex → real encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Encoder {
    scheme: EncodingScheme,
    sub_panels: usize,
}

impl Encoder {
    pub fn new(scheme: EncodingScheme, sub_panels: usize) -> Result<Self> {
        if sub_panels == 0 {
            return Err(HoloError::config("sub-panel count must be at least 1"));
        }
        Ok(Encoder { scheme, sub_panels })
    }

    pub fn scheme(&self) -> EncodingScheme {
        self.scheme
    }

    pub fn sub_panels(&self) -> usize {
        self.sub_panels
    }

    pub fn encode(&self, field: &HologramField) -> Result<RealField> {
        let (w, h) = field.dimensions();
        let mut out: RealField = Image::try_new(w, h, "encoded field")?;

        let Some(projection) = self.scheme.projection() else {
            self.split(field, &mut out)?;
            return Ok(out);
        };
        for (dst, &c) in out.as_mut_slice().iter_mut().zip(field.as_slice()) {
            *dst = projection.apply(c);
        }
        Ok(out)
    }

    fn split(&self, field: &HologramField, out: &mut RealField) -> Result<()> {
        let n = self.sub_panels;
        let w = field.width();
        if w % n != 0 {
            return Err(HoloError::config(format!(
                "panel width {w} cannot be split into {n} sub-panels"
            )));
        }
        let m = w / n;
        for y in 0..field.height() {
            let src = field.row(y);
            let dst = out.row_mut(y);
            for (j, bin) in src.chunks_exact(n).enumerate() {
                let mean = bin.iter().sum::<Complex64>() / n as f64;
                for (s, panel) in dst.chunks_exact_mut(m).enumerate() {
                    panel[j] = SPLIT_ORDER[s % 4].apply(mean);
                }
            }
        }
        Ok(())
    }
}
