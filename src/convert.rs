// convert.rs — Sample conversions between Image<T> types.
//
//   u8  → f64 normalized to [0, 1]     (amplitude entering the synthesizer)
//   f64 → u8  from [0, 1]              (debug dumps, tests)
//   RGB(A) / gray-alpha → 8-bit luma   (decoded frames from the loader)
//
// The Pixel trait's to_f64/from_f64 are RAW conversions (u8 42 → 42.0);
// everything here is NORMALIZED.

use crate::image::{Image, Pixel};

/// Convert an 8-bit image to `[0.0, 1.0]`: 0 → 0.0, 255 → 1.0.
pub fn u8_to_normalized(src: &Image<u8>) -> Image<f64> {
    src.map(|v| v as f64 / 255.0)
}

/// Convert a `[0.0, 1.0]` image back to 8-bit, clamping and rounding.
pub fn normalized_to_u8(src: &Image<f64>) -> Image<u8> {
    src.map(|v| u8::from_f64(v * 255.0))
}

/// Generic raw conversion between two scalar sample types.
pub fn convert_image<S: Pixel, D: Pixel>(src: &Image<S>) -> Image<D> {
    src.map(|v| D::from_f64(v.to_f64()))
}

/// Collapse interleaved 8-bit samples with `channels` channels to luma.
///
/// 1 channel is copied, 2 channels (gray + alpha) keep the gray channel,
/// 3 or 4 channels use ITU-R BT.601 weights on R, G, B.
///
/// # Panics
/// Panics if `data.len() != width * height * channels` or `channels`
/// is not in 1..=4.
pub fn interleaved_to_luma(data: &[u8], width: usize, height: usize, channels: usize) -> Image<u8> {
    assert!((1..=4).contains(&channels), "unsupported channel count {channels}");
    assert_eq!(data.len(), width * height * channels, "interleaved buffer size mismatch");

    let luma = data
        .chunks_exact(channels)
        .map(|px| match channels {
            1 | 2 => px[0],
            _ => {
                let y = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
                u8::from_f64(y)
            }
        })
        .collect();
    Image::from_vec(width, height, luma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_round_trip() {
        let img = Image::from_vec(2, 2, vec![0u8, 128, 255, 42]);
        let f = u8_to_normalized(&img);
        assert!((f.get(0, 0) - 0.0).abs() < 1e-12);
        assert!((f.get(1, 0) - 128.0 / 255.0).abs() < 1e-12);
        assert!((f.get(0, 1) - 1.0).abs() < 1e-12);

        let back = normalized_to_u8(&f);
        assert_eq!(back, img);
    }

    #[test]
    fn normalized_to_u8_clamps() {
        let img = Image::from_vec(3, 1, vec![-0.5, 0.5, 2.0]);
        let out = normalized_to_u8(&img);
        assert_eq!(out.as_slice(), &[0, 128, 255]);
    }

    #[test]
    fn generic_convert_is_raw() {
        let img = Image::from_vec(2, 1, vec![7u8, 250]);
        let f: Image<f64> = convert_image(&img);
        assert_eq!(f.as_slice(), &[7.0, 250.0]);
    }

    #[test]
    fn luma_from_rgb_and_gray_alpha() {
        // Pure red → 0.299 * 255 = 76.245 → 76
        let rgb = interleaved_to_luma(&[255, 0, 0, 255, 255, 255], 2, 1, 3);
        assert_eq!(rgb.as_slice(), &[76, 255]);

        let la = interleaved_to_luma(&[10, 255, 20, 0], 2, 1, 2);
        assert_eq!(la.as_slice(), &[10, 20]);
    }
}
