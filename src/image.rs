// image.rs — Runtime-sized 2D grid, generic over sample type.
//
// Every per-frame buffer in the pipeline is one of these:
//
//   Image<u8>        — decoded 8-bit amplitude / depth frames
//   Image<f64>       — normalized amplitude, encoded real field
//   Image<u32>       — depth bucket index map
//   Image<Complex64> — hologram accumulator
//
// Row-major and tightly packed (no stride padding): the GPU path uploads
// through storage buffers, not textures, so there is no row alignment to
// honour and `as_slice()` is exactly `width * height` long.
//
// The element bound is only `Copy + Default`, so complex samples fit. The
// `Pixel` trait is the narrower set of scalar types that can be converted
// through f64 and resampled.

use std::fmt;

use crate::error::{HoloError, Result};

// ---------------------------------------------------------------------------
// Pixel Trait
// ---------------------------------------------------------------------------

/// Scalar sample types that round-trip through `f64` (used by bilinear
/// resampling and the 8-bit conversions).
pub trait Pixel: Copy + Default + Send + Sync + PartialOrd + 'static {
    /// Raw value as f64 (not normalized: u8 200 → 200.0).
    fn to_f64(self) -> f64;

    /// Construct from an f64, clamping and rounding for integer types.
    fn from_f64(v: f64) -> Self;
}

impl Pixel for u8 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v.clamp(0.0, 255.0).round() as u8
    }
}

impl Pixel for u32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v.clamp(0.0, u32::MAX as f64).round() as u32
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl Pixel for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D grid with runtime dimensions, row-major, `data.len() == width * height`.
#[derive(Clone, PartialEq)]
pub struct Image<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Copy + Default> Image<T> {
    // --- Constructors ---

    /// Create a default-initialized (zeroed) image.
    pub fn new(width: usize, height: usize) -> Self {
        Image {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    /// Like [`Image::new`], but reports an allocation failure instead of
    /// aborting the process. Used for the large per-frame buffers.
    pub fn try_new(width: usize, height: usize, what: &'static str) -> Result<Self> {
        let elements = width
            .checked_mul(height)
            .ok_or(HoloError::Allocation { what, elements: usize::MAX })?;
        let mut data = Vec::new();
        data.try_reserve_exact(elements)
            .map_err(|_| HoloError::Allocation { what, elements })?;
        data.resize(elements, T::default());
        Ok(Image { data, width, height })
    }

    /// Create an image from an existing sample vector.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image { data, width, height }
    }

    /// Fallible counterpart of [`Image::from_vec`] for buffers that come
    /// from outside the crate.
    pub fn try_from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(HoloError::config(format!(
                "buffer of {} samples does not match {width}×{height}",
                data.len()
            )));
        }
        Ok(Image { data, width, height })
    }

    /// Build an image by evaluating `f(x, y)` at every sample.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Image { data, width, height }
    }

    // --- Accessors ---

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of samples (`width * height`).
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the sample at (x, y). x is column, y is row.
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    /// Mutable reference to the sample at (x, y).
    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        *self.get_mut(x, y) = value;
    }

    /// Borrow row `y` as a slice.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Iterate over all samples as `(x, y, value)`.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let w = self.width;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, &v)| (i % w.max(1), i / w.max(1), v))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Overwrite every sample with `value` (frame reset).
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Apply `f` to every sample, producing a new image of the same size.
    pub fn map<U: Copy + Default>(&self, f: impl Fn(T) -> U) -> Image<U> {
        Image {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
            height: self.height,
        }
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "sample ({x},{y}) out of bounds for image {}×{}",
            self.width,
            self.height,
        );
    }
}

impl<T: Copy + Default + fmt::Debug> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Image<{}> {{ {}×{} }}",
            std::any::type_name::<T>(),
            self.width,
            self.height,
        )?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(8) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.get(x, y))?;
            }
            if self.width > 8 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

impl<T: Copy + Default> std::ops::Index<(usize, usize)> for Image<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        self.bounds_check(x, y);
        &self.data[y * self.width + x]
    }
}

impl<T: Copy + Default> std::ops::IndexMut<(usize, usize)> for Image<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }
}

// ---------------------------------------------------------------------------
// Bilinear interpolation and resampling
// ---------------------------------------------------------------------------

/// Bilinear interpolation at sub-pixel coordinates (x, y).
///
/// Coordinates are clamped to the image, and the +1 neighbours are clamped
/// at the right/bottom edge (edge replication).
///
/// # Panics
/// Panics if the image is empty.
pub fn interpolate_bilinear<T: Pixel>(img: &Image<T>, x: f64, y: f64) -> f64 {
    assert!(img.width() > 0 && img.height() > 0, "cannot interpolate on an empty image");

    let max_x = (img.width() - 1) as f64;
    let max_y = (img.height() - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);

    let p00 = img.get(x0, y0).to_f64();
    let p10 = img.get(x1, y0).to_f64();
    let p01 = img.get(x0, y1).to_f64();
    let p11 = img.get(x1, y1).to_f64();

    (1.0 - fx) * (1.0 - fy) * p00
        + fx * (1.0 - fy) * p10
        + (1.0 - fx) * fy * p01
        + fx * fy * p11
}

/// Resample `src` to `width × height` with bilinear interpolation.
///
/// Corner-aligned mapping: destination column `x` samples source column
/// `x · (src_w − 1) / (width − 1)`, so the four corner samples of source
/// and destination coincide. Equal sizes return an exact copy.
pub fn resize_bilinear<T: Pixel>(src: &Image<T>, width: usize, height: usize) -> Image<T> {
    if src.dimensions() == (width, height) {
        return src.clone();
    }
    if src.is_empty() {
        return Image::new(width, height);
    }

    let scale = |dst_len: usize, src_len: usize| -> f64 {
        if dst_len > 1 {
            (src_len - 1) as f64 / (dst_len - 1) as f64
        } else {
            0.0
        }
    };
    let sx = scale(width, src.width());
    let sy = scale(height, src.height());

    Image::from_fn(width, height, |x, y| {
        T::from_f64(interpolate_bilinear(src, x as f64 * sx, y as f64 * sy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn complex_samples_default_to_zero() {
        let img: Image<Complex64> = Image::new(3, 2);
        assert!(img.as_slice().iter().all(|c| *c == Complex64::new(0.0, 0.0)));
        assert_eq!(img.len(), 6);
    }

    #[test]
    fn try_new_reports_overflowing_request() {
        let err = Image::<f64>::try_new(usize::MAX, 2, "field").unwrap_err();
        assert!(matches!(err, HoloError::Allocation { what: "field", .. }));
    }

    #[test]
    fn try_from_vec_rejects_wrong_length() {
        assert!(Image::try_from_vec(2, 2, vec![0u8; 3]).is_err());
        assert!(Image::try_from_vec(2, 2, vec![0u8; 4]).is_ok());
    }

    #[test]
    fn pixels_iterates_row_major() {
        let img = Image::from_vec(2, 2, vec![1u8, 2, 3, 4]);
        let got: Vec<_> = img.pixels().collect();
        assert_eq!(got, vec![(0, 0, 1), (1, 0, 2), (0, 1, 3), (1, 1, 4)]);
    }

    #[test]
    fn resize_upsample_preserves_corners() {
        let src = Image::from_vec(2, 2, vec![0u8, 100, 200, 50]);
        let dst = resize_bilinear(&src, 5, 5);
        assert_eq!(dst.get(0, 0), 0);
        assert_eq!(dst.get(4, 0), 100);
        assert_eq!(dst.get(0, 4), 200);
        assert_eq!(dst.get(4, 4), 50);
        // Midpoint of the top edge.
        assert_eq!(dst.get(2, 0), 50);
    }

    #[test]
    fn resize_to_single_pixel_samples_origin() {
        let src = Image::from_vec(3, 1, vec![9u8, 1, 1]);
        let dst = resize_bilinear(&src, 1, 1);
        assert_eq!(dst.get(0, 0), 9);
    }
}
