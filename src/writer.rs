// writer.rs — Real pattern → 8-bit raster → image sink.
//
//   RealField ──normalize──▶ Image<u8> ──pack──▶ Raster8 ──ImageSink──▶ file
//
// NORMALIZATION
// ─────────────
// One global min/max over the whole field, then
//     out = trunc((v − min) / (max − min) · 255)
// so min → 0 and max → 255. A constant field has no range and maps to all
// zeros. Under the parallel modes the min/max reduction runs on rayon; the
// result is identical either way (min and max are order-independent).
//
// PACKING
// ───────
// n consecutive samples of a row become the n channels of one pixel
// (n = sub-panel count): 1 → L8, 2 → La8, 3 → Rgb8, 4 → Rgba8. The raster is
// (RealField width / n) × H pixels.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use crate::config::ExecutionMode;
use crate::encode::RealField;
use crate::error::{HoloError, Result};
use crate::image::Image;

/// Interleaved 8-bit raster ready for an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster8 {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl Raster8 {
    pub fn color_type(&self) -> Result<image::ColorType> {
        Ok(match self.channels {
            1 => image::ColorType::L8,
            2 => image::ColorType::La8,
            3 => image::ColorType::Rgb8,
            4 => image::ColorType::Rgba8,
            n => return Err(HoloError::config(format!("{n} channels per pixel is not writable"))),
        })
    }

    /// Channel `c` of pixel (x, y).
    pub fn sample(&self, x: usize, y: usize, c: usize) -> u8 {
        self.data[(y * self.width + x) * self.channels + c]
    }
}

/// Global `(min, max)` of the field. `None` for an empty field.
pub fn value_range(field: &RealField, mode: ExecutionMode) -> Option<(f64, f64)> {
    if field.is_empty() {
        return None;
    }
    let fold = |(lo, hi): (f64, f64), v: f64| (lo.min(v), hi.max(v));
    let init = (f64::INFINITY, f64::NEG_INFINITY);
    let range = if mode.is_parallel() {
        field
            .as_slice()
            .par_iter()
            .fold(|| init, |acc, &v| fold(acc, v))
            .reduce(|| init, |a, b| (a.0.min(b.0), a.1.max(b.1)))
    } else {
        field.as_slice().iter().fold(init, |acc, &v| fold(acc, v))
    };
    Some(range)
}

/// Rescale the field linearly onto 0..=255.
pub fn normalize(field: &RealField, mode: ExecutionMode) -> Image<u8> {
    let Some((min, max)) = value_range(field, mode) else {
        return Image::new(field.width(), field.height());
    };
    let span = max - min;
    if !(span > 0.0) {
        return Image::new(field.width(), field.height());
    }
    let scale = |v: f64| ((v - min) / span * 255.0) as u8;
    if mode.is_parallel() {
        let data: Vec<u8> = field.as_slice().par_iter().map(|&v| scale(v)).collect();
        Image::from_vec(field.width(), field.height(), data)
    } else {
        field.map(scale)
    }
}

/// Regroup every `channels` consecutive samples of a row into one pixel.
pub fn pack(samples: Image<u8>, channels: usize) -> Result<Raster8> {
    if !(1..=4).contains(&channels) {
        return Err(HoloError::config(format!("sub-panel count must be 1..=4 (got {channels})")));
    }
    if samples.width() % channels != 0 {
        return Err(HoloError::config(format!(
            "encoded width {} is not a multiple of {channels} sub-panels",
            samples.width()
        )));
    }
    Ok(Raster8 {
        width: samples.width() / channels,
        height: samples.height(),
        channels,
        data: samples.into_vec(),
    })
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination of finished rasters. `name` is a file stem without extension.
pub trait ImageSink {
    fn write(&mut self, name: &str, raster: &Raster8) -> Result<()>;
}

/// Writes `<folder>/<name>.bmp`, creating the folder on first use.
#[derive(Debug, Clone)]
pub struct BmpSink {
    folder: PathBuf,
}

impl BmpSink {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        BmpSink { folder: folder.into() }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.folder.join(format!("{name}.bmp"))
    }
}

impl ImageSink for BmpSink {
    fn write(&mut self, name: &str, raster: &Raster8) -> Result<()> {
        std::fs::create_dir_all(&self.folder).map_err(|source| HoloError::Io {
            path: self.folder.clone(),
            source,
        })?;
        let path = self.path_for(name);
        image::save_buffer_with_format(
            &path,
            &raster.data,
            raster.width as u32,
            raster.height as u32,
            raster.color_type()?,
            image::ImageFormat::Bmp,
        )
        .map_err(|source| HoloError::ImageWrite { path: path.clone(), source })?;
        debug!(path = %path.display(), "wrote raster");
        Ok(())
    }
}

/// Keeps rasters in memory, in write order.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub written: Vec<(String, Raster8)>,
}

impl ImageSink for MemorySink {
    fn write(&mut self, name: &str, raster: &Raster8) -> Result<()> {
        self.written.push((name.to_string(), raster.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ResultWriter
// ---------------------------------------------------------------------------

/// Normalizes, packs and hands rasters to a sink.
pub struct ResultWriter<S: ImageSink> {
    sink: S,
    channels: usize,
    mode: ExecutionMode,
}

impl<S: ImageSink> ResultWriter<S> {
    pub fn new(sink: S, channels: usize, mode: ExecutionMode) -> Self {
        ResultWriter { sink, channels, mode }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Normalize and pack an encoded pattern with the configured channel count.
    pub fn write(&mut self, name: &str, field: &RealField) -> Result<()> {
        let raster = pack(normalize(field, self.mode), self.channels)?;
        self.sink.write(name, &raster)
    }

    /// Write a single-channel image (reconstructions) regardless of the
    /// sub-panel count.
    pub fn write_gray(&mut self, name: &str, field: &RealField) -> Result<()> {
        let raster = pack(normalize(field, self.mode), 1)?;
        self.sink.write(name, &raster)
    }
}
