// source.rs — Per-frame input loading.
//
// Each frame needs two 8-bit images: an amplitude (intensity) image and a
// depth map. On disk they live in a frame folder:
//
//   static mode:    <source_folder>/
//   sequence mode:  <source_folder>/<start_frame + frame>   (zero-padded to
//                                                            frame_digits)
//
// and are the first files, in sorted order, named `<prefix>*.bmp`
// (extension case-insensitive). Colour inputs are reduced to luma, then
// both images are bilinearly resampled to the panel resolution.
//
// A missing folder, a missing file or an undecodable image is a Resource
// error for that frame; the pipeline logs it and skips the frame.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::SequenceConfig;
use crate::convert::interleaved_to_luma;
use crate::error::{HoloError, Result};
use crate::image::{resize_bilinear, Image};

/// The two raw inputs of one frame, already at panel resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInputs {
    pub amplitude: Image<u8>,
    pub depth: Image<u8>,
}

/// Supplies frame inputs by frame number (0-based within the run).
pub trait FrameSource {
    fn load(&mut self, frame: usize) -> Result<FrameInputs>;
}

// ---------------------------------------------------------------------------
// FolderSource
// ---------------------------------------------------------------------------

/// Reads BMP inputs from the folder layout described above.
#[derive(Debug, Clone)]
pub struct FolderSource {
    sequence: SequenceConfig,
    width: usize,
    height: usize,
}

impl FolderSource {
    pub fn new(sequence: &SequenceConfig, width: usize, height: usize) -> Self {
        FolderSource { sequence: sequence.clone(), width, height }
    }

    /// Folder holding the inputs of `frame`.
    pub fn frame_folder(&self, frame: usize) -> PathBuf {
        let seq = &self.sequence;
        if seq.static_image {
            return seq.source_folder.clone();
        }
        let number = seq.start_frame + frame;
        let name = if seq.frame_digits > 0 {
            format!("{number:0width$}", width = seq.frame_digits)
        } else {
            number.to_string()
        };
        seq.source_folder.join(name)
    }

    fn read(&self, frame: usize, folder: &Path, prefix: &str, what: &'static str) -> Result<Image<u8>> {
        let frame = self.sequence.start_frame + frame;
        let unavailable = |path: PathBuf, reason: String| HoloError::Resource { frame, what, path, reason };

        let path = find_input(folder, prefix)
            .map_err(|e| unavailable(folder.to_path_buf(), e.to_string()))?
            .ok_or_else(|| {
                unavailable(folder.join(format!("{prefix}*.bmp")), "no matching file".to_string())
            })?;

        let decoded = image::open(&path).map_err(|e| unavailable(path.clone(), e.to_string()))?;
        let luma = to_luma(decoded);
        debug!(
            frame,
            what,
            path = %path.display(),
            size = ?luma.dimensions(),
            "loaded input"
        );
        Ok(resize_bilinear(&luma, self.width, self.height))
    }
}

impl FrameSource for FolderSource {
    fn load(&mut self, frame: usize) -> Result<FrameInputs> {
        let folder = self.frame_folder(frame);
        let amplitude = self.read(frame, &folder, &self.sequence.image_prefix, "amplitude image")?;
        let depth = self.read(frame, &folder, &self.sequence.depth_prefix, "depth map")?;
        Ok(FrameInputs { amplitude, depth })
    }
}

/// First `<prefix>*.bmp` in `folder`, by sorted file name.
fn find_input(folder: &Path, prefix: &str) -> std::io::Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let name_ok = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix));
            let ext_ok = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("bmp"));
            name_ok && ext_ok
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}

fn to_luma(decoded: image::DynamicImage) -> Image<u8> {
    let (w, h) = (decoded.width() as usize, decoded.height() as usize);
    match decoded {
        image::DynamicImage::ImageLuma8(buf) => interleaved_to_luma(buf.as_raw(), w, h, 1),
        image::DynamicImage::ImageLumaA8(buf) => interleaved_to_luma(buf.as_raw(), w, h, 2),
        image::DynamicImage::ImageRgb8(buf) => interleaved_to_luma(buf.as_raw(), w, h, 3),
        image::DynamicImage::ImageRgba8(buf) => interleaved_to_luma(buf.as_raw(), w, h, 4),
        other => interleaved_to_luma(other.to_rgb8().as_raw(), w, h, 3),
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Frames held in memory; `None` entries behave like missing files.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub frames: Vec<Option<FrameInputs>>,
}

impl FrameSource for MemorySource {
    fn load(&mut self, frame: usize) -> Result<FrameInputs> {
        self.frames
            .get(frame)
            .cloned()
            .flatten()
            .ok_or_else(|| HoloError::Resource {
                frame,
                what: "frame inputs",
                path: PathBuf::from(format!("<memory>/{frame}")),
                reason: "not provided".to_string(),
            })
    }
}
