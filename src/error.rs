// error.rs — Error taxonomy for the hologram pipeline.
//
// Four kinds matter to the frame loop:
//   Configuration     — bad parameters or buffer/panel size mismatch. Fatal.
//   Resource          — a frame's input image is missing or unreadable.
//                       The only recoverable kind: the frame is skipped.
//   Allocation        — a per-frame buffer could not be reserved. Fatal.
//   NumericalEdgeCase — a depth level sits on the field-lens focal plane.
//
// The remaining variants wrap collaborator failures (GPU setup, output I/O)
// and abort the run like Configuration does.

use std::path::PathBuf;

use crate::gpu::device::GpuError;

/// Errors produced by every stage of hologram generation.
#[derive(Debug, thiserror::Error)]
pub enum HoloError {
    /// Malformed parameters or a dimension mismatch against the panel.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A frame's input image is missing or could not be decoded.
    #[error("frame {frame}: {what} unavailable at {}: {reason}", path.display())]
    Resource {
        frame: usize,
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// A per-frame buffer could not be allocated.
    #[error("failed to allocate {what} ({elements} elements)")]
    Allocation { what: &'static str, elements: usize },

    /// Depth level coincides with the field-lens distance; the lens
    /// mapping −f·z/(z − f) has no finite value there.
    #[error("depth level {index} (z = {depth}) coincides with field-lens distance {field_lens}")]
    NumericalEdgeCase {
        index: usize,
        depth: f64,
        field_lens: f64,
    },

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write image {}: {source}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl HoloError {
    /// Shorthand for a `Configuration` error.
    pub fn config(msg: impl Into<String>) -> Self {
        HoloError::Configuration(msg.into())
    }

    /// Whether the frame loop may log this error and move on to the next
    /// frame. Everything except a missing/unreadable input aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HoloError::Resource { .. })
    }
}

pub type Result<T> = std::result::Result<T, HoloError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resource_errors_are_recoverable() {
        let resource = HoloError::Resource {
            frame: 3,
            what: "depth map",
            path: PathBuf::from("frames/3/depth*.bmp"),
            reason: "no matching file".into(),
        };
        assert!(resource.is_recoverable());
        assert!(!HoloError::config("bad").is_recoverable());
        assert!(!HoloError::Allocation { what: "field", elements: 4 }.is_recoverable());
        assert!(!HoloError::NumericalEdgeCase { index: 0, depth: 1.0, field_lens: 1.0 }
            .is_recoverable());
    }

    #[test]
    fn resource_message_names_frame_and_resource() {
        let err = HoloError::Resource {
            frame: 7,
            what: "amplitude image",
            path: PathBuf::from("src/007"),
            reason: "no matching file".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("frame 7"), "{msg}");
        assert!(msg.contains("amplitude image"), "{msg}");
    }
}
