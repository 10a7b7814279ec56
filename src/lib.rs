// holodepth: depth-map computer-generated hologram synthesis
//
// An amplitude image and a depth map are sliced into depth layers; every lit
// pixel radiates to the hologram plane and the complex sum is encoded into an
// 8-bit pattern. CPU strategies are the reference; a wgpu compute path
// implements the same accumulation contract.

pub mod error;
pub mod image;
pub mod convert;
pub mod config;

pub mod quantize;
pub mod viewing_window;
pub mod propagation;
pub mod synth;
pub mod encode;
pub mod writer;
pub mod source;
pub mod reconstruct;
pub mod pipeline;

pub mod gpu;

pub use config::{ExecutionMode, OpticalConfig, RunConfig};
pub use error::{HoloError, Result};
pub use pipeline::{FrameStats, HologramPipeline, RunSummary};
