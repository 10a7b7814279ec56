// gpu/mod.rs — GPU acceleration layer.
//
// wgpu compute kernels mirroring CPU code in the parent crate. The CPU
// strategies in `synth` stay the authoritative reference; the GPU
// accumulator is validated against `SequentialAccumulator`.
//
// Division of work per frame:
//
//   CPU:  layer collection, per-layer on-axis phase (f64), tilt phasors
//   GPU:  per-cell gather over all sources of the off-axis excess phase
//   CPU:  readback, tilt, add into the f64 field
//
// Only the gather is O(W·H·sources); everything else is O(W·H) or smaller.

pub mod device;
pub mod wavefront;
