// gpu/device.rs — wgpu device abstraction.
//
// Responsibilities:
//   - Enumerate adapters on the primary backends and pick a hardware one.
//   - Expose a `DeviceProfile` that can cap limits below what the hardware
//     offers, so oversize dispatches are caught on a development machine.
//   - Provide `WorkgroupSize`, validated against the active profile and
//     substituted into the WGSL source when pipelines are created.
//
// ADAPTER SELECTION:
// `request_adapter` power heuristics can pick a software rasterizer
// (llvmpipe and friends) when one is installed next to a real driver. We
// enumerate explicitly and only fall back to a CPU adapter when nothing
// else exists. The chosen adapter is logged at info level.
//
// DEVICE LIMITS:
// A `Constrained` profile requests smaller limits than the adapter reports.
// wgpu validates every buffer and dispatch against the requested limits,
// so a hologram that would not fit on a small GPU fails the same way on a
// large one.
//
// NEW RUST CONCEPTS:
// - `pollster::block_on` — runs an async fn to completion on the current
//   thread. wgpu's adapter/device API is async because it maps to JS
//   Promises on the web; natively we just block.
// - `#[derive(thiserror::Error)]` — generates Display and `source()` from
//   the `#[error]` attributes instead of hand-written impls.

use std::fmt;

use tracing::{debug, info};

/// Hardware profile controlling device limits and default workgroup sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfile {
    /// Use the adapter's default limits.
    Native,
    /// Small-GPU limits: 256 invocations per workgroup and 128 MiB storage
    /// bindings. Enough for a 4K panel field (66 MB of vec2<f32>).
    Constrained,
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceProfile::Native => write!(f, "Native"),
            DeviceProfile::Constrained => write!(f, "Constrained (capped limits)"),
        }
    }
}

/// A workgroup configuration for 2D compute dispatches over the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Fill `{{WG_X}}` / `{{WG_Y}}` placeholders in a WGSL template.
    pub fn specialize(&self, template: &str) -> String {
        template
            .replace("{{WG_X}}", &self.x.to_string())
            .replace("{{WG_Y}}", &self.y.to_string())
    }

    /// - `Native`: 16×8 = 128 invocations (4 NVIDIA warps, 2 AMD waves).
    /// - `Constrained`: 8×8 = 64 invocations.
    fn for_profile(profile: DeviceProfile) -> Self {
        match profile {
            DeviceProfile::Native => WorkgroupSize { x: 16, y: 8 },
            DeviceProfile::Constrained => WorkgroupSize { x: 8, y: 8 },
        }
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// Adapter, device, queue and active profile.
///
/// # Field drop order
/// Struct fields drop top to bottom. `_instance` is declared last so the
/// `wgpu::Instance` outlives `device` and `queue`; some Vulkan layers
/// crash when the instance goes first.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub profile: DeviceProfile,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    /// Limits the device was created with; buffer sizes are checked
    /// against these before upload.
    pub limits: wgpu::Limits,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// First hardware adapter with `DeviceProfile::Native` limits.
    pub fn new() -> Result<Self, GpuError> {
        Self::new_with_profile(DeviceProfile::Native)
    }

    pub fn new_with_profile(profile: DeviceProfile) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(profile))
    }

    async fn init_async(profile: DeviceProfile) -> Result<Self, GpuError> {
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags,
            ..Default::default()
        });

        let mut adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        if adapters.is_empty() {
            return Err(GpuError::NoSuitableAdapter);
        }
        for a in &adapters {
            let info = a.get_info();
            debug!(name = %info.name, backend = ?info.backend, kind = ?info.device_type, "gpu adapter found");
        }

        // Hardware (or pass-through) first, software rasterizer last.
        let pick = adapters
            .iter()
            .position(|a| a.get_info().device_type != wgpu::DeviceType::Cpu)
            .unwrap_or(0);
        let adapter = adapters.swap_remove(pick);

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };

        let limits = limits_for_profile(profile);
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("holodepth"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        let workgroup_size = WorkgroupSize::for_profile(profile);
        info!(adapter = %adapter_info, %profile, workgroup = %workgroup_size, "gpu device ready");

        Ok(GpuDevice {
            device,
            queue,
            profile,
            adapter_info,
            workgroup_size,
            limits,
            _instance: instance,
        })
    }

    /// Override the default workgroup size, validating against the profile.
    pub fn set_workgroup_size(&mut self, x: u32, y: u32) -> Result<(), GpuError> {
        self.workgroup_size =
            checked_workgroup(x, y, self.limits.max_compute_invocations_per_workgroup)?;
        Ok(())
    }

    /// Workgroups needed to cover a `w × h` grid (ceiling division). The
    /// shader guards against the overhang.
    pub fn dispatch_size(&self, w: u32, h: u32) -> (u32, u32) {
        dispatch_for(self.workgroup_size, w, h)
    }

    /// Fail if a storage buffer of `bytes` cannot be bound on this device.
    pub fn check_storage_size(&self, what: &'static str, bytes: u64) -> Result<(), GpuError> {
        let max = u64::from(self.limits.max_storage_buffer_binding_size);
        if bytes > max {
            return Err(GpuError::BufferTooLarge { what, bytes, max });
        }
        Ok(())
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, profile: {}, workgroup: {} }}",
            self.adapter_info, self.profile, self.workgroup_size
        )
    }
}

/// `x × y` as a workgroup size if it fits in `max` invocations. A product
/// that overflows `u32` is reported as `u32::MAX`.
fn checked_workgroup(x: u32, y: u32, max: u32) -> Result<WorkgroupSize, GpuError> {
    let total = x.checked_mul(y).unwrap_or(u32::MAX);
    if total > max {
        return Err(GpuError::WorkgroupTooLarge { total, max });
    }
    Ok(WorkgroupSize { x, y })
}

fn dispatch_for(ws: WorkgroupSize, w: u32, h: u32) -> (u32, u32) {
    (w.div_ceil(ws.x), h.div_ceil(ws.y))
}

fn limits_for_profile(profile: DeviceProfile) -> wgpu::Limits {
    match profile {
        DeviceProfile::Native => wgpu::Limits::default(),
        DeviceProfile::Constrained => wgpu::Limits {
            max_compute_invocations_per_workgroup: 256,
            max_compute_workgroup_size_x: 256,
            max_compute_workgroup_size_y: 256,
            max_compute_workgroup_size_z: 64,
            max_storage_buffer_binding_size: 128 << 20,
            ..wgpu::Limits::default()
        },
    }
}

// ============================================================
// Error type
// ============================================================

/// Errors from GPU device initialization and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no usable GPU adapter found")]
    NoSuitableAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(#[source] wgpu::RequestDeviceError),

    #[error("workgroup size {total} exceeds profile limit of {max} invocations")]
    WorkgroupTooLarge { total: u32, max: u32 },

    #[error("{what} needs {bytes} bytes, device binding limit is {max}")]
    BufferTooLarge { what: &'static str, bytes: u64, max: u64 },

    #[error("buffer readback failed: {0}")]
    Readback(String),
}

// ============================================================
// Tests
// ============================================================
