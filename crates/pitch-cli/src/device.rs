//! Compute device selection with CPU fallback.

use clap::ValueEnum;

/// Device requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DevicePreference {
    /// GPU when one is usable, otherwise CPU.
    #[default]
    Auto,
    Cpu,
    Gpu,
}

/// Backend the run will actually use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedDevice {
    /// `Autodiff<NdArray>` on the host.
    Cpu,
    /// `Autodiff<Wgpu>` on the default adapter.
    #[cfg(feature = "wgpu")]
    Gpu,
}

/// Map a preference onto a device this host can run.
///
/// A GPU is chosen only when the build has the `wgpu` feature and the
/// default adapter can allocate a tensor. Anything else falls back to the
/// CPU with a warning instead of failing.
pub fn resolve(preference: DevicePreference) -> ResolvedDevice {
    resolve_with(preference, gpu_available)
}

/// [`resolve`] with the adapter check supplied by the caller.
///
/// `gpu_available` is not called when the CPU was requested.
fn resolve_with(
    preference: DevicePreference,
    gpu_available: impl FnOnce() -> bool,
) -> ResolvedDevice {
    if preference == DevicePreference::Cpu {
        return ResolvedDevice::Cpu;
    }
    if gpu_available() {
        #[cfg(feature = "wgpu")]
        return ResolvedDevice::Gpu;
    }
    if preference == DevicePreference::Gpu || cfg!(feature = "wgpu") {
        tracing::warn!(?preference, "No usable GPU adapter; using CPU");
    }
    ResolvedDevice::Cpu
}

/// Allocate and read back a one-element tensor on the default adapter.
///
/// burn's wgpu runtime panics when no adapter exists, so the panic is
/// caught and reported as unavailability.
#[cfg(feature = "wgpu")]
fn gpu_available() -> bool {
    use burn::backend::wgpu::{Wgpu, WgpuDevice};
    use burn::tensor::Tensor;

    let result = std::panic::catch_unwind(|| {
        let device = WgpuDevice::default();
        Tensor::<Wgpu, 1>::zeros([1], &device).into_data();
    });
    if result.is_err() {
        tracing::debug!("wgpu adapter initialization panicked");
    }
    result.is_ok()
}

#[cfg(not(feature = "wgpu"))]
fn gpu_available() -> bool {
    false
}
