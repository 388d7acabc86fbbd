//! Accelerator facade (spec §4.5): an abstract device + queue + allocator +
//! program-cache surface that algorithms dispatch kernels through. Two
//! implementations exist: [`cpu::CpuBackend`], always available, and
//! [`gpu::GpuBackend`], compiled in only under the `gpu` feature and backed
//! by the real `ocl` crate.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;

use crate::error::Result;
use crate::shared::Shared;

/// An opaque device-side memory handle. The CPU backend never allocates one
/// of these for real; the GPU backend wraps an `ocl::Buffer` byte view.
pub struct DeviceBuffer {
    id: u64,
    byte_len: usize,
}

impl DeviceBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

/// A compiled kernel program, keyed by the hash the kernel builder computed
/// over its composed source (spec §4.5.3).
pub struct CompiledProgram {
    pub source_hash: blake3::Hash,
    pub entry_points: Vec<String>,
}

/// The abstract accelerator surface. `Library::init` picks exactly one
/// implementation for the process lifetime (spec §4.5.1).
pub trait AcceleratorBackend: Send + Sync {
    fn vendor_name(&self) -> &str;

    fn is_gpu(&self) -> bool;

    /// Number of independent command queues available for round-robin
    /// dispatch (spec §4.5.2).
    fn queue_count(&self) -> usize;

    fn max_workgroup_size(&self) -> usize;

    fn wave_size(&self) -> usize;

    /// Required alignment, in bytes, for device buffer allocations.
    fn alignment(&self) -> usize;

    fn allocate(&self, byte_len: usize) -> Result<DeviceBuffer>;

    fn allocate_pair(&self, byte_len: usize) -> Result<(DeviceBuffer, DeviceBuffer)> {
        Ok((self.allocate(byte_len)?, self.allocate(byte_len)?))
    }

    /// Compiles (or retrieves from cache) a program built from the given
    /// composed source under the given cache key.
    fn get_program(&self, cache_key: blake3::Hash, source: &str) -> Result<Shared<CompiledProgram>>;

    fn put_program(&self, cache_key: blake3::Hash, program: Shared<CompiledProgram>);
}

/// Selects the best backend available given the `gpu` feature and runtime
/// device presence: GPU when compiled in and a platform is found, CPU
/// otherwise. Mirrors `Library::init`'s fallback behavior (spec §4.5.1,
/// SPEC_FULL.md logging section).
pub fn select_backend(prefer_gpu: bool, platform: usize, device: usize) -> Shared<dyn AcceleratorBackend> {
    #[cfg(feature = "gpu")]
    if prefer_gpu {
        match gpu::GpuBackend::new(platform, device) {
            Ok(backend) => {
                tracing::info!(vendor = backend.vendor_name(), "selected GPU accelerator backend");
                return Shared::new(backend);
            }
            Err(err) => {
                tracing::warn!(%err, "GPU backend unavailable, falling back to CPU");
            }
        }
    }
    #[cfg(not(feature = "gpu"))]
    let _ = (prefer_gpu, platform, device);

    tracing::info!("selected CPU accelerator backend");
    Shared::new(cpu::CpuBackend::new())
}
