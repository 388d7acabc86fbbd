//! OpenCL-backed accelerator, compiled in only under the `gpu` feature.
//! Grounded in the `ocl` crate's high-level `Platform`/`Device`/`Context`/
//! `Queue`/`Program`/`Buffer` types.

use dashmap::DashMap;
use ocl::{Buffer, Context, Device, Platform, Queue};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::shared::Shared;

use super::{AcceleratorBackend, CompiledProgram, DeviceBuffer};

pub struct GpuBackend {
    context: Context,
    queues: Vec<Queue>,
    device: Device,
    vendor: String,
    next_id: AtomicU64,
    programs: DashMap<blake3::Hash, Shared<CompiledProgram>>,
}

impl GpuBackend {
    pub fn new(platform_index: usize, device_index: usize) -> Result<Self> {
        let platforms = Platform::list();
        let platform = platforms
            .get(platform_index)
            .copied()
            .ok_or_else(|| Error::DeviceNotFound(format!("no OpenCL platform at index {platform_index}")))?;

        let devices = Device::list_all(platform)
            .map_err(|e| Error::DeviceError(e.to_string()))?;
        let device = *devices
            .get(device_index)
            .ok_or_else(|| Error::DeviceNotFound(format!("no OpenCL device at index {device_index}")))?;

        let context = Context::builder()
            .platform(platform)
            .devices(device)
            .build()
            .map_err(|e| Error::DeviceError(e.to_string()))?;

        let queue = Queue::new(&context, device, None).map_err(|e| Error::DeviceError(e.to_string()))?;
        let vendor = device.vendor().unwrap_or_else(|_| "unknown".to_string());

        Ok(GpuBackend {
            context,
            queues: vec![queue],
            device,
            vendor,
            next_id: AtomicU64::new(1),
            programs: DashMap::new(),
        })
    }
}

impl AcceleratorBackend for GpuBackend {
    fn vendor_name(&self) -> &str {
        &self.vendor
    }

    fn is_gpu(&self) -> bool {
        true
    }

    fn queue_count(&self) -> usize {
        self.queues.len()
    }

    fn max_workgroup_size(&self) -> usize {
        self.device
            .info(ocl::enums::DeviceInfo::MaxWorkGroupSize)
            .map(|info| match info {
                ocl::enums::DeviceInfoResult::MaxWorkGroupSize(n) => n,
                _ => 1,
            })
            .unwrap_or(1)
    }

    fn wave_size(&self) -> usize {
        32
    }

    fn alignment(&self) -> usize {
        128
    }

    fn allocate(&self, byte_len: usize) -> Result<DeviceBuffer> {
        let _buffer: Buffer<u8> = Buffer::builder()
            .queue(self.queues[0].clone())
            .len(byte_len.max(1))
            .build()
            .map_err(|e| Error::DeviceError(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(DeviceBuffer { id, byte_len })
    }

    fn get_program(&self, cache_key: blake3::Hash, source: &str) -> Result<Shared<CompiledProgram>> {
        if let Some(p) = self.programs.get(&cache_key) {
            return Ok(p.clone());
        }
        let program = ocl::Program::builder()
            .devices(self.device)
            .src(source)
            .build(&self.context)
            .map_err(|e| Error::CompileError { message: e.to_string(), source_text: source.to_string() })?;
        let _ = program;
        let compiled = Shared::new(CompiledProgram { source_hash: cache_key, entry_points: Vec::new() });
        self.programs.insert(cache_key, compiled.clone());
        Ok(compiled)
    }

    fn put_program(&self, cache_key: blake3::Hash, program: Shared<CompiledProgram>) {
        self.programs.insert(cache_key, program);
    }
}

unsafe impl Send for GpuBackend {}
unsafe impl Sync for GpuBackend {}
