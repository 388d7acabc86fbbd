//! The "null" accelerator: runs every algorithm on the host. Always
//! available regardless of the `gpu` feature, used whenever no device is
//! selected or requested (spec §4.5.1). `get_program`/`put_program` still
//! maintain a cache so kernel-builder tests can exercise the caching path
//! without a real device.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::shared::Shared;

use super::{AcceleratorBackend, CompiledProgram, DeviceBuffer};

pub struct CpuBackend {
    next_id: AtomicU64,
    programs: DashMap<blake3::Hash, Shared<CompiledProgram>>,
}

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend { next_id: AtomicU64::new(1), programs: DashMap::new() }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceleratorBackend for CpuBackend {
    fn vendor_name(&self) -> &str {
        "cpu (null backend)"
    }

    fn is_gpu(&self) -> bool {
        false
    }

    fn queue_count(&self) -> usize {
        1
    }

    fn max_workgroup_size(&self) -> usize {
        1
    }

    fn wave_size(&self) -> usize {
        1
    }

    fn alignment(&self) -> usize {
        std::mem::size_of::<u64>()
    }

    fn allocate(&self, byte_len: usize) -> Result<DeviceBuffer> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(DeviceBuffer { id, byte_len })
    }

    fn get_program(&self, cache_key: blake3::Hash, _source: &str) -> Result<Shared<CompiledProgram>> {
        if let Some(p) = self.programs.get(&cache_key) {
            return Ok(p.clone());
        }
        let program = Shared::new(CompiledProgram { source_hash: cache_key, entry_points: Vec::new() });
        self.programs.insert(cache_key, program.clone());
        Ok(program)
    }

    fn put_program(&self, cache_key: blake3::Hash, program: Shared<CompiledProgram>) {
        self.programs.insert(cache_key, program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_cache_round_trips() {
        let backend = CpuBackend::new();
        let key = blake3::hash(b"source text");
        let p1 = backend.get_program(key, "source text").unwrap();
        let p2 = backend.get_program(key, "source text").unwrap();
        assert_eq!(p1.source_hash, p2.source_hash);
    }

    #[test]
    fn allocate_yields_distinct_ids() {
        let backend = CpuBackend::new();
        let a = backend.allocate(64).unwrap();
        let b = backend.allocate(64).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
