//! Configuration (SPEC_FULL.md ambient stack): a serde-serializable bag of
//! the knobs spec §6's `Library` setters expose, so a host application can
//! embed this crate's settings inside its own TOML configuration rather
//! than calling the setters one by one. The library itself never reads a
//! file from disk on its own initiative — parsing is left to the caller.

use serde::{Deserialize, Serialize};

use crate::storage::DEFAULT_BLOCK_SIZE;

/// Library-wide configuration (spec §3 block size, §4.4 accelerator
/// selection, §5 worker pool sizing).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Grid edge length blocks are tiled at (spec §3).
    pub block_size: usize,
    /// Number of worker threads the expression scheduler runs on. `None`
    /// means `std::thread::available_parallelism()`.
    pub worker_threads: Option<usize>,
    /// Number of accelerator command queues to open (spec §4.4).
    pub queue_count: usize,
    /// Whether to prefer a GPU backend over the CPU fallback, subject to
    /// the `gpu` feature being compiled in and a device being found.
    pub prefer_gpu: bool,
    pub platform_index: usize,
    pub device_index: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            block_size: DEFAULT_BLOCK_SIZE,
            worker_threads: None,
            queue_count: 1,
            prefer_gpu: cfg!(feature = "gpu"),
            platform_index: 0,
            device_index: 0,
        }
    }
}

impl Config {
    /// Effective worker count: the explicit setting, or hardware
    /// parallelism, same fallback as the original's thread pool sizing.
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_block_size() {
        let cfg = Config::default();
        assert_eq!(cfg.block_size, 10_000_000);
        assert_eq!(cfg.queue_count, 1);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut cfg = Config::default();
        cfg.block_size = 4096;
        cfg.worker_threads = Some(4);
        let text = cfg.to_toml_string().unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back.block_size, 4096);
        assert_eq!(back.worker_threads, Some(4));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = Config::from_toml_str("block_size = 128\n").unwrap();
        assert_eq!(cfg.block_size, 128);
        assert_eq!(cfg.queue_count, 1);
    }
}
