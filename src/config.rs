use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RaceError, Result};
use crate::ion::{DEFAULT_ION_PATH, MSM_HEAP_TABLE};
use crate::models::RegionTable;

pub const PAGE_SIZE: usize = 4096;

/// Knobs of the race loop. Defaults reproduce the stock harness.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub device_path: PathBuf,
    /// Bytes per allocation; also used as the alignment.
    pub alloc_size: usize,
    pub alloc_flags: u32,
    pub regions: RegionTable,
    /// Sleep between coordinator barrier checks.
    pub coordinator_poll: Duration,
    /// Sleep between worker checks of the race signal.
    pub worker_poll: Duration,
    /// Delay between observing go and calling release.
    pub release_delay: Duration,
    /// Log progress every this many iterations. Zero disables it.
    pub progress_interval: u64,
    /// `None` runs until stopped.
    pub max_iterations: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_ION_PATH),
            alloc_size: PAGE_SIZE,
            alloc_flags: 0,
            regions: RegionTable::from(&MSM_HEAP_TABLE[..]),
            coordinator_poll: Duration::from_micros(50),
            worker_poll: Duration::from_micros(10),
            release_delay: Duration::from_micros(50),
            progress_interval: 10_000,
            max_iterations: None,
        }
    }
}

impl HarnessConfig {
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.alloc_size == 0 {
            return Err(RaceError::InvalidConfig(
                "allocation size must be non-zero".into(),
            ));
        }
        if !self.alloc_size.is_power_of_two() {
            return Err(RaceError::InvalidConfig(format!(
                "allocation size {} is used as alignment and must be a power of two",
                self.alloc_size
            )));
        }
        if self.regions.is_empty() {
            return Err(RaceError::InvalidConfig("region table is empty".into()));
        }
        Ok(())
    }
}

/// Builder for [`HarnessConfig`] with fluent API
#[derive(Debug, Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    pub fn device_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.device_path = path.as_ref().to_path_buf();
        self
    }

    pub fn alloc_size(mut self, size: usize) -> Self {
        self.config.alloc_size = size;
        self
    }

    /// ORs `flags` into the allocation flags.
    pub fn alloc_flags(mut self, flags: u32) -> Self {
        self.config.alloc_flags |= flags;
        self
    }

    pub fn regions(mut self, regions: impl Into<RegionTable>) -> Self {
        self.config.regions = regions.into();
        self
    }

    pub fn coordinator_poll(mut self, interval: Duration) -> Self {
        self.config.coordinator_poll = interval;
        self
    }

    pub fn worker_poll(mut self, interval: Duration) -> Self {
        self.config.worker_poll = interval;
        self
    }

    pub fn release_delay(mut self, delay: Duration) -> Self {
        self.config.release_delay = delay;
        self
    }

    pub fn progress_interval(mut self, every: u64) -> Self {
        self.config.progress_interval = every;
        self
    }

    pub fn max_iterations(mut self, limit: u64) -> Self {
        self.config.max_iterations = Some(limit);
        self
    }

    pub fn build(self) -> Result<HarnessConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
