//! Run-time settings shared by the library entry points and the CLI.

use clap::ValueEnum;

use crate::error::{Error, Result};
use crate::executor::MIN_BLOCK_SIZE;

/// Work-group size of the scan kernels and reduction factor per level.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Which executor runs the kernels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// First adapter with 64-bit float shader support.
    #[default]
    Gpu,
    /// Software device on the calling thread.
    Host,
}

/// Adapter preference when several are available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Power {
    #[default]
    High,
    Low,
}

impl From<Power> for wgpu::PowerPreference {
    fn from(power: Power) -> Self {
        match power {
            Power::High => wgpu::PowerPreference::HighPerformance,
            Power::Low => wgpu::PowerPreference::LowPower,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunConfig {
    pub block_size: usize,
    pub backend: Backend,
    pub power: Power,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            backend: Backend::default(),
            power: Power::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "block size must be at least {MIN_BLOCK_SIZE}, got {}",
                self.block_size
            )));
        }
        if u32::try_from(self.block_size).is_err() {
            return Err(Error::InvalidConfig(format!(
                "block size {} does not fit in 32 bits",
                self.block_size
            )));
        }
        Ok(())
    }
}
