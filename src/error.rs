//! Error taxonomy for device setup, kernel compilation and execution.
//!
//! Every failure is fatal to the computation in progress. Nothing is retried
//! and no partial result is handed back: intermediate arrays of a multi-level
//! scan are not in a consistent state when a dispatch fails.

use thiserror::Error;

use crate::executor::Kernel;

/// Implementation-defined error codes reported alongside the message.
///
/// The values follow the OpenCL status-code numbering so that logs read the
/// same regardless of which backend produced them.
pub mod code {
    /// No usable platform or device.
    pub const DEVICE_NOT_FOUND: i32 = -1;
    /// Device ran out of memory or resources.
    pub const OUT_OF_RESOURCES: i32 = -5;
    /// Kernel source failed to build.
    pub const BUILD_PROGRAM_FAILURE: i32 = -11;
    /// Mapping a buffer for readback failed.
    pub const MAP_FAILURE: i32 = -12;
    /// A buffer was used against its access tag or is too small.
    pub const INVALID_MEM_OBJECT: i32 = -38;
    /// Kernel arguments do not match the kernel signature.
    pub const INVALID_KERNEL_ARGS: i32 = -52;
    /// Global size is not a multiple of the work-group size.
    pub const INVALID_WORK_GROUP_SIZE: i32 = -54;
    /// Work-item count exceeds what the device can address.
    pub const INVALID_GLOBAL_WORK_SIZE: i32 = -63;
    /// A configuration value is out of range.
    pub const INVALID_VALUE: i32 = -30;
    /// Input text could not be parsed.
    pub const INVALID_INPUT: i32 = -1000;
    /// Host stream failure.
    pub const IO: i32 = -1001;
}

/// Errors that can occur while setting up or running a computation.
#[derive(Debug, Error)]
pub enum Error {
    /// No accelerator could be initialized.
    #[error("device initialization failed: {0}")]
    DeviceInit(String),

    /// A kernel failed to build.
    #[error("kernel `{kernel}` failed to compile: {message}")]
    Compile {
        /// Kernel that failed.
        kernel: Kernel,
        /// Message reported by the shader compiler.
        message: String,
    },

    /// A dispatch or transfer failed at runtime.
    #[error("device execution failed: {message}")]
    DeviceExecutionFailed {
        /// What went wrong.
        message: String,
        /// Implementation-defined status code, see [`code`].
        code: i32,
    },

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed input text.
    #[error("invalid input: {0}")]
    Parse(String),

    /// Reading or writing a host stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn execution(message: impl Into<String>, code: i32) -> Self {
        Self::DeviceExecutionFailed {
            message: message.into(),
            code,
        }
    }

    /// Status code reported together with the message.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::DeviceInit(_) => code::DEVICE_NOT_FOUND,
            Self::Compile { .. } => code::BUILD_PROGRAM_FAILURE,
            Self::DeviceExecutionFailed { code, .. } => *code,
            Self::InvalidConfig(_) => code::INVALID_VALUE,
            Self::Parse(_) => code::INVALID_INPUT,
            Self::Io(_) => code::IO,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
