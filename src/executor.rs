//! The device capability consumed by the scan and convolution routines.
//!
//! An executor owns compiled kernels for one block size and runs them
//! synchronously over a grid of work-items. Work-items of one work-group can
//! synchronize through a barrier; different work-groups are unordered.

use std::fmt;

use crate::error::{code, Error, Result};

/// Smallest scan block size. Each level shrinks the array by this factor.
pub const MIN_BLOCK_SIZE: usize = 2;

/// Work-group size used for the convolution tiles (per dimension).
pub const CONVOLUTION_TILE: usize = 16;

/// The kernels every executor provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// Inclusive scan restarting at every block boundary.
    /// Args: `input`, `output`, `len`.
    BlockPrefixSum,
    /// Copies the last element of each block into the next slot of a compacted array.
    /// Args: `input`, `output`, `input_len`, `output_len`.
    PartialCopy,
    /// Adds `partial[i / B]` to every element `i`.
    /// Args: `partial`, `input`, `output`, `len`.
    BlockAdd,
    /// Zero-padded 2D correlation of an `n x n` matrix with an `m x m` mask.
    /// Args: `a`, `mask`, `output`, `n`, `m`.
    Convolution,
}

impl Kernel {
    pub const ALL: [Kernel; 4] = [
        Kernel::BlockPrefixSum,
        Kernel::PartialCopy,
        Kernel::BlockAdd,
        Kernel::Convolution,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::BlockPrefixSum => "block_prefix_sum",
            Self::PartialCopy => "partial_copy",
            Self::BlockAdd => "block_add",
            Self::Convolution => "convolution",
        }
    }

    /// Number of (buffer, scalar) arguments the kernel takes.
    pub const fn arity(self) -> (usize, usize) {
        match self {
            Self::BlockPrefixSum => (2, 1),
            Self::PartialCopy => (2, 2),
            Self::BlockAdd => (3, 1),
            Self::Convolution => (3, 2),
        }
    }

    /// Index of the buffer argument the kernel writes to. All others are read.
    pub const fn output_binding(self) -> usize {
        self.arity().0 - 1
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Access tag of a device buffer for one kernel invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
}

/// Global and local work-item shape of a dispatch, in up to two dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    pub global: [usize; 2],
    pub local: [usize; 2],
}

impl Grid {
    /// One-dimensional grid covering `len` items, padded up to a multiple of
    /// `block_size`.
    pub fn linear(len: usize, block_size: usize) -> Self {
        Self {
            global: [round_up(len, block_size), 1],
            local: [block_size, 1],
        }
    }

    /// Two-dimensional `size x size` grid padded to whole `tile x tile` groups.
    pub fn square(size: usize, tile: usize) -> Self {
        let rounded = round_up(size, tile);
        Self {
            global: [rounded, rounded],
            local: [tile, tile],
        }
    }

    /// Number of work-groups per dimension, or `None` if the global size is
    /// not a whole multiple of the local size.
    pub fn groups(&self) -> Option<[usize; 2]> {
        let mut groups = [0; 2];
        for axis in 0..2 {
            let (global, local) = (self.global[axis], self.local[axis]);
            if local == 0 || global % local != 0 {
                return None;
            }
            groups[axis] = global / local;
        }
        Some(groups)
    }
}

/// `ceil(a / b)`.
pub fn div_rounded_up(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// Smallest multiple of `block_size` that is `>= n`.
pub fn round_up(n: usize, block_size: usize) -> usize {
    div_rounded_up(n, block_size) * block_size
}

/// One positional kernel argument.
pub enum KernelArg<'a, B> {
    Buffer(&'a B),
    Scalar(u32),
}

impl<B> Clone for KernelArg<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for KernelArg<'_, B> {}

/// Splits positional arguments into buffers and scalars, checking them against
/// the kernel signature. Buffers must precede scalars.
pub(crate) fn split_args<'a, B>(
    kernel: Kernel,
    args: &[KernelArg<'a, B>],
) -> Result<(Vec<&'a B>, Vec<u32>)> {
    let mut buffers = Vec::new();
    let mut scalars = Vec::new();
    for arg in args {
        match *arg {
            KernelArg::Buffer(buffer) if scalars.is_empty() => buffers.push(buffer),
            KernelArg::Buffer(_) => {
                return Err(Error::execution(
                    format!("{kernel}: buffer argument after scalar arguments"),
                    code::INVALID_KERNEL_ARGS,
                ))
            }
            KernelArg::Scalar(value) => scalars.push(value),
        }
    }
    if (buffers.len(), scalars.len()) != kernel.arity() {
        return Err(Error::execution(
            format!(
                "{kernel}: expected {:?} (buffers, scalars), got ({}, {})",
                kernel.arity(),
                buffers.len(),
                scalars.len()
            ),
            code::INVALID_KERNEL_ARGS,
        ));
    }
    Ok((buffers, scalars))
}

/// Synchronous accelerator interface.
pub trait DeviceExecutor {
    /// Device-resident `f64` storage.
    type Buffer;

    /// Scan work-group size the kernels were built for. Always `>= MIN_BLOCK_SIZE`.
    fn block_size(&self) -> usize;

    /// Allocates a buffer of `len` elements.
    fn allocate(&self, len: usize, access: Access) -> Result<Self::Buffer>;

    /// Copies `data` into the start of `buffer`.
    fn write(&self, buffer: &Self::Buffer, data: &[f64]) -> Result<()>;

    /// Copies the first `out.len()` elements of `buffer` into `out`.
    fn read(&self, buffer: &Self::Buffer, out: &mut [f64]) -> Result<()>;

    /// Runs `kernel` over `grid` and blocks until it has finished.
    fn dispatch(
        &self,
        kernel: Kernel,
        grid: Grid,
        args: &[KernelArg<'_, Self::Buffer>],
    ) -> Result<()>;
}
