//! Multi-level inclusive prefix sum.
//!
//! A single dispatch can only scan within a work-group, because work-groups
//! cannot synchronize with each other. Larger arrays are handled level by
//! level:
//!
//! 1. every block of `B` elements is scanned locally,
//! 2. the block totals are gathered into an array `ceil(N / B)` long,
//!    shifted by one slot so that slot `j` ends up as the offset of block `j`,
//! 3. that array is scanned recursively,
//! 4. each block gets its offset added back.
//!
//! Each level shrinks the problem by a factor of `B`, so there are
//! `O(log_B N)` levels.

use tracing::{debug, debug_span};

use crate::array::NumericArray;
use crate::dispatch::KernelCall;
use crate::error::{Error, Result};
use crate::executor::{div_rounded_up, DeviceExecutor, Grid, Kernel};

/// Scans `array` in place on `executor`.
pub fn scan_inclusive<E: DeviceExecutor>(executor: &E, array: &mut NumericArray) -> Result<()> {
    PrefixSum::new(executor).scan(array)
}

/// Host-side driver of the scan kernels.
pub struct PrefixSum<'e, E: DeviceExecutor> {
    executor: &'e E,
    block_size: usize,
}

impl<'e, E: DeviceExecutor> PrefixSum<'e, E> {
    pub fn new(executor: &'e E) -> Self {
        Self {
            executor,
            block_size: executor.block_size(),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Replaces every element with the sum of itself and all elements before it.
    pub fn scan(&self, array: &mut NumericArray) -> Result<()> {
        self.scan_level(array, 0)
    }

    fn scan_level(&self, array: &mut NumericArray, depth: usize) -> Result<()> {
        if array.is_empty() {
            return Ok(());
        }
        let _span = debug_span!("scan_level", depth).entered();
        let blocks = div_rounded_up(array.len(), self.block_size);
        debug!(len = array.len(), blocks, "block prefix sum");
        if blocks > 1 && blocks >= array.len() {
            return Err(Error::InvalidConfig(format!(
                "block size {} cannot reduce an array of {} elements",
                self.block_size,
                array.len()
            )));
        }

        self.block_prefix_sum(array)?;
        if blocks == 1 {
            return Ok(());
        }

        let mut sums = NumericArray::zeros(blocks);
        self.partial_copy(array, &mut sums)?;
        self.scan_level(&mut sums, depth + 1)?;
        self.block_add(&sums, array)
    }

    /// Scans each block of `array` independently.
    pub fn block_prefix_sum(&self, array: &mut NumericArray) -> Result<()> {
        let len = array.len();
        KernelCall::new(self.executor, Kernel::BlockPrefixSum)
            .input(array.as_slice())?
            .output(len)?
            .scalar(len)?
            .launch(Grid::linear(len, self.block_size))?
            .read_output(array.as_mut_slice())
    }

    /// Fills `to[j]` with the last element of block `j - 1` of `from`.
    ///
    /// `to[0]` is set to zero afterwards: nothing precedes block 0, so its
    /// exclusive offset is zero. Once `to` has been scanned, `to[j]` is the
    /// total of all blocks before block `j`.
    pub fn partial_copy(&self, from: &NumericArray, to: &mut NumericArray) -> Result<()> {
        KernelCall::new(self.executor, Kernel::PartialCopy)
            .input(from.as_slice())?
            .output(to.len())?
            .scalar(from.len())?
            .scalar(to.len())?
            .launch(Grid::linear(from.len(), self.block_size))?
            .read_output(to.as_mut_slice())?;
        if !to.is_empty() {
            to[0] = 0.0;
        }
        Ok(())
    }

    /// Adds `offsets[j]` to every element of block `j` of `to`.
    pub fn block_add(&self, offsets: &NumericArray, to: &mut NumericArray) -> Result<()> {
        let len = to.len();
        KernelCall::new(self.executor, Kernel::BlockAdd)
            .input(offsets.as_slice())?
            .input(to.as_slice())?
            .output(len)?
            .scalar(len)?
            .launch(Grid::linear(len, self.block_size))?
            .read_output(to.as_mut_slice())
    }
}

/// Sequential inclusive prefix sum, used as a reference.
pub fn inclusive_scan_cpu(input: &[f64]) -> Vec<f64> {
    input
        .iter()
        .scan(0.0, |sum, &x| {
            *sum += x;
            Some(*sum)
        })
        .collect()
}
