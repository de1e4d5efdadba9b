//! A software device that runs the kernels on the calling thread.
//!
//! Work-groups are executed one after another. Inside a group, every
//! barrier-delimited phase of a kernel is run for all work-items before the
//! next phase starts, so kernels observe the same memory ordering they get
//! from `workgroupBarrier()` on real hardware. Launch shape, argument
//! signature, access tags and buffer bounds are checked the way a driver
//! would reject them.

use std::cell::RefCell;

use tracing::debug;

use crate::error::{code, Error, Result};
use crate::executor::{
    div_rounded_up, split_args, Access, DeviceExecutor, Grid, Kernel, KernelArg, CONVOLUTION_TILE,
    MIN_BLOCK_SIZE,
};

/// Device memory of the host executor.
#[derive(Debug)]
pub struct HostBuffer {
    data: RefCell<Vec<f64>>,
    access: Access,
}

impl HostBuffer {
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn access(&self) -> Access {
        self.access
    }
}

#[derive(Clone, Debug)]
pub struct HostExecutor {
    block_size: usize,
}

impl HostExecutor {
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size < MIN_BLOCK_SIZE {
            return Err(Error::DeviceInit(format!(
                "block size must be at least {MIN_BLOCK_SIZE}, got {block_size}"
            )));
        }
        debug!(block_size, "host executor ready");
        Ok(Self { block_size })
    }

    fn expected_local(&self, kernel: Kernel) -> [usize; 2] {
        match kernel {
            Kernel::Convolution => [CONVOLUTION_TILE, CONVOLUTION_TILE],
            _ => [self.block_size, 1],
        }
    }
}

fn require_len(kernel: Kernel, what: &str, actual: usize, needed: usize) -> Result<()> {
    if actual < needed {
        return Err(Error::execution(
            format!("{kernel}: {what} holds {actual} elements, kernel accesses {needed}"),
            code::INVALID_MEM_OBJECT,
        ));
    }
    Ok(())
}

impl DeviceExecutor for HostExecutor {
    type Buffer = HostBuffer;

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn allocate(&self, len: usize, access: Access) -> Result<HostBuffer> {
        Ok(HostBuffer {
            data: RefCell::new(vec![0.0; len]),
            access,
        })
    }

    fn write(&self, buffer: &HostBuffer, data: &[f64]) -> Result<()> {
        let mut storage = buffer.data.borrow_mut();
        if data.len() > storage.len() {
            return Err(Error::execution(
                format!("write of {} elements into a buffer of {}", data.len(), storage.len()),
                code::INVALID_MEM_OBJECT,
            ));
        }
        storage[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, buffer: &HostBuffer, out: &mut [f64]) -> Result<()> {
        let storage = buffer.data.borrow();
        if out.len() > storage.len() {
            return Err(Error::execution(
                format!("read of {} elements from a buffer of {}", out.len(), storage.len()),
                code::INVALID_MEM_OBJECT,
            ));
        }
        out.copy_from_slice(&storage[..out.len()]);
        Ok(())
    }

    fn dispatch(
        &self,
        kernel: Kernel,
        grid: Grid,
        args: &[KernelArg<'_, HostBuffer>],
    ) -> Result<()> {
        let groups = grid.groups().ok_or_else(|| {
            Error::execution(
                format!(
                    "{kernel}: global size {:?} is not a multiple of local size {:?}",
                    grid.global, grid.local
                ),
                code::INVALID_WORK_GROUP_SIZE,
            )
        })?;
        let expected = self.expected_local(kernel);
        if grid.local != expected {
            return Err(Error::execution(
                format!(
                    "{kernel}: local size {:?} does not match the compiled work-group size {:?}",
                    grid.local, expected
                ),
                code::INVALID_WORK_GROUP_SIZE,
            ));
        }

        let (buffers, scalars) = split_args(kernel, args)?;
        let output_index = kernel.output_binding();
        for (index, buffer) in buffers.iter().enumerate() {
            let wanted = if index == output_index {
                Access::WriteOnly
            } else {
                Access::ReadOnly
            };
            if buffer.access != wanted {
                return Err(Error::execution(
                    format!(
                        "{kernel}: argument {index} is {:?}, kernel needs {wanted:?}",
                        buffer.access
                    ),
                    code::INVALID_MEM_OBJECT,
                ));
            }
        }

        let inputs: Vec<Vec<f64>> = buffers[..output_index]
            .iter()
            .map(|buffer| buffer.data.borrow().clone())
            .collect();
        let mut output = buffers[output_index].data.borrow_mut();
        let scalars: Vec<usize> = scalars.into_iter().map(|value| value as usize).collect();

        debug!(%kernel, ?groups, "host dispatch");
        match kernel {
            Kernel::BlockPrefixSum => {
                let len = scalars[0];
                require_len(kernel, "input", inputs[0].len(), len)?;
                require_len(kernel, "output", output.len(), len)?;
                block_prefix_sum(&inputs[0], &mut output, len, self.block_size, groups[0]);
            }
            Kernel::PartialCopy => {
                let (from_len, to_len) = (scalars[0], scalars[1]);
                require_len(kernel, "input", inputs[0].len(), from_len)?;
                require_len(kernel, "output", output.len(), to_len)?;
                let global = grid.global[0];
                partial_copy(&inputs[0], &mut output, from_len, to_len, self.block_size, global);
            }
            Kernel::BlockAdd => {
                let len = scalars[0];
                let blocks = div_rounded_up(len, self.block_size);
                require_len(kernel, "partial", inputs[0].len(), blocks)?;
                require_len(kernel, "input", inputs[1].len(), len)?;
                require_len(kernel, "output", output.len(), len)?;
                let global = grid.global[0];
                block_add(&inputs[0], &inputs[1], &mut output, len, self.block_size, global);
            }
            Kernel::Convolution => {
                let (n, m) = (scalars[0], scalars[1]);
                require_len(kernel, "matrix", inputs[0].len(), n * n)?;
                require_len(kernel, "mask", inputs[1].len(), m * m)?;
                require_len(kernel, "output", output.len(), n * n)?;
                convolution(&inputs[0], &inputs[1], &mut output, n, m, grid.global);
            }
        }
        Ok(())
    }
}

/// Hillis-Steele scan of each work-group's slice in a scratch buffer.
fn block_prefix_sum(input: &[f64], output: &mut [f64], len: usize, block: usize, groups: usize) {
    let mut scratch = vec![0.0; block];
    let mut addend = vec![0.0; block];
    for group in 0..groups {
        let base = group * block;
        for local in 0..block {
            let i = base + local;
            scratch[local] = if i < len { input[i] } else { 0.0 };
        }
        // barrier
        let mut offset = 1;
        while offset < block {
            for local in 0..block {
                addend[local] = if local >= offset {
                    scratch[local - offset]
                } else {
                    0.0
                };
            }
            // barrier
            for local in 0..block {
                scratch[local] += addend[local];
            }
            // barrier
            offset <<= 1;
        }
        for local in 0..block {
            let i = base + local;
            if i < len {
                output[i] = scratch[local];
            }
        }
    }
}

/// Work-item `i` that ends a block stores its value in slot `(i + 1) / B`.
/// Slot 0 is never written.
fn partial_copy(
    input: &[f64],
    output: &mut [f64],
    from_len: usize,
    to_len: usize,
    block: usize,
    global: usize,
) {
    for i in 0..global.min(from_len) {
        if (i + 1) % block == 0 {
            let slot = (i + 1) / block;
            if slot < to_len {
                output[slot] = input[i];
            }
        }
    }
}

fn block_add(
    partial: &[f64],
    input: &[f64],
    output: &mut [f64],
    len: usize,
    block: usize,
    global: usize,
) {
    for i in 0..global.min(len) {
        output[i] = input[i] + partial[i / block];
    }
}

fn convolution(
    a: &[f64],
    mask: &[f64],
    output: &mut [f64],
    n: usize,
    m: usize,
    global: [usize; 2],
) {
    let half = (m as isize - 1) / 2;
    for row in 0..global[0].min(n) {
        for col in 0..global[1].min(n) {
            let mut acc = 0.0;
            for k in 0..m {
                let r = row as isize + k as isize - half;
                if r < 0 || r >= n as isize {
                    continue;
                }
                for l in 0..m {
                    let c = col as isize + l as isize - half;
                    if c < 0 || c >= n as isize {
                        continue;
                    }
                    acc += a[r as usize * n + c as usize] * mask[k * m + l];
                }
            }
            output[row * n + col] = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(executor: &HostExecutor, data: &[f64]) -> HostBuffer {
        let buffer = executor.allocate(data.len(), Access::ReadOnly).unwrap();
        executor.write(&buffer, data).unwrap();
        buffer
    }

    fn download(executor: &HostExecutor, buffer: &HostBuffer) -> Vec<f64> {
        let mut out = vec![0.0; buffer.len()];
        executor.read(buffer, &mut out).unwrap();
        out
    }

    #[test]
    fn test_degenerate_block_sizes_rejected() {
        assert!(matches!(HostExecutor::new(0), Err(Error::DeviceInit(_))));
        assert!(matches!(HostExecutor::new(1), Err(Error::DeviceInit(_))));
        assert!(HostExecutor::new(2).is_ok());
    }

    #[test]
    fn test_write_then_read_is_exact() {
        let executor = HostExecutor::new(4).unwrap();
        let data = [0.1, -0.0, f64::MIN_POSITIVE, 1e300, f64::NAN];
        let buffer = upload(&executor, &data);
        let back = download(&executor, &buffer);
        for (a, b) in data.iter().zip(&back) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_block_prefix_sum_restarts_per_block() {
        let executor = HostExecutor::new(3).unwrap();
        let input = upload(&executor, &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 5.0]);
        let output = executor.allocate(7, Access::WriteOnly).unwrap();
        executor
            .dispatch(
                Kernel::BlockPrefixSum,
                Grid::linear(7, 3),
                &[KernelArg::Buffer(&input), KernelArg::Buffer(&output), KernelArg::Scalar(7)],
            )
            .unwrap();
        assert_eq!(download(&executor, &output), vec![1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 5.0]);
    }

    #[test]
    fn test_partial_copy_leaves_slot_zero() {
        let executor = HostExecutor::new(2).unwrap();
        let input = upload(&executor, &[1.0, 3.0, 3.0, 7.0, 5.0]);
        let output = executor.allocate(3, Access::WriteOnly).unwrap();
        executor.write(&output, &[-1.0, -1.0, -1.0]).unwrap();
        executor
            .dispatch(
                Kernel::PartialCopy,
                Grid::linear(5, 2),
                &[
                    KernelArg::Buffer(&input),
                    KernelArg::Buffer(&output),
                    KernelArg::Scalar(5),
                    KernelArg::Scalar(3),
                ],
            )
            .unwrap();
        assert_eq!(download(&executor, &output), vec![-1.0, 3.0, 7.0]);
    }

    #[test]
    fn test_block_add() {
        let executor = HostExecutor::new(2).unwrap();
        let partial = upload(&executor, &[0.0, 10.0, 20.0]);
        let input = upload(&executor, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let output = executor.allocate(5, Access::WriteOnly).unwrap();
        executor
            .dispatch(
                Kernel::BlockAdd,
                Grid::linear(5, 2),
                &[
                    KernelArg::Buffer(&partial),
                    KernelArg::Buffer(&input),
                    KernelArg::Buffer(&output),
                    KernelArg::Scalar(5),
                ],
            )
            .unwrap();
        assert_eq!(download(&executor, &output), vec![1.0, 2.0, 13.0, 14.0, 25.0]);
    }

    #[test]
    fn test_uneven_grid_rejected() {
        let executor = HostExecutor::new(4).unwrap();
        let input = upload(&executor, &[1.0; 6]);
        let output = executor.allocate(6, Access::WriteOnly).unwrap();
        let grid = Grid {
            global: [6, 1],
            local: [4, 1],
        };
        let err = executor
            .dispatch(
                Kernel::BlockPrefixSum,
                grid,
                &[KernelArg::Buffer(&input), KernelArg::Buffer(&output), KernelArg::Scalar(6)],
            )
            .unwrap_err();
        assert_eq!(err.code(), code::INVALID_WORK_GROUP_SIZE);
    }

    #[test]
    fn test_wrong_local_size_rejected() {
        let executor = HostExecutor::new(4).unwrap();
        let input = upload(&executor, &[1.0; 8]);
        let output = executor.allocate(8, Access::WriteOnly).unwrap();
        let err = executor
            .dispatch(
                Kernel::BlockPrefixSum,
                Grid::linear(8, 2),
                &[KernelArg::Buffer(&input), KernelArg::Buffer(&output), KernelArg::Scalar(8)],
            )
            .unwrap_err();
        assert_eq!(err.code(), code::INVALID_WORK_GROUP_SIZE);
    }

    #[test]
    fn test_write_to_read_only_rejected() {
        let executor = HostExecutor::new(4).unwrap();
        let input = upload(&executor, &[1.0; 4]);
        let output = upload(&executor, &[0.0; 4]);
        let err = executor
            .dispatch(
                Kernel::BlockPrefixSum,
                Grid::linear(4, 4),
                &[KernelArg::Buffer(&input), KernelArg::Buffer(&output), KernelArg::Scalar(4)],
            )
            .unwrap_err();
        assert!(matches!(err, Error::DeviceExecutionFailed { .. }));
        assert_eq!(err.code(), code::INVALID_MEM_OBJECT);
    }

    #[test]
    fn test_out_of_bounds_len_rejected() {
        let executor = HostExecutor::new(4).unwrap();
        let input = upload(&executor, &[1.0; 2]);
        let output = executor.allocate(8, Access::WriteOnly).unwrap();
        let err = executor
            .dispatch(
                Kernel::BlockPrefixSum,
                Grid::linear(8, 4),
                &[KernelArg::Buffer(&input), KernelArg::Buffer(&output), KernelArg::Scalar(8)],
            )
            .unwrap_err();
        assert_eq!(err.code(), code::INVALID_MEM_OBJECT);
    }

    #[test]
    fn test_convolution_identity_mask() {
        let executor = HostExecutor::new(4).unwrap();
        let data: Vec<f64> = (0..9).map(f64::from).collect();
        let a = upload(&executor, &data);
        let mask = upload(&executor, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let output = executor.allocate(9, Access::WriteOnly).unwrap();
        executor
            .dispatch(
                Kernel::Convolution,
                Grid::square(3, CONVOLUTION_TILE),
                &[
                    KernelArg::Buffer(&a),
                    KernelArg::Buffer(&mask),
                    KernelArg::Buffer(&output),
                    KernelArg::Scalar(3),
                    KernelArg::Scalar(3),
                ],
            )
            .unwrap();
        assert_eq!(download(&executor, &output), data);
    }
}
