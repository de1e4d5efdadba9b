//! Per-invocation buffer management around [`DeviceExecutor::dispatch`].
//!
//! A [`KernelCall`] owns every device buffer of one kernel invocation: inputs
//! are uploaded as soon as they are added, outputs are allocated empty, and
//! all of them are released when the finished call is dropped.

use tracing::trace;

use crate::error::{code, Error, Result};
use crate::executor::{Access, DeviceExecutor, Grid, Kernel, KernelArg};

pub struct KernelCall<'e, E: DeviceExecutor> {
    executor: &'e E,
    kernel: Kernel,
    buffers: Vec<(E::Buffer, usize)>,
    scalars: Vec<u32>,
}

impl<'e, E: DeviceExecutor> KernelCall<'e, E> {
    pub fn new(executor: &'e E, kernel: Kernel) -> Self {
        Self {
            executor,
            kernel,
            buffers: Vec::new(),
            scalars: Vec::new(),
        }
    }

    /// Adds a read-only buffer holding a copy of `data`.
    pub fn input(mut self, data: &[f64]) -> Result<Self> {
        let buffer = self.executor.allocate(data.len(), Access::ReadOnly)?;
        self.executor.write(&buffer, data)?;
        self.buffers.push((buffer, data.len()));
        Ok(self)
    }

    /// Adds a write-only buffer of `len` elements.
    pub fn output(mut self, len: usize) -> Result<Self> {
        let buffer = self.executor.allocate(len, Access::WriteOnly)?;
        self.buffers.push((buffer, len));
        Ok(self)
    }

    /// Adds a size argument.
    pub fn scalar(mut self, value: usize) -> Result<Self> {
        let value = u32::try_from(value).map_err(|_| {
            Error::execution(
                format!("{}: scalar {value} does not fit in 32 bits", self.kernel),
                code::INVALID_GLOBAL_WORK_SIZE,
            )
        })?;
        self.scalars.push(value);
        Ok(self)
    }

    /// Runs the kernel and waits for it.
    pub fn launch(self, grid: Grid) -> Result<FinishedCall<'e, E>> {
        trace!(kernel = %self.kernel, ?grid, "launch");
        let args: Vec<KernelArg<'_, E::Buffer>> = self
            .buffers
            .iter()
            .map(|(buffer, _)| KernelArg::Buffer(buffer))
            .chain(self.scalars.iter().map(|&value| KernelArg::Scalar(value)))
            .collect();
        self.executor.dispatch(self.kernel, grid, &args)?;
        drop(args);
        Ok(FinishedCall {
            executor: self.executor,
            kernel: self.kernel,
            buffers: self.buffers,
        })
    }
}

/// A completed invocation whose buffers can still be read back.
pub struct FinishedCall<'e, E: DeviceExecutor> {
    executor: &'e E,
    kernel: Kernel,
    buffers: Vec<(E::Buffer, usize)>,
}

impl<E: DeviceExecutor> FinishedCall<'_, E> {
    /// Copies buffer argument `index` back into `out`.
    pub fn read(&self, index: usize, out: &mut [f64]) -> Result<()> {
        let (buffer, len) = self.buffers.get(index).ok_or_else(|| {
            Error::execution(
                format!("{}: no buffer argument {index}", self.kernel),
                code::INVALID_KERNEL_ARGS,
            )
        })?;
        if out.len() > *len {
            return Err(Error::execution(
                format!(
                    "{}: reading {} elements from a buffer of {len}",
                    self.kernel,
                    out.len()
                ),
                code::INVALID_MEM_OBJECT,
            ));
        }
        self.executor.read(buffer, out)
    }

    /// Copies the kernel's output buffer back into `out`.
    pub fn read_output(&self, out: &mut [f64]) -> Result<()> {
        self.read(self.kernel.output_binding(), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_executor::HostExecutor;

    #[test]
    fn test_buffers_round_trip_through_call() {
        let executor = HostExecutor::new(4).unwrap();
        let finished = KernelCall::new(&executor, Kernel::BlockPrefixSum)
            .input(&[1.0, 2.0, 3.0])
            .unwrap()
            .output(3)
            .unwrap()
            .scalar(3)
            .unwrap()
            .launch(Grid::linear(3, 4))
            .unwrap();

        let mut input = [0.0; 3];
        finished.read(0, &mut input).unwrap();
        assert_eq!(input, [1.0, 2.0, 3.0]);

        let mut output = [0.0; 3];
        finished.read_output(&mut output).unwrap();
        assert_eq!(output, [1.0, 3.0, 6.0]);
    }

    #[test]
    fn test_read_past_end_fails() {
        let executor = HostExecutor::new(4).unwrap();
        let finished = KernelCall::new(&executor, Kernel::BlockPrefixSum)
            .input(&[1.0])
            .unwrap()
            .output(1)
            .unwrap()
            .scalar(1)
            .unwrap()
            .launch(Grid::linear(1, 4))
            .unwrap();
        let mut out = [0.0; 2];
        let err = finished.read_output(&mut out).unwrap_err();
        assert_eq!(err.code(), code::INVALID_MEM_OBJECT);
        assert!(finished.read(5, &mut out[..1]).is_err());
    }

    #[test]
    fn test_scalar_overflow() {
        let executor = HostExecutor::new(4).unwrap();
        let result = KernelCall::new(&executor, Kernel::BlockPrefixSum).scalar(usize::MAX);
        if usize::BITS > 32 {
            assert!(result.is_err());
        }
    }
}
