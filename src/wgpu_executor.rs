use std::collections::HashMap;

use bytemuck;
use futures::executor::block_on;
use tracing::debug;
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, CommandEncoderDescriptor, ComputePassDescriptor,
    ComputePipeline, ComputePipelineDescriptor, ErrorFilter, ShaderModuleDescriptor, ShaderSource,
};

use super::context::WgContext;
use super::device_vec::DeviceVec;
use crate::error::{code, Error, Result};
use crate::executor::{
    div_rounded_up, split_args, Access, DeviceExecutor, Grid, Kernel, KernelArg,
    CONVOLUTION_TILE, MIN_BLOCK_SIZE,
};
use crate::shaders;

/// Compile-time parameters of a [`Program`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    /// Work-group size of the scan kernels.
    pub block_size: usize,
}

/// One compute pipeline per [`Kernel`], all built for the same block size.
pub struct Program {
    pipelines: HashMap<Kernel, ComputePipeline>,
    options: CompileOptions,
}

impl Program {
    pub fn compile(context: &WgContext, options: CompileOptions) -> Result<Self> {
        let mut pipelines = HashMap::new();
        for kernel in Kernel::ALL {
            let (pipeline, failure) = with_error_scope(&context.device, || {
                let shader = context.device.create_shader_module(ShaderModuleDescriptor {
                    label: Some(kernel.name()),
                    source: ShaderSource::Wgsl(shaders::source(kernel, options.block_size).into()),
                });
                context
                    .device
                    .create_compute_pipeline(&ComputePipelineDescriptor {
                        label: Some(kernel.name()),
                        layout: None,
                        module: &shader,
                        entry_point: "main",
                    })
            });
            if let Some(e) = failure {
                return Err(Error::Compile {
                    kernel,
                    message: e.to_string(),
                });
            }
            debug!(%kernel, block_size = options.block_size, "compiled");
            pipelines.insert(kernel, pipeline);
        }
        Ok(Self { pipelines, options })
    }
}

/// Runs `f` inside validation and out-of-memory error scopes and returns the
/// first error the device recorded.
fn with_error_scope<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(ErrorFilter::OutOfMemory);
    device.push_error_scope(ErrorFilter::Validation);
    let value = f();
    let validation = block_on(device.pop_error_scope());
    let out_of_memory = block_on(device.pop_error_scope());
    (value, validation.or(out_of_memory))
}

fn execution_error(context: &str, e: wgpu::Error) -> Error {
    let code = match e {
        wgpu::Error::OutOfMemory { .. } => code::OUT_OF_RESOURCES,
        wgpu::Error::Validation { .. } => code::INVALID_KERNEL_ARGS,
    };
    Error::execution(format!("{context}: {e}"), code)
}

/// [`DeviceExecutor`] backed by a `wgpu` device.
pub struct WgpuExecutor {
    context: WgContext,
    program: Program,
}

impl WgpuExecutor {
    pub fn new(context: WgContext, options: CompileOptions) -> Result<Self> {
        check_limits(&context.limits, options.block_size)?;
        let program = Program::compile(&context, options)?;
        Ok(Self { context, program })
    }

    fn compiled_local(&self, kernel: Kernel) -> [usize; 2] {
        match kernel {
            Kernel::Convolution => [CONVOLUTION_TILE, CONVOLUTION_TILE],
            _ => [self.program.options.block_size, 1],
        }
    }
}

fn check_limits(limits: &wgpu::Limits, block_size: usize) -> Result<()> {
    let scratch_bytes = block_size * std::mem::size_of::<f64>();
    let tile_invocations = CONVOLUTION_TILE * CONVOLUTION_TILE;
    if block_size < MIN_BLOCK_SIZE {
        return Err(Error::DeviceInit(format!(
            "block size must be at least {MIN_BLOCK_SIZE}, got {block_size}"
        )));
    }
    if block_size > limits.max_compute_workgroup_size_x as usize
        || block_size > limits.max_compute_invocations_per_workgroup as usize
    {
        return Err(Error::DeviceInit(format!(
            "block size {block_size} exceeds the device work-group limit of {}",
            limits
                .max_compute_workgroup_size_x
                .min(limits.max_compute_invocations_per_workgroup)
        )));
    }
    if scratch_bytes > limits.max_compute_workgroup_storage_size as usize {
        return Err(Error::DeviceInit(format!(
            "block size {block_size} needs {scratch_bytes} bytes of work-group storage, device has {}",
            limits.max_compute_workgroup_storage_size
        )));
    }
    if tile_invocations > limits.max_compute_invocations_per_workgroup as usize
        || CONVOLUTION_TILE > limits.max_compute_workgroup_size_y as usize
    {
        return Err(Error::DeviceInit(format!(
            "device cannot run {CONVOLUTION_TILE}x{CONVOLUTION_TILE} work-groups"
        )));
    }
    Ok(())
}

/// Lays a one-dimensional launch of `groups[0]` work-groups over X and Y when
/// it exceeds `max_per_dim`. The scan kernels recover the block index as
/// `x + y * num_x`; surplus groups land past the array end and do nothing.
fn fold_groups(groups: [usize; 2], max_per_dim: usize, local: usize) -> Option<[usize; 2]> {
    let [count, rows] = groups;
    if rows != 1 || max_per_dim == 0 {
        return None;
    }
    let rows = div_rounded_up(count, max_per_dim).max(1);
    if rows > max_per_dim {
        return None;
    }
    let columns = div_rounded_up(count, rows);
    // Flattened work-item indices are 32-bit on the device.
    let invocations = (columns as u64) * (rows as u64) * (local as u64);
    if invocations > u64::from(u32::MAX) + 1 {
        return None;
    }
    Some([columns, rows])
}

impl DeviceExecutor for WgpuExecutor {
    type Buffer = DeviceVec<f64>;

    fn block_size(&self) -> usize {
        self.program.options.block_size
    }

    fn allocate(&self, len: usize, access: Access) -> Result<DeviceVec<f64>> {
        let (buffer, failure) =
            with_error_scope(&self.context.device, || DeviceVec::new(&self.context, len, access));
        match failure {
            Some(e) => Err(execution_error("allocate", e)),
            None => Ok(buffer),
        }
    }

    fn write(&self, buffer: &DeviceVec<f64>, data: &[f64]) -> Result<()> {
        let (result, failure) = with_error_scope(&self.context.device, || {
            buffer.copy_from_slice(&self.context, data)
        });
        result?;
        failure.map_or(Ok(()), |e| Err(execution_error("write", e)))
    }

    fn read(&self, buffer: &DeviceVec<f64>, out: &mut [f64]) -> Result<()> {
        let (result, failure) = with_error_scope(&self.context.device, || {
            buffer.copy_to_slice(&self.context, out)
        });
        result?;
        failure.map_or(Ok(()), |e| Err(execution_error("read", e)))
    }

    fn dispatch(
        &self,
        kernel: Kernel,
        grid: Grid,
        args: &[KernelArg<'_, DeviceVec<f64>>],
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
        let expected = self.compiled_local(kernel);
        if grid.local != expected {
            return Err(Error::execution(
                format!(
                    "{kernel}: local size {:?} does not match the compiled work-group size {:?}",
                    grid.local, expected
                ),
                code::INVALID_WORK_GROUP_SIZE,
            ));
        }
        let max_groups = self.context.limits.max_compute_workgroups_per_dimension as usize;
        let shape = match kernel {
            Kernel::Convolution => Some(groups).filter(|g| g.iter().all(|&c| c <= max_groups)),
            _ => fold_groups(groups, max_groups, grid.local[0]),
        };
        let shape = shape.ok_or_else(|| {
            Error::execution(
                format!("{kernel}: {groups:?} work-groups exceed the device limit of {max_groups}"),
                code::INVALID_GLOBAL_WORK_SIZE,
            )
        })?;

        let (buffers, scalars) = split_args(kernel, args)?;
        let output_index = kernel.output_binding();
        for (index, buffer) in buffers.iter().enumerate() {
            let wanted = if index == output_index {
                Access::WriteOnly
            } else {
                Access::ReadOnly
            };
            if buffer.access() != wanted {
                return Err(Error::execution(
                    format!(
                        "{kernel}: argument {index} is {:?}, kernel needs {wanted:?}",
                        buffer.access()
                    ),
                    code::INVALID_MEM_OBJECT,
                ));
            }
        }
        if groups.contains(&0) {
            return Ok(());
        }

        let mut params = [0u32; 4];
        params[..scalars.len()].copy_from_slice(&scalars);

        let device = &self.context.device;
        let pipeline = &self.program.pipelines[&kernel];

        let ((), failure) = with_error_scope(device, || {
            let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("KernelParams"),
                contents: bytemuck::cast_slice(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let mut entries: Vec<BindGroupEntry<'_>> = buffers
                .iter()
                .enumerate()
                .map(|(binding, buffer)| BindGroupEntry {
                    binding: binding as u32,
                    resource: buffer.buffer.as_entire_binding(),
                })
                .collect();
            entries.push(BindGroupEntry {
                binding: buffers.len() as u32,
                resource: params_buffer.as_entire_binding(),
            });

            let bind_group = device.create_bind_group(&BindGroupDescriptor {
                label: Some(kernel.name()),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &entries,
            });

            let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
                label: Some(kernel.name()),
            });
            {
                let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                    label: Some(kernel.name()),
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(shape[0] as u32, shape[1] as u32, 1);
            }

            self.context.queue.submit(std::iter::once(encoder.finish()));
            device.poll(wgpu::Maintain::Wait);
        });

        debug!(%kernel, ?groups, ?shape, "dispatched");
        failure.map_or(Ok(()), |e| Err(execution_error(kernel.name(), e)))
    }
}
