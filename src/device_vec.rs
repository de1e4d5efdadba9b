use super::context::WgContext;
use super::executor::Access;
use crate::error::{code, Error, Result};

use bytemuck;
use futures::channel::oneshot;
use futures::executor::block_on;
use std::mem::size_of;
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{Buffer, BufferDescriptor, BufferUsages, CommandEncoderDescriptor};

/// A typed storage buffer on the device.
///
/// The allocation is never smaller than one element so that empty vectors
/// can still be bound.
pub struct DeviceVec<T>
where
    T: bytemuck::Pod + bytemuck::Zeroable,
{
    pub buffer: Buffer,
    len: usize,
    access: Access,
    phantom: std::marker::PhantomData<T>,
}

impl<T> DeviceVec<T>
where
    T: bytemuck::Pod + bytemuck::Zeroable,
{
    pub fn new(context: &WgContext, len: usize, access: Access) -> Self {
        let buffer = context.device.create_buffer(&BufferDescriptor {
            label: Some("DeviceVec"),
            size: size_of::<T>() as u64 * len.max(1) as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            len,
            access,
            phantom: std::marker::PhantomData,
        }
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn copy_from_slice(&self, context: &WgContext, slice: &[T]) -> Result<()> {
        if slice.len() > self.len {
            return Err(Error::execution(
                format!("write of {} elements into a buffer of {}", slice.len(), self.len),
                code::INVALID_MEM_OBJECT,
            ));
        }
        if slice.is_empty() {
            return Ok(());
        }

        let mut encoder = context
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("DeviceVecUpload"),
            });

        let staging = context.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("DeviceVecStaging"),
            contents: bytemuck::cast_slice(slice),
            usage: BufferUsages::COPY_SRC,
        });

        encoder.copy_buffer_to_buffer(
            &staging,
            0,
            &self.buffer,
            0,
            (size_of::<T>() * slice.len()) as u64,
        );

        context.queue.submit(std::iter::once(encoder.finish()));
        context.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    pub fn copy_to_slice(&self, context: &WgContext, slice: &mut [T]) -> Result<()> {
        if slice.len() > self.len {
            return Err(Error::execution(
                format!("read of {} elements from a buffer of {}", slice.len(), self.len),
                code::INVALID_MEM_OBJECT,
            ));
        }
        if slice.is_empty() {
            return Ok(());
        }

        let size = (size_of::<T>() * slice.len()) as u64;
        let mut encoder = context
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("DeviceVecReadback"),
            });

        let staging = context.device.create_buffer(&BufferDescriptor {
            label: Some("DeviceVecReadbackStaging"),
            size,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);

        context.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging.slice(..);
        let (tx, rx) = oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });

        context.device.poll(wgpu::Maintain::Wait);

        block_on(rx)
            .map_err(|_| Error::execution("map_async callback dropped", code::MAP_FAILURE))?
            .map_err(|e| {
                Error::execution(format!("buffer mapping failed: {e}"), code::MAP_FAILURE)
            })?;

        {
            let mapped = buffer_slice.get_mapped_range();
            slice.copy_from_slice(bytemuck::cast_slice(&mapped));
        }
        staging.unmap();
        Ok(())
    }
}
