use tracing::{error, info};
use wgpu::{
    DeviceDescriptor, Features, Instance, InstanceDescriptor, PowerPreference,
    RequestAdapterOptions,
};

use crate::error::{Error, Result};

/// An adapter, device and queue capable of 64-bit float compute.
pub struct WgContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub limits: wgpu::Limits,
}

impl WgContext {
    pub async fn new() -> Result<Self> {
        Self::with_power_preference(PowerPreference::HighPerformance).await
    }

    pub async fn with_power_preference(power_preference: PowerPreference) -> Result<Self> {
        let instance = Instance::new(InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| Error::DeviceInit("no compatible adapter found".into()))?;

        let adapter_info = adapter.get_info();
        if !adapter.features().contains(Features::SHADER_F64) {
            return Err(Error::DeviceInit(format!(
                "adapter `{}` does not support 64-bit floats in shaders",
                adapter_info.name
            )));
        }

        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("wgscan"),
                    features: Features::SHADER_F64,
                    limits: limits.clone(),
                },
                None,
            )
            .await
            .map_err(|e| Error::DeviceInit(e.to_string()))?;

        // Errors outside an error scope are logged, not panicked on.
        device.on_uncaptured_error(Box::new(|e: wgpu::Error| {
            error!("uncaptured device error: {e}")
        }));

        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "using adapter"
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
            limits,
        })
    }
}
