//! Device limits consumed by the GPU manager
//!
//! The higher-level compute library surfaces only a narrow set of device
//! properties. The limits it cannot reach through its own native layer
//! are pulled from one capability record here, once, at initialization.

use serde::Serialize;

use crate::error::CapsErrorKind;
use crate::introspect::Flat;
use crate::query::{get_gpu_info, DeviceCapabilities};

/// The compute-relevant device limits the GPU manager needs.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeviceLimits {
    /// Shared-memory bytes per workgroup; typical 49152. Sizes shared
    /// arrays in reduction shaders.
    pub max_compute_shared_memory_size: u64,
    /// Push-constant bytes; AMD is often 128 while NVIDIA is 256, so
    /// some shaders may need to be split on AMD.
    pub max_push_constants_size: u64,
    pub max_compute_work_group_invocations: u64,
}

impl DeviceLimits {
    /// Query the limits for one device by numeric id or enumeration
    /// index.
    pub fn query(device: u32) -> Result<Self, CapsErrorKind> {
        let gpu_info = get_gpu_info(Some(device))?;
        let record = gpu_info.values().next().ok_or_else(|| {
            CapsErrorKind::InitializationFailed(format!("no device matches filter {device}"))
        })?;
        Self::from_capabilities(record)
    }

    /// Extract the limits out of an already-built capability record.
    pub fn from_capabilities(capabilities: &DeviceCapabilities) -> Result<Self, CapsErrorKind> {
        Ok(Self {
            max_compute_shared_memory_size: require_limit(
                &capabilities.limits,
                "maxComputeSharedMemorySize",
            )?,
            max_push_constants_size: require_limit(&capabilities.limits, "maxPushConstantsSize")?,
            max_compute_work_group_invocations: require_limit(
                &capabilities.limits,
                "maxComputeWorkGroupInvocations",
            )?,
        })
    }
}

fn require_limit(limits: &Flat, key: &str) -> Result<u64, CapsErrorKind> {
    limits
        .get(key)
        .and_then(Flat::as_u64)
        .ok_or_else(|| CapsErrorKind::MissingLimit(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::limits_mapping;

    fn sample_record() -> DeviceCapabilities {
        let limits = ash::vk::PhysicalDeviceLimits {
            max_compute_shared_memory_size: 49152,
            max_push_constants_size: 128,
            max_compute_work_group_invocations: 1024,
            ..Default::default()
        };
        DeviceCapabilities {
            device_name: "test gpu".to_string(),
            device_id: 0x1b80,
            extensions: Vec::new(),
            limits: limits_mapping(&limits),
            subgroup_properties: Flat::Null,
        }
    }

    #[test]
    fn test_limits_from_record() {
        let limits = DeviceLimits::from_capabilities(&sample_record()).unwrap();
        assert_eq!(limits.max_compute_shared_memory_size, 49152);
        assert_eq!(limits.max_push_constants_size, 128);
        assert_eq!(limits.max_compute_work_group_invocations, 1024);
    }

    #[test]
    fn test_missing_limit_is_reported() {
        let mut record = sample_record();
        record.limits = Flat::Null;
        let err = DeviceLimits::from_capabilities(&record);
        assert!(matches!(err, Err(CapsErrorKind::MissingLimit(_))));
    }
}
