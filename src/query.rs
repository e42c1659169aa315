//! Capability query orchestration
//!
//! Stands up a transient Vulkan instance, enumerates physical devices,
//! queries extended properties per device through a runtime-resolved
//! entry point, and tears the instance down again. The instance lives in
//! a scope guard, so teardown runs exactly once on every exit path,
//! success or failure, and the resolver cache is discarded with it.
//!
//! Any driver-call failure during enumeration or a per-device query is
//! fatal to the whole query; partial results are never returned.

use std::collections::BTreeMap;
use std::ffi::c_char;

use ash::vk;
use ash::Entry;
use serde::Serialize;

use crate::error::CapsErrorKind;
use crate::introspect::{self, Flat};
use crate::marshal::{self, coerce, KeepAliveSet, Value};
use crate::resolver::{ProcResolver, PropertiesQuery};

/// One supported device extension.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionInfo {
    pub name: String,
    pub version: u32,
}

/// Per-device capability summary. Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceCapabilities {
    pub device_name: String,
    pub device_id: u32,
    pub extensions: Vec<ExtensionInfo>,
    /// Flattened `VkPhysicalDeviceLimits` mapping
    pub limits: Flat,
    /// Subgroup size, supported stages/operations, and the cross-stage
    /// quad-operation flag; null when the extended query is unavailable
    pub subgroup_properties: Flat,
}

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";
const LEGACY_VALIDATION_LAYER: &str = "VK_LAYER_LUNARG_standard_validation";

/// Instance extensions requested for the transient context.
const INSTANCE_EXTENSIONS: [&str; 2] = ["VK_KHR_surface", "VK_EXT_debug_report"];

const PROPERTIES2_ENTRY_POINT: &str = "vkGetPhysicalDeviceProperties2";

/// Owns the transient instance and everything scoped to it. Dropping
/// the guard destroys the instance and discards the resolver cache, so
/// stale function pointers cannot outlive it.
struct InstanceGuard {
    entry: Entry,
    instance: ash::Instance,
    resolver: ProcResolver,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        log::debug!("Destroying transient capability-query instance");
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

/// Query available Vulkan capability information for any or all GPUs.
///
/// With no filter, one record is produced per enumerated physical
/// device, keyed by enumeration index. With a filter, only devices
/// whose numeric id or enumeration index matches are queried; a filter
/// matching nothing yields an empty mapping, not an error.
///
/// # Errors
///
/// * [`CapsErrorKind::EntryLoadFailed`] when no Vulkan loader is
///   available.
/// * [`CapsErrorKind::DriverCallFailure`] when any driver call reports
///   an error status. The transient instance is torn down before the
///   failure reaches the caller.
pub fn get_gpu_info(
    device_filter: Option<u32>,
) -> Result<BTreeMap<usize, DeviceCapabilities>, CapsErrorKind> {
    let entry = unsafe { Entry::load() }
        .map_err(|e| CapsErrorKind::EntryLoadFailed(format!("{e}")))?;

    let layer_properties = unsafe { entry.enumerate_instance_layer_properties() }?;
    let available_layers: Vec<String> = layer_properties
        .iter()
        .map(|l| fixed_cstr(&l.layer_name))
        .collect();
    let layers = select_validation_layers(&available_layers);
    log::info!("Enabling validation layers: {layers:?}");

    let extension_properties = unsafe { entry.enumerate_instance_extension_properties(None) }?;
    log::debug!(
        "Driver reports {} instance extension(s)",
        extension_properties.len()
    );

    // Build the layer and extension name arrays through the coercer;
    // the keepalive set pins them for the duration of instance creation.
    let mut keepalive = KeepAliveSet::new();

    let layer_values = Value::Seq(layers.iter().map(|s| Value::Str(s.clone())).collect());
    let (layers_arg, layers_token) = coerce(&layer_values, &marshal::CHAR_PTR_ARRAY)?;
    keepalive.register(&layers_arg, layers_token);

    let extension_values = Value::Seq(
        INSTANCE_EXTENSIONS
            .iter()
            .map(|s| Value::Str(s.to_string()))
            .collect(),
    );
    let (extensions_arg, extensions_token) = coerce(&extension_values, &marshal::CHAR_PTR_ARRAY)?;
    keepalive.register(&extensions_arg, extensions_token);

    // Static application descriptor; not caller-configurable.
    let app_info = vk::ApplicationInfo::default()
        .application_name(c"vulkan-caps")
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(c"No Engine")
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    let mut create_info = vk::InstanceCreateInfo::default().application_info(&app_info);
    create_info.enabled_layer_count = layers.len() as u32;
    create_info.pp_enabled_layer_names = layers_arg.as_ptr() as *const *const c_char;
    create_info.enabled_extension_count = INSTANCE_EXTENSIONS.len() as u32;
    create_info.pp_enabled_extension_names = extensions_arg.as_ptr() as *const *const c_char;

    let instance = unsafe { entry.create_instance(&create_info, None) }?;
    drop(keepalive);

    log::info!("Created transient capability-query instance");

    let resolver = ProcResolver::new(instance.handle());
    let mut guard = InstanceGuard {
        entry,
        instance,
        resolver,
    };

    // The guard tears the instance down on both the success and the
    // failure path.
    query_devices(&mut guard, device_filter)
}

fn query_devices(
    guard: &mut InstanceGuard,
    device_filter: Option<u32>,
) -> Result<BTreeMap<usize, DeviceCapabilities>, CapsErrorKind> {
    let physical_devices = unsafe { guard.instance.enumerate_physical_devices() }?;
    log::info!("Enumerated {} physical device(s)", physical_devices.len());

    let mut gpu_info = BTreeMap::new();

    for (index, &physical_device) in physical_devices.iter().enumerate() {
        let base = unsafe { guard.instance.get_physical_device_properties(physical_device) };
        let device_name = fixed_cstr(&base.device_name);

        if !filter_matches(device_filter, base.device_id, index) {
            log::debug!("Skipping device {index} ({device_name}): filter mismatch");
            continue;
        }

        log::info!("Querying device {index}: {device_name} (id {:#x})", base.device_id);

        let extension_properties = unsafe {
            guard
                .instance
                .enumerate_device_extension_properties(physical_device)
        }?;
        let extensions = extension_properties
            .iter()
            .map(|e| ExtensionInfo {
                name: fixed_cstr(&e.extension_name),
                version: e.spec_version,
            })
            .collect();

        let properties_fn = guard
            .resolver
            .resolve(&guard.entry, PROPERTIES2_ENTRY_POINT)?;

        // Chain a subgroup-properties node onto the extended query and
        // read both structures back separately.
        let mut subgroup = vk::PhysicalDeviceSubgroupProperties::default();
        let mut properties = vk::PhysicalDeviceProperties2::default();
        marshal::push_extension_node(&mut properties, &mut subgroup)?;

        let (limits, subgroup_properties) =
            match properties_fn.call(physical_device, Some(&mut properties))? {
                PropertiesQuery::FilledInPlace | PropertiesQuery::Filled(_) => {
                    let flat_properties =
                        introspect::device_properties_mapping(&properties.properties);
                    let limits = flat_properties
                        .get("limits")
                        .cloned()
                        .unwrap_or(Flat::Null);
                    let node = unsafe { marshal::find_subgroup_node(properties.p_next) }
                        .ok_or_else(|| {
                            CapsErrorKind::TypeMismatch(
                                "subgroup node missing from returned chain".to_string(),
                            )
                        })?;
                    (limits, introspect::subgroup_mapping(node))
                }
                PropertiesQuery::ExtensionNotPresent => {
                    // Extended query unavailable: fall back to the base
                    // limits and report no subgroup data.
                    log::warn!(
                        "{PROPERTIES2_ENTRY_POINT} not present; reporting base limits only"
                    );
                    (introspect::limits_mapping(&base.limits), Flat::Null)
                }
            };

        gpu_info.insert(
            index,
            DeviceCapabilities {
                device_name,
                device_id: base.device_id,
                extensions,
                limits,
                subgroup_properties,
            },
        );
    }

    Ok(gpu_info)
}

/// Layer preference: canonical validation layer, then the legacy name,
/// then none.
fn select_validation_layers(available: &[String]) -> Vec<String> {
    if available.iter().any(|l| l == VALIDATION_LAYER) {
        vec![VALIDATION_LAYER.to_string()]
    } else if available.iter().any(|l| l == LEGACY_VALIDATION_LAYER) {
        vec![LEGACY_VALIDATION_LAYER.to_string()]
    } else {
        Vec::new()
    }
}

/// A device matches when no filter is supplied, or when the filter
/// equals its numeric id or its enumeration index.
fn filter_matches(filter: Option<u32>, device_id: u32, index: usize) -> bool {
    match filter {
        None => true,
        Some(wanted) => wanted == device_id || wanted as usize == index,
    }
}

/// Convert a fixed-size NUL-terminated `char` array to an owned string.
fn fixed_cstr(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_preference_order() {
        let both = vec![
            LEGACY_VALIDATION_LAYER.to_string(),
            VALIDATION_LAYER.to_string(),
        ];
        assert_eq!(select_validation_layers(&both), vec![VALIDATION_LAYER]);

        let legacy_only = vec![LEGACY_VALIDATION_LAYER.to_string()];
        assert_eq!(
            select_validation_layers(&legacy_only),
            vec![LEGACY_VALIDATION_LAYER]
        );

        let none = vec!["VK_LAYER_MESA_overlay".to_string()];
        assert!(select_validation_layers(&none).is_empty());
    }

    #[test]
    fn test_filter_matches_id_or_index() {
        assert!(filter_matches(None, 0x1b80, 0));
        assert!(filter_matches(Some(0x1b80), 0x1b80, 3));
        assert!(filter_matches(Some(3), 0x1b80, 3));
        assert!(!filter_matches(Some(2), 0x1b80, 3));
    }

    #[test]
    fn test_fixed_cstr_stops_at_nul() {
        let mut raw = [0 as c_char; 8];
        raw[0] = b'g' as c_char;
        raw[1] = b'p' as c_char;
        raw[2] = b'u' as c_char;
        assert_eq!(fixed_cstr(&raw), "gpu");
    }
}
