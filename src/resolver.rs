//! Runtime resolution of driver extension entry points
//!
//! Extension functions are not statically linked; they are looked up per
//! instance through `vkGetInstanceProcAddr` and may be absent depending
//! on driver support. A failed lookup is not an error here: the resolver
//! always hands back a callable, and invoking one whose underlying
//! pointer is null yields [`PropertiesQuery::ExtensionNotPresent`] so
//! callers can branch on availability without error-based control flow.
//!
//! Resolutions are memoized per instance. The cache lives inside
//! [`ProcResolver`], which the query orchestrator owns alongside the
//! instance and drops with it, so a stale pointer bound to a destroyed
//! instance can never be invoked.

use std::collections::HashMap;
use std::ffi::c_char;

use ash::vk::{self, Handle};
use ash::Entry;

use crate::error::CapsErrorKind;
use crate::marshal::{self, coerce, KeepAliveSet, StructKind, Value};

/// Outcome of invoking a resolved extended-properties function.
#[derive(Debug)]
pub enum PropertiesQuery {
    /// No output structure was supplied; the wrapper allocated one,
    /// invoked the call, and returns it filled by value.
    Filled(vk::PhysicalDeviceProperties2<'static>),
    /// The caller-supplied structure was filled in place.
    FilledInPlace,
    /// The driver returned a null function pointer for this entry point.
    /// The capability is simply unavailable; not an error.
    ExtensionNotPresent,
}

/// A safely-callable wrapper around a resolved (possibly absent)
/// `vkGetPhysicalDeviceProperties2` entry point.
pub struct PropertiesFn {
    raw: Option<vk::PFN_vkGetPhysicalDeviceProperties2>,
}

impl PropertiesFn {
    pub(crate) fn new(raw: Option<vk::PFN_vkGetPhysicalDeviceProperties2>) -> Self {
        Self { raw }
    }

    /// Whether the driver exposed this entry point.
    pub fn is_present(&self) -> bool {
        self.raw.is_some()
    }

    /// Invoke the resolved function.
    ///
    /// Two calling modes, both preserved from the underlying driver
    /// convention:
    ///
    /// * `properties: None`: a fresh output structure is allocated,
    ///   filled, and returned by value ([`PropertiesQuery::Filled`]).
    /// * `properties: Some(..)`: the supplied structure (and any
    ///   extension chain linked through its `next` pointer) is filled in
    ///   place ([`PropertiesQuery::FilledInPlace`]). This is the mode
    ///   that lets callers chain extension structures.
    ///
    /// Arguments travel through the coercer against the native call
    /// signature; the keepalive entries are dropped once the call
    /// returns.
    pub fn call(
        &self,
        device: vk::PhysicalDevice,
        properties: Option<&mut vk::PhysicalDeviceProperties2<'_>>,
    ) -> Result<PropertiesQuery, CapsErrorKind> {
        let Some(function) = self.raw else {
            return Ok(PropertiesQuery::ExtensionNotPresent);
        };

        let mut keepalive = KeepAliveSet::new();
        let device_value = Value::Handle {
            raw: device.as_raw(),
            pointee: StructKind::PhysicalDevice,
        };
        let (device_arg, device_token) = coerce(&device_value, &marshal::PHYSICAL_DEVICE_PTR)?;
        keepalive.register(&device_arg, device_token);

        match properties {
            Some(supplied) => {
                let value = Value::Struct {
                    addr: (supplied as *mut vk::PhysicalDeviceProperties2).cast(),
                    kind: StructKind::PhysicalDeviceProperties2,
                };
                let (out_arg, out_token) = coerce(&value, &marshal::PROPERTIES2_PTR)?;
                keepalive.register(&out_arg, out_token);
                unsafe {
                    function(
                        vk::PhysicalDevice::from_raw(device_arg.as_raw()),
                        out_arg.as_ptr() as *mut vk::PhysicalDeviceProperties2,
                    );
                }
                Ok(PropertiesQuery::FilledInPlace)
            }
            None => {
                let mut fresh = vk::PhysicalDeviceProperties2::default();
                let value = Value::Struct {
                    addr: (&mut fresh as *mut vk::PhysicalDeviceProperties2).cast(),
                    kind: StructKind::PhysicalDeviceProperties2,
                };
                let (out_arg, out_token) = coerce(&value, &marshal::PROPERTIES2_PTR)?;
                keepalive.register(&out_arg, out_token);
                unsafe {
                    function(
                        vk::PhysicalDevice::from_raw(device_arg.as_raw()),
                        out_arg.as_ptr() as *mut vk::PhysicalDeviceProperties2,
                    );
                }
                Ok(PropertiesQuery::Filled(fresh))
            }
        }
    }
}

/// Per-instance resolver for driver extension entry points.
///
/// Takes the instance handle explicitly on construction; there is no
/// process-wide "current instance".
pub struct ProcResolver {
    instance: vk::Instance,
    cache: HashMap<String, vk::PFN_vkVoidFunction>,
}

impl ProcResolver {
    pub fn new(instance: vk::Instance) -> Self {
        Self {
            instance,
            cache: HashMap::new(),
        }
    }

    /// Resolve a named extended-properties entry point.
    ///
    /// Always returns a callable; a null driver pointer is surfaced as
    /// the not-present sentinel at invocation time, never as an error.
    pub fn resolve(&mut self, entry: &Entry, name: &str) -> Result<PropertiesFn, CapsErrorKind> {
        let raw = match self.cache.get(name) {
            Some(cached) => *cached,
            None => {
                let looked_up = self.lookup(entry, name)?;
                self.cache.insert(name.to_string(), looked_up);
                looked_up
            }
        };

        if raw.is_none() {
            log::debug!("Entry point {name} not present on this driver");
        }

        // Cast the untyped driver pointer to the expected signature.
        let typed = raw.map(|f| unsafe {
            std::mem::transmute::<
                unsafe extern "system" fn(),
                vk::PFN_vkGetPhysicalDeviceProperties2,
            >(f)
        });
        Ok(PropertiesFn::new(typed))
    }

    fn lookup(&self, entry: &Entry, name: &str) -> Result<vk::PFN_vkVoidFunction, CapsErrorKind> {
        let mut keepalive = KeepAliveSet::new();

        let instance_value = Value::Handle {
            raw: self.instance.as_raw(),
            pointee: StructKind::Instance,
        };
        let (instance_arg, instance_token) = coerce(&instance_value, &marshal::INSTANCE_PTR)?;
        keepalive.register(&instance_arg, instance_token);

        let (name_arg, name_token) = marshal::coerce_name(name)?;
        keepalive.register(&name_arg, name_token);

        let function = unsafe {
            entry.get_instance_proc_addr(
                vk::Instance::from_raw(instance_arg.as_raw()),
                name_arg.as_ptr() as *const c_char,
            )
        };
        log::debug!(
            "Resolved {name}: {}",
            if function.is_some() { "found" } else { "null" }
        );
        Ok(function)
    }
}
