//! Vulkan capability introspection and foreign-call marshaling
//!
//! Sits beneath a higher-level GPU compute library and answers the
//! questions that library cannot: shared-memory limits, subgroup
//! operation support, push-constant limits. Getting at those means
//! talking to the driver directly, so this crate provides:
//!
//! 1. A coercer that turns dynamically-typed values into fixed-layout
//!    native call arguments, with explicit keepalive ownership
//! 2. A resolver for driver entry points that are looked up per
//!    instance at runtime and may be absent
//! 3. An introspector that flattens opaque driver structures, including
//!    chained extension structures, into plain inspectable data
//! 4. The capability query that ties them together around a transient
//!    instance
//!
//! # Example
//!
//! ```rust,no_run
//! let gpu_info = vulkan_caps::get_gpu_info(None)?;
//! for (index, device) in &gpu_info {
//!     println!("GPU {index}: {}", device.device_name);
//! }
//! # Ok::<(), vulkan_caps::CapsErrorKind>(())
//! ```

mod error;
pub mod introspect;
mod limits;
pub mod marshal;
mod query;
mod resolver;

pub use error::CapsErrorKind;
pub use introspect::Flat;
pub use limits::DeviceLimits;
pub use query::{get_gpu_info, DeviceCapabilities, ExtensionInfo};
pub use resolver::{ProcResolver, PropertiesFn, PropertiesQuery};
