//! Native structure introspection
//!
//! Flattens opaque driver structures into plain inspectable value trees.
//! Instead of enumerating fields at runtime, each supported structure
//! carries a static field table (name, accessor, declared native type
//! text); the flattening rules walk the table:
//!
//! 1. plain scalar values are stored directly;
//! 2. nested structures are flattened recursively;
//! 3. a node with no enumerable fields is classified by its native type
//!    text, in priority order: `void *` becomes an opaque address
//!    string, a `char[` array becomes one byte string, any other `[`
//!    array becomes an ordered element list, anything else becomes null.
//!
//! The priority order is deliberate and observable: a `void *[4]` field
//! classifies as an address, not a list.

use std::collections::BTreeMap;

use ash::vk;
use serde::Serialize;

/// A plain, inspectable value tree with no native handles remaining.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Flat {
    Null,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Address(String),
    List(Vec<Flat>),
    Map(BTreeMap<String, Flat>),
}

impl Flat {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Flat::UInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Look a key up in a `Map` node.
    pub fn get(&self, key: &str) -> Option<&Flat> {
        match self {
            Flat::Map(m) => m.get(key),
            _ => None,
        }
    }
}

/// Content carried by a field with no enumerable sub-fields, used by the
/// type-text classification.
pub enum OpaqueContent {
    Pointer(usize),
    Bytes(Vec<u8>),
    Elements(Vec<Flat>),
}

/// A field value fetched from a native structure, before flattening.
pub enum FieldValue {
    /// Plain scalar, stored directly
    Scalar(Flat),
    /// Sub-structure, already flattened by its own table
    Nested(Flat),
    /// No enumerable fields; classify by declared type text
    Empty(OpaqueContent),
}

/// One entry of a per-structure field table.
pub struct FieldDesc<S: 'static> {
    pub name: &'static str,
    /// Declared native type text, e.g. `"uint32_t[3]"` or `"void *"`
    pub type_text: &'static str,
    pub get: fn(&S) -> FieldValue,
}

/// Flatten one structure through its field table.
pub fn flatten_struct<S>(fields: &[FieldDesc<S>], value: &S) -> Flat {
    let mut map = BTreeMap::new();
    for field in fields {
        let flat = match (field.get)(value) {
            FieldValue::Scalar(v) => v,
            FieldValue::Nested(v) => v,
            FieldValue::Empty(content) => classify_empty(field.type_text, content),
        };
        map.insert(field.name.to_string(), flat);
    }
    Flat::Map(map)
}

/// Classify a field with no enumerable sub-fields by its declared native
/// type text. The priority order (void pointer, then char array, then
/// generic array, then null) is part of the contract.
pub fn classify_empty(type_text: &str, content: OpaqueContent) -> Flat {
    if type_text.contains("void *") {
        let repr = match content {
            OpaqueContent::Pointer(addr) => format!("<{type_text} at {addr:#x}>"),
            _ => format!("<{type_text}>"),
        };
        Flat::Address(repr)
    } else if type_text.contains("char[") {
        match content {
            OpaqueContent::Bytes(bytes) => Flat::Bytes(bytes),
            _ => Flat::Bytes(Vec::new()),
        }
    } else if type_text.contains('[') {
        match content {
            OpaqueContent::Elements(elements) => Flat::List(elements),
            _ => Flat::List(Vec::new()),
        }
    } else {
        Flat::Null
    }
}

/// Flatten already-plain data. Plain values are stored unchanged, so
/// this is the identity on any previous flattening result.
pub fn reflatten(value: &Flat) -> Flat {
    match value {
        Flat::List(items) => Flat::List(items.iter().map(reflatten).collect()),
        Flat::Map(map) => Flat::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), reflatten(v)))
                .collect(),
        ),
        plain => plain.clone(),
    }
}

// =============================================================================
// FIELD TABLES
// =============================================================================

// Field table entries for VkPhysicalDeviceLimits and friends. Names are
// the native field names so the flattened mapping matches what driver
// documentation and downstream consumers expect.

macro_rules! limit_fields {
    ($struct:ty; $( $name:literal, $text:literal, $kind:ident, $field:ident; )+) => {
        &[ $( FieldDesc::<$struct> {
            name: $name,
            type_text: $text,
            get: |s: &$struct| limit_fields!(@get s, $kind, $field),
        } ),+ ]
    };
    (@get $s:ident, u32, $field:ident) => {
        FieldValue::Scalar(Flat::UInt(u64::from($s.$field)))
    };
    (@get $s:ident, i32, $field:ident) => {
        FieldValue::Scalar(Flat::Int(i64::from($s.$field)))
    };
    (@get $s:ident, u64, $field:ident) => {
        FieldValue::Scalar(Flat::UInt($s.$field))
    };
    (@get $s:ident, usize, $field:ident) => {
        FieldValue::Scalar(Flat::UInt($s.$field as u64))
    };
    (@get $s:ident, f32, $field:ident) => {
        FieldValue::Scalar(Flat::Float(f64::from($s.$field)))
    };
    (@get $s:ident, bool32, $field:ident) => {
        FieldValue::Scalar(Flat::Bool($s.$field != 0))
    };
    (@get $s:ident, flags, $field:ident) => {
        FieldValue::Scalar(Flat::UInt(u64::from($s.$field.as_raw())))
    };
    (@get $s:ident, u32_array, $field:ident) => {
        FieldValue::Empty(OpaqueContent::Elements(
            $s.$field.iter().map(|v| Flat::UInt(u64::from(*v))).collect(),
        ))
    };
    (@get $s:ident, f32_array, $field:ident) => {
        FieldValue::Empty(OpaqueContent::Elements(
            $s.$field.iter().map(|v| Flat::Float(f64::from(*v))).collect(),
        ))
    };
}

/// Complete field table for `VkPhysicalDeviceLimits`.
pub static LIMITS_FIELDS: &[FieldDesc<vk::PhysicalDeviceLimits>] = limit_fields! {
    vk::PhysicalDeviceLimits;
    "maxImageDimension1D", "uint32_t", u32, max_image_dimension1_d;
    "maxImageDimension2D", "uint32_t", u32, max_image_dimension2_d;
    "maxImageDimension3D", "uint32_t", u32, max_image_dimension3_d;
    "maxImageDimensionCube", "uint32_t", u32, max_image_dimension_cube;
    "maxImageArrayLayers", "uint32_t", u32, max_image_array_layers;
    "maxTexelBufferElements", "uint32_t", u32, max_texel_buffer_elements;
    "maxUniformBufferRange", "uint32_t", u32, max_uniform_buffer_range;
    "maxStorageBufferRange", "uint32_t", u32, max_storage_buffer_range;
    "maxPushConstantsSize", "uint32_t", u32, max_push_constants_size;
    "maxMemoryAllocationCount", "uint32_t", u32, max_memory_allocation_count;
    "maxSamplerAllocationCount", "uint32_t", u32, max_sampler_allocation_count;
    "bufferImageGranularity", "VkDeviceSize", u64, buffer_image_granularity;
    "sparseAddressSpaceSize", "VkDeviceSize", u64, sparse_address_space_size;
    "maxBoundDescriptorSets", "uint32_t", u32, max_bound_descriptor_sets;
    "maxPerStageDescriptorSamplers", "uint32_t", u32, max_per_stage_descriptor_samplers;
    "maxPerStageDescriptorUniformBuffers", "uint32_t", u32, max_per_stage_descriptor_uniform_buffers;
    "maxPerStageDescriptorStorageBuffers", "uint32_t", u32, max_per_stage_descriptor_storage_buffers;
    "maxPerStageDescriptorSampledImages", "uint32_t", u32, max_per_stage_descriptor_sampled_images;
    "maxPerStageDescriptorStorageImages", "uint32_t", u32, max_per_stage_descriptor_storage_images;
    "maxPerStageDescriptorInputAttachments", "uint32_t", u32, max_per_stage_descriptor_input_attachments;
    "maxPerStageResources", "uint32_t", u32, max_per_stage_resources;
    "maxDescriptorSetSamplers", "uint32_t", u32, max_descriptor_set_samplers;
    "maxDescriptorSetUniformBuffers", "uint32_t", u32, max_descriptor_set_uniform_buffers;
    "maxDescriptorSetUniformBuffersDynamic", "uint32_t", u32, max_descriptor_set_uniform_buffers_dynamic;
    "maxDescriptorSetStorageBuffers", "uint32_t", u32, max_descriptor_set_storage_buffers;
    "maxDescriptorSetStorageBuffersDynamic", "uint32_t", u32, max_descriptor_set_storage_buffers_dynamic;
    "maxDescriptorSetSampledImages", "uint32_t", u32, max_descriptor_set_sampled_images;
    "maxDescriptorSetStorageImages", "uint32_t", u32, max_descriptor_set_storage_images;
    "maxDescriptorSetInputAttachments", "uint32_t", u32, max_descriptor_set_input_attachments;
    "maxVertexInputAttributes", "uint32_t", u32, max_vertex_input_attributes;
    "maxVertexInputBindings", "uint32_t", u32, max_vertex_input_bindings;
    "maxVertexInputAttributeOffset", "uint32_t", u32, max_vertex_input_attribute_offset;
    "maxVertexInputBindingStride", "uint32_t", u32, max_vertex_input_binding_stride;
    "maxVertexOutputComponents", "uint32_t", u32, max_vertex_output_components;
    "maxTessellationGenerationLevel", "uint32_t", u32, max_tessellation_generation_level;
    "maxTessellationPatchSize", "uint32_t", u32, max_tessellation_patch_size;
    "maxTessellationControlPerVertexInputComponents", "uint32_t", u32, max_tessellation_control_per_vertex_input_components;
    "maxTessellationControlPerVertexOutputComponents", "uint32_t", u32, max_tessellation_control_per_vertex_output_components;
    "maxTessellationControlPerPatchOutputComponents", "uint32_t", u32, max_tessellation_control_per_patch_output_components;
    "maxTessellationControlTotalOutputComponents", "uint32_t", u32, max_tessellation_control_total_output_components;
    "maxTessellationEvaluationInputComponents", "uint32_t", u32, max_tessellation_evaluation_input_components;
    "maxTessellationEvaluationOutputComponents", "uint32_t", u32, max_tessellation_evaluation_output_components;
    "maxGeometryShaderInvocations", "uint32_t", u32, max_geometry_shader_invocations;
    "maxGeometryInputComponents", "uint32_t", u32, max_geometry_input_components;
    "maxGeometryOutputComponents", "uint32_t", u32, max_geometry_output_components;
    "maxGeometryOutputVertices", "uint32_t", u32, max_geometry_output_vertices;
    "maxGeometryTotalOutputComponents", "uint32_t", u32, max_geometry_total_output_components;
    "maxFragmentInputComponents", "uint32_t", u32, max_fragment_input_components;
    "maxFragmentOutputAttachments", "uint32_t", u32, max_fragment_output_attachments;
    "maxFragmentDualSrcAttachments", "uint32_t", u32, max_fragment_dual_src_attachments;
    "maxFragmentCombinedOutputResources", "uint32_t", u32, max_fragment_combined_output_resources;
    "maxComputeSharedMemorySize", "uint32_t", u32, max_compute_shared_memory_size;
    "maxComputeWorkGroupCount", "uint32_t[3]", u32_array, max_compute_work_group_count;
    "maxComputeWorkGroupInvocations", "uint32_t", u32, max_compute_work_group_invocations;
    "maxComputeWorkGroupSize", "uint32_t[3]", u32_array, max_compute_work_group_size;
    "subPixelPrecisionBits", "uint32_t", u32, sub_pixel_precision_bits;
    "subTexelPrecisionBits", "uint32_t", u32, sub_texel_precision_bits;
    "mipmapPrecisionBits", "uint32_t", u32, mipmap_precision_bits;
    "maxDrawIndexedIndexValue", "uint32_t", u32, max_draw_indexed_index_value;
    "maxDrawIndirectCount", "uint32_t", u32, max_draw_indirect_count;
    "maxSamplerLodBias", "float", f32, max_sampler_lod_bias;
    "maxSamplerAnisotropy", "float", f32, max_sampler_anisotropy;
    "maxViewports", "uint32_t", u32, max_viewports;
    "maxViewportDimensions", "uint32_t[2]", u32_array, max_viewport_dimensions;
    "viewportBoundsRange", "float[2]", f32_array, viewport_bounds_range;
    "viewportSubPixelBits", "uint32_t", u32, viewport_sub_pixel_bits;
    "minMemoryMapAlignment", "size_t", usize, min_memory_map_alignment;
    "minTexelBufferOffsetAlignment", "VkDeviceSize", u64, min_texel_buffer_offset_alignment;
    "minUniformBufferOffsetAlignment", "VkDeviceSize", u64, min_uniform_buffer_offset_alignment;
    "minStorageBufferOffsetAlignment", "VkDeviceSize", u64, min_storage_buffer_offset_alignment;
    "minTexelOffset", "int32_t", i32, min_texel_offset;
    "maxTexelOffset", "uint32_t", u32, max_texel_offset;
    "minTexelGatherOffset", "int32_t", i32, min_texel_gather_offset;
    "maxTexelGatherOffset", "uint32_t", u32, max_texel_gather_offset;
    "minInterpolationOffset", "float", f32, min_interpolation_offset;
    "maxInterpolationOffset", "float", f32, max_interpolation_offset;
    "subPixelInterpolationOffsetBits", "uint32_t", u32, sub_pixel_interpolation_offset_bits;
    "maxFramebufferWidth", "uint32_t", u32, max_framebuffer_width;
    "maxFramebufferHeight", "uint32_t", u32, max_framebuffer_height;
    "maxFramebufferLayers", "uint32_t", u32, max_framebuffer_layers;
    "framebufferColorSampleCounts", "VkSampleCountFlags", flags, framebuffer_color_sample_counts;
    "framebufferDepthSampleCounts", "VkSampleCountFlags", flags, framebuffer_depth_sample_counts;
    "framebufferStencilSampleCounts", "VkSampleCountFlags", flags, framebuffer_stencil_sample_counts;
    "framebufferNoAttachmentsSampleCounts", "VkSampleCountFlags", flags, framebuffer_no_attachments_sample_counts;
    "maxColorAttachments", "uint32_t", u32, max_color_attachments;
    "sampledImageColorSampleCounts", "VkSampleCountFlags", flags, sampled_image_color_sample_counts;
    "sampledImageIntegerSampleCounts", "VkSampleCountFlags", flags, sampled_image_integer_sample_counts;
    "sampledImageDepthSampleCounts", "VkSampleCountFlags", flags, sampled_image_depth_sample_counts;
    "sampledImageStencilSampleCounts", "VkSampleCountFlags", flags, sampled_image_stencil_sample_counts;
    "storageImageSampleCounts", "VkSampleCountFlags", flags, storage_image_sample_counts;
    "maxSampleMaskWords", "uint32_t", u32, max_sample_mask_words;
    "timestampComputeAndGraphics", "VkBool32", bool32, timestamp_compute_and_graphics;
    "timestampPeriod", "float", f32, timestamp_period;
    "maxClipDistances", "uint32_t", u32, max_clip_distances;
    "maxCullDistances", "uint32_t", u32, max_cull_distances;
    "maxCombinedClipAndCullDistances", "uint32_t", u32, max_combined_clip_and_cull_distances;
    "discreteQueuePriorities", "uint32_t", u32, discrete_queue_priorities;
    "pointSizeRange", "float[2]", f32_array, point_size_range;
    "lineWidthRange", "float[2]", f32_array, line_width_range;
    "pointSizeGranularity", "float", f32, point_size_granularity;
    "lineWidthGranularity", "float", f32, line_width_granularity;
    "strictLines", "VkBool32", bool32, strict_lines;
    "standardSampleLocations", "VkBool32", bool32, standard_sample_locations;
    "optimalBufferCopyOffsetAlignment", "VkDeviceSize", u64, optimal_buffer_copy_offset_alignment;
    "optimalBufferCopyRowPitchAlignment", "VkDeviceSize", u64, optimal_buffer_copy_row_pitch_alignment;
    "nonCoherentAtomSize", "VkDeviceSize", u64, non_coherent_atom_size;
};

/// Field table for `VkPhysicalDeviceSparseProperties`.
pub static SPARSE_FIELDS: &[FieldDesc<vk::PhysicalDeviceSparseProperties>] = limit_fields! {
    vk::PhysicalDeviceSparseProperties;
    "residencyStandard2DBlockShape", "VkBool32", bool32, residency_standard2_d_block_shape;
    "residencyStandard2DMultisampleBlockShape", "VkBool32", bool32, residency_standard2_d_multisample_block_shape;
    "residencyStandard3DBlockShape", "VkBool32", bool32, residency_standard3_d_block_shape;
    "residencyAlignedMipSize", "VkBool32", bool32, residency_aligned_mip_size;
    "residencyNonResidentStrict", "VkBool32", bool32, residency_non_resident_strict;
};

/// Field table for `VkPhysicalDeviceProperties`, nesting the limits and
/// sparse-properties tables.
pub static PROPERTIES_FIELDS: &[FieldDesc<vk::PhysicalDeviceProperties>] = &[
    FieldDesc {
        name: "apiVersion",
        type_text: "uint32_t",
        get: |p: &vk::PhysicalDeviceProperties| FieldValue::Scalar(Flat::UInt(u64::from(p.api_version))),
    },
    FieldDesc {
        name: "driverVersion",
        type_text: "uint32_t",
        get: |p: &vk::PhysicalDeviceProperties| {
            FieldValue::Scalar(Flat::UInt(u64::from(p.driver_version)))
        },
    },
    FieldDesc {
        name: "vendorID",
        type_text: "uint32_t",
        get: |p: &vk::PhysicalDeviceProperties| FieldValue::Scalar(Flat::UInt(u64::from(p.vendor_id))),
    },
    FieldDesc {
        name: "deviceID",
        type_text: "uint32_t",
        get: |p: &vk::PhysicalDeviceProperties| FieldValue::Scalar(Flat::UInt(u64::from(p.device_id))),
    },
    FieldDesc {
        name: "deviceType",
        type_text: "VkPhysicalDeviceType",
        get: |p: &vk::PhysicalDeviceProperties| {
            FieldValue::Scalar(Flat::Int(i64::from(p.device_type.as_raw())))
        },
    },
    FieldDesc {
        name: "deviceName",
        type_text: "char[256]",
        get: |p: &vk::PhysicalDeviceProperties| {
            FieldValue::Empty(OpaqueContent::Bytes(
                p.device_name
                    .iter()
                    .take_while(|&&c| c != 0)
                    .map(|&c| c as u8)
                    .collect(),
            ))
        },
    },
    FieldDesc {
        name: "pipelineCacheUUID",
        type_text: "uint8_t[16]",
        get: |p: &vk::PhysicalDeviceProperties| {
            FieldValue::Empty(OpaqueContent::Elements(
                p.pipeline_cache_uuid
                    .iter()
                    .map(|v| Flat::UInt(u64::from(*v)))
                    .collect(),
            ))
        },
    },
    FieldDesc {
        name: "limits",
        type_text: "VkPhysicalDeviceLimits",
        get: |p: &vk::PhysicalDeviceProperties| {
            FieldValue::Nested(flatten_struct(LIMITS_FIELDS, &p.limits))
        },
    },
    FieldDesc {
        name: "sparseProperties",
        type_text: "VkPhysicalDeviceSparseProperties",
        get: |p: &vk::PhysicalDeviceProperties| {
            FieldValue::Nested(flatten_struct(SPARSE_FIELDS, &p.sparse_properties))
        },
    },
];

/// Flatten a base device-properties structure into a plain mapping.
pub fn device_properties_mapping(properties: &vk::PhysicalDeviceProperties) -> Flat {
    flatten_struct(PROPERTIES_FIELDS, properties)
}

/// Flatten a limits structure into a plain mapping.
pub fn limits_mapping(limits: &vk::PhysicalDeviceLimits) -> Flat {
    flatten_struct(LIMITS_FIELDS, limits)
}

/// Build the subgroup-properties mapping: exactly the four documented
/// fields, flag sets surfaced as raw bit values.
pub fn subgroup_mapping(subgroup: &vk::PhysicalDeviceSubgroupProperties) -> Flat {
    let mut map = BTreeMap::new();
    map.insert(
        "subgroup_size".to_string(),
        Flat::UInt(u64::from(subgroup.subgroup_size)),
    );
    map.insert(
        "supported_stages".to_string(),
        Flat::UInt(u64::from(subgroup.supported_stages.as_raw())),
    );
    map.insert(
        "supported_operations".to_string(),
        Flat::UInt(u64::from(subgroup.supported_operations.as_raw())),
    );
    map.insert(
        "quad_operations_in_all_stages".to_string(),
        Flat::Bool(subgroup.quad_operations_in_all_stages != 0),
    );
    Flat::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_limits() -> vk::PhysicalDeviceLimits {
        vk::PhysicalDeviceLimits {
            max_compute_shared_memory_size: 49152,
            max_push_constants_size: 256,
            max_compute_work_group_count: [65535, 65535, 65535],
            max_compute_work_group_invocations: 1024,
            timestamp_compute_and_graphics: vk::TRUE,
            max_sampler_lod_bias: 15.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_limits_mapping_holds_known_fields() {
        let flat = limits_mapping(&sample_limits());
        assert_eq!(
            flat.get("maxComputeSharedMemorySize").and_then(Flat::as_u64),
            Some(49152)
        );
        assert_eq!(
            flat.get("maxPushConstantsSize").and_then(Flat::as_u64),
            Some(256)
        );
        assert_eq!(
            flat.get("maxComputeWorkGroupCount"),
            Some(&Flat::List(vec![
                Flat::UInt(65535),
                Flat::UInt(65535),
                Flat::UInt(65535)
            ]))
        );
        assert_eq!(
            flat.get("timestampComputeAndGraphics"),
            Some(&Flat::Bool(true))
        );
    }

    #[test]
    fn test_limits_mapping_is_complete() {
        let flat = limits_mapping(&sample_limits());
        match flat {
            Flat::Map(m) => assert_eq!(m.len(), LIMITS_FIELDS.len()),
            _ => panic!("limits must flatten to a mapping"),
        }
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let flat = limits_mapping(&sample_limits());
        assert_eq!(reflatten(&flat), flat);

        let nested = device_properties_mapping(&vk::PhysicalDeviceProperties::default());
        assert_eq!(reflatten(&nested), nested);
    }

    #[test]
    fn test_device_properties_recursion() {
        let mut props = vk::PhysicalDeviceProperties::default();
        props.limits = sample_limits();
        props.device_name[0] = b'g' as std::ffi::c_char;
        props.device_name[1] = b'p' as std::ffi::c_char;
        props.device_name[2] = b'u' as std::ffi::c_char;

        let flat = device_properties_mapping(&props);
        assert_eq!(flat.get("deviceName"), Some(&Flat::Bytes(b"gpu".to_vec())));
        assert_eq!(
            flat.get("limits")
                .and_then(|l| l.get("maxPushConstantsSize"))
                .and_then(Flat::as_u64),
            Some(256)
        );
        // uuid classifies as a generic array
        match flat.get("pipelineCacheUUID") {
            Some(Flat::List(elements)) => assert_eq!(elements.len(), 16),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_classification_priority_order() {
        // void pointer wins even when the type text carries an array marker
        let flat = classify_empty("void *[4]", OpaqueContent::Elements(vec![Flat::UInt(1)]));
        assert!(matches!(flat, Flat::Address(_)));

        let flat = classify_empty("void *", OpaqueContent::Pointer(0x1000));
        assert_eq!(flat, Flat::Address("<void * at 0x1000>".to_string()));

        let flat = classify_empty("char[16]", OpaqueContent::Bytes(b"abc".to_vec()));
        assert_eq!(flat, Flat::Bytes(b"abc".to_vec()));

        let flat = classify_empty("uint32_t[3]", OpaqueContent::Elements(vec![Flat::UInt(7)]));
        assert_eq!(flat, Flat::List(vec![Flat::UInt(7)]));

        let flat = classify_empty("VkStructureType", OpaqueContent::Pointer(0));
        assert_eq!(flat, Flat::Null);
    }

    #[test]
    fn test_subgroup_mapping_has_exactly_four_fields() {
        let subgroup = vk::PhysicalDeviceSubgroupProperties {
            subgroup_size: 32,
            supported_stages: vk::ShaderStageFlags::COMPUTE,
            supported_operations: vk::SubgroupFeatureFlags::BASIC
                | vk::SubgroupFeatureFlags::ARITHMETIC,
            quad_operations_in_all_stages: vk::FALSE,
            ..Default::default()
        };
        let flat = subgroup_mapping(&subgroup);
        match &flat {
            Flat::Map(m) => {
                assert_eq!(m.len(), 4);
                assert!(m.contains_key("subgroup_size"));
                assert!(m.contains_key("supported_stages"));
                assert!(m.contains_key("supported_operations"));
                assert!(m.contains_key("quad_operations_in_all_stages"));
            }
            other => panic!("expected mapping, got {other:?}"),
        }
        assert_eq!(flat.get("subgroup_size").and_then(Flat::as_u64), Some(32));
    }
}
