//! Dynamic-to-native argument marshaling
//!
//! Converts dynamically-typed [`Value`]s into native-call-ready
//! representations driven by a [`TypeDescriptor`] taken from the native
//! call signature. Every produced pointer is paired with a [`KeepAlive`]
//! token that owns the backing memory; the caller holds the token for
//! exactly as long as the native call using the pointer is in flight.
//!
//! Also hosts the extension-chain helpers: driver structures that begin
//! with a type tag and a `next` pointer are linked here with their tags
//! checked, and read back out of a chain by tag.
//!
//! # Example
//!
//! ```rust
//! use vulkan_caps::marshal::{coerce, KeepAliveSet, Value, CHAR_PTR_ARRAY};
//!
//! let names = Value::Seq(vec![
//!     Value::Str("VK_LAYER_KHRONOS_validation".to_string()),
//! ]);
//! let mut keepalive = KeepAliveSet::new();
//! let (arg, token) = coerce(&names, &CHAR_PTR_ARRAY).unwrap();
//! keepalive.register(&arg, token);
//! // arg.as_ptr() is a valid `*const *const c_char` until `keepalive`
//! // is dropped.
//! ```

use std::collections::HashMap;
use std::ffi::{c_void, CString};

use ash::vk;

use crate::error::CapsErrorKind;

/// Scalar shapes a native signature can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Char,
    U32,
    U64,
    I64,
    F64,
}

/// Pointee tags for opaque driver objects and structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    Instance,
    PhysicalDevice,
    PhysicalDeviceProperties2,
}

/// Describes the native shape a value must be coerced into.
///
/// Descriptors are immutable `'static` data supplied by the native call
/// signature; call sites never own them. Pointer and array kinds carry
/// their pointee/element descriptor.
#[derive(Debug, PartialEq, Eq)]
pub enum TypeDescriptor {
    Scalar(ScalarKind),
    Pointer(&'static TypeDescriptor),
    Array(&'static TypeDescriptor),
    Struct(StructKind),
    /// `void`; a pointer to this accepts any struct/union value
    Untyped,
}

pub static CHAR: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::Char);
pub static CHAR_PTR: TypeDescriptor = TypeDescriptor::Pointer(&CHAR);
pub static CHAR_PTR_ARRAY: TypeDescriptor = TypeDescriptor::Pointer(&CHAR_PTR);
pub static UNTYPED: TypeDescriptor = TypeDescriptor::Untyped;
pub static UNTYPED_PTR: TypeDescriptor = TypeDescriptor::Pointer(&UNTYPED);
pub static INSTANCE: TypeDescriptor = TypeDescriptor::Struct(StructKind::Instance);
pub static INSTANCE_PTR: TypeDescriptor = TypeDescriptor::Pointer(&INSTANCE);
pub static PHYSICAL_DEVICE: TypeDescriptor = TypeDescriptor::Struct(StructKind::PhysicalDevice);
pub static PHYSICAL_DEVICE_PTR: TypeDescriptor = TypeDescriptor::Pointer(&PHYSICAL_DEVICE);
pub static PROPERTIES2: TypeDescriptor =
    TypeDescriptor::Struct(StructKind::PhysicalDeviceProperties2);
pub static PROPERTIES2_PTR: TypeDescriptor = TypeDescriptor::Pointer(&PROPERTIES2);

/// A dynamically-typed argument value, prior to coercion.
#[derive(Debug, Clone)]
pub enum Value {
    /// Maps to a null native pointer for any pointer descriptor
    Null,
    U32(u32),
    U64(u64),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// An opaque driver handle; passed through as-is when the pointee
    /// type matches
    Handle { raw: u64, pointee: StructKind },
    /// A caller-owned native structure; the pointee must outlive the call
    Struct { addr: *mut c_void, kind: StructKind },
    Seq(Vec<Value>),
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Handle { .. } => "handle",
            Value::Struct { .. } => "struct",
            Value::Seq(_) => "seq",
        }
    }
}

/// A native-call-ready representation of one argument.
#[derive(Debug, Clone, Copy)]
pub enum NativeArg {
    /// A scalar word, including handles passed by value
    Scalar(u64),
    /// A raw pointer into memory owned by the paired keepalive token
    Ptr(*const c_void),
}

impl NativeArg {
    /// The argument as a raw pointer. Dispatchable handles are pointers
    /// under the hood, so scalar words convert too.
    pub fn as_ptr(&self) -> *const c_void {
        match self {
            NativeArg::Scalar(w) => *w as usize as *const c_void,
            NativeArg::Ptr(p) => *p,
        }
    }

    /// The argument as a raw handle word.
    pub fn as_raw(&self) -> u64 {
        match self {
            NativeArg::Scalar(w) => *w,
            NativeArg::Ptr(p) => *p as usize as u64,
        }
    }
}

enum Retained {
    CString(CString),
    Bytes(Box<[u8]>),
    Pointers(Box<[*const c_void]>),
    Token(KeepAlive),
}

/// Owns every buffer a coercion result points into.
///
/// Dropping the token releases the memory; the paired [`NativeArg`] must
/// not be dereferenced afterwards.
#[derive(Default)]
pub struct KeepAlive {
    retained: Vec<Retained>,
}

impl KeepAlive {
    pub fn none() -> Self {
        Self::default()
    }

    /// Number of retained buffers, transitively.
    pub fn retained_count(&self) -> usize {
        self.retained
            .iter()
            .map(|r| match r {
                Retained::Token(t) => t.retained_count(),
                _ => 1,
            })
            .sum()
    }

    fn retain_cstring(&mut self, s: CString) -> *const c_void {
        let ptr = s.as_ptr() as *const c_void;
        self.retained.push(Retained::CString(s));
        ptr
    }

    fn retain_bytes(&mut self, bytes: Box<[u8]>) -> *const c_void {
        let ptr = bytes.as_ptr() as *const c_void;
        self.retained.push(Retained::Bytes(bytes));
        ptr
    }

    fn retain_pointers(&mut self, ptrs: Box<[*const c_void]>) -> *const c_void {
        let ptr = ptrs.as_ptr() as *const c_void;
        self.retained.push(Retained::Pointers(ptrs));
        ptr
    }

    fn absorb(&mut self, other: KeepAlive) {
        if !other.retained.is_empty() {
            self.retained.push(Retained::Token(other));
        }
    }
}

/// Call-scoped side table of keepalive tokens, keyed by pointer identity.
///
/// Entries are only valid for the duration of the native call they
/// support; drop the whole set once the call returns.
#[derive(Default)]
pub struct KeepAliveSet {
    entries: HashMap<usize, KeepAlive>,
}

impl KeepAliveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the token backing a coerced argument. Scalar arguments
    /// and null pointers carry no backing memory and are skipped.
    pub fn register(&mut self, arg: &NativeArg, token: KeepAlive) {
        if let NativeArg::Ptr(p) = arg {
            if !p.is_null() {
                self.entries.insert(*p as usize, token);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which text encoding produced a marshaled byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Ascii,
    Utf8,
}

/// Encode a string argument: ASCII first, UTF-8 on failure.
pub fn encode_text(s: &str) -> (Vec<u8>, TextEncoding) {
    match try_encode_ascii(s) {
        Some(bytes) => (bytes, TextEncoding::Ascii),
        None => (s.as_bytes().to_vec(), TextEncoding::Utf8),
    }
}

fn try_encode_ascii(s: &str) -> Option<Vec<u8>> {
    if s.is_ascii() {
        Some(s.as_bytes().to_vec())
    } else {
        None
    }
}

/// Coerce a dynamically-typed value into its native representation.
///
/// Returns the native argument together with a keepalive token owning
/// any memory the argument points into. The token must stay alive for
/// the duration of the native call consuming the argument.
///
/// # Errors
///
/// * [`CapsErrorKind::TypeMismatch`] when the value does not satisfy the
///   descriptor's native type.
/// * [`CapsErrorKind::EncodingFailure`] when a string cannot be encoded
///   (no native call is attempted).
/// * [`CapsErrorKind::UnsupportedValueType`] when no native shape
///   mapping exists for the value at all.
pub fn coerce(
    value: &Value,
    descriptor: &TypeDescriptor,
) -> Result<(NativeArg, KeepAlive), CapsErrorKind> {
    match descriptor {
        TypeDescriptor::Scalar(kind) => coerce_scalar(value, *kind),
        TypeDescriptor::Pointer(pointee) => coerce_pointer(value, pointee),
        TypeDescriptor::Array(element) => match value {
            Value::Seq(_) | Value::Bytes(_) | Value::Str(_) => coerce_pointer(value, element),
            other => Err(CapsErrorKind::TypeMismatch(format!(
                "fixed array descriptor requires a sequence, got {}",
                other.kind_name()
            ))),
        },
        TypeDescriptor::Struct(kind) => match value {
            Value::Handle { raw, pointee } if pointee == kind => {
                Ok((NativeArg::Scalar(*raw), KeepAlive::none()))
            }
            other => Err(CapsErrorKind::TypeMismatch(format!(
                "struct descriptor {kind:?} cannot take {}",
                other.kind_name()
            ))),
        },
        TypeDescriptor::Untyped => Err(CapsErrorKind::UnsupportedValueType(
            "bare void descriptor".to_string(),
        )),
    }
}

fn coerce_scalar(value: &Value, kind: ScalarKind) -> Result<(NativeArg, KeepAlive), CapsErrorKind> {
    let word = match (kind, value) {
        (ScalarKind::U32, Value::U32(v)) => u64::from(*v),
        (ScalarKind::U64, Value::U64(v)) => *v,
        (ScalarKind::I64, Value::I64(v)) => *v as u64,
        (ScalarKind::F64, Value::F64(v)) => v.to_bits(),
        (ScalarKind::Char, Value::U32(v)) if *v <= u32::from(u8::MAX) => u64::from(*v),
        (_, other) => {
            return Err(CapsErrorKind::TypeMismatch(format!(
                "scalar descriptor {kind:?} cannot take {}",
                other.kind_name()
            )))
        }
    };
    Ok((NativeArg::Scalar(word), KeepAlive::none()))
}

fn coerce_pointer(
    value: &Value,
    pointee: &TypeDescriptor,
) -> Result<(NativeArg, KeepAlive), CapsErrorKind> {
    match value {
        Value::Null => Ok((NativeArg::Ptr(std::ptr::null()), KeepAlive::none())),

        // A handle already names a native object; pass it through when
        // the pointee type matches, or when the pointee is untyped.
        Value::Handle { raw, pointee: have } => match pointee {
            TypeDescriptor::Struct(want) if want == have => {
                Ok((NativeArg::Scalar(*raw), KeepAlive::none()))
            }
            TypeDescriptor::Untyped => Ok((NativeArg::Scalar(*raw), KeepAlive::none())),
            _ => Err(CapsErrorKind::TypeMismatch(format!(
                "handle pointee {have:?} does not match {pointee:?}"
            ))),
        },

        Value::Struct { addr, kind } => match pointee {
            TypeDescriptor::Struct(want) if want == kind => {
                Ok((NativeArg::Ptr(*addr as *const c_void), KeepAlive::none()))
            }
            // untyped pointee convention: `void *` accepts any struct
            TypeDescriptor::Untyped => {
                Ok((NativeArg::Ptr(*addr as *const c_void), KeepAlive::none()))
            }
            _ => Err(CapsErrorKind::TypeMismatch(format!(
                "struct {kind:?} does not match pointee {pointee:?}"
            ))),
        },

        Value::Str(s) => {
            let (bytes, encoding) = encode_text(s);
            log::trace!(
                "Encoded string argument via {encoding:?} ({} bytes)",
                bytes.len()
            );
            coerce_c_bytes(&bytes, pointee)
        }

        Value::Bytes(bytes) => coerce_c_bytes(bytes, pointee),

        Value::Seq(items) => coerce_sequence(items, pointee),

        // Integers cast straight to a pointer (address literal).
        Value::U64(v) => Ok((NativeArg::Ptr(*v as usize as *const c_void), KeepAlive::none())),

        other => Err(CapsErrorKind::UnsupportedValueType(format!(
            "no native shape for {} against pointee {pointee:?}",
            other.kind_name()
        ))),
    }
}

fn coerce_c_bytes(
    bytes: &[u8],
    pointee: &TypeDescriptor,
) -> Result<(NativeArg, KeepAlive), CapsErrorKind> {
    match pointee {
        TypeDescriptor::Scalar(ScalarKind::Char) => {
            let c_string = CString::new(bytes).map_err(|e| {
                CapsErrorKind::EncodingFailure(format!("interior NUL at byte {}", e.nul_position()))
            })?;
            let mut token = KeepAlive::none();
            let ptr = token.retain_cstring(c_string);
            Ok((NativeArg::Ptr(ptr), token))
        }
        _ => Err(CapsErrorKind::TypeMismatch(format!(
            "byte sequence cannot fill pointee {pointee:?}"
        ))),
    }
}

fn coerce_sequence(
    items: &[Value],
    pointee: &TypeDescriptor,
) -> Result<(NativeArg, KeepAlive), CapsErrorKind> {
    let mut token = KeepAlive::none();

    // Pointer pointee: build a native array of pointers, retaining every
    // non-null element's backing memory.
    if matches!(pointee, TypeDescriptor::Pointer(_)) {
        let mut pointers = Vec::with_capacity(items.len());
        for item in items {
            let (element, element_token) = coerce(item, pointee)?;
            let ptr = element.as_ptr();
            if !ptr.is_null() {
                token.absorb(element_token);
            }
            pointers.push(ptr);
        }
        let ptr = token.retain_pointers(pointers.into_boxed_slice());
        return Ok((NativeArg::Ptr(ptr), token));
    }

    // Scalar pointee: build a native array of values directly, packed to
    // the element's native width.
    match pointee {
        TypeDescriptor::Scalar(kind) => {
            let mut buffer: Vec<u8> = Vec::new();
            for item in items {
                let (element, _) = coerce_scalar(item, *kind)?;
                let word = element.as_raw();
                match kind {
                    ScalarKind::Char => buffer.push(word as u8),
                    ScalarKind::U32 => buffer.extend_from_slice(&(word as u32).to_ne_bytes()),
                    ScalarKind::U64 | ScalarKind::I64 | ScalarKind::F64 => {
                        buffer.extend_from_slice(&word.to_ne_bytes())
                    }
                }
            }
            let ptr = token.retain_bytes(buffer.into_boxed_slice());
            Ok((NativeArg::Ptr(ptr), token))
        }
        _ => Err(CapsErrorKind::UnsupportedValueType(format!(
            "sequence cannot fill pointee {pointee:?}"
        ))),
    }
}

// =============================================================================
// EXTENSION CHAINS
// =============================================================================

/// Link a subgroup-properties node as the `next` of an
/// extended-properties node, checking both type tags first.
///
/// The caller must keep `node` alive for as long as the chain rooted at
/// `head` is handed to the driver.
pub fn push_extension_node(
    head: &mut vk::PhysicalDeviceProperties2<'_>,
    node: &mut vk::PhysicalDeviceSubgroupProperties<'_>,
) -> Result<(), CapsErrorKind> {
    if head.s_type != vk::StructureType::PHYSICAL_DEVICE_PROPERTIES_2 {
        return Err(CapsErrorKind::TypeMismatch(format!(
            "chain head tag {:?} does not match the properties2 query",
            head.s_type
        )));
    }
    if node.s_type != vk::StructureType::PHYSICAL_DEVICE_SUBGROUP_PROPERTIES {
        return Err(CapsErrorKind::TypeMismatch(format!(
            "chain node tag {:?} does not match its declared shape",
            node.s_type
        )));
    }
    node.p_next = head.p_next;
    head.p_next = (node as *mut vk::PhysicalDeviceSubgroupProperties).cast();
    Ok(())
}

/// Walk an extension chain starting at `p_next` and return the first
/// subgroup-properties node, identified by its type tag.
///
/// # Safety
///
/// `p_next` must be null or point to a valid chain of driver structures
/// that each begin with a type tag and a `next` pointer, alive for `'a`.
pub unsafe fn find_subgroup_node<'a>(
    mut p_next: *mut c_void,
) -> Option<&'a vk::PhysicalDeviceSubgroupProperties<'a>> {
    while !p_next.is_null() {
        let base = &*(p_next as *const vk::BaseOutStructure);
        if base.s_type == vk::StructureType::PHYSICAL_DEVICE_SUBGROUP_PROPERTIES {
            return Some(&*(p_next as *const vk::PhysicalDeviceSubgroupProperties));
        }
        p_next = base.p_next as *mut c_void;
    }
    None
}

/// Marshal a C string pointer out of a Rust string, for call sites that
/// hand the pointer straight to the driver.
pub fn coerce_name(name: &str) -> Result<(NativeArg, KeepAlive), CapsErrorKind> {
    coerce(&Value::Str(name.to_string()), &CHAR_PTR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_char;

    type CharPtr = *const c_char;

    #[test]
    fn test_scalar_passthrough() {
        let (arg, _) = coerce(&Value::U32(42), &TypeDescriptor::Scalar(ScalarKind::U32)).unwrap();
        assert_eq!(arg.as_raw(), 42);
    }

    #[test]
    fn test_scalar_mismatch() {
        let err = coerce(
            &Value::Str("nope".into()),
            &TypeDescriptor::Scalar(ScalarKind::U32),
        );
        assert!(matches!(err, Err(CapsErrorKind::TypeMismatch(_))));
    }

    #[test]
    fn test_null_maps_to_null_pointer() {
        let (arg, _) = coerce(&Value::Null, &CHAR_PTR).unwrap();
        assert!(arg.as_ptr().is_null());
    }

    #[test]
    fn test_ascii_and_utf8_encoding_paths() {
        let (bytes, encoding) = encode_text("VK_LAYER_KHRONOS_validation");
        assert_eq!(encoding, TextEncoding::Ascii);
        assert_eq!(bytes.len(), "VK_LAYER_KHRONOS_validation".len());

        let (bytes, encoding) = encode_text("schrödinger");
        assert_eq!(encoding, TextEncoding::Utf8);
        assert_eq!(bytes, "schrödinger".as_bytes());
    }

    #[test]
    fn test_mixed_string_sequence_keeps_length() {
        let names = vec!["plain", "gerät", "ascii_again", "名前"];
        let seq = Value::Seq(names.iter().map(|s| Value::Str(s.to_string())).collect());
        let (arg, token) = coerce(&seq, &CHAR_PTR_ARRAY).unwrap();

        let ptrs =
            unsafe { std::slice::from_raw_parts(arg.as_ptr() as *const CharPtr, names.len()) };
        assert_eq!(ptrs.len(), names.len());
        for ptr in ptrs {
            assert!(!ptr.is_null());
        }
        // one C string per element plus the pointer array itself
        assert_eq!(token.retained_count(), names.len() + 1);
    }

    #[test]
    fn test_interior_nul_is_encoding_failure() {
        let err = coerce(&Value::Str("bad\0name".into()), &CHAR_PTR);
        assert!(matches!(err, Err(CapsErrorKind::EncodingFailure(_))));
    }

    #[test]
    fn test_handle_passthrough_and_mismatch() {
        let handle = Value::Handle {
            raw: 0xdead_beef,
            pointee: StructKind::PhysicalDevice,
        };
        let (arg, _) = coerce(&handle, &PHYSICAL_DEVICE_PTR).unwrap();
        assert_eq!(arg.as_raw(), 0xdead_beef);

        let err = coerce(&handle, &PROPERTIES2_PTR);
        assert!(matches!(err, Err(CapsErrorKind::TypeMismatch(_))));
    }

    #[test]
    fn test_untyped_pointee_accepts_any_struct() {
        let mut props = vk::PhysicalDeviceProperties2::default();
        let addr = (&mut props as *mut vk::PhysicalDeviceProperties2).cast();
        let value = Value::Struct {
            addr,
            kind: StructKind::PhysicalDeviceProperties2,
        };
        let (arg, _) = coerce(&value, &UNTYPED_PTR).unwrap();
        assert_eq!(arg.as_ptr() as usize, addr as usize);
    }

    #[test]
    fn test_scalar_array_packs_native_width() {
        let seq = Value::Seq(vec![Value::U32(1), Value::U32(2), Value::U32(3)]);
        static U32: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::U32);
        static U32_PTR: TypeDescriptor = TypeDescriptor::Pointer(&U32);
        let (arg, _token) = coerce(&seq, &U32_PTR).unwrap();
        let elements = unsafe { std::slice::from_raw_parts(arg.as_ptr() as *const u32, 3) };
        assert_eq!(elements, &[1, 2, 3]);
    }

    #[test]
    fn test_fixed_array_descriptor_takes_sequences() {
        static CHAR_ARRAY: TypeDescriptor = TypeDescriptor::Array(&CHAR);
        let (arg, _token) = coerce(&Value::Bytes(b"spv".to_vec()), &CHAR_ARRAY).unwrap();
        assert!(!arg.as_ptr().is_null());

        let err = coerce(&Value::U32(1), &CHAR_ARRAY);
        assert!(matches!(err, Err(CapsErrorKind::TypeMismatch(_))));
    }

    #[test]
    fn test_keepalive_set_keyed_by_pointer_identity() {
        let mut set = KeepAliveSet::new();
        let (arg, token) = coerce(&Value::Str("layer".into()), &CHAR_PTR).unwrap();
        set.register(&arg, token);
        assert_eq!(set.len(), 1);

        // scalar arguments carry no backing memory
        let (scalar, token) =
            coerce(&Value::U32(7), &TypeDescriptor::Scalar(ScalarKind::U32)).unwrap();
        set.register(&scalar, token);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_chain_link_checks_tags() {
        let mut head = vk::PhysicalDeviceProperties2::default();
        let mut node = vk::PhysicalDeviceSubgroupProperties::default();
        push_extension_node(&mut head, &mut node).unwrap();
        assert_eq!(
            head.p_next as usize,
            &node as *const vk::PhysicalDeviceSubgroupProperties as usize
        );

        let found = unsafe { find_subgroup_node(head.p_next) }.unwrap();
        assert_eq!(
            found.s_type,
            vk::StructureType::PHYSICAL_DEVICE_SUBGROUP_PROPERTIES
        );

        let mut bad = vk::PhysicalDeviceSubgroupProperties::default();
        bad.s_type = vk::StructureType::APPLICATION_INFO;
        let err = push_extension_node(&mut head, &mut bad);
        assert!(matches!(err, Err(CapsErrorKind::TypeMismatch(_))));
    }

    #[test]
    fn test_chain_walk_misses_absent_tag() {
        assert!(unsafe { find_subgroup_node(std::ptr::null_mut()) }.is_none());
    }
}
