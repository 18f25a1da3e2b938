//! # Field Descriptors
//!
//! This module provides `FieldType`, the immutable description of one field's
//! type and size policy, independent of any buffer. A `FieldType` never holds
//! instance state; per-record runtime state (current dynamic lengths, variant
//! bindings, nested offset caches) lives in the record's layout.
//!
//! ## Field Kinds
//!
//! | Kind | Size policy | Storage |
//! |------|-------------|---------|
//! | `Int` | static (1, 2, 4 or 8 bytes) | two's complement, configurable endianness |
//! | `Bool` | static (1, 2, 4 or 8 bytes) | integer backed, non-zero = true |
//! | `Float32` / `Float64` | static (4 / 8 bytes) | IEEE-754 |
//! | `Str` | fixed, dynamic or peer-driven | UTF-8 or ASCII bytes, no terminator |
//! | `Bytes` | fixed, dynamic or peer-driven | raw bytes |
//! | `Array` | fixed shape, dynamic or peer-driven | elements packed row-major |
//! | `Struct` | sum of the nested schema's fields | nested record over a buffer view |
//! | `Variant` | decided at runtime via `bind` | zero bytes until bound |
//!
//! ## Size Policies
//!
//! `SizeSpec` (strings, byte strings) and `ShapeSpec` (arrays) express where a
//! field's size comes from:
//!
//! - `Fixed`: known at schema declaration time.
//! - `Dynamic`: set per instance through an explicit `resize`/`reshape`, or
//!   implicitly when `set` writes a value of a different length.
//! - `Peer`: decoded from an earlier unsigned integer field of the same
//!   record level. Writing the peer re-sizes every field it drives.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::schema::Schema;

/// Array shape as a list of dimension extents, row-major element order.
pub type Shape = SmallVec<[usize; 4]>;

/// Byte order of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Text encoding of a string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrEncoding {
    #[default]
    Utf8,
    Ascii,
}

/// Size policy for strings and byte strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeSpec {
    /// Exactly this many bytes, always.
    Fixed(usize),
    /// Zero bytes until resized, explicitly or implicitly by `set`.
    Dynamic,
    /// Byte length decoded from an earlier unsigned integer field.
    Peer(String),
}

/// Size policy for arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeSpec {
    /// A fixed, possibly multidimensional shape.
    Fixed(Shape),
    /// Empty until reshaped, explicitly or implicitly by `set`.
    Dynamic,
    /// One-dimensional, element count decoded from an earlier unsigned
    /// integer field.
    Peer(String),
}

/// Immutable description of one field's type and size policy.
#[derive(Debug, Clone)]
pub enum FieldType {
    Int {
        size: usize,
        signed: bool,
        endian: Endian,
    },
    Bool {
        size: usize,
        endian: Endian,
    },
    Float32 {
        endian: Endian,
    },
    Float64 {
        endian: Endian,
    },
    Str {
        len: SizeSpec,
        encoding: StrEncoding,
    },
    Bytes {
        len: SizeSpec,
    },
    Array {
        elem: Box<FieldType>,
        shape: ShapeSpec,
    },
    Struct {
        schema: Arc<Schema>,
    },
    Variant,
}

impl FieldType {
    /// Signed little-endian integer of `size` bytes (1, 2, 4 or 8).
    pub fn int(size: usize) -> FieldType {
        FieldType::Int {
            size,
            signed: true,
            endian: Endian::Little,
        }
    }

    /// Unsigned little-endian integer of `size` bytes (1, 2, 4 or 8).
    pub fn uint(size: usize) -> FieldType {
        FieldType::Int {
            size,
            signed: false,
            endian: Endian::Little,
        }
    }

    /// Integer-backed boolean of `size` bytes. Non-zero reads as `true`.
    pub fn boolean(size: usize) -> FieldType {
        FieldType::Bool {
            size,
            endian: Endian::Little,
        }
    }

    pub fn float32() -> FieldType {
        FieldType::Float32 {
            endian: Endian::Little,
        }
    }

    pub fn float64() -> FieldType {
        FieldType::Float64 {
            endian: Endian::Little,
        }
    }

    /// UTF-8 string of exactly `len` bytes.
    pub fn str_fixed(len: usize) -> FieldType {
        FieldType::Str {
            len: SizeSpec::Fixed(len),
            encoding: StrEncoding::Utf8,
        }
    }

    /// UTF-8 string whose length is set per instance.
    pub fn str_dynamic() -> FieldType {
        FieldType::Str {
            len: SizeSpec::Dynamic,
            encoding: StrEncoding::Utf8,
        }
    }

    /// UTF-8 string whose byte length is decoded from the earlier field
    /// `peer`.
    pub fn str_peer(peer: impl Into<String>) -> FieldType {
        FieldType::Str {
            len: SizeSpec::Peer(peer.into()),
            encoding: StrEncoding::Utf8,
        }
    }

    /// Raw byte string of exactly `len` bytes.
    pub fn bytes_fixed(len: usize) -> FieldType {
        FieldType::Bytes {
            len: SizeSpec::Fixed(len),
        }
    }

    /// Raw byte string whose length is set per instance.
    pub fn bytes_dynamic() -> FieldType {
        FieldType::Bytes {
            len: SizeSpec::Dynamic,
        }
    }

    /// Raw byte string whose length is decoded from the earlier field `peer`.
    pub fn bytes_peer(peer: impl Into<String>) -> FieldType {
        FieldType::Bytes {
            len: SizeSpec::Peer(peer.into()),
        }
    }

    /// Array with a fixed shape. Elements are packed row-major with no
    /// padding; the element type must be statically sized.
    pub fn array(elem: FieldType, dims: &[usize]) -> FieldType {
        FieldType::Array {
            elem: Box::new(elem),
            shape: ShapeSpec::Fixed(Shape::from_slice(dims)),
        }
    }

    /// Array whose shape is set per instance.
    pub fn array_dynamic(elem: FieldType) -> FieldType {
        FieldType::Array {
            elem: Box::new(elem),
            shape: ShapeSpec::Dynamic,
        }
    }

    /// One-dimensional array whose element count is decoded from the earlier
    /// field `peer`.
    pub fn array_peer(elem: FieldType, peer: impl Into<String>) -> FieldType {
        FieldType::Array {
            elem: Box::new(elem),
            shape: ShapeSpec::Peer(peer.into()),
        }
    }

    /// Nested record laid out over a view of the parent's buffer.
    pub fn nested(schema: Arc<Schema>) -> FieldType {
        FieldType::Struct { schema }
    }

    /// A slot whose concrete type is decided at runtime via `Record::bind`.
    pub fn variant() -> FieldType {
        FieldType::Variant
    }

    /// Overrides the byte order of a scalar field. Non-scalar kinds are
    /// returned unchanged.
    pub fn with_endian(self, endian: Endian) -> FieldType {
        match self {
            FieldType::Int { size, signed, .. } => FieldType::Int {
                size,
                signed,
                endian,
            },
            FieldType::Bool { size, .. } => FieldType::Bool { size, endian },
            FieldType::Float32 { .. } => FieldType::Float32 { endian },
            FieldType::Float64 { .. } => FieldType::Float64 { endian },
            other => other,
        }
    }

    /// Overrides the text encoding of a string field. Other kinds are
    /// returned unchanged.
    pub fn with_encoding(self, encoding: StrEncoding) -> FieldType {
        match self {
            FieldType::Str { len, .. } => FieldType::Str { len, encoding },
            other => other,
        }
    }

    /// Returns the field's size in bytes when it is known from the type
    /// alone, `None` when it depends on per-instance state.
    pub fn static_size(&self) -> Option<usize> {
        match self {
            FieldType::Int { size, .. } | FieldType::Bool { size, .. } => Some(*size),
            FieldType::Float32 { .. } => Some(4),
            FieldType::Float64 { .. } => Some(8),
            FieldType::Str { len, .. } | FieldType::Bytes { len } => match len {
                SizeSpec::Fixed(n) => Some(*n),
                _ => None,
            },
            FieldType::Array { elem, shape } => match shape {
                ShapeSpec::Fixed(dims) => {
                    let elem_size = elem.static_size()?;
                    let count = dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))?;
                    elem_size.checked_mul(count)
                }
                _ => None,
            },
            FieldType::Struct { schema } => {
                if schema.is_fully_static() {
                    Some(schema.static_size())
                } else {
                    None
                }
            }
            FieldType::Variant => None,
        }
    }

    /// Returns true when the size depends on per-instance state.
    pub fn is_variable(&self) -> bool {
        self.static_size().is_none()
    }

    /// The bytes this field occupies in a freshly constructed record.
    /// Variable fields start at zero, except nested records, which start at
    /// their own schema's static size.
    pub fn min_size(&self) -> usize {
        match self {
            FieldType::Struct { schema } => schema.static_size(),
            other => other.static_size().unwrap_or(0),
        }
    }

    /// The peer field name driving this field's size, if any.
    pub(crate) fn peer(&self) -> Option<&str> {
        match self {
            FieldType::Str {
                len: SizeSpec::Peer(p),
                ..
            }
            | FieldType::Bytes {
                len: SizeSpec::Peer(p),
            } => Some(p.as_str()),
            FieldType::Array {
                shape: ShapeSpec::Peer(p),
                ..
            } => Some(p.as_str()),
            _ => None,
        }
    }
}

/// One named field of a record schema.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}
