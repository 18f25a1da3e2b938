//! # Layout Resolution
//!
//! Maps field position to a cached `(start, size)` offset entry, lazily and
//! incrementally. Each record instance owns one `Layout` per nesting level:
//! a flat array of slots, one per schema field, holding the offset cache and
//! whatever per-instance state the field kind needs (dynamic length or
//! shape, variant binding, nested child layout, visibility).
//!
//! ## Resolution
//!
//! Offsets are strictly determined by declaration order. Field 0 starts at
//! byte 0 and every later field starts at its predecessor's end, so
//! resolving position `i` walks forward from the first invalid entry,
//! computing each field's size on the way:
//!
//! | Field state | Size |
//! |-------------|------|
//! | hidden | 0 |
//! | statically sized kind | the static size |
//! | dynamic string/bytes/array | last resized length or shape, else 0 |
//! | peer-driven | decoded from the peer field, then memoized |
//! | nested record | the child layout's resolved total |
//! | unbound variant | 0 |
//!
//! Valid entries always form a prefix of the slot array: invalidation only
//! ever marks a suffix, and mutations that re-enter an entry directly leave
//! everything before it untouched. A failed resolution leaves the cache
//! exactly as it was; nothing is invalidated on the error path.
//!
//! ## Nesting
//!
//! Child layouts store offsets relative to their own base, so shifting a
//! whole sub-record (because an earlier sibling resized) does not disturb
//! the child's cache. The absolute base is recomputed from the parent chain
//! on every access.

use eyre::{ensure, Result};
use smallvec::smallvec;

use crate::codec::decode_uint;
use crate::schema::Schema;
use crate::types::{FieldType, Shape, ShapeSpec, SizeSpec};

/// Cached placement of one field within a record instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OffsetEntry {
    pub start: usize,
    pub size: usize,
    pub valid: bool,
}

/// Per-instance state for one field slot.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub start: usize,
    pub size: usize,
    pub valid: bool,
    pub hidden: bool,
    /// Runtime type of a variant slot, replacing the schema descriptor.
    pub bound: Option<FieldType>,
    /// Current byte length of a dynamic or peer-driven string/bytes field.
    pub dyn_len: Option<usize>,
    /// Current shape of a dynamic or peer-driven array field.
    pub dyn_shape: Option<Shape>,
    /// Offset cache of a nested record, relative to this field's start.
    pub child: Option<Box<Layout>>,
}

impl Slot {
    pub fn entry(&self) -> OffsetEntry {
        OffsetEntry {
            start: self.start,
            size: self.size,
            valid: self.valid,
        }
    }
}

/// Offset cache for one nesting level of a record instance.
#[derive(Debug, Default)]
pub(crate) struct Layout {
    pub slots: Vec<Slot>,
}

/// Byte size of a packed array, guarding against shapes that overflow the
/// address space.
pub(crate) fn shape_size(elem_size: usize, dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .and_then(|count| elem_size.checked_mul(count))
        .ok_or_else(|| eyre::eyre!("array shape {:?} overflows the address space", dims))
}

pub(crate) fn checked_end(start: usize, size: usize) -> Result<usize> {
    start
        .checked_add(size)
        .ok_or_else(|| eyre::eyre!("layout size overflows the address space"))
}

impl Layout {
    pub fn new(field_count: usize) -> Layout {
        let mut slots = Vec::with_capacity(field_count);
        slots.resize_with(field_count, Slot::default);
        Layout { slots }
    }

    /// Marks entries `idx..` as needing recomputation. Dynamic lengths,
    /// bindings and child caches are kept; only placement is discarded.
    pub fn invalidate_from(&mut self, idx: usize) {
        for slot in self.slots.iter_mut().skip(idx) {
            slot.valid = false;
        }
    }
}

/// The field descriptor in effect for a slot: the variant binding when one
/// is present, the schema descriptor otherwise. Returned by value because
/// callers usually need it while mutating the layout.
pub(crate) fn effective_type(schema: &Schema, layout: &Layout, idx: usize) -> FieldType {
    match &layout.slots[idx].bound {
        Some(ty) => ty.clone(),
        None => schema.fields()[idx].ty.clone(),
    }
}

/// Resolves the offset entry for `idx`, recomputing stale entries on the
/// way. `base` is the absolute buffer offset of this layout level.
pub(crate) fn resolve(
    schema: &Schema,
    layout: &mut Layout,
    buf: &[u8],
    base: usize,
    idx: usize,
) -> Result<OffsetEntry> {
    ensure!(
        idx < layout.slots.len(),
        "field position {} out of range",
        idx
    );

    // Find the first stale entry at or before idx and the end offset of the
    // fields preceding it.
    let mut first = idx + 1;
    let mut end = 0;
    for i in 0..=idx {
        if !layout.slots[i].valid {
            first = i;
            break;
        }
        end = layout.slots[i].start + layout.slots[i].size;
    }

    for i in first..=idx {
        let start = end;
        let size = field_size(schema, layout, buf, base, i, start)?;
        end = checked_end(start, size)?;
        let slot = &mut layout.slots[i];
        slot.start = start;
        slot.size = size;
        slot.valid = true;
    }

    Ok(layout.slots[idx].entry())
}

/// End offset of the last field, resolving everything on the way.
pub(crate) fn total_size(
    schema: &Schema,
    layout: &mut Layout,
    buf: &[u8],
    base: usize,
) -> Result<usize> {
    if schema.field_count() == 0 {
        return Ok(0);
    }
    let last = resolve(schema, layout, buf, base, schema.field_count() - 1)?;
    checked_end(last.start, last.size)
}

/// Computes the current size of field `idx`, assuming every earlier entry
/// is already valid. `start` is the field's own start, needed to place a
/// nested child layout.
fn field_size(
    schema: &Schema,
    layout: &mut Layout,
    buf: &[u8],
    base: usize,
    idx: usize,
    start: usize,
) -> Result<usize> {
    if layout.slots[idx].hidden {
        return Ok(0);
    }

    let bound = layout.slots[idx].bound.clone();
    let ty = bound.as_ref().unwrap_or(&schema.fields()[idx].ty);

    match ty {
        FieldType::Int { size, .. } | FieldType::Bool { size, .. } => Ok(*size),
        FieldType::Float32 { .. } => Ok(4),
        FieldType::Float64 { .. } => Ok(8),
        FieldType::Str { len, .. } | FieldType::Bytes { len } => match len {
            SizeSpec::Fixed(n) => Ok(*n),
            SizeSpec::Dynamic => Ok(layout.slots[idx].dyn_len.unwrap_or(0)),
            SizeSpec::Peer(peer) => {
                if let Some(n) = layout.slots[idx].dyn_len {
                    return Ok(n);
                }
                let n = peer_count(schema, layout, buf, base, idx, peer)?;
                layout.slots[idx].dyn_len = Some(n);
                Ok(n)
            }
        },
        FieldType::Array { elem, shape } => {
            let elem_size = elem
                .static_size()
                .ok_or_else(|| eyre::eyre!("array element type must have a static size"))?;
            match shape {
                ShapeSpec::Fixed(dims) => shape_size(elem_size, dims),
                ShapeSpec::Dynamic => match &layout.slots[idx].dyn_shape {
                    Some(dims) => shape_size(elem_size, dims),
                    None => Ok(0),
                },
                ShapeSpec::Peer(peer) => {
                    if let Some(dims) = &layout.slots[idx].dyn_shape {
                        return shape_size(elem_size, dims);
                    }
                    let n = peer_count(schema, layout, buf, base, idx, peer)?;
                    let size = shape_size(elem_size, &[n])?;
                    layout.slots[idx].dyn_shape = Some(smallvec![n]);
                    Ok(size)
                }
            }
        }
        FieldType::Struct { schema: sub } => {
            let sub = sub.clone();
            let child_base = checked_end(base, start)?;
            let count = sub.field_count();
            let child = layout.slots[idx]
                .child
                .get_or_insert_with(|| Box::new(Layout::new(count)));
            total_size(&sub, child, buf, child_base)
        }
        FieldType::Variant => Ok(0),
    }
}

/// Decodes the unsigned integer value of the peer field driving `idx`'s
/// size, as a byte or element count. The peer is earlier in declaration
/// order, so its entry is already valid when this runs.
fn peer_count(
    schema: &Schema,
    layout: &Layout,
    buf: &[u8],
    base: usize,
    idx: usize,
    peer: &str,
) -> Result<usize> {
    let name = &schema.fields()[idx].name;
    let p = schema
        .index_of(peer)
        .ok_or_else(|| eyre::eyre!("unknown field `{}`", peer))?;
    let slot = &layout.slots[p];
    ensure!(
        !slot.hidden,
        "unresolved size for field `{}`: peer field `{}` is hidden",
        name,
        peer
    );
    ensure!(
        slot.valid,
        "unresolved size for field `{}`: peer field `{}` is not resolved",
        name,
        peer
    );
    let start = checked_end(base, slot.start)?;
    let size = slot.size;
    ensure!(
        checked_end(start, size)? <= buf.len(),
        "unresolved size for field `{}`: peer field `{}` is out of bounds",
        name,
        peer
    );
    let endian = match &schema.fields()[p].ty {
        FieldType::Int { endian, .. } => *endian,
        _ => eyre::bail!(
            "unresolved size for field `{}`: peer field `{}` is not an integer",
            name,
            peer
        ),
    };
    let count = decode_uint(&buf[start..start + size], endian);
    usize::try_from(count).map_err(|_| {
        eyre::eyre!(
            "unresolved size for field `{}`: peer field `{}` holds {}, larger than the address space",
            name,
            peer,
            count
        )
    })
}
