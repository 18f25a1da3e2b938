//! # Record Instances
//!
//! A `Record` binds a schema to one owned byte buffer and exposes the named
//! accessor surface: `get`, `set`, `resize`, `reshape`, `bind`,
//! `set_visible` and buffer export. All placement questions go through the
//! layout resolver; all byte interpretation goes through the codecs.
//!
//! ## Construction Modes
//!
//! | Constructor | Buffer | Use |
//! |-------------|--------|-----|
//! | `new` | zero-filled, static size | build a record from scratch |
//! | `from_bytes` | caller supplied, no copy | parse existing data |
//! | `with_values` | zero-filled, then `set` | build mode with initial values |
//! | `from_bytes_with` | caller supplied, then `set` | parse with overrides |
//!
//! ## Resizing
//!
//! Growing a field inserts zero bytes at the end of its region; shrinking
//! removes bytes from the end. Either way the bytes of every following field
//! move as one block, so their contents survive the shift and only their
//! cached offsets are invalidated. Passing `resize_bytes = false` updates
//! the bookkeeping without touching the buffer, which is the right tool
//! while parsing data whose bytes are already in place.
//!
//! Writing a value of a different length with `set` is allowed only for
//! fields that size themselves: dynamic strings, byte strings and arrays
//! resize implicitly; everything else reports a size mismatch. Writing an
//! unsigned integer field that drives peer-sized fields re-sizes each
//! dependent in the same call, so the buffer never disagrees with the
//! lengths recorded inside it.
//!
//! ## Sub-records
//!
//! `sub(name)` returns a live `SubRecord` handle addressing a nested record
//! by field path. The handle borrows the root record, so every mutation
//! lands in the root's buffer and every size change propagates to ancestor
//! offsets before the call returns. Handles are cheap; take them as needed
//! instead of storing them across layout changes.

use std::sync::Arc;

use eyre::{bail, ensure, Result};
use smallvec::{smallvec, SmallVec};

use crate::codec::{
    decode_array, decode_static, decode_str, encode_array_into, encode_one, encode_static_into,
    value_dims,
};
use crate::resolver::{checked_end, effective_type, resolve, shape_size, total_size, Layout, OffsetEntry};
use crate::schema::{validate_bound_type, Schema};
use crate::types::{FieldType, Shape, ShapeSpec, SizeSpec};
use crate::value::Value;

type FieldPath = SmallVec<[usize; 4]>;

/// A record instance: one schema, one buffer, one offset cache.
///
/// Every accessor takes `&mut self` because even reads refresh the lazy
/// offset cache. The buffer is exclusively owned; aliasing it from outside
/// while a record is live is not supported.
#[derive(Debug)]
pub struct Record<'s> {
    schema: &'s Schema,
    buf: Vec<u8>,
    layout: Layout,
}

impl<'s> Record<'s> {
    /// A fresh record over a zero-filled buffer of the schema's static size.
    /// Variable fields occupy zero bytes until resized or written.
    pub fn new(schema: &'s Schema) -> Record<'s> {
        Record {
            schema,
            buf: vec![0; schema.static_size()],
            layout: Layout::new(schema.field_count()),
        }
    }

    /// Binds existing bytes without copying. Nothing is validated up front;
    /// a buffer too short for the layout surfaces as an out-of-bounds error
    /// on the first access that needs the missing bytes.
    pub fn from_bytes(schema: &'s Schema, bytes: Vec<u8>) -> Record<'s> {
        Record {
            schema,
            buf: bytes,
            layout: Layout::new(schema.field_count()),
        }
    }

    /// Build mode: a fresh record with named initial values applied in the
    /// order given.
    pub fn with_values<'n, I>(schema: &'s Schema, values: I) -> Result<Record<'s>>
    where
        I: IntoIterator<Item = (&'n str, Value)>,
    {
        let mut record = Record::new(schema);
        record.set_all(values)?;
        Ok(record)
    }

    /// Parse mode with overrides: existing bytes plus named values applied
    /// on top.
    pub fn from_bytes_with<'n, I>(schema: &'s Schema, bytes: Vec<u8>, values: I) -> Result<Record<'s>>
    where
        I: IntoIterator<Item = (&'n str, Value)>,
    {
        let mut record = Record::from_bytes(schema, bytes);
        record.set_all(values)?;
        Ok(record)
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Applies `(name, value)` pairs through `set`, in order.
    pub fn set_all<'n, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'n str, Value)>,
    {
        for (name, value) in values {
            self.set(name, value)?;
        }
        Ok(())
    }

    /// Decodes the named field. Never mutates the buffer, only the offset
    /// cache. Sub-record fields decode to a `Value::Record` snapshot; use
    /// [`Record::sub`] for live access. Unbound variants read as null.
    pub fn get(&mut self, name: &str) -> Result<Value> {
        get_at(self.schema, &mut self.layout, &self.buf, 0, &[], name)
    }

    /// Encodes `value` into the named field, in place when the length
    /// matches and via an implicit resize when the field sizes itself.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        mutate_at(
            self.schema,
            &mut self.layout,
            &mut self.buf,
            0,
            &[],
            name,
            Mutation::Set(&value),
            true,
        )
        .map(|_| ())
    }

    /// Sets the byte length of a dynamic string or byte-string field, or
    /// the element count of a dynamic array. With `resize_bytes` the buffer
    /// is spliced so following fields shift intact; without it only the
    /// bookkeeping changes.
    pub fn resize(&mut self, name: &str, new_len: usize, resize_bytes: bool) -> Result<()> {
        mutate_at(
            self.schema,
            &mut self.layout,
            &mut self.buf,
            0,
            &[],
            name,
            Mutation::Resize(new_len),
            resize_bytes,
        )
        .map(|_| ())
    }

    /// Sets the shape of a dynamic array field.
    pub fn reshape(&mut self, name: &str, dims: &[usize], resize_bytes: bool) -> Result<()> {
        mutate_at(
            self.schema,
            &mut self.layout,
            &mut self.buf,
            0,
            &[],
            name,
            Mutation::Reshape(dims),
            resize_bytes,
        )
        .map(|_| ())
    }

    /// Assigns a concrete type to a variant slot. The slot takes the type's
    /// static size (zero for dynamic types) and keeps the overlapping
    /// prefix of its previous bytes. Rebinding later is allowed and follows
    /// the same shift rules as any resize.
    pub fn bind(&mut self, name: &str, ty: FieldType, resize_bytes: bool) -> Result<()> {
        mutate_at(
            self.schema,
            &mut self.layout,
            &mut self.buf,
            0,
            &[],
            name,
            Mutation::Bind(ty),
            resize_bytes,
        )
        .map(|_| ())
    }

    /// Hides or shows a field for this instance. Hidden fields occupy zero
    /// bytes and reject reads and writes until shown again.
    pub fn set_visible(&mut self, name: &str, visible: bool, resize_bytes: bool) -> Result<()> {
        mutate_at(
            self.schema,
            &mut self.layout,
            &mut self.buf,
            0,
            &[],
            name,
            Mutation::SetVisible(visible),
            resize_bytes,
        )
        .map(|_| ())
    }

    /// Live handle to a nested record field.
    pub fn sub(&mut self, name: &str) -> Result<SubRecord<'_, 's>> {
        let idx = sub_index_at(self.schema, &mut self.layout, &self.buf, 0, &[], name)?;
        Ok(SubRecord {
            rec: self,
            path: smallvec![idx],
        })
    }

    /// End offset of the last field, resolving the whole layout.
    pub fn size(&mut self) -> Result<usize> {
        total_size(self.schema, &mut self.layout, &self.buf, 0)
    }

    /// The logical byte range of the record, reflecting the latest writes.
    pub fn bytes(&mut self) -> Result<&[u8]> {
        let size = total_size(self.schema, &mut self.layout, &self.buf, 0)?;
        ensure!(
            size <= self.buf.len(),
            "record is out of bounds: fields occupy {} bytes, buffer holds {}",
            size,
            self.buf.len()
        );
        Ok(&self.buf[..size])
    }

    /// Consumes the record and returns the logical bytes, dropping any
    /// trailing slack a supplied buffer carried.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let size = total_size(self.schema, &mut self.layout, &self.buf, 0)?;
        ensure!(
            size <= self.buf.len(),
            "record is out of bounds: fields occupy {} bytes, buffer holds {}",
            size,
            self.buf.len()
        );
        self.buf.truncate(size);
        Ok(self.buf)
    }

    /// The whole physical buffer, including any unresolved slack.
    pub fn raw(&self) -> &[u8] {
        &self.buf
    }

    #[cfg(test)]
    pub(crate) fn probe(&self, idx: usize) -> (usize, usize, bool) {
        let slot = &self.layout.slots[idx];
        (slot.start, slot.size, slot.valid)
    }
}

/// Live view of a nested record, addressed by field path from the root.
/// Mutations land in the root's buffer and size changes propagate to every
/// ancestor before the call returns.
#[derive(Debug)]
pub struct SubRecord<'r, 's> {
    rec: &'r mut Record<'s>,
    path: FieldPath,
}

impl<'r, 's> SubRecord<'r, 's> {
    pub fn get(&mut self, name: &str) -> Result<Value> {
        get_at(
            self.rec.schema,
            &mut self.rec.layout,
            &self.rec.buf,
            0,
            &self.path,
            name,
        )
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        mutate_at(
            self.rec.schema,
            &mut self.rec.layout,
            &mut self.rec.buf,
            0,
            &self.path,
            name,
            Mutation::Set(&value),
            true,
        )
        .map(|_| ())
    }

    pub fn resize(&mut self, name: &str, new_len: usize, resize_bytes: bool) -> Result<()> {
        mutate_at(
            self.rec.schema,
            &mut self.rec.layout,
            &mut self.rec.buf,
            0,
            &self.path,
            name,
            Mutation::Resize(new_len),
            resize_bytes,
        )
        .map(|_| ())
    }

    pub fn reshape(&mut self, name: &str, dims: &[usize], resize_bytes: bool) -> Result<()> {
        mutate_at(
            self.rec.schema,
            &mut self.rec.layout,
            &mut self.rec.buf,
            0,
            &self.path,
            name,
            Mutation::Reshape(dims),
            resize_bytes,
        )
        .map(|_| ())
    }

    pub fn bind(&mut self, name: &str, ty: FieldType, resize_bytes: bool) -> Result<()> {
        mutate_at(
            self.rec.schema,
            &mut self.rec.layout,
            &mut self.rec.buf,
            0,
            &self.path,
            name,
            Mutation::Bind(ty),
            resize_bytes,
        )
        .map(|_| ())
    }

    pub fn set_visible(&mut self, name: &str, visible: bool, resize_bytes: bool) -> Result<()> {
        mutate_at(
            self.rec.schema,
            &mut self.rec.layout,
            &mut self.rec.buf,
            0,
            &self.path,
            name,
            Mutation::SetVisible(visible),
            resize_bytes,
        )
        .map(|_| ())
    }

    /// Descends one more level into a nested record field.
    pub fn sub(&mut self, name: &str) -> Result<SubRecord<'_, 's>> {
        let idx = sub_index_at(
            self.rec.schema,
            &mut self.rec.layout,
            &self.rec.buf,
            0,
            &self.path,
            name,
        )?;
        let mut path = self.path.clone();
        path.push(idx);
        Ok(SubRecord {
            rec: &mut *self.rec,
            path,
        })
    }

    /// This sub-record's current byte size.
    pub fn size(&mut self) -> Result<usize> {
        let (_, size) = span_at(
            self.rec.schema,
            &mut self.rec.layout,
            &self.rec.buf,
            0,
            &self.path,
        )?;
        Ok(size)
    }

    /// The byte range this sub-record occupies inside the root buffer.
    pub fn bytes(&mut self) -> Result<&[u8]> {
        let (start, size) = span_at(
            self.rec.schema,
            &mut self.rec.layout,
            &self.rec.buf,
            0,
            &self.path,
        )?;
        let end = checked_end(start, size)?;
        ensure!(
            end <= self.rec.buf.len(),
            "sub-record is out of bounds: needs bytes {}..{} of a {}-byte buffer",
            start,
            end,
            self.rec.buf.len()
        );
        Ok(&self.rec.buf[start..end])
    }
}

enum Mutation<'v> {
    Set(&'v Value),
    Resize(usize),
    Reshape(&'v [usize]),
    Bind(FieldType),
    SetVisible(bool),
}

enum DynState {
    Untouched,
    Len(usize),
    Dims(Shape),
}

/// Grows or shrinks a field's byte region in place. The common prefix is
/// kept; growth zero-fills the tail, shrinking drops it.
fn splice_bytes(buf: &mut Vec<u8>, at: usize, old: usize, new: usize) -> Result<()> {
    let end = checked_end(at, old)?;
    ensure!(
        end <= buf.len(),
        "resize is out of bounds: field occupies bytes {}..{} of a {}-byte buffer",
        at,
        end,
        buf.len()
    );
    if new > old {
        buf.splice(at + old..at + old, std::iter::repeat(0u8).take(new - old));
    } else if new < old {
        buf.drain(at + new..at + old);
    }
    Ok(())
}

fn field_slice<'b>(buf: &'b [u8], start: usize, size: usize, name: &str) -> Result<&'b [u8]> {
    let end = checked_end(start, size)?;
    ensure!(
        end <= buf.len(),
        "field `{}` is out of bounds: needs bytes {}..{} of a {}-byte buffer",
        name,
        start,
        end,
        buf.len()
    );
    Ok(&buf[start..end])
}

fn elem_width(elem: &FieldType) -> Result<usize> {
    elem.static_size()
        .ok_or_else(|| eyre::eyre!("array element type must have a static size"))
}

/// The nested schema behind a sub-record field, taking variant bindings
/// into account.
fn child_schema(schema: &Schema, layout: &Layout, idx: usize) -> Result<Arc<Schema>> {
    let field = &schema.fields()[idx];
    let ty = layout.slots[idx].bound.as_ref().unwrap_or(&field.ty);
    match ty {
        FieldType::Struct { schema: sub } => Ok(sub.clone()),
        _ => bail!("field `{}` is not a sub-record", field.name),
    }
}

fn lookup(schema: &Schema, name: &str) -> Result<usize> {
    schema
        .index_of(name)
        .ok_or_else(|| eyre::eyre!("unknown field `{}`", name))
}

fn apply_dyn_state(layout: &mut Layout, idx: usize, state: DynState) {
    match state {
        DynState::Untouched => {}
        DynState::Len(n) => layout.slots[idx].dyn_len = Some(n),
        DynState::Dims(dims) => layout.slots[idx].dyn_shape = Some(dims),
    }
}

/// Commits a new size for a resolved field: optional buffer splice, dynamic
/// state update, direct entry rewrite, suffix invalidation. Returns the
/// length delta for ancestor propagation. Hidden fields only remember the
/// new dynamic state.
fn apply_size_change(
    layout: &mut Layout,
    buf: &mut Vec<u8>,
    base: usize,
    idx: usize,
    new_size: usize,
    resize_bytes: bool,
    state: DynState,
) -> Result<isize> {
    if layout.slots[idx].hidden {
        apply_dyn_state(layout, idx, state);
        return Ok(0);
    }
    let old = layout.slots[idx].entry();
    checked_end(old.start, new_size)?;
    if resize_bytes && new_size != old.size {
        splice_bytes(buf, checked_end(base, old.start)?, old.size, new_size)?;
    }
    apply_dyn_state(layout, idx, state);
    let slot = &mut layout.slots[idx];
    slot.size = new_size;
    slot.valid = true;
    layout.invalidate_from(idx + 1);
    Ok(new_size as isize - old.size as isize)
}

/// Offset entries of every field driven by `idx`, captured before a write
/// to `idx` changes what their sizes would resolve to.
fn capture_deps(
    schema: &Schema,
    layout: &mut Layout,
    buf: &[u8],
    base: usize,
    idx: usize,
) -> Result<SmallVec<[(usize, OffsetEntry); 2]>> {
    let deps = schema.dependents_of(idx);
    let mut captured = SmallVec::new();
    if let Some(&last) = deps.last() {
        resolve(schema, layout, buf, base, last)?;
        for &d in deps {
            captured.push((d, layout.slots[d].entry()));
        }
    }
    Ok(captured)
}

/// Re-sizes every captured dependent to match the peer's new value,
/// shifting later bytes as needed. Runs after the peer's bytes are written.
fn cascade(
    schema: &Schema,
    layout: &mut Layout,
    buf: &mut Vec<u8>,
    base: usize,
    deps: &[(usize, OffsetEntry)],
    count: u64,
) -> Result<isize> {
    let count = usize::try_from(count)
        .map_err(|_| eyre::eyre!("peer value {} is larger than the address space", count))?;
    let mut acc = 0isize;
    let mut first_changed: Option<usize> = None;
    for &(d, old) in deps {
        let (new_size, state) = match &schema.fields()[d].ty {
            FieldType::Str { .. } | FieldType::Bytes { .. } => (count, DynState::Len(count)),
            FieldType::Array { elem, .. } => (
                shape_size(elem_width(elem)?, &[count])?,
                DynState::Dims(smallvec![count]),
            ),
            _ => bail!(
                "field `{}` cannot have a peer-driven size",
                schema.fields()[d].name
            ),
        };
        if layout.slots[d].hidden {
            apply_dyn_state(layout, d, state);
            continue;
        }
        let start = (old.start as isize + acc) as usize;
        if new_size != old.size {
            splice_bytes(buf, checked_end(base, start)?, old.size, new_size)?;
            acc += new_size as isize - old.size as isize;
            first_changed.get_or_insert(d);
        }
        apply_dyn_state(layout, d, state);
    }
    if let Some(first) = first_changed {
        layout.invalidate_from(first);
    }
    Ok(acc)
}

/// Decodes field `idx` at this layout level. Resolution happens here;
/// interpretation is delegated to the codecs.
fn read_field(
    schema: &Schema,
    layout: &mut Layout,
    buf: &[u8],
    base: usize,
    idx: usize,
) -> Result<Value> {
    let name = &schema.fields()[idx].name;
    ensure!(
        !layout.slots[idx].hidden,
        "hidden field `{}` cannot be read",
        name
    );
    let entry = resolve(schema, layout, buf, base, idx)?;
    let ty = effective_type(schema, layout, idx);
    let start = checked_end(base, entry.start)?;

    match &ty {
        FieldType::Struct { schema: sub } => {
            let sub = sub.clone();
            let count = sub.field_count();
            let child = layout.slots[idx]
                .child
                .get_or_insert_with(|| Box::new(Layout::new(count)));
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                if child.slots[i].hidden {
                    values.push(Value::Null);
                } else {
                    values.push(read_field(&sub, child, buf, start, i)?);
                }
            }
            Ok(Value::Record(values))
        }
        FieldType::Variant => Ok(Value::Null),
        FieldType::Str { encoding, .. } => {
            decode_str(field_slice(buf, start, entry.size, name)?, *encoding)
        }
        FieldType::Bytes { .. } => Ok(Value::Bytes(
            field_slice(buf, start, entry.size, name)?.to_vec(),
        )),
        FieldType::Array { elem, shape } => {
            let dims: Option<Shape> = match shape {
                ShapeSpec::Fixed(dims) => Some(dims.clone()),
                ShapeSpec::Dynamic | ShapeSpec::Peer(_) => layout.slots[idx].dyn_shape.clone(),
            };
            match dims {
                Some(dims) => decode_array(elem, &dims, field_slice(buf, start, entry.size, name)?),
                None => Ok(Value::Array(Vec::new())),
            }
        }
        _ => decode_static(&ty, field_slice(buf, start, entry.size, name)?),
    }
}

/// Encodes `value` into field `idx` at this layout level, resizing first
/// when the field sizes itself, then re-sizing any peer-driven dependents.
fn set_leaf(
    schema: &Schema,
    layout: &mut Layout,
    buf: &mut Vec<u8>,
    base: usize,
    idx: usize,
    value: &Value,
) -> Result<isize> {
    let name = schema.fields()[idx].name.clone();
    ensure!(
        !layout.slots[idx].hidden,
        "hidden field `{}` cannot be written",
        name
    );
    let entry = resolve(schema, layout, buf, base, idx)?;
    let ty = effective_type(schema, layout, idx);

    if let FieldType::Struct { schema: sub } = &ty {
        return set_record_leaf(layout, buf, base, idx, sub.clone(), value, entry);
    }
    if matches!(ty, FieldType::Variant) {
        if value.is_null() {
            return Ok(0);
        }
        bail!(
            "unresolved variant field `{}`: bind a type before writing",
            name
        );
    }
    ensure!(
        !value.is_null(),
        "cannot encode a null value into field `{}`",
        name
    );

    let deps = capture_deps(schema, layout, buf, base, idx)?;

    let mut tmp = Vec::new();
    let mut state = DynState::Untouched;
    let mut implicit = false;
    match &ty {
        FieldType::Str {
            len: SizeSpec::Dynamic,
            ..
        }
        | FieldType::Bytes {
            len: SizeSpec::Dynamic,
        } => {
            tmp = encode_one(&ty, value)?;
            state = DynState::Len(tmp.len());
            implicit = true;
        }
        FieldType::Array {
            elem,
            shape: ShapeSpec::Dynamic,
        } => {
            let dims = value_dims(value);
            encode_array_into(elem, &dims, value, &mut tmp)?;
            state = DynState::Dims(dims);
            implicit = true;
        }
        FieldType::Array {
            elem,
            shape: ShapeSpec::Peer(_),
        } => {
            let dims = layout.slots[idx].dyn_shape.clone().unwrap_or_default();
            encode_array_into(elem, &dims, value, &mut tmp)?;
        }
        _ => encode_static_into(&ty, value, &mut tmp)?,
    }

    let mut delta = 0isize;
    if tmp.len() != entry.size {
        ensure!(
            implicit,
            "size mismatch: field `{}` holds {} bytes, value encodes to {} bytes",
            name,
            entry.size,
            tmp.len()
        );
        delta = apply_size_change(layout, buf, base, idx, tmp.len(), true, state)?;
    } else if implicit {
        // Same byte count, possibly a different shape.
        apply_dyn_state(layout, idx, state);
    }

    let start = checked_end(base, entry.start)?;
    let end = checked_end(start, tmp.len())?;
    ensure!(
        end <= buf.len(),
        "field `{}` is out of bounds: needs bytes {}..{} of a {}-byte buffer",
        name,
        start,
        end,
        buf.len()
    );
    buf[start..end].copy_from_slice(&tmp);

    if !deps.is_empty() {
        delta += cascade(schema, layout, buf, base, &deps, value.as_uint()?)?;
    }
    Ok(delta)
}

/// Writes a `Value::Record` snapshot into a sub-record field, one child
/// field at a time. Null entries leave the corresponding bytes untouched.
fn set_record_leaf(
    layout: &mut Layout,
    buf: &mut Vec<u8>,
    base: usize,
    idx: usize,
    sub: Arc<Schema>,
    value: &Value,
    entry: OffsetEntry,
) -> Result<isize> {
    let values = value.as_record()?;
    ensure!(
        values.len() == sub.field_count(),
        "record value has {} fields, sub-record declares {}",
        values.len(),
        sub.field_count()
    );
    let start = checked_end(base, entry.start)?;
    let count = sub.field_count();
    let mut total = 0isize;
    for (i, v) in values.iter().enumerate() {
        if v.is_null() {
            continue;
        }
        let child = layout.slots[idx]
            .child
            .get_or_insert_with(|| Box::new(Layout::new(count)));
        total += set_leaf(&sub, child, buf, start, i, v)?;
    }
    if total != 0 {
        let slot = &mut layout.slots[idx];
        slot.size = (slot.size as isize + total) as usize;
        layout.invalidate_from(idx + 1);
    }
    Ok(total)
}

fn resize_leaf(
    schema: &Schema,
    layout: &mut Layout,
    buf: &mut Vec<u8>,
    base: usize,
    idx: usize,
    new_len: usize,
    resize_bytes: bool,
) -> Result<isize> {
    let name = &schema.fields()[idx].name;
    resolve(schema, layout, buf, base, idx)?;
    let ty = effective_type(schema, layout, idx);
    match &ty {
        FieldType::Str {
            len: SizeSpec::Dynamic,
            ..
        }
        | FieldType::Bytes {
            len: SizeSpec::Dynamic,
        } => apply_size_change(
            layout,
            buf,
            base,
            idx,
            new_len,
            resize_bytes,
            DynState::Len(new_len),
        ),
        FieldType::Array {
            elem,
            shape: ShapeSpec::Dynamic,
        } => {
            let new_size = shape_size(elem_width(elem)?, &[new_len])?;
            apply_size_change(
                layout,
                buf,
                base,
                idx,
                new_size,
                resize_bytes,
                DynState::Dims(smallvec![new_len]),
            )
        }
        FieldType::Str {
            len: SizeSpec::Peer(peer),
            ..
        }
        | FieldType::Bytes {
            len: SizeSpec::Peer(peer),
        }
        | FieldType::Array {
            shape: ShapeSpec::Peer(peer),
            ..
        } => bail!(
            "size of field `{}` is driven by peer field `{}`",
            name,
            peer
        ),
        FieldType::Variant => bail!(
            "unresolved variant field `{}`: bind a type before resizing",
            name
        ),
        _ => bail!("field `{}` has a fixed size and cannot be resized", name),
    }
}

fn reshape_leaf(
    schema: &Schema,
    layout: &mut Layout,
    buf: &mut Vec<u8>,
    base: usize,
    idx: usize,
    dims: &[usize],
    resize_bytes: bool,
) -> Result<isize> {
    let name = &schema.fields()[idx].name;
    resolve(schema, layout, buf, base, idx)?;
    let ty = effective_type(schema, layout, idx);
    match &ty {
        FieldType::Array {
            elem,
            shape: ShapeSpec::Dynamic,
        } => {
            let new_size = shape_size(elem_width(elem)?, dims)?;
            apply_size_change(
                layout,
                buf,
                base,
                idx,
                new_size,
                resize_bytes,
                DynState::Dims(Shape::from_slice(dims)),
            )
        }
        FieldType::Array {
            shape: ShapeSpec::Peer(peer),
            ..
        } => bail!(
            "size of field `{}` is driven by peer field `{}`",
            name,
            peer
        ),
        _ => bail!("field `{}` is not a dynamically shaped array", name),
    }
}

fn bind_leaf(
    schema: &Schema,
    layout: &mut Layout,
    buf: &mut Vec<u8>,
    base: usize,
    idx: usize,
    ty: FieldType,
    resize_bytes: bool,
) -> Result<isize> {
    let name = &schema.fields()[idx].name;
    ensure!(
        matches!(schema.fields()[idx].ty, FieldType::Variant),
        "field `{}` is not a variant",
        name
    );
    validate_bound_type(&ty)?;
    let entry = resolve(schema, layout, buf, base, idx)?;
    let (new_size, child) = match &ty {
        FieldType::Struct { schema: sub } => (
            sub.static_size(),
            Some(Box::new(Layout::new(sub.field_count()))),
        ),
        other => (other.static_size().unwrap_or(0), None),
    };
    checked_end(entry.start, new_size)?;
    if layout.slots[idx].hidden {
        let slot = &mut layout.slots[idx];
        slot.bound = Some(ty);
        slot.dyn_len = None;
        slot.dyn_shape = None;
        slot.child = child;
        return Ok(0);
    }
    if resize_bytes && new_size != entry.size {
        splice_bytes(buf, checked_end(base, entry.start)?, entry.size, new_size)?;
    }
    let slot = &mut layout.slots[idx];
    slot.bound = Some(ty);
    slot.dyn_len = None;
    slot.dyn_shape = None;
    slot.child = child;
    slot.size = new_size;
    slot.valid = true;
    layout.invalidate_from(idx + 1);
    Ok(new_size as isize - entry.size as isize)
}

fn set_visible_leaf(
    schema: &Schema,
    layout: &mut Layout,
    buf: &mut Vec<u8>,
    base: usize,
    idx: usize,
    visible: bool,
    resize_bytes: bool,
) -> Result<isize> {
    if layout.slots[idx].hidden == !visible {
        return Ok(0);
    }
    if !visible {
        let entry = resolve(schema, layout, buf, base, idx)?;
        if resize_bytes && entry.size > 0 {
            splice_bytes(buf, checked_end(base, entry.start)?, entry.size, 0)?;
        }
        let slot = &mut layout.slots[idx];
        slot.hidden = true;
        slot.size = 0;
        slot.valid = true;
        layout.invalidate_from(idx + 1);
        Ok(-(entry.size as isize))
    } else {
        // Re-resolve with the field visible to learn its size again, then
        // make room for it.
        resolve(schema, layout, buf, base, idx)?;
        layout.slots[idx].hidden = false;
        layout.slots[idx].valid = false;
        let entry = resolve(schema, layout, buf, base, idx)?;
        if resize_bytes && entry.size > 0 {
            splice_bytes(buf, checked_end(base, entry.start)?, 0, entry.size)?;
        }
        layout.invalidate_from(idx + 1);
        Ok(entry.size as isize)
    }
}

/// Walks `hops` down the sub-record chain, then decodes `name` at the
/// final level.
fn get_at(
    schema: &Schema,
    layout: &mut Layout,
    buf: &[u8],
    base: usize,
    hops: &[usize],
    name: &str,
) -> Result<Value> {
    if let Some((&h, rest)) = hops.split_first() {
        ensure!(
            !layout.slots[h].hidden,
            "hidden field `{}` cannot be accessed",
            schema.fields()[h].name
        );
        let entry = resolve(schema, layout, buf, base, h)?;
        let sub = child_schema(schema, layout, h)?;
        let count = sub.field_count();
        let child = layout.slots[h]
            .child
            .get_or_insert_with(|| Box::new(Layout::new(count)));
        return get_at(&sub, child, buf, checked_end(base, entry.start)?, rest, name);
    }
    let idx = lookup(schema, name)?;
    read_field(schema, layout, buf, base, idx)
}

/// Walks `hops` down the sub-record chain, applies the mutation at the
/// final level and folds the length delta back into each ancestor's entry
/// on the way out.
#[allow(clippy::too_many_arguments)]
fn mutate_at(
    schema: &Schema,
    layout: &mut Layout,
    buf: &mut Vec<u8>,
    base: usize,
    hops: &[usize],
    name: &str,
    mutation: Mutation<'_>,
    resize_bytes: bool,
) -> Result<isize> {
    if let Some((&h, rest)) = hops.split_first() {
        ensure!(
            !layout.slots[h].hidden,
            "hidden field `{}` cannot be accessed",
            schema.fields()[h].name
        );
        let entry = resolve(schema, layout, buf, base, h)?;
        let sub = child_schema(schema, layout, h)?;
        let count = sub.field_count();
        let child = layout.slots[h]
            .child
            .get_or_insert_with(|| Box::new(Layout::new(count)));
        let delta = mutate_at(
            &sub,
            child,
            buf,
            checked_end(base, entry.start)?,
            rest,
            name,
            mutation,
            resize_bytes,
        )?;
        if delta != 0 {
            let slot = &mut layout.slots[h];
            slot.size = (slot.size as isize + delta) as usize;
            layout.invalidate_from(h + 1);
        }
        return Ok(delta);
    }
    let idx = lookup(schema, name)?;
    match mutation {
        Mutation::Set(value) => set_leaf(schema, layout, buf, base, idx, value),
        Mutation::Resize(new_len) => {
            resize_leaf(schema, layout, buf, base, idx, new_len, resize_bytes)
        }
        Mutation::Reshape(dims) => reshape_leaf(schema, layout, buf, base, idx, dims, resize_bytes),
        Mutation::Bind(ty) => bind_leaf(schema, layout, buf, base, idx, ty, resize_bytes),
        Mutation::SetVisible(visible) => {
            set_visible_leaf(schema, layout, buf, base, idx, visible, resize_bytes)
        }
    }
}

/// Resolves `name` to a field index at the level `hops` points at and
/// checks it is a sub-record.
fn sub_index_at(
    schema: &Schema,
    layout: &mut Layout,
    buf: &[u8],
    base: usize,
    hops: &[usize],
    name: &str,
) -> Result<usize> {
    if let Some((&h, rest)) = hops.split_first() {
        ensure!(
            !layout.slots[h].hidden,
            "hidden field `{}` cannot be accessed",
            schema.fields()[h].name
        );
        let entry = resolve(schema, layout, buf, base, h)?;
        let sub = child_schema(schema, layout, h)?;
        let count = sub.field_count();
        let child = layout.slots[h]
            .child
            .get_or_insert_with(|| Box::new(Layout::new(count)));
        return sub_index_at(&sub, child, buf, checked_end(base, entry.start)?, rest, name);
    }
    let idx = lookup(schema, name)?;
    child_schema(schema, layout, idx)?;
    Ok(idx)
}

/// Absolute start and size of the level `hops` points at.
fn span_at(
    schema: &Schema,
    layout: &mut Layout,
    buf: &[u8],
    base: usize,
    hops: &[usize],
) -> Result<(usize, usize)> {
    let (&h, rest) = hops
        .split_first()
        .ok_or_else(|| eyre::eyre!("empty sub-record path"))?;
    ensure!(
        !layout.slots[h].hidden,
        "hidden field `{}` cannot be accessed",
        schema.fields()[h].name
    );
    let entry = resolve(schema, layout, buf, base, h)?;
    if rest.is_empty() {
        return Ok((checked_end(base, entry.start)?, entry.size));
    }
    let sub = child_schema(schema, layout, h)?;
    let count = sub.field_count();
    let child = layout.slots[h]
        .child
        .get_or_insert_with(|| Box::new(Layout::new(count)));
    span_at(&sub, child, buf, checked_end(base, entry.start)?, rest)
}
