//! # Scalar and Aggregate Codecs
//!
//! Encode/decode between `Value` and raw bytes for every statically sized
//! field kind. The layout engine resolves where a field's bytes live; this
//! module is only concerned with what the bytes mean.
//!
//! Codecs are total over well-formed inputs: they consume and produce exactly
//! the number of bytes the field declares, and they reject anything else
//! (out-of-range integers, wrong-length fixed strings, non-ASCII bytes in an
//! ASCII field) instead of truncating or padding.
//!
//! The free functions [`encode_one`] and [`decode_one`] pack or unpack a
//! single field without declaring a schema, which is convenient for one-off
//! headers and tests.

use eyre::{bail, ensure, Result};

use crate::types::{Endian, FieldType, Shape, SizeSpec, ShapeSpec, StrEncoding};
use crate::value::Value;

/// Decodes an unsigned integer of `size` bytes.
pub(crate) fn decode_uint(bytes: &[u8], endian: Endian) -> u64 {
    let mut buf = [0u8; 8];
    match endian {
        Endian::Little => {
            buf[..bytes.len()].copy_from_slice(bytes);
            u64::from_le_bytes(buf)
        }
        Endian::Big => {
            buf[8 - bytes.len()..].copy_from_slice(bytes);
            u64::from_be_bytes(buf)
        }
    }
}

fn decode_int(bytes: &[u8], endian: Endian) -> i64 {
    let raw = decode_uint(bytes, endian);
    let shift = 64 - 8 * bytes.len() as u32;
    // Sign-extend from the field's width.
    ((raw << shift) as i64) >> shift
}

fn encode_uint_into(value: u64, size: usize, endian: Endian, out: &mut Vec<u8>) -> Result<()> {
    if size < 8 {
        ensure!(
            value < 1u64 << (8 * size),
            "value {} out of range for a {}-byte unsigned integer",
            value,
            size
        );
    }
    match endian {
        Endian::Little => out.extend_from_slice(&value.to_le_bytes()[..size]),
        Endian::Big => out.extend_from_slice(&value.to_be_bytes()[8 - size..]),
    }
    Ok(())
}

fn encode_int_into(value: i64, size: usize, endian: Endian, out: &mut Vec<u8>) -> Result<()> {
    if size < 8 {
        let bound = 1i64 << (8 * size - 1);
        ensure!(
            value >= -bound && value < bound,
            "value {} out of range for a {}-byte signed integer",
            value,
            size
        );
    }
    match endian {
        Endian::Little => out.extend_from_slice(&value.to_le_bytes()[..size]),
        Endian::Big => out.extend_from_slice(&value.to_be_bytes()[8 - size..]),
    }
    Ok(())
}

pub(crate) fn decode_str(bytes: &[u8], encoding: StrEncoding) -> Result<Value> {
    match encoding {
        StrEncoding::Utf8 => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| eyre::eyre!("invalid UTF-8 in string field: {}", e))?;
            Ok(Value::Str(s.to_owned()))
        }
        StrEncoding::Ascii => {
            ensure!(bytes.is_ascii(), "non-ASCII byte in ASCII string field");
            // ASCII is a UTF-8 subset, so this cannot fail after the check.
            Ok(Value::Str(String::from_utf8_lossy(bytes).into_owned()))
        }
    }
}

fn encode_str_into(value: &Value, encoding: StrEncoding, out: &mut Vec<u8>) -> Result<()> {
    let s = value.as_str()?;
    if encoding == StrEncoding::Ascii {
        ensure!(s.is_ascii(), "non-ASCII character in ASCII string field");
    }
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Decodes `bytes` as `ty`. The type must be statically sized and `bytes`
/// must be exactly that size.
pub(crate) fn decode_static(ty: &FieldType, bytes: &[u8]) -> Result<Value> {
    match ty {
        FieldType::Int {
            size,
            signed,
            endian,
        } => {
            ensure!(
                bytes.len() == *size,
                "expected {} bytes for an integer field, got {}",
                size,
                bytes.len()
            );
            if *signed {
                Ok(Value::Int(decode_int(bytes, *endian)))
            } else {
                Ok(Value::UInt(decode_uint(bytes, *endian)))
            }
        }
        FieldType::Bool { size, endian } => {
            ensure!(
                bytes.len() == *size,
                "expected {} bytes for a boolean field, got {}",
                size,
                bytes.len()
            );
            Ok(Value::Bool(decode_uint(bytes, *endian) != 0))
        }
        FieldType::Float32 { endian } => {
            ensure!(bytes.len() == 4, "expected 4 bytes for a float32 field");
            let raw = decode_uint(bytes, *endian) as u32;
            Ok(Value::Float(f32::from_bits(raw) as f64))
        }
        FieldType::Float64 { endian } => {
            ensure!(bytes.len() == 8, "expected 8 bytes for a float64 field");
            Ok(Value::Float(f64::from_bits(decode_uint(bytes, *endian))))
        }
        FieldType::Str { len, encoding } => {
            if let SizeSpec::Fixed(n) = len {
                ensure!(
                    bytes.len() == *n,
                    "expected {} bytes for a fixed string field, got {}",
                    n,
                    bytes.len()
                );
            }
            decode_str(bytes, *encoding)
        }
        FieldType::Bytes { len } => {
            if let SizeSpec::Fixed(n) = len {
                ensure!(
                    bytes.len() == *n,
                    "expected {} bytes for a fixed byte field, got {}",
                    n,
                    bytes.len()
                );
            }
            Ok(Value::Bytes(bytes.to_vec()))
        }
        FieldType::Array { elem, shape } => match shape {
            ShapeSpec::Fixed(dims) => decode_array(elem, dims, bytes),
            _ => bail!("cannot decode a dynamically shaped array without an instance"),
        },
        FieldType::Struct { schema } => {
            ensure!(
                schema.is_fully_static(),
                "cannot decode a variable-size record without an instance"
            );
            let mut values = Vec::with_capacity(schema.field_count());
            let mut offset = 0;
            for field in schema.fields() {
                let size = field
                    .ty
                    .static_size()
                    .ok_or_else(|| eyre::eyre!("field `{}` has no static size", field.name))?;
                ensure!(
                    offset + size <= bytes.len(),
                    "record data out of bounds at field `{}`",
                    field.name
                );
                values.push(decode_static(&field.ty, &bytes[offset..offset + size])?);
                offset += size;
            }
            Ok(Value::Record(values))
        }
        FieldType::Variant => bail!("cannot decode a variant field without an instance"),
    }
}

/// Encodes `value` as `ty`, appending to `out`. For fixed-size kinds the
/// produced length always matches the declared size or the call fails.
pub(crate) fn encode_static_into(ty: &FieldType, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    if value.is_null() {
        bail!("cannot encode a null value");
    }
    match ty {
        FieldType::Int {
            size,
            signed,
            endian,
        } => {
            if *signed {
                encode_int_into(value.as_int()?, *size, *endian, out)
            } else {
                encode_uint_into(value.as_uint()?, *size, *endian, out)
            }
        }
        FieldType::Bool { size, endian } => {
            encode_uint_into(u64::from(value.as_bool()?), *size, *endian, out)
        }
        FieldType::Float32 { endian } => {
            let bits = (value.as_float()? as f32).to_bits() as u64;
            encode_uint_into(bits, 4, *endian, out)
        }
        FieldType::Float64 { endian } => {
            encode_uint_into(value.as_float()?.to_bits(), 8, *endian, out)
        }
        FieldType::Str { len, encoding } => {
            let before = out.len();
            encode_str_into(value, *encoding, out)?;
            if let SizeSpec::Fixed(n) = len {
                ensure!(
                    out.len() - before == *n,
                    "size mismatch: string of {} bytes does not fit a {}-byte field",
                    out.len() - before,
                    n
                );
            }
            Ok(())
        }
        FieldType::Bytes { len } => {
            let bytes = value.as_bytes()?;
            if let SizeSpec::Fixed(n) = len {
                ensure!(
                    bytes.len() == *n,
                    "size mismatch: {} bytes do not fit a {}-byte field",
                    bytes.len(),
                    n
                );
            }
            out.extend_from_slice(bytes);
            Ok(())
        }
        FieldType::Array { elem, shape } => match shape {
            ShapeSpec::Fixed(dims) => encode_array_into(elem, dims, value, out),
            _ => bail!("cannot encode a dynamically shaped array without an instance"),
        },
        FieldType::Struct { schema } => {
            ensure!(
                schema.is_fully_static(),
                "cannot encode a variable-size record without an instance"
            );
            let values = value.as_record()?;
            ensure!(
                values.len() == schema.field_count(),
                "record value has {} fields, schema declares {}",
                values.len(),
                schema.field_count()
            );
            for (field, v) in schema.fields().iter().zip(values) {
                encode_static_into(&field.ty, v, out)?;
            }
            Ok(())
        }
        FieldType::Variant => bail!("cannot encode a variant field without an instance"),
    }
}

/// Decodes a packed row-major array of `dims` extents into nested
/// `Value::Array` rows.
pub(crate) fn decode_array(elem: &FieldType, dims: &[usize], bytes: &[u8]) -> Result<Value> {
    let elem_size = elem
        .static_size()
        .ok_or_else(|| eyre::eyre!("array element type must have a static size"))?;
    let expected = crate::resolver::shape_size(elem_size, dims)?;
    ensure!(
        bytes.len() == expected,
        "expected {} bytes for a {:?} array, got {}",
        expected,
        dims,
        bytes.len()
    );
    decode_array_rows(elem, elem_size, dims, bytes)
}

fn decode_array_rows(
    elem: &FieldType,
    elem_size: usize,
    dims: &[usize],
    bytes: &[u8],
) -> Result<Value> {
    match dims {
        [] => decode_static(elem, bytes),
        [n] => {
            let mut row = Vec::with_capacity(*n);
            for i in 0..*n {
                row.push(decode_static(elem, &bytes[i * elem_size..(i + 1) * elem_size])?);
            }
            Ok(Value::Array(row))
        }
        [n, rest @ ..] => {
            let stride = elem_size * rest.iter().product::<usize>();
            let mut rows = Vec::with_capacity(*n);
            for i in 0..*n {
                rows.push(decode_array_rows(
                    elem,
                    elem_size,
                    rest,
                    &bytes[i * stride..(i + 1) * stride],
                )?);
            }
            Ok(Value::Array(rows))
        }
    }
}

/// Encodes nested `Value::Array` rows as a packed row-major array of `dims`
/// extents, appending to `out`.
pub(crate) fn encode_array_into(
    elem: &FieldType,
    dims: &[usize],
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<()> {
    match dims {
        [] => encode_static_into(elem, value, out),
        [n, rest @ ..] => {
            let items = value.as_array()?;
            ensure!(
                items.len() == *n,
                "size mismatch: array value has {} rows, field shape expects {}",
                items.len(),
                n
            );
            for item in items {
                encode_array_into(elem, rest, item, out)?;
            }
            Ok(())
        }
    }
}

/// The shape a nested `Value::Array` would occupy, outermost extent first.
/// Scalar and record values report an empty shape.
pub(crate) fn value_dims(value: &Value) -> Shape {
    let mut dims = Shape::new();
    let mut cur = value;
    while let Value::Array(items) = cur {
        dims.push(items.len());
        match items.first() {
            Some(first @ Value::Array(_)) => cur = first,
            _ => break,
        }
    }
    dims
}

/// Packs a single value as `ty` without declaring a schema. Dynamic strings,
/// byte strings and arrays encode at the value's natural size; peer-driven
/// and variant fields need a record instance.
pub fn encode_one(ty: &FieldType, value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match ty {
        FieldType::Str {
            len: SizeSpec::Dynamic,
            encoding,
        } => encode_str_into(value, *encoding, &mut out)?,
        FieldType::Bytes {
            len: SizeSpec::Dynamic,
        } => out.extend_from_slice(value.as_bytes()?),
        FieldType::Array {
            elem,
            shape: ShapeSpec::Dynamic,
        } => {
            let dims = value_dims(value);
            encode_array_into(elem, &dims, value, &mut out)?;
        }
        _ => encode_static_into(ty, value, &mut out)?,
    }
    Ok(out)
}

/// Unpacks a single value as `ty` without declaring a schema. Dynamic
/// strings and byte strings consume the whole input; dynamic arrays consume
/// a whole number of elements.
pub fn decode_one(ty: &FieldType, bytes: &[u8]) -> Result<Value> {
    match ty {
        FieldType::Str {
            len: SizeSpec::Dynamic,
            encoding,
        } => decode_str(bytes, *encoding),
        FieldType::Bytes {
            len: SizeSpec::Dynamic,
        } => Ok(Value::Bytes(bytes.to_vec())),
        FieldType::Array {
            elem,
            shape: ShapeSpec::Dynamic,
        } => {
            let elem_size = elem
                .static_size()
                .ok_or_else(|| eyre::eyre!("array element type must have a static size"))?;
            ensure!(
                elem_size > 0 && bytes.len() % elem_size == 0,
                "{} bytes is not a whole number of {}-byte elements",
                bytes.len(),
                elem_size
            );
            let dims = [bytes.len() / elem_size];
            decode_array(elem, &dims, bytes)
        }
        _ => decode_static(ty, bytes),
    }
}
