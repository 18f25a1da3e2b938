//! # fieldbuf - Declarative Binary Record Layouts
//!
//! fieldbuf lets you describe the layout of a binary record as an ordered
//! list of typed fields and then read and write those fields by name,
//! backed by a single contiguous byte buffer. No byte offsets are tracked
//! by hand: the layout engine resolves every field's placement lazily,
//! caches it, and keeps it correct across in-place resizes.
//!
//! ## Quick Start
//!
//! ```ignore
//! use fieldbuf::{FieldType, Record, Schema, Value};
//!
//! let schema = Schema::builder()
//!     .field("magic", FieldType::str_fixed(5))
//!     .field("length", FieldType::uint(4))
//!     .field("items", FieldType::array_peer(FieldType::int(4), "length"))
//!     .finish()?;
//!
//! let mut record = Record::with_values(
//!     &schema,
//!     [
//!         ("magic", Value::from("bytes")),
//!         ("length", Value::from(3u32)),
//!         ("items", Value::from([1i32, 2, 3])),
//!     ],
//! )?;
//!
//! let wire = record.bytes()?.to_vec();
//! let mut parsed = Record::from_bytes(&schema, wire);
//! assert_eq!(parsed.get("items")?, Value::from([1i32, 2, 3]));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Record / SubRecord (named accessors)  │
//! ├─────────────────────────────────────────┤
//! │   Layout resolver (lazy offset cache)   │
//! ├─────────────────────────────────────────┤
//! │   Schema (ordered field descriptors)    │
//! ├────────────────────┬────────────────────┤
//! │   Codecs (scalars, │   One contiguous   │
//! │   strings, arrays) │   byte buffer      │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Layout Rules
//!
//! - Declaration order is byte order; fields are packed back to back with
//!   no alignment padding.
//! - A field's size is static (scalars, fixed strings and arrays), driven
//!   by an earlier unsigned integer field, set by an explicit resize, or
//!   zero (unbound variants, hidden fields).
//! - Offsets resolve on demand and are cached per instance. Resizing field
//!   k rewrites k's entry directly and invalidates only k+1 onward.
//! - Sub-records are views into the parent's buffer; a resize inside one
//!   propagates its length delta to every ancestor in the same call.
//!
//! All operations are synchronous and single-threaded; a record owns its
//! buffer exclusively and provides no internal locking.
//!
//! ## Module Overview
//!
//! - [`schema`]: ordered field declarations, validated and frozen at build
//! - [`types`]: field descriptors and size policies
//! - [`record`]: record instances, accessors, resizing, sub-records
//! - [`codec`]: scalar and aggregate encode/decode
//! - [`value`]: owned decoded values

pub mod codec;
pub mod record;
mod resolver;
pub mod schema;
pub mod types;
pub mod value;

#[cfg(test)]
mod tests;

pub use codec::{decode_one, encode_one};
pub use record::{Record, SubRecord};
pub use schema::{Schema, SchemaBuilder};
pub use types::{Endian, FieldDef, FieldType, Shape, ShapeSpec, SizeSpec, StrEncoding};
pub use value::Value;
