//! # Schema Definition
//!
//! A `Schema` is the ordered list of named field descriptors that defines a
//! record's byte layout. Declaration order is byte order: every field starts
//! immediately after its predecessor, with no alignment padding. Schemas are
//! validated and frozen at build time and shared read-only across every
//! record instance (wrap in `Arc` to nest one schema inside another).
//!
//! ## Validation
//!
//! `Schema::new` rejects declarations that could never resolve:
//!
//! - duplicate field names
//! - integer or boolean widths other than 1, 2, 4 or 8
//! - array element types without a static size
//! - peer-driven sizes whose peer is missing, declared later, or not an
//!   unsigned integer
//!
//! A variable field with no peer is legal; it occupies zero bytes until an
//! explicit or implicit resize.

use eyre::{bail, ensure, Result};
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::types::{FieldDef, FieldType, ShapeSpec, SizeSpec};

#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
    /// For each field, the indices of later fields whose size it drives.
    dependents: Vec<SmallVec<[usize; 2]>>,
    static_size: usize,
    fully_static: bool,
}

impl Schema {
    pub fn new(fields: Vec<FieldDef>) -> Result<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            ensure!(
                index.insert(field.name.clone(), i).is_none(),
                "duplicate field name `{}`",
                field.name
            );
        }

        let mut dependents = vec![SmallVec::new(); fields.len()];
        let mut static_size: usize = 0;
        let mut fully_static = true;
        for (i, field) in fields.iter().enumerate() {
            validate_type(&field.ty, &field.name)?;
            if let Some(peer) = field.ty.peer() {
                let p = match index.get(peer) {
                    Some(&p) => p,
                    None => bail!(
                        "unknown field `{}` named as the size peer of `{}`",
                        peer,
                        field.name
                    ),
                };
                ensure!(
                    p < i,
                    "size peer `{}` must be declared before `{}`",
                    peer,
                    field.name
                );
                ensure!(
                    matches!(fields[p].ty, FieldType::Int { signed: false, .. }),
                    "size peer `{}` of `{}` must be an unsigned integer field",
                    peer,
                    field.name
                );
                dependents[p].push(i);
            }
            static_size = static_size
                .checked_add(field.ty.min_size())
                .ok_or_else(|| eyre::eyre!("schema static size overflows"))?;
            if field.ty.static_size().is_none() {
                fully_static = false;
            }
        }

        Ok(Self {
            fields,
            index,
            dependents,
            static_size,
            fully_static,
        })
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder { fields: Vec::new() }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, idx: usize) -> Option<&FieldDef> {
        self.fields.get(idx)
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Sum of all static field sizes. Variable fields contribute zero,
    /// except nested records, which contribute their own static size. This
    /// is the buffer size a freshly constructed record allocates.
    pub fn static_size(&self) -> usize {
        self.static_size
    }

    /// True when no field's size depends on per-instance state.
    pub fn is_fully_static(&self) -> bool {
        self.fully_static
    }

    pub(crate) fn dependents_of(&self, idx: usize) -> &[usize] {
        &self.dependents[idx]
    }
}

fn validate_type(ty: &FieldType, name: &str) -> Result<()> {
    match ty {
        FieldType::Int { size, .. } | FieldType::Bool { size, .. } => {
            ensure!(
                matches!(*size, 1 | 2 | 4 | 8),
                "field `{}`: integer width must be 1, 2, 4 or 8 bytes, got {}",
                name,
                size
            );
        }
        FieldType::Array { elem, .. } => {
            validate_type(elem, name)?;
            ensure!(
                elem.static_size().is_some(),
                "field `{}`: array element type must have a static size",
                name
            );
        }
        FieldType::Str { .. }
        | FieldType::Bytes { .. }
        | FieldType::Float32 { .. }
        | FieldType::Float64 { .. }
        | FieldType::Struct { .. }
        | FieldType::Variant => {}
    }
    Ok(())
}

/// Validates a descriptor assigned to a variant slot at runtime. Bound types
/// must be self-contained: peer-driven sizes would dangle once the slot's
/// schema-level type is replaced.
pub(crate) fn validate_bound_type(ty: &FieldType) -> Result<()> {
    validate_type(ty, "<bound>")?;
    match ty {
        FieldType::Variant => bail!("cannot bind a variant field to another variant"),
        FieldType::Str {
            len: SizeSpec::Peer(_),
            ..
        }
        | FieldType::Bytes {
            len: SizeSpec::Peer(_),
        }
        | FieldType::Array {
            shape: ShapeSpec::Peer(_),
            ..
        } => {
            bail!("cannot bind a peer-driven size to a variant field")
        }
        _ => Ok(()),
    }
}

/// Incremental `Schema` construction, one field at a time.
pub struct SchemaBuilder {
    fields: Vec<FieldDef>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDef::new(name, ty));
        self
    }

    pub fn finish(self) -> Result<Schema> {
        Schema::new(self.fields)
    }
}
