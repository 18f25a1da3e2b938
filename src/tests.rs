//! Tests for the layout engine

use std::sync::Arc;

use super::*;

fn err_text<T: std::fmt::Debug>(result: eyre::Result<T>) -> String {
    result.unwrap_err().to_string()
}

#[test]
fn schema_tracks_static_and_variable_fields() {
    let schema = Schema::builder()
        .field("id", FieldType::uint(4))
        .field("name", FieldType::str_dynamic())
        .field("age", FieldType::int(2))
        .field("blob", FieldType::bytes_dynamic())
        .finish()
        .unwrap();

    assert_eq!(schema.field_count(), 4);
    assert_eq!(schema.static_size(), 6);
    assert!(!schema.is_fully_static());
    assert_eq!(schema.index_of("age"), Some(2));
    assert_eq!(schema.index_of("missing"), None);
}

#[test]
fn schema_rejects_duplicate_field_names() {
    let result = Schema::builder()
        .field("a", FieldType::uint(4))
        .field("a", FieldType::uint(2))
        .finish();
    assert!(err_text(result).contains("duplicate field name"));
}

#[test]
fn schema_rejects_bad_integer_widths() {
    let result = Schema::new(vec![FieldDef::new("a", FieldType::uint(3))]);
    assert!(err_text(result).contains("width must be 1, 2, 4 or 8"));
}

#[test]
fn schema_rejects_unknown_peer() {
    let result = Schema::builder()
        .field("data", FieldType::bytes_peer("len"))
        .finish();
    assert!(err_text(result).contains("unknown field `len`"));
}

#[test]
fn schema_rejects_peer_declared_after_dependent() {
    let result = Schema::builder()
        .field("data", FieldType::bytes_peer("len"))
        .field("len", FieldType::uint(2))
        .finish();
    assert!(err_text(result).contains("must be declared before"));
}

#[test]
fn schema_rejects_signed_peer() {
    let result = Schema::builder()
        .field("len", FieldType::int(2))
        .field("data", FieldType::bytes_peer("len"))
        .finish();
    assert!(err_text(result).contains("unsigned integer"));
}

#[test]
fn schema_rejects_variable_array_elements() {
    let result = Schema::builder()
        .field("rows", FieldType::array_dynamic(FieldType::str_dynamic()))
        .finish();
    assert!(err_text(result).contains("static size"));
}

#[test]
fn field_type_static_sizes() {
    assert_eq!(FieldType::uint(4).static_size(), Some(4));
    assert_eq!(FieldType::int(8).static_size(), Some(8));
    assert_eq!(FieldType::boolean(1).static_size(), Some(1));
    assert_eq!(FieldType::float32().static_size(), Some(4));
    assert_eq!(FieldType::float64().static_size(), Some(8));
    assert_eq!(FieldType::str_fixed(5).static_size(), Some(5));
    assert_eq!(FieldType::str_dynamic().static_size(), None);
    assert_eq!(FieldType::bytes_peer("n").static_size(), None);
    assert_eq!(
        FieldType::array(FieldType::int(2), &[2, 3]).static_size(),
        Some(12)
    );
    assert_eq!(
        FieldType::array_dynamic(FieldType::int(2)).static_size(),
        None
    );
    assert_eq!(FieldType::variant().static_size(), None);

    let fixed = Arc::new(
        Schema::builder()
            .field("x", FieldType::uint(2))
            .finish()
            .unwrap(),
    );
    assert_eq!(FieldType::nested(fixed).static_size(), Some(2));

    let open = Arc::new(
        Schema::builder()
            .field("x", FieldType::uint(2))
            .field("s", FieldType::str_dynamic())
            .finish()
            .unwrap(),
    );
    let nested = FieldType::nested(open);
    assert_eq!(nested.static_size(), None);
    assert_eq!(nested.min_size(), 2);
}

#[test]
fn new_record_allocates_static_size_zero_filled() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(4))
        .field("s", FieldType::str_dynamic())
        .field("b", FieldType::int(2))
        .finish()
        .unwrap();

    let record = Record::new(&schema);
    assert_eq!(record.raw(), &[0u8; 6]);
}

#[test]
fn scalar_round_trip_both_endians() {
    let schema = Schema::builder()
        .field("a", FieldType::int(4))
        .field("b", FieldType::uint(8))
        .field("c", FieldType::uint(2).with_endian(Endian::Big))
        .field("d", FieldType::float64())
        .field("e", FieldType::boolean(1))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("a", -5i32).unwrap();
    record.set("b", u64::MAX).unwrap();
    record.set("c", 0x1234u16).unwrap();
    record.set("d", 2.5f64).unwrap();
    record.set("e", true).unwrap();

    assert_eq!(record.get("a").unwrap(), Value::Int(-5));
    assert_eq!(record.get("b").unwrap(), Value::UInt(u64::MAX));
    assert_eq!(record.get("c").unwrap(), Value::UInt(0x1234));
    assert_eq!(record.get("d").unwrap(), Value::Float(2.5));
    assert_eq!(record.get("e").unwrap(), Value::Bool(true));

    // Big-endian field keeps network byte order on the wire.
    assert_eq!(&record.raw()[12..14], &[0x12u8, 0x34]);
}

#[test]
fn integer_encode_rejects_out_of_range_values() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(2))
        .finish()
        .unwrap();
    let mut record = Record::new(&schema);
    assert!(err_text(record.set("a", 0x1_0000u32)).contains("out of range"));
}

#[test]
fn fixed_string_requires_exact_length() {
    let schema = Schema::builder()
        .field("tag", FieldType::str_fixed(4))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("tag", "abcd").unwrap();
    assert_eq!(record.get("tag").unwrap(), Value::Str("abcd".into()));

    assert!(err_text(record.set("tag", "abc")).contains("size mismatch"));
    assert_eq!(record.get("tag").unwrap(), Value::Str("abcd".into()));
}

#[test]
fn ascii_encoding_rejects_non_ascii_text() {
    let schema = Schema::builder()
        .field("tag", FieldType::str_fixed(3).with_encoding(StrEncoding::Ascii))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("tag", "abc").unwrap();
    assert!(err_text(record.set("tag", "a\u{e9}")).contains("non-ASCII"));
}

#[test]
fn get_does_not_mutate_the_buffer() {
    let schema = Schema::builder()
        .field("n", FieldType::uint(2))
        .field("data", FieldType::bytes_peer("n"))
        .finish()
        .unwrap();

    let mut record = Record::from_bytes(&schema, vec![2, 0, 0xAA, 0xBB]);
    let before = record.raw().to_vec();
    record.get("data").unwrap();
    record.get("n").unwrap();
    assert_eq!(record.raw(), &before[..]);
}

#[test]
fn offsets_stay_contiguous_across_resizes() {
    let schema = Schema::builder()
        .field("a", FieldType::str_dynamic())
        .field("b", FieldType::uint(4))
        .field("c", FieldType::bytes_dynamic())
        .field("d", FieldType::int(2))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    for (name, len) in [("a", 5), ("c", 3), ("a", 2), ("c", 9)] {
        record.resize(name, len, true).unwrap();
        record.size().unwrap();
        for i in 1..schema.field_count() {
            let (prev_start, prev_size, _) = record.probe(i - 1);
            let (start, _, _) = record.probe(i);
            assert_eq!(start, prev_start + prev_size);
        }
    }
}

#[test]
fn resolve_is_idempotent() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(4))
        .field("b", FieldType::str_dynamic())
        .field("c", FieldType::uint(2))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.resize("b", 3, true).unwrap();
    record.get("c").unwrap();
    let first: Vec<_> = (0..3).map(|i| record.probe(i)).collect();
    record.get("c").unwrap();
    let second: Vec<_> = (0..3).map(|i| record.probe(i)).collect();
    assert_eq!(first, second);
}

#[test]
fn resize_invalidates_only_following_fields() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(4))
        .field("b", FieldType::str_dynamic())
        .field("c", FieldType::uint(4))
        .field("d", FieldType::uint(4))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.size().unwrap();
    let a_before = record.probe(0);

    record.resize("b", 3, true).unwrap();

    assert_eq!(record.probe(0), a_before);
    let (_, b_size, b_valid) = record.probe(1);
    assert!(b_valid);
    assert_eq!(b_size, 3);
    assert!(!record.probe(2).2);
    assert!(!record.probe(3).2);
}

#[test]
fn build_mode_produces_exact_bytes() {
    let schema = Schema::builder()
        .field("magic", FieldType::str_fixed(5))
        .field("length", FieldType::uint(4))
        .field("array", FieldType::array_peer(FieldType::int(4), "length"))
        .finish()
        .unwrap();

    let mut record = Record::with_values(
        &schema,
        [
            ("magic", Value::from("bytes")),
            ("length", Value::from(3u32)),
            ("array", Value::from([1i32, 2, 3])),
        ],
    )
    .unwrap();

    let expected = b"bytes\x03\x00\x00\x00\x01\x00\x00\x00\x02\x00\x00\x00\x03\x00\x00\x00";
    assert_eq!(record.bytes().unwrap(), expected);
}

#[test]
fn variable_string_resize_shifts_following_field_intact() {
    let schema = Schema::builder()
        .field("s", FieldType::str_dynamic())
        .field("n", FieldType::uint(4))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("n", 0xDEAD_BEEFu32).unwrap();
    assert_eq!(record.probe(1).0, 0);

    record.resize("s", 7, true).unwrap();
    assert_eq!(record.get("n").unwrap(), Value::UInt(0xDEAD_BEEF));
    assert_eq!(record.probe(1).0, 7);
    assert_eq!(record.get("s").unwrap(), Value::Str("\0".repeat(7)));
}

#[test]
fn variant_bind_shifts_sibling_by_bound_size() {
    let schema = Schema::builder()
        .field("v", FieldType::variant())
        .field("sib", FieldType::uint(2))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("sib", 0x4142u16).unwrap();
    assert_eq!(record.probe(1).0, 0);
    assert_eq!(record.get("v").unwrap(), Value::Null);

    record.bind("v", FieldType::int(4), true).unwrap();
    record.set("v", 7i32).unwrap();

    assert_eq!(record.get("v").unwrap(), Value::Int(7));
    assert_eq!(record.probe(1).0, 4);
    assert_eq!(record.get("sib").unwrap(), Value::UInt(0x4142));
}

#[test]
fn variant_rebind_keeps_overlapping_prefix_bytes() {
    let schema = Schema::builder()
        .field("v", FieldType::variant())
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.bind("v", FieldType::bytes_dynamic(), true).unwrap();
    record.set("v", b"aabbccdd".to_vec()).unwrap();
    assert_eq!(record.size().unwrap(), 8);

    record.bind("v", FieldType::str_fixed(8), true).unwrap();
    assert_eq!(record.get("v").unwrap(), Value::Str("aabbccdd".into()));

    record.bind("v", FieldType::uint(2), true).unwrap();
    assert_eq!(record.get("v").unwrap(), Value::UInt(0x6161));
    assert_eq!(record.size().unwrap(), 2);
}

#[test]
fn round_trip_build_then_parse() {
    let schema = Schema::builder()
        .field("tag", FieldType::str_fixed(3))
        .field("count", FieldType::uint(2))
        .field("values", FieldType::array_peer(FieldType::int(2), "count"))
        .field("score", FieldType::float64())
        .finish()
        .unwrap();

    let built = Record::with_values(
        &schema,
        [
            ("tag", Value::from("hdr")),
            ("count", Value::from(4u16)),
            ("values", Value::from([-1i16, 2, -3, 4])),
            ("score", Value::from(0.25f64)),
        ],
    )
    .unwrap();
    let wire = built.into_bytes().unwrap();

    let mut parsed = Record::from_bytes(&schema, wire);
    assert_eq!(parsed.get("tag").unwrap(), Value::Str("hdr".into()));
    assert_eq!(parsed.get("count").unwrap(), Value::UInt(4));
    assert_eq!(parsed.get("values").unwrap(), Value::from([-1i16, 2, -3, 4]));
    assert_eq!(parsed.get("score").unwrap(), Value::Float(0.25));
}

#[test]
fn parse_mode_resize_without_bytes_reads_in_place_data() {
    let schema = Schema::builder()
        .field("head", FieldType::uint(1))
        .field("tail", FieldType::bytes_dynamic())
        .finish()
        .unwrap();

    let mut record = Record::from_bytes(&schema, vec![9, 0x10, 0x20, 0x30]);
    record.resize("tail", 3, false).unwrap();
    assert_eq!(
        record.get("tail").unwrap(),
        Value::Bytes(vec![0x10, 0x20, 0x30])
    );
    assert_eq!(record.size().unwrap(), 4);
}

#[test]
fn writing_a_peer_resizes_its_dependents() {
    let schema = Schema::builder()
        .field("len", FieldType::uint(2))
        .field("data", FieldType::bytes_peer("len"))
        .field("after", FieldType::uint(2))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("after", 7u16).unwrap();

    record.set("len", 4u16).unwrap();
    assert_eq!(record.size().unwrap(), 8);
    assert_eq!(record.get("data").unwrap(), Value::Bytes(vec![0; 4]));

    record.set("data", vec![1u8, 2, 3, 4]).unwrap();
    record.set("len", 2u16).unwrap();
    assert_eq!(record.get("data").unwrap(), Value::Bytes(vec![1, 2]));
    assert_eq!(record.get("after").unwrap(), Value::UInt(7));
}

#[test]
fn peer_driven_field_rejects_wrong_length_writes() {
    let schema = Schema::builder()
        .field("len", FieldType::uint(2))
        .field("data", FieldType::bytes_peer("len"))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("len", 2u16).unwrap();
    assert!(err_text(record.set("data", vec![1u8, 2, 3])).contains("size mismatch"));
    assert!(err_text(record.resize("data", 3, true)).contains("driven by peer"));
}

#[test]
fn dynamic_string_set_resizes_implicitly() {
    let schema = Schema::builder()
        .field("s", FieldType::str_dynamic())
        .field("n", FieldType::uint(1))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("n", 9u8).unwrap();
    record.set("s", "hello").unwrap();
    assert_eq!(record.size().unwrap(), 6);
    assert_eq!(record.get("n").unwrap(), Value::UInt(9));

    record.set("s", "hi").unwrap();
    assert_eq!(record.size().unwrap(), 3);
    assert_eq!(record.get("s").unwrap(), Value::Str("hi".into()));
    assert_eq!(record.get("n").unwrap(), Value::UInt(9));
}

#[test]
fn multidimensional_array_round_trip() {
    let schema = Schema::builder()
        .field("m", FieldType::array(FieldType::int(2), &[2, 3]))
        .finish()
        .unwrap();

    let rows = Value::Array(vec![Value::from([1i16, 2, 3]), Value::from([4i16, 5, 6])]);
    let mut record = Record::new(&schema);
    record.set("m", rows.clone()).unwrap();
    assert_eq!(record.get("m").unwrap(), rows);
    assert_eq!(
        record.raw(),
        &[1u8, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6, 0]
    );
}

#[test]
fn dynamic_array_reshape_reinterprets_in_place() {
    let schema = Schema::builder()
        .field("d", FieldType::array_dynamic(FieldType::uint(1)))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    let grid = Value::Array(vec![Value::from([1u8, 2]), Value::from([3u8, 4])]);
    record.set("d", grid.clone()).unwrap();
    assert_eq!(record.get("d").unwrap(), grid);

    record.reshape("d", &[4], true).unwrap();
    assert_eq!(record.get("d").unwrap(), Value::from([1u8, 2, 3, 4]));
    assert_eq!(record.size().unwrap(), 4);
}

#[test]
fn array_of_records_round_trip() {
    let point = Arc::new(
        Schema::builder()
            .field("x", FieldType::uint(1))
            .field("y", FieldType::int(2))
            .finish()
            .unwrap(),
    );
    let schema = Schema::builder()
        .field("pts", FieldType::array_dynamic(FieldType::nested(point)))
        .finish()
        .unwrap();

    let pts = Value::Array(vec![
        Value::Record(vec![Value::UInt(1), Value::Int(-2)]),
        Value::Record(vec![Value::UInt(3), Value::Int(4)]),
    ]);
    let mut record = Record::new(&schema);
    record.set("pts", pts.clone()).unwrap();
    assert_eq!(record.get("pts").unwrap(), pts);
    assert_eq!(record.size().unwrap(), 6);
}

#[test]
fn sub_record_mutations_are_visible_in_the_parent() {
    let inner = Arc::new(
        Schema::builder()
            .field("x", FieldType::uint(2))
            .field("s", FieldType::str_dynamic())
            .finish()
            .unwrap(),
    );
    let schema = Schema::builder()
        .field("head", FieldType::uint(1))
        .field("inner", FieldType::nested(inner))
        .field("tail", FieldType::uint(1))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("head", 1u8).unwrap();
    record.set("tail", 2u8).unwrap();

    record.sub("inner").unwrap().set("x", 0x0605u16).unwrap();
    assert_eq!(&record.raw()[1..3], &[0x05u8, 0x06]);
    assert_eq!(
        record.get("inner").unwrap(),
        Value::Record(vec![Value::UInt(0x0605), Value::Str(String::new())])
    );
}

#[test]
fn sub_record_resize_propagates_to_parent_offsets() {
    let inner = Arc::new(
        Schema::builder()
            .field("x", FieldType::uint(2))
            .field("s", FieldType::str_dynamic())
            .finish()
            .unwrap(),
    );
    let schema = Schema::builder()
        .field("inner", FieldType::nested(inner))
        .field("tail", FieldType::uint(2))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("tail", 0xBEEFu16).unwrap();
    assert_eq!(record.probe(1).0, 2);

    record.sub("inner").unwrap().set("s", "abc").unwrap();

    let (inner_start, inner_size, inner_valid) = record.probe(0);
    assert!(inner_valid);
    assert_eq!((inner_start, inner_size), (0, 5));
    assert!(!record.probe(1).2);
    assert_eq!(record.get("tail").unwrap(), Value::UInt(0xBEEF));
    assert_eq!(record.probe(1).0, 5);
    assert_eq!(record.size().unwrap(), 7);
}

#[test]
fn nested_sub_record_paths_reach_grandchildren() {
    let leaf = Arc::new(
        Schema::builder()
            .field("v", FieldType::uint(1))
            .finish()
            .unwrap(),
    );
    let mid = Arc::new(
        Schema::builder()
            .field("pad", FieldType::uint(1))
            .field("leaf", FieldType::nested(leaf))
            .finish()
            .unwrap(),
    );
    let schema = Schema::builder()
        .field("mid", FieldType::nested(mid))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    let mut mid_view = record.sub("mid").unwrap();
    let mut leaf_view = mid_view.sub("leaf").unwrap();
    leaf_view.set("v", 0x7Fu8).unwrap();

    assert_eq!(record.raw(), &[0x00u8, 0x7F]);
}

#[test]
fn variant_bound_to_record_supports_sub_access() {
    let inner = Arc::new(
        Schema::builder()
            .field("x", FieldType::uint(2))
            .finish()
            .unwrap(),
    );
    let schema = Schema::builder()
        .field("v", FieldType::variant())
        .field("tail", FieldType::uint(1))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("tail", 5u8).unwrap();
    record.bind("v", FieldType::nested(inner), true).unwrap();
    record.sub("v").unwrap().set("x", 0x0102u16).unwrap();

    assert_eq!(
        record.get("v").unwrap(),
        Value::Record(vec![Value::UInt(0x0102)])
    );
    assert_eq!(record.get("tail").unwrap(), Value::UInt(5));
    assert_eq!(record.raw(), &[0x02u8, 0x01, 0x05]);
}

#[test]
fn hidden_field_occupies_no_bytes_and_rejects_access() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(2))
        .field("b", FieldType::uint(2))
        .field("c", FieldType::uint(2))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set("a", 1u16).unwrap();
    record.set("b", 2u16).unwrap();
    record.set("c", 3u16).unwrap();

    record.set_visible("b", false, true).unwrap();
    assert_eq!(record.size().unwrap(), 4);
    assert_eq!(record.get("c").unwrap(), Value::UInt(3));
    assert!(err_text(record.get("b")).contains("hidden"));
    assert!(err_text(record.set("b", 9u16)).contains("hidden"));

    record.set_visible("b", true, true).unwrap();
    assert_eq!(record.size().unwrap(), 6);
    assert_eq!(record.get("b").unwrap(), Value::UInt(0));
    assert_eq!(record.get("c").unwrap(), Value::UInt(3));
}

#[test]
fn hidden_peer_makes_dependent_size_unresolved() {
    let schema = Schema::builder()
        .field("len", FieldType::uint(1))
        .field("data", FieldType::bytes_peer("len"))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.set_visible("len", false, true).unwrap();
    assert!(err_text(record.get("data")).contains("unresolved"));
}

#[test]
fn truncated_buffer_reports_out_of_bounds() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(4))
        .field("b", FieldType::uint(4))
        .finish()
        .unwrap();

    let mut record = Record::from_bytes(&schema, vec![1, 2, 3]);
    assert!(err_text(record.get("a")).contains("out of bounds"));
}

#[test]
fn unknown_field_name_is_rejected() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(4))
        .finish()
        .unwrap();
    let mut record = Record::new(&schema);
    assert!(err_text(record.get("nope")).contains("unknown field"));
    assert!(err_text(record.set("nope", 1u8)).contains("unknown field"));
}

#[test]
fn unbound_variant_reads_null_and_rejects_writes() {
    let schema = Schema::builder()
        .field("v", FieldType::variant())
        .finish()
        .unwrap();
    let mut record = Record::new(&schema);
    assert_eq!(record.get("v").unwrap(), Value::Null);
    assert!(err_text(record.set("v", 1u8)).contains("unresolved"));
}

#[test]
fn fixed_fields_cannot_be_resized() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(4))
        .field("s", FieldType::str_fixed(2))
        .finish()
        .unwrap();
    let mut record = Record::new(&schema);
    assert!(err_text(record.resize("a", 8, true)).contains("cannot be resized"));
    assert!(err_text(record.resize("s", 8, true)).contains("cannot be resized"));
}

#[test]
fn failed_set_leaves_offsets_in_their_prior_state() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(2))
        .field("s", FieldType::str_fixed(2))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.size().unwrap();
    let before: Vec<_> = (0..2).map(|i| record.probe(i)).collect();
    let raw_before = record.raw().to_vec();

    assert!(record.set("s", "way too long").is_err());

    let after: Vec<_> = (0..2).map(|i| record.probe(i)).collect();
    assert_eq!(before, after);
    assert_eq!(record.raw(), &raw_before[..]);
}

#[test]
fn bytes_and_into_bytes_return_the_logical_range() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(2))
        .finish()
        .unwrap();

    let mut record = Record::from_bytes(&schema, vec![1, 0, 9, 9, 9]);
    assert_eq!(record.bytes().unwrap(), &[1u8, 0]);
    assert_eq!(record.raw().len(), 5);
    assert_eq!(record.into_bytes().unwrap(), vec![1, 0]);
}

#[test]
fn from_bytes_with_overrides_applies_on_top() {
    let schema = Schema::builder()
        .field("a", FieldType::uint(2))
        .field("b", FieldType::uint(2))
        .finish()
        .unwrap();

    let mut record =
        Record::from_bytes_with(&schema, vec![1, 0, 2, 0], [("b", Value::from(9u16))]).unwrap();
    assert_eq!(record.get("a").unwrap(), Value::UInt(1));
    assert_eq!(record.get("b").unwrap(), Value::UInt(9));
}

#[test]
fn sub_record_bytes_exposes_its_span() {
    let inner = Arc::new(
        Schema::builder()
            .field("x", FieldType::uint(2))
            .finish()
            .unwrap(),
    );
    let schema = Schema::builder()
        .field("head", FieldType::uint(1))
        .field("inner", FieldType::nested(inner))
        .finish()
        .unwrap();

    let mut record = Record::new(&schema);
    record.sub("inner").unwrap().set("x", 0x0304u16).unwrap();
    let mut view = record.sub("inner").unwrap();
    assert_eq!(view.size().unwrap(), 2);
    assert_eq!(view.bytes().unwrap(), &[0x04, 0x03]);
}

#[test]
fn encode_one_packs_single_fields() {
    assert_eq!(
        encode_one(&FieldType::int(4), &Value::Int(0xDEAD)).unwrap(),
        0xDEADi32.to_le_bytes().to_vec()
    );
    assert_eq!(
        encode_one(&FieldType::str_fixed(6), &Value::from("string")).unwrap(),
        b"string".to_vec()
    );
    assert_eq!(
        encode_one(&FieldType::float64(), &Value::Float(4.5)).unwrap(),
        4.5f64.to_le_bytes().to_vec()
    );
    assert_eq!(
        encode_one(&FieldType::bytes_dynamic(), &Value::Bytes(vec![1, 2])).unwrap(),
        vec![1, 2]
    );
}

#[test]
fn decode_one_unpacks_single_fields() {
    assert_eq!(
        decode_one(&FieldType::int(4), &10i32.to_le_bytes()).unwrap(),
        Value::Int(10)
    );
    assert_eq!(
        decode_one(&FieldType::float64(), &3.2f64.to_le_bytes()).unwrap(),
        Value::Float(3.2)
    );
    assert_eq!(
        decode_one(&FieldType::array_dynamic(FieldType::uint(2)), &[1, 0, 2, 0]).unwrap(),
        Value::from([1u16, 2])
    );
    assert!(err_text(decode_one(&FieldType::int(4), &[1, 2])).contains("expected 4 bytes"));
}

#[test]
fn bool_fields_read_any_non_zero_as_true() {
    let schema = Schema::builder()
        .field("flag", FieldType::boolean(4))
        .finish()
        .unwrap();

    let mut record = Record::from_bytes(&schema, vec![2, 0, 0, 0]);
    assert_eq!(record.get("flag").unwrap(), Value::Bool(true));

    record.set("flag", false).unwrap();
    assert_eq!(record.raw(), &[0u8, 0, 0, 0]);
}
