//! Property tests: CSV write then read reproduces the table.

use flock_core::{read_csv, write_csv, Table, Value};
use proptest::prelude::*;

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        // Text that would not re-infer as a number or boolean.
        "[a-z ,\"\r\n]{0,12}x".prop_map(Value::Text),
    ]
}

fn table() -> impl Strategy<Value = Table> {
    (1usize..5).prop_flat_map(|width| {
        prop::collection::vec(prop::collection::vec(value(), width), 0..20).prop_map(
            move |rows| {
                let mut t = Table::new((0..width).map(|i| format!("col{i}")));
                for r in rows {
                    t.push_row(r).unwrap();
                }
                t
            },
        )
    })
}

proptest! {
    #[test]
    fn write_then_read_is_identity(t in table()) {
        let mut buf = Vec::new();
        write_csv(&t, &mut buf).unwrap();
        let back = read_csv(&mut buf.as_slice()).unwrap();
        prop_assert_eq!(back, t);
    }

    #[test]
    fn every_record_ends_with_crlf(t in table()) {
        let mut buf = Vec::new();
        write_csv(&t, &mut buf).unwrap();
        prop_assert!(buf.ends_with(b"\r\n"));
    }
}
