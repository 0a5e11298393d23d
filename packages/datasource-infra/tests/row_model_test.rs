mod common;

use common::{Bind, FakeRow, FakeStatement, FakeValue};
use datasource_infra::model::{ColumnValue, DbColumn, DbRow, DbTable, SqlType};

#[test]
fn test_set_parameter_binds_each_supported_type_once() {
    let cases: Vec<(SqlType, ColumnValue, Bind)> = vec![
        (SqlType::BigInt, ColumnValue::BigInt(9_000_000_000), Bind::I64(3, 9_000_000_000)),
        (SqlType::Boolean, ColumnValue::Boolean(true), Bind::Bool(3, true)),
        (SqlType::Integer, ColumnValue::Integer(-7), Bind::I32(3, -7)),
        (SqlType::SmallInt, ColumnValue::SmallInt(12), Bind::I16(3, 12)),
        (
            SqlType::VarChar,
            ColumnValue::Text("label".to_string()),
            Bind::Text(3, "label".to_string()),
        ),
    ];

    for (sql_type, value, expected) in cases {
        let mut column = DbColumn::new("c", sql_type, 0);
        column.set_value(value);
        let mut statement = FakeStatement::default();

        column.set_parameter(&mut statement, 3).unwrap();

        assert_eq!(statement.binds, vec![expected], "{sql_type}");
    }
}

#[test]
fn test_unset_value_binds_typed_null_once() {
    for sql_type in [
        SqlType::BigInt,
        SqlType::Boolean,
        SqlType::Integer,
        SqlType::SmallInt,
        SqlType::VarChar,
        SqlType::Double,
        SqlType::Timestamp,
    ] {
        let column = DbColumn::new("c", sql_type, 0);
        let mut statement = FakeStatement::default();

        column.set_parameter(&mut statement, 1).unwrap();

        assert_eq!(statement.binds, vec![Bind::Null(1, sql_type)]);
    }
}

#[test]
fn test_columns_sort_by_ordinal_position() {
    let row = DbRow::new(vec![
        DbColumn::new("c2", SqlType::VarChar, 2),
        DbColumn::new("c0", SqlType::BigInt, 0),
        DbColumn::new("c1", SqlType::Integer, 1),
    ]);

    let ordinals: Vec<u32> = row.columns().iter().map(|c| c.ordinal_position()).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);

    let table = DbTable::new("t", "create table t (c0 bigint, c1 int, c2 varchar(8))", true, row);
    assert_eq!(table.row().column_names(), vec!["c0", "c1", "c2"]);
}

#[test]
fn test_get_value_reads_typed_values_and_nulls() {
    let source = FakeRow::default()
        .with("id", FakeValue::I64(42))
        .with("active", FakeValue::Bool(false))
        .with("label", FakeValue::Null);
    let mut row = DbRow::new(vec![
        DbColumn::new("id", SqlType::BigInt, 0),
        DbColumn::new("active", SqlType::Boolean, 1),
        DbColumn::new("label", SqlType::VarChar, 2),
    ]);
    row.column_mut("label").unwrap().set_value("stale");

    row.read_from(&source).unwrap();

    assert_eq!(row.column("id").unwrap().value(), Some(&ColumnValue::BigInt(42)));
    assert_eq!(
        row.column("active").unwrap().value(),
        Some(&ColumnValue::Boolean(false))
    );
    assert_eq!(row.column("label").unwrap().value(), None);
}

#[test]
fn test_get_value_leaves_unmarshalled_types_untouched() {
    let source = FakeRow::default().with("ratio", FakeValue::I64(1));
    let mut column = DbColumn::new("ratio", SqlType::Double, 0);
    column.set_value(5_i64);

    column.get_value(&source).unwrap();

    assert_eq!(column.value(), Some(&ColumnValue::BigInt(5)));
    assert_eq!(source.read_count(), 0);
}

#[test]
fn test_get_value_propagates_type_mismatch() {
    let source = FakeRow::default().with("n", FakeValue::Text("x".to_string()));
    let mut column = DbColumn::new("n", SqlType::Integer, 0);

    assert!(column.get_value(&source).is_err());
}

#[test]
fn test_bind_all_uses_consecutive_indexes() {
    let mut row = DbRow::new(vec![
        DbColumn::new("b", SqlType::VarChar, 1),
        DbColumn::new("a", SqlType::SmallInt, 0),
    ]);
    row.column_mut("a").unwrap().set_value(3_i16);
    let mut statement = FakeStatement::default();

    let next = row.bind_all(&mut statement, 2).unwrap();

    assert_eq!(next, 4);
    assert_eq!(
        statement.binds,
        vec![Bind::I16(2, 3), Bind::Null(3, SqlType::VarChar)]
    );
}
