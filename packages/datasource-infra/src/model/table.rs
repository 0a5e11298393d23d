use crate::infra::db::bridge::{BridgeError, ParameterSink, RowSource};
use crate::model::column::DbColumn;

/// Columns of one row, kept in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DbRow {
    columns: Vec<DbColumn>,
}

impl DbRow {
    pub fn new(mut columns: Vec<DbColumn>) -> Self {
        columns.sort_by_key(DbColumn::ordinal_position);
        Self { columns }
    }

    pub fn columns(&self) -> &[DbColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&DbColumn> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut DbColumn> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(DbColumn::name).collect()
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &DbColumn> {
        self.columns.iter().filter(|c| c.is_primary_key())
    }

    pub fn foreign_key_columns(&self) -> impl Iterator<Item = &DbColumn> {
        self.columns.iter().filter(|c| c.foreign_key_table().is_some())
    }

    /// Refresh every column from the current row of `row`.
    pub fn read_from(&mut self, row: &dyn RowSource) -> Result<(), BridgeError> {
        for column in &mut self.columns {
            column.get_value(row)?;
        }
        Ok(())
    }

    /// Bind every column in ordinal order, starting at `first_index`.
    /// Returns the next free index.
    pub fn bind_all(
        &self,
        statement: &mut dyn ParameterSink,
        first_index: usize,
    ) -> Result<usize, BridgeError> {
        let mut index = first_index;
        for column in &self.columns {
            column.set_parameter(statement, index)?;
            index += 1;
        }
        Ok(index)
    }
}

/// A table name, the statement that creates it and a template row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTable {
    name: String,
    create_query: String,
    repeated_rows_allowed: bool,
    row: DbRow,
}

impl DbTable {
    pub fn new(
        name: impl Into<String>,
        create_query: impl Into<String>,
        repeated_rows_allowed: bool,
        row: DbRow,
    ) -> Self {
        Self {
            name: name.into(),
            create_query: create_query.into(),
            repeated_rows_allowed,
            row,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_query(&self) -> &str {
        &self.create_query
    }

    /// Whether duplicate rows are tolerated. Deduplication is up to callers.
    pub fn repeated_rows_allowed(&self) -> bool {
        self.repeated_rows_allowed
    }

    pub fn row(&self) -> &DbRow {
        &self.row
    }

    pub fn row_mut(&mut self) -> &mut DbRow {
        &mut self.row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::column::SqlType;

    fn sample_row() -> DbRow {
        DbRow::new(vec![
            DbColumn::new("label", SqlType::VarChar, 3),
            DbColumn::new("id", SqlType::BigInt, 1).primary_key(),
            DbColumn::new("owner_id", SqlType::BigInt, 2).references("owners"),
        ])
    }

    #[test]
    fn test_columns_sorted_by_ordinal() {
        assert_eq!(sample_row().column_names(), vec!["id", "owner_id", "label"]);
    }

    #[test]
    fn test_key_columns() {
        let row = sample_row();
        let pk: Vec<_> = row.primary_key_columns().map(DbColumn::name).collect();
        let fk: Vec<_> = row.foreign_key_columns().map(DbColumn::name).collect();

        assert_eq!(pk, vec!["id"]);
        assert_eq!(fk, vec!["owner_id"]);
    }

    #[test]
    fn test_table_accessors() {
        let mut table = DbTable::new(
            "labels",
            "create table labels (id bigint primary key, owner_id bigint, label varchar(64))",
            false,
            sample_row(),
        );

        assert_eq!(table.name(), "labels");
        assert!(table.create_query().starts_with("create table labels"));
        assert!(!table.repeated_rows_allowed());

        table.row_mut().column_mut("label").unwrap().set_value("x");
        assert!(table.row().column("label").unwrap().value().is_some());
    }
}
