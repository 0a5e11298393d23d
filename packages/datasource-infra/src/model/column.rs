use std::fmt;

use tracing::trace;

use crate::infra::db::bridge::{BridgeError, ParameterSink, RowSource};

/// Declared SQL type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    BigInt,
    Boolean,
    Integer,
    SmallInt,
    VarChar,
    /// Declarable, but values are not marshalled.
    Double,
    /// Declarable, but values are not marshalled.
    Timestamp,
}

impl SqlType {
    /// Whether values of this type can be read from a row.
    pub fn is_marshalled(self) -> bool {
        !matches!(self, SqlType::Double | SqlType::Timestamp)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::BigInt => "BIGINT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::SmallInt => "SMALLINT",
            SqlType::VarChar => "VARCHAR",
            SqlType::Double => "DOUBLE",
            SqlType::Timestamp => "TIMESTAMP",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    BigInt(i64),
    Boolean(bool),
    Integer(i32),
    SmallInt(i16),
    Text(String),
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::BigInt(v)
    }
}

impl From<bool> for ColumnValue {
    fn from(v: bool) -> Self {
        ColumnValue::Boolean(v)
    }
}

impl From<i32> for ColumnValue {
    fn from(v: i32) -> Self {
        ColumnValue::Integer(v)
    }
}

impl From<i16> for ColumnValue {
    fn from(v: i16) -> Self {
        ColumnValue::SmallInt(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

/// One column of a table, with the value most recently read or assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbColumn {
    name: String,
    sql_type: SqlType,
    ordinal_position: u32,
    primary_key: bool,
    foreign_key_table: Option<String>,
    value: Option<ColumnValue>,
}

impl DbColumn {
    pub fn new(name: impl Into<String>, sql_type: SqlType, ordinal_position: u32) -> Self {
        Self {
            name: name.into(),
            sql_type,
            ordinal_position,
            primary_key: false,
            foreign_key_table: None,
            value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.foreign_key_table = Some(table.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn ordinal_position(&self) -> u32 {
        self.ordinal_position
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn foreign_key_table(&self) -> Option<&str> {
        self.foreign_key_table.as_deref()
    }

    pub fn value(&self) -> Option<&ColumnValue> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: impl Into<ColumnValue>) {
        self.value = Some(value.into());
    }

    pub fn clear_value(&mut self) {
        self.value = None;
    }

    /// Read this column from the current row using the getter for its
    /// declared type. A NULL clears the cached value; types that are not
    /// marshalled leave it untouched.
    pub fn get_value(&mut self, row: &dyn RowSource) -> Result<(), BridgeError> {
        let column = self.name.as_str();
        let value = match self.sql_type {
            SqlType::BigInt => row.get_i64(column)?.map(ColumnValue::BigInt),
            SqlType::Boolean => row.get_bool(column)?.map(ColumnValue::Boolean),
            SqlType::Integer => row.get_i32(column)?.map(ColumnValue::Integer),
            SqlType::SmallInt => row.get_i16(column)?.map(ColumnValue::SmallInt),
            SqlType::VarChar => row.get_text(column)?.map(ColumnValue::Text),
            SqlType::Double | SqlType::Timestamp => {
                trace!(column = column, sql_type = %self.sql_type, "column read skipped");
                return Ok(());
            }
        };
        self.value = value;
        Ok(())
    }

    /// Bind the cached value at `index`, or a NULL of the declared type when
    /// there is none.
    pub fn set_parameter(
        &self,
        statement: &mut dyn ParameterSink,
        index: usize,
    ) -> Result<(), BridgeError> {
        match &self.value {
            None => statement.set_null(index, self.sql_type),
            Some(ColumnValue::BigInt(v)) => statement.set_i64(index, *v),
            Some(ColumnValue::Boolean(v)) => statement.set_bool(index, *v),
            Some(ColumnValue::Integer(v)) => statement.set_i32(index, *v),
            Some(ColumnValue::SmallInt(v)) => statement.set_i16(index, *v),
            Some(ColumnValue::Text(v)) => statement.set_text(index, v),
        }
    }
}
