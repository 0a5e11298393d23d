//! Engine-independent metadata used to marshal rows into and out of
//! statements.

pub mod column;
pub mod credentials;
pub mod table;

pub use column::{ColumnValue, DbColumn, SqlType};
pub use credentials::DbCredentials;
pub use table::{DbRow, DbTable};
