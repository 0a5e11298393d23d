//! Infrastructure layer - datasource construction, listener bring-up, validation.

pub mod db;
