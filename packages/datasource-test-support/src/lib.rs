//! Shared helpers for the datasource test suites.

pub mod logging;
