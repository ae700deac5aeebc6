//! Core library for tiffin: the expense models, the SQLite store, reporting
//! aggregation, and CSV import/export. The `tiffin` binary is a thin layer
//! over this crate.

pub mod csv_io;
pub mod db;
pub mod models;
pub mod report;
