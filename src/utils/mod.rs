//! Utilities (data file loading).

pub mod table;

pub use table::{read_table, Table};
