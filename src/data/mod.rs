//! Data structures for count tables and target variables.

mod count_table;
mod target;

pub use count_table::{CountTable, TableRecord};
pub use target::{align, Target};
