mod database;
mod table;

pub use database::Database;
pub use table::{Table, TableScan};
