// Adapters layer: concrete stores and the file formats the bank reads and writes.

pub mod csv_feed;
pub mod memory;
pub mod render;
pub mod sqlite;
