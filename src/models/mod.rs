pub mod filesystem;
pub mod metric;
pub mod unit;
