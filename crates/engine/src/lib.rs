pub mod cell;
pub mod refs;
pub mod sheet;
pub mod workbook;
