//! Export rendering. Turns export rows into spreadsheet files.

pub mod csv_sheet;

pub use csv_sheet::{export_filename, rows_to_csv};
