//! Man-hour report grammar: trigger filter, line parser, entry extractor.

pub mod extractor;
pub mod filter;
pub mod line;

pub use extractor::extract;
pub use filter::{is_triggered, select_triggered};
pub use line::parse_key_value_line;
