//! Output formatting for CLI results.

mod json;
mod table;

pub use json::format_json;
pub use table::format_table;
