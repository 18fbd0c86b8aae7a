//! Built-in steps that need nothing beyond the text itself.

pub mod license;
pub mod replace;
pub mod whitespace;

pub use license::{license_header, license_header_from_file};
pub use replace::{forbid_regex, replace, replace_regex};
pub use whitespace::{IndentStyle, end_with_newline, indent, trim_trailing_whitespace};
