pub mod parser;
pub mod timestamp;

pub use parser::{parse_line, ParseRejection, ParsedEntry};
pub use timestamp::{normalize, NormalizeError};
