mod error;
mod grammar;

pub use error::ParseError;

use crate::types::value::Value;

/// Parse a text-format document into its top-level values.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not valid config text.
pub fn parse_document(input: &str) -> Result<Vec<Value>, ParseError> {
    use winnow::Parser;
    grammar::document
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}
