//! Partial JSON - repair and parse JSON text cut off mid-stream.
//!
//! [`fix_json`] closes whatever is still open in a truncated document so it
//! parses; [`parse_partial_json`] tries the text as-is first and falls back
//! to the repaired form, reporting which path succeeded.

mod fix;
mod parse;

pub use fix::fix_json;
pub use parse::{ParseState, PartialJson, parse_partial_json};
