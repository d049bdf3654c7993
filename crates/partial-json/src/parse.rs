use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::fix::fix_json;

/// How [`parse_partial_json`] arrived at its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseState {
    UndefinedInput,
    SuccessfulParse,
    RepairedParse,
    FailedParse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialJson {
    pub value: Option<Value>,
    pub state: ParseState,
}

impl PartialJson {
    fn new(value: Option<Value>, state: ParseState) -> Self {
        Self { value, state }
    }
}

/// Parse JSON that may have been cut off.
///
/// Complete documents parse directly. Otherwise the text goes through
/// [`fix_json`] and is parsed again; if that fails too the result carries no
/// value.
pub fn parse_partial_json(text: Option<&str>) -> PartialJson {
    let Some(text) = text else {
        return PartialJson::new(None, ParseState::UndefinedInput);
    };

    if let Ok(value) = serde_json::from_str(text) {
        return PartialJson::new(Some(value), ParseState::SuccessfulParse);
    }

    let repaired = fix_json(text);
    match serde_json::from_str(&repaired) {
        Ok(value) => {
            trace!(input_len = text.len(), repaired_len = repaired.len(), "json repaired");
            PartialJson::new(Some(value), ParseState::RepairedParse)
        }
        Err(err) => {
            trace!(error = %err, "json repair failed");
            PartialJson::new(None, ParseState::FailedParse)
        }
    }
}
