//! Printing selected values

use serde_json::Value;

use crate::error::{Result, SelectError};

/// Exactly one value, printed bare: strings unquoted, null as nothing
pub fn single(values: &[Value]) -> Result<String> {
    match values {
        [] => Err(SelectError::NoMatch.into()),
        [value] => Ok(match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => encode(other)?,
        }),
        many => Err(SelectError::MultipleMatches(many.len()).into()),
    }
}

/// One JSON value per line
pub fn lines(values: &[Value]) -> Result<String> {
    let mut out = String::new();
    for value in values {
        out.push_str(&encode(value)?);
        out.push('\n');
    }
    Ok(out)
}

/// All values as one JSON array
pub fn array(values: &[Value]) -> Result<String> {
    serde_json::to_string(values).map_err(|e| SelectError::Encode(e.to_string()).into())
}

fn encode(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| SelectError::Encode(e.to_string()).into())
}
