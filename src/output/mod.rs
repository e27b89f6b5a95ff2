//! Output formatting for API responses

use crate::client::Response;
use crate::error::{Result, SelectError};
use crate::select;

pub mod extract;

/// What to print from a response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Extraction {
    /// The whole JSON body
    #[default]
    None,
    /// `--x1`: exactly one selected value
    Single(String),
    /// `--xm`: selected values one per line
    Lines(String),
    /// `--xj`: selected values as a JSON array
    Array(String),
    /// `--xh`: a response header
    Header(String),
}

/// Render the stdout text for `response`. Nothing is appended after the
/// rendered value except the per-line newlines of `Lines`.
pub fn render(response: &Response, extraction: &Extraction, pretty: bool) -> Result<String> {
    let expression = match extraction {
        Extraction::None => return render_document(response, pretty),
        Extraction::Header(name) => return Ok(response.header(name).unwrap_or_default().to_string()),
        Extraction::Single(expr) | Extraction::Lines(expr) | Extraction::Array(expr) => expr,
    };

    let document = response.data.as_ref().ok_or(SelectError::NoDocument)?;
    let values = select::select(document, expression)?;

    match extraction {
        Extraction::Single(_) => extract::single(&values),
        Extraction::Lines(_) => extract::lines(&values),
        _ => extract::array(&values),
    }
}

fn render_document(response: &Response, pretty: bool) -> Result<String> {
    let Some(data) = &response.data else {
        return Ok(String::new());
    };
    let text = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    Ok(text)
}
