//! Value extraction flags

use clap::Args;

use crate::output::Extraction;

/// At most one of `--x1`, `--xm`, `--xj`, `--xh`
#[derive(Debug, Clone, Args, Default)]
#[group(multiple = false)]
pub struct ExtractArgs {
    /// Extract a single value from the response using a JSON:select expression
    #[arg(long, value_name = "SELECTOR")]
    pub x1: Option<String>,

    /// Extract values using JSON:select, print one value per line
    #[arg(long, value_name = "SELECTOR")]
    pub xm: Option<String>,

    /// Extract values using JSON:select, print them as one JSON array
    #[arg(long, value_name = "SELECTOR")]
    pub xj: Option<String>,

    /// Print the value of the named response header
    #[arg(long, value_name = "HEADER")]
    pub xh: Option<String>,
}

impl ExtractArgs {
    pub fn extraction(&self) -> Extraction {
        if let Some(expr) = &self.x1 {
            Extraction::Single(expr.clone())
        } else if let Some(expr) = &self.xm {
            Extraction::Lines(expr.clone())
        } else if let Some(expr) = &self.xj {
            Extraction::Array(expr.clone())
        } else if let Some(name) = &self.xh {
            Extraction::Header(name.clone())
        } else {
            Extraction::None
        }
    }
}
