//! JSONSelect-style selectors over `serde_json::Value`
//!
//! Supported:
//! - type matchers `object`, `array`, `string`, `number`, `boolean`, `null`
//!   and `*`
//! - `.name` and `."quoted name"` for values stored under an object key
//! - `:root`, `:has(...)`, `:val(...)`, `:contains(...)`, `:first-child`,
//!   `:last-child`, `:only-child`, `:empty`, `:nth-child(an+b)`,
//!   `:nth-last-child(an+b)`
//! - descendant (whitespace), `>` child, `~` sibling and `,` grouping
//!
//! A `.name` written directly after a pseudo-class or another `.name` starts
//! a new step below the previous one, so `*:has(.rel:val("self")).href` reads
//! as `*:has(.rel:val("self")) > .href`.
//!
//! Matches come back in document order. A node matched by several groups is
//! returned once per group.

mod eval;
mod parser;

use serde_json::Value;

use crate::error::{Result, SelectError};

/// A parsed selector, possibly a `,` group
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    groups: Vec<Complex>,
}

/// Compound selectors joined by combinators, read left to right
#[derive(Debug, Clone, PartialEq)]
struct Complex {
    first: Compound,
    rest: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Sibling,
}

/// Everything that must hold for a single node
#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    kind: Option<Kind>,
    key: Option<String>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
enum Pseudo {
    Root,
    Has(Selector),
    Val(Literal),
    Contains(String),
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    NthChild(Nth),
    NthLastChild(Nth),
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    String(String),
    Number(f64),
}

/// `an+b` position formula, positions counted from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nth {
    a: i64,
    b: i64,
}

impl Nth {
    fn matches(&self, position: usize) -> bool {
        let position = position as i64;
        if self.a == 0 {
            return position == self.b;
        }
        // Out-of-range coefficients match nothing
        let Some(offset) = position.checked_sub(self.b) else {
            return false;
        };
        offset.checked_rem(self.a) == Some(0) && offset.checked_div(self.a).is_some_and(|n| n >= 0)
    }
}

impl Selector {
    pub fn parse(expression: &str) -> std::result::Result<Self, SelectError> {
        parser::parse(expression)
    }

    /// Every matching node of `document`, in document order
    pub fn select<'a>(&self, document: &'a Value) -> Vec<&'a Value> {
        eval::select(self, document)
    }
}

/// Parse `expression` and return clones of every value it selects
pub fn select(document: &Value, expression: &str) -> Result<Vec<Value>> {
    let selector = Selector::parse(expression)?;
    Ok(selector.select(document).into_iter().cloned().collect())
}
