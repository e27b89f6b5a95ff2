//! Selector parser

use super::{Combinator, Complex, Compound, Kind, Literal, Nth, Pseudo, Selector};
use crate::error::SelectError;

type Result<T> = std::result::Result<T, SelectError>;

pub(super) fn parse(expression: &str) -> Result<Selector> {
    let mut parser = Parser {
        input: expression,
        pos: 0,
    };
    let selector = parser.selector_list(false)?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok(selector),
        Some(c) => Err(parser.error(format!("unexpected '{}'", c))),
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", expected)))
        }
    }

    /// Returns whether any whitespace was skipped
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos > start
    }

    fn error(&self, message: impl Into<String>) -> SelectError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> SelectError {
        SelectError::Parse {
            expression: self.input.to_string(),
            position,
            message: message.into(),
        }
    }

    fn selector_list(&mut self, nested: bool) -> Result<Selector> {
        let mut groups = Vec::new();
        loop {
            self.skip_ws();
            let complex = if nested {
                self.relative_complex()?
            } else {
                self.complex(false)?
            };
            groups.push(complex);
            self.skip_ws();
            if !self.eat(',') {
                break;
            }
        }
        Ok(Selector { groups })
    }

    /// A selector inside `:has()`, anchored below the node being tested
    fn relative_complex(&mut self) -> Result<Complex> {
        let combinator = if self.eat('>') {
            self.skip_ws();
            Combinator::Child
        } else {
            Combinator::Descendant
        };
        let inner = self.complex(true)?;

        let mut rest = vec![(combinator, inner.first)];
        rest.extend(inner.rest);
        Ok(Complex {
            first: Compound {
                pseudos: vec![Pseudo::Root],
                ..Compound::default()
            },
            rest,
        })
    }

    fn complex(&mut self, nested: bool) -> Result<Complex> {
        let first = self.compound()?;
        let mut rest = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some(')') if nested => break,
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    Combinator::Child
                }
                Some('~') => {
                    self.bump();
                    self.skip_ws();
                    Combinator::Sibling
                }
                // `.name` right after a pseudo-class or key steps down a level
                Some('.') if !had_ws => Combinator::Child,
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            };
            rest.push((combinator, self.compound()?));
        }
        Ok(Complex { first, rest })
    }

    fn compound(&mut self) -> Result<Compound> {
        let start = self.pos;
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.bump();
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let word = self.ident();
                compound.kind = Some(match word {
                    "object" => Kind::Object,
                    "array" => Kind::Array,
                    "string" => Kind::String,
                    "number" => Kind::Number,
                    "boolean" => Kind::Boolean,
                    "null" => Kind::Null,
                    _ => return Err(self.error_at(start, format!("unknown type '{}'", word))),
                });
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('.') if compound.key.is_none() && compound.pseudos.is_empty() => {
                    self.bump();
                    compound.key = Some(self.key()?);
                }
                Some(':') => {
                    self.bump();
                    let pseudo = self.pseudo()?;
                    compound.pseudos.push(pseudo);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn ident(&mut self) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            self.bump();
        }
        &input[start..self.pos]
    }

    fn key(&mut self) -> Result<String> {
        if self.peek() == Some('"') {
            return self.string();
        }
        let name = self.ident();
        if name.is_empty() {
            return Err(self.error("expected a field name after '.'"));
        }
        Ok(name.to_string())
    }

    fn string(&mut self) -> Result<String> {
        let start = self.pos;
        if !self.eat('"') {
            return Err(self.error("expected a quoted string"));
        }
        loop {
            match self.bump() {
                None => return Err(self.error_at(start, "unterminated string")),
                Some('\\') => {
                    self.bump();
                }
                Some('"') => break,
                Some(_) => {}
            }
        }
        serde_json::from_str(&self.input[start..self.pos])
            .map_err(|e| self.error_at(start, e.to_string()))
    }

    fn number(&mut self) -> Result<f64> {
        let input = self.input;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.bump();
        }
        input[start..self.pos]
            .parse()
            .map_err(|_| self.error_at(start, "expected a string or number"))
    }

    fn open(&mut self) -> Result<()> {
        self.expect('(')?;
        self.skip_ws();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.skip_ws();
        self.expect(')')
    }

    fn pseudo(&mut self) -> Result<Pseudo> {
        let start = self.pos;
        let name = self.ident();
        let pseudo = match name {
            "root" => Pseudo::Root,
            "first-child" => Pseudo::FirstChild,
            "last-child" => Pseudo::LastChild,
            "only-child" => Pseudo::OnlyChild,
            "empty" => Pseudo::Empty,
            "has" => {
                self.open()?;
                let selector = self.selector_list(true)?;
                self.close()?;
                Pseudo::Has(selector)
            }
            "val" => {
                self.open()?;
                let literal = match self.peek() {
                    Some('"') => Literal::String(self.string()?),
                    _ => Literal::Number(self.number()?),
                };
                self.close()?;
                Pseudo::Val(literal)
            }
            "contains" => {
                self.open()?;
                let needle = self.string()?;
                self.close()?;
                Pseudo::Contains(needle)
            }
            "nth-child" | "nth-last-child" => {
                self.open()?;
                let nth = self.nth()?;
                self.close()?;
                if name == "nth-child" {
                    Pseudo::NthChild(nth)
                } else {
                    Pseudo::NthLastChild(nth)
                }
            }
            "" => return Err(self.error("expected a pseudo-class name after ':'")),
            other => {
                return Err(self.error_at(start, format!("unknown pseudo-class ':{}'", other)));
            }
        };
        Ok(pseudo)
    }

    fn nth(&mut self) -> Result<Nth> {
        let input = self.input;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ')') {
            self.bump();
        }
        parse_nth(&input[start..self.pos])
            .ok_or_else(|| self.error_at(start, "expected an+b, odd or even"))
    }
}

fn parse_nth(text: &str) -> Option<Nth> {
    let text: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    match text.as_str() {
        "odd" => return Some(Nth { a: 2, b: 1 }),
        "even" => return Some(Nth { a: 2, b: 0 }),
        _ => {}
    }

    match text.split_once('n') {
        None => Some(Nth {
            a: 0,
            b: text.parse().ok()?,
        }),
        Some((a, b)) => {
            let a = match a {
                "" | "+" => 1,
                "-" => -1,
                a => a.parse().ok()?,
            };
            let b = if b.is_empty() { 0 } else { b.parse().ok()? };
            Some(Nth { a, b })
        }
    }
}
