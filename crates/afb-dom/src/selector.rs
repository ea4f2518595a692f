//! Selectors
//!
//! The subset of CSS selectors callers use to point at focus targets and
//! containers: type, universal, `#id`, `.class` and attribute selectors
//! combined into compounds, joined by descendant or child combinators.

use crate::DomError;

/// Parsed selector. Only `parse` builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Compounds from left to right
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

/// Compound selector (`input#email.wide[required]`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    /// Lowercase tag, None for universal
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrMatch>,
}

/// Attribute condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrMatch {
    pub name: String,
    /// Exact value, None for presence
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

impl Selector {
    /// Parse a selector string
    pub fn parse(input: &str) -> Result<Self, DomError> {
        Parser::new(input).parse()
            .ok_or_else(|| DomError::InvalidSelector(input.to_string()))
    }

    pub fn compounds(&self) -> &[Compound] {
        &self.compounds
    }

    pub fn combinators(&self) -> &[Combinator] {
        &self.combinators
    }

    /// Rightmost compound (the subject)
    pub fn subject(&self) -> Option<&Compound> {
        self.compounds.last()
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self { chars: input.trim().chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn parse(mut self) -> Option<Selector> {
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();

        while self.peek().is_some() {
            let had_ws = self.skip_ws();
            let combinator = if self.peek() == Some('>') {
                self.bump();
                self.skip_ws();
                Combinator::Child
            } else if had_ws {
                Combinator::Descendant
            } else {
                return None;
            };
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }

        Some(Selector { compounds, combinators })
    }

    fn compound(&mut self) -> Option<Compound> {
        let mut compound = Compound::default();
        let mut any = false;

        match self.peek() {
            Some('*') => {
                self.bump();
                any = true;
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
                any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    if compound.id.is_some() {
                        return None;
                    }
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attrs.push(self.attribute()?);
                }
                _ => break,
            }
            any = true;
        }

        any.then_some(compound)
    }

    fn attribute(&mut self) -> Option<AttrMatch> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        let value = match self.bump()? {
            ']' => return Some(AttrMatch { name, value: None }),
            '=' => {
                self.skip_ws();
                let value = match self.peek()? {
                    q @ ('"' | '\'') => {
                        self.bump();
                        let mut value = String::new();
                        loop {
                            let c = self.bump()?;
                            if c == q {
                                break;
                            }
                            value.push(c);
                        }
                        value
                    }
                    _ => self.ident()?,
                };
                self.skip_ws();
                value
            }
            _ => return None,
        };
        (self.bump()? == ']').then_some(AttrMatch { name, value: Some(value) })
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos || self.chars[start].is_ascii_digit() {
            return None;
        }
        Some(self.chars[start..self.pos].iter().collect())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}
