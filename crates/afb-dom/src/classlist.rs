//! Token lists
//!
//! Space-separated token sets backing the `class` attribute.

/// DOMTokenList semantics over an attribute value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenList {
    tokens: Vec<String>,
}

impl TokenList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a space-separated attribute value, dropping duplicates
    pub fn parse(value: &str) -> Self {
        let mut list = Self::new();
        for token in value.split_ascii_whitespace() {
            list.add(token);
        }
        list
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Add a token; returns false if it was already present or empty
    pub fn add(&mut self, token: &str) -> bool {
        if token.is_empty() || self.contains(token) {
            return false;
        }
        self.tokens.push(token.to_string());
        true
    }

    /// Remove a token; returns whether it was present
    pub fn remove(&mut self, token: &str) -> bool {
        let before = self.tokens.len();
        self.tokens.retain(|t| t != token);
        before != self.tokens.len()
    }

    /// Toggle token, returns new state
    pub fn toggle(&mut self, token: &str, force: Option<bool>) -> bool {
        match force {
            Some(true) => {
                self.add(token);
                true
            }
            Some(false) => {
                self.remove(token);
                false
            }
            None if self.contains(token) => {
                self.remove(token);
                false
            }
            None => self.add(token),
        }
    }

    /// Replace a token in place, keeping its position
    pub fn replace(&mut self, old: &str, new: &str) -> bool {
        match self.tokens.iter().position(|t| t == old) {
            Some(pos) => {
                if self.contains(new) {
                    self.tokens.remove(pos);
                } else {
                    self.tokens[pos] = new.to_string();
                }
                true
            }
            None => false,
        }
    }

    /// Serialized attribute value
    pub fn value(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|s| s.as_str())
    }
}

impl std::fmt::Display for TokenList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value())
    }
}
