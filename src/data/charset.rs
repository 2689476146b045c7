use crate::error::{Error, Result};

/// Ordered captcha alphabet plus the fixed label length.
///
/// Encoded labels use class `0` for blank/padding and `i + 1` for the
/// `i`-th charset symbol, matching the network head's class layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset {
    symbols: Vec<char>,
    max_len: usize,
}

impl Charset {
    /// # Errors
    /// Fails on an empty alphabet, a repeated symbol, or `max_len == 0`.
    pub fn new(symbols: &str, max_len: usize) -> Result<Self> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(Error::Config("charset must not be empty".into()));
        }
        if max_len == 0 {
            return Err(Error::Config("max_len must be at least 1".into()));
        }
        for (i, c) in symbols.iter().enumerate() {
            if symbols[..i].contains(c) {
                return Err(Error::Config(format!("charset repeats {c:?}")));
            }
        }
        Ok(Charset { symbols, max_len })
    }

    /// Number of symbols, excluding the blank class.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn as_string(&self) -> String {
        self.symbols.iter().collect()
    }

    /// Encodes `text` into exactly `max_len` class indices, right-padded with blanks.
    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        let mut encoded = Vec::with_capacity(self.max_len);
        for ch in text.chars() {
            let idx = self.symbols.iter()
                .position(|&c| c == ch)
                .ok_or(Error::UnknownCharacter { ch })?;
            encoded.push(idx + 1);
        }
        if encoded.len() > self.max_len {
            return Err(Error::LabelTooLong { label: text.to_owned(), max_len: self.max_len });
        }
        encoded.resize(self.max_len, 0);
        Ok(encoded)
    }

    /// Maps class indices back to text, skipping blanks and out-of-range classes.
    pub fn decode(&self, classes: &[usize]) -> String {
        classes.iter()
            .filter(|&&c| c > 0)
            .filter_map(|&c| self.symbols.get(c - 1))
            .collect()
    }
}
