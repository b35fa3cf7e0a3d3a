//! Text-format parsing.
//!
//! The inverse of `Display`: for every value type `V` in this workspace the
//! property `read::<V>(&format!("{v}")) == v` holds. Parsers consume from a
//! [`State`] that tracks the position for error reporting.

use thiserror::Error;

/// A positioned parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at position {position}: expected {expected}")]
pub struct ReadError {
    pub position: usize,
    pub expected: String,
}

/// Parser state over a borrowed input string.
pub struct State<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> State<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn error(&self, expected: impl Into<String>) -> ReadError {
        ReadError {
            position: self.pos,
            expected: expected.into(),
        }
    }

    /// Consumes `prefix` or fails without consuming anything.
    pub fn prefix(&mut self, prefix: &str) -> Result<(), ReadError> {
        if self.maybe_prefix(prefix) {
            Ok(())
        } else {
            Err(self.error(format!("'{prefix}'")))
        }
    }

    /// Consumes `prefix` if present, reporting whether it did.
    pub fn maybe_prefix(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    pub fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    /// Parses a decimal unsigned integer, rejecting overflow.
    pub fn uint<T: Uint>(&mut self) -> Result<T, ReadError> {
        let digits: usize = self
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return Err(self.error("a digit"));
        }
        let mut value = T::ZERO;
        for b in self.rest()[..digits].bytes() {
            value = value
                .checked_mul_10()
                .and_then(|v| v.checked_add_digit(b - b'0'))
                .ok_or_else(|| self.error("an in-range number"))?;
        }
        self.pos += digits;
        Ok(value)
    }

    /// Parses a `"…"`-quoted string; embedded quotes are doubled.
    pub fn quoted(&mut self) -> Result<String, ReadError> {
        self.prefix("\"")?;
        let mut out = String::new();
        loop {
            match self.rest().find('"') {
                None => return Err(self.error("'\"'")),
                Some(n) => {
                    out.push_str(&self.rest()[..n]);
                    self.pos += n + 1;
                    if self.maybe_prefix("\"") {
                        out.push('"');
                    } else {
                        return Ok(out);
                    }
                }
            }
        }
    }

    /// Consumes and returns the next `n` bytes of input.
    ///
    /// The caller guarantees `n` bytes remain and land on a char boundary.
    pub fn take(&mut self, n: usize) -> &'a str {
        let taken = &self.input[self.pos..self.pos + n];
        self.pos += n;
        taken
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.input.len()
    }
}

/// Unsigned integers [`State::uint`] can produce.
pub trait Uint: Copy {
    const ZERO: Self;
    fn checked_mul_10(self) -> Option<Self>;
    fn checked_add_digit(self, digit: u8) -> Option<Self>;
}

macro_rules! impl_uint {
    ($($t:ty)+) => {$(
        impl Uint for $t {
            const ZERO: Self = 0;
            fn checked_mul_10(self) -> Option<Self> {
                self.checked_mul(10)
            }
            fn checked_add_digit(self, digit: u8) -> Option<Self> {
                self.checked_add(digit as $t)
            }
        }

        impl Read for $t {
            fn read(state: &mut State) -> Result<Self, ReadError> {
                state.uint()
            }
        }
    )+};
}

impl_uint!(u8 u16 u32 u64 usize);

/// Types with a text representation inverse to their `Display`.
pub trait Read: Sized {
    fn read(state: &mut State) -> Result<Self, ReadError>;
}

/// Parses a complete input; trailing characters are an error.
pub fn read<T: Read>(input: &str) -> Result<T, ReadError> {
    let mut state = State::new(input);
    let value = T::read(&mut state)?;
    if !state.at_end() {
        return Err(state.error("end of input"));
    }
    Ok(value)
}

/// Parses the contents of a file, ignoring a trailing newline.
pub fn from_file<T: Read>(path: impl AsRef<std::path::Path>) -> Result<T, FromFileError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| FromFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read(contents.trim_end_matches('\n')).map_err(|source| FromFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum FromFileError {
    #[error("could not read '{path}'")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse '{path}'")]
    Parse {
        path: std::path::PathBuf,
        source: ReadError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_rejects_overflow() {
        assert!(read::<u8>("255").is_ok());
        assert!(read::<u8>("256").is_err());
        assert!(read::<u64>("18446744073709551615").is_ok());
        assert!(read::<u64>("18446744073709551616").is_err());
    }

    #[test]
    fn uint_requires_a_digit() {
        let err = read::<u64>("x").unwrap_err();
        assert_eq!(err.position, 0);
        assert_eq!(err.expected, "a digit");
    }

    #[test]
    fn trailing_input_is_an_error() {
        assert!(read::<u64>("12 ").is_err());
    }

    #[test]
    fn quoted_doubles_embedded_quotes() {
        let mut state = State::new("\"say \"\"hi\"\"\"");
        assert_eq!(state.quoted().unwrap(), "say \"hi\"");
        assert!(state.at_end());
    }

    #[test]
    fn prefix_reports_position() {
        let mut state = State::new("ab");
        state.prefix("a").unwrap();
        let err = state.prefix("c").unwrap_err();
        assert_eq!(err.position, 1);
        assert_eq!(err.expected, "'c'");
    }
}
