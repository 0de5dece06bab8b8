/*!
`plaincsv-core` provides the two state machines at the heart of `plaincsv`:
a CSV parser and a CSV quoting writer. Neither does any I/O or allocation.
Callers push byte buffers in and get byte buffers out, which makes both
usable on arbitrarily large streams in bounded memory.

Most users want the `plaincsv` crate instead, which wraps these machines
around `std::io::Read` and `std::io::Write`.

# Example: counting fields

```
use plaincsv_core::{ReaderBuilder, ReadRecordResult};

let data = b"foo,bar\n\"a,b\",c\n";
let mut rdr = ReaderBuilder::new().build().unwrap();
let mut input = &data[..];
let (mut out, mut ends) = ([0u8; 64], [0usize; 8]);
let mut records = 0;
loop {
    let (res, nin, _, _) = rdr.read_record(input, &mut out, &mut ends);
    input = &input[nin..];
    match res {
        ReadRecordResult::Record => records += 1,
        ReadRecordResult::End => break,
        _ => {}
    }
}
assert_eq!(records, 2);
```
*/

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

use core::fmt;

pub use crate::reader::{ReadRecordResult, Reader, ReaderBuilder};
pub use crate::writer::{WriteResult, Writer, WriterBuilder};

mod reader;
mod writer;

/// A record terminator.
///
/// Use this to specify the record terminator while parsing or writing CSV.
/// When parsing, the default is `CRLF`, which treats `\r`, `\n` or `\r\n` as
/// a single record terminator. When writing, the default is `Any(b'\n')`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Terminator {
    /// Parses `\r`, `\n` or `\r\n` as a single record terminator. Writes
    /// `\r\n`.
    CRLF,
    /// Parses or writes the byte given as a record terminator.
    Any(u8),
}

impl Terminator {
    /// Whether this is the special CRLF terminator.
    pub fn is_crlf(&self) -> bool {
        match *self {
            Terminator::CRLF => true,
            Terminator::Any(_) => false,
        }
    }
}

impl Default for Terminator {
    fn default() -> Terminator {
        Terminator::CRLF
    }
}

impl PartialEq<u8> for Terminator {
    #[inline]
    fn eq(&self, &other: &u8) -> bool {
        match *self {
            Terminator::CRLF => other == b'\r' || other == b'\n',
            Terminator::Any(b) => other == b,
        }
    }
}

/// An invalid parser or writer configuration.
///
/// Builders check their configuration when `build` is called. Any of these
/// conditions would make the produced CSV ambiguous.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The delimiter and the quote are the same byte.
    DelimiterIsQuote(u8),
    /// The delimiter is `\r` or `\n`.
    DelimiterIsLineBreak(u8),
    /// The quote is `\r` or `\n`.
    QuoteIsLineBreak(u8),
    /// The delimiter is not an ASCII byte.
    NonAsciiDelimiter(u8),
    /// The quote is not an ASCII byte.
    NonAsciiQuote(u8),
    /// A custom terminator is not an ASCII byte.
    NonAsciiTerminator(u8),
    /// A custom terminator is the same byte as the delimiter or the quote.
    TerminatorConflict(u8),
}

impl ConfigError {
    /// Check a delimiter, quote and terminator for consistency.
    pub fn check(
        delimiter: u8,
        quote: u8,
        term: Terminator,
    ) -> Result<(), ConfigError> {
        if !delimiter.is_ascii() {
            return Err(ConfigError::NonAsciiDelimiter(delimiter));
        }
        if !quote.is_ascii() {
            return Err(ConfigError::NonAsciiQuote(quote));
        }
        if delimiter == quote {
            return Err(ConfigError::DelimiterIsQuote(delimiter));
        }
        if delimiter == b'\r' || delimiter == b'\n' {
            return Err(ConfigError::DelimiterIsLineBreak(delimiter));
        }
        if quote == b'\r' || quote == b'\n' {
            return Err(ConfigError::QuoteIsLineBreak(quote));
        }
        if let Terminator::Any(b) = term {
            if !b.is_ascii() {
                return Err(ConfigError::NonAsciiTerminator(b));
            }
            if b == delimiter || b == quote {
                return Err(ConfigError::TerminatorConflict(b));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::DelimiterIsQuote(b) => write!(
                f,
                "delimiter and quote are both {:?}",
                b as char
            ),
            ConfigError::DelimiterIsLineBreak(b) => {
                write!(f, "delimiter {:?} is a line break", b as char)
            }
            ConfigError::QuoteIsLineBreak(b) => {
                write!(f, "quote {:?} is a line break", b as char)
            }
            ConfigError::NonAsciiDelimiter(b) => {
                write!(f, "delimiter \\x{:02x} is not ASCII", b)
            }
            ConfigError::NonAsciiQuote(b) => {
                write!(f, "quote \\x{:02x} is not ASCII", b)
            }
            ConfigError::NonAsciiTerminator(b) => {
                write!(f, "terminator \\x{:02x} is not ASCII", b)
            }
            ConfigError::TerminatorConflict(b) => write!(
                f,
                "terminator {:?} is also the delimiter or the quote",
                b as char
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// The kind of malformed quoting found by a parser.
///
/// In lenient mode (the default) the parser recovers from each of these
/// without an error. In strict mode each of them is reported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MalformedKind {
    /// The input ended inside a quoted field.
    UnterminatedQuote,
    /// A closing quote was followed by something other than a quote, a
    /// delimiter or a record terminator.
    CharAfterClosingQuote,
    /// A quote appeared inside a field that did not start with one.
    BareQuote,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MalformedKind::UnterminatedQuote => {
                write!(f, "quoted field is never closed")
            }
            MalformedKind::CharAfterClosingQuote => {
                write!(f, "unexpected character after closing quote")
            }
            MalformedKind::BareQuote => {
                write!(f, "quote character inside an unquoted field")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Terminator};

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Ok(()), ConfigError::check(b',', b'"', Terminator::CRLF));
        assert_eq!(
            Ok(()),
            ConfigError::check(b';', b'\'', Terminator::Any(b'\n'))
        );
    }

    #[test]
    fn rejects_ambiguous_config() {
        use super::ConfigError::*;

        let check = ConfigError::check;
        assert_eq!(Err(DelimiterIsQuote(b'"')), check(b'"', b'"', Terminator::CRLF));
        assert_eq!(Err(DelimiterIsLineBreak(b'\n')), check(b'\n', b'"', Terminator::CRLF));
        assert_eq!(Err(QuoteIsLineBreak(b'\r')), check(b',', b'\r', Terminator::CRLF));
        assert_eq!(Err(NonAsciiDelimiter(0xE9)), check(0xE9, b'"', Terminator::CRLF));
        assert_eq!(Err(NonAsciiQuote(0x80)), check(b',', 0x80, Terminator::CRLF));
        assert_eq!(
            Err(NonAsciiTerminator(0xFF)),
            check(b',', b'"', Terminator::Any(0xFF))
        );
        assert_eq!(
            Err(TerminatorConflict(b',')),
            check(b',', b'"', Terminator::Any(b','))
        );
    }

    #[test]
    fn terminator_matches_bytes() {
        assert!(Terminator::CRLF == b'\r');
        assert!(Terminator::CRLF == b'\n');
        assert!(Terminator::CRLF != b'z');
        assert!(Terminator::Any(b'z') == b'z');
        assert!(Terminator::Any(b'z') != b'\n');
    }
}
