use core::cmp;

use memchr::memchr;

use crate::{ConfigError, Terminator};

/// A builder for configuring a CSV writer.
///
/// This builder permits specifying the CSV delimiter, terminator and quote.
#[derive(Debug, Default)]
pub struct WriterBuilder {
    wtr: Writer,
}

impl WriterBuilder {
    /// Create a new builder for configuring a CSV writer.
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Build a CSV writer from this configuration.
    ///
    /// This fails under the same conditions as building a reader. See
    /// `ConfigError`.
    pub fn build(&self) -> Result<Writer, ConfigError> {
        ConfigError::check(self.wtr.delimiter, self.wtr.quote, self.wtr.term)?;
        let mut wtr = self.wtr.clone();
        wtr.field_state = FieldState::Start;
        wtr.first_field_in_record = true;
        Ok(wtr)
    }

    /// The field delimiter to use when writing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut WriterBuilder {
        self.wtr.delimiter = delimiter;
        self
    }

    /// The record terminator to use when writing CSV.
    ///
    /// A record terminator can be any single ASCII byte. The default is
    /// `b'\n'`. `Terminator::CRLF` writes `\r\n`.
    pub fn terminator(&mut self, term: Terminator) -> &mut WriterBuilder {
        self.wtr.term = term;
        self
    }

    /// The quote character to use when writing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut WriterBuilder {
        self.wtr.quote = quote;
        self
    }
}

/// The result of writing CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteResult {
    /// All of the input given was consumed and written.
    InputEmpty,
    /// The output buffer was filled before all of the input could be
    /// written. The caller should provide more room and call again with
    /// the unconsumed part of the input.
    OutputFull,
}

/// How far along the field currently being written is.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FieldState {
    /// No field is in progress.
    Start,
    /// The delimiter is written and the field needs an opening quote.
    OpenQuote,
    /// The field body is being copied.
    Body { quoted: bool },
    /// The body is written and a closing quote is still owed.
    CloseQuote,
}

/// A writer for CSV data.
///
/// A field is quoted if and only if it contains the delimiter, the quote,
/// `\r`, `\n` or a custom terminator byte. Quotes inside a quoted field are
/// doubled. Every other field is copied unchanged.
///
/// # RFC 4180
///
/// This writer conforms to RFC 4180 with one exception: it doesn't
/// guarantee that all records written are of the same length. The onus is
/// on the caller to write records of the same length if that matters.
#[derive(Clone, Debug)]
pub struct Writer {
    field_state: FieldState,
    first_field_in_record: bool,
    delimiter: u8,
    term: Terminator,
    quote: u8,
}

impl Default for Writer {
    fn default() -> Writer {
        Writer {
            field_state: FieldState::Start,
            first_field_in_record: true,
            delimiter: b',',
            term: Terminator::Any(b'\n'),
            quote: b'"',
        }
    }
}

impl Writer {
    /// Creates a new CSV writer with the default configuration.
    pub fn new() -> Writer {
        Writer::default()
    }

    /// Forget any partially written field or record.
    ///
    /// The next field written starts a new record.
    pub fn reset(&mut self) {
        self.field_state = FieldState::Start;
        self.first_field_in_record = true;
    }

    /// Whether `field` must be quoted to survive a round trip.
    pub fn should_quote(&self, field: &[u8]) -> bool {
        field.iter().any(|&b| {
            b == self.delimiter
                || b == self.quote
                || b == b'\n'
                || b == b'\r'
                || self.term == b
        })
    }

    /// Write one whole field from `input` to `output`.
    ///
    /// When this is not the first field of a record, the delimiter is
    /// written first. The quoting decision is made on the first call for a
    /// field, so `input` must hold the entire field on that call. If
    /// `WriteResult::OutputFull` is returned, the caller must call again
    /// with `&input[nin..]` and fresh output space until
    /// `WriteResult::InputEmpty` is returned.
    ///
    /// This returns the result, the number of bytes consumed from `input`
    /// and the number of bytes written to `output`.
    pub fn field(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        let (mut nin, mut nout) = (0, 0);
        loop {
            match self.field_state {
                FieldState::Start => {
                    if !self.first_field_in_record {
                        if output.is_empty() {
                            return (WriteResult::OutputFull, 0, 0);
                        }
                        output[0] = self.delimiter;
                        nout += 1;
                    }
                    self.first_field_in_record = false;
                    self.field_state = if self.should_quote(input) {
                        FieldState::OpenQuote
                    } else {
                        FieldState::Body { quoted: false }
                    };
                }
                FieldState::OpenQuote => {
                    if nout >= output.len() {
                        return (WriteResult::OutputFull, nin, nout);
                    }
                    output[nout] = self.quote;
                    nout += 1;
                    self.field_state = FieldState::Body { quoted: true };
                }
                FieldState::Body { quoted: false } => {
                    let n = cmp::min(input.len() - nin, output.len() - nout);
                    output[nout..nout + n].copy_from_slice(&input[nin..nin + n]);
                    nin += n;
                    nout += n;
                    if nin < input.len() {
                        return (WriteResult::OutputFull, nin, nout);
                    }
                    self.field_state = FieldState::Start;
                    return (WriteResult::InputEmpty, nin, nout);
                }
                FieldState::Body { quoted: true } => {
                    let (res, i, o) =
                        self.escape(&input[nin..], &mut output[nout..]);
                    nin += i;
                    nout += o;
                    if res == WriteResult::OutputFull {
                        return (res, nin, nout);
                    }
                    self.field_state = FieldState::CloseQuote;
                }
                FieldState::CloseQuote => {
                    if nout >= output.len() {
                        return (WriteResult::OutputFull, nin, nout);
                    }
                    output[nout] = self.quote;
                    nout += 1;
                    self.field_state = FieldState::Start;
                    return (WriteResult::InputEmpty, nin, nout);
                }
            }
        }
    }

    /// Copy `input` to `output`, doubling every quote.
    ///
    /// A doubled quote is only written when both bytes fit.
    fn escape(
        &self,
        mut input: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        let (mut nin, mut nout) = (0, 0);
        while !input.is_empty() {
            let upto = memchr(self.quote, input).unwrap_or(input.len());
            let n = cmp::min(upto, output.len() - nout);
            output[nout..nout + n].copy_from_slice(&input[..n]);
            nin += n;
            nout += n;
            input = &input[n..];
            if n < upto {
                return (WriteResult::OutputFull, nin, nout);
            }
            if input.is_empty() {
                break;
            }
            if output.len() - nout < 2 {
                return (WriteResult::OutputFull, nin, nout);
            }
            output[nout] = self.quote;
            output[nout + 1] = self.quote;
            nout += 2;
            nin += 1;
            input = &input[1..];
        }
        (WriteResult::InputEmpty, nin, nout)
    }

    /// Write a record terminator to `output`.
    ///
    /// The next field written starts a new record. Nothing is written if
    /// `output` can't hold the whole terminator.
    pub fn terminator(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        debug_assert_eq!(FieldState::Start, self.field_state);
        let (bytes, len) = match self.term {
            Terminator::CRLF => ([b'\r', b'\n'], 2),
            Terminator::Any(b) => ([b, 0], 1),
        };
        if output.len() < len {
            return (WriteResult::OutputFull, 0);
        }
        output[..len].copy_from_slice(&bytes[..len]);
        self.first_field_in_record = true;
        (WriteResult::InputEmpty, len)
    }
}
