use crate::{ConfigError, MalformedKind, Terminator};

/// A pull based CSV parser.
///
/// This parser reads CSV data using a small finite state machine. Callers
/// feed it input buffers of any size and extract parsed records
/// incrementally with the `read_record` method. State is kept across calls,
/// so a record may be split over any number of input buffers, down to one
/// byte each.
///
/// The parser works on bytes. Delimiters and quotes must be ASCII, so they
/// can never match part of a multi-byte UTF-8 sequence. Field data is copied
/// out as is, so UTF-8 input stays UTF-8.
///
/// # Leniency
///
/// By default this parser never fails and always finds *a* parse:
///
/// * A quote inside an unquoted field is a literal quote.
/// * Data after a closing quote is appended to the field, which continues
///   unquoted.
/// * A quoted field still open at the end of input is closed with whatever
///   it holds.
///
/// When `strict` is enabled, each of these is reported as a
/// `ReadRecordResult::Malformed` instead. The partial record is dropped and
/// parsing resumes after the terminator that ends it. Quoting is still
/// tracked while skipping, so a terminator inside a later quoted field of
/// the same record does not end it.
///
/// Blank lines are not skipped. Each one is a record with a single empty
/// field.
#[derive(Clone, Debug)]
pub struct Reader {
    /// The current parser state.
    state: State,
    /// The delimiter that separates fields.
    delimiter: u8,
    /// The terminator that separates records.
    term: Terminator,
    /// The quotation byte.
    quote: u8,
    /// Whether malformed quoting is an error.
    strict: bool,
    /// The current line number.
    line: u64,
    /// The current position in the output buffer when reading a record.
    output_pos: usize,
    /// The most recent lenient recovery, if any.
    recovered: Option<MalformedKind>,
}

impl Default for Reader {
    fn default() -> Reader {
        Reader {
            state: State::StartRecord,
            delimiter: b',',
            term: Terminator::default(),
            quote: b'"',
            strict: false,
            line: 1,
            output_pos: 0,
            recovered: None,
        }
    }
}

/// Builds a CSV parser with various configuration knobs.
///
/// Once a `Reader` is built, its configuration cannot be changed.
#[derive(Debug, Default)]
pub struct ReaderBuilder {
    rdr: Reader,
}

impl ReaderBuilder {
    /// Create a new builder.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV parser from this configuration.
    ///
    /// This fails if the delimiter, quote and terminator are not ASCII or
    /// would make the input ambiguous. See `ConfigError`.
    pub fn build(&self) -> Result<Reader, ConfigError> {
        ConfigError::check(self.rdr.delimiter, self.rdr.quote, self.rdr.term)?;
        let mut rdr = self.rdr.clone();
        rdr.reset();
        Ok(rdr)
    }

    /// The field delimiter to use when parsing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut ReaderBuilder {
        self.rdr.delimiter = delimiter;
        self
    }

    /// The record terminator to use when parsing CSV.
    ///
    /// A record terminator can be any single ASCII byte. The default is a
    /// special value, `Terminator::CRLF`, which treats any occurrence of
    /// `\r`, `\n` or `\r\n` as a single record terminator.
    pub fn terminator(&mut self, term: Terminator) -> &mut ReaderBuilder {
        self.rdr.term = term;
        self
    }

    /// The quote character to use when parsing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ReaderBuilder {
        self.rdr.quote = quote;
        self
    }

    /// Report malformed quoting instead of recovering from it.
    ///
    /// This is disabled by default.
    pub fn strict(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.rdr.strict = yes;
        self
    }
}

/// The result of parsing at most one record from CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadRecordResult {
    /// The caller provided input was exhausted before the end of a record
    /// was found.
    InputEmpty,
    /// The caller provided output buffer was filled before an entire field
    /// could be written to it.
    OutputFull,
    /// The caller provided output buffer of field end positions was filled
    /// before the next field could be parsed.
    OutputEndsFull,
    /// The end of a record was found.
    Record,
    /// The record being read has malformed quoting. This is only returned
    /// in strict mode. Everything written to the output buffers for this
    /// record should be discarded.
    Malformed(MalformedKind),
    /// All CSV data has been read.
    ///
    /// This state can only be returned when an empty input buffer is
    /// provided by the caller.
    End,
}

impl ReadRecordResult {
    fn is_record(&self) -> bool {
        *self == ReadRecordResult::Record
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// Nothing of the next record has been seen.
    StartRecord,
    /// At the start of a field after a delimiter.
    StartField,
    /// Inside an unquoted field.
    InField,
    /// Inside a quoted field.
    InQuotedField,
    /// A quote was seen inside a quoted field. It either closes the field
    /// or is the first half of an escaped quote.
    InDoubleQuote,
    /// A record ended on `\r`. A `\n` right after it belongs to the same
    /// terminator.
    CRLF,
    /// Skipping the rest of a dropped record, inside an unquoted field.
    RecoverField,
    /// Skipping the rest of a dropped record, at the start of a field.
    RecoverFieldStart,
    /// Skipping the rest of a dropped record, inside a quoted field.
    RecoverQuoted,
    /// Skipping the rest of a dropped record, after a quote inside a
    /// quoted field.
    RecoverDoubleQuote,
    /// All input has been consumed.
    End,
}

/// What to do with one input byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Action {
    /// Move to the next state without consuming the byte.
    Epsilon,
    /// Consume the byte and drop it.
    Discard,
    /// Consume the byte and copy it to the current field.
    Output,
    /// Consume the byte and copy it, noting a lenient recovery.
    Recover(MalformedKind),
    /// Consume the byte, which ends the current field.
    EndField,
    /// Consume the byte, which ends the current field and record.
    EndRecord,
    /// Consume the byte and report malformed input.
    Malformed(MalformedKind),
}

impl Reader {
    /// Create a new CSV parser with a default configuration.
    pub fn new() -> Reader {
        Reader::default()
    }

    /// Reset the parser such that it behaves as if it had never been used.
    pub fn reset(&mut self) {
        self.state = State::StartRecord;
        self.line = 1;
        self.output_pos = 0;
        self.recovered = None;
    }

    /// Return the current line number as measured by the number of
    /// occurrences of `\n`.
    ///
    /// Line numbers start at `1` and are reset when `reset` is called.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Drop the record currently being parsed, if any.
    ///
    /// Whatever was already parsed of the record is forgotten and the
    /// rest of it is skipped, up to and including its terminator. This is
    /// for callers that give up on a record midway, for example because
    /// reading more input failed. Everything written to the output
    /// buffers for the record should be discarded too.
    ///
    /// This returns true if a partially parsed record was dropped.
    pub fn discard_record(&mut self) -> bool {
        use self::State::*;

        self.output_pos = 0;
        self.state = match self.state {
            StartField => RecoverFieldStart,
            InField => RecoverField,
            InQuotedField => RecoverQuoted,
            InDoubleQuote => RecoverDoubleQuote,
            StartRecord | CRLF | End | RecoverField | RecoverFieldStart
            | RecoverQuoted | RecoverDoubleQuote => return false,
        };
        self.recovered = None;
        true
    }

    /// Whether the parser is skipping the rest of a dropped record.
    ///
    /// This is the case after `ReadRecordResult::Malformed` is returned or
    /// `discard_record` drops a record, until the terminator of that
    /// record is consumed.
    pub fn in_recovery(&self) -> bool {
        use self::State::*;

        match self.state {
            RecoverField | RecoverFieldStart | RecoverQuoted
            | RecoverDoubleQuote => true,
            _ => false,
        }
    }

    /// Skip input belonging to a dropped record.
    ///
    /// This consumes bytes from `input` until the terminator of the
    /// dropped record has been consumed, and returns how many bytes were
    /// consumed. Nothing is consumed when `in_recovery` is false.
    pub fn skip_recovery(&mut self, input: &[u8]) -> usize {
        let mut nin = 0;
        while nin < input.len() && self.in_recovery() {
            let b = input[nin];
            let (next, _) = self.transition(self.state, b);
            nin += 1;
            self.line += (b == b'\n') as u64;
            self.state = next;
        }
        nin
    }

    /// Take the last lenient recovery made since this was last called.
    ///
    /// This is always `None` in strict mode.
    pub fn take_recovered(&mut self) -> Option<MalformedKind> {
        self.recovered.take()
    }

    /// Parse a single CSV record in `input` and copy each field contiguously
    /// to `output`, with the end position of each field written to `ends`.
    ///
    /// Field data copied to `output` has its quotes unescaped. The positions
    /// in `ends` are relative to the start of the record, so they stay
    /// correct when the caller grows `output` and calls again with the rest
    /// of the buffer.
    ///
    /// This returns four values: a result telling the caller what to do
    /// next, the number of bytes read from `input`, the number of bytes
    /// written to `output` and the number of ends written to `ends`.
    ///
    /// # Termination
    ///
    /// An empty `input` buffer means there is no CSV data left. The caller
    /// should keep calling `read_record` with an empty buffer until
    /// `ReadRecordResult::End` is returned. A trailing record without a
    /// terminator is returned as a `Record` before that.
    pub fn read_record(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        ends: &mut [usize],
    ) -> (ReadRecordResult, usize, usize, usize) {
        if input.is_empty() {
            return self.read_record_end(ends);
        }
        let (mut nin, mut nout, mut nend) = (0, 0, 0);
        while nin < input.len() {
            let b = input[nin];
            let (next, action) = self.transition(self.state, b);
            match action {
                Action::Epsilon => {
                    self.state = next;
                    continue;
                }
                Action::Discard => {}
                Action::Output | Action::Recover(_) => {
                    if nout >= output.len() {
                        return self.pause(
                            ReadRecordResult::OutputFull,
                            nin,
                            nout,
                            nend,
                        );
                    }
                    output[nout] = b;
                    nout += 1;
                    if let Action::Recover(kind) = action {
                        self.recovered = Some(kind);
                    }
                }
                Action::EndField | Action::EndRecord => {
                    if nend >= ends.len() {
                        return self.pause(
                            ReadRecordResult::OutputEndsFull,
                            nin,
                            nout,
                            nend,
                        );
                    }
                    ends[nend] = self.output_pos + nout;
                    nend += 1;
                }
                Action::Malformed(_) => {}
            }
            nin += 1;
            self.line += (b == b'\n') as u64;
            self.state = next;
            match action {
                Action::EndRecord => {
                    self.output_pos = 0;
                    return (ReadRecordResult::Record, nin, nout, nend);
                }
                Action::Malformed(kind) => {
                    self.output_pos = 0;
                    return (ReadRecordResult::Malformed(kind), nin, nout, nend);
                }
                _ => {}
            }
        }
        self.pause(ReadRecordResult::InputEmpty, nin, nout, nend)
    }

    fn pause(
        &mut self,
        res: ReadRecordResult,
        nin: usize,
        nout: usize,
        nend: usize,
    ) -> (ReadRecordResult, usize, usize, usize) {
        debug_assert!(!res.is_record());
        self.output_pos += nout;
        (res, nin, nout, nend)
    }

    fn read_record_end(
        &mut self,
        ends: &mut [usize],
    ) -> (ReadRecordResult, usize, usize, usize) {
        use self::State::*;

        match self.state {
            StartRecord | CRLF | End | RecoverField | RecoverFieldStart
            | RecoverQuoted | RecoverDoubleQuote => {
                self.state = End;
                (ReadRecordResult::End, 0, 0, 0)
            }
            InQuotedField if self.strict => {
                self.state = End;
                self.output_pos = 0;
                let kind = MalformedKind::UnterminatedQuote;
                (ReadRecordResult::Malformed(kind), 0, 0, 0)
            }
            StartField | InField | InQuotedField | InDoubleQuote => {
                if ends.is_empty() {
                    return (ReadRecordResult::OutputEndsFull, 0, 0, 0);
                }
                if self.state == InQuotedField {
                    self.recovered = Some(MalformedKind::UnterminatedQuote);
                }
                ends[0] = self.output_pos;
                self.output_pos = 0;
                self.state = StartRecord;
                (ReadRecordResult::Record, 0, 0, 1)
            }
        }
    }

    /// The end of a record on byte `b`.
    fn end_record(&self, b: u8) -> (State, Action) {
        if self.term.is_crlf() && b == b'\r' {
            (State::CRLF, Action::EndRecord)
        } else {
            (State::StartRecord, Action::EndRecord)
        }
    }

    /// The end of a dropped record on byte `b`.
    fn end_recovery(&self, b: u8) -> (State, Action) {
        let (next, _) = self.end_record(b);
        (next, Action::Discard)
    }

    /// Malformed input, recovered from or reported depending on `strict`.
    fn malformed(&self, lenient: State, kind: MalformedKind) -> (State, Action) {
        if self.strict {
            (State::RecoverField, Action::Malformed(kind))
        } else {
            (lenient, Action::Recover(kind))
        }
    }

    #[inline(always)]
    fn transition(&self, state: State, b: u8) -> (State, Action) {
        use self::State::*;

        match state {
            End => (End, Action::Discard),
            StartRecord | StartField => {
                if b == self.quote {
                    (InQuotedField, Action::Discard)
                } else if b == self.delimiter {
                    (StartField, Action::EndField)
                } else if self.term == b {
                    self.end_record(b)
                } else {
                    (InField, Action::Output)
                }
            }
            InField => {
                if b == self.delimiter {
                    (StartField, Action::EndField)
                } else if self.term == b {
                    self.end_record(b)
                } else if b == self.quote {
                    self.malformed(InField, MalformedKind::BareQuote)
                } else {
                    (InField, Action::Output)
                }
            }
            InQuotedField => {
                if b == self.quote {
                    (InDoubleQuote, Action::Discard)
                } else {
                    (InQuotedField, Action::Output)
                }
            }
            InDoubleQuote => {
                if b == self.quote {
                    (InQuotedField, Action::Output)
                } else if b == self.delimiter {
                    (StartField, Action::EndField)
                } else if self.term == b {
                    self.end_record(b)
                } else {
                    self.malformed(InField, MalformedKind::CharAfterClosingQuote)
                }
            }
            CRLF => {
                if b == b'\n' {
                    (StartRecord, Action::Discard)
                } else {
                    (StartRecord, Action::Epsilon)
                }
            }
            RecoverFieldStart => {
                if b == self.quote {
                    (RecoverQuoted, Action::Discard)
                } else if b == self.delimiter {
                    (RecoverFieldStart, Action::Discard)
                } else if self.term == b {
                    self.end_recovery(b)
                } else {
                    (RecoverField, Action::Discard)
                }
            }
            RecoverField => {
                if b == self.delimiter {
                    (RecoverFieldStart, Action::Discard)
                } else if self.term == b {
                    self.end_recovery(b)
                } else {
                    (RecoverField, Action::Discard)
                }
            }
            RecoverQuoted => {
                if b == self.quote {
                    (RecoverDoubleQuote, Action::Discard)
                } else {
                    (RecoverQuoted, Action::Discard)
                }
            }
            RecoverDoubleQuote => {
                if b == self.quote {
                    (RecoverQuoted, Action::Discard)
                } else if b == self.delimiter {
                    (RecoverFieldStart, Action::Discard)
                } else if self.term == b {
                    self.end_recovery(b)
                } else {
                    (RecoverField, Action::Discard)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::str;

    use arrayvec::{ArrayString, ArrayVec};

    use super::{ReadRecordResult, Reader, ReaderBuilder};
    use crate::{MalformedKind, Terminator};

    type Csv = ArrayVec<Row, 10>;
    type Row = ArrayVec<Field, 10>;
    type Field = ArrayString<32>;

    fn b(s: &str) -> &[u8] {
        s.as_bytes()
    }

    macro_rules! csv {
        ($([$($field:expr),*]),*) => {{
            #[allow(unused_mut)]
            fn x() -> Csv {
                let mut csv = Csv::new();
                $(
                    let mut row = Row::new();
                    $(
                        row.push(Field::from($field).unwrap());
                    )*
                    csv.push(row);
                )*
                csv
            }
            x()
        }}
    }

    macro_rules! parses_to {
        ($name:ident, $data:expr, $expected:expr) => {
            parses_to!($name, $data, $expected, |builder| builder);
        };
        ($name:ident, $data:expr, $expected:expr, $config:expr) => {
            #[test]
            fn $name() {
                let mut builder = ReaderBuilder::new();
                $config(&mut builder);
                let mut rdr = builder.build().unwrap();
                let got = parse_by_record(&mut rdr, $data, usize::MAX);
                assert_eq!($expected, got, "whole input");

                let mut builder = ReaderBuilder::new();
                $config(&mut builder);
                let mut rdr = builder.build().unwrap();
                let got = parse_by_record(&mut rdr, $data, 1);
                assert_eq!($expected, got, "one byte at a time");
            }
        };
    }

    /// Parse `data` feeding at most `chunk` bytes of input per call.
    fn parse_by_record(rdr: &mut Reader, data: &str, chunk: usize) -> Csv {
        use super::ReadRecordResult::*;

        let mut data = data.as_bytes();
        let mut record = [0; 1024];
        let mut ends = [0; 10];

        let mut csv = Csv::new();
        let (mut outpos, mut endpos) = (0, 0);
        loop {
            let n = core::cmp::min(chunk, data.len());
            let (res, nin, nout, nend) = rdr.read_record(
                &data[..n],
                &mut record[outpos..],
                &mut ends[endpos..],
            );
            data = &data[nin..];
            outpos += nout;
            endpos += nend;

            match res {
                InputEmpty => {}
                OutputFull => panic!("record too large (out buffer)"),
                OutputEndsFull => panic!("record too large (end buffer)"),
                Malformed(kind) => panic!("unexpected malformed: {:?}", kind),
                Record => {
                    let s = str::from_utf8(&record[..outpos]).unwrap();
                    let mut start = 0;
                    let mut row = Row::new();
                    for &end in &ends[..endpos] {
                        row.push(Field::from(&s[start..end]).unwrap());
                        start = end;
                    }
                    csv.push(row);
                    outpos = 0;
                    endpos = 0;
                }
                End => return csv,
            }
        }
    }

    parses_to!(empty, "", csv![]);
    parses_to!(one_row_one_field, "a", csv![["a"]]);
    parses_to!(one_row_many_fields, "a,b,c", csv![["a", "b", "c"]]);
    parses_to!(one_row_trailing_comma, "a,b,", csv![["a", "b", ""]]);
    parses_to!(one_row_one_field_lf, "a\n", csv![["a"]]);
    parses_to!(one_row_many_fields_lf, "a,b,c\n", csv![["a", "b", "c"]]);
    parses_to!(one_row_trailing_comma_lf, "a,b,\n", csv![["a", "b", ""]]);
    parses_to!(one_row_one_field_crlf, "a\r\n", csv![["a"]]);
    parses_to!(one_row_many_fields_crlf, "a,b,c\r\n", csv![["a", "b", "c"]]);
    parses_to!(one_row_one_field_cr, "a\r", csv![["a"]]);
    parses_to!(one_row_many_fields_cr, "a,b,c\r", csv![["a", "b", "c"]]);

    parses_to!(many_rows_one_field, "a\nb", csv![["a"], ["b"]]);
    parses_to!(
        many_rows_many_fields,
        "a,b,c\nx,y,z",
        csv![["a", "b", "c"], ["x", "y", "z"]]
    );
    parses_to!(
        many_rows_many_fields_crlf,
        "a,b,c\r\nx,y,z\r\n",
        csv![["a", "b", "c"], ["x", "y", "z"]]
    );
    parses_to!(
        many_rows_many_fields_cr,
        "a,b,c\rx,y,z\r",
        csv![["a", "b", "c"], ["x", "y", "z"]]
    );

    parses_to!(blank_line, "\n", csv![[""]]);
    parses_to!(blank_line_crlf, "\r\n", csv![[""]]);
    parses_to!(blank_lines_cr, "\r\r", csv![[""], [""]]);
    parses_to!(
        blank_line_interspersed,
        "a,b\n\nx,y\n",
        csv![["a", "b"], [""], ["x", "y"]]
    );
    parses_to!(only_commas, ",,", csv![["", "", ""]]);

    parses_to!(quote_empty, "\"\"", csv![[""]]);
    parses_to!(quote_empty_lf, "\"\"\n", csv![[""]]);
    parses_to!(quote_space, "\" \"", csv![[" "]]);
    parses_to!(quote_inner_space, "\" a \"", csv![[" a "]]);
    parses_to!(quote_delimiter, "\"a,b\",c", csv![["a,b", "c"]]);
    parses_to!(quote_lf, "\"a\nb\",c\n", csv![["a\nb", "c"]]);
    parses_to!(quote_crlf, "\"a\r\nb\"\r\nc", csv![["a\r\nb"], ["c"]]);
    parses_to!(
        quote_doubled,
        "\"He said \"\"hi\"\"\"",
        csv![["He said \"hi\""]]
    );
    parses_to!(quote_only_doubled, "\"\"\"\"", csv![["\""]]);
    parses_to!(
        quote_mixed,
        "a,\"b,c\",d\n\"e\",f",
        csv![["a", "b,c", "d"], ["e", "f"]]
    );
    parses_to!(quote_outer_space, "  \"a\"  ", csv![["  \"a\"  "]]);
    parses_to!(quote_bare_inside, "a\"b,c", csv![["a\"b", "c"]]);
    parses_to!(quote_tail, "\"ab\"cd,e", csv![["abcd", "e"]]);
    parses_to!(quote_tail_with_quote, "\"ab\"c\"d", csv![["abc\"d"]]);
    parses_to!(quote_unterminated, "\"abc,def\nx", csv![["abc,def\nx"]]);
    parses_to!(quote_unterminated_after_delim, "a,\"bc", csv![["a", "bc"]]);

    parses_to!(quote_change, "zaz", csv![["a"]], |b: &mut ReaderBuilder| {
        b.quote(b'z');
    });
    parses_to!(delimiter_tabs, "a\tb", csv![["a", "b"]], |b: &mut ReaderBuilder| {
        b.delimiter(b'\t');
    });
    parses_to!(
        delimiter_semicolon,
        "a;\"b;c\";d",
        csv![["a", "b;c", "d"]],
        |b: &mut ReaderBuilder| {
            b.delimiter(b';');
        }
    );
    parses_to!(
        term_weird,
        "a,bzc,dz",
        csv![["a", "b"], ["c", "d"]],
        |b: &mut ReaderBuilder| {
            b.terminator(Terminator::Any(b'z'));
        }
    );
    parses_to!(
        term_lf_keeps_cr,
        "a\r,b\nc",
        csv![["a\r", "b"], ["c"]],
        |b: &mut ReaderBuilder| {
            b.terminator(Terminator::Any(b'\n'));
        }
    );
    parses_to!(utf8_fields, "é,\"ü,ß\"\n", csv![["é", "ü,ß"]]);

    macro_rules! assert_read_record {
        (
            $rdr:expr, $input:expr, $output:expr, $ends:expr,
            $expect_in:expr, $expect_out:expr,
            $expect_end:expr, $expect_res:expr
        ) => {{
            let (res, nin, nout, nend) =
                $rdr.read_record($input, $output, $ends);
            assert_eq!($expect_res, res, "result");
            assert_eq!($expect_in, nin, "input");
            assert_eq!($expect_out, nout, "output");
            assert_eq!($expect_end, nend, "ends");
        }};
    }

    // Feeding a new reader with an empty buffer sends us straight to End.
    #[test]
    fn stream_empty() {
        use super::ReadRecordResult::*;

        let mut rdr = Reader::new();
        assert_read_record!(rdr, &[], &mut [], &mut [], 0, 0, 0, End);
        assert_read_record!(rdr, &[], &mut [], &mut [], 0, 0, 0, End);
    }

    #[test]
    fn stream_record() {
        use super::ReadRecordResult::*;

        let mut inp = b("foo,bar\nbaz");
        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read_record!(rdr, &inp, out, ends, 8, 6, 2, Record);
        assert_eq!(ends[0], 3);
        assert_eq!(ends[1], 6);
        inp = &inp[8..];

        assert_read_record!(rdr, &inp, out, ends, 3, 3, 0, InputEmpty);
        assert_read_record!(rdr, &[], out, ends, 0, 0, 1, Record);
        assert_eq!(ends[0], 3);
        assert_read_record!(rdr, &[], out, ends, 0, 0, 0, End);
    }

    // Output buffers that fill up can be grown without losing track of the
    // field boundaries already found.
    #[test]
    fn stream_output_chunks() {
        use super::ReadRecordResult::*;

        let inp = b("ab,cd\n");
        let out = &mut [0; 8];
        let ends = &mut [0; 4];
        let mut rdr = Reader::new();

        assert_read_record!(rdr, &inp[0..], &mut out[0..1], ends, 1, 1, 0, OutputFull);
        assert_read_record!(rdr, &inp[1..], &mut out[1..2], ends, 2, 1, 1, OutputFull);
        assert_eq!(ends[0], 2);
        assert_read_record!(rdr, &inp[3..], &mut out[2..], &mut ends[1..], 3, 2, 1, Record);
        assert_eq!(ends[1], 4);
        assert_eq!(&out[..4], b"abcd");
    }

    #[test]
    fn stream_ends_full() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 8];
        let mut rdr = Reader::new();

        assert_read_record!(rdr, b("a,b"), out, &mut [], 1, 1, 0, OutputEndsFull);
        let ends = &mut [0; 2];
        assert_read_record!(rdr, b(",b"), &mut out[1..], ends, 2, 1, 1, InputEmpty);
        assert_read_record!(rdr, &[], &mut out[2..], &mut [], 0, 0, 0, OutputEndsFull);
        assert_read_record!(rdr, &[], &mut out[2..], &mut ends[1..], 0, 0, 1, Record);
        assert_eq!(ends, &[1, 2]);
    }

    #[test]
    fn line_numbers() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_eq!(1, rdr.line());
        assert_read_record!(rdr, b("\"a\nb\",c\n"), out, ends, 8, 4, 2, Record);
        assert_eq!(3, rdr.line());
        assert_read_record!(rdr, b("d\r\n"), out, ends, 2, 1, 1, Record);
        assert_eq!(3, rdr.line());
        assert_read_record!(rdr, b("\n"), out, ends, 1, 0, 0, InputEmpty);
        assert_eq!(4, rdr.line());

        rdr.reset();
        assert_eq!(1, rdr.line());
    }

    #[test]
    fn lenient_recoveries_are_noted() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read_record!(rdr, b("a,b\n"), out, ends, 4, 2, 2, Record);
        assert_eq!(None, rdr.take_recovered());
        assert_read_record!(rdr, b("\"a\"b\n"), out, ends, 5, 2, 1, Record);
        assert_eq!(
            Some(MalformedKind::CharAfterClosingQuote),
            rdr.take_recovered()
        );
        assert_eq!(None, rdr.take_recovered());
        assert_read_record!(rdr, b("\"ab"), out, ends, 3, 2, 0, InputEmpty);
        assert_read_record!(rdr, &[], out, ends, 0, 0, 1, Record);
        assert_eq!(Some(MalformedKind::UnterminatedQuote), rdr.take_recovered());
    }

    #[test]
    fn strict_char_after_closing_quote() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = ReaderBuilder::new().strict(true).build().unwrap();

        let kind = MalformedKind::CharAfterClosingQuote;
        assert_read_record!(rdr, b("\"a\"b,c\nd\n"), out, ends, 4, 1, 0, Malformed(kind));
        // The rest of the bad record is skipped.
        assert_read_record!(rdr, b(",c\nd\n"), out, ends, 5, 1, 1, Record);
        assert_eq!(&out[..1], b"d");
        assert_eq!(None, rdr.take_recovered());
    }

    #[test]
    fn strict_bare_quote() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = ReaderBuilder::new().strict(true).build().unwrap();

        let kind = MalformedKind::BareQuote;
        assert_read_record!(rdr, b("ok\na\"b"), out, ends, 3, 2, 1, Record);
        assert_read_record!(rdr, b("a\"b"), out, ends, 2, 1, 0, Malformed(kind));
        assert_read_record!(rdr, b("b"), out, ends, 1, 0, 0, InputEmpty);
        assert_read_record!(rdr, &[], out, ends, 0, 0, 0, End);
    }

    #[test]
    fn strict_unterminated_quote() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = ReaderBuilder::new().strict(true).build().unwrap();

        let kind = MalformedKind::UnterminatedQuote;
        assert_read_record!(rdr, b("a,\"bc"), out, ends, 5, 3, 1, InputEmpty);
        assert_read_record!(rdr, &[], out, ends, 0, 0, 0, Malformed(kind));
        assert_read_record!(rdr, &[], out, ends, 0, 0, 0, End);
    }

    #[test]
    fn strict_skip_respects_quotes() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = ReaderBuilder::new().strict(true).build().unwrap();

        let kind = MalformedKind::CharAfterClosingQuote;
        let data = b("\"a\"b,\"x\ny\",z\nok\n");
        assert_read_record!(rdr, data, out, ends, 4, 1, 0, Malformed(kind));
        // The newline inside the quoted field doesn't end the bad record.
        assert_read_record!(rdr, &data[4..], out, ends, 12, 2, 1, Record);
        assert_eq!(&out[..2], b"ok");
        assert_eq!(4, rdr.line());
    }

    #[test]
    fn discard_partial_record() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert!(!rdr.discard_record());
        assert_eq!(0, rdr.skip_recovery(b("a\n")));

        assert_read_record!(rdr, b("ab,\"c"), out, ends, 5, 3, 1, InputEmpty);
        assert!(rdr.discard_record());
        assert!(rdr.in_recovery());
        assert!(!rdr.discard_record());

        assert_eq!(7, rdr.skip_recovery(b("d\ne\",f\ng\n")));
        assert!(!rdr.in_recovery());
        assert_eq!(3, rdr.line());

        assert_read_record!(rdr, b("g\n"), out, ends, 2, 1, 1, Record);
        assert_eq!(&out[..1], b"g");
        assert_eq!(ends[0], 1);
    }

    #[test]
    fn discard_then_end_of_input() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read_record!(rdr, b("\"abc"), out, ends, 4, 3, 0, InputEmpty);
        assert!(rdr.discard_record());
        assert_read_record!(rdr, &[], out, ends, 0, 0, 0, End);
        assert_eq!(None, rdr.take_recovered());
    }

    #[test]
    fn strict_accepts_closed_quote_at_end() {
        use super::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = ReaderBuilder::new().strict(true).build().unwrap();

        assert_read_record!(rdr, b("\"a\"\"b\""), out, ends, 6, 3, 0, InputEmpty);
        assert_read_record!(rdr, &[], out, ends, 0, 0, 1, Record);
        assert_eq!(&out[..3], b"a\"b");
    }

    #[test]
    fn build_rejects_bad_config() {
        use crate::ConfigError;

        let err = ReaderBuilder::new().quote(b',').build().unwrap_err();
        assert_eq!(ConfigError::DelimiterIsQuote(b','), err);
        let err = ReaderBuilder::new().delimiter(b'\n').build().unwrap_err();
        assert_eq!(ConfigError::DelimiterIsLineBreak(b'\n'), err);
    }

    #[test]
    fn malformed_result_is_not_a_record() {
        let kind = MalformedKind::BareQuote;
        assert!(!ReadRecordResult::Malformed(kind).is_record());
        assert!(ReadRecordResult::Record.is_record());
    }
}
