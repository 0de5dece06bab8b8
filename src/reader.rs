use std::cmp;
use std::io::{self, BufRead};

use plaincsv_core::{
    ReadRecordResult, Reader as CoreReader,
    ReaderBuilder as CoreReaderBuilder, Terminator,
};
use tracing::{debug, trace};

use crate::byte_record::{ByteRecord, Position};
use crate::error::{Error, ErrorKind, Result};
use crate::string_record::StringRecord;

/// The default capacity of the input buffer.
const DEFAULT_CAPACITY: usize = 8 * (1 << 10);

/// Builds a CSV reader with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, record
/// terminator and more. Once a CSV `Reader` is built, its configuration
/// cannot be changed.
#[derive(Debug)]
pub struct ReaderBuilder {
    capacity: usize,
    term: Terminator,
    builder: Box<CoreReaderBuilder>,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            capacity: DEFAULT_CAPACITY,
            term: Terminator::default(),
            builder: Box::new(CoreReaderBuilder::default()),
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// To convert a builder into a reader, call `from_reader`.
    ///
    /// # Example
    ///
    /// ```
    /// use plaincsv::{ReaderBuilder, StringRecord};
    ///
    /// let data = "city;country\nBoston;United States\n";
    /// let mut rdr = ReaderBuilder::new()
    ///     .delimiter(b';')
    ///     .from_reader(data.as_bytes())?;
    ///
    /// let mut record = StringRecord::new();
    /// assert!(rdr.read_record(&mut record)?);
    /// assert_eq!(record, vec!["city", "country"]);
    /// # Ok::<(), plaincsv::Error>(())
    /// ```
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV parser from this configuration that reads data from
    /// `rdr`.
    ///
    /// This returns an `ErrorKind::Config` error if the delimiter, quote
    /// and terminator are not ASCII or would make the input ambiguous.
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Result<Reader<R>> {
        let core = self.builder.build()?;
        Ok(Reader::new(core, self.term, self.capacity, rdr))
    }

    /// The field delimiter to use when parsing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut ReaderBuilder {
        self.builder.delimiter(delimiter);
        self
    }

    /// The record terminator to use when parsing CSV.
    ///
    /// A record terminator can be any single ASCII byte. The default is a
    /// special value, `Terminator::CRLF`, which treats any occurrence of
    /// `\r`, `\n` or `\r\n` as a single record terminator.
    pub fn terminator(&mut self, term: Terminator) -> &mut ReaderBuilder {
        self.term = term;
        self.builder.terminator(term);
        self
    }

    /// The quote character to use when parsing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ReaderBuilder {
        self.builder.quote(quote);
        self
    }

    /// Whether malformed quoting is an error.
    ///
    /// When disabled (the default), the reader recovers from malformed
    /// quoting and logs each recovery at debug level. When enabled, such
    /// a record is returned as an `ErrorKind::Malformed` error and reading
    /// may resume with the record after it.
    ///
    /// # Example
    ///
    /// ```
    /// use plaincsv::{ErrorKind, MalformedKind, ReaderBuilder, StringRecord};
    ///
    /// let data = "\"a\"b,c\nd,e\n";
    /// let mut rdr = ReaderBuilder::new().strict(true).from_reader(data.as_bytes())?;
    /// let mut record = StringRecord::new();
    ///
    /// let err = rdr.read_record(&mut record).unwrap_err();
    /// match *err.kind() {
    ///     ErrorKind::Malformed { kind, .. } => {
    ///         assert_eq!(kind, MalformedKind::CharAfterClosingQuote);
    ///     }
    ///     ref wrong => panic!("unexpected error: {:?}", wrong),
    /// }
    /// assert!(rdr.read_record(&mut record)?);
    /// assert_eq!(record, vec!["d", "e"]);
    /// # Ok::<(), plaincsv::Error>(())
    /// ```
    pub fn strict(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.builder.strict(yes);
        self
    }

    /// Set the capacity (in bytes) of the buffer used in the CSV reader.
    ///
    /// A capacity smaller than one byte is raised to one byte.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.capacity = capacity;
        self
    }
}

/// A streaming CSV reader.
///
/// The reader holds one fixed size input buffer and the record currently
/// being read, so input of any size can be processed in bounded memory.
/// Rows are produced only when asked for, either by `read_record` into a
/// reused buffer or through one of the record iterators.
///
/// Blank lines are not skipped. Each one is a record with one empty field.
/// Empty input has no records at all.
///
/// # Example
///
/// ```
/// use plaincsv::Reader;
///
/// let data = "a,\"b\nc\"\n\nd";
/// let mut rdr = Reader::from_reader(data.as_bytes());
/// let records = rdr
///     .records()
///     .collect::<Result<Vec<_>, plaincsv::Error>>()?;
/// assert_eq!(records, vec![
///     vec!["a", "b\nc"],
///     vec![""],
///     vec!["d"],
/// ]);
/// # Ok::<(), plaincsv::Error>(())
/// ```
#[derive(Debug)]
pub struct Reader<R> {
    /// The underlying CSV parser.
    core: Box<CoreReader>,
    /// The underlying reader.
    rdr: io::BufReader<R>,
    /// Various state tracking.
    state: ReaderState,
}

#[derive(Debug)]
struct ReaderState {
    /// The position of the next byte to be parsed.
    cur_pos: Position,
    /// The position at which the most recently read record started.
    last_pos: Position,
    /// Whether records end on `\r`, `\n` or `\r\n`.
    crlf: bool,
    /// Whether the last record ended on a `\r` that may be followed by a
    /// `\n` belonging to the same terminator.
    after_cr: bool,
    /// Whether the reader has reached the end of the input.
    eof: bool,
}

impl<R: io::Read> Reader<R> {
    /// Create a new CSV reader given a builder and a source of underlying
    /// bytes.
    fn new(
        core: CoreReader,
        term: Terminator,
        capacity: usize,
        rdr: R,
    ) -> Reader<R> {
        Reader {
            core: Box::new(core),
            rdr: io::BufReader::with_capacity(cmp::max(1, capacity), rdr),
            state: ReaderState {
                cur_pos: Position::new(),
                last_pos: Position::new(),
                crlf: term.is_crlf(),
                after_cr: false,
                eof: false,
            },
        }
    }

    /// Create a new CSV parser with a default configuration for the given
    /// reader.
    ///
    /// To customize CSV parsing, use a `ReaderBuilder`.
    pub fn from_reader(rdr: R) -> Reader<R> {
        Reader::new(
            CoreReader::new(),
            Terminator::default(),
            DEFAULT_CAPACITY,
            rdr,
        )
    }

    /// Returns a borrowed iterator over all records as strings.
    ///
    /// Each item yielded by this iterator is a `Result<StringRecord,
    /// Error>`. Therefore, in order to access the record, callers must
    /// handle the possibility of error (typically with `?`).
    pub fn records(&mut self) -> StringRecordsIter<R> {
        StringRecordsIter::new(self)
    }

    /// Returns an owned iterator over all records as strings.
    ///
    /// This is mostly useful when you want to return a CSV iterator or
    /// store it somewhere.
    pub fn into_records(self) -> StringRecordsIntoIter<R> {
        StringRecordsIntoIter::new(self)
    }

    /// Returns a borrowed iterator over all records as raw bytes.
    ///
    /// Each item yielded by this iterator is a `Result<ByteRecord, Error>`.
    /// A lenient reader only fails here on I/O errors.
    pub fn byte_records(&mut self) -> ByteRecordsIter<R> {
        ByteRecordsIter::new(self)
    }

    /// Returns an owned iterator over all records as raw bytes.
    pub fn into_byte_records(self) -> ByteRecordsIntoIter<R> {
        ByteRecordsIntoIter::new(self)
    }

    /// Read a single row into the given record. Returns false when no more
    /// records could be read.
    ///
    /// This method is useful when you want to read records as fast as
    /// possible. It's less ergonomic than an iterator, but it permits the
    /// caller to reuse the `StringRecord` allocation, which usually results
    /// in higher throughput.
    ///
    /// If the row is not valid UTF-8, an `ErrorKind::Utf8` error is
    /// returned and the reader moves on to the next row. On any error,
    /// `record` is left empty.
    ///
    /// # Example
    ///
    /// ```
    /// use plaincsv::{Reader, StringRecord};
    ///
    /// let data = "a,b\nc,d\n";
    /// let mut rdr = Reader::from_reader(data.as_bytes());
    /// let mut record = StringRecord::new();
    ///
    /// let mut count = 0;
    /// while rdr.read_record(&mut record)? {
    ///     assert_eq!(record.len(), 2);
    ///     count += 1;
    /// }
    /// assert_eq!(count, 2);
    /// # Ok::<(), plaincsv::Error>(())
    /// ```
    pub fn read_record(&mut self, record: &mut StringRecord) -> Result<bool> {
        // A record that fails UTF-8 validation is cleared before returning,
        // so `record` never holds invalid UTF-8.
        if !self.read_byte_record(record.as_byte_record_mut())? {
            return Ok(false);
        }
        match record.as_byte_record().validate() {
            Ok(()) => Ok(true),
            Err(err) => {
                record.clear();
                let pos = Some(self.state.last_pos.clone());
                Err(Error::new(ErrorKind::Utf8 { pos, err }))
            }
        }
    }

    /// Read a single row into the given byte record. Returns false when no
    /// more records could be read.
    ///
    /// This method is useful when you want to read records as fast as
    /// possible. It's less ergonomic than an iterator, but it permits the
    /// caller to reuse the `ByteRecord` allocation, which usually results
    /// in higher throughput.
    ///
    /// On any error, `record` is left empty.
    pub fn read_byte_record(
        &mut self,
        record: &mut ByteRecord,
    ) -> Result<bool> {
        let result = self.read_byte_record_impl(record);
        if result.is_err() {
            record.clear();
        }
        result
    }

    fn read_byte_record_impl(
        &mut self,
        record: &mut ByteRecord,
    ) -> Result<bool> {
        use ReadRecordResult::*;

        record.set_len(0);
        if self.state.eof {
            return Ok(false);
        }
        self.skip_dropped_record()?;
        let mut start = self.state.cur_pos.clone();
        if self.state.after_cr {
            // The `\n` of a `\r\n` is consumed with the next record, but
            // that record starts after it.
            fill_buf(&mut self.rdr)?;
            if self.rdr.buffer().first() == Some(&b'\n') {
                start.set_byte(start.byte() + 1);
                start.set_line(start.line() + 1);
            }
            self.state.after_cr = false;
        }
        let (mut outlen, mut endlen) = (0, 0);
        loop {
            if self.rdr.buffer().is_empty() {
                trace!(
                    capacity = self.rdr.capacity(),
                    byte = self.state.cur_pos.byte(),
                    "refilling input buffer"
                );
            }
            if let Err(err) = fill_buf(&mut self.rdr) {
                self.abandon_record(start);
                return Err(err.into());
            }
            let (res, nin, nout, nend, last) = {
                let input = self.rdr.buffer();
                let (fields, ends) = record.as_parts();
                let (res, nin, nout, nend) = self.core.read_record(
                    input,
                    &mut fields[outlen..],
                    &mut ends[endlen..],
                );
                let last = nin.checked_sub(1).map(|i| input[i]);
                (res, nin, nout, nend, last)
            };
            self.rdr.consume(nin);
            let byte = self.state.cur_pos.byte();
            self.state.cur_pos.set_byte(byte + nin as u64);
            self.state.cur_pos.set_line(self.core.line());
            outlen += nout;
            endlen += nend;
            match res {
                InputEmpty => continue,
                OutputFull => {
                    record.expand_fields();
                    continue;
                }
                OutputEndsFull => {
                    record.expand_ends();
                    continue;
                }
                Record => {
                    record.set_len(endlen);
                    self.state.after_cr = self.state.crlf && last == Some(b'\r');
                    self.finish_record(start);
                    if let Some(kind) = self.core.take_recovered() {
                        let pos = &self.state.last_pos;
                        debug!(
                            record = pos.record(),
                            line = pos.line(),
                            byte = pos.byte(),
                            "recovered from malformed CSV: {}",
                            kind
                        );
                    }
                    return Ok(true);
                }
                Malformed(kind) => {
                    self.finish_record(start.clone());
                    let pos = start;
                    return Err(Error::new(ErrorKind::Malformed { pos, kind }));
                }
                End => {
                    trace!(
                        records = self.state.cur_pos.record(),
                        bytes = self.state.cur_pos.byte(),
                        "reached end of CSV data"
                    );
                    self.state.eof = true;
                    return Ok(false);
                }
            }
        }
    }

    /// Consume what is left of a record that was rejected or abandoned.
    fn skip_dropped_record(&mut self) -> io::Result<()> {
        while self.core.in_recovery() {
            fill_buf(&mut self.rdr)?;
            let input = self.rdr.buffer();
            if input.is_empty() {
                return Ok(());
            }
            let nin = self.core.skip_recovery(input);
            let last = input[nin - 1];
            self.rdr.consume(nin);
            let byte = self.state.cur_pos.byte();
            self.state.cur_pos.set_byte(byte + nin as u64);
            self.state.cur_pos.set_line(self.core.line());
            self.state.after_cr = self.state.crlf && last == b'\r';
        }
        Ok(())
    }

    /// Give up on the record starting at `start` after an I/O error.
    ///
    /// The next read skips the rest of it, if any of it was parsed.
    fn abandon_record(&mut self, start: Position) {
        if self.core.discard_record() {
            debug!(
                record = start.record(),
                line = start.line(),
                byte = start.byte(),
                "dropping CSV record interrupted by an I/O error"
            );
            self.finish_record(start);
        }
    }

    /// Note that a record starting at `start` was just read or rejected.
    fn finish_record(&mut self, start: Position) {
        self.state.last_pos = start;
        let next = self.state.cur_pos.record() + 1;
        self.state.cur_pos.set_record(next);
    }

    /// Return the position of the most recently read record.
    ///
    /// Before any record is read, this is the start position: byte `0`,
    /// line `1`, record `0`.
    ///
    /// # Example
    ///
    /// ```
    /// use plaincsv::{Reader, StringRecord};
    ///
    /// let data = "a,b\nc,d\n";
    /// let mut rdr = Reader::from_reader(data.as_bytes());
    /// let mut record = StringRecord::new();
    ///
    /// rdr.read_record(&mut record)?;
    /// rdr.read_record(&mut record)?;
    /// let pos = rdr.position();
    /// assert_eq!(pos.byte(), 4);
    /// assert_eq!(pos.line(), 2);
    /// assert_eq!(pos.record(), 1);
    /// # Ok::<(), plaincsv::Error>(())
    /// ```
    pub fn position(&self) -> &Position {
        &self.state.last_pos
    }

    /// Returns true if and only if this reader has been exhausted.
    ///
    /// When this returns true, no more records can be read from this
    /// reader.
    pub fn is_done(&self) -> bool {
        self.state.eof
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.rdr.get_ref()
    }

    /// Returns a mutable reference to the underlying reader.
    ///
    /// Note that reading from the underlying reader directly skips over
    /// data buffered by this reader.
    pub fn get_mut(&mut self) -> &mut R {
        self.rdr.get_mut()
    }

    /// Unwraps this CSV reader, returning the underlying reader.
    ///
    /// Note that any leftover data inside this reader's internal buffer is
    /// lost.
    pub fn into_inner(self) -> R {
        self.rdr.into_inner()
    }
}

/// Fill the buffer of `rdr` if it is empty, retrying interrupted reads.
fn fill_buf<R: io::Read>(rdr: &mut io::BufReader<R>) -> io::Result<()> {
    loop {
        match rdr.fill_buf() {
            Ok(_) => return Ok(()),
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
}

/// An owned iterator over records as strings.
pub struct StringRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: StringRecord,
}

impl<R: io::Read> StringRecordsIntoIter<R> {
    fn new(rdr: Reader<R>) -> StringRecordsIntoIter<R> {
        StringRecordsIntoIter { rdr, rec: StringRecord::new() }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for StringRecordsIntoIter<R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        match self.rdr.read_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// A borrowed iterator over records as strings.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct StringRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: StringRecord,
}

impl<'r, R: io::Read> StringRecordsIter<'r, R> {
    fn new(rdr: &'r mut Reader<R>) -> StringRecordsIter<'r, R> {
        StringRecordsIter { rdr, rec: StringRecord::new() }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }
}

impl<'r, R: io::Read> Iterator for StringRecordsIter<'r, R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        match self.rdr.read_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// An owned iterator over records as raw bytes.
pub struct ByteRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: ByteRecord,
}

impl<R: io::Read> ByteRecordsIntoIter<R> {
    fn new(rdr: Reader<R>) -> ByteRecordsIntoIter<R> {
        ByteRecordsIntoIter { rdr, rec: ByteRecord::new() }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for ByteRecordsIntoIter<R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        match self.rdr.read_byte_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// A borrowed iterator over records as raw bytes.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct ByteRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: ByteRecord,
}

impl<'r, R: io::Read> ByteRecordsIter<'r, R> {
    fn new(rdr: &'r mut Reader<R>) -> ByteRecordsIter<'r, R> {
        ByteRecordsIter { rdr, rec: ByteRecord::new() }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }
}

impl<'r, R: io::Read> Iterator for ByteRecordsIter<'r, R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        match self.rdr.read_byte_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}
