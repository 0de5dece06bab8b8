use std::cmp;
use std::io;
use std::mem;
use std::result;

use plaincsv_core::{
    Terminator, WriteResult, Writer as CoreWriter,
    WriterBuilder as CoreWriterBuilder,
};
use serde::Serialize;
use tracing::{debug, trace};

use crate::byte_record::ByteRecord;
use crate::error::{Error, IntoInnerError, Result};
use crate::serializer::serialize;

/// The default capacity of the output buffer.
const DEFAULT_CAPACITY: usize = 8 * (1 << 10);

/// Builds a CSV writer with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, record
/// terminator and more. Once a CSV `Writer` is built, its configuration
/// cannot be changed.
#[derive(Debug)]
pub struct WriterBuilder {
    builder: CoreWriterBuilder,
    capacity: usize,
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder {
            builder: CoreWriterBuilder::default(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl WriterBuilder {
    /// Create a new builder for configuring CSV writing.
    ///
    /// To convert a builder into a writer, call `from_writer`.
    ///
    /// # Example
    ///
    /// ```
    /// use plaincsv::{Terminator, WriterBuilder};
    ///
    /// let mut wtr = WriterBuilder::new()
    ///     .delimiter(b';')
    ///     .terminator(Terminator::CRLF)
    ///     .from_writer(vec![])?;
    /// wtr.write_record(&["a", "b;c"])?;
    ///
    /// let data = String::from_utf8(wtr.into_inner()?)?;
    /// assert_eq!(data, "a;\"b;c\"\r\n");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Build a CSV writer from this configuration that writes data to
    /// `wtr`.
    ///
    /// Note that the CSV writer is buffered automatically, so you should
    /// not wrap `wtr` in a buffered writer like `io::BufWriter`.
    ///
    /// This returns an `ErrorKind::Config` error under the same conditions
    /// as `ReaderBuilder::from_reader`.
    pub fn from_writer<W: io::Write>(&self, wtr: W) -> Result<Writer<W>> {
        let core = self.builder.build()?;
        Ok(Writer::new(core, self.capacity, wtr))
    }

    /// The field delimiter to use when writing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut WriterBuilder {
        self.builder.delimiter(delimiter);
        self
    }

    /// The record terminator to use when writing CSV.
    ///
    /// A record terminator can be any single ASCII byte. The default is
    /// `b'\n'`. Use `Terminator::CRLF` to write `\r\n`.
    pub fn terminator(&mut self, term: Terminator) -> &mut WriterBuilder {
        self.builder.terminator(term);
        self
    }

    /// The quote character to use when writing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut WriterBuilder {
        self.builder.quote(quote);
        self
    }

    /// Set the capacity (in bytes) of the internal buffer used in the CSV
    /// writer.
    ///
    /// A capacity smaller than two bytes is raised to two bytes, which is
    /// the size of the largest unit the writer emits at once (a doubled
    /// quote or `\r\n`).
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut WriterBuilder {
        self.capacity = capacity;
        self
    }
}

/// A CSV writer.
///
/// Each record is written as one line of CSV. A field is quoted only when
/// it contains the delimiter, the quote, `\r`, `\n` or a custom terminator
/// byte, and quotes inside it are doubled. Everything this writer produces
/// reads back into the same fields with a `Reader` of the same
/// configuration.
///
/// Note that the writer is buffered. Buffered data is written when the
/// buffer fills, when `flush` or `into_inner` is called and when the
/// writer is dropped. Errors on drop are ignored, so call `flush` to see
/// them.
///
/// When the underlying writer fails while a record is being written, the
/// record is dropped. If none of it had reached the underlying writer yet,
/// writing can go on with the next record. Otherwise the output ends in a
/// partial record and every later write fails.
///
/// # Example
///
/// ```
/// use plaincsv::Writer;
///
/// let mut wtr = Writer::from_writer(vec![]);
/// wtr.write_record(&["city", "note"])?;
/// wtr.write_record(&["Boston", "He said \"hi\""])?;
///
/// let data = String::from_utf8(wtr.into_inner()?)?;
/// assert_eq!(data, "city,note\nBoston,\"He said \"\"hi\"\"\"\n");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Writer<W: io::Write> {
    core: CoreWriter,
    wtr: Option<W>,
    buf: Buffer,
    state: WriterState,
}

#[derive(Debug)]
struct WriterState {
    /// Whether the inner writer panicked during the last write. If it did,
    /// nothing is flushed on drop.
    panicked: bool,
    /// Scratch space for `serialize`, reused across calls.
    record: ByteRecord,
    /// Whether a record has been started and not yet terminated.
    in_record: bool,
    /// Where the current record starts in the buffer. This is `None` once
    /// part of it has been handed to the inner writer.
    record_start: Option<usize>,
    /// Whether a partial record was left in the inner writer.
    broken: bool,
}

/// A simple internal buffer for buffering writes.
///
/// This is used instead of `io::BufWriter` because the core writer needs
/// direct access to the spare room in the buffer.
#[derive(Debug)]
struct Buffer {
    /// The contents of the buffer.
    buf: Vec<u8>,
    /// The number of bytes written to the buffer.
    len: usize,
}

impl<W: io::Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.wtr.is_some() && !self.state.panicked {
            let _ = self.flush();
        }
    }
}

impl<W: io::Write> Writer<W> {
    fn new(core: CoreWriter, capacity: usize, wtr: W) -> Writer<W> {
        Writer {
            core,
            wtr: Some(wtr),
            buf: Buffer { buf: vec![0; cmp::max(2, capacity)], len: 0 },
            state: WriterState {
                panicked: false,
                record: ByteRecord::new(),
                in_record: false,
                record_start: None,
                broken: false,
            },
        }
    }

    /// Build a CSV writer with a default configuration that writes data to
    /// `wtr`.
    ///
    /// To customize CSV writing, use a `WriterBuilder`.
    pub fn from_writer(wtr: W) -> Writer<W> {
        Writer::new(CoreWriter::new(), DEFAULT_CAPACITY, wtr)
    }

    /// Write a single record.
    ///
    /// This method accepts something that can be turned into an iterator
    /// that yields elements that can be represented by a `&[u8]`. Fields
    /// are written in order, followed by the record terminator. An empty
    /// iterator writes a blank line.
    pub fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for field in record {
            self.write_field(field)?;
        }
        self.write_record_end()
    }

    /// Write a single `ByteRecord`.
    pub fn write_byte_record(&mut self, record: &ByteRecord) -> Result<()> {
        self.write_record(record.iter())
    }

    /// Write each of the given records in turn.
    ///
    /// # Example
    ///
    /// ```
    /// use plaincsv::Writer;
    ///
    /// let mut wtr = Writer::from_writer(vec![]);
    /// wtr.write_records(vec![vec!["a", "b"], vec!["c", "d"]])?;
    /// assert_eq!(wtr.into_inner()?, b"a,b\nc,d\n");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn write_records<I, R, T>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Write a single field.
    ///
    /// One should prefer using `write_record` over this method. It is
    /// provided for cases where writing a field at a time is more
    /// convenient than writing a record at a time.
    ///
    /// Note that if this API is used, `write_record_end` must be called
    /// after writing all fields in a record.
    ///
    /// # Example
    ///
    /// ```
    /// use plaincsv::Writer;
    ///
    /// let mut wtr = Writer::from_writer(vec![]);
    /// wtr.write_field("a")?;
    /// wtr.write_field("b\nc")?;
    /// wtr.write_record_end()?;
    ///
    /// let data = String::from_utf8(wtr.into_inner()?)?;
    /// assert_eq!(data, "a,\"b\nc\"\n");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn write_field<T: AsRef<[u8]>>(&mut self, field: T) -> Result<()> {
        self.start_record()?;
        let mut field = field.as_ref();
        loop {
            let (res, nin, nout) = self.core.field(field, self.buf.writable());
            field = &field[nin..];
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_record()?,
            }
        }
    }

    /// Finish writing the current record.
    ///
    /// This writes the record terminator.
    pub fn write_record_end(&mut self) -> Result<()> {
        self.start_record()?;
        loop {
            let (res, nout) = self.core.terminator(self.buf.writable());
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => break,
                WriteResult::OutputFull => self.flush_record()?,
            }
        }
        self.state.in_record = false;
        self.state.record_start = None;
        Ok(())
    }

    /// Note where a new record starts, unless one is already in progress.
    fn start_record(&mut self) -> Result<()> {
        if self.state.broken {
            return Err(Error::from(io::Error::new(
                io::ErrorKind::Other,
                "CSV writer output ends in a partial record \
                 after an earlier write error",
            )));
        }
        if !self.state.in_record {
            self.state.in_record = true;
            self.state.record_start = Some(self.buf.len);
        }
        Ok(())
    }

    /// Flush the buffer in the middle of a record, dropping the record if
    /// that fails.
    fn flush_record(&mut self) -> Result<()> {
        if let Err(err) = self.flush_buf() {
            self.abandon_record();
            return Err(Error::from(err));
        }
        Ok(())
    }

    /// Drop the record being written after the inner writer failed.
    fn abandon_record(&mut self) {
        self.core.reset();
        self.state.in_record = false;
        match self.state.record_start.take() {
            Some(start) => self.buf.truncate(start),
            None => {
                // Everything left in the buffer belongs to this record.
                self.buf.clear();
                self.state.broken = true;
            }
        }
        debug!(
            partial = self.state.broken,
            "dropped CSV record after a write error"
        );
    }

    /// Serialize a single record using Serde.
    ///
    /// A struct, tuple or sequence becomes one record with one field per
    /// element. A scalar becomes a record with one field. Integers and
    /// floats are written in their shortest round trip form, booleans as
    /// `true` or `false`, and `None` or `()` as an empty field. Unit enum
    /// variants are written as their names.
    ///
    /// Maps, struct or tuple enum variants and containers nested inside a
    /// record are rejected with an `ErrorKind::Serialize` error. Nothing
    /// is written for a record that fails to serialize.
    ///
    /// # Example
    ///
    /// ```
    /// use plaincsv::Writer;
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Row<'a> {
    ///     city: &'a str,
    ///     population: u64,
    ///     area: Option<f64>,
    /// }
    ///
    /// let mut wtr = Writer::from_writer(vec![]);
    /// wtr.serialize(Row { city: "Boston", population: 650_000, area: Some(232.1) })?;
    /// wtr.serialize(Row { city: "Nowhere", population: 0, area: None })?;
    ///
    /// let data = String::from_utf8(wtr.into_inner()?)?;
    /// assert_eq!(data, "Boston,650000,232.1\nNowhere,0,\n");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn serialize<S: Serialize>(&mut self, record: S) -> Result<()> {
        let mut scratch = mem::take(&mut self.state.record);
        scratch.clear();
        let result = match serialize(&mut scratch, &record) {
            Ok(()) => self.write_byte_record(&scratch),
            Err(err) => Err(err),
        };
        self.state.record = scratch;
        result
    }

    /// Flush the contents of the internal buffer to the underlying writer.
    ///
    /// If there was a problem writing to the underlying writer, then an
    /// error is returned.
    ///
    /// Note that this also flushes the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        trace!(len = self.buf.len, "flushing CSV writer");
        self.flush_buf()?;
        match self.wtr {
            Some(ref mut wtr) => wtr.flush(),
            None => Ok(()),
        }
    }

    /// Flush the contents of the internal buffer to the underlying writer,
    /// without flushing the underlying writer.
    ///
    /// Bytes accepted by the underlying writer are removed from the buffer
    /// even when a later write fails.
    fn flush_buf(&mut self) -> io::Result<()> {
        let wtr = match self.wtr {
            Some(ref mut wtr) => wtr,
            None => return Ok(()),
        };
        let mut written = 0;
        let mut result = Ok(());
        while written < self.buf.len {
            self.state.panicked = true;
            let r = wtr.write(&self.buf.readable()[written..]);
            self.state.panicked = false;
            match r {
                Ok(0) => {
                    result = Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write the buffered CSV data",
                    ));
                    break;
                }
                Ok(n) => written += n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.buf.consume(written);
        if let Some(start) = self.state.record_start {
            self.state.record_start = start.checked_sub(written);
        }
        result
    }

    /// Return a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        match self.wtr {
            Some(ref wtr) => wtr,
            // Only `into_inner` takes the writer, and it consumes `self`.
            None => unreachable!("writer used after into_inner"),
        }
    }

    /// Flush the contents of the internal buffer and return the underlying
    /// writer.
    ///
    /// If the flush fails, the error is returned along with this writer,
    /// so that no buffered data is lost.
    pub fn into_inner(
        mut self,
    ) -> result::Result<W, IntoInnerError<Writer<W>>> {
        match self.flush() {
            Err(err) => Err(IntoInnerError::new(self, err)),
            Ok(()) => match self.wtr.take() {
                Some(wtr) => Ok(wtr),
                None => {
                    let err = io::Error::new(
                        io::ErrorKind::Other,
                        "CSV writer has no underlying writer",
                    );
                    Err(IntoInnerError::new(self, err))
                }
            },
        }
    }
}

impl Buffer {
    /// Returns a slice of the buffer's current contents.
    ///
    /// The slice returned may be empty.
    #[inline]
    fn readable(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Returns a mutable slice of the remaining space in this buffer.
    ///
    /// The slice returned may be empty.
    #[inline]
    fn writable(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// Indicates that `n` bytes have been written to this buffer.
    #[inline]
    fn written(&mut self, n: usize) {
        self.len += n;
    }

    /// Remove the first `n` bytes, keeping the rest.
    #[inline]
    fn consume(&mut self, n: usize) {
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Drop everything after the first `len` bytes.
    #[inline]
    fn truncate(&mut self, len: usize) {
        self.len = cmp::min(self.len, len);
    }

    /// Clear the buffer.
    #[inline]
    fn clear(&mut self) {
        self.len = 0;
    }
}
