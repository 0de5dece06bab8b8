/*!
The `plaincsv` crate provides a streaming CSV reader and writer.

The reader parses any `std::io::Read` into rows of fields, one row at a
time, holding only the current row in memory. The writer turns rows back
into CSV, quoting exactly the fields that need it. Output of the writer can
always be fed back into the reader to get the same fields back.

Both sit on top of the `plaincsv-core` state machines, which do the actual
parsing and quoting on byte buffers.

# Reading

```
let data = "\
city,note
Boston,\"cold, windy\"
\"São Paulo\",\"said \"\"hi\"\"\"
";
let mut rdr = plaincsv::Reader::from_reader(data.as_bytes());
let mut rows = vec![];
for result in rdr.records() {
    let record = result?;
    rows.push(record.iter().map(|f| f.to_string()).collect::<Vec<_>>());
}
assert_eq!(rows[1], vec!["Boston", "cold, windy"]);
assert_eq!(rows[2], vec!["São Paulo", "said \"hi\""]);
# Ok::<(), plaincsv::Error>(())
```

# Writing

```
let mut wtr = plaincsv::Writer::from_writer(vec![]);
wtr.write_record(&["a", "b,c", "line1\nline2"])?;
wtr.serialize(("x", 42, 1.5, None::<u8>))?;
let data = String::from_utf8(wtr.into_inner()?).unwrap();
assert_eq!(data, "a,\"b,c\",\"line1\nline2\"\nx,42,1.5,\n");
# Ok::<(), Box<dyn std::error::Error>>(())
```

# Lenient and strict parsing

Malformed quoting, such as a quoted field that is never closed, is
accepted by default and the reader recovers the best parse it can. Each
recovery is logged as a `tracing` event at debug level. Building a reader
with `ReaderBuilder::strict` turns these recoveries into
`ErrorKind::Malformed` errors.
*/

#![deny(missing_docs)]

pub use plaincsv_core::{ConfigError, MalformedKind, Terminator};

pub use crate::byte_record::{ByteRecord, ByteRecordIter, Position};
pub use crate::error::{
    Error, ErrorKind, FromUtf8Error, IntoInnerError, Result, Utf8Error,
};
pub use crate::reader::{
    ByteRecordsIntoIter, ByteRecordsIter, Reader, ReaderBuilder,
    StringRecordsIntoIter, StringRecordsIter,
};
pub use crate::string_record::{StringRecord, StringRecordIter};
pub use crate::writer::{Writer, WriterBuilder};

mod byte_record;
mod error;
mod reader;
mod serializer;
mod string_record;
mod writer;
