use std::fmt;
use std::iter::FromIterator;
use std::ops;
use std::result;
use std::str;

use crate::byte_record::{ByteRecord, ByteRecordIter};
use crate::error::FromUtf8Error;

/// A single CSV record stored as valid UTF-8 bytes.
///
/// A string record permits reading or writing CSV rows that are valid
/// UTF-8. If string records are used to read CSV data that is not valid
/// UTF-8, then the CSV reader will return an invalid UTF-8 error. If you
/// do need to read possibly invalid UTF-8 data, then you should prefer
/// using a `ByteRecord`, since it makes no assumptions about UTF-8.
#[derive(Clone, Eq)]
pub struct StringRecord(ByteRecord);

impl PartialEq for StringRecord {
    fn eq(&self, other: &StringRecord) -> bool {
        self.0 == other.0
    }
}

impl<T: AsRef<[u8]>> PartialEq<[T]> for StringRecord {
    fn eq(&self, other: &[T]) -> bool {
        self.0 == *other
    }
}

impl<T: AsRef<[u8]>> PartialEq<Vec<T>> for StringRecord {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.0 == *other
    }
}

impl fmt::Debug for StringRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fields: Vec<&str> = self.iter().collect();
        write!(f, "StringRecord({:?})", fields)
    }
}

impl Default for StringRecord {
    #[inline]
    fn default() -> StringRecord {
        StringRecord::new()
    }
}

impl StringRecord {
    /// Create a new empty `StringRecord`.
    ///
    /// # Example
    ///
    /// ```
    /// use plaincsv::StringRecord;
    ///
    /// let record = StringRecord::from(vec!["a", "b", "c"]);
    /// assert_eq!(record.len(), 3);
    /// ```
    #[inline]
    pub fn new() -> StringRecord {
        StringRecord(ByteRecord::new())
    }

    /// Create a new empty `StringRecord` with the given capacity.
    ///
    /// `buffer` refers to the capacity of the buffer used to store the
    /// actual row contents. `fields` refers to the number of fields one
    /// might expect to store.
    #[inline]
    pub fn with_capacity(buffer: usize, fields: usize) -> StringRecord {
        StringRecord(ByteRecord::with_capacity(buffer, fields))
    }

    /// Create a new `StringRecord` from a `ByteRecord`.
    ///
    /// Note that this does UTF-8 validation. If the given `ByteRecord` does
    /// not contain valid UTF-8, then this returns an error. The error
    /// includes the UTF-8 error and the original `ByteRecord`.
    ///
    /// # Example: invalid UTF-8
    ///
    /// ```
    /// use plaincsv::{ByteRecord, StringRecord};
    ///
    /// let byte_record = ByteRecord::from(vec![&b"quux"[..], &b"foo\xFFbar"[..]]);
    /// let err = StringRecord::from_byte_record(byte_record).unwrap_err();
    /// assert_eq!(err.utf8_error().field(), 1);
    /// assert_eq!(err.utf8_error().valid_up_to(), 3);
    /// ```
    #[inline]
    pub fn from_byte_record(
        record: ByteRecord,
    ) -> result::Result<StringRecord, FromUtf8Error> {
        match record.validate() {
            Ok(()) => Ok(StringRecord(record)),
            Err(err) => Err(FromUtf8Error::new(record, err)),
        }
    }

    /// Returns an iterator over all fields in this record.
    #[inline]
    pub fn iter(&self) -> StringRecordIter {
        self.into_iter()
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    #[inline]
    pub fn get(&self, i: usize) -> Option<&str> {
        self.0.get(i).map(|bytes| {
            debug_assert!(str::from_utf8(bytes).is_ok());
            // SAFETY: every way of building or filling a `StringRecord`
            // validates its buffer as UTF-8, field by field.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }

    /// Returns true if and only if this record is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of fields in this record.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Clear this record so that it has zero fields.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Add a new field to this record.
    #[inline]
    pub fn push_field(&mut self, field: &str) {
        self.0.push_field(field.as_bytes());
    }

    /// Return the entire row as a single string slice. The slice returned
    /// stores all fields contiguously. The boundaries of each field are
    /// not determinable from this slice alone.
    #[inline]
    pub fn as_slice(&self) -> &str {
        let bytes = self.0.as_slice();
        debug_assert!(str::from_utf8(bytes).is_ok());
        // SAFETY: the concatenation of valid UTF-8 fields is valid UTF-8.
        unsafe { str::from_utf8_unchecked(bytes) }
    }

    /// Return a reference to this record's raw `ByteRecord`.
    #[inline]
    pub fn as_byte_record(&self) -> &ByteRecord {
        &self.0
    }

    /// Convert this `StringRecord` into a `ByteRecord`.
    #[inline]
    pub fn into_byte_record(self) -> ByteRecord {
        self.0
    }

    /// Mutable access to the raw record, for readers that validate it
    /// afterwards.
    ///
    /// Callers must either leave the record valid UTF-8 or clear it.
    #[inline]
    pub(crate) fn as_byte_record_mut(&mut self) -> &mut ByteRecord {
        &mut self.0
    }
}

impl ops::Index<usize> for StringRecord {
    type Output = str;

    #[inline]
    fn index(&self, i: usize) -> &str {
        match self.get(i) {
            Some(field) => field,
            None => panic!(
                "field index {} out of bounds for record of {} fields",
                i,
                self.len()
            ),
        }
    }
}

impl<T: AsRef<str>> From<Vec<T>> for StringRecord {
    #[inline]
    fn from(xs: Vec<T>) -> StringRecord {
        StringRecord::from_iter(xs.into_iter())
    }
}

impl<'a, T: AsRef<str>> From<&'a [T]> for StringRecord {
    #[inline]
    fn from(xs: &'a [T]) -> StringRecord {
        StringRecord::from_iter(xs)
    }
}

impl<T: AsRef<str>> FromIterator<T> for StringRecord {
    #[inline]
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> StringRecord {
        let mut record = StringRecord::new();
        record.extend(iter);
        record
    }
}

impl<T: AsRef<str>> Extend<T> for StringRecord {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

impl<'a> IntoIterator for &'a StringRecord {
    type IntoIter = StringRecordIter<'a>;
    type Item = &'a str;

    #[inline]
    fn into_iter(self) -> StringRecordIter<'a> {
        StringRecordIter(self.0.iter())
    }
}

/// An iterator over the fields in a string record.
///
/// The `'r` lifetime variable refers to the lifetime of the `StringRecord`
/// that is being iterated over.
#[derive(Clone)]
pub struct StringRecordIter<'r>(ByteRecordIter<'r>);

impl<'r> Iterator for StringRecordIter<'r> {
    type Item = &'r str;

    #[inline]
    fn next(&mut self) -> Option<&'r str> {
        self.0.next().map(|bytes| {
            // SAFETY: see `StringRecord::get`.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'r> DoubleEndedIterator for StringRecordIter<'r> {
    #[inline]
    fn next_back(&mut self) -> Option<&'r str> {
        self.0.next_back().map(|bytes| {
            // SAFETY: see `StringRecord::get`.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::StringRecord;

    #[test]
    fn push_and_get() {
        let mut rec = StringRecord::new();
        rec.push_field("héllo");
        rec.push_field("");
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.get(0), Some("héllo"));
        assert_eq!(rec.get(1), Some(""));
        assert_eq!(rec.get(2), None);
        assert_eq!(&rec[0], "héllo");
        assert_eq!(rec.as_slice(), "héllo");
    }

    #[test]
    fn compares_with_vectors() {
        let rec = StringRecord::from(vec!["a", "b,c"]);
        assert_eq!(rec, vec!["a", "b,c"]);
        assert_eq!(rec, StringRecord::from(&["a", "b,c"][..]));
        assert_ne!(rec, StringRecord::from(vec!["ab", ",c"]));
    }

    #[test]
    fn debug_lists_fields() {
        let rec = StringRecord::from(vec!["a", "b\"c"]);
        assert_eq!(format!("{:?}", rec), r#"StringRecord(["a", "b\"c"])"#);
    }

    #[test]
    fn collect_from_strings() {
        let rec: StringRecord =
            vec!["x".to_string(), "y".to_string()].into_iter().collect();
        let back: Vec<&str> = rec.iter().rev().collect();
        assert_eq!(back, vec!["y", "x"]);
    }

    #[test]
    fn converts_to_byte_record() {
        let rec = StringRecord::from(vec!["a", "b"]);
        assert_eq!(rec.as_byte_record(), &vec!["a", "b"][..]);
        assert_eq!(rec.into_byte_record(), vec!["a", "b"]);
    }
}
