use crate::batch::LocationRecord;
use std::fmt;
use std::ops::Range;

/// Byte span of one payload inside a batch object.
///
/// Renders as an HTTP range header value, `bytes=<first>-<last>`, where the
/// last byte is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    offset: u64,
    length: u64,
}

impl ByteRange {
    /// `None` if `offset + length` does not fit in a u64.
    pub fn new(offset: u64, length: u64) -> Option<Self> {
        offset.checked_add(length)?;
        Some(Self { offset, length })
    }

    pub fn for_record(record: &LocationRecord) -> Option<Self> {
        Self::new(record.offset, record.length)
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Inclusive end, `None` for an empty range.
    pub fn last(&self) -> Option<u64> {
        if self.length == 0 {
            None
        } else {
            Some(self.offset + self.length - 1)
        }
    }

    /// Half-open form used by object store range reads.
    pub fn as_range(&self) -> Range<u64> {
        self.offset..self.offset + self.length
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last() {
            Some(last) => write!(f, "bytes={}-{}", self.offset, last),
            None => write!(f, "bytes={}-(empty)", self.offset),
        }
    }
}
