//! Value locations and segment lifecycle states.

use std::fmt;

/// Location of a value inside a segment's logical byte stream.
///
/// The stream is the backing file followed by the unflushed write buffer, so an
/// `offset` at or past the file length addresses buffered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionDescriptor {
    /// Byte offset of the first byte of the value.
    pub offset: u64,
    /// Length of the value in bytes.
    pub length: u32,
}

impl PositionDescriptor {
    /// Descriptor for a key whose value is explicitly null.
    ///
    /// Distinct from a missing key, which has no descriptor at all.
    pub const NULL: Self = Self {
        offset: 0,
        length: 0,
    };

    /// Creates a descriptor.
    #[must_use]
    pub const fn new(offset: u64, length: u32) -> Self {
        Self { offset, length }
    }

    /// Returns true for the null sentinel.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.length == 0
    }

    /// Offset one past the last byte of the value.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.length as u64
    }
}

/// Lifecycle state of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentStatus {
    /// Accepting reads and writes.
    #[default]
    Normal,
    /// Rewriting live data into a fresh file.
    Compacting,
    /// Terminal; the backing file has been deleted.
    Closed,
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Compacting => "compacting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_descriptor() {
        assert!(PositionDescriptor::NULL.is_null());
        assert!(!PositionDescriptor::new(0, 1).is_null());
        assert_eq!(PositionDescriptor::NULL.end(), 0);
    }

    #[test]
    fn descriptor_end() {
        let pd = PositionDescriptor::new(100, 28);
        assert_eq!(pd.end(), 128);
    }

    #[test]
    fn status_default_and_display() {
        assert_eq!(SegmentStatus::default(), SegmentStatus::Normal);
        assert_eq!(SegmentStatus::Compacting.to_string(), "compacting");
    }
}
