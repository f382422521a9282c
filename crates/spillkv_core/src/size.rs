//! Human-readable byte sizes.
//!
//! Sizes are written as an integer with an optional unit suffix: `b`, `k`, `m`
//! or `g` (any case), each a power of 1024. A bare number is a byte count.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::str::FromStr;

/// Unit of a byte size literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SizeUnit {
    /// Bytes (`b`).
    Bytes,
    /// 1024 bytes (`k`).
    Kilobytes,
    /// 1024 kilobytes (`m`).
    Megabytes,
    /// 1024 megabytes (`g`).
    Gigabytes,
}

impl SizeUnit {
    const ALL: [Self; 4] = [
        Self::Gigabytes,
        Self::Megabytes,
        Self::Kilobytes,
        Self::Bytes,
    ];

    /// Number of bytes in one unit.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Bytes => 1,
            Self::Kilobytes => 1 << 10,
            Self::Megabytes => 1 << 20,
            Self::Gigabytes => 1 << 30,
        }
    }

    /// Suffix character.
    #[must_use]
    pub const fn suffix(self) -> char {
        match self {
            Self::Bytes => 'b',
            Self::Kilobytes => 'k',
            Self::Megabytes => 'm',
            Self::Gigabytes => 'g',
        }
    }

    /// Looks up a unit by suffix, ignoring case.
    #[must_use]
    pub fn from_suffix(c: char) -> Option<Self> {
        let c = c.to_ascii_lowercase();
        Self::ALL.into_iter().find(|u| u.suffix() == c)
    }

    /// Converts `amount` of this unit to bytes, or `None` on overflow.
    #[must_use]
    pub const fn to_bytes(self, amount: u64) -> Option<u64> {
        amount.checked_mul(self.bytes())
    }
}

/// A byte count that parses from and prints as a size literal.
///
/// # Example
///
/// ```rust
/// use spillkv_core::ByteSize;
///
/// let size: ByteSize = "64k".parse().unwrap();
/// assert_eq!(size.as_u64(), 65_536);
/// assert_eq!(size.to_string(), "64k");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Creates a size from a byte count.
    #[must_use]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// `n` kibibytes.
    #[must_use]
    pub const fn kib(n: u64) -> Self {
        Self(n * SizeUnit::Kilobytes.bytes())
    }

    /// `n` mebibytes.
    #[must_use]
    pub const fn mib(n: u64) -> Self {
        Self(n * SizeUnit::Megabytes.bytes())
    }

    /// `n` gibibytes.
    #[must_use]
    pub const fn gib(n: u64) -> Self {
        Self(n * SizeUnit::Gigabytes.bytes())
    }

    /// Returns the byte count.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Parses a size literal.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSize` for empty input, a non-numeric amount, an unknown
    /// suffix, or a size that overflows `u64`.
    pub fn parse(input: &str) -> CoreResult<Self> {
        let trimmed = input.trim();
        let Some(last) = trimmed.chars().last() else {
            return Err(CoreError::invalid_size(input, "empty size"));
        };

        let (amount, unit) = if last.is_ascii_digit() {
            (trimmed, SizeUnit::Bytes)
        } else {
            let unit = SizeUnit::from_suffix(last).ok_or_else(|| {
                CoreError::invalid_size(input, format!("unknown unit suffix '{last}'"))
            })?;
            (trimmed[..trimmed.len() - last.len_utf8()].trim_end(), unit)
        };

        let amount: u64 = amount
            .parse()
            .map_err(|e| CoreError::invalid_size(input, format!("bad amount: {e}")))?;

        unit.to_bytes(amount)
            .map(Self)
            .ok_or_else(|| CoreError::invalid_size(input, "size overflows u64"))
    }
}

impl FromStr for ByteSize {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> Self {
        size.0
    }
}

impl fmt::Display for ByteSize {
    /// Prints the size in the largest unit that divides it exactly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("0");
        }
        let unit = SizeUnit::ALL
            .into_iter()
            .find(|u| self.0 % u.bytes() == 0)
            .unwrap_or(SizeUnit::Bytes);
        match unit {
            SizeUnit::Bytes => write!(f, "{}", self.0),
            _ => write!(f, "{}{}", self.0 / unit.bytes(), unit.suffix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(ByteSize::parse("512").unwrap().as_u64(), 512);
        assert_eq!(ByteSize::parse("512b").unwrap().as_u64(), 512);
        assert_eq!(ByteSize::parse("64k").unwrap(), ByteSize::kib(64));
        assert_eq!(ByteSize::parse("50M").unwrap(), ByteSize::mib(50));
        assert_eq!(ByteSize::parse("2g").unwrap(), ByteSize::gib(2));
    }

    #[test]
    fn tolerates_whitespace() {
        assert_eq!(ByteSize::parse(" 10 m ").unwrap(), ByteSize::mib(10));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            ByteSize::parse(""),
            Err(CoreError::InvalidSize { .. })
        ));
        assert!(ByteSize::parse("12t").is_err());
        assert!(ByteSize::parse("k").is_err());
        assert!(ByteSize::parse("-5k").is_err());
        assert!(ByteSize::parse("99999999999999g").is_err());
    }

    #[test]
    fn display_uses_largest_exact_unit() {
        assert_eq!(ByteSize::mib(50).to_string(), "50m");
        assert_eq!(ByteSize::new(1536).to_string(), "1536");
        assert_eq!(ByteSize::new(2048).to_string(), "2k");
        assert_eq!(ByteSize::new(0).to_string(), "0");
        assert_eq!(ByteSize::gib(1).to_string(), "1g");
    }

    #[test]
    fn display_parses_back() {
        for size in [ByteSize::new(7), ByteSize::kib(3), ByteSize::mib(50)] {
            assert_eq!(size.to_string().parse::<ByteSize>().unwrap(), size);
        }
    }

    #[test]
    fn unit_lookup_ignores_case() {
        assert_eq!(SizeUnit::from_suffix('K'), Some(SizeUnit::Kilobytes));
        assert_eq!(SizeUnit::from_suffix('x'), None);
    }
}
