//! Block identifiers and counts.

use binrw::prelude::*;
use thiserror::Error;

use mcs_dtyp::read::{Read, ReadError, State};

/// Identifies one block of a block device.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[brw(little)]
pub struct Id(u64);

impl Id {
    pub const fn new(value: u64) -> Self {
        Id(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bi_{}", self.0)
    }
}

impl Read for Id {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        state.prefix("bi_")?;
        Ok(Id(state.uint()?))
    }
}

/// Bytes per block.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[brw(little)]
pub struct Size(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a block size must not be zero")]
pub struct MustNotBeZero;

impl Size {
    pub fn new(value: u64) -> Result<Self, MustNotBeZero> {
        if value == 0 {
            return Err(MustNotBeZero);
        }
        Ok(Size(value))
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Read for Size {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        let value = state.uint()?;
        Size::new(value).map_err(|e| state.error(e.to_string()))
    }
}

/// A number of blocks.
#[derive(
    BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[brw(little)]
pub struct Count(u64);

impl Count {
    pub const fn new(value: u64) -> Self {
        Count(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Count {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Read for Count {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        Ok(Count(state.uint()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("begin {begin} must be smaller than end {end}")]
pub struct BeginMustBeSmallerThanEnd {
    pub begin: Id,
    pub end: Id,
}

/// A non-empty half-open range of block ids.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[brw(little)]
pub struct Range {
    begin: Id,
    end: Id,
}

impl Range {
    pub fn new(begin: Id, end: Id) -> Result<Self, BeginMustBeSmallerThanEnd> {
        if begin >= end {
            return Err(BeginMustBeSmallerThanEnd { begin, end });
        }
        Ok(Range { begin, end })
    }

    pub const fn begin(self) -> Id {
        self.begin
    }

    pub const fn end(self) -> Id {
        self.end
    }

    pub fn count(self) -> Count {
        Count(self.end.0 - self.begin.0)
    }

    pub fn contains(self, id: Id) -> bool {
        self.begin <= id && id < self.end
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

impl Read for Range {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        state.prefix("[")?;
        let begin = <Id as Read>::read(state)?;
        state.prefix(", ")?;
        let end = <Id as Read>::read(state)?;
        state.prefix(")")?;
        Range::new(begin, end).map_err(|e| state.error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::read;

    #[test]
    fn block_ranges_must_not_be_empty() {
        assert!(Range::new(Id::new(3), Id::new(3)).is_err());
        assert!(Range::new(Id::new(4), Id::new(3)).is_err());
        assert!(Range::new(Id::new(3), Id::new(4)).is_ok());
    }

    #[test]
    fn block_sizes_must_not_be_zero() {
        assert_eq!(Size::new(0), Err(MustNotBeZero));
        assert!(read::read::<Size>("0").is_err());
    }

    #[test]
    fn read_of_fmt_is_identity() {
        let range = Range::new(Id::new(2), Id::new(18)).unwrap();
        assert_eq!(range.to_string(), "[bi_2, bi_18)");
        assert_eq!(read::read::<Range>(&range.to_string()).unwrap(), range);
        assert_eq!(read::read::<Id>("bi_7").unwrap(), Id::new(7));
        assert_eq!(read::read::<Count>("12").unwrap(), Count::new(12));
    }
}
