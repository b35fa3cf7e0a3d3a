//! Offsets, sizes and half-open ranges over backing memory.

use binrw::prelude::*;
use thiserror::Error;

use crate::read::{self, Read, ReadError, State};

/// A byte offset into a segment.
#[derive(
    BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[brw(little)]
pub struct Offset(u64);

impl Offset {
    pub const ZERO: Offset = Offset(0);

    pub const fn new(value: u64) -> Self {
        Offset(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

/// A byte count.
#[derive(
    BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[brw(little)]
pub struct Size(u64);

impl Size {
    pub const ZERO: Size = Size(0);

    pub const fn new(value: u64) -> Self {
        Size(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub const fn of<T>(count: u64) -> Self {
        Size(count * size_of::<T>() as u64)
    }
}

impl std::ops::Add<Size> for Offset {
    type Output = Offset;
    fn add(self, rhs: Size) -> Offset {
        Offset(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign<Size> for Offset {
    fn add_assign(&mut self, rhs: Size) {
        self.0 += rhs.0;
    }
}

/// Distance between two offsets; panics in debug builds when reversed.
impl std::ops::Sub<Offset> for Offset {
    type Output = Size;
    fn sub(self, rhs: Offset) -> Size {
        Size(self.0 - rhs.0)
    }
}

impl std::ops::Add for Size {
    type Output = Size;
    fn add(self, rhs: Size) -> Size {
        Size(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Size {
    fn add_assign(&mut self, rhs: Size) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Size {
    type Output = Size;
    fn sub(self, rhs: Size) -> Size {
        Size(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Size {
    fn sub_assign(&mut self, rhs: Size) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Size {
    fn sum<I: Iterator<Item = Size>>(iter: I) -> Size {
        iter.fold(Size::ZERO, |acc, s| acc + s)
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Read for Offset {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        Ok(Offset(state.uint()?))
    }
}

impl Read for Size {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        Ok(Size(state.uint()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("begin {begin} must not be larger than end {end}")]
    BeginMustNotBeLargerThanEnd { begin: Offset, end: Offset },
}

/// Half-open byte range `[begin, end)`; only constructible with
/// `begin <= end`.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[brw(little)]
pub struct Range {
    begin: Offset,
    end: Offset,
}

impl Range {
    pub fn new(begin: Offset, end: Offset) -> Result<Self, RangeError> {
        if begin > end {
            return Err(RangeError::BeginMustNotBeLargerThanEnd { begin, end });
        }
        Ok(Range { begin, end })
    }

    pub fn at(begin: Offset, size: Size) -> Self {
        Range {
            begin,
            end: begin + size,
        }
    }

    pub const fn begin(self) -> Offset {
        self.begin
    }

    pub const fn end(self) -> Offset {
        self.end
    }

    pub fn size(self) -> Size {
        self.end - self.begin
    }

    pub fn contains(self, other: Range) -> bool {
        self.begin <= other.begin && other.end <= self.end
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
        let begin = <Offset as Read>::read(state)?;
        state.prefix(", ")?;
        let end = <Offset as Read>::read(state)?;
        state.prefix(")")?;
        Range::new(begin, end).map_err(|e| state.error(e.to_string()))
    }
}

/// Selects `range` out of `bytes`.
///
/// The caller guarantees the range lies within the slice.
pub fn select(bytes: &[u8], range: Range) -> &[u8] {
    &bytes[range.begin().value() as usize..range.end().value() as usize]
}

pub fn select_mut(bytes: &mut [u8], range: Range) -> &mut [u8] {
    &mut bytes[range.begin().value() as usize..range.end().value() as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rejects_reversed_bounds() {
        let err = Range::new(Offset::new(2), Offset::new(1)).unwrap_err();
        assert_eq!(
            err,
            RangeError::BeginMustNotBeLargerThanEnd {
                begin: Offset::new(2),
                end: Offset::new(1),
            }
        );
    }

    #[test]
    fn range_allows_empty() {
        let range = Range::new(Offset::new(7), Offset::new(7)).unwrap();
        assert_eq!(range.size(), Size::ZERO);
    }

    #[test]
    fn read_of_fmt_is_identity() {
        for range in [
            Range::at(Offset::ZERO, Size::new(0)),
            Range::at(Offset::new(5), Size::new(50)),
            Range::at(Offset::new(55), Size::new(245)),
        ] {
            assert_eq!(read::read::<Range>(&range.to_string()).unwrap(), range);
        }
    }

    #[test]
    fn read_rejects_reversed_range_text() {
        assert!(read::read::<Range>("[3, 1)").is_err());
    }

    #[test]
    fn select_takes_the_subslice() {
        let bytes = [0u8, 1, 2, 3, 4];
        let range = Range::at(Offset::new(1), Size::new(3));
        assert_eq!(select(&bytes, range), &[1, 2, 3]);
    }
}
