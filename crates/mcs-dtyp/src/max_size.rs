//! Storage capacity bounds.

use binrw::prelude::*;

use crate::memory::Size;
use crate::read::{Read, ReadError, State};

/// A capacity that is either bounded or unlimited.
///
/// Ordered so that every [`Size`] compares less than or equal to
/// `Unlimited`.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[brw(little)]
pub enum MaxSize {
    #[brw(magic = 0u8)]
    Unlimited,
    #[brw(magic = 1u8)]
    Limit(Size),
}

impl MaxSize {
    /// The bound, for bounded capacities.
    pub fn limit(self) -> Option<Size> {
        match self {
            MaxSize::Unlimited => None,
            MaxSize::Limit(size) => Some(size),
        }
    }

    pub fn admits(self, size: Size) -> bool {
        match self {
            MaxSize::Unlimited => true,
            MaxSize::Limit(limit) => size <= limit,
        }
    }

    /// Capacity remaining after `used` bytes, saturating at zero.
    pub fn remaining(self, used: Size) -> MaxSize {
        match self {
            MaxSize::Unlimited => MaxSize::Unlimited,
            MaxSize::Limit(limit) if used >= limit => MaxSize::Limit(Size::ZERO),
            MaxSize::Limit(limit) => MaxSize::Limit(limit - used),
        }
    }
}

impl PartialOrd for MaxSize {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaxSize {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (MaxSize::Unlimited, MaxSize::Unlimited) => Ordering::Equal,
            (MaxSize::Unlimited, MaxSize::Limit(_)) => Ordering::Greater,
            (MaxSize::Limit(_), MaxSize::Unlimited) => Ordering::Less,
            (MaxSize::Limit(a), MaxSize::Limit(b)) => a.cmp(b),
        }
    }
}

impl PartialEq<MaxSize> for Size {
    fn eq(&self, other: &MaxSize) -> bool {
        matches!(other, MaxSize::Limit(limit) if limit == self)
    }
}

impl PartialOrd<MaxSize> for Size {
    fn partial_cmp(&self, other: &MaxSize) -> Option<std::cmp::Ordering> {
        match other {
            MaxSize::Unlimited => Some(std::cmp::Ordering::Less),
            MaxSize::Limit(limit) => self.partial_cmp(limit),
        }
    }
}

impl From<Size> for MaxSize {
    fn from(size: Size) -> Self {
        MaxSize::Limit(size)
    }
}

impl std::fmt::Display for MaxSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxSize::Unlimited => write!(f, "unlimited"),
            MaxSize::Limit(size) => write!(f, "{size}"),
        }
    }
}

impl Read for MaxSize {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        if state.maybe_prefix("unlimited") {
            Ok(MaxSize::Unlimited)
        } else {
            Ok(MaxSize::Limit(<Size as Read>::read(state)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read;

    #[test]
    fn any_size_is_at_most_unlimited() {
        assert!(Size::new(u64::MAX) < MaxSize::Unlimited);
        assert!(MaxSize::Limit(Size::new(u64::MAX)) < MaxSize::Unlimited);
        assert!(Size::new(5) > MaxSize::Limit(Size::new(4)));
        assert!(Size::new(4) == MaxSize::Limit(Size::new(4)));
    }

    #[test]
    fn remaining_saturates() {
        let max = MaxSize::Limit(Size::new(10));
        assert_eq!(max.remaining(Size::new(4)), MaxSize::Limit(Size::new(6)));
        assert_eq!(max.remaining(Size::new(12)), MaxSize::Limit(Size::ZERO));
        assert_eq!(MaxSize::Unlimited.remaining(Size::new(12)), MaxSize::Unlimited);
    }

    #[test]
    fn read_of_fmt_is_identity() {
        for max in [MaxSize::Unlimited, MaxSize::Limit(Size::new(4096))] {
            assert_eq!(read::read::<MaxSize>(&max.to_string()).unwrap(), max);
        }
    }
}
