//! Monotonically issued identifiers.

use binrw::prelude::*;

use crate::read::{Read, ReadError, State};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
        )]
        #[brw(little)]
        pub struct $name(u64);

        impl $name {
            pub const FIRST: $name = $name(0);

            pub const fn new(value: u64) -> Self {
                $name(value)
            }

            pub const fn value(self) -> u64 {
                self.0
            }

            /// Issues the next identifier, advancing `self`.
            pub fn issue(&mut self) -> $name {
                let issued = *self;
                self.0 += 1;
                issued
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl Read for $name {
            fn read(state: &mut State) -> Result<Self, ReadError> {
                state.prefix($prefix)?;
                Ok($name(state.uint()?))
            }
        }
    };
}

define_id!(
    /// Identifies a storage within a registry.
    StorageId,
    "bi_"
);
define_id!(
    /// Identifies a segment within its owning storage.
    SegmentId,
    "sg_"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read;

    #[test]
    fn issue_is_monotonic() {
        let mut next = SegmentId::FIRST;
        assert_eq!(next.issue(), SegmentId::new(0));
        assert_eq!(next.issue(), SegmentId::new(1));
        assert_eq!(next, SegmentId::new(2));
    }

    #[test]
    fn read_of_fmt_is_identity() {
        let id = StorageId::new(42);
        assert_eq!(id.to_string(), "bi_42");
        assert_eq!(read::read::<StorageId>("bi_42").unwrap(), id);
        let id = SegmentId::new(7);
        assert_eq!(id.to_string(), "sg_7");
        assert_eq!(read::read::<SegmentId>("sg_7").unwrap(), id);
    }

    #[test]
    fn read_rejects_the_wrong_prefix() {
        assert!(read::read::<SegmentId>("bi_1").is_err());
    }
}
