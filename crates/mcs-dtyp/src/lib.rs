//! Common data types for the memory-chunk service.
//!
//! Every type here round-trips through both representations used by the
//! system: the text format (`Display` + [`read`]) that makes endpoint files
//! and CLI arguments legible, and the binary codec ([`codec`]) that frames
//! RPC envelopes and persisted state.

pub mod binrw_util;
pub mod codec;
pub mod connectable;
pub mod distribution;
pub mod divru;
pub mod id;
pub mod max_size;
pub mod memory;
pub mod parameter;
pub mod read;

pub use codec::{CodecError, load, load_from_file, save, save_to_file};
pub use connectable::{Connectable, Endpoint};
pub use divru::{DivruError, divru};
pub use id::{SegmentId, StorageId};
pub use max_size::MaxSize;
pub use memory::{Offset, Range, RangeError, Size};
pub use parameter::Parameter;
pub use read::{Read, ReadError};
