//! Binary codec entry points.
//!
//! `load(save(v)) == v` for every wire type; a buffer with bytes left over
//! after decoding is corrupt and rejected with
//! [`CodecError::AdditionalBytes`].

use std::io::Cursor;
use std::path::Path;

use binrw::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("could not serialize value")]
    Save(#[source] binrw::Error),
    #[error("could not deserialize value")]
    Load(#[source] binrw::Error),
    #[error("additional bytes at end of archive: {n}")]
    AdditionalBytes { n: u64 },
    #[error("could not access '{path}'")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// Serializes `value` into a fresh buffer.
pub fn save<T>(value: &T) -> Result<Vec<u8>, CodecError>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(Vec::new());
    value
        .write_le(&mut cursor)
        .map_err(CodecError::Save)?;
    Ok(cursor.into_inner())
}

/// Deserializes a value occupying the whole of `bytes`.
pub fn load<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(bytes);
    let value = T::read_le(&mut cursor).map_err(CodecError::Load)?;
    let n = bytes.len() as u64 - cursor.position();
    if n != 0 {
        return Err(CodecError::AdditionalBytes { n });
    }
    Ok(value)
}

pub fn save_to_file<T>(path: impl AsRef<Path>, value: &T) -> Result<(), CodecError>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let path = path.as_ref();
    std::fs::write(path, save(value)?).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_from_file<T>(path: impl AsRef<Path>) -> Result<T, CodecError>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Offset, Range, Size};

    #[test]
    fn load_of_save_is_identity() {
        let range = Range::at(Offset::new(16), Size::new(4096));
        let bytes = save(&range).unwrap();
        assert_eq!(load::<Range>(&bytes).unwrap(), range);
    }

    #[test]
    fn additional_bytes_are_rejected() {
        let mut bytes = save(&Size::new(1)).unwrap();
        bytes.extend_from_slice(&[0, 0, 0]);
        match load::<Size>(&bytes) {
            Err(CodecError::AdditionalBytes { n }) => assert_eq!(n, 3),
            other => panic!("expected AdditionalBytes, got {other:?}"),
        }
    }
}
