//! Commands, fingerprints and the wire result wrapper.

use binrw::prelude::*;
use binrw::{BinResult, Endian};

use mcs_dtyp::binrw_util;

use crate::error::RpcError;

/// A serializable request with an associated response type.
///
/// The tag is the command's stable identity across versions: the handshake
/// fingerprints a dispatcher as its `(index, tag)` pairs, so renaming or
/// reordering commands is a protocol break by construction.
pub trait Command:
    for<'a> BinWrite<Args<'a> = ()> + for<'a> BinRead<Args<'a> = ()> + Send + 'static
{
    type Response: for<'a> BinWrite<Args<'a> = ()>
        + for<'a> BinRead<Args<'a> = ()>
        + Send
        + 'static;

    const TAG: &'static str;
}

/// A compile-time-declared list of commands.
pub trait CommandSet {
    fn fingerprints() -> Vec<Fingerprint>;
}

/// Empty response of commands that only signal completion.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Done;

/// One entry of the handshake: the command's position and canonical tag.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Fingerprint {
    pub index: u64,
    #[bw(write_with = binrw_util::write_string)]
    #[br(parse_with = binrw_util::parse_string)]
    pub tag: String,
}

/// Checks the prefix rule: every client command must sit at the same index
/// with the same tag on the server.
pub fn is_prefix(client: &[Fingerprint], server: &[Fingerprint]) -> bool {
    client.len() <= server.len()
        && client
            .iter()
            .zip(server.iter())
            .all(|(c, s)| c.index == s.index && c.tag == s.tag)
}

/// The wire form of a response: the handler's value, or its stringified
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultOrError<T> {
    Error { reason: String },
    Result(T),
}

impl<T> ResultOrError<T> {
    pub fn into_result(self) -> Result<T, RpcError> {
        match self {
            ResultOrError::Error { reason } => Err(RpcError::Handler { reason }),
            ResultOrError::Result(value) => Ok(value),
        }
    }
}

impl<T> BinRead for ResultOrError<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        match u8::read_options(reader, endian, ())? {
            0 => Ok(ResultOrError::Error {
                reason: binrw_util::parse_string(reader, endian, ())?,
            }),
            1 => Ok(ResultOrError::Result(T::read_options(reader, endian, ())?)),
            tag => Err(binrw::Error::BadMagic {
                pos: reader.stream_position().unwrap_or(0),
                found: Box::new(tag),
            }),
        }
    }
}

impl<T> BinWrite for ResultOrError<T>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        match self {
            ResultOrError::Error { reason } => {
                0u8.write_options(writer, endian, ())?;
                binrw_util::write_string(reason, writer, endian, ())
            }
            ResultOrError::Result(value) => {
                1u8.write_options(writer, endian, ())?;
                value.write_options(writer, endian, ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::{load, save};

    fn fingerprint(index: u64, tag: &str) -> Fingerprint {
        Fingerprint {
            index,
            tag: tag.to_string(),
        }
    }

    #[test]
    fn prefixes_are_accepted() {
        let server = vec![
            fingerprint(0, "a"),
            fingerprint(1, "b"),
            fingerprint(2, "c"),
        ];
        for upto in 0..=server.len() {
            assert!(is_prefix(&server[..upto], &server));
        }
    }

    #[test]
    fn reordering_and_subsequences_are_rejected() {
        let server = vec![
            fingerprint(0, "a"),
            fingerprint(1, "b"),
            fingerprint(2, "c"),
        ];
        let reordered = vec![fingerprint(0, "b"), fingerprint(1, "a")];
        assert!(!is_prefix(&reordered, &server));
        let subsequence = vec![fingerprint(0, "a"), fingerprint(1, "c")];
        assert!(!is_prefix(&subsequence, &server));
        let too_long = vec![
            fingerprint(0, "a"),
            fingerprint(1, "b"),
            fingerprint(2, "c"),
            fingerprint(3, "d"),
        ];
        assert!(!is_prefix(&too_long, &server));
    }

    #[test]
    fn result_or_error_round_trip() {
        let ok: ResultOrError<u64> = ResultOrError::Result(17);
        assert_eq!(load::<ResultOrError<u64>>(&save(&ok).unwrap()).unwrap(), ok);
        let err: ResultOrError<u64> = ResultOrError::Error {
            reason: "unknown storage".into(),
        };
        assert_eq!(
            load::<ResultOrError<u64>>(&save(&err).unwrap()).unwrap(),
            err
        );
    }
}
