//! Opaque, implementation-specific parameter blobs.

use binrw::prelude::*;
use binrw::{BinResult, Endian};

use crate::codec::{self, CodecError};
use crate::read::{Read, ReadError, State};

/// A serialized parameter value.
///
/// Parameters travel through commands and state files without the carrier
/// knowing their concrete type; the owning storage implementation recovers
/// the value with [`Parameter::decode`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Parameter(Vec<u8>);

impl Parameter {
    /// Erases `value` into a blob.
    pub fn encode<T>(value: &T) -> Result<Self, CodecError>
    where
        T: for<'a> BinWrite<Args<'a> = ()>,
    {
        Ok(Parameter(codec::save(value)?))
    }

    /// Recovers the typed value; the blob must match `T` exactly.
    pub fn decode<T>(&self) -> Result<T, CodecError>
    where
        T: for<'a> BinRead<Args<'a> = ()>,
    {
        codec::load(&self.0)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl BinRead for Parameter {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let count = u64::read_options(reader, endian, ())?;
        let mut bytes = vec![0u8; count as usize];
        reader.read_exact(&mut bytes).map_err(binrw::Error::Io)?;
        Ok(Parameter(bytes))
    }
}

impl BinWrite for Parameter {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        (self.0.len() as u64).write_options(writer, endian, ())?;
        writer.write_all(&self.0).map_err(binrw::Error::Io)
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Read for Parameter {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        state.prefix("0x")?;
        let digits: usize = state
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_hexdigit())
            .count();
        if digits % 2 != 0 {
            return Err(state.error("an even number of hex digits"));
        }
        let bytes = state
            .take(digits)
            .as_bytes()
            .chunks(2)
            .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16))
            .collect::<Result<Vec<u8>, _>>()
            .expect("only hex digits were taken");
        Ok(Parameter(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Size;
    use crate::read;

    #[test]
    fn encode_decode_recovers_the_value() {
        let parameter = Parameter::encode(&Size::new(77)).unwrap();
        assert_eq!(parameter.decode::<Size>().unwrap(), Size::new(77));
    }

    #[test]
    fn decode_rejects_the_wrong_type() {
        let parameter = Parameter::encode(&7u8).unwrap();
        assert!(parameter.decode::<Size>().is_err());
    }

    #[test]
    fn read_of_fmt_is_identity() {
        for parameter in [
            Parameter::default(),
            Parameter::encode(&Size::new(513)).unwrap(),
        ] {
            assert_eq!(
                read::read::<Parameter>(&parameter.to_string()).unwrap(),
                parameter
            );
        }
    }
}
