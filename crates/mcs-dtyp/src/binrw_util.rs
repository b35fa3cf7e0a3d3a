//! Length-prefixed container helpers for binrw.
//!
//! The wire format length-prefixes every variable-sized value with a
//! little-endian `u64` count. These writers/parsers plug into derives via
//! `#[bw(write_with = …)]` / `#[br(parse_with = …)]`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use binrw::BinResult;
use binrw::prelude::*;

#[binrw::writer(writer, endian)]
pub fn write_string(value: &String) -> BinResult<()> {
    write_bytes(&value.as_bytes().to_vec(), writer, endian, ())
}

#[binrw::parser(reader, endian)]
pub fn parse_string() -> BinResult<String> {
    let bytes = parse_bytes(reader, endian, ())?;
    String::from_utf8(bytes).map_err(|e| binrw::Error::Custom {
        pos: 0,
        err: Box::new(e),
    })
}

#[binrw::writer(writer, endian)]
pub fn write_path(value: &PathBuf) -> BinResult<()> {
    write_string(&value.to_string_lossy().into_owned(), writer, endian, ())
}

#[binrw::parser(reader, endian)]
pub fn parse_path() -> BinResult<PathBuf> {
    Ok(PathBuf::from(parse_string(reader, endian, ())?))
}

#[binrw::writer(writer, endian)]
pub fn write_bytes(value: &Vec<u8>) -> BinResult<()> {
    (value.len() as u64).write_options(writer, endian, ())?;
    writer.write_all(value).map_err(binrw::Error::Io)
}

#[binrw::parser(reader, endian)]
pub fn parse_bytes() -> BinResult<Vec<u8>> {
    let count = u64::read_options(reader, endian, ())?;
    let mut bytes = vec![0u8; count as usize];
    reader.read_exact(&mut bytes).map_err(binrw::Error::Io)?;
    Ok(bytes)
}

#[binrw::writer(writer, endian)]
pub fn write_vec<T>(value: &Vec<T>) -> BinResult<()>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    (value.len() as u64).write_options(writer, endian, ())?;
    for item in value {
        item.write_options(writer, endian, ())?;
    }
    Ok(())
}

#[binrw::parser(reader, endian)]
pub fn parse_vec<T>() -> BinResult<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    let count = u64::read_options(reader, endian, ())?;
    let mut items = Vec::new();
    for _ in 0..count {
        items.push(T::read_options(reader, endian, ())?);
    }
    Ok(items)
}

#[binrw::writer(writer, endian)]
pub fn write_map<K, V>(value: &BTreeMap<K, V>) -> BinResult<()>
where
    K: for<'a> BinWrite<Args<'a> = ()>,
    V: for<'a> BinWrite<Args<'a> = ()>,
{
    (value.len() as u64).write_options(writer, endian, ())?;
    for (key, item) in value {
        key.write_options(writer, endian, ())?;
        item.write_options(writer, endian, ())?;
    }
    Ok(())
}

#[binrw::parser(reader, endian)]
pub fn parse_map<K, V>() -> BinResult<BTreeMap<K, V>>
where
    K: for<'a> BinRead<Args<'a> = ()> + Ord,
    V: for<'a> BinRead<Args<'a> = ()>,
{
    let count = u64::read_options(reader, endian, ())?;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let key = K::read_options(reader, endian, ())?;
        let item = V::read_options(reader, endian, ())?;
        map.insert(key, item);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::{BinRead, BinWrite};
    use std::io::Cursor;

    #[derive(BinRead, BinWrite, Debug, PartialEq, Eq)]
    #[brw(little)]
    struct Sample {
        #[bw(write_with = write_string)]
        #[br(parse_with = parse_string)]
        name: String,
        #[bw(write_with = write_vec)]
        #[br(parse_with = parse_vec)]
        values: Vec<u32>,
    }

    #[test]
    fn length_prefixed_round_trip() {
        let sample = Sample {
            name: "collection".into(),
            values: vec![1, 2, 3],
        };
        let mut buffer = Cursor::new(Vec::new());
        sample.write(&mut buffer).unwrap();
        buffer.set_position(0);
        assert_eq!(Sample::read(&mut buffer).unwrap(), sample);
    }

    #[test]
    fn string_prefix_is_u64() {
        let mut buffer = Cursor::new(Vec::new());
        Sample {
            name: "ab".into(),
            values: vec![],
        }
        .write(&mut buffer)
        .unwrap();
        let bytes = buffer.into_inner();
        assert_eq!(&bytes[..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..10], b"ab");
    }
}
