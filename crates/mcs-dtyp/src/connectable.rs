//! Protocol-agnostic network addresses.
//!
//! An [`Endpoint`] is where a provider listens; a [`Connectable`] is what a
//! peer needs to reach it. Both round-trip through the text format used in
//! endpoint files and CLI arguments.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use binrw::prelude::*;

use crate::binrw_util;
use crate::read::{Read, ReadError, State};

/// A published, connectable address.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[brw(little)]
pub enum Connectable {
    /// TCP peer; `host` is an address string, or a hostname when the
    /// endpoint was unspecified at publish time.
    #[brw(magic = 0u8)]
    Tcp {
        #[bw(write_with = binrw_util::write_string)]
        #[br(parse_with = binrw_util::parse_string)]
        host: String,
        port: u16,
    },
    /// UNIX stream socket peer.
    #[brw(magic = 1u8)]
    Unix {
        #[bw(write_with = binrw_util::write_path)]
        #[br(parse_with = binrw_util::parse_path)]
        path: PathBuf,
    },
}

impl Connectable {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Connectable::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Connectable::Unix { path: path.into() }
    }
}

fn write_quoted(f: &mut std::fmt::Formatter<'_>, value: &str) -> std::fmt::Result {
    write!(f, "\"{}\"", value.replace('"', "\"\""))
}

impl std::fmt::Display for Connectable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectable::Tcp { host, port } => {
                write!(f, "ip::tcp {{ ")?;
                write_quoted(f, host)?;
                write!(f, ", {port} }}")
            }
            Connectable::Unix { path } => {
                write!(f, "local::stream_protocol {{ ")?;
                write_quoted(f, &path.to_string_lossy())?;
                write!(f, " }}")
            }
        }
    }
}

impl Read for Connectable {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        if state.maybe_prefix("ip::tcp { ") {
            let host = state.quoted()?;
            state.prefix(", ")?;
            let port = state.uint()?;
            state.prefix(" }")?;
            Ok(Connectable::Tcp { host, port })
        } else if state.maybe_prefix("local::stream_protocol { ") {
            let path = state.quoted()?;
            state.prefix(" }")?;
            Ok(Connectable::Unix { path: path.into() })
        } else {
            Err(state.error("'ip::tcp' or 'local::stream_protocol'"))
        }
    }
}

/// A local address a provider binds to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp(addr) => {
                write!(f, "ip::tcp {{ ")?;
                write_quoted(f, &addr.ip().to_string())?;
                write!(f, ", {} }}", addr.port())
            }
            Endpoint::Unix(path) => {
                write!(f, "local::stream_protocol {{ ")?;
                write_quoted(f, &path.to_string_lossy())?;
                write!(f, " }}")
            }
        }
    }
}

impl Read for Endpoint {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        match <Connectable as Read>::read(state)? {
            Connectable::Tcp { host, port } => {
                let ip: IpAddr = host
                    .parse()
                    .map_err(|_| state.error("an IP address"))?;
                Ok(Endpoint::Tcp(SocketAddr::new(ip, port)))
            }
            Connectable::Unix { path } => Ok(Endpoint::Unix(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read;

    #[test]
    fn read_of_fmt_is_identity() {
        for connectable in [
            Connectable::tcp("127.0.0.1", 4711),
            Connectable::tcp("compute-07", 80),
            Connectable::unix("/tmp/mcs/provider.sock"),
            Connectable::unix("/tmp/odd\"name.sock"),
        ] {
            assert_eq!(
                read::read::<Connectable>(&connectable.to_string()).unwrap(),
                connectable,
                "{connectable}"
            );
        }
    }

    #[test]
    fn fmt_matches_the_published_layout() {
        assert_eq!(
            Connectable::tcp("10.0.0.3", 80).to_string(),
            "ip::tcp { \"10.0.0.3\", 80 }"
        );
        assert_eq!(
            Connectable::unix("/run/mcs.sock").to_string(),
            "local::stream_protocol { \"/run/mcs.sock\" }"
        );
    }

    #[test]
    fn endpoint_requires_a_literal_address() {
        assert!(read::read::<Endpoint>("ip::tcp { \"0.0.0.0\", 0 }").is_ok());
        assert!(read::read::<Endpoint>("ip::tcp { \"a-hostname\", 0 }").is_err());
    }

    #[test]
    fn codec_round_trip() {
        let connectable = Connectable::tcp("::1", 9000);
        let bytes = crate::codec::save(&connectable).unwrap();
        assert_eq!(
            crate::codec::load::<Connectable>(&bytes).unwrap(),
            connectable
        );
    }
}
