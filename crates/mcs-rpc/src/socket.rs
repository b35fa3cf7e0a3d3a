//! Protocol-agnostic stream sockets.
//!
//! One `Stream` type covers both transports the service speaks: TCP and
//! UNIX stream sockets. Listeners hand out streams; a bound endpoint turns
//! into the `Connectable` that peers read from endpoint files.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream, tcp, unix};

use mcs_dtyp::{Connectable, Endpoint};

macro_rules! delegate_read {
    ($name:ident) => {
        impl AsyncRead for $name {
            fn poll_read(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                buf: &mut ReadBuf<'_>,
            ) -> Poll<std::io::Result<()>> {
                match self.get_mut() {
                    $name::Tcp(inner) => Pin::new(inner).poll_read(cx, buf),
                    $name::Unix(inner) => Pin::new(inner).poll_read(cx, buf),
                }
            }
        }
    };
}

macro_rules! delegate_write {
    ($name:ident) => {
        impl AsyncWrite for $name {
            fn poll_write(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                buf: &[u8],
            ) -> Poll<std::io::Result<usize>> {
                match self.get_mut() {
                    $name::Tcp(inner) => Pin::new(inner).poll_write(cx, buf),
                    $name::Unix(inner) => Pin::new(inner).poll_write(cx, buf),
                }
            }

            fn poll_flush(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
            ) -> Poll<std::io::Result<()>> {
                match self.get_mut() {
                    $name::Tcp(inner) => Pin::new(inner).poll_flush(cx),
                    $name::Unix(inner) => Pin::new(inner).poll_flush(cx),
                }
            }

            fn poll_shutdown(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
            ) -> Poll<std::io::Result<()>> {
                match self.get_mut() {
                    $name::Tcp(inner) => Pin::new(inner).poll_shutdown(cx),
                    $name::Unix(inner) => Pin::new(inner).poll_shutdown(cx),
                }
            }
        }
    };
}

macro_rules! delegate_io {
    ($name:ident) => {
        delegate_read!($name);
        delegate_write!($name);
    };
}

pub enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

pub enum ReadHalf {
    Tcp(tcp::OwnedReadHalf),
    Unix(unix::OwnedReadHalf),
}

pub enum WriteHalf {
    Tcp(tcp::OwnedWriteHalf),
    Unix(unix::OwnedWriteHalf),
}

delegate_io!(Stream);
delegate_read!(ReadHalf);
delegate_write!(WriteHalf);

impl Stream {
    pub async fn connect(connectable: &Connectable) -> std::io::Result<Stream> {
        match connectable {
            Connectable::Tcp { host, port } => {
                Ok(Stream::Tcp(TcpStream::connect((host.as_str(), *port)).await?))
            }
            Connectable::Unix { path } => Ok(Stream::Unix(UnixStream::connect(path).await?)),
        }
    }

    pub fn into_split(self) -> (ReadHalf, WriteHalf) {
        match self {
            Stream::Tcp(stream) => {
                let (read, write) = stream.into_split();
                (ReadHalf::Tcp(read), WriteHalf::Tcp(write))
            }
            Stream::Unix(stream) => {
                let (read, write) = stream.into_split();
                (ReadHalf::Unix(read), WriteHalf::Unix(write))
            }
        }
    }
}

pub enum Listener {
    Tcp(TcpListener),
    Unix {
        listener: UnixListener,
        path: std::path::PathBuf,
    },
}

impl Listener {
    pub async fn bind(endpoint: &Endpoint) -> std::io::Result<Listener> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Listener::Tcp(TcpListener::bind(addr).await?)),
            Endpoint::Unix(path) => Ok(Listener::Unix {
                listener: UnixListener::bind(path)?,
                path: path.clone(),
            }),
        }
    }

    pub async fn accept(&self) -> std::io::Result<Stream> {
        match self {
            Listener::Tcp(listener) => Ok(Stream::Tcp(listener.accept().await?.0)),
            Listener::Unix { listener, .. } => Ok(Stream::Unix(listener.accept().await?.0)),
        }
    }

    /// The bound endpoint, with the port the OS assigned.
    pub fn local_endpoint(&self) -> std::io::Result<Endpoint> {
        match self {
            Listener::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?)),
            Listener::Unix { path, .. } => Ok(Endpoint::Unix(path.clone())),
        }
    }
}

/// Publishes an endpoint as a `Connectable`.
///
/// An unspecified TCP address is substituted with the local hostname, so the
/// published line is reachable from other hosts.
pub fn published(endpoint: &Endpoint) -> Connectable {
    match endpoint {
        Endpoint::Tcp(addr) if addr.ip().is_unspecified() => {
            Connectable::tcp(hostname(), addr.port())
        }
        Endpoint::Tcp(addr) => Connectable::tcp(addr.ip().to_string(), addr.port()),
        Endpoint::Unix(path) => Connectable::unix(path.clone()),
    }
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_addresses_publish_the_hostname() {
        let endpoint = Endpoint::Tcp("0.0.0.0:4711".parse().unwrap());
        match published(&endpoint) {
            Connectable::Tcp { host, port } => {
                assert_eq!(port, 4711);
                assert_ne!(host, "0.0.0.0");
            }
            other => panic!("expected tcp, got {other}"),
        }
    }

    #[test]
    fn specific_addresses_publish_verbatim() {
        let endpoint = Endpoint::Tcp("127.0.0.1:80".parse().unwrap());
        assert_eq!(published(&endpoint), Connectable::tcp("127.0.0.1", 80));
    }
}
