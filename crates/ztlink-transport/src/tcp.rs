//! Plain TCP helpers.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};

use crate::error::TransportError;

/// Bind a listener with `SO_REUSEADDR` and an explicit backlog.
pub fn create_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener, TransportError> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog as i32)?;
    Ok(TcpListener::from_std(std::net::TcpListener::from(socket))?)
}

/// Connect to `addr` (`host:port`), giving up after `timeout`.
pub async fn connect_tcp(addr: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::Timeout(addr.to_string()))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_accepts_dialed_connection() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();

        let addr_str = addr.to_string();
        let (dialed, accepted) = tokio::join!(
            connect_tcp(&addr_str, Duration::from_secs(1)),
            listener.accept()
        );
        let dialed = dialed.unwrap();
        let (_, peer) = accepted.unwrap();
        assert_eq!(dialed.local_addr().unwrap(), peer);
    }

    #[tokio::test]
    async fn refused_dial_is_an_error() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(connect_tcp(&addr.to_string(), Duration::from_secs(1))
            .await
            .is_err());
    }
}
