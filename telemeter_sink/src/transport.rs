use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::uri::Destination;

/// Carries one encoded batch to the listener.
#[cfg_attr(test, automock)]
pub trait Transport: Send + Sync {
    fn send(&self, payload: &[u8]) -> io::Result<()>;

    fn destination(&self) -> String;
}

/// Unconnected UDP socket. The destination is resolved once and cached; a
/// failed send drops the cached address so the next send looks it up again,
/// which is how a listener that moves or comes up late is still reached.
pub struct UdpTransport {
    socket: UdpSocket,
    destination: Destination,
    ipv6: bool,
    target: Mutex<Option<SocketAddr>>,
}

impl UdpTransport {
    pub fn bind(destination: Destination) -> io::Result<Self> {
        let ipv6 = matches!(destination.host.parse::<IpAddr>(), Ok(IpAddr::V6(_)));
        let (domain, wildcard): (Domain, SocketAddr) = if ipv6 {
            (Domain::IPV6, (Ipv6Addr::UNSPECIFIED, 0).into())
        } else {
            (Domain::IPV4, (Ipv4Addr::UNSPECIFIED, 0).into())
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.bind(&SockAddr::from(wildcard))?;
        let socket: UdpSocket = socket.into();

        debug!(
            destination = %destination,
            local = ?socket.local_addr().ok(),
            "UDP transport bound"
        );

        let transport = Self {
            socket,
            destination,
            ipv6,
            target: Mutex::new(None),
        };
        if let Err(e) = transport.target() {
            warn!(
                destination = %transport.destination,
                error = %e,
                "Destination not resolvable yet, retrying on send"
            );
        }

        Ok(transport)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// The cached destination address, if one is currently resolved.
    pub fn resolved(&self) -> Option<SocketAddr> {
        *self.target.lock()
    }

    fn target(&self) -> io::Result<SocketAddr> {
        if let Some(addr) = *self.target.lock() {
            return Ok(addr);
        }
        let addr = self.resolve()?;
        *self.target.lock() = Some(addr);
        debug!(destination = %self.destination, address = %addr, "Destination resolved");
        Ok(addr)
    }

    fn resolve(&self) -> io::Result<SocketAddr> {
        let host = self.destination.host.as_str();
        (host, self.destination.port)
            .to_socket_addrs()?
            .find(|addr| addr.is_ipv6() == self.ipv6)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no usable address for {}", self.destination),
                )
            })
    }
}

impl Transport for UdpTransport {
    fn send(&self, payload: &[u8]) -> io::Result<()> {
        let target = self.target()?;
        let outcome = match self.socket.send_to(payload, target) {
            Ok(sent) if sent < payload.len() => Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated: sent {} of {} bytes", sent, payload.len()),
            )),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };

        if outcome.is_err() {
            self.target.lock().take();
        }
        outcome
    }

    fn destination(&self) -> String {
        self.destination.to_string()
    }
}
