use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use crate::error::Result;

/// Multicast TTL advertised in SETUP responses and set on the socket.
pub const MULTICAST_TTL: u32 = 16;

/// UDP sockets for outbound media delivery.
///
/// The RTP socket is bound to the server's advertised RTP address and
/// used for both unicast and multicast sends. The RTCP socket is bound
/// so the advertised port is actually held, but no reports are
/// generated.
///
/// This layer is address-only: callers resolve session state to socket
/// addresses before sending.
pub struct UdpTransport {
    rtp: UdpSocket,
    _rtcp: UdpSocket,
}

impl UdpTransport {
    /// Bind the RTP and RTCP sockets.
    pub fn bind(rtp_addr: &str, rtcp_addr: &str) -> Result<Self> {
        let rtp = UdpSocket::bind(rtp_addr)?;
        rtp.set_multicast_ttl_v4(MULTICAST_TTL)?;
        let rtcp = UdpSocket::bind(rtcp_addr)?;
        Ok(Self { rtp, _rtcp: rtcp })
    }

    /// Actual bound RTP port (resolves port 0 binds).
    pub fn rtp_port(&self) -> Result<u16> {
        Ok(self.rtp.local_addr()?.port())
    }

    /// Actual bound RTCP port.
    pub fn rtcp_port(&self) -> Result<u16> {
        Ok(self._rtcp.local_addr()?.port())
    }

    /// Send raw bytes to a specific socket address.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.rtp.send_to(payload, addr)?)
    }

    /// Send raw bytes to the multicast group.
    pub fn send_multicast(&self, payload: &[u8], group: Ipv4Addr, port: u16) -> Result<usize> {
        Ok(self.rtp.send_to(payload, (group, port))?)
    }
}
