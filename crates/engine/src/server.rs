use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, RtspError};
use crate::session::SessionManager;
use crate::stream::ServerStream;
use crate::transport::UdpTransport;
use crate::transport::tcp;

/// Server configuration: listen endpoints, TLS, and SDP origin fields.
#[derive(Clone)]
pub struct ServerConfig {
    /// RTSP signaling listen address (TCP).
    pub rtsp_address: String,
    /// Bind address for the outbound RTP socket (UDP).
    pub udp_rtp_address: String,
    /// Bind address for the RTCP socket (UDP). Bound and advertised but
    /// no reports are generated.
    pub udp_rtcp_address: String,
    /// CIDR range multicast groups are drawn from (e.g. `224.1.0.0/16`).
    pub multicast_ip_range: String,
    /// RTP port clients listen on for multicast delivery.
    pub multicast_rtp_port: u16,
    /// RTCP port advertised for multicast delivery.
    pub multicast_rtcp_port: u16,
    /// When set, every RTSP connection is wrapped in server-side TLS
    /// before any RTSP byte is read.
    pub tls: Option<Arc<rustls::ServerConfig>>,
    /// SDP origin username field (`o=<username> ...`).
    pub sdp_username: String,
    /// SDP origin session id field.
    pub sdp_session_id: String,
    /// SDP origin session version field.
    pub sdp_session_version: String,
    /// SDP session name (`s=`).
    pub sdp_session_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rtsp_address: "0.0.0.0:8554".to_string(),
            udp_rtp_address: "0.0.0.0:8000".to_string(),
            udp_rtcp_address: "0.0.0.0:8001".to_string(),
            multicast_ip_range: "224.1.0.0/16".to_string(),
            multicast_rtp_port: 8002,
            multicast_rtcp_port: 8003,
            tls: None,
            sdp_username: "-".to_string(),
            sdp_session_id: "0".to_string(),
            sdp_session_version: "0".to_string(),
            sdp_session_name: "Camera Stream".to_string(),
        }
    }
}

/// Session-lifecycle callbacks implemented by the embedding program.
///
/// The server calls these from its connection threads. DESCRIBE and
/// SETUP are answered 404 when the corresponding callback returns
/// `None`; a blocking implementation (e.g. waiting on a readiness gate)
/// delays the client until the program is ready to serve.
pub trait ServerHandler: Send + Sync {
    /// A client TCP connection was accepted.
    fn on_connect(&self, _peer: SocketAddr) {}

    /// A client connection closed (its sessions are already cleaned up).
    fn on_disconnect(&self, _peer: SocketAddr) {}

    /// Return the stream whose description answers DESCRIBE for `uri`.
    fn on_describe(&self, uri: &str) -> Option<Arc<ServerStream>>;

    /// Return the stream a SETUP for `uri` subscribes to.
    fn on_setup(&self, uri: &str) -> Option<Arc<ServerStream>>;

    /// A session entered the Playing state.
    fn on_play(&self, _session_id: &str) {}

    /// A session was destroyed via TEARDOWN.
    fn on_teardown(&self, _session_id: &str) {}
}

/// Shared server internals, reachable from connection threads and
/// streams alike.
pub(crate) struct ServerCore {
    pub(crate) config: ServerConfig,
    pub(crate) session_manager: SessionManager,
    pub(crate) udp: RwLock<Option<UdpTransport>>,
    pub(crate) running: AtomicBool,
    /// Multicast group used by the stream (first host address of the
    /// configured range).
    pub(crate) multicast_group: Ipv4Addr,
    /// Actual bound (RTP, RTCP) ports, known after `start`.
    pub(crate) server_ports: RwLock<Option<(u16, u16)>>,
}

/// RTSP session server.
///
/// Owns the RTSP/TLS listener and the UDP media sockets; delegates
/// connection handling to [`tcp`](crate::transport::tcp) and answers
/// DESCRIBE/SETUP through the program's [`ServerHandler`].
pub struct Server {
    core: Arc<ServerCore>,
    handler: Arc<dyn ServerHandler>,
    fatal_rx: Mutex<Option<mpsc::Receiver<RtspError>>>,
}

impl Server {
    /// Create a server. Fails when the multicast range cannot be parsed.
    pub fn new(config: ServerConfig, handler: Arc<dyn ServerHandler>) -> Result<Self> {
        let multicast_group = multicast_group_from_range(&config.multicast_ip_range)?;
        Ok(Self {
            core: Arc::new(ServerCore {
                config,
                session_manager: SessionManager::new(),
                udp: RwLock::new(None),
                running: AtomicBool::new(false),
                multicast_group,
                server_ports: RwLock::new(None),
            }),
            handler,
            fatal_rx: Mutex::new(None),
        })
    }

    /// Bind the TCP and UDP sockets and spawn the accept loop.
    pub fn start(&self) -> Result<()> {
        if self
            .core
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RtspError::AlreadyRunning);
        }

        let udp = UdpTransport::bind(
            &self.core.config.udp_rtp_address,
            &self.core.config.udp_rtcp_address,
        )?;
        *self.core.server_ports.write() = Some((udp.rtp_port()?, udp.rtcp_port()?));
        *self.core.udp.write() = Some(udp);

        let listener = TcpListener::bind(&self.core.config.rtsp_address)?;
        listener.set_nonblocking(true)?;

        let (fatal_tx, fatal_rx) = mpsc::channel();
        *self.fatal_rx.lock() = Some(fatal_rx);

        let core = self.core.clone();
        let handler = self.handler.clone();

        tracing::info!(
            addr = %self.core.config.rtsp_address,
            tls = self.core.config.tls.is_some(),
            multicast_group = %self.core.multicast_group,
            "RTSP server listening"
        );

        thread::spawn(move || {
            tcp::accept_loop(listener, core, handler, fatal_tx);
        });

        Ok(())
    }

    /// Block until the server dies of a fatal error and return it.
    ///
    /// Returns [`RtspError::Terminated`] when the server was shut down
    /// via [`close`](Self::close) instead, and
    /// [`RtspError::NotStarted`] when called before [`start`](Self::start)
    /// (or a second time).
    pub fn wait(&self) -> RtspError {
        let rx = match self.fatal_rx.lock().take() {
            Some(rx) => rx,
            None => return RtspError::NotStarted,
        };
        match rx.recv() {
            Ok(err) => err,
            Err(_) => RtspError::Terminated,
        }
    }

    /// Stop accepting connections. Idempotent.
    pub fn close(&self) {
        if self.core.running.swap(false, Ordering::SeqCst) {
            tracing::info!("server stopping");
        }
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    /// The configured RTSP listen address.
    pub fn rtsp_address(&self) -> &str {
        &self.core.config.rtsp_address
    }

    pub(crate) fn core(&self) -> &Arc<ServerCore> {
        &self.core
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}

/// First host address of a `base/prefix` IPv4 range, e.g.
/// `224.1.0.0/16` → `224.1.0.1`.
fn multicast_group_from_range(range: &str) -> Result<Ipv4Addr> {
    let (base, prefix) = range
        .split_once('/')
        .ok_or(RtspError::InvalidAddress("multicast range missing prefix"))?;
    let base: Ipv4Addr = base
        .parse()
        .map_err(|_| RtspError::InvalidAddress("bad multicast base address"))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| RtspError::InvalidAddress("bad multicast prefix length"))?;
    if prefix > 30 {
        return Err(RtspError::InvalidAddress("multicast prefix too long"));
    }

    let group = Ipv4Addr::from(u32::from(base) + 1);
    if !group.is_multicast() {
        return Err(RtspError::InvalidAddress("range is not multicast"));
    }
    Ok(group)
}
