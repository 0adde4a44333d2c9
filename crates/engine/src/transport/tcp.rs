use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::RtspError;
use crate::protocol::{MethodHandler, RtspRequest};
use crate::server::{ServerCore, ServerHandler};

/// Non-blocking TCP accept loop.
///
/// Checks the running flag between accepts with a 50ms poll interval so
/// [`Server::close`](crate::Server::close) can terminate it promptly.
/// A persistent accept error is fatal: it is forwarded to
/// [`Server::wait`](crate::Server::wait) and the loop exits.
pub(crate) fn accept_loop(
    listener: TcpListener,
    core: Arc<ServerCore>,
    handler: Arc<dyn ServerHandler>,
    fatal_tx: mpsc::Sender<RtspError>,
) {
    while core.running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let core = core.clone();
                let handler = handler.clone();
                thread::spawn(move || {
                    serve_connection(stream, peer, core, handler);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if core.running.load(Ordering::SeqCst) {
                    tracing::error!(error = %e, "TCP accept failed, shutting down");
                    let _ = fatal_tx.send(e.into());
                }
                break;
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// Wrap the connection in TLS when configured, then run the RTSP
/// request loop until the client goes away.
fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    core: Arc<ServerCore>,
    handler: Arc<dyn ServerHandler>,
) {
    tracing::info!(%peer, "client connected");
    handler.on_connect(peer);

    let reason = match core.config.tls.clone() {
        Some(tls_config) => match rustls::ServerConnection::new(tls_config) {
            Ok(conn) => {
                let tls_stream = rustls::StreamOwned::new(conn, stream);
                run(tls_stream, peer, &core, &handler)
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "TLS connection setup failed");
                "TLS setup failed"
            }
        },
        None => run(stream, peer, &core, &handler),
    };

    handler.on_disconnect(peer);
    tracing::info!(%peer, reason, "client disconnected");
}

/// RTSP request/response loop over any byte stream (plain TCP or TLS).
///
/// RTSP is strictly request/response here, so a single buffered reader
/// owns the stream and responses are written through
/// [`BufReader::get_mut`] — this also works for TLS streams, which
/// cannot be cloned the way a `TcpStream` can. Returns the reason for
/// exiting.
fn run<S: Read + Write>(
    stream: S,
    peer: SocketAddr,
    core: &Arc<ServerCore>,
    handler: &Arc<dyn ServerHandler>,
) -> &'static str {
    let mut reader = BufReader::new(stream);
    let mut method_handler = MethodHandler::new(core.clone(), handler.clone(), peer);

    let reason = loop {
        if !core.running.load(Ordering::SeqCst) {
            break "server shutting down";
        }

        let mut request_text = String::new();
        let read_result = loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break Err("connection closed by client"),
                Ok(_) => {
                    request_text.push_str(&line);
                    if line == "\r\n" || line == "\n" {
                        break Ok(());
                    }
                }
                Err(_) => break Err("read error"),
            }
        };
        if let Err(reason) = read_result {
            break reason;
        }

        if request_text.trim().is_empty() {
            continue;
        }

        match RtspRequest::parse(&request_text) {
            Ok(request) => {
                tracing::debug!(
                    %peer,
                    method = %request.method,
                    uri = %request.uri,
                    "request"
                );

                let response = method_handler.handle(&request);

                tracing::debug!(%peer, status = response.status_code, "response");

                if reader
                    .get_mut()
                    .write_all(response.serialize().as_bytes())
                    .is_err()
                {
                    break "write error";
                }
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "parse error");
            }
        }
    };

    method_handler.finish();
    reason
}
