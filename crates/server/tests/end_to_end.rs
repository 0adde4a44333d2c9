//! End-to-end pipeline tests: a muxed MPEG-TS fixture is written to a
//! temp file, codec parameters are extracted from it, and the whole
//! extract → describe → setup → play → forward chain is exercised over
//! TLS with RTP delivery checked on a real UDP socket.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use camera_streamer::handler::StreamerHandler;
use camera_streamer::params::extract_h264_parameters;
use camera_streamer::streamer::Streamer;
use camera_streamer::tls::load_tls_config;

use rtsp::{
    H264Format, Media, Server, ServerConfig, ServerHandler, ServerStream, SessionDescription,
};

const SPS: &[u8] = &[0x67, 0x42, 0xc0, 0x1e, 0x8c, 0x8d, 0x40];
const PPS: &[u8] = &[0x68, 0xce, 0x38, 0x80];

/// Minimal single-program TS muxer for fixtures.
mod mux {
    const SYNC_BYTE: u8 = 0x47;
    const PMT_PID: u16 = 0x0020;
    const VIDEO_PID: u16 = 0x0100;

    fn ts_packet(pid: u16, payload_start: bool, payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() <= 184);
        let mut p = Vec::with_capacity(188);
        p.push(SYNC_BYTE);
        p.push(if payload_start { 0x40 } else { 0x00 } | ((pid >> 8) as u8 & 0x1f));
        p.push(pid as u8);
        let stuffing = 184 - payload.len();
        if stuffing == 0 {
            p.push(0x10);
        } else {
            p.push(0x30);
            let af_len = stuffing - 1;
            p.push(af_len as u8);
            if af_len > 0 {
                p.push(0x00);
                p.extend(std::iter::repeat(0xff).take(af_len - 1));
            }
        }
        p.extend_from_slice(payload);
        p
    }

    fn pat_section() -> Vec<u8> {
        let mut s = vec![0x00, 0xb0, 13];
        s.extend_from_slice(&[0x00, 0x01, 0xc1, 0x00, 0x00]);
        s.extend_from_slice(&[0x00, 0x01]);
        s.push(0xe0 | (PMT_PID >> 8) as u8);
        s.push(PMT_PID as u8);
        s.extend_from_slice(&[0; 4]);
        s
    }

    fn pmt_section() -> Vec<u8> {
        let mut s = vec![0x02, 0xb0, 18];
        s.extend_from_slice(&[0x00, 0x01, 0xc1, 0x00, 0x00]);
        s.push(0xe0 | (VIDEO_PID >> 8) as u8);
        s.push(VIDEO_PID as u8);
        s.extend_from_slice(&[0xf0, 0x00]);
        s.push(0x1b); // H.264
        s.push(0xe0 | (VIDEO_PID >> 8) as u8);
        s.push(VIDEO_PID as u8);
        s.extend_from_slice(&[0xf0, 0x00]);
        s.extend_from_slice(&[0; 4]);
        s
    }

    fn psi_payload(section: &[u8]) -> Vec<u8> {
        let mut p = vec![0u8];
        p.extend_from_slice(section);
        p
    }

    fn encode_pts(pts: u64) -> [u8; 5] {
        [
            0x21 | ((((pts >> 30) & 0x07) as u8) << 1),
            ((pts >> 22) & 0xff) as u8,
            0x01 | ((((pts >> 15) & 0x7f) as u8) << 1),
            ((pts >> 7) & 0xff) as u8,
            0x01 | (((pts & 0x7f) as u8) << 1),
        ]
    }

    fn pes_packet(pts: u64, es: &[u8]) -> Vec<u8> {
        let mut p = vec![0x00, 0x00, 0x01, 0xe0];
        let pes_len = 3 + 5 + es.len();
        p.push((pes_len >> 8) as u8);
        p.push(pes_len as u8);
        p.extend_from_slice(&[0x80, 0x80, 0x05]);
        p.extend_from_slice(&encode_pts(pts));
        p.extend_from_slice(es);
        p
    }

    pub fn transport_stream(access_units: &[(u64, Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(ts_packet(0, true, &psi_payload(&pat_section())));
        out.extend(ts_packet(PMT_PID, true, &psi_payload(&pmt_section())));
        for (pts, es) in access_units {
            let pes = pes_packet(*pts, es);
            for (i, chunk) in pes.chunks(184).enumerate() {
                out.extend(ts_packet(VIDEO_PID, i == 0, chunk));
            }
        }
        out
    }
}

fn annexb(units: &[&[u8]]) -> Vec<u8> {
    let mut au = Vec::new();
    for unit in units {
        au.extend_from_slice(&[0, 0, 0, 1]);
        au.extend_from_slice(unit);
    }
    au
}

fn fixture_access_units() -> Vec<(u64, Vec<u8>)> {
    let idr: Vec<u8> = {
        let mut v = vec![0x65];
        v.extend(vec![0x11; 60]);
        v
    };
    let p1: Vec<u8> = vec![0x41, 0x9a, 0x22, 0x33];
    let p2: Vec<u8> = vec![0x41, 0x9a, 0x44, 0x55];
    vec![
        (90_000, annexb(&[SPS, PPS, &idr])),
        (93_000, annexb(&[&p1])),
        (96_000, annexb(&[&p2])),
    ]
}

fn write_ts_fixture() -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(&mux::transport_stream(&fixture_access_units()))
        .unwrap();
    f.flush().unwrap();
    f
}

fn rtsp_request<S: Read + Write>(stream: &mut S, request: &str) -> String {
    stream.write_all(request.as_bytes()).unwrap();
    stream.flush().unwrap();

    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 {
            break;
        }
        response.push_str(&line);
        if line == "\r\n" || line == "\n" {
            break;
        }
    }
    response
}

#[test]
fn extracts_parameters_from_muxed_transport_stream() {
    let f = write_ts_fixture();
    let params = extract_h264_parameters(f.path(), Duration::from_secs(2)).unwrap();
    assert_eq!(params.sps, SPS);
    assert_eq!(params.pps, PPS);
}

#[test]
#[cfg(unix)]
fn timeout_when_pipe_stays_silent() {
    // A FIFO with a writer that never writes keeps the reader blocked.
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("camera_stream");
    let status = std::process::Command::new("mkfifo")
        .arg(&fifo)
        .status()
        .unwrap();
    assert!(status.success());

    let opener = fifo.clone();
    let writer = thread::spawn(move || {
        let f = std::fs::OpenOptions::new().write(true).open(opener).unwrap();
        thread::sleep(Duration::from_secs(2));
        drop(f);
    });

    let err = extract_h264_parameters(&fifo, Duration::from_millis(300)).unwrap_err();
    assert!(matches!(
        err,
        camera_streamer::ServerError::ExtractTimeout { .. }
    ));
    writer.join().unwrap();
}

#[test]
fn describe_blocks_until_ready() {
    let config = ServerConfig {
        rtsp_address: "127.0.0.1:0".to_string(),
        udp_rtp_address: "127.0.0.1:0".to_string(),
        udp_rtcp_address: "127.0.0.1:0".to_string(),
        ..ServerConfig::default()
    };
    let handler = Arc::new(StreamerHandler::new());
    let server = Server::new(config, handler.clone()).unwrap();
    server.start().unwrap();

    let format = H264Format::new(SPS.to_vec(), PPS.to_vec()).unwrap();
    let desc = SessionDescription::new(vec![Media::video(format)]).unwrap();
    let stream = Arc::new(ServerStream::new(&server, desc));
    stream.initialize().unwrap();

    let (tx, rx) = mpsc::channel();
    let h = handler.clone();
    thread::spawn(move || {
        let result = h.on_describe("rtsp://127.0.0.1/stream");
        tx.send(result.is_some()).ok();
    });

    // Gate closed: the describe callback must not have answered yet.
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    handler.set_stream(stream);
    handler.ready();
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(true));

    server.close();
}

#[test]
fn streams_rtp_to_tls_negotiated_client() {
    const BIND: &str = "127.0.0.1:18600";

    let ts_file = write_ts_fixture();

    // TLS material through the same loader the binary uses.
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
    let mut cert_file = tempfile::NamedTempFile::new().unwrap();
    cert_file.write_all(cert.cert.pem().as_bytes()).unwrap();
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file
        .write_all(cert.signing_key.serialize_pem().as_bytes())
        .unwrap();
    let tls_config = load_tls_config(cert_file.path(), key_file.path()).unwrap();

    let handler = Arc::new(StreamerHandler::new());
    let config = ServerConfig {
        rtsp_address: BIND.to_string(),
        udp_rtp_address: "127.0.0.1:0".to_string(),
        udp_rtcp_address: "127.0.0.1:0".to_string(),
        tls: Some(Arc::new(tls_config)),
        ..ServerConfig::default()
    };
    let server = Server::new(config, handler.clone()).unwrap();
    server.start().unwrap();

    let params = extract_h264_parameters(ts_file.path(), Duration::from_secs(2)).unwrap();
    let format = H264Format::new(params.sps, params.pps).unwrap();
    let desc = SessionDescription::new(vec![Media::video(format)]).unwrap();
    let stream = Arc::new(ServerStream::new(&server, desc));
    stream.initialize().unwrap();
    handler.set_stream(stream.clone());
    handler.ready();

    // RTP receiver the client advertises in SETUP.
    let rtp_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    rtp_socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let rtp_port = rtp_socket.local_addr().unwrap().port();

    // TLS RTSP client.
    let mut roots = rustls::RootCertStore::empty();
    roots
        .add(rustls::pki_types::CertificateDer::from(cert.cert))
        .unwrap();
    let client_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let server_name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
    let conn = rustls::ClientConnection::new(Arc::new(client_config), server_name).unwrap();
    let addr = BIND.to_socket_addrs().unwrap().next().unwrap();
    let tcp = TcpStream::connect_timeout(&addr, Duration::from_secs(2)).unwrap();
    tcp.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut tls = rustls::StreamOwned::new(conn, tcp);

    let base_uri = format!("rtsps://{}/stream", BIND);
    let setup = rtsp_request(
        &mut tls,
        &format!(
            "SETUP {}/track1 RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/AVP;unicast;client_port={}-{}\r\n\r\n",
            base_uri,
            rtp_port,
            rtp_port + 1
        ),
    );
    assert!(setup.starts_with("RTSP/1.0 200 OK"), "SETUP: {}", setup);
    let session_id = setup
        .lines()
        .find(|l| l.to_lowercase().starts_with("session:"))
        .and_then(|l| l.split(':').nth(1))
        .map(|v| v.trim().split(';').next().unwrap_or("").trim().to_string())
        .unwrap();

    let play = rtsp_request(
        &mut tls,
        &format!(
            "PLAY {} RTSP/1.0\r\nCSeq: 2\r\nSession: {}\r\n\r\n",
            base_uri, session_id
        ),
    );
    assert!(play.starts_with("RTSP/1.0 200 OK"), "PLAY: {}", play);

    // Only now start forwarding, so every access unit finds the playing
    // subscriber.
    let streamer = Streamer::new(stream.clone(), ts_file.path());
    streamer.initialize().unwrap();

    let mut markers = 0usize;
    let mut last_seq: Option<u16> = None;
    let mut buf = [0u8; 2048];
    while markers < 3 {
        let Ok((n, _)) = rtp_socket.recv_from(&mut buf) else {
            break;
        };
        assert!(n >= 12, "short RTP packet");
        assert_eq!(buf[0] >> 6, 2, "RTP version");
        assert_eq!(buf[1] & 0x7f, 96, "payload type");

        let seq = (u16::from(buf[2]) << 8) | u16::from(buf[3]);
        if let Some(prev) = last_seq {
            assert_eq!(seq, prev.wrapping_add(1), "sequence gap");
        }
        last_seq = Some(seq);

        if buf[1] & 0x80 != 0 {
            markers += 1;
        }
    }
    // One marker per access unit in the fixture.
    assert_eq!(markers, 3, "expected one marked packet per access unit");

    streamer.close();
    stream.close();
    server.close();
}
