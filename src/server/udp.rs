//! UDP front end: a single receive loop, one `GET` per datagram.

use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::facade::EngineFacade;

const RECV_TIMEOUT: Duration = Duration::from_millis(200);

/// Binds `host:port` and serves `GET` requests, one datagram in, one
/// datagram out to the sender's address, until `shutdown` is set.
pub fn serve(
    facade: Arc<EngineFacade>,
    host: &str,
    port: u16,
    buffer_size: usize,
    shutdown: Arc<AtomicBool>,
) -> io::Result<()> {
    let socket = UdpSocket::bind((host, port))?;
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    info!(host, port, "udp listener bound");

    let mut buf = vec![0u8; buffer_size];
    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((n, src)) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                let reply = super::execute_udp_command(&facade, text.trim());
                if let Err(err) = socket.send_to(reply.as_bytes(), src) {
                    warn!(%err, %src, "udp send error");
                }
            }
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) => warn!(%err, "udp recv error"),
        }
    }
    Ok(())
}
