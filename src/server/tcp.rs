//! TCP front end: one OS thread per accepted connection.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::facade::EngineFacade;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Binds `host:port` and accepts connections until `shutdown` is set.
/// Each connection gets its own thread; replies are written in command
/// order, one per line.
pub fn serve(
    facade: Arc<EngineFacade>,
    host: &str,
    port: u16,
    shutdown: Arc<AtomicBool>,
) -> io::Result<()> {
    let listener = TcpListener::bind((host, port))?;
    listener.set_nonblocking(true)?;
    info!(host, port, "tcp listener bound");

    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!(%addr, "tcp connection accepted");
                let facade = Arc::clone(&facade);
                std::thread::spawn(move || handle_connection(stream, &facade));
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(err) => warn!(%err, "tcp accept error"),
        }
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, facade: &EngineFacade) {
    let peer = stream.peer_addr().ok();
    let mut writer = match stream.try_clone() {
        Ok(w) => w,
        Err(err) => {
            warn!(%err, "failed to clone tcp stream");
            return;
        }
    };
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let reply = super::execute_command(facade, &line);
        if writeln!(writer, "{reply}").is_err() {
            break;
        }
    }
    debug!(?peer, "tcp connection closed");
}
