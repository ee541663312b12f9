use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, never};
use musicbox_core::config::RemoteConfig;

/// Pending connections the dispatch loop has not picked up yet
pub const CONNECTION_BACKLOG: usize = 8;

/// Start remote control as configured.
///
/// Returns the connection receiver and the bound port. When remote control is
/// disabled or the socket cannot be bound, the receiver is `never()` and the
/// daemon runs on hardware events alone.
pub fn start(config: &RemoteConfig) -> (Receiver<TcpStream>, Option<u16>) {
    if !config.enabled {
        log::info!("remote control disabled");
        return (never(), None);
    }
    let (tx, rx) = bounded(CONNECTION_BACKLOG);
    match spawn(&config.address(), config.read_timeout(), tx) {
        Ok(addr) => (rx, Some(addr.port())),
        Err(e) => {
            log::error!(
                "failed to bind remote control on {}: {}; continuing without it",
                config.address(),
                e
            );
            (never(), None)
        }
    }
}

/// Bind the remote control socket and start the accept thread.
///
/// The thread only accepts: each stream gets its timeouts and is handed to
/// the dispatch loop, which reads, answers and drops it. A bind failure is
/// returned so the caller can carry on without remote control.
pub fn spawn(
    addr: &str,
    read_timeout: Duration,
    connections: Sender<TcpStream>,
) -> io::Result<SocketAddr> {
    let listener = TcpListener::bind(addr)?;
    let local = listener.local_addr()?;
    thread::Builder::new()
        .name("remote-accept".to_string())
        .spawn(move || accept_loop(listener, read_timeout, connections))?;
    log::info!("remote control listening on {}", local);
    Ok(local)
}

fn accept_loop(listener: TcpListener, read_timeout: Duration, connections: Sender<TcpStream>) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("accept failed: {}", e);
                continue;
            }
        };
        let peer = stream.peer_addr().ok();
        // A zero duration is rejected by set_*_timeout
        let timeout = Some(read_timeout.max(Duration::from_millis(1)));
        if let Err(e) = stream
            .set_read_timeout(timeout)
            .and_then(|_| stream.set_write_timeout(timeout))
        {
            log::warn!("could not set socket timeouts: {}", e);
        }
        match connections.try_send(stream) {
            Ok(()) => log::debug!("accepted remote connection from {:?}", peer),
            Err(TrySendError::Full(_)) => {
                log::warn!("dispatch busy, dropping connection from {:?}", peer);
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_accepted_stream_is_handed_over() {
        let (tx, rx) = crossbeam_channel::bounded(CONNECTION_BACKLOG);
        let addr = spawn("127.0.0.1:0", Duration::from_millis(500), tx).expect("bind");
        let mut client = TcpStream::connect(addr).expect("connect");
        client.write_all(b"GET /test HTTP/1.1\r\n\r\n").expect("write");

        let server_side = rx.recv_timeout(Duration::from_secs(5)).expect("stream");
        assert_eq!(
            server_side.read_timeout().expect("timeout"),
            Some(Duration::from_millis(500))
        );
    }

    fn remote_config(port: u16, enabled: bool) -> RemoteConfig {
        RemoteConfig {
            enabled,
            bind: "127.0.0.1".to_string(),
            port,
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn test_start_reports_bound_port() {
        let (rx, port) = start(&remote_config(0, true));
        let port = port.expect("bound");
        let _client = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_start_on_taken_port_falls_back_to_never() {
        let taken = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = taken.local_addr().expect("addr").port();
        let (rx, bound) = start(&remote_config(port, true));
        assert_eq!(bound, None);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_start_disabled() {
        let (rx, bound) = start(&remote_config(0, false));
        assert_eq!(bound, None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = taken.local_addr().expect("addr").to_string();
        let (tx, _rx) = crossbeam_channel::bounded(1);
        assert!(spawn(&addr, Duration::from_secs(1), tx).is_err());
    }
}
