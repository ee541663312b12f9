//! Remote control over a real loopback socket, through the accept thread and
//! the dispatch loop.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use musicbox_core::display::StatusDisplay;
use musicbox_core::mocks::{MockBackend, RecordingMixer};
use musicbox_core::session::SessionSettings;
use musicbox_core::{Catalog, Catalogs, PlaybackSession, PlaybackTarget, Track};
use musicbox_daemon::dispatch::{self, Dispatcher};
use musicbox_daemon::listener;

fn request(addr: std::net::SocketAddr, path: &str) -> String {
    let mut client = TcpStream::connect(addr).expect("connect");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");
    client
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: test\r\n\r\n").as_bytes())
        .expect("write");
    let mut response = String::new();
    client.read_to_string(&mut response).expect("read");
    response
}

#[test]
fn remote_selection_drives_session() {
    let local = Catalog::new(vec![
        Track::new("a", "x", "/music/a.mp3"),
        Track::new("b", "x", "/music/b.mp3"),
    ]);
    let cloud = Catalog::new(vec![Track::new("c", "y", "https://example.org/c.mp3")]);
    let backend = MockBackend::new();
    let session = PlaybackSession::new(
        backend.clone(),
        RecordingMixer::new(),
        Catalogs::new(local, cloud),
        SessionSettings::default(),
    );
    let mut dispatcher = Dispatcher::new(
        session,
        StatusDisplay::new(Vec::new(), None),
        Duration::from_millis(200),
    );

    let (conn_tx, conn_rx) = crossbeam_channel::bounded(listener::CONNECTION_BACKLOG);
    let addr = listener::spawn("127.0.0.1:0", Duration::from_secs(2), conn_tx).expect("bind");
    let (_event_tx, event_rx) = crossbeam_channel::bounded(4);
    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

    let client = thread::spawn(move || {
        let ping = request(addr, "/test");
        let selected = request(addr, "/local?song=1");
        let status = request(addr, "/status");
        stop_tx.send(()).expect("stop");
        (ping, selected, status)
    });

    dispatch::run(
        &mut dispatcher,
        &event_rx,
        &conn_rx,
        &stop_rx,
        Duration::from_millis(50),
    );
    let (ping, selected, status) = client.join().expect("client");

    assert!(ping.starts_with("HTTP/1.1 200 OK"));
    assert!(ping.ends_with("OK\n"));
    assert!(selected.contains("track 2"));
    assert!(status.contains("state=Playing"));
    assert!(status.contains("index=1"));

    let spawned = backend.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].1, PlaybackTarget::File("/music/b.mp3".into()));
    // Shutdown reaped the player
    assert!(backend.live().is_empty());
}
