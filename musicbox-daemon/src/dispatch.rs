//! The dispatch loop: one thread, one multiplexed wait, every command applied
//! to the session in arrival order.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, never, select, tick};
use musicbox_core::display::StatusDisplay;
use musicbox_core::input::Debouncer;
use musicbox_core::mixer::Mixer;
use musicbox_core::player::PlayerBackend;
use musicbox_core::remote::{self, MAX_REQUEST, RemoteRequest};
use musicbox_core::{Command, EventCode, Notice, PlaybackSession};

pub struct Dispatcher<B: PlayerBackend, M: Mixer, W: Write> {
    session: PlaybackSession<B, M>,
    display: StatusDisplay<W>,
    /// Global gap between accepted hardware events, on top of per-channel debouncing
    gate: Debouncer,
}

impl<B: PlayerBackend, M: Mixer, W: Write> Dispatcher<B, M, W> {
    pub fn new(session: PlaybackSession<B, M>, display: StatusDisplay<W>, gate: Duration) -> Self {
        Self {
            session,
            display,
            gate: Debouncer::new(gate),
        }
    }

    pub fn session(&self) -> &PlaybackSession<B, M> {
        &self.session
    }

    /// Redraw the status screen with `info` on the INFO line
    pub fn show(&mut self, info: &str) {
        let snapshot = self.session.snapshot();
        self.display.show(&snapshot, info);
    }

    /// Apply one hardware event unless it falls inside the gate window
    pub fn handle_event(&mut self, code: EventCode, now: Instant) -> Option<Notice> {
        if !self.gate.accept(now) {
            log::debug!("{} suppressed by dispatch debounce", code);
            return None;
        }
        log::info!("event {}", code);
        let notice = self.session.handle_event(code);
        self.show(&notice.to_string());
        Some(notice)
    }

    /// Serve exactly one request on `stream`. The caller closes it by dropping.
    pub fn handle_connection<S: Read + Write>(&mut self, stream: &mut S) -> io::Result<RemoteRequest> {
        let mut buf = [0u8; MAX_REQUEST];
        let n = stream.read(&mut buf)?;
        let raw = String::from_utf8_lossy(&buf[..n]);
        let request = remote::parse_request(&raw);
        log::debug!("remote request {:?}", request);

        let body = match request {
            RemoteRequest::Index => {
                stream.write_all(remote::html_response().as_bytes())?;
                return stream.flush().map(|_| request);
            }
            RemoteRequest::Status => remote::status_text(&self.session.snapshot()),
            RemoteRequest::Command(command) => {
                if let Command::Select { .. } = command {
                    // Direct selection should take effect at once for the next button
                    self.gate.reset();
                }
                let notice = self.session.apply(command);
                self.show(&notice.to_string());
                format!("{}\n", notice)
            }
            RemoteRequest::Ping | RemoteRequest::Unknown => "OK\n".to_string(),
        };
        stream.write_all(remote::text_response(&body).as_bytes())?;
        stream.flush()?;
        Ok(request)
    }

    /// Periodic work while idle: detect a finished player and auto-advance
    pub fn housekeeping(&mut self) {
        if let Some(notice) = self.session.poll_player() {
            self.show(&notice.to_string());
        }
    }

    pub fn shutdown(&mut self) {
        self.session.shutdown();
        self.show("Shutting down");
    }
}

/// Run until `shutdown` fires, then stop and reap the player.
///
/// Events and connections are serviced as they arrive. A disconnected source
/// is swapped for `never()` so it cannot spin the loop.
pub fn run<B: PlayerBackend, M: Mixer, W: Write>(
    dispatcher: &mut Dispatcher<B, M, W>,
    events: &Receiver<EventCode>,
    connections: &Receiver<TcpStream>,
    shutdown: &Receiver<()>,
    tick_interval: Duration,
) {
    let mut events = events.clone();
    let mut connections = connections.clone();
    let ticker = tick(tick_interval);

    loop {
        let mut events_closed = false;
        let mut connections_closed = false;

        select! {
            recv(shutdown) -> _ => {
                log::info!("shutdown requested");
                break;
            }
            recv(events) -> msg => match msg {
                Ok(code) => {
                    dispatcher.handle_event(code, Instant::now());
                }
                Err(_) => events_closed = true,
            },
            recv(connections) -> msg => match msg {
                Ok(mut stream) => {
                    if let Err(e) = dispatcher.handle_connection(&mut stream) {
                        log::warn!("remote request failed: {}", e);
                    }
                }
                Err(_) => connections_closed = true,
            },
            recv(ticker) -> _ => dispatcher.housekeeping(),
        }

        if events_closed {
            log::error!("input producer stopped, hardware control unavailable");
            events = never();
        }
        if connections_closed {
            log::warn!("remote listener stopped");
            connections = never();
        }
    }

    dispatcher.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;

    use musicbox_core::mocks::{MockBackend, RecordingMixer};
    use musicbox_core::session::SessionSettings;
    use musicbox_core::{Catalog, Catalogs, RunState, SourceMode, Track};

    type TestDispatcher = Dispatcher<MockBackend, RecordingMixer, Vec<u8>>;

    /// In-memory connection: request bytes in, response bytes out
    struct FakeStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl FakeStream {
        fn get(path: &str) -> Self {
            Self {
                input: Cursor::new(format!("GET {path} HTTP/1.1\r\n\r\n").into_bytes()),
                output: Vec::new(),
            }
        }

        fn response(&self) -> String {
            String::from_utf8_lossy(&self.output).into_owned()
        }
    }

    impl Read for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for FakeStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn dispatcher() -> TestDispatcher {
        let tracks = |prefix: &str| {
            Catalog::new(
                (0..5)
                    .map(|i| Track::new(&format!("{prefix} {i}"), "artist", &format!("/{prefix}/{i}")))
                    .collect(),
            )
        };
        let session = PlaybackSession::new(
            MockBackend::new(),
            RecordingMixer::new(),
            Catalogs::new(tracks("local"), tracks("cloud")),
            SessionSettings::default(),
        );
        Dispatcher::new(
            session,
            StatusDisplay::new(Vec::new(), Some(8888)),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn test_gate_suppresses_burst() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        assert_eq!(d.handle_event(EventCode::Next, t0), Some(Notice::Playing));
        assert_eq!(d.handle_event(EventCode::Next, t0 + Duration::from_millis(50)), None);
        assert_eq!(d.session().index(), 1);
        assert!(
            d.handle_event(EventCode::Next, t0 + Duration::from_millis(250))
                .is_some()
        );
        assert_eq!(d.session().index(), 2);
    }

    #[test]
    fn test_remote_commands_are_not_gated() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        d.handle_event(EventCode::PlayPause, t0);
        let mut stream = FakeStream::get("/pause");
        d.handle_connection(&mut stream).expect("serve");
        assert_eq!(d.session().state(), RunState::Paused);
        assert!(stream.response().contains("Paused"));
    }

    #[test]
    fn test_selection_resets_gate() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        d.handle_event(EventCode::PlayPause, t0);
        d.handle_connection(&mut FakeStream::get("/cloud?song=3"))
            .expect("serve");
        assert_eq!(d.session().mode(), SourceMode::Cloud);
        assert_eq!(d.session().index(), 3);
        // Would be inside the window without the reset
        assert!(d.handle_event(EventCode::Next, t0 + Duration::from_millis(10)).is_some());
        assert_eq!(d.session().index(), 4);
    }

    #[test]
    fn test_unknown_path_still_ok() {
        let mut d = dispatcher();
        let mut stream = FakeStream::get("/nope");
        assert_eq!(
            d.handle_connection(&mut stream).expect("serve"),
            RemoteRequest::Unknown
        );
        assert!(stream.response().starts_with("HTTP/1.1 200 OK"));
        assert!(stream.response().ends_with("OK\n"));
        assert_eq!(d.session().state(), RunState::Stopped);
    }

    #[test]
    fn test_index_and_status() {
        let mut d = dispatcher();
        let mut index = FakeStream::get("/");
        d.handle_connection(&mut index).expect("serve");
        assert!(index.response().contains("text/html"));

        let mut status = FakeStream::get("/status");
        d.handle_connection(&mut status).expect("serve");
        assert!(status.response().contains("state=Stopped"));
    }

    #[test]
    fn test_housekeeping_auto_advances() {
        let mut d = dispatcher();
        d.handle_event(EventCode::PlayPause, Instant::now());
        let pid = d.session().pid().expect("pid");
        d.session().backend().exit(pid);
        d.housekeeping();
        assert_eq!(d.session().index(), 1);
        assert_eq!(d.session().state(), RunState::Playing);
    }

    #[test]
    fn test_run_applies_events_then_shuts_down() {
        let mut d = dispatcher();
        let (event_tx, event_rx) = crossbeam_channel::bounded(4);
        let (_conn_tx, conn_rx) = crossbeam_channel::bounded::<TcpStream>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let backend = d.session().backend().clone();

        let feeder = thread::spawn(move || {
            event_tx.send(EventCode::PlayPause).expect("send");
            thread::sleep(Duration::from_millis(100));
            stop_tx.send(()).expect("stop");
        });
        run(&mut d, &event_rx, &conn_rx, &stop_rx, Duration::from_millis(20));
        feeder.join().expect("feeder");

        assert_eq!(backend.spawned().len(), 1);
        assert!(backend.live().is_empty());
        assert_eq!(d.session().state(), RunState::Stopped);
    }

    #[test]
    fn test_run_survives_closed_event_source() {
        let mut d = dispatcher();
        let (event_tx, event_rx) = crossbeam_channel::bounded::<EventCode>(1);
        drop(event_tx);
        let conn_rx = never();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stop_tx.send(()).expect("stop");
        });
        run(&mut d, &event_rx, &conn_rx, &stop_rx, Duration::from_millis(10));
        stopper.join().expect("stopper");
    }
}
